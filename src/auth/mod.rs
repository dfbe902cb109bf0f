//! Provider authentication adapters
//!
//! Flat request/response adapters over the REST envelope. Wire contracts
//! only; credential storage and account flows belong to the caller.

pub mod discord;
pub mod microsoft;
pub mod mojang;

pub use discord::DiscordRestApi;
pub use microsoft::MicrosoftAuthApi;
pub use mojang::MojangRestApi;
