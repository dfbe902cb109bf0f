//! # Launcher Core
//!
//! The provisioning core of a Minecraft launcher, providing functionality for:
//! - JVM discovery, validation and acquisition (Temurin, Corretto)
//! - Distribution index loading and module-tree validation
//! - Concurrent, resumable, hash-verified downloads with progress tracking
//! - Mod-loader version-manifest materialization (Forge, Fabric)
//! - The server-list-ping wire protocol with SRV indirection
//! - Worker-process isolation for long-running repair cycles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use launcher_core::config::CoreConfig;
//! use launcher_core::distribution::DistributionApi;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CoreConfig::new("./launcher".into())
//!         .with_distribution_url("https://example.com/distribution.json");
//!     let mut api = DistributionApi::new(config)?;
//!     let distribution = api.get_distribution().await?;
//!
//!     for server in &distribution.servers {
//!         println!("{} ({})", server.raw.name, server.raw.minecraft_version);
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod asset;
pub mod auth;
pub mod config;
pub mod distribution;
pub mod download;
pub mod error;
pub mod java;
pub mod processor;
pub mod protocol;
pub mod repair;
pub mod rest;
pub mod status;
pub mod worker;

// Re-export main types
pub use asset::{Asset, HashAlgorithm};
pub use config::{Arch, CoreConfig, Platform};
pub use distribution::{Distribution, DistributionApi, ResolvedDistribution};
pub use download::DownloadEngine;
pub use error::{DisplayableError, LauncherError, Result};
pub use repair::{FullRepairArgs, FullRepairReceiver};
pub use status::{ServerStatus, ServerStatusClient};
pub use worker::{Transmitter, WorkerMessage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the logger with default settings
pub fn init_logger() {
    env_logger::init();
}
