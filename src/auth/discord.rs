//! Discord identity and account-linkage adapter

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::rest::{adapter_client, classify_transport_error, RestResponse};

const DISCORD_API: &str = "https://discord.com/api/v10";

/// Provider error classification for Discord calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscordErrorCode {
    /// The bearer token was rejected
    InvalidToken,
    /// Anything not recognized
    Unknown,
}

/// The subset of a Discord user record the launcher cares about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordUser {
    /// Snowflake id
    pub id: String,
    /// Account name
    pub username: String,
    /// Display name, when set
    #[serde(default)]
    pub global_name: Option<String>,
    /// Avatar hash
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Result alias for this adapter
pub type DiscordResponse<T> = RestResponse<T, DiscordErrorCode>;

/// Adapter for Discord identity lookups and backend linkage
#[derive(Debug, Clone)]
pub struct DiscordRestApi {
    client: reqwest::Client,
    backend_url: String,
}

impl DiscordRestApi {
    /// Create an adapter posting linkages to the given backend
    pub fn new<S: Into<String>>(backend_url: S) -> crate::error::Result<Self> {
        Ok(Self {
            client: adapter_client()?,
            backend_url: backend_url.into(),
        })
    }

    /// GET `/users/@me` with a bearer token
    pub async fn get_user(&self, bearer_token: &str) -> DiscordResponse<DiscordUser> {
        let result = self
            .client
            .get(format!("{DISCORD_API}/users/@me"))
            .bearer_auth(bearer_token)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                log::warn!("discord user fetch: {:?}: {e}", classify_transport_error(&e));
                return RestResponse::failure(
                    format!("user fetch failed: {e}"),
                    DiscordErrorCode::Unknown,
                );
            }
        };
        match response.status().as_u16() {
            401 | 403 => RestResponse::failure(
                "discord rejected the bearer token",
                DiscordErrorCode::InvalidToken,
            ),
            status if !(200..300).contains(&status) => RestResponse::failure(
                format!("user fetch returned HTTP {status}"),
                DiscordErrorCode::Unknown,
            ),
            _ => match response.json::<DiscordUser>().await {
                Ok(user) => RestResponse::success(user),
                Err(e) => RestResponse::failure(
                    format!("user fetch failed: {e}"),
                    DiscordErrorCode::Unknown,
                ),
            },
        }
    }

    /// POST the Discord/Minecraft linkage to the configured backend
    pub async fn link_account(
        &self,
        discord_token: &str,
        minecraft_uuid: &str,
    ) -> DiscordResponse<()> {
        let body = json!({
            "discord_token": discord_token,
            "minecraft_uuid": minecraft_uuid,
        });
        let result = self.client.post(&self.backend_url).json(&body).send().await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                log::warn!("discord linkage: {:?}: {e}", classify_transport_error(&e));
                return RestResponse::failure(
                    format!("linkage failed: {e}"),
                    DiscordErrorCode::Unknown,
                );
            }
        };
        if response.status().is_success() {
            RestResponse::success_empty()
        } else {
            RestResponse::failure(
                format!("linkage returned HTTP {}", response.status()),
                DiscordErrorCode::Unknown,
            )
        }
    }
}
