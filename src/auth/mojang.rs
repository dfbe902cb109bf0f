//! Yggdrasil (legacy Mojang) authentication adapter

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::rest::{adapter_client, classify_transport_error, RestResponse, TransportFailure};

const AUTH_SERVER: &str = "https://authserver.mojang.com";

/// Provider error classification for Yggdrasil responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MojangErrorCode {
    /// Wrong HTTP method on the endpoint
    MethodNotAllowed,
    /// Endpoint does not exist
    NotFound,
    /// Account was migrated to Microsoft; Yggdrasil login is gone
    UserMigrated,
    /// Username or password is wrong
    InvalidCredentials,
    /// Too many recent attempts
    Ratelimit,
    /// Access token is not valid
    InvalidToken,
    /// Access token already has a profile attached
    AccessTokenHasProfile,
    /// No credentials were supplied
    CredentialsMissing,
    /// Salt version the server cannot handle
    InvalidSaltVersion,
    /// Request body content type is wrong
    UnsupportedMediaType,
    /// Endpoint has been retired
    Gone,
    /// Account has not bought the game
    NotPaid,
    /// Auth server hostname did not resolve
    Unreachable,
    /// Anything not recognized
    Unknown,
}

impl MojangErrorCode {
    /// Whether this code indicates a client bug rather than anything a user
    /// can fix by typing different credentials.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            MojangErrorCode::MethodNotAllowed
                | MojangErrorCode::NotFound
                | MojangErrorCode::AccessTokenHasProfile
                | MojangErrorCode::CredentialsMissing
                | MojangErrorCode::InvalidSaltVersion
                | MojangErrorCode::UnsupportedMediaType
        )
    }

    /// Decode the `error` / `errorMessage` / `cause` triple of an Yggdrasil
    /// error body.
    pub fn from_error_body(body: &ErrorBody) -> Self {
        match body.error.as_deref() {
            Some("Method Not Allowed") => MojangErrorCode::MethodNotAllowed,
            Some("Not Found") => MojangErrorCode::NotFound,
            Some("Unsupported Media Type") => MojangErrorCode::UnsupportedMediaType,
            Some("GoneException") => MojangErrorCode::Gone,
            Some("ForbiddenOperationException") => {
                if body.cause.as_deref() == Some("UserMigratedException") {
                    return MojangErrorCode::UserMigrated;
                }
                match body.error_message.as_deref() {
                    Some("Invalid credentials. Invalid username or password.") => {
                        MojangErrorCode::InvalidCredentials
                    }
                    Some("Invalid credentials.") => MojangErrorCode::Ratelimit,
                    Some("Invalid token") | Some("Invalid token.") => MojangErrorCode::InvalidToken,
                    Some(msg) if msg.contains("profile") => MojangErrorCode::AccessTokenHasProfile,
                    _ => MojangErrorCode::Unknown,
                }
            }
            Some("IllegalArgumentException") => match body.error_message.as_deref() {
                Some(msg) if msg.contains("credentials can not be null") => {
                    MojangErrorCode::CredentialsMissing
                }
                Some(msg) if msg.contains("salt version") => MojangErrorCode::InvalidSaltVersion,
                _ => MojangErrorCode::Unknown,
            },
            Some("InsufficientPrivilegesException") => MojangErrorCode::NotPaid,
            _ => MojangErrorCode::Unknown,
        }
    }
}

/// Error body shape the auth server uses across endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    /// Exception or status name
    pub error: Option<String>,
    /// Human-readable message
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
    /// Underlying cause exception name
    pub cause: Option<String>,
}

/// A name/id pair identifying a game profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Profile UUID without dashes
    pub id: String,
    /// Profile display name
    pub name: String,
}

/// An authenticated Yggdrasil session; held only in transit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Bearer token for game services
    pub access_token: String,
    /// Token identifying this client installation
    pub client_token: String,
    /// The profile this session plays as
    #[serde(default)]
    pub selected_profile: Option<Profile>,
    /// All profiles on the account
    #[serde(default)]
    pub available_profiles: Option<Vec<Profile>>,
    /// Extra user object when requested
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

/// Result alias for this adapter
pub type MojangResponse<T> = RestResponse<T, MojangErrorCode>;

/// Adapter for the Yggdrasil auth server
#[derive(Debug, Clone)]
pub struct MojangRestApi {
    client: reqwest::Client,
    base_url: String,
}

impl MojangRestApi {
    /// Create an adapter against the production auth server
    pub fn new() -> crate::error::Result<Self> {
        Ok(Self {
            client: adapter_client()?,
            base_url: AUTH_SERVER.to_string(),
        })
    }

    /// Point the adapter at a different auth server (tests, mirrors)
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn classify<T>(&self, what: &str, err: &reqwest::Error) -> MojangResponse<T> {
        let code = match classify_transport_error(err) {
            TransportFailure::Dns => MojangErrorCode::Unreachable,
            failure => {
                log::warn!("mojang {what}: {failure:?}: {err}");
                MojangErrorCode::Unknown
            }
        };
        RestResponse::failure(format!("{what} failed: {err}"), code)
    }

    async fn decode_error<T>(&self, what: &str, response: reqwest::Response) -> MojangResponse<T> {
        let status = response.status();
        let body: ErrorBody = response.json().await.unwrap_or_default();
        let code = MojangErrorCode::from_error_body(&body);
        log::debug!("mojang {what}: HTTP {status}, code {code:?}");
        RestResponse::failure(
            body.error_message
                .unwrap_or_else(|| format!("{what} returned HTTP {status}")),
            code,
        )
    }

    /// POST `/authenticate`: exchange username/password for a [`Session`].
    ///
    /// A fresh random client token is generated when the caller has none.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        client_token: Option<String>,
        request_user: bool,
    ) -> MojangResponse<Session> {
        let client_token = client_token.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let body = json!({
            "agent": { "name": "Minecraft", "version": 1 },
            "username": username,
            "password": password,
            "clientToken": client_token,
            "requestUser": request_user,
        });

        let result = self
            .client
            .post(format!("{}/authenticate", self.base_url))
            .json(&body)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.classify("authenticate", &e),
        };
        if !response.status().is_success() {
            return self.decode_error("authenticate", response).await;
        }
        match response.json::<Session>().await {
            Ok(session) => RestResponse::success(session),
            Err(e) => self.classify("authenticate", &e),
        }
    }

    /// POST `/validate`: check whether an access token is still usable.
    ///
    /// HTTP 403 is a *successful* negative answer, not an error.
    pub async fn validate(&self, access_token: &str, client_token: &str) -> MojangResponse<bool> {
        let body = json!({ "accessToken": access_token, "clientToken": client_token });
        let result = self
            .client
            .post(format!("{}/validate", self.base_url))
            .json(&body)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.classify("validate", &e),
        };
        match response.status().as_u16() {
            204 | 200 => RestResponse::success(true),
            403 => RestResponse::success(false),
            _ => self.decode_error("validate", response).await,
        }
    }

    /// POST `/invalidate`: retire an access token
    pub async fn invalidate(&self, access_token: &str, client_token: &str) -> MojangResponse<()> {
        let body = json!({ "accessToken": access_token, "clientToken": client_token });
        let result = self
            .client
            .post(format!("{}/invalidate", self.base_url))
            .json(&body)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.classify("invalidate", &e),
        };
        if response.status().is_success() {
            RestResponse::success_empty()
        } else {
            self.decode_error("invalidate", response).await
        }
    }

    /// POST `/refresh`: trade a stale access token for a fresh [`Session`]
    pub async fn refresh(
        &self,
        access_token: &str,
        client_token: &str,
        request_user: bool,
    ) -> MojangResponse<Session> {
        let body = json!({
            "accessToken": access_token,
            "clientToken": client_token,
            "requestUser": request_user,
        });
        let result = self
            .client
            .post(format!("{}/refresh", self.base_url))
            .json(&body)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.classify("refresh", &e),
        };
        if !response.status().is_success() {
            return self.decode_error("refresh", response).await;
        }
        match response.json::<Session>().await {
            Ok(session) => RestResponse::success(session),
            Err(e) => self.classify("refresh", &e),
        }
    }
}
