//! Microsoft OAuth → Xbox Live → XSTS → Minecraft services adapter

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::rest::{adapter_client, classify_transport_error, RestResponse};

const TOKEN_ENDPOINT: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";
const XBL_ENDPOINT: &str = "https://user.auth.xboxlive.com/user/authenticate";
const XSTS_ENDPOINT: &str = "https://xsts.auth.xboxlive.com/xsts/authorize";
const MC_LOGIN_ENDPOINT: &str = "https://api.minecraftservices.com/authentication/login_with_xbox";
const MC_PROFILE_ENDPOINT: &str = "https://api.minecraftservices.com/minecraft/profile";

const SCOPE: &str = "XboxLive.signin offline_access";

/// Provider error classification for the Microsoft chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicrosoftErrorCode {
    /// The Microsoft account has no Xbox account attached
    NoXboxAccount,
    /// Xbox Live is banned in the account's country
    XblBanned,
    /// The account is a child account outside a family
    Under18,
    /// The account owns no Minecraft profile
    NoProfile,
    /// Anything not recognized
    Unknown,
}

impl MicrosoftErrorCode {
    /// Decode an XSTS `XErr` value
    pub fn from_xerr(xerr: u64) -> Self {
        match xerr {
            2148916233 => MicrosoftErrorCode::NoXboxAccount,
            2148916235 => MicrosoftErrorCode::XblBanned,
            2148916238 => MicrosoftErrorCode::Under18,
            _ => MicrosoftErrorCode::Unknown,
        }
    }
}

/// OAuth grant presented to the token endpoint
#[derive(Debug, Clone)]
pub enum AuthorizationGrant {
    /// First sign-in: an authorization code plus the redirect URI it was
    /// issued against
    AuthorizationCode {
        /// Code returned by the browser flow
        code: String,
        /// Redirect URI registered for the application
        redirect_uri: String,
    },
    /// Subsequent sign-ins: a refresh token from an earlier exchange
    RefreshToken(String),
}

/// Microsoft OAuth token pair
#[derive(Debug, Clone, Deserialize)]
pub struct MicrosoftTokens {
    /// OAuth access token
    pub access_token: String,
    /// OAuth refresh token
    pub refresh_token: String,
    /// Seconds until the access token expires
    pub expires_in: u64,
}

/// Token issued by XBL or XSTS
#[derive(Debug, Clone, Deserialize)]
pub struct XboxServiceToken {
    /// The service token
    #[serde(rename = "Token")]
    pub token: String,
    /// User hash claims
    #[serde(rename = "DisplayClaims")]
    pub display_claims: DisplayClaims,
}

/// Display claims block of an Xbox service response
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayClaims {
    /// User identity claims; the `uhs` of the first entry joins the
    /// Minecraft login header
    pub xui: Vec<XuiClaim>,
}

/// A single Xbox user identity claim
#[derive(Debug, Clone, Deserialize)]
pub struct XuiClaim {
    /// User hash
    pub uhs: String,
}

/// XSTS error body carrying the `XErr` classification
#[derive(Debug, Clone, Deserialize)]
struct XstsErrorBody {
    #[serde(rename = "XErr")]
    xerr: Option<u64>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

/// Token for the Minecraft services API
#[derive(Debug, Clone, Deserialize)]
pub struct MinecraftTokens {
    /// Bearer token for Minecraft services
    pub access_token: String,
    /// Seconds until it expires
    pub expires_in: u64,
}

/// A Minecraft profile fetched from the services API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinecraftProfile {
    /// Profile UUID without dashes
    pub id: String,
    /// Profile display name
    pub name: String,
    /// Skins on the profile
    #[serde(default)]
    pub skins: Vec<serde_json::Value>,
    /// Capes on the profile
    #[serde(default)]
    pub capes: Vec<serde_json::Value>,
}

/// Result alias for this adapter
pub type MicrosoftResponse<T> = RestResponse<T, MicrosoftErrorCode>;

/// Adapter for the Microsoft authentication chain
#[derive(Debug, Clone)]
pub struct MicrosoftAuthApi {
    client: reqwest::Client,
    client_id: String,
}

impl MicrosoftAuthApi {
    /// Create an adapter for the given Azure application client id
    pub fn new<S: Into<String>>(client_id: S) -> crate::error::Result<Self> {
        Ok(Self {
            client: adapter_client()?,
            client_id: client_id.into(),
        })
    }

    fn classify<T>(&self, what: &str, err: &reqwest::Error) -> MicrosoftResponse<T> {
        log::warn!(
            "microsoft {what}: {:?}: {err}",
            classify_transport_error(err)
        );
        RestResponse::failure(format!("{what} failed: {err}"), MicrosoftErrorCode::Unknown)
    }

    /// Step 1: exchange an authorization grant for OAuth tokens
    pub async fn get_tokens(&self, grant: AuthorizationGrant) -> MicrosoftResponse<MicrosoftTokens> {
        let mut form = vec![
            ("client_id", self.client_id.clone()),
            ("scope", SCOPE.to_string()),
        ];
        match grant {
            AuthorizationGrant::AuthorizationCode { code, redirect_uri } => {
                form.push(("grant_type", "authorization_code".to_string()));
                form.push(("code", code));
                form.push(("redirect_uri", redirect_uri));
            }
            AuthorizationGrant::RefreshToken(token) => {
                form.push(("grant_type", "refresh_token".to_string()));
                form.push(("refresh_token", token));
            }
        }

        let result = self.client.post(TOKEN_ENDPOINT).form(&form).send().await;
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.classify("token exchange", &e),
        };
        if !response.status().is_success() {
            let status = response.status();
            return RestResponse::failure(
                format!("token exchange returned HTTP {status}"),
                MicrosoftErrorCode::Unknown,
            );
        }
        match response.json::<MicrosoftTokens>().await {
            Ok(tokens) => RestResponse::success(tokens),
            Err(e) => self.classify("token exchange", &e),
        }
    }

    /// Step 2: authenticate against Xbox Live
    pub async fn get_xbl_token(&self, access_token: &str) -> MicrosoftResponse<XboxServiceToken> {
        let body = json!({
            "Properties": {
                "AuthMethod": "RPS",
                "SiteName": "user.auth.xboxlive.com",
                "RpsTicket": format!("d={access_token}"),
            },
            "RelyingParty": "http://auth.xboxlive.com",
            "TokenType": "JWT",
        });
        self.xbox_exchange("XBL authenticate", XBL_ENDPOINT, body).await
    }

    /// Step 3: authorize against the Xbox Secure Token Service
    pub async fn get_xsts_token(&self, xbl_token: &str) -> MicrosoftResponse<XboxServiceToken> {
        let body = json!({
            "Properties": {
                "SandboxId": "RETAIL",
                "UserTokens": [xbl_token],
            },
            "RelyingParty": "rp://api.minecraftservices.com/",
            "TokenType": "JWT",
        });
        self.xbox_exchange("XSTS authorize", XSTS_ENDPOINT, body).await
    }

    async fn xbox_exchange(
        &self,
        what: &str,
        endpoint: &str,
        body: serde_json::Value,
    ) -> MicrosoftResponse<XboxServiceToken> {
        let result = self.client.post(endpoint).json(&body).send().await;
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.classify(what, &e),
        };
        if !response.status().is_success() {
            let status = response.status();
            let error: XstsErrorBody = response.json().await.unwrap_or(XstsErrorBody {
                xerr: None,
                message: None,
            });
            let code = error
                .xerr
                .map(MicrosoftErrorCode::from_xerr)
                .unwrap_or(MicrosoftErrorCode::Unknown);
            return RestResponse::failure(
                error
                    .message
                    .unwrap_or_else(|| format!("{what} returned HTTP {status}")),
                code,
            );
        }
        match response.json::<XboxServiceToken>().await {
            Ok(token) => RestResponse::success(token),
            Err(e) => self.classify(what, &e),
        }
    }

    /// Step 4: log into Minecraft services with the XSTS token
    pub async fn get_minecraft_tokens(
        &self,
        user_hash: &str,
        xsts_token: &str,
    ) -> MicrosoftResponse<MinecraftTokens> {
        let body = json!({
            "identityToken": format!("XBL3.0 x={user_hash};{xsts_token}"),
        });
        let result = self.client.post(MC_LOGIN_ENDPOINT).json(&body).send().await;
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.classify("Minecraft login", &e),
        };
        if !response.status().is_success() {
            let status = response.status();
            return RestResponse::failure(
                format!("Minecraft login returned HTTP {status}"),
                MicrosoftErrorCode::Unknown,
            );
        }
        match response.json::<MinecraftTokens>().await {
            Ok(tokens) => RestResponse::success(tokens),
            Err(e) => self.classify("Minecraft login", &e),
        }
    }

    /// Step 5: fetch the Minecraft profile.
    ///
    /// HTTP 404 means the account owns the game but created no profile yet.
    pub async fn get_profile(&self, minecraft_token: &str) -> MicrosoftResponse<MinecraftProfile> {
        let result = self
            .client
            .get(MC_PROFILE_ENDPOINT)
            .bearer_auth(minecraft_token)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.classify("profile fetch", &e),
        };
        match response.status().as_u16() {
            404 => RestResponse::failure(
                "this account owns no Minecraft profile",
                MicrosoftErrorCode::NoProfile,
            ),
            status if !(200..300).contains(&status) => RestResponse::failure(
                format!("profile fetch returned HTTP {status}"),
                MicrosoftErrorCode::Unknown,
            ),
            _ => match response.json::<MinecraftProfile>().await {
                Ok(profile) => RestResponse::success(profile),
                Err(e) => self.classify("profile fetch", &e),
            },
        }
    }

    /// Run the full five-step chain from an authorization grant to a profile
    pub async fn full_chain(
        &self,
        grant: AuthorizationGrant,
    ) -> MicrosoftResponse<(MicrosoftTokens, MinecraftTokens, MinecraftProfile)> {
        let tokens = match self.get_tokens(grant).await {
            RestResponse {
                data: Some(tokens), ..
            } => tokens,
            failed => return carry_failure(failed),
        };
        let xbl = match self.get_xbl_token(&tokens.access_token).await {
            RestResponse { data: Some(xbl), .. } => xbl,
            failed => return carry_failure(failed),
        };
        let user_hash = match xbl.display_claims.xui.first() {
            Some(claim) => claim.uhs.clone(),
            None => {
                return RestResponse::failure(
                    "XBL response carried no user hash",
                    MicrosoftErrorCode::Unknown,
                )
            }
        };
        let xsts = match self.get_xsts_token(&xbl.token).await {
            RestResponse { data: Some(xsts), .. } => xsts,
            failed => return carry_failure(failed),
        };
        let minecraft = match self.get_minecraft_tokens(&user_hash, &xsts.token).await {
            RestResponse {
                data: Some(minecraft),
                ..
            } => minecraft,
            failed => return carry_failure(failed),
        };
        match self.get_profile(&minecraft.access_token).await {
            RestResponse {
                data: Some(profile),
                ..
            } => RestResponse::success((tokens, minecraft, profile)),
            failed => carry_failure(failed),
        }
    }
}

/// Re-wrap a failed envelope with a different payload type
fn carry_failure<T, U>(failed: MicrosoftResponse<T>) -> MicrosoftResponse<U> {
    RestResponse {
        data: None,
        status: failed.status,
        error: failed.error,
        provider_code: failed.provider_code,
    }
}
