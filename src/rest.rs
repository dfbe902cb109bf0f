//! Uniform REST envelope shared by all provider adapters
//!
//! Adapters never leak transport errors to callers; every outcome is folded
//! into a [`RestResponse`] with a status, an optional message and an optional
//! provider-specific code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome category of an adapter call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestStatus {
    /// The provider answered and the answer is usable
    Success,
    /// Transport failed, the provider rejected the call, or the body was junk
    Error,
}

/// Result payload of a provider adapter call
#[derive(Debug, Clone)]
pub struct RestResponse<T, C> {
    /// Payload when the call succeeded (or partially succeeded)
    pub data: Option<T>,
    /// Outcome category
    pub status: RestStatus,
    /// Human-oriented message describing a failure
    pub error: Option<String>,
    /// Provider-specific error classification
    pub provider_code: Option<C>,
}

impl<T, C> RestResponse<T, C> {
    /// A successful response carrying `data`
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            status: RestStatus::Success,
            error: None,
            provider_code: None,
        }
    }

    /// A successful response with no payload (e.g. HTTP 204)
    pub fn success_empty() -> Self {
        Self {
            data: None,
            status: RestStatus::Success,
            error: None,
            provider_code: None,
        }
    }

    /// A failed response with a message and provider code
    pub fn failure<S: Into<String>>(error: S, provider_code: C) -> Self {
        Self {
            data: None,
            status: RestStatus::Error,
            error: Some(error.into()),
            provider_code: Some(provider_code),
        }
    }

    /// Whether the call succeeded
    pub fn is_success(&self) -> bool {
        self.status == RestStatus::Success
    }
}

/// Transport-level failure classes shared across providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// The request timed out end to end
    Timeout,
    /// The provider hostname did not resolve
    Dns,
    /// The provider actively refused the connection
    Refused,
    /// The provider answered with a non-success HTTP status
    Http(reqwest::StatusCode),
    /// The body could not be decoded
    Decode,
    /// Anything else
    Other,
}

/// Classify a [`reqwest::Error`] into a [`TransportFailure`]
pub fn classify_transport_error(err: &reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        return TransportFailure::Timeout;
    }
    if let Some(status) = err.status() {
        return TransportFailure::Http(status);
    }
    if err.is_decode() {
        return TransportFailure::Decode;
    }
    if err.is_connect() {
        // reqwest does not expose the resolver failure directly; walk the
        // source chain to tell DNS failures from refused connections.
        let mut source = std::error::Error::source(err);
        while let Some(inner) = source {
            if let Some(io) = inner.downcast_ref::<std::io::Error>() {
                if io.kind() == std::io::ErrorKind::ConnectionRefused {
                    return TransportFailure::Refused;
                }
            }
            if inner.to_string().to_lowercase().contains("dns") {
                return TransportFailure::Dns;
            }
            source = std::error::Error::source(inner);
        }
        return TransportFailure::Dns;
    }
    TransportFailure::Other
}

/// Suggested end-to-end timeout for provider adapters
pub const REST_TIMEOUT: Duration = Duration::from_millis(2500);

/// Build the adapter HTTP client with the crate user agent and [`REST_TIMEOUT`]
pub fn adapter_client() -> crate::error::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(format!("LauncherCore/{}", env!("CARGO_PKG_VERSION")))
        .timeout(REST_TIMEOUT)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_constructors_set_status() {
        let ok: RestResponse<u32, ()> = RestResponse::success(7);
        assert!(ok.is_success());
        assert_eq!(ok.data, Some(7));

        let err: RestResponse<u32, &str> = RestResponse::failure("boom", "CODE");
        assert!(!err.is_success());
        assert_eq!(err.provider_code, Some("CODE"));
        assert_eq!(err.error.as_deref(), Some("boom"));
    }
}
