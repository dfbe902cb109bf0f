//! Error types for the launcher core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, LauncherError>;

/// Main error type for core operations
#[derive(Debug, Error)]
pub enum LauncherError {
    // Transport
    #[error("Connection timed out: {0}")]
    Timeout(String),
    #[error("Host could not be resolved: {0}")]
    Unreachable(String),
    #[error("Connection refused by {0}")]
    ConnectionRefused(String),
    #[error("Connection reset: {0}")]
    Reset(String),

    // Protocol framing
    #[error("Unexpected packet: {0}")]
    UnexpectedPacket(String),
    #[error("Packet frame exceeded its promised length: {0}")]
    FrameOverflow(String),
    #[error("Packet ended before {0} could be read")]
    FrameUnderrun(String),
    #[error("Varint exceeds 5 bytes")]
    VarintTooLarge,

    // Parsing
    #[error("Malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),
    #[error("Unparseable version: {0}")]
    UnparseableVersion(String),

    // Validation
    #[error("Hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("Size mismatch for {path}: expected {expected}, got {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },
    #[error("File not found: {0}")]
    MissingFile(String),

    // Configuration
    #[error("Unknown server id: {0}")]
    UnknownServerId(String),
    #[error("Server {0} declares no mod loader module")]
    NoModLoader(String),
    #[error("Unknown JDK distribution: {0}")]
    UnknownDistribution(String),

    // Fatal
    #[error("Unable to load a distribution index: {0}")]
    DistributionLoadFailed(String),
    #[error("JDK acquisition failed: {0}")]
    JdkAcquisitionFailed(String),

    // Ambient conversions
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ZIP archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Worker error: {0}")]
    Worker(String),
}

impl LauncherError {
    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(what: S) -> Self {
        Self::Timeout(what.into())
    }

    /// Create a new unexpected packet error
    pub fn unexpected_packet<S: Into<String>>(msg: S) -> Self {
        Self::UnexpectedPacket(msg.into())
    }

    /// Create a new malformed archive error
    pub fn malformed_archive<S: Into<String>>(msg: S) -> Self {
        Self::MalformedArchive(msg.into())
    }

    /// Create a new unparseable version error
    pub fn unparseable_version<S: Into<String>>(input: S) -> Self {
        Self::UnparseableVersion(input.into())
    }

    /// Create a new missing file error
    pub fn missing_file<S: Into<String>>(path: S) -> Self {
        Self::MissingFile(path.into())
    }

    /// Create a new worker transport error
    pub fn worker<S: Into<String>>(msg: S) -> Self {
        Self::Worker(msg.into())
    }
}

/// A terminal error shaped for direct presentation to a user.
///
/// Receivers translate recognized [`LauncherError`]s into one of these before
/// the worker reports failure; errors nobody recognizes travel without one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayableError {
    /// Short headline, e.g. "Download Failed"
    pub title: String,
    /// Sentence-length description with remediation hints
    pub desc: String,
}

impl DisplayableError {
    /// Create a new displayable error
    pub fn new<T: Into<String>, D: Into<String>>(title: T, desc: D) -> Self {
        Self {
            title: title.into(),
            desc: desc.into(),
        }
    }
}
