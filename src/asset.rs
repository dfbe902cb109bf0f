//! Downloadable assets and on-disk validation

use std::path::{Path, PathBuf};

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tokio::io::AsyncReadExt;

use crate::error::Result;

/// Hash algorithms assets may be verified with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HashAlgorithm {
    /// MD5 (distribution artifacts, Corretto checksums)
    Md5,
    /// SHA-1 (Mojang asset indexes)
    Sha1,
    /// SHA-256 (Adoptium packages)
    Sha256,
}

/// A single downloadable file with an expected size and content hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Identifier, typically a module id or file name
    pub id: String,
    /// Source URL
    pub url: String,
    /// Expected size in bytes; zero means "unknown, take what the server sends"
    pub size: u64,
    /// Expected lowercase hex digest
    pub hash: String,
    /// Algorithm `hash` was computed with
    pub algorithm: HashAlgorithm,
    /// Absolute destination path
    pub path: PathBuf,
}

impl Asset {
    /// Create a new asset
    pub fn new<I, U, H>(
        id: I,
        url: U,
        size: u64,
        hash: H,
        algorithm: HashAlgorithm,
        path: PathBuf,
    ) -> Self
    where
        I: Into<String>,
        U: Into<String>,
        H: Into<String>,
    {
        Self {
            id: id.into(),
            url: url.into(),
            size,
            hash: hash.into(),
            algorithm,
            path,
        }
    }
}

async fn digest_file<D: Digest>(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = D::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute the streaming hex digest of a file
pub async fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    match algorithm {
        HashAlgorithm::Md5 => digest_file::<Md5>(path).await,
        HashAlgorithm::Sha1 => digest_file::<Sha1>(path).await,
        HashAlgorithm::Sha256 => digest_file::<Sha256>(path).await,
    }
}

/// Check whether the file at `asset.path` matches the expected size and hash.
///
/// A missing file is simply invalid, not an error. A zero expected size skips
/// the size comparison (the real size was unknown at planning time).
pub async fn validate_local_file(asset: &Asset) -> Result<bool> {
    let metadata = match tokio::fs::metadata(&asset.path).await {
        Ok(metadata) => metadata,
        Err(_) => return Ok(false),
    };
    if !metadata.is_file() {
        return Ok(false);
    }
    if asset.size != 0 && metadata.len() != asset.size {
        log::debug!(
            "{}: size {} != expected {}",
            asset.path.display(),
            metadata.len(),
            asset.size
        );
        return Ok(false);
    }
    let actual = hash_file(&asset.path, asset.algorithm).await?;
    Ok(actual.eq_ignore_ascii_case(&asset.hash))
}
