//! JDK acquisition from Adoptium Temurin and Amazon Corretto

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::archive;
use crate::asset::{Asset, HashAlgorithm};
use crate::config::{Arch, Platform};
use crate::error::{LauncherError, Result};

const ADOPTIUM_API: &str = "https://api.adoptium.net";
const CORRETTO_DOWNLOADS: &str = "https://corretto.aws/downloads";

/// JDK vendors the core can provision from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JdkDistribution {
    /// Eclipse Temurin via the Adoptium API
    Temurin,
    /// Amazon Corretto via its latest-download endpoints
    Corretto,
}

impl JdkDistribution {
    /// The default vendor for a platform.
    ///
    /// Corretto ships stable aarch64 macOS builds; everything else defaults
    /// to Temurin.
    pub fn default_for(platform: Platform) -> Self {
        match platform {
            Platform::MacOs => JdkDistribution::Corretto,
            _ => JdkDistribution::Temurin,
        }
    }
}

/// Fetches JDK archives for the host platform
#[derive(Debug, Clone)]
pub struct JdkAcquirer {
    client: reqwest::Client,
    runtime_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TemurinRelease {
    binary: TemurinBinary,
    version: TemurinVersion,
}

#[derive(Debug, Deserialize)]
struct TemurinBinary {
    os: String,
    architecture: String,
    image_type: String,
    package: TemurinPackage,
}

#[derive(Debug, Deserialize)]
struct TemurinPackage {
    name: String,
    link: String,
    size: u64,
    checksum: String,
}

#[derive(Debug, Deserialize)]
struct TemurinVersion {
    major: u64,
}

fn adoptium_os(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => "windows",
        Platform::MacOs => "mac",
        Platform::Linux => "linux",
    }
}

fn corretto_os(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => "windows",
        Platform::MacOs => "macos",
        Platform::Linux => "linux",
    }
}

fn corretto_extension(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => "zip",
        Platform::MacOs | Platform::Linux => "tar.gz",
    }
}

fn corretto_archive_name(major: u64, platform: Platform, arch: Arch) -> String {
    format!(
        "amazon-corretto-{major}-{}-{}-jdk.{}",
        arch.as_str(),
        corretto_os(platform),
        corretto_extension(platform)
    )
}

impl JdkAcquirer {
    /// Create an acquirer placing archives under `runtime_dir`
    pub fn new(runtime_dir: PathBuf) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("LauncherCore/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            runtime_dir,
        })
    }

    /// Plan the download of the given (or default) vendor's latest JDK for
    /// `major` on the host platform.
    pub async fn latest_jdk_asset(
        &self,
        major: u64,
        distribution: Option<JdkDistribution>,
    ) -> Result<Asset> {
        let distribution =
            distribution.unwrap_or_else(|| JdkDistribution::default_for(Platform::current()));
        match distribution {
            JdkDistribution::Temurin => self.latest_temurin_asset(major).await,
            JdkDistribution::Corretto => self.latest_corretto_asset(major).await,
        }
    }

    /// Query the Adoptium API for the latest Temurin JDK package
    pub async fn latest_temurin_asset(&self, major: u64) -> Result<Asset> {
        let url = format!("{ADOPTIUM_API}/v3/assets/latest/{major}/hotspot?vendor=eclipse");
        let releases: Vec<TemurinRelease> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let package = select_temurin_package(releases, major, Platform::current(), Arch::current())
            .ok_or_else(|| {
                LauncherError::JdkAcquisitionFailed(format!(
                    "Adoptium has no Temurin {major} JDK for this platform"
                ))
            })?;

        log::info!("latest Temurin {major}: {}", package.name);
        Ok(Asset::new(
            &package.name,
            &package.link,
            package.size,
            &package.checksum,
            HashAlgorithm::Sha256,
            self.runtime_dir.join(&package.name),
        ))
    }

    /// Resolve the latest Corretto JDK: HEAD the archive for its size, fetch
    /// the adjacent checksum document for its MD5.
    pub async fn latest_corretto_asset(&self, major: u64) -> Result<Asset> {
        let platform = Platform::current();
        let name = corretto_archive_name(major, platform, Arch::current());
        let download_url = format!("{CORRETTO_DOWNLOADS}/latest/{name}");
        let checksum_url = format!("{CORRETTO_DOWNLOADS}/latest_checksum/{name}");

        let head = self
            .client
            .head(&download_url)
            .send()
            .await?
            .error_for_status()?;
        // Corretto sizes its latest archives only via Content-Length; zero
        // means the engine takes whatever the server sends.
        let size = head.content_length().unwrap_or(0);

        let checksum = self
            .client
            .get(&checksum_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?
            .trim()
            .to_string();
        if checksum.is_empty() {
            return Err(LauncherError::JdkAcquisitionFailed(format!(
                "Corretto checksum for {name} came back empty"
            )));
        }

        log::info!("latest Corretto {major}: {name} ({size} bytes)");
        Ok(Asset::new(
            &name,
            &download_url,
            size,
            checksum,
            HashAlgorithm::Md5,
            self.runtime_dir.join(&name),
        ))
    }
}

impl JdkAcquirer {
    /// Download and extract the latest JDK for `major`, returning the new
    /// installation root. `on_progress` receives cumulative archive bytes.
    pub async fn provision_jdk<F>(
        &self,
        major: u64,
        distribution: Option<JdkDistribution>,
        on_progress: F,
    ) -> Result<PathBuf>
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        let asset = self.latest_jdk_asset(major, distribution).await?;
        let archive_path = asset.path.clone();
        crate::download::DownloadEngine::new()?
            .run(vec![asset], on_progress)
            .await?;
        let root = extract_jdk_archive(&archive_path)?;
        log::info!("JDK {major} installed at {}", root.display());
        Ok(root)
    }
}

/// Pick the Temurin release matching the host out of the API's answer
fn select_temurin_package(
    releases: Vec<TemurinRelease>,
    major: u64,
    platform: Platform,
    arch: Arch,
) -> Option<TemurinPackage> {
    let os = adoptium_os(platform);
    releases
        .into_iter()
        .find(|release| {
            release.version.major == major
                && release.binary.os == os
                && release.binary.image_type == "jdk"
                && matches!(release.binary.architecture.as_str(), "x64" | "aarch64")
                && release.binary.architecture == arch.as_str()
        })
        .map(|release| release.binary.package)
}

/// Extract a downloaded JDK archive next to itself and return the new
/// installation root.
///
/// The first top-level entry of the archive names the root directory.
pub fn extract_jdk_archive(archive_path: &Path) -> Result<PathBuf> {
    let dest = archive_path
        .parent()
        .ok_or_else(|| LauncherError::missing_file(archive_path.display().to_string()))?;

    let file_name = archive_path.to_string_lossy();
    let entries = if file_name.ends_with(".zip") {
        archive::extract_zip(archive_path, dest, |entry| {
            log::debug!("extracting {entry}")
        })?
    } else if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
        archive::extract_tar_gz(archive_path, dest, |entry| {
            log::debug!("extracting {entry}")
        })?
    } else {
        return Err(LauncherError::malformed_archive(format!(
            "{file_name} is neither a zip nor a tar.gz"
        )));
    };

    let root = archive::first_top_level(&entries).ok_or_else(|| {
        LauncherError::malformed_archive(format!("{file_name} contains no entries"))
    })?;
    Ok(dest.join(root))
}

/// The Java executable inside an extracted installation root
pub fn java_executable_in(root: &Path) -> PathBuf {
    root.join(Platform::current().java_executable())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn corretto_names_follow_the_template() {
        assert_eq!(
            corretto_archive_name(17, Platform::Linux, Arch::X64),
            "amazon-corretto-17-x64-linux-jdk.tar.gz"
        );
        assert_eq!(
            corretto_archive_name(21, Platform::MacOs, Arch::Arm64),
            "amazon-corretto-21-aarch64-macos-jdk.tar.gz"
        );
        assert_eq!(
            corretto_archive_name(8, Platform::Windows, Arch::X64),
            "amazon-corretto-8-x64-windows-jdk.zip"
        );
    }

    #[test]
    fn default_vendor_depends_on_platform() {
        assert_eq!(
            JdkDistribution::default_for(Platform::MacOs),
            JdkDistribution::Corretto
        );
        assert_eq!(
            JdkDistribution::default_for(Platform::Linux),
            JdkDistribution::Temurin
        );
        assert_eq!(
            JdkDistribution::default_for(Platform::Windows),
            JdkDistribution::Temurin
        );
    }

    fn release(major: u64, os: &str, arch: &str, image_type: &str, name: &str) -> TemurinRelease {
        TemurinRelease {
            binary: TemurinBinary {
                os: os.into(),
                architecture: arch.into(),
                image_type: image_type.into(),
                package: TemurinPackage {
                    name: name.into(),
                    link: format!("https://example.com/{name}"),
                    size: 190_000_000,
                    checksum: "ab".repeat(32),
                },
            },
            version: TemurinVersion { major },
        }
    }

    #[test]
    fn temurin_selection_filters_on_all_axes() {
        let releases = vec![
            release(17, "linux", "x64", "jre", "jre.tar.gz"),
            release(17, "windows", "x64", "jdk", "windows.zip"),
            release(16, "linux", "x64", "jdk", "old.tar.gz"),
            release(17, "linux", "s390x", "jdk", "mainframe.tar.gz"),
            release(17, "linux", "x64", "jdk", "right.tar.gz"),
        ];
        let package =
            select_temurin_package(releases, 17, Platform::Linux, Arch::X64).unwrap();
        assert_eq!(package.name, "right.tar.gz");

        assert!(select_temurin_package(vec![], 17, Platform::Linux, Arch::X64).is_none());
    }

    #[test]
    fn extraction_reports_the_installation_root() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("jdk.zip");

        let file = std::fs::File::create(&archive_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer
            .start_file("jdk-17.0.5+8/bin/java", options)
            .unwrap();
        std::io::Write::write_all(&mut writer, b"").unwrap();
        writer.finish().unwrap();

        let root = extract_jdk_archive(&archive_path).unwrap();
        assert_eq!(root, dir.path().join("jdk-17.0.5+8"));
        assert!(root.join("bin/java").is_file());
    }

    #[test]
    fn unknown_archive_formats_are_rejected() {
        let err = extract_jdk_archive(Path::new("/tmp/jdk.rar")).unwrap_err();
        assert!(matches!(err, LauncherError::MalformedArchive(_)));
    }
}
