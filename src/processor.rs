//! Index processors: pluggable validation stages producing repair work
//!
//! Each processor validates one category of files and reports the assets
//! that are missing or corrupt. After the download engine has run, each
//! processor gets a post-download hook for follow-up work; the distribution
//! processor uses it to materialize the mod-loader version manifest.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::archive;
use crate::asset::{validate_local_file, Asset, HashAlgorithm};
use crate::distribution::{ModuleType, ResolvedDistribution, ResolvedServer};
use crate::error::{LauncherError, Result};

/// Category key the distribution processor files its findings under
pub const DISTRIBUTION_CATEGORY: &str = "distribution";

/// The newest Forge version still built with ForgeGradle 2
const LAST_FG2_VERSION: &str = "14.23.5.2847";

/// A validation stage over one category of files
#[async_trait]
pub trait IndexProcessor: Send + Sync {
    /// Prepare the processor (fetch indexes, create directories)
    async fn init(&mut self) -> Result<()>;

    /// Validate the category and return missing/corrupt assets per
    /// category key
    async fn validate(&mut self, server_id: &str) -> Result<HashMap<String, Vec<Asset>>>;

    /// Follow-up work after every reported asset has been downloaded
    async fn post_download(&mut self, server_id: &str) -> Result<()>;
}

/// Compare dotted numeric version strings component-wise
fn version_components(value: &str) -> Vec<u64> {
    value
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

/// Whether `actual` is at least `required`, comparing dotted components
pub fn mc_version_at_least(required: &str, actual: &str) -> bool {
    version_components(actual) >= version_components(required)
}

/// Whether a Forge build uses ForgeGradle 3 packaging.
///
/// Everything from 1.13 on is FG3; on 1.12.2 the cutover happened after
/// build 14.23.5.2847, whose successors ship a standalone version manifest
/// instead of embedding one in the jar.
pub fn uses_forge_gradle3(mc_version: &str, forge_version: &str) -> bool {
    if mc_version_at_least("1.13", mc_version) {
        return true;
    }
    // Forge versions are prefixed with the game version, e.g.
    // 1.12.2-14.23.5.2860
    let component = forge_version
        .split('-')
        .nth(1)
        .unwrap_or(forge_version);
    version_components(component) > version_components(LAST_FG2_VERSION)
}

/// Validates a server's module tree against the distribution index
pub struct DistributionProcessor {
    distribution: ResolvedDistribution,
    common_dir: PathBuf,
}

impl DistributionProcessor {
    /// Create a processor over a resolved distribution
    pub fn new(distribution: ResolvedDistribution, common_dir: PathBuf) -> Self {
        Self {
            distribution,
            common_dir,
        }
    }

    fn server(&self, server_id: &str) -> Result<&ResolvedServer> {
        self.distribution
            .server(server_id)
            .ok_or_else(|| LauncherError::UnknownServerId(server_id.to_string()))
    }

    /// Materialize the server's mod-loader version manifest and return it.
    ///
    /// Fabric and FG3 Forge ship the manifest as its own downloaded module;
    /// FG2 Forge embeds it in the loader jar, from where it is persisted to
    /// the shared versions directory.
    pub async fn load_version_manifest(&self, server_id: &str) -> Result<serde_json::Value> {
        let server = self.server(server_id)?;
        let loader = server
            .mod_loader()
            .ok_or_else(|| LauncherError::NoModLoader(server_id.to_string()))?;

        let loader_version = loader
            .maven
            .as_ref()
            .map(|maven| maven.version.clone())
            .unwrap_or_else(|| loader.raw.id.clone());
        let standalone = loader.raw.module_type == ModuleType::Fabric
            || uses_forge_gradle3(&server.raw.minecraft_version, &loader_version);

        if standalone {
            let manifest = server.version_manifest().ok_or_else(|| {
                LauncherError::missing_file(format!(
                    "version manifest module of server {server_id}"
                ))
            })?;
            let bytes = tokio::fs::read(&manifest.path)
                .await
                .map_err(|_| LauncherError::missing_file(manifest.path.display().to_string()))?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        // FG2: the manifest lives inside the loader jar
        let bytes = archive::read_zip_entry(&loader.path, "version.json")?;
        let manifest: serde_json::Value = serde_json::from_slice(&bytes)?;
        let version_id = manifest
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| {
                LauncherError::unparseable_version("embedded version.json carries no id")
            })?;

        let manifest_path = self
            .common_dir
            .join("versions")
            .join(version_id)
            .join(format!("{version_id}.json"));
        if let Some(parent) = manifest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&manifest_path, &bytes).await?;
        log::info!("materialized {version_id} manifest from the loader jar");

        Ok(manifest)
    }
}

#[async_trait]
impl IndexProcessor for DistributionProcessor {
    async fn init(&mut self) -> Result<()> {
        tokio::fs::create_dir_all(self.common_dir.join("versions")).await?;
        Ok(())
    }

    async fn validate(&mut self, server_id: &str) -> Result<HashMap<String, Vec<Asset>>> {
        let server = self.server(server_id)?;

        let mut invalid = Vec::new();
        for module in server.walk_modules() {
            let asset = Asset::new(
                &module.raw.id,
                &module.raw.artifact.url,
                module.raw.artifact.size,
                module.raw.artifact.md5.to_lowercase(),
                HashAlgorithm::Md5,
                module.path.clone(),
            );
            if !validate_local_file(&asset).await? {
                log::debug!("invalid module file: {}", module.path.display());
                invalid.push(asset);
            }
        }
        log::info!(
            "{server_id}: {} of {} module files need repair",
            invalid.len(),
            server.walk_modules().len()
        );

        let mut categories = HashMap::new();
        categories.insert(DISTRIBUTION_CATEGORY.to_string(), invalid);
        Ok(categories)
    }

    async fn post_download(&mut self, server_id: &str) -> Result<()> {
        // Only servers with a mod loader have a manifest to materialize
        if self.server(server_id)?.mod_loader().is_none() {
            return Ok(());
        }
        self.load_version_manifest(server_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use md5::{Digest, Md5};
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::Path;

    fn md5_hex(data: &[u8]) -> String {
        hex::encode(Md5::digest(data))
    }

    #[test]
    fn mc_version_comparison() {
        assert!(mc_version_at_least("1.13", "1.13"));
        assert!(mc_version_at_least("1.13", "1.20.4"));
        assert!(!mc_version_at_least("1.13", "1.12.2"));
        assert!(mc_version_at_least("1.12.2", "1.12.2"));
    }

    #[test]
    fn forge_gradle3_boundary() {
        assert!(!uses_forge_gradle3("1.12.2", "1.12.2-14.23.5.2847"));
        assert!(uses_forge_gradle3("1.12.2", "1.12.2-14.23.5.2848"));
        assert!(uses_forge_gradle3("1.13", "1.13-25.0.9"));
        assert!(uses_forge_gradle3("1.20.1", "1.20.1-47.2.0"));
    }

    fn distribution_json(
        forge_md5: &str,
        forge_size: u64,
        mod_md5: &str,
        mod_size: u64,
    ) -> serde_json::Value {
        serde_json::json!({
            "version": "1.0.0",
            "servers": [{
                "id": "test-1.12.2",
                "name": "Test",
                "minecraftVersion": "1.12.2",
                "mainServer": true,
                "modules": [
                    {
                        "id": "net.minecraftforge:forge:1.12.2-14.23.5.2847",
                        "name": "Forge",
                        "type": "ForgeHosted",
                        "artifact": {
                            "size": forge_size,
                            "MD5": forge_md5,
                            "url": "http://files.invalid/forge.jar"
                        }
                    },
                    {
                        "id": "com.example:somemod:1.0.0",
                        "name": "Some Mod",
                        "type": "ForgeMod",
                        "artifact": {
                            "size": mod_size,
                            "MD5": mod_md5,
                            "url": "http://files.invalid/somemod.jar"
                        }
                    }
                ]
            }]
        })
    }

    fn forge_jar_bytes(version_id: &str) -> Vec<u8> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("version.json", options).unwrap();
        writer
            .write_all(
                serde_json::json!({
                    "id": version_id,
                    "mainClass": "net.minecraft.launchwrapper.Launch"
                })
                .to_string()
                .as_bytes(),
            )
            .unwrap();
        writer.finish().unwrap();
        buffer.into_inner()
    }

    async fn processor_for(
        dir: &Path,
        document: serde_json::Value,
    ) -> DistributionProcessor {
        let raw: Distribution = serde_json::from_value(document).unwrap();
        let resolved =
            ResolvedDistribution::resolve(raw, &dir.join("common"), &dir.join("instances"))
                .unwrap();
        DistributionProcessor::new(resolved, dir.join("common"))
    }

    #[tokio::test]
    async fn validation_reports_only_broken_modules_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let jar = forge_jar_bytes("1.12.2-forge-14.23.5.2847");
        let mod_bytes = b"mod contents".to_vec();

        let mut processor = processor_for(
            dir.path(),
            distribution_json(
                &md5_hex(&jar),
                jar.len() as u64,
                &md5_hex(&mod_bytes),
                mod_bytes.len() as u64,
            ),
        )
        .await;
        processor.init().await.unwrap();

        // Nothing on disk yet: both modules are reported
        let report = processor.validate("test-1.12.2").await.unwrap();
        let invalid = &report[DISTRIBUTION_CATEGORY];
        assert_eq!(invalid.len(), 2);

        // "Download" them exactly as reported
        for asset in invalid {
            tokio::fs::create_dir_all(asset.path.parent().unwrap())
                .await
                .unwrap();
            let bytes = if asset.id.contains("forge") {
                jar.clone()
            } else {
                mod_bytes.clone()
            };
            tokio::fs::write(&asset.path, bytes).await.unwrap();
        }

        // A second validation pass finds nothing left to repair
        let report = processor.validate("test-1.12.2").await.unwrap();
        assert!(report[DISTRIBUTION_CATEGORY].is_empty());
    }

    #[tokio::test]
    async fn corrupt_module_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mod_bytes = b"mod contents".to_vec();
        let mut processor = processor_for(
            dir.path(),
            distribution_json("00", 1, &md5_hex(&mod_bytes), mod_bytes.len() as u64),
        )
        .await;

        // Right size, wrong bytes
        let report = processor.validate("test-1.12.2").await.unwrap();
        let somemod = report[DISTRIBUTION_CATEGORY]
            .iter()
            .find(|a| a.id.contains("somemod"))
            .unwrap();
        tokio::fs::create_dir_all(somemod.path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&somemod.path, b"mod CONTENTS").await.unwrap();

        let report = processor.validate("test-1.12.2").await.unwrap();
        assert!(report[DISTRIBUTION_CATEGORY]
            .iter()
            .any(|a| a.id.contains("somemod")));
    }

    #[tokio::test]
    async fn unknown_server_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut processor =
            processor_for(dir.path(), distribution_json("00", 1, "00", 1)).await;
        let err = processor.validate("nope").await.unwrap_err();
        assert!(matches!(err, LauncherError::UnknownServerId(_)));
    }

    #[tokio::test]
    async fn fg2_manifest_is_read_from_the_jar_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let jar = forge_jar_bytes("1.12.2-forge-14.23.5.2847");
        let processor = processor_for(
            dir.path(),
            distribution_json(&md5_hex(&jar), jar.len() as u64, "00", 1),
        )
        .await;

        // Place the loader jar where the overlay resolved it
        let loader_path = processor.distribution.servers[0].mod_loader().unwrap().path.clone();
        tokio::fs::create_dir_all(loader_path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&loader_path, &jar).await.unwrap();

        let manifest = processor.load_version_manifest("test-1.12.2").await.unwrap();
        assert_eq!(manifest["id"], "1.12.2-forge-14.23.5.2847");
        let persisted = dir
            .path()
            .join("common/versions/1.12.2-forge-14.23.5.2847/1.12.2-forge-14.23.5.2847.json");
        assert!(persisted.is_file());
    }

    #[tokio::test]
    async fn fabric_manifest_is_read_from_its_module_file() {
        let dir = tempfile::tempdir().unwrap();
        let document = serde_json::json!({
            "version": "1.0.0",
            "servers": [{
                "id": "fabric-1.20.1",
                "name": "Fabric",
                "minecraftVersion": "1.20.1",
                "modules": [{
                    "id": "net.fabricmc:fabric-loader:0.15.7",
                    "name": "Fabric Loader",
                    "type": "Fabric",
                    "artifact": { "size": 1, "MD5": "00", "url": "http://files.invalid/loader.jar" },
                    "subModules": [{
                        "id": "fabric-loader-0.15.7-1.20.1",
                        "name": "Manifest",
                        "type": "VersionManifest",
                        "artifact": { "size": 1, "MD5": "00", "url": "http://files.invalid/manifest.json" }
                    }]
                }]
            }]
        });
        let processor = processor_for(dir.path(), document).await;

        let manifest_path = processor.distribution.servers[0]
            .version_manifest()
            .unwrap()
            .path
            .clone();
        tokio::fs::create_dir_all(manifest_path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(
            &manifest_path,
            serde_json::json!({ "id": "fabric-loader-0.15.7-1.20.1" }).to_string(),
        )
        .await
        .unwrap();

        let manifest = processor
            .load_version_manifest("fabric-1.20.1")
            .await
            .unwrap();
        assert_eq!(manifest["id"], "fabric-loader-0.15.7-1.20.1");
    }

    #[tokio::test]
    async fn server_without_loader_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let document = serde_json::json!({
            "version": "1.0.0",
            "servers": [{
                "id": "vanilla-1.20.1",
                "name": "Vanilla",
                "minecraftVersion": "1.20.1",
                "modules": []
            }]
        });
        let processor = processor_for(dir.path(), document).await;
        let err = processor
            .load_version_manifest("vanilla-1.20.1")
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::NoModLoader(_)));
    }
}
