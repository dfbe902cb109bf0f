//! Distribution index: raw document model and the typed on-disk overlay
//!
//! The raw types mirror the remote JSON document field for field. The
//! resolved types add what the document cannot know: where every module
//! lives on this machine.

pub mod api;
pub mod maven;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LauncherError, Result};
pub use api::DistributionApi;
pub use maven::MavenCoordinate;

/// Root distribution document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    /// News feed URL
    #[serde(default)]
    pub rss: Option<String>,
    /// Community Discord settings
    #[serde(default)]
    pub discord: Option<serde_json::Value>,
    /// Document schema version
    pub version: String,
    /// Declared servers
    pub servers: Vec<Server>,
}

/// A server definition inside the distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// Stable identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Long description
    #[serde(default)]
    pub description: Option<String>,
    /// Icon URL
    #[serde(default)]
    pub icon: Option<String>,
    /// Game version this server runs
    #[serde(rename = "minecraftVersion")]
    pub minecraft_version: String,
    /// Whether this is the default server of the distribution
    #[serde(rename = "mainServer", default)]
    pub main_server: bool,
    /// Whether clients should connect automatically after launch
    #[serde(default)]
    pub autoconnect: bool,
    /// Java constraints suggested by the distribution
    #[serde(rename = "javaOptions", default)]
    pub java_options: Option<JavaOptions>,
    /// Module tree
    pub modules: Vec<Module>,
}

/// Java constraints a server may declare
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaOptions {
    /// Supported semantic range, e.g. `>=17 <18`
    #[serde(default)]
    pub supported: Option<String>,
    /// Suggested major version when no range matches
    #[serde(rename = "suggestedMajor", default)]
    pub suggested_major: Option<u64>,
}

/// Module categories a distribution may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleType {
    /// Forge loader distributed with its installer profile embedded
    ForgeHosted,
    /// Forge loader
    Forge,
    /// Fabric loader
    Fabric,
    /// LiteLoader
    LiteLoader,
    /// Plain library jar
    Library,
    /// Forge mod jar
    ForgeMod,
    /// Fabric mod jar
    FabricMod,
    /// LiteLoader mod file
    LiteMod,
    /// Arbitrary instance file
    File,
    /// Standalone mod-loader version manifest
    VersionManifest,
}

impl ModuleType {
    /// Whether this module provides the server's mod loader
    pub fn is_mod_loader(&self) -> bool {
        matches!(
            self,
            ModuleType::ForgeHosted | ModuleType::Forge | ModuleType::Fabric
        )
    }
}

/// A module in the tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Either a maven coordinate or (for version manifests and files) a
    /// plain identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    /// Whether the module must be present; optional modules may be toggled
    #[serde(default = "default_required")]
    pub required: bool,
    /// Download artifact
    pub artifact: Artifact,
    /// Nested modules
    #[serde(rename = "subModules", default)]
    pub sub_modules: Vec<Module>,
}

fn default_required() -> bool {
    true
}

/// Artifact descriptor of a module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Expected size in bytes
    pub size: u64,
    /// Expected MD5 digest
    #[serde(rename = "MD5")]
    pub md5: String,
    /// Source URL
    pub url: String,
    /// Optional explicit path relative to the module's base directory
    #[serde(default)]
    pub path: Option<String>,
}

/// A distribution with every module resolved to an absolute path
#[derive(Debug, Clone)]
pub struct ResolvedDistribution {
    /// The raw document
    pub raw: Distribution,
    /// Servers with resolved module trees
    pub servers: Vec<ResolvedServer>,
}

/// A server with its module tree resolved
#[derive(Debug, Clone)]
pub struct ResolvedServer {
    /// The raw server definition
    pub raw: Server,
    /// Resolved module tree
    pub modules: Vec<ResolvedModule>,
}

/// A module pinned to a concrete on-disk location
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    /// The raw module definition
    pub raw: Module,
    /// Absolute path the artifact belongs at
    pub path: PathBuf,
    /// Maven components when the id parses as a coordinate
    pub maven: Option<MavenCoordinate>,
    /// Resolved nested modules
    pub sub_modules: Vec<ResolvedModule>,
}

impl ResolvedDistribution {
    /// Resolve every server of `raw` against the given base directories
    pub fn resolve(raw: Distribution, common_dir: &Path, instance_dir: &Path) -> Result<Self> {
        let servers = raw
            .servers
            .iter()
            .map(|server| ResolvedServer::resolve(server.clone(), common_dir, instance_dir))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { raw, servers })
    }

    /// The server flagged `mainServer`, or the first server as a fallback
    pub fn main_server(&self) -> Option<&ResolvedServer> {
        self.servers
            .iter()
            .find(|server| server.raw.main_server)
            .or_else(|| self.servers.first())
    }

    /// Look a server up by id
    pub fn server(&self, id: &str) -> Option<&ResolvedServer> {
        self.servers.iter().find(|server| server.raw.id == id)
    }
}

impl ResolvedServer {
    fn resolve(raw: Server, common_dir: &Path, instance_dir: &Path) -> Result<Self> {
        let server_instance_dir = instance_dir.join(&raw.id);
        let modules = raw
            .modules
            .iter()
            .map(|module| ResolvedModule::resolve(module.clone(), common_dir, &server_instance_dir))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { raw, modules })
    }

    /// The server's mod-loader module; distributions declare at most one
    pub fn mod_loader(&self) -> Option<&ResolvedModule> {
        self.modules
            .iter()
            .find(|module| module.raw.module_type.is_mod_loader())
    }

    /// The version-manifest sub-module of the mod loader, when present
    pub fn version_manifest(&self) -> Option<&ResolvedModule> {
        self.mod_loader()?
            .sub_modules
            .iter()
            .find(|module| module.raw.module_type == ModuleType::VersionManifest)
    }

    /// Depth-first walk over the whole module tree
    pub fn walk_modules(&self) -> Vec<&ResolvedModule> {
        fn visit<'a>(module: &'a ResolvedModule, into: &mut Vec<&'a ResolvedModule>) {
            into.push(module);
            for sub in &module.sub_modules {
                visit(sub, into);
            }
        }
        let mut all = Vec::new();
        for module in &self.modules {
            visit(module, &mut all);
        }
        all
    }
}

impl ResolvedModule {
    fn resolve(raw: Module, common_dir: &Path, server_instance_dir: &Path) -> Result<Self> {
        let maven = MavenCoordinate::parse(&raw.id).ok();
        let path = Self::resolve_path(&raw, maven.as_ref(), common_dir, server_instance_dir)?;
        let sub_modules = raw
            .sub_modules
            .iter()
            .map(|module| Self::resolve(module.clone(), common_dir, server_instance_dir))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            raw,
            path,
            maven,
            sub_modules,
        })
    }

    /// Compute the on-disk location of a module.
    ///
    /// An explicit `artifact.path` wins; otherwise the id must parse as a
    /// maven coordinate and is laid out repository-style under the module
    /// type's base directory.
    fn resolve_path(
        raw: &Module,
        maven: Option<&MavenCoordinate>,
        common_dir: &Path,
        server_instance_dir: &Path,
    ) -> Result<PathBuf> {
        let base = match raw.module_type {
            ModuleType::Library
            | ModuleType::ForgeHosted
            | ModuleType::Forge
            | ModuleType::Fabric
            | ModuleType::LiteLoader => common_dir.join("libraries"),
            ModuleType::ForgeMod | ModuleType::FabricMod | ModuleType::LiteMod => {
                common_dir.join("modstore")
            }
            ModuleType::File => server_instance_dir.to_path_buf(),
            ModuleType::VersionManifest => {
                // Version manifests have a fixed well-known layout
                return Ok(common_dir
                    .join("versions")
                    .join(&raw.id)
                    .join(format!("{}.json", raw.id)));
            }
        };

        if let Some(path) = &raw.artifact.path {
            return Ok(base.join(path));
        }
        match maven {
            Some(coordinate) => Ok(base.join(coordinate.to_repo_path())),
            None => Err(LauncherError::unparseable_version(format!(
                "module {} has neither an artifact path nor a maven id",
                raw.id
            ))),
        }
    }
}
