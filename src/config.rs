//! Configuration types and host platform dispatch

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Directory layout and remote endpoints the core operates against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Launcher state directory (distribution cache lives here)
    pub launcher_dir: PathBuf,
    /// Directory shared between server instances (libraries, versions, modstore)
    pub common_dir: PathBuf,
    /// Directory holding per-server instance files
    pub instance_dir: PathBuf,
    /// Directory for downloaded runtimes and other large payloads
    pub data_dir: PathBuf,
    /// URL of the remote distribution index
    pub distribution_url: String,
    /// When set, only the local dev distribution is consulted
    pub dev_mode: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".launchercore");
        Self {
            launcher_dir: base.clone(),
            common_dir: base.join("common"),
            instance_dir: base.join("instances"),
            data_dir: base,
            distribution_url: String::new(),
            dev_mode: false,
        }
    }
}

impl CoreConfig {
    /// Create a configuration rooted at the given launcher directory
    pub fn new(launcher_dir: PathBuf) -> Self {
        Self {
            common_dir: launcher_dir.join("common"),
            instance_dir: launcher_dir.join("instances"),
            data_dir: launcher_dir.clone(),
            launcher_dir,
            ..Default::default()
        }
    }

    /// Set the distribution index URL
    pub fn with_distribution_url<S: Into<String>>(mut self, url: S) -> Self {
        self.distribution_url = url.into();
        self
    }

    /// Set the common directory
    pub fn with_common_dir(mut self, dir: PathBuf) -> Self {
        self.common_dir = dir;
        self
    }

    /// Set the instance directory
    pub fn with_instance_dir(mut self, dir: PathBuf) -> Self {
        self.instance_dir = dir;
        self
    }

    /// Set the data directory
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = dir;
        self
    }

    /// Enable or disable dev mode
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Path of the cached distribution document
    pub fn distribution_cache_path(&self) -> PathBuf {
        self.launcher_dir.join("distribution.json")
    }

    /// Path of the dev-mode distribution document
    pub fn distribution_dev_path(&self) -> PathBuf {
        self.launcher_dir.join("distribution_dev.json")
    }

    /// Directory where downloaded JDK archives are placed for the host arch
    pub fn runtime_dir(&self) -> PathBuf {
        self.data_dir.join("runtime").join(Arch::current().as_str())
    }
}

/// Host operating systems the core dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Windows
    Windows,
    /// macOS
    MacOs,
    /// Linux and other unixes
    Linux,
}

impl Platform {
    /// The platform this process is running on
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Relative path from a JVM installation root to its Java executable
    pub fn java_executable(&self) -> &'static str {
        match self {
            Platform::Windows => "bin/javaw.exe",
            Platform::MacOs => "Contents/Home/bin/java",
            Platform::Linux => "bin/java",
        }
    }
}

/// Host CPU architectures the core dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arch {
    /// x86-64
    X64,
    /// 64-bit ARM
    Arm64,
}

impl Arch {
    /// The architecture this process is running on
    pub fn current() -> Self {
        if cfg!(target_arch = "aarch64") {
            Arch::Arm64
        } else {
            Arch::X64
        }
    }

    /// Canonical name used in runtime directory paths and download URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::Arm64 => "aarch64",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_paths_derive_from_launcher_dir() {
        let config = CoreConfig::new(PathBuf::from("/tmp/launcher"));
        assert_eq!(
            config.distribution_cache_path(),
            PathBuf::from("/tmp/launcher/distribution.json")
        );
        assert_eq!(
            config.distribution_dev_path(),
            PathBuf::from("/tmp/launcher/distribution_dev.json")
        );
        assert!(config.runtime_dir().starts_with("/tmp/launcher/runtime"));
    }

    #[test]
    fn java_executable_is_platform_relative() {
        assert_eq!(Platform::Linux.java_executable(), "bin/java");
        assert_eq!(Platform::Windows.java_executable(), "bin/javaw.exe");
        assert_eq!(Platform::MacOs.java_executable(), "Contents/Home/bin/java");
    }
}
