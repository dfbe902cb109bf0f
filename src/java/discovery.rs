//! JVM installation discovery
//!
//! A discoverer is one strategy for producing candidate installation roots;
//! platform selection builds a flat list of them rather than a hierarchy.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::Platform;

/// Environment variables conventionally pointing at a Java installation
const JAVA_ENV_VARS: [&str; 3] = ["JAVA_HOME", "JRE_HOME", "JDK_HOME"];

/// One strategy for discovering JVM installation roots
#[derive(Debug, Clone)]
pub enum JvmDiscoverer {
    /// Read well-known environment variables
    Environment,
    /// Scan the direct children of seed directories
    Directory {
        /// Directories whose children are candidate roots
        roots: Vec<PathBuf>,
    },
    /// Probe fixed paths directly
    Path {
        /// Candidate roots taken as-is
        candidates: Vec<PathBuf>,
    },
    /// Walk the JavaSoft registry keys (Windows only)
    #[cfg(windows)]
    Registry,
}

impl JvmDiscoverer {
    /// Produce the set of installation roots this strategy can see
    pub async fn discover(&self) -> HashSet<PathBuf> {
        match self {
            JvmDiscoverer::Environment => discover_environment(),
            JvmDiscoverer::Directory { roots } => discover_directories(roots).await,
            JvmDiscoverer::Path { candidates } => discover_paths(candidates),
            #[cfg(windows)]
            JvmDiscoverer::Registry => registry::discover().await,
        }
    }
}

/// Normalize an environment-variable value down to an installation root.
///
/// macOS values often point at `<root>/Contents/Home`, other platforms at
/// `<root>/bin/java`; both are stripped back to the root.
fn normalize_env_root(value: &Path) -> PathBuf {
    let mut root = value.to_path_buf();
    if root.ends_with("Contents/Home") {
        root.pop();
        root.pop();
    } else if root.ends_with("bin/java") || root.ends_with("bin/java.exe") {
        root.pop();
        root.pop();
    }
    root
}

fn discover_environment() -> HashSet<PathBuf> {
    let mut roots = HashSet::new();
    for var in JAVA_ENV_VARS {
        let Some(value) = std::env::var_os(var) else {
            continue;
        };
        let root = normalize_env_root(Path::new(&value));
        if root.is_dir() {
            log::debug!("{var} -> {}", root.display());
            roots.insert(root);
        }
    }
    roots
}

/// Whether a directory looks like an installation root on this platform
fn has_java_executable(root: &Path) -> bool {
    root.join(Platform::current().java_executable()).is_file()
}

async fn discover_directories(seeds: &[PathBuf]) -> HashSet<PathBuf> {
    let mut roots = HashSet::new();
    for seed in seeds {
        let Ok(mut entries) = tokio::fs::read_dir(seed).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() && has_java_executable(&path) {
                roots.insert(path);
            }
        }
    }
    roots
}

fn discover_paths(candidates: &[PathBuf]) -> HashSet<PathBuf> {
    candidates
        .iter()
        .filter(|candidate| has_java_executable(candidate))
        .cloned()
        .collect()
}

/// The discoverer set for the current platform.
///
/// `runtime_dir` is where the launcher extracts runtimes it downloaded
/// itself; it is scanned on every platform.
pub fn platform_discoverers(runtime_dir: &Path) -> Vec<JvmDiscoverer> {
    match Platform::current() {
        Platform::Windows => windows_discoverers(runtime_dir),
        Platform::MacOs => vec![
            JvmDiscoverer::Environment,
            JvmDiscoverer::Directory {
                roots: vec![
                    PathBuf::from("/Library/Java/JavaVirtualMachines"),
                    runtime_dir.to_path_buf(),
                ],
            },
            JvmDiscoverer::Path {
                candidates: vec![PathBuf::from(
                    "/Library/Internet Plug-Ins/JavaAppletPlugin.plugin",
                )],
            },
        ],
        Platform::Linux => vec![
            JvmDiscoverer::Environment,
            JvmDiscoverer::Directory {
                roots: vec![PathBuf::from("/usr/lib/jvm"), runtime_dir.to_path_buf()],
            },
        ],
    }
}

/// Vendor directories probed under `Program Files` on every drive
const WINDOWS_VENDOR_DIRS: [&str; 5] = [
    "Program Files\\Java",
    "Program Files\\Eclipse Adoptium",
    "Program Files\\Eclipse Foundation",
    "Program Files\\AdoptOpenJDK",
    "Program Files\\Amazon Corretto",
];

/// Enumerate mounted filesystem drive roots (`C:\`, `D:\`, ...)
fn enumerate_drive_roots() -> Vec<PathBuf> {
    ('A'..='Z')
        .map(|letter| PathBuf::from(format!("{letter}:\\")))
        .filter(|root| root.is_dir())
        .collect()
}

fn windows_discoverers(runtime_dir: &Path) -> Vec<JvmDiscoverer> {
    let mut roots: Vec<PathBuf> = Vec::new();
    for drive in enumerate_drive_roots() {
        for vendor in WINDOWS_VENDOR_DIRS {
            roots.push(drive.join(vendor));
        }
    }
    roots.push(runtime_dir.to_path_buf());

    let mut discoverers = Vec::new();
    discoverers.push(JvmDiscoverer::Environment);
    discoverers.push(JvmDiscoverer::Directory { roots });
    #[cfg(windows)]
    discoverers.push(JvmDiscoverer::Registry);
    discoverers
}

#[cfg(windows)]
mod registry {
    //! JavaSoft registry traversal, 64-bit view only

    use std::collections::HashSet;
    use std::path::PathBuf;

    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_READ, KEY_WOW64_64KEY};
    use winreg::RegKey;

    const JAVASOFT_KEYS: [&str; 4] = [
        "SOFTWARE\\JavaSoft\\Java Runtime Environment",
        "SOFTWARE\\JavaSoft\\Java Development Kit",
        "SOFTWARE\\JavaSoft\\JRE",
        "SOFTWARE\\JavaSoft\\JDK",
    ];

    /// Whether a subkey name identifies a Java version.
    ///
    /// Versioned subkeys are either full version strings (`1.8.0_351`,
    /// `17.0.5`) or abbreviated majors (`1.8` meaning 8, `17` meaning 17).
    fn is_version_key(name: &str) -> bool {
        let mut parts = name.split(['.', '_']);
        let Some(first) = parts.next().and_then(|p| p.parse::<u64>().ok()) else {
            return false;
        };
        if first >= 2 {
            return true;
        }
        first == 1 && parts.next().map_or(false, |p| p.parse::<u64>().is_ok())
    }

    pub(super) async fn discover() -> HashSet<PathBuf> {
        // The registry API is synchronous; each leaf read is quick enough to
        // run inline on the worker thread.
        tokio::task::spawn_blocking(|| {
            let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
            let mut roots = HashSet::new();
            for key_path in JAVASOFT_KEYS {
                let Ok(key) = hklm.open_subkey_with_flags(key_path, KEY_READ | KEY_WOW64_64KEY)
                else {
                    continue;
                };
                for subkey_name in key.enum_keys().flatten() {
                    if !is_version_key(&subkey_name) {
                        continue;
                    }
                    let Ok(subkey) =
                        key.open_subkey_with_flags(&subkey_name, KEY_READ | KEY_WOW64_64KEY)
                    else {
                        continue;
                    };
                    let Ok(home) = subkey.get_value::<String, _>("JavaHome") else {
                        continue;
                    };
                    if home.contains("(x86)") {
                        continue;
                    }
                    roots.insert(PathBuf::from(home));
                }
            }
            roots
        })
        .await
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn env_roots_are_normalized() {
        assert_eq!(
            normalize_env_root(Path::new("/opt/jdk-17/bin/java")),
            PathBuf::from("/opt/jdk-17")
        );
        assert_eq!(
            normalize_env_root(Path::new(
                "/Library/Java/JavaVirtualMachines/temurin-17.jdk/Contents/Home"
            )),
            PathBuf::from("/Library/Java/JavaVirtualMachines/temurin-17.jdk")
        );
        assert_eq!(
            normalize_env_root(Path::new("/opt/jdk-17")),
            PathBuf::from("/opt/jdk-17")
        );
    }

    #[tokio::test]
    async fn directory_discoverer_requires_the_executable() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("jdk-17.0.5");
        let bad = dir.path().join("not-a-jvm");
        let exe = good.join(Platform::current().java_executable());
        tokio::fs::create_dir_all(exe.parent().unwrap()).await.unwrap();
        tokio::fs::write(&exe, b"").await.unwrap();
        tokio::fs::create_dir_all(&bad).await.unwrap();

        let discoverer = JvmDiscoverer::Directory {
            roots: vec![dir.path().to_path_buf()],
        };
        let found = discoverer.discover().await;
        assert!(found.contains(&good));
        assert!(!found.contains(&bad));
    }

    #[tokio::test]
    async fn path_discoverer_takes_seeds_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("plugin-jvm");
        let exe = root.join(Platform::current().java_executable());
        tokio::fs::create_dir_all(exe.parent().unwrap()).await.unwrap();
        tokio::fs::write(&exe, b"").await.unwrap();

        let discoverer = JvmDiscoverer::Path {
            candidates: vec![root.clone(), dir.path().join("missing")],
        };
        let found = discoverer.discover().await;
        assert_eq!(found.len(), 1);
        assert!(found.contains(&root));
    }
}
