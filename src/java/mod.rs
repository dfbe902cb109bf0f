//! JVM discovery, validation and provisioning
//!
//! Discoverers produce candidate installation roots, the settings extractor
//! interrogates each candidate, and the filter/rank pipeline picks the best
//! installation satisfying a semantic version range.

pub mod acquire;
pub mod discovery;
pub mod settings;

use std::collections::HashSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use semver::VersionReq;

use crate::config::{Arch, Platform};
use self::discovery::JvmDiscoverer;
use self::settings::HotSpotSettings;

/// A Java runtime version reduced to its semantic triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct JavaVersion {
    /// Feature release (8, 11, 17, 21, ...)
    pub major: u64,
    /// Interim number
    pub minor: u64,
    /// Patch number
    pub patch: u64,
}

impl JavaVersion {
    /// Conversion for range matching
    pub fn to_semver(self) -> semver::Version {
        semver::Version::new(self.major, self.minor, self.patch)
    }
}

impl Display for JavaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Parse a `java.version` property string of either era.
///
/// Legacy strings (`1.8.0_352-b08`) drop their update and build numbers;
/// callers comparing two update releases of the same patch level will see
/// them as equal.
pub fn parse_java_runtime_version(value: &str) -> Option<JavaVersion> {
    if value.starts_with("1.") {
        parse_java_runtime_version_legacy(value)
    } else {
        parse_java_runtime_version_modern(value)
    }
}

/// Parse the legacy `1.M.m_U[-bB]` shape
pub fn parse_java_runtime_version_legacy(value: &str) -> Option<JavaVersion> {
    let mut parts = value.split('.');
    if parts.next()? != "1" {
        return None;
    }
    let major = parts.next()?.parse().ok()?;
    let tail = parts.next()?;
    let minor_digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
    if minor_digits.is_empty() {
        return None;
    }
    Some(JavaVersion {
        major,
        minor: minor_digits.parse().ok()?,
        patch: 0,
    })
}

/// Parse the modern `M.m.p[+b]` shape
pub fn parse_java_runtime_version_modern(value: &str) -> Option<JavaVersion> {
    let numeric = value
        .split(['+', '-'])
        .next()
        .unwrap_or(value);
    let mut parts = numeric.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0,
    };
    let patch = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0,
    };
    Some(JavaVersion {
        major,
        minor,
        patch,
    })
}

/// A validated JVM installation; never mutated after the filter stage
#[derive(Debug, Clone)]
pub struct JvmDetails {
    /// Parsed version triple
    pub semver: JavaVersion,
    /// The raw `java.version` string
    pub semver_str: String,
    /// The `java.vendor` string
    pub vendor: String,
    /// Root directory of the installation (not the executable)
    pub path: PathBuf,
}

/// Sort candidates best-first: descending on the version triple, then
/// preferring paths that look like a JDK over ones that do not.
pub fn rank_applicable_jvms(details: &mut [JvmDetails]) {
    details.sort_by(|a, b| {
        b.semver
            .cmp(&a.semver)
            .then_with(|| {
                let a_jdk = a.path.to_string_lossy().to_lowercase().contains("jdk");
                let b_jdk = b.path.to_string_lossy().to_lowercase().contains("jdk");
                b_jdk.cmp(&a_jdk)
            })
    });
}

/// Decide whether extracted settings describe a usable installation.
///
/// Only 64-bit runtimes are usable, and on ARM64 hosts the runtime must be a
/// native aarch64 build (a Rosetta x64 JVM reports `x86_64` and is rejected).
pub fn filter_settings(
    settings: &HotSpotSettings,
    range: &VersionReq,
    host_arch: Arch,
) -> Option<JavaVersion> {
    if settings.data_model() != "64" {
        return None;
    }
    if host_arch == Arch::Arm64 && settings.get("os.arch") != Some("aarch64") {
        return None;
    }
    let raw_version = settings.get("java.version")?;
    let version = parse_java_runtime_version(raw_version)?;
    if !range.matches(&version.to_semver()) {
        return None;
    }
    Some(version)
}

async fn details_for_root(
    root: &Path,
    range: &VersionReq,
    host_arch: Arch,
) -> Option<JvmDetails> {
    let executable = root.join(Platform::current().java_executable());
    let settings = settings::extract_settings(&executable).await?;
    let version = filter_settings(&settings, range, host_arch)?;
    Some(JvmDetails {
        semver: version,
        semver_str: settings.get("java.version").unwrap_or_default().to_string(),
        vendor: settings.get("java.vendor").unwrap_or_default().to_string(),
        path: root.to_path_buf(),
    })
}

/// Run the full pipeline over a discoverer set and return the best
/// installation satisfying `range`, if any.
pub async fn select_best_jvm(
    discoverers: &[JvmDiscoverer],
    range: &VersionReq,
) -> Option<JvmDetails> {
    let mut roots: HashSet<PathBuf> = HashSet::new();
    for discoverer in discoverers {
        roots.extend(discoverer.discover().await);
    }
    log::debug!("discovered {} candidate JVM roots", roots.len());

    let host_arch = Arch::current();
    let mut applicable = Vec::new();
    for root in roots {
        if let Some(details) = details_for_root(&root, range, host_arch).await {
            log::debug!("applicable JVM: {} at {}", details.semver, root.display());
            applicable.push(details);
        }
    }
    rank_applicable_jvms(&mut applicable);
    applicable.into_iter().next()
}

/// Validate a user-supplied installation root against `range`.
///
/// The same extract/filter pipeline as discovery, run on a singleton.
pub async fn validate_jvm_path(root: &Path, range: &VersionReq) -> Option<JvmDetails> {
    details_for_root(root, range, Arch::current()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn legacy_version_parse() {
        let version = parse_java_runtime_version("1.8.0_352-b08").unwrap();
        assert_eq!(
            version,
            JavaVersion {
                major: 8,
                minor: 0,
                patch: 0
            }
        );
        assert_eq!(version.to_string(), "8.0.0");
        // Update releases of the same patch level compare equal
        assert_eq!(
            parse_java_runtime_version("1.8.0_292").unwrap(),
            parse_java_runtime_version("1.8.0_352").unwrap()
        );
    }

    #[test]
    fn modern_version_parse() {
        let version = parse_java_runtime_version("17.0.5+8").unwrap();
        assert_eq!(
            version,
            JavaVersion {
                major: 17,
                minor: 0,
                patch: 5
            }
        );
        assert_eq!(version.to_string(), "17.0.5");
        assert_eq!(
            parse_java_runtime_version("21").unwrap(),
            JavaVersion {
                major: 21,
                minor: 0,
                patch: 0
            }
        );
        assert_eq!(
            parse_java_runtime_version("11.0.2-ea").unwrap(),
            JavaVersion {
                major: 11,
                minor: 0,
                patch: 2
            }
        );
    }

    #[test]
    fn garbage_versions_do_not_parse() {
        assert!(parse_java_runtime_version("").is_none());
        assert!(parse_java_runtime_version("garbage").is_none());
        assert!(parse_java_runtime_version("1.x.0").is_none());
    }

    fn details(major: u64, minor: u64, patch: u64, path: &str) -> JvmDetails {
        JvmDetails {
            semver: JavaVersion {
                major,
                minor,
                patch,
            },
            semver_str: format!("{major}.{minor}.{patch}"),
            vendor: "Test".into(),
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn ranking_is_descending_with_jdk_tiebreak() {
        let mut candidates = vec![
            details(8, 0, 0, "/opt/jre8"),
            details(17, 0, 4, "/opt/java17"),
            details(17, 0, 5, "/opt/jre-17.0.5"),
            details(17, 0, 5, "/opt/jdk-17.0.5"),
        ];
        rank_applicable_jvms(&mut candidates);
        let paths: Vec<_> = candidates
            .iter()
            .map(|d| d.path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            paths,
            vec![
                "/opt/jdk-17.0.5",
                "/opt/jre-17.0.5",
                "/opt/java17",
                "/opt/jre8"
            ]
        );
    }

    #[test]
    fn filter_rejects_32_bit_runtimes() {
        let range = VersionReq::parse(">=8").unwrap();
        let mut settings = HotSpotSettings::default();
        settings.insert("sun.arch.data.model", "32");
        settings.insert("java.version", "17.0.5");
        assert!(filter_settings(&settings, &range, Arch::X64).is_none());

        settings.insert("sun.arch.data.model", "64");
        assert!(filter_settings(&settings, &range, Arch::X64).is_some());
    }

    #[test]
    fn filter_rejects_rosetta_on_arm64_hosts() {
        let range = VersionReq::parse(">=17").unwrap();
        let mut settings = HotSpotSettings::default();
        settings.insert("sun.arch.data.model", "64");
        settings.insert("java.version", "17.0.5");
        settings.insert("os.arch", "x86_64");
        assert!(filter_settings(&settings, &range, Arch::Arm64).is_none());
        assert!(filter_settings(&settings, &range, Arch::X64).is_some());

        settings.insert("os.arch", "aarch64");
        assert!(filter_settings(&settings, &range, Arch::Arm64).is_some());
    }

    #[test]
    fn filter_enforces_the_version_range() {
        let range = VersionReq::parse(">=17, <18").unwrap();
        let mut settings = HotSpotSettings::default();
        settings.insert("sun.arch.data.model", "64");
        settings.insert("java.version", "1.8.0_352");
        assert!(filter_settings(&settings, &range, Arch::X64).is_none());

        settings.insert("java.version", "17.0.5+8");
        assert_eq!(
            filter_settings(&settings, &range, Arch::X64).unwrap(),
            JavaVersion {
                major: 17,
                minor: 0,
                patch: 5
            }
        );
    }
}
