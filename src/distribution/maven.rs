//! Maven coordinate parsing and repository path rendering

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::{LauncherError, Result};

/// A parsed Maven coordinate: `group:artifact:version[:classifier][@extension]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MavenCoordinate {
    /// Group id, dot-separated
    pub group: String,
    /// Artifact id
    pub artifact: String,
    /// Version string
    pub version: String,
    /// Optional classifier
    pub classifier: Option<String>,
    /// File extension; `jar` unless overridden with `@`
    pub extension: String,
}

impl MavenCoordinate {
    /// Parse a coordinate string.
    ///
    /// Fails with [`LauncherError::UnparseableVersion`] when the string does
    /// not carry at least group, artifact and version.
    pub fn parse(id: &str) -> Result<Self> {
        let (coords, extension) = match id.split_once('@') {
            Some((coords, ext)) if !ext.is_empty() => (coords, ext.to_string()),
            _ => (id, "jar".to_string()),
        };

        let mut parts = coords.split(':');
        let group = parts.next().unwrap_or_default();
        let artifact = parts.next();
        let version = parts.next();
        let classifier = parts.next().map(str::to_string);

        match (artifact, version) {
            (Some(artifact), Some(version)) if !group.is_empty() => Ok(Self {
                group: group.to_string(),
                artifact: artifact.to_string(),
                version: version.to_string(),
                classifier,
                extension,
            }),
            _ => Err(LauncherError::unparseable_version(format!(
                "{id} is not a maven coordinate"
            ))),
        }
    }

    /// Render the repository-relative path of this artifact
    pub fn to_repo_path(&self) -> String {
        let mut path = format!(
            "{}/{}/{}/{}-{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            self.artifact,
            self.version
        );
        if let Some(classifier) = &self.classifier {
            path.push('-');
            path.push_str(classifier);
        }
        path.push('.');
        path.push_str(&self.extension);
        path
    }
}

impl Display for MavenCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        if self.extension != "jar" {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}
