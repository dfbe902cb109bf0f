//! JVM property extraction via `-XshowSettings:properties -version`

use std::collections::HashMap;
use std::path::Path;

/// A property value from the settings dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsValue {
    /// A plain `key = value` line
    Single(String),
    /// A value continued over indented follow-up lines
    List(Vec<String>),
}

/// Parsed output of the JVM's property dump
#[derive(Debug, Clone, Default)]
pub struct HotSpotSettings {
    properties: HashMap<String, SettingsValue>,
}

impl HotSpotSettings {
    /// Look a single-valued property up
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.properties.get(key)? {
            SettingsValue::Single(value) => Some(value),
            SettingsValue::List(values) => values.first().map(String::as_str),
        }
    }

    /// Look a list-valued property up
    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        match self.properties.get(key)? {
            SettingsValue::List(values) => Some(values),
            SettingsValue::Single(_) => None,
        }
    }

    /// The pointer width the runtime reports: `"32"`, `"64"` or `"unknown"`
    pub fn data_model(&self) -> &str {
        match self.get("sun.arch.data.model") {
            Some("32") => "32",
            Some("64") => "64",
            _ => "unknown",
        }
    }

    /// The native library search path, always a list
    pub fn library_paths(&self) -> &[String] {
        self.get_list("java.library.path").unwrap_or(&[])
    }

    /// Insert a single-valued property
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.properties
            .insert(key.into(), SettingsValue::Single(value.into()));
    }
}

/// Parse the diagnostic stream of `-XshowSettings:properties -version`.
///
/// Property lines are indented with four spaces as `key = value`;
/// eight-space lines continue the previous property as an ordered list.
/// `java.library.path` is forced to a list even when it carried one entry.
pub fn parse_properties(output: &str) -> HotSpotSettings {
    let mut properties: HashMap<String, SettingsValue> = HashMap::new();
    let mut current_key: Option<String> = None;

    for line in output.lines() {
        if let Some(continuation) = line.strip_prefix("        ") {
            let Some(key) = &current_key else { continue };
            let value = continuation.trim().to_string();
            match properties.get_mut(key) {
                Some(SettingsValue::List(values)) => values.push(value),
                Some(entry) => {
                    if let SettingsValue::Single(first) = entry {
                        *entry = SettingsValue::List(vec![std::mem::take(first), value]);
                    }
                }
                None => {}
            }
        } else if let Some(property) = line.strip_prefix("    ") {
            let Some((key, value)) = property.split_once('=') else {
                continue;
            };
            let key = key.trim().to_string();
            properties.insert(
                key.clone(),
                SettingsValue::Single(value.trim().to_string()),
            );
            current_key = Some(key);
        }
    }

    if let Some(SettingsValue::Single(value)) = properties.get("java.library.path").cloned() {
        properties.insert(
            "java.library.path".to_string(),
            SettingsValue::List(vec![value]),
        );
    }

    HotSpotSettings { properties }
}

/// Run the Java executable and extract its settings.
///
/// A windowless `javaw.exe` is retargeted to its sibling `java.exe`, which
/// actually produces the dump. A missing executable or spawn failure yields
/// `None`; discovery treats the candidate as unusable.
pub async fn extract_settings(executable: &Path) -> Option<HotSpotSettings> {
    let executable = retarget_windowless(executable);
    if !executable.exists() {
        return None;
    }

    let output = tokio::process::Command::new(&executable)
        .arg("-XshowSettings:properties")
        .arg("-version")
        .output()
        .await;
    let output = match output {
        Ok(output) => output,
        Err(e) => {
            log::debug!("could not run {}: {e}", executable.display());
            return None;
        }
    };

    // The dump goes to the diagnostic stream, not stdout
    let stderr = String::from_utf8_lossy(&output.stderr);
    Some(parse_properties(&stderr))
}

fn retarget_windowless(executable: &Path) -> std::path::PathBuf {
    if executable.file_name().and_then(|n| n.to_str()) == Some("javaw.exe") {
        executable.with_file_name("java.exe")
    } else {
        executable.to_path_buf()
    }
}
