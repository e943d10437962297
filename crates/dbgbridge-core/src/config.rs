//! Settings resolution for dbgbridge.
//!
//! Implements hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global settings (<config dir>/dbgbridge/settings.json)
//! 3. Explicit settings file (`--settings`)
//! 4. Environment variables
//! 5. CLI arguments (applied by the daemon binary, highest priority)

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::recipe::Properties;

/// Recipe key holding the debugger command line pattern.
pub const DEBUG_PATTERN_KEY: &str = "debug.pattern";

/// Default debugger recipe: GDB in machine-interface mode on the build artifact.
pub const DEFAULT_DEBUG_PATTERN: &str =
    r#""{tools.gdb.cmd}" --interpreter=mi2 "{build.path}/{build.project_name}.elf""#;

/// Default size of the output pump's read buffer. Kept small on purpose so
/// interactive debugger output is forwarded as soon as it is produced.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8;

/// Complete dbgbridge settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub debug: DebugSettings,
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DaemonSettings {
    pub addr: SocketAddr,
    pub socket_path: Option<PathBuf>,
    pub max_sessions: usize,
    pub log_level: String,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 50052)),
            socket_path: None,
            max_sessions: 4,
            log_level: "info".to_string(),
        }
    }
}

/// Proxy and filesystem locations handed to the recipe as properties.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PathSettings {
    pub http_proxy: Option<String>,
    pub sketchbook_path: Option<PathBuf>,
    pub libraries_path: Option<PathBuf>,
    pub packages_path: Option<PathBuf>,
}

/// Debugger launch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DebugSettings {
    /// Command line pattern, expanded against the recipe properties.
    pub pattern: String,
    /// Output pump read buffer size in bytes.
    pub read_buffer_size: usize,
    /// Tool properties such as `tools.gdb.cmd`.
    pub tool_properties: BTreeMap<String, String>,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_DEBUG_PATTERN.to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            tool_properties: std::iter::once(("tools.gdb.cmd".to_string(), "gdb".to_string()))
                .collect(),
        }
    }
}

impl DebugSettings {
    /// Base recipe properties: tool properties plus the pattern itself.
    pub fn recipe_properties(&self) -> Properties {
        let mut props: Properties = self
            .tool_properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        props.set(DEBUG_PATTERN_KEY, self.pattern.clone());
        props
    }
}

impl PathSettings {
    /// Expose configured paths as `runtime.*` recipe properties.
    pub fn recipe_properties(&self) -> Properties {
        let mut props = Properties::new();
        if let Some(proxy) = &self.http_proxy {
            props.set("runtime.http_proxy", proxy.clone());
        }
        let paths = [
            ("runtime.sketchbook.path", &self.sketchbook_path),
            ("runtime.libraries.path", &self.libraries_path),
            ("runtime.packages.path", &self.packages_path),
        ];
        for (key, path) in paths {
            if let Some(path) = path {
                props.set(key, path.display().to_string());
            }
        }
        props
    }
}

impl Settings {
    /// Write settings as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Load settings with hierarchical resolution.
///
/// A missing global file is fine; a missing `explicit` file is an error.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let global = global_settings_path().filter(|p| p.exists());
    load_settings_from(global.as_deref(), explicit, |key| std::env::var(key).ok())
}

/// Resolve settings from the given files and environment lookup.
///
/// Each file only overrides the fields it actually contains.
pub fn load_settings_from<F>(
    global: Option<&Path>,
    explicit: Option<&Path>,
    lookup: F,
) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut merged = serde_json::to_value(Settings::default())?;

    for path in global.into_iter().chain(explicit) {
        debug!(path = %path.display(), "Loading settings file");
        merge_values(&mut merged, read_settings_value(path)?);
    }

    let mut settings: Settings = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid settings: {e}")))?;
    apply_env_overrides(&mut settings, lookup);
    Ok(settings)
}

/// Get the global settings file path.
pub fn global_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("dbgbridge").join("settings.json"))
}

pub fn load_settings_file(path: &Path) -> Result<Settings> {
    let value = read_settings_value(path)?;
    serde_json::from_value(value).map_err(|e| {
        Error::Config(format!("Failed to parse settings file {}: {}", path.display(), e))
    })
}

fn read_settings_value(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read settings file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse settings file {}: {}", path.display(), e))
    })
}

/// Recursively merge `overlay` into `base`: objects merge key by key, any
/// other value replaces the base value.
fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Apply environment overrides; `lookup` is `std::env::var` outside tests.
/// Empty values are ignored.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(val) = get("HTTP_PROXY") {
        settings.paths.http_proxy = Some(val);
    }
    if let Some(val) = get("SKETCHBOOK_FOLDER") {
        settings.paths.sketchbook_path = Some(PathBuf::from(val));
    }
    if let Some(val) = get("LIBS_FOLDER") {
        settings.paths.libraries_path = Some(PathBuf::from(val));
    }
    if let Some(val) = get("PACKAGES_FOLDER") {
        settings.paths.packages_path = Some(PathBuf::from(val));
    }
    if let Some(val) = get("DBGBRIDGE_DEBUG_PATTERN") {
        settings.debug.pattern = val;
    }
    if let Some(n) = get("DBGBRIDGE_MAX_SESSIONS").and_then(|v| v.parse().ok()) {
        settings.daemon.max_sessions = n;
    }
}
