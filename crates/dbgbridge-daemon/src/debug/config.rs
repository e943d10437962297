//! Debug session configuration carried by the first stream message.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dbgbridge_core::Properties;
use dbgbridge_core::config::DEBUG_PATTERN_KEY;
use dbgbridge_proto::v1::DebugConfigRequest;
use tracing::warn;

/// Validated session configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugConfig {
    /// Fully qualified board name.
    pub fqbn: String,
    pub sketch_path: PathBuf,
    pub port: String,
    pub verbose: bool,
    /// Directory holding a pre-built artifact.
    pub import_dir: Option<PathBuf>,
    /// Client supplied recipe properties.
    pub properties: BTreeMap<String, String>,
}

impl From<DebugConfigRequest> for DebugConfig {
    fn from(req: DebugConfigRequest) -> Self {
        Self {
            fqbn: req.fqbn,
            sketch_path: PathBuf::from(req.sketch_path),
            port: req.port,
            verbose: req.verbose,
            import_dir: Some(req.import_dir)
                .filter(|d| !d.is_empty())
                .map(PathBuf::from),
            properties: req.properties.into_iter().collect(),
        }
    }
}

impl DebugConfig {
    /// True when nothing identifies a target to debug.
    pub fn is_empty(&self) -> bool {
        self.fqbn.is_empty()
            && self.sketch_path.as_os_str().is_empty()
            && self.import_dir.is_none()
            && self.properties.is_empty()
    }

    /// Main sketch file name, e.g. `blink.ino` for `/sketches/blink`.
    pub fn project_name(&self) -> String {
        let name = self
            .sketch_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if Path::new(&name).extension().is_some() {
            name
        } else {
            format!("{name}.ino")
        }
    }

    /// Directory the debugger loads the compiled artifact from.
    pub fn build_path(&self) -> PathBuf {
        if let Some(dir) = &self.import_dir {
            return dir.clone();
        }
        let base = self.sketch_path.join("build");
        if self.fqbn.is_empty() {
            base
        } else {
            base.join(self.fqbn.replace(':', "."))
        }
    }

    /// Recipe properties derived from this configuration.
    ///
    /// Every value is client supplied and therefore literal: placeholders in
    /// it are never expanded. Client properties come last but cannot replace
    /// the debug pattern or any `tools.*`/`runtime.*` entry, so a client never
    /// chooses the executable.
    pub fn recipe_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.set_literal("build.fqbn", self.fqbn.clone());
        props.set_literal("build.sketch_path", self.sketch_path.display().to_string());
        props.set_literal("build.path", self.build_path().display().to_string());
        props.set_literal("build.project_name", self.project_name());
        props.set_literal("serial.port", self.port.clone());
        props.set_literal("debug.port", self.port.clone());
        props.set_literal("debug.verbose", self.verbose.to_string());

        for (key, value) in &self.properties {
            if is_protected_key(key) {
                warn!(key = %key, "Ignoring client override of protected recipe property");
                continue;
            }
            props.set_literal(key.clone(), value.clone());
        }
        props
    }
}

fn is_protected_key(key: &str) -> bool {
    key == DEBUG_PATTERN_KEY || key.starts_with("tools.") || key.starts_with("runtime.")
}
