//! Node configuration.
//!
//! A [`NodeConfig`] is a string-keyed map of heterogeneous values supplied at
//! node construction and immutable afterwards. Each node interprets only the
//! keys it recognizes and applies documented defaults for the rest; unknown
//! keys are carried along untouched so one config file can feed several
//! stages.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::capture::CaptureSource;

/// Config key holding the node's display name (used as the log tag).
pub const KEY_NAME: &str = "name";
/// Config key holding the capture source identifier.
pub const KEY_SOURCE: &str = "source";
/// Config key for the requested frame width.
pub const KEY_WIDTH: &str = "width";
/// Config key for the requested frame height.
pub const KEY_HEIGHT: &str = "height";
/// Config key for the requested frame rate.
pub const KEY_FPS: &str = "fps";

const DEFAULT_NODE_NAME: &str = "node";

/// Immutable, string-keyed node configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(flatten)]
    values: BTreeMap<String, Value>,
}

impl NodeConfig {
    /// Create a config carrying only the node name.
    pub fn new(name: impl Into<String>) -> Self {
        let mut values = BTreeMap::new();
        values.insert(KEY_NAME.to_string(), Value::String(name.into()));
        Self { values }
    }

    /// Builder-style insertion, consumed before the node is constructed.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Load a config from a JSON object file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read node config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse node config {}", path.display()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.values
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// The node's display name; defaults to `"node"` when absent.
    pub fn name(&self) -> &str {
        self.get_str(KEY_NAME).unwrap_or(DEFAULT_NODE_NAME)
    }

    /// The capture source, parsed from the `source` key.
    ///
    /// Accepts a JSON number (camera index), a numeric string (also a camera
    /// index), a `stub://` URI (synthetic backend), or any other string (file
    /// path / device node). Defaults to camera index 0.
    pub fn source(&self) -> CaptureSource {
        match self.values.get(KEY_SOURCE) {
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(CaptureSource::Index)
                .unwrap_or_default(),
            Some(Value::String(s)) => CaptureSource::parse(s),
            _ => CaptureSource::default(),
        }
    }
}
