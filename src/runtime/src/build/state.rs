//! Build state threaded through instruction execution.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Declared container configuration.
///
/// Field names follow the daemon's wire format so an engine adapter can
/// pass the value through verbatim. Fields the build never touches are
/// kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerConfig {
    #[serde(deserialize_with = "null_as_default")]
    pub hostname: String,
    #[serde(deserialize_with = "null_as_default")]
    pub user: String,
    #[serde(deserialize_with = "null_as_default")]
    pub working_dir: String,
    /// `KEY=VALUE` entries, keys unique
    #[serde(deserialize_with = "null_as_default")]
    pub env: Vec<String>,
    pub cmd: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    /// `"80/tcp" -> {}`, as the daemon encodes port sets
    #[serde(deserialize_with = "null_as_default")]
    pub exposed_ports: BTreeMap<String, Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    /// `"/data" -> {}`
    #[serde(deserialize_with = "null_as_default")]
    pub volumes: BTreeMap<String, Value>,
    /// Passthrough fields such as `StopSignal`, `Healthcheck` or `Shell`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The daemon sends `null` for empty collections and strings.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ContainerConfig {
    /// Value of an environment variable, if declared.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env.iter().find_map(|entry| match entry.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            _ => None,
        })
    }
}

/// Snapshot of build progress.
///
/// Commands receive a read-only view of the current state and return a
/// fresh value; only the build driver installs it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Most recently produced or inspected image; empty until FROM or COMMIT
    pub image_id: String,
    /// Live, uncommitted container; empty when there is none
    pub container_id: String,
    /// Declared configuration
    pub config: ContainerConfig,
    /// Metadata-only changes since the last commit
    pub commit_msg: Vec<String>,
}

impl State {
    pub fn has_container(&self) -> bool {
        !self.container_id.is_empty()
    }

    /// Whether a COMMIT would have anything to finalize.
    pub fn has_pending_changes(&self) -> bool {
        self.has_container() || !self.commit_msg.is_empty()
    }
}

/// Key part of a `KEY=VALUE` entry.
pub(crate) fn env_key(entry: &str) -> &str {
    entry.split_once('=').map(|(k, _)| k).unwrap_or(entry)
}
