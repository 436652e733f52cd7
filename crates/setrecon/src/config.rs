//! Engine configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use setrecon_channel::ConnectConfig;
use setrecon_sync::{CpiSyncConfig, IbltSyncConfig, InterCpiSyncConfig};

use crate::error::ConfigError;
use crate::logging::LogConfig;

/// FullSync takes no parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullSyncConfig {}

/// Which engine to build, with its parameters.
///
/// Externally tagged: `{"cpi_sync": {"bits": 8, "max_diff": 4}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineConfig {
    CpiSync(CpiSyncConfig),
    InterCpiSync(InterCpiSyncConfig),
    IbltSync(IbltSyncConfig),
    IbltMultisetSync(IbltSyncConfig),
    FullSync(FullSyncConfig),
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::CpiSync(CpiSyncConfig::default())
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&read_file(path.as_ref())?)
    }
}

/// Everything a reconciling node needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub engine: EngineConfig,
    pub logging: LogConfig,
    pub connect: ConnectConfig,
}

impl NodeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&read_file(path.as_ref())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = EngineConfig::from_json_str(r#"{"cpi_sync": {"bits": 8}}"#).unwrap();
        assert_eq!(
            config,
            EngineConfig::CpiSync(CpiSyncConfig {
                bits: 8,
                ..CpiSyncConfig::default()
            })
        );
    }

    #[test]
    fn test_every_engine_kind_parses() {
        for json in [
            r#"{"inter_cpi_sync": {"p_factor": 3}}"#,
            r#"{"iblt_sync": {"expected_diff": 10}}"#,
            r#"{"iblt_multiset_sync": {}}"#,
            r#"{"full_sync": {}}"#,
        ] {
            assert!(EngineConfig::from_json_str(json).is_ok(), "{}", json);
        }
    }

    #[test]
    fn test_unknown_engine_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"hash_sync": {}}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_node_config_sections() {
        let config = NodeConfig::from_json_str(
            r#"{"engine": {"full_sync": {}}, "logging": {"filter": "debug"}}"#,
        )
        .unwrap();
        assert_eq!(config.engine, EngineConfig::FullSync(FullSyncConfig {}));
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.connect, ConnectConfig::default());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            EngineConfig::from_json_path("/nonexistent/setrecon.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
