//! Subscriber setup for binaries and tests.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `"info,setrecon_sync=debug"`.
    pub filter: String,
    pub ansi: bool,
    /// Include the event target in each line.
    pub target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
            target: false,
        }
    }
}

/// Install a global fmt subscriber.
///
/// Fails if the filter does not parse or a subscriber is already set.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter =
        EnvFilter::try_new(&config.filter).map_err(|e| Error::Logging(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(config.target)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_fails() {
        let config = LogConfig {
            filter: "warn,setrecon_sync=debug".to_string(),
            ansi: false,
            target: true,
        };
        assert!(init(&config).is_ok());
        assert!(matches!(init(&config), Err(Error::Logging(_))));
    }
}
