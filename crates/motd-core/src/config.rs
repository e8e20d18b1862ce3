//! Operator configuration: runtime settings from the environment and
//! user-facing charm options from a JSON file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Accepted values for the `log-level` option.
pub const VALID_LOG_LEVELS: [&str; 5] = ["info", "debug", "warning", "error", "critical"];

/// Container whose supervisor this operator manages.
pub const DEFAULT_CONTAINER: &str = "httpbin";

const DEFAULT_CHANGE_TIMEOUT_SECS: u64 = 30;

/// Verbosity of the operator's own logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Debug,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            _ => Err(Error::InvalidConfig(format!("invalid log level: '{s}'"))),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-facing charm options.
///
/// Values are kept as given and validated on use, so an invalid option can be
/// reported as a blocked status instead of failing to load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharmConfig {
    #[serde(rename = "log-level", default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for CharmConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl CharmConfig {
    /// Load options from a JSON file. A missing file yields the defaults;
    /// a file that does not parse is `InvalidConfig`.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                Error::InvalidConfig(format!("invalid charm options in {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parsed `log-level`, or `InvalidConfig` if it is not one of
    /// [`VALID_LOG_LEVELS`].
    pub fn log_level(&self) -> Result<LogLevel> {
        self.log_level.parse()
    }

    /// Check every option, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.log_level().map(|_| ())
    }
}

/// Runtime settings for one operator process.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Name of the workload container.
    pub container: String,
    /// Unix socket of the container's Pebble API.
    pub pebble_socket: PathBuf,
    /// How long to wait for a replan change to finish.
    pub change_timeout: Duration,
    /// Location of the charm options file, if any.
    pub charm_config_path: Option<PathBuf>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self::for_container(DEFAULT_CONTAINER)
    }
}

impl OperatorConfig {
    /// Defaults for the given container, using the standard socket location.
    pub fn for_container(container: impl Into<String>) -> Self {
        let container = container.into();
        Self {
            pebble_socket: default_socket_path(&container),
            container,
            change_timeout: Duration::from_secs(DEFAULT_CHANGE_TIMEOUT_SECS),
            charm_config_path: None,
        }
    }

    /// Point at another container. The socket follows unless it was set
    /// explicitly.
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        let container = container.into();
        if self.pebble_socket == default_socket_path(&self.container) {
            self.pebble_socket = default_socket_path(&container);
        }
        self.container = container;
        self
    }

    /// Create configuration from environment and defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let container = lookup("MOTD_CONTAINER")
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTAINER.to_string());

        let mut config = Self::for_container(container);

        if let Some(socket) = lookup("PEBBLE_SOCKET").filter(|s| !s.is_empty()) {
            config.pebble_socket = PathBuf::from(socket);
        }

        if let Some(secs) = lookup("MOTD_CHANGE_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.change_timeout = Duration::from_secs(secs);
        }

        config.charm_config_path = lookup("MOTD_CONFIG")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        config
    }

    /// Load the charm options this configuration points at.
    pub fn charm_config(&self) -> Result<CharmConfig> {
        match &self.charm_config_path {
            Some(path) => CharmConfig::load(path),
            None => Ok(CharmConfig::default()),
        }
    }
}

/// Where the host platform mounts a container's Pebble socket.
pub fn default_socket_path(container: &str) -> PathBuf {
    PathBuf::from("/charm/containers")
        .join(container)
        .join("pebble.socket")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_valid_log_levels_parse() {
        for level in VALID_LOG_LEVELS {
            let parsed: LogLevel = level.parse().unwrap();
            assert_eq!(parsed.as_str(), level);
        }
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
    }

    #[test]
    fn test_invalid_log_level() {
        let err = "verbose".parse::<LogLevel>().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.to_string().contains("'verbose'"));
    }

    #[test]
    fn test_filter_directives() {
        assert_eq!(LogLevel::Warning.filter_directive(), "warn");
        assert_eq!(LogLevel::Critical.filter_directive(), "error");
    }

    #[test]
    fn test_charm_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CharmConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.log_level().unwrap(), LogLevel::Info);
    }

    #[test]
    fn test_charm_config_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"log-level": "warning"}"#).unwrap();
        let config = CharmConfig::load(&path).unwrap();
        assert_eq!(config.log_level().unwrap(), LogLevel::Warning);
    }

    #[test]
    fn test_charm_config_keeps_invalid_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"log-level": "chatty"}"#).unwrap();
        let config = CharmConfig::load(&path).unwrap();
        assert_eq!(config.log_level, "chatty");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_charm_config_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = CharmConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(err.health(), crate::OperatorHealth::Blocked);
    }

    #[test]
    fn test_operator_config_defaults() {
        let config = OperatorConfig::from_lookup(|_| None);
        assert_eq!(config.container, "httpbin");
        assert_eq!(
            config.pebble_socket,
            PathBuf::from("/charm/containers/httpbin/pebble.socket")
        );
        assert_eq!(config.change_timeout, Duration::from_secs(30));
        assert!(config.charm_config_path.is_none());
    }

    #[test]
    fn test_operator_config_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MOTD_CONTAINER", "motd"),
            ("MOTD_CHANGE_TIMEOUT_SECS", "5"),
            ("MOTD_CONFIG", "/tmp/motd.json"),
        ]);
        let config = OperatorConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.container, "motd");
        assert_eq!(
            config.pebble_socket,
            PathBuf::from("/charm/containers/motd/pebble.socket")
        );
        assert_eq!(config.change_timeout, Duration::from_secs(5));
        assert_eq!(config.charm_config_path, Some(PathBuf::from("/tmp/motd.json")));
    }

    #[test]
    fn test_with_container() {
        let config = OperatorConfig::default().with_container("motd");
        assert_eq!(
            config.pebble_socket,
            PathBuf::from("/charm/containers/motd/pebble.socket")
        );

        let mut pinned = OperatorConfig::default();
        pinned.pebble_socket = PathBuf::from("/run/pebble.socket");
        let pinned = pinned.with_container("motd");
        assert_eq!(pinned.container, "motd");
        assert_eq!(pinned.pebble_socket, PathBuf::from("/run/pebble.socket"));
    }

    #[test]
    fn test_operator_config_socket_override() {
        let config = OperatorConfig::from_lookup(|k| {
            (k == "PEBBLE_SOCKET").then(|| "/run/pebble.socket".to_string())
        });
        assert_eq!(config.pebble_socket, PathBuf::from("/run/pebble.socket"));
    }
}
