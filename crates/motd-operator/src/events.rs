//! Host events the operator understands.

use motd_core::{Error, Result};

/// Environment variable the host agent sets to the hook being run.
pub const DISPATCH_PATH_VAR: &str = "JUJU_DISPATCH_PATH";

const PEBBLE_READY_SUFFIX: &str = "-pebble-ready";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    /// The named container's supervisor is up and accepting layers.
    PebbleReady { container: String },
    /// Charm options changed.
    ConfigChanged,
    /// Anything else; acknowledged and ignored.
    Other(String),
}

impl HookEvent {
    /// Parse a hook name or dispatch path such as `hooks/httpbin-pebble-ready`.
    ///
    /// Underscores in the event part are read as dashes; the container name
    /// is kept exactly as given.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim().rsplit('/').next().unwrap_or_default();

        if name.is_empty() {
            return Err(Error::UnknownEvent(format!("empty event name in {raw:?}")));
        }

        let container = name
            .strip_suffix(PEBBLE_READY_SUFFIX)
            .or_else(|| name.strip_suffix("_pebble_ready"));
        if let Some(container) = container.filter(|c| !c.is_empty()) {
            return Ok(Self::PebbleReady {
                container: container.to_string(),
            });
        }

        let name = name.replace('_', "-");
        Ok(match name.as_str() {
            "config-changed" => Self::ConfigChanged,
            _ => Self::Other(name),
        })
    }

    /// The event named by the host agent's dispatch path.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(DISPATCH_PATH_VAR)
            .map_err(|_| Error::UnknownEvent(format!("{DISPATCH_PATH_VAR} is not set")))?;
        Self::parse(&path)
    }

    pub fn name(&self) -> String {
        match self {
            Self::PebbleReady { container } => format!("{container}{PEBBLE_READY_SUFFIX}"),
            Self::ConfigChanged => "config-changed".into(),
            Self::Other(name) => name.clone(),
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dispatch_path() {
        assert_eq!(
            HookEvent::parse("hooks/httpbin-pebble-ready").unwrap(),
            HookEvent::PebbleReady {
                container: "httpbin".into()
            }
        );
        assert_eq!(
            HookEvent::parse("hooks/config-changed").unwrap(),
            HookEvent::ConfigChanged
        );
    }

    #[test]
    fn test_parse_bare_and_underscored_names() {
        assert_eq!(
            HookEvent::parse("my_app_pebble_ready").unwrap(),
            HookEvent::PebbleReady {
                container: "my_app".into()
            }
        );
        assert_eq!(
            HookEvent::parse("hooks/my_app-pebble-ready").unwrap(),
            HookEvent::PebbleReady {
                container: "my_app".into()
            }
        );
        assert_eq!(HookEvent::parse("config_changed").unwrap(), HookEvent::ConfigChanged);
    }

    #[test]
    fn test_parse_other_events() {
        assert_eq!(
            HookEvent::parse("hooks/install").unwrap(),
            HookEvent::Other("install".into())
        );
        assert_eq!(
            HookEvent::parse("-pebble-ready").unwrap(),
            HookEvent::Other("-pebble-ready".into())
        );
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(HookEvent::parse(""), Err(Error::UnknownEvent(_))));
        assert!(matches!(HookEvent::parse("hooks/"), Err(Error::UnknownEvent(_))));
    }

    #[test]
    fn test_name_round_trip() {
        for raw in ["httpbin-pebble-ready", "config-changed", "start"] {
            assert_eq!(HookEvent::parse(raw).unwrap().name(), raw);
        }
    }
}
