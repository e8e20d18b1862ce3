//! MOTD Core — error type, configuration and operator health model.

pub mod config;
pub mod error;
pub mod status;

pub use config::{CharmConfig, LogLevel, OperatorConfig, VALID_LOG_LEVELS};
pub use error::{Error, Result};
pub use status::{OperatorHealth, UnitStatus};
