//! Layer and service declarations in Pebble's YAML layer format.

use std::collections::BTreeMap;

use motd_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// How a service definition combines with an earlier one of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Override {
    /// Discard the earlier definition entirely.
    Replace,
    /// Overlay only the fields this definition sets.
    Merge,
}

/// Whether replan starts the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Startup {
    Enabled,
    Disabled,
}

/// One supervised service.
///
/// Empty strings, `None` and empty maps mean "not set", which matters when
/// the service is merged into an earlier definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "override", default, skip_serializing_if = "Option::is_none")]
    pub r#override: Option<Override>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup: Option<Startup>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

impl Service {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_override(mut self, policy: Override) -> Self {
        self.r#override = Some(policy);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_startup(mut self, startup: Startup) -> Self {
        self.startup = Some(startup);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Whether replan should keep this service running.
    pub fn is_enabled(&self) -> bool {
        self.startup == Some(Startup::Enabled)
    }

    /// Overlay the fields `other` sets onto this definition.
    pub fn merge(&mut self, other: Service) {
        if other.r#override.is_some() {
            self.r#override = other.r#override;
        }
        if !other.summary.is_empty() {
            self.summary = other.summary;
        }
        if !other.description.is_empty() {
            self.description = other.description;
        }
        if !other.command.is_empty() {
            self.command = other.command;
        }
        if other.startup.is_some() {
            self.startup = other.startup;
        }
        self.environment.extend(other.environment);
    }
}

/// A named fragment of a supervisor plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
}

impl Layer {
    pub fn new(summary: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            description: description.into(),
            services: BTreeMap::new(),
        }
    }

    pub fn with_service(mut self, name: impl Into<String>, service: Service) -> Self {
        self.services.insert(name.into(), service);
        self
    }

    /// Reject layers the supervisor would refuse.
    pub fn validate(&self, label: &str) -> Result<()> {
        for (name, service) in &self.services {
            if name.trim().is_empty() {
                return Err(Error::Layer(format!(
                    "layer \"{label}\" has a service with an empty name"
                )));
            }
            if service.r#override.is_none() {
                return Err(Error::Layer(format!(
                    "layer \"{label}\" must define \"override\" for service \"{name}\""
                )));
            }
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Layer(e.to_string()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Layer(e.to_string()))
    }
}
