//! Supervisor plan: ordered labelled layers and the flattened service view.

use std::collections::BTreeMap;

use motd_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::layer::{Layer, Override, Service};

/// A layer registered under a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledLayer {
    pub label: String,
    pub layer: Layer,
}

/// Layers in the order they were first added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    layers: Vec<LabeledLayer>,
}

/// Flattened plan: every service after all layers are applied in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePlan {
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
}

impl ServicePlan {
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Layer(e.to_string()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // Pebble renders an empty plan as "{}" or an empty document.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| Error::Layer(e.to_string()))
    }
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[LabeledLayer] {
        &self.layers
    }

    pub fn layer(&self, label: &str) -> Option<&Layer> {
        self.layers
            .iter()
            .find(|l| l.label == label)
            .map(|l| &l.layer)
    }

    /// Add `layer` under `label`.
    ///
    /// A new label is appended. An existing label is an error unless
    /// `combine` is set, in which case the new layer is folded into it.
    /// The plan is untouched when an error is returned.
    pub fn add_layer(&mut self, label: &str, layer: Layer, combine: bool) -> Result<()> {
        if label.trim().is_empty() {
            return Err(Error::Layer("layer label must not be empty".into()));
        }
        layer.validate(label)?;

        match self.layers.iter_mut().find(|l| l.label == label) {
            Some(existing) if combine => {
                combine_layer(&mut existing.layer, layer);
                Ok(())
            }
            Some(_) => Err(Error::Layer(format!("layer \"{label}\" already exists"))),
            None => {
                self.layers.push(LabeledLayer {
                    label: label.to_string(),
                    layer,
                });
                Ok(())
            }
        }
    }

    /// Apply every layer in order and return the resulting services.
    pub fn flatten(&self) -> ServicePlan {
        let mut services = BTreeMap::new();
        for labeled in &self.layers {
            for (name, service) in &labeled.layer.services {
                fold_service(&mut services, name, service.clone());
            }
        }
        ServicePlan { services }
    }
}

fn combine_layer(existing: &mut Layer, layer: Layer) {
    if !layer.summary.is_empty() {
        existing.summary = layer.summary;
    }
    if !layer.description.is_empty() {
        existing.description = layer.description;
    }
    for (name, service) in layer.services {
        fold_service(&mut existing.services, &name, service);
    }
}

fn fold_service(services: &mut BTreeMap<String, Service>, name: &str, service: Service) {
    if service.r#override == Some(Override::Merge) {
        if let Some(prior) = services.get_mut(name) {
            prior.merge(service);
            return;
        }
    }
    services.insert(name.to_string(), service);
}
