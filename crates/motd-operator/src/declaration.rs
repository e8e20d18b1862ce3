//! The service layer this operator declares.

use motd_pebble::{Layer, Override, Service, Startup};

/// Label the layer is registered under in the supervisor's plan.
pub const LAYER_LABEL: &str = "httpbin";

/// Name of the supervised service.
pub const SERVICE_NAME: &str = "motd";

/// Runs Apache in the foreground so the supervisor owns the process.
pub const SERVICE_COMMAND: &str = "/usr/sbin/apache2ctl -D FOREGROUND";

/// Build the MOTD layer. A fresh value every call; nothing is cached.
pub fn motd_layer() -> Layer {
    Layer::new("MOTD layer", "pebble config layer for Ubuntu MOTD").with_service(
        SERVICE_NAME,
        Service::new(SERVICE_COMMAND)
            .with_override(Override::Replace)
            .with_summary("motd")
            .with_startup(Startup::Enabled),
    )
}
