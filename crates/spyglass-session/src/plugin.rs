//! Inspection plugins, the feature modules riding on a session.
//!
//! Control events from the service are routed by vendor and control type;
//! plugins also get connected/disconnected lifecycle calls. Dispatch runs on
//! the session worker task, so implementations must not block.

use std::sync::Arc;

use tracing::debug;

use spyglass_core::InspectionEvent;
use spyglass_core::constants::control_type;

/// A feature module attached to the session layer.
pub trait InspectionPlugin: Send + Sync {
    /// Vendor whose control events this plugin consumes.
    fn vendor(&self) -> &str;

    /// Control type this plugin consumes, or [`control_type::WILDCARD`] for
    /// all of its vendor's control events.
    fn control_type(&self) -> &str;

    /// An inbound control event addressed to this plugin.
    fn on_event(&self, event: &InspectionEvent);

    /// The session reached `Connected`.
    fn on_session_connected(&self) {}

    /// The session ended.
    fn on_session_disconnected(&self) {}
}

/// Registered plugins plus dispatch.
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn InspectionPlugin>>,
}

impl PluginRegistry {
    /// Build a registry over a fixed plugin set.
    #[must_use]
    pub fn new(plugins: Vec<Arc<dyn InspectionPlugin>>) -> Self {
        Self { plugins }
    }

    /// Route one inbound event to every matching plugin.
    ///
    /// Control events match on vendor plus control type, with wildcard
    /// registrations seeing all of their vendor's control events. Events
    /// without a control payload are ignored here.
    pub fn dispatch(&self, event: &InspectionEvent) {
        if !event.is_control() {
            return;
        }
        let Some(kind) = event.control_type() else {
            debug!(vendor = %event.vendor, "control event without a type, dropping");
            return;
        };
        for plugin in &self.plugins {
            if plugin.vendor() == event.vendor
                && (plugin.control_type() == kind
                    || plugin.control_type() == control_type::WILDCARD)
            {
                plugin.on_event(event);
            }
        }
    }

    /// Lifecycle fan-out after connect.
    pub fn notify_connected(&self) {
        for plugin in &self.plugins {
            plugin.on_session_connected();
        }
    }

    /// Lifecycle fan-out after the session ends.
    pub fn notify_disconnected(&self) {
        for plugin in &self.plugins {
            plugin.on_session_disconnected();
        }
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// True when no plugins are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
