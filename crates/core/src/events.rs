//! Lifecycle event emission.
//!
//! Dashboards and the staff notification feed observe patient lifecycle changes
//! through these events. Events are emitted via `tracing` *after* the underlying
//! write has succeeded; delivery is fire-and-forget and a delivery failure never
//! rolls back the data transition.

use serde::Serialize;
use tracing::info;

/// A structured event describing a change to a patient or discharge request.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    pub action: String,
    pub patient_id: String,
    pub actor: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl LifecycleEvent {
    pub fn new(action: impl Into<String>, patient_id: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            patient_id: patient_id.into(),
            actor: None,
            details: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Emit this event via tracing.
    pub fn emit(&self) {
        info!(
            event.action = %self.action,
            event.patient_id = %self.patient_id,
            event.actor = self.actor.as_deref().unwrap_or("system"),
            event.details = ?self.details,
            "lifecycle event"
        );
    }
}
