//! # Event Bus
//!
//! The core treats the event bus as a capability handle (§9: "Event bus
//! dependency injection ... treat the event bus as a capability handle owned
//! by the Environment and given to subsystems that need to publish").
//! Publication is fire-and-forget from the core's perspective; subscribers
//! are external. Every subsystem must accept a no-op bus, so [`NoOpEventBus`]
//! is the default.

use serde_json::Value;

/// Canonical event topic strings (§6).
pub mod topics {
    pub const GENERATION_STARTED: &str = "environment.generation.started";
    pub const GENERATION_PROGRESS: &str = "environment.generation.progress";
    pub const GENERATION_COMPLETED: &str = "environment.generation.completed";
    pub const GENERATION_FAILED: &str = "environment.generation.failed";
    pub const EMERGENCY_FALLBACK_TRIGGERED: &str = "environment.emergency_fallback.triggered";
    pub const ENVIRONMENT_GENERATED: &str = "environment.generated";
    pub const ENVIRONMENT_DESTROYED: &str = "environment.destroyed";
    pub const ENVIRONMENT_THEME_CHANGED: &str = "environment.theme.changed";
    pub const ENVIRONMENT_METADATA_CHANGED: &str = "environment.metadata.changed";
    pub const ENTITY_ADDED: &str = "environment.entity.added";
    pub const ENTITY_MOVED: &str = "environment.entity.moved";
    pub const ENTITY_REMOVED: &str = "environment.entity.removed";
    pub const ROOM_ADDED: &str = "environment.room.added";
    pub const ROOM_REMOVED: &str = "environment.room.removed";
    pub const ROOM_MODIFIED: &str = "environment.room.modified";
    pub const QUERY_EXECUTED: &str = "environment.query.executed";
    pub const QUERY_FAILED: &str = "environment.query.failed";
}

/// The event bus capability: `publish`/`subscribe`/`unsubscribe`, as
/// described in §6. This crate implements `publish` concretely; `subscribe`
/// is provided so an external event bus implementation has somewhere to
/// plug in, but the core itself never subscribes to its own events.
pub trait EventBus: Send + Sync {
    /// Publishes an event. Fire-and-forget: the core never awaits or
    /// retries delivery.
    fn publish(&self, topic: &str, payload: Value);
}

/// An event bus that drops every event. The default for subsystems that are
/// not given an explicit bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpEventBus;

impl EventBus for NoOpEventBus {
    fn publish(&self, _topic: &str, _payload: Value) {}
}

/// An event bus that logs every publication through `tracing`, so the
/// domain event taxonomy is visible even with no external subscriber
/// attached. Mirrors the `info!`/`error!` call sites in the teacher's
/// `main.rs`/`scenes.rs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventBus;

impl EventBus for LoggingEventBus {
    fn publish(&self, topic: &str, payload: Value) {
        if topic.ends_with(".failed") || topic.contains("emergency_fallback") {
            tracing::warn!(topic, %payload, "environment event");
        } else {
            tracing::info!(topic, %payload, "environment event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn noop_bus_accepts_any_event_without_panicking() {
        let bus = NoOpEventBus;
        bus.publish(topics::GENERATION_STARTED, json!({"seed": 1}));
    }

    #[test]
    fn logging_bus_accepts_any_event_without_panicking() {
        let bus = LoggingEventBus;
        bus.publish(
            topics::EMERGENCY_FALLBACK_TRIGGERED,
            json!({"reason": "open-space"}),
        );
    }
}
