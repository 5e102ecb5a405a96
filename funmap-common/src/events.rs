//! Event types for the editor event system
//!
//! Provides the shared `EditorEvent` definitions and the `EventBus` used to
//! surface notifications (toasts, button enablement, control resets) to
//! whatever UI layer embeds the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why a save attempt failed
///
/// The two kinds carry different user-facing messages but the same retry
/// semantics: dirty state is preserved either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveFailureKind {
    /// Request never produced a usable response (connection, timeout)
    Network,
    /// Server answered but refused the write (`success: false`, bad body)
    Rejected,
}

impl SaveFailureKind {
    /// Message catalog key used for the error notification
    pub fn message_key(self) -> &'static str {
        match self {
            SaveFailureKind::Network => "msg_admin_save_error_network",
            SaveFailureKind::Rejected => "msg_admin_save_error_response",
        }
    }
}

/// Editor event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to a UI process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditorEvent {
    /// The "anything differs from baseline" flag flipped
    ///
    /// Triggers:
    /// - UI: enable/disable save and discard buttons
    DirtyStateChanged {
        is_dirty: bool,
        timestamp: DateTime<Utc>,
    },

    /// A simple field was reverted by discard; its control should show `value`
    FieldReset {
        field_id: String,
        value: Value,
        timestamp: DateTime<Utc>,
    },

    /// A composite subsystem re-rendered itself from its baseline snapshot
    CompositeRestored {
        field_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Autosave debounce timer (re)armed
    AutosaveScheduled {
        delay_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Save requests are about to be submitted
    SaveStarted {
        save_id: Uuid,
        request_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Every request of a save attempt succeeded
    ///
    /// Triggers:
    /// - UI: success toast (`msg_admin_saved`)
    SaveSucceeded {
        save_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// At least one request of a save attempt failed
    ///
    /// Triggers:
    /// - UI: error toast keyed by `kind`
    SaveFailed {
        save_id: Uuid,
        kind: SaveFailureKind,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// All edits were reverted to baseline
    ChangesDiscarded { timestamp: DateTime<Utc> },

    /// A save requested with `close_after` completed; the panel should close
    PanelCloseRequested { timestamp: DateTime<Utc> },

    /// Autosave preference toggled and persisted
    AutosavePreferenceChanged {
        enabled: bool,
        timestamp: DateTime<Utc>,
    },
}

impl EditorEvent {
    /// Short name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            EditorEvent::DirtyStateChanged { .. } => "DirtyStateChanged",
            EditorEvent::FieldReset { .. } => "FieldReset",
            EditorEvent::CompositeRestored { .. } => "CompositeRestored",
            EditorEvent::AutosaveScheduled { .. } => "AutosaveScheduled",
            EditorEvent::SaveStarted { .. } => "SaveStarted",
            EditorEvent::SaveSucceeded { .. } => "SaveSucceeded",
            EditorEvent::SaveFailed { .. } => "SaveFailed",
            EditorEvent::ChangesDiscarded { .. } => "ChangesDiscarded",
            EditorEvent::PanelCloseRequested { .. } => "PanelCloseRequested",
            EditorEvent::AutosavePreferenceChanged { .. } => "AutosavePreferenceChanged",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for editor events
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block the editor)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
///
/// # Examples
///
/// ```
/// use funmap_common::events::{EditorEvent, EventBus};
///
/// let event_bus = EventBus::new(16);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(EditorEvent::ChangesDiscarded {
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(EditorEvent::ChangesDiscarded { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EditorEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: EditorEvent,
    ) -> Result<usize, broadcast::error::SendError<EditorEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: EditorEvent) {
        tracing::trace!(event = event.event_type(), "Editor event");
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(4);
        let result = bus.emit(EditorEvent::ChangesDiscarded { timestamp: Utc::now() });
        assert!(result.is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_event() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        bus.emit_lossy(EditorEvent::DirtyStateChanged {
            is_dirty: true,
            timestamp: Utc::now(),
        });

        match rx.try_recv() {
            Ok(EditorEvent::DirtyStateChanged { is_dirty, .. }) => assert!(is_dirty),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = EditorEvent::SaveFailed {
            save_id: Uuid::nil(),
            kind: SaveFailureKind::Network,
            message: "offline".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SaveFailed");
        assert_eq!(json["kind"], "network");
    }

    #[test]
    fn test_failure_kind_message_keys_differ() {
        assert_ne!(
            SaveFailureKind::Network.message_key(),
            SaveFailureKind::Rejected.message_key()
        );
    }
}
