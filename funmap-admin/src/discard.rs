//! Discard orchestration
//!
//! Reverts every simple field to its baseline and asks every composite to
//! re-render from its baseline snapshot, then recomputes the dirty flag from
//! the registry. Never contacts the gateway.

use crate::session::AdminSession;
use chrono::Utc;
use funmap_common::events::EditorEvent;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardOutcome {
    Discarded {
        /// Simple fields whose value was reverted
        reverted_fields: usize,
        /// Composites re-rendered from their baseline
        restored_composites: usize,
    },
    /// A save is in flight; nothing was touched
    BlockedBySave,
}

impl AdminSession {
    /// Throw away every unsaved edit
    pub fn discard_changes(&self) -> DiscardOutcome {
        let mut state = self.inner.state.lock();
        if state.is_saving {
            debug!("Discard requested during save; ignored");
            return DiscardOutcome::BlockedBySave;
        }
        state.autosave.cancel();

        let reverted = state.registry.revert_simple_fields();
        for (field_id, value) in &reverted {
            self.inner.events.emit_lossy(EditorEvent::FieldReset {
                field_id: field_id.clone(),
                value: value.clone(),
                timestamp: Utc::now(),
            });
        }

        let mut restored = 0;
        for (field_id, baseline, source) in state.registry.composite_baselines() {
            match source.restore(&baseline) {
                Ok(()) => {
                    restored += 1;
                    self.inner.events.emit_lossy(EditorEvent::CompositeRestored {
                        field_id,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => error!("Failed to restore \"{}\": {}", field_id, e),
            }
        }

        self.recheck(&mut state);
        let residual = state.registry.changed_ids();
        drop(state);

        if !residual.is_empty() {
            warn!(?residual, "Fields still differ from baseline after discard");
        }

        info!(reverted = reverted.len(), restored, "Changes discarded");
        self.inner.events.emit_lossy(EditorEvent::ChangesDiscarded {
            timestamp: Utc::now(),
        });
        DiscardOutcome::Discarded {
            reverted_fields: reverted.len(),
            restored_composites: restored,
        }
    }
}
