//! Editor session: the facade the UI layer drives
//!
//! `AdminSession` owns the field registry, the dirty flag, the autosave timer,
//! and the `isSaving` guard behind one mutex. Components (venues, messages,
//! checkout) hold a [`ChangeNotifier`] and call back into the session after
//! each edit, which rechecks the dirty state and re-arms autosave.
//!
//! Locking order: a component releases its own lock before notifying, and the
//! session never calls into a component's notifying methods while holding its
//! state lock. The session lock is never held across an `.await`.

use crate::autosave::AutosaveTimer;
use crate::checkout::{CheckoutCatalog, CHECKOUT_FIELD};
use crate::dirty::{Affordances, DirtyState};
use crate::gateway::{GatewayError, HttpGateway, SaveGateway};
use crate::messages::{MessageCatalog, MESSAGES_FIELD};
use crate::registry::{Capturable, FieldRegistry};
use crate::save::{SaveError, SaveOptions, Subsystem};
use crate::settings::{self, AUTOSAVE_FIELD, AUTOSAVE_KEY};
use crate::venue_editor::{VenueEditor, VENUES_FIELD};
use chrono::Utc;
use funmap_common::api::{GatewayAction, LoadDocument};
use funmap_common::config::TomlConfig;
use funmap_common::events::{EditorEvent, EventBus};
use funmap_common::Result;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Mutable editor state guarded by the session mutex
pub(crate) struct EditorState {
    pub(crate) registry: FieldRegistry,
    pub(crate) dirty: DirtyState,
    pub(crate) autosave: AutosaveTimer,
    pub(crate) autosave_enabled: bool,
    pub(crate) is_saving: bool,
}

pub(crate) struct Inner {
    pub(crate) state: Mutex<EditorState>,
    pub(crate) gateway: Arc<dyn SaveGateway>,
    pub(crate) events: EventBus,
}

/// Handle components use to report edits to their session
///
/// Holds a weak reference; notifying after the session is gone does nothing.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    session: Weak<Inner>,
}

impl ChangeNotifier {
    /// Notifier bound to no session (standalone components)
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        if let Some(inner) = self.session.upgrade() {
            AdminSession { inner }.notify_change();
        }
    }
}

/// A subsystem that could not be built from the loaded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedSubsystem {
    pub subsystem: Subsystem,
    pub reason: String,
}

/// Components built from a load
pub struct Workspace {
    /// Settings map as loaded
    pub settings: Map<String, Value>,
    pub messages: Arc<MessageCatalog>,
    /// `None` when blocked (see `blocked`)
    pub venues: Option<Arc<VenueEditor>>,
    /// `None` when blocked (see `blocked`)
    pub checkout: Option<Arc<CheckoutCatalog>>,
    pub blocked: Vec<BlockedSubsystem>,
}

/// Editor session
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AdminSession {
    pub(crate) inner: Arc<Inner>,
}

impl AdminSession {
    pub fn new(gateway: Arc<dyn SaveGateway>, autosave_delay: Duration, event_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EditorState {
                    registry: FieldRegistry::new(),
                    dirty: DirtyState::new(),
                    autosave: AutosaveTimer::new(autosave_delay),
                    autosave_enabled: false,
                    is_saving: false,
                }),
                gateway,
                events: EventBus::new(event_capacity),
            }),
        }
    }

    /// Session over HTTP, configured from the TOML config
    pub fn from_config(config: &TomlConfig) -> std::result::Result<Self, GatewayError> {
        let gateway = HttpGateway::new(config.gateway_url.clone())?;
        Ok(Self::new(Arc::new(gateway), config.autosave.delay(), config.event_capacity))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn notifier(&self) -> ChangeNotifier {
        ChangeNotifier {
            session: Arc::downgrade(&self.inner),
        }
    }

    // ========================================
    // Load
    // ========================================

    /// Fetch the admin document and install it
    pub async fn load(&self) -> std::result::Result<Workspace, GatewayError> {
        let document = self.inner.gateway.load().await?;
        Ok(self.install(document))
    }

    /// Replace all editor state with a freshly loaded document
    ///
    /// Every baseline is seeded from the document. Components that need the
    /// site currency are reported in `blocked` instead of being built when it
    /// is missing.
    pub fn install(&self, document: LoadDocument) -> Workspace {
        let notifier = self.notifier();
        let LoadDocument {
            settings: loaded_settings,
            messages,
            checkout_options,
            venues,
        } = document;

        let mut blocked = Vec::new();
        let currency = match settings::require_site_currency(&loaded_settings) {
            Ok(code) => code,
            Err(e) => {
                warn!("{}; venue pricing and checkout are unavailable", e);
                String::new()
            }
        };

        let messages = Arc::new(MessageCatalog::new(messages, notifier.clone()));
        let venues = match VenueEditor::new(venues, &currency, notifier.clone()) {
            Ok(editor) => Some(Arc::new(editor)),
            Err(e) => {
                blocked.push(BlockedSubsystem {
                    subsystem: Subsystem::FormData,
                    reason: e.to_string(),
                });
                None
            }
        };
        let checkout = match CheckoutCatalog::new(checkout_options, &currency, notifier) {
            Ok(catalog) => Some(Arc::new(catalog)),
            Err(e) => {
                blocked.push(BlockedSubsystem {
                    subsystem: Subsystem::CheckoutOptions,
                    reason: e.to_string(),
                });
                None
            }
        };

        let mut state = self.inner.state.lock();
        state.autosave.cancel();
        state.registry = FieldRegistry::new();

        for (key, value) in &loaded_settings {
            let registered = if key == AUTOSAVE_KEY {
                state.registry.register_field(AUTOSAVE_FIELD, settings::parse_bool(value))
            } else {
                state.registry.register_field(settings::setting_field_id(key), value.clone())
            };
            if let Err(e) = registered {
                warn!("Skipping setting \"{}\": {}", key, e);
            }
        }
        state.autosave_enabled = loaded_settings.get(AUTOSAVE_KEY).is_some_and(settings::parse_bool);

        let mut composites: Vec<(&str, Arc<dyn Capturable>)> = Vec::with_capacity(3);
        composites.push((MESSAGES_FIELD, messages.clone() as Arc<dyn Capturable>));
        if let Some(editor) = &venues {
            composites.push((VENUES_FIELD, editor.clone() as Arc<dyn Capturable>));
        }
        if let Some(catalog) = &checkout {
            composites.push((CHECKOUT_FIELD, catalog.clone() as Arc<dyn Capturable>));
        }
        for (id, source) in composites {
            if let Err(e) = state.registry.register_composite(id, source) {
                warn!("Skipping composite \"{}\": {}", id, e);
            }
        }

        if state.dirty.clear() {
            self.emit_dirty(false);
        }
        info!(
            fields = state.registry.len(),
            blocked = blocked.len(),
            autosave = state.autosave_enabled,
            "Admin document installed"
        );

        Workspace {
            settings: loaded_settings,
            messages,
            venues,
            checkout,
            blocked,
        }
    }

    // ========================================
    // Registry operations
    // ========================================

    pub fn register_field(&self, id: impl Into<String>, original: impl Into<Value>) -> Result<()> {
        self.inner.state.lock().registry.register_field(id, original)
    }

    /// Track an additional composite (saved with the form data)
    pub fn register_composite(&self, id: impl Into<String>, source: Arc<dyn Capturable>) -> Result<()> {
        self.inner.state.lock().registry.register_composite(id, source)
    }

    pub fn unregister_field(&self, id: &str) -> bool {
        let mut state = self.inner.state.lock();
        let removed = state.registry.unregister_field(id);
        if removed {
            self.recheck(&mut state);
        }
        removed
    }

    /// Set a simple field's current value and recheck
    ///
    /// Updating an unregistered field is a programming error: it is logged
    /// and changes nothing.
    pub fn update_field(&self, id: &str, value: impl Into<Value>) -> Result<()> {
        let mut state = self.inner.state.lock();
        match state.registry.update_field(id, value) {
            Ok(()) => {
                self.recheck(&mut state);
                Ok(())
            }
            Err(e) => {
                error!("update_field(\"{}\") ignored: {}", id, e);
                Err(e)
            }
        }
    }

    /// Recheck dirty state after a composite changed
    pub fn notify_change(&self) {
        let mut state = self.inner.state.lock();
        self.recheck(&mut state);
    }

    pub fn field_value(&self, id: &str) -> Option<Value> {
        self.inner.state.lock().registry.current(id)
    }

    pub fn original_value(&self, id: &str) -> Option<Value> {
        self.inner.state.lock().registry.original(id)
    }

    pub fn changed_fields(&self) -> Vec<String> {
        self.inner.state.lock().registry.changed_ids()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().dirty.is_dirty()
    }

    pub fn is_saving(&self) -> bool {
        self.inner.state.lock().is_saving
    }

    pub fn affordances(&self) -> Affordances {
        let state = self.inner.state.lock();
        state.dirty.affordances(state.is_saving)
    }

    pub fn autosave_enabled(&self) -> bool {
        self.inner.state.lock().autosave_enabled
    }

    pub fn autosave_pending(&self) -> bool {
        self.inner.state.lock().autosave.is_pending()
    }

    // ========================================
    // Dirty state and autosave
    // ========================================

    pub(crate) fn emit_dirty(&self, is_dirty: bool) {
        self.inner.events.emit_lossy(EditorEvent::DirtyStateChanged {
            is_dirty,
            timestamp: Utc::now(),
        });
    }

    /// Recompute the dirty flag, announcing a flip; returns the new value
    fn refresh_dirty(&self, state: &mut EditorState) -> bool {
        let recheck = state.dirty.recheck(&state.registry);
        if recheck.flipped {
            debug!(is_dirty = recheck.is_dirty, "Dirty state changed");
            self.emit_dirty(recheck.is_dirty);
        }
        recheck.is_dirty
    }

    /// Refresh the dirty flag, then re-arm autosave (dirty) or cancel it (clean)
    pub(crate) fn recheck(&self, state: &mut EditorState) {
        if self.refresh_dirty(state) {
            self.schedule_autosave(state);
        } else {
            state.autosave.cancel();
        }
    }

    /// Arm (or re-arm) the autosave timer if autosave applies right now
    fn schedule_autosave(&self, state: &mut EditorState) {
        if !state.autosave_enabled || state.is_saving || !state.dirty.is_dirty() {
            return;
        }
        let session = Arc::downgrade(&self.inner);
        let armed = state
            .autosave
            .arm(move |generation| fire_autosave(session, generation).boxed());
        if armed.is_some() {
            self.inner.events.emit_lossy(EditorEvent::AutosaveScheduled {
                delay_ms: state.autosave.delay().as_millis() as u64,
                timestamp: Utc::now(),
            });
        }
    }

    /// Toggle autosave and persist the preference immediately
    ///
    /// The preference is written by its own request, outside the main save
    /// cycle. On failure it stays dirty, so the next save carries it.
    pub async fn set_autosave_enabled(&self, enabled: bool) -> std::result::Result<(), SaveError> {
        {
            let mut state = self.inner.state.lock();
            state.autosave_enabled = enabled;
            if !state.registry.contains(AUTOSAVE_FIELD) {
                if let Err(e) = state.registry.register_field(AUTOSAVE_FIELD, !enabled) {
                    warn!("Autosave preference not tracked: {}", e);
                }
            }
            if let Err(e) = state.registry.update_field(AUTOSAVE_FIELD, enabled) {
                warn!("Autosave preference not tracked: {}", e);
            }
            if !enabled {
                state.autosave.cancel();
            }
            // Autosave re-arms only once the preference write has settled
            self.refresh_dirty(&mut state);
        }

        let flag = if enabled { "true" } else { "false" };
        let body = json!({ AUTOSAVE_KEY: flag });
        let result = self
            .inner
            .gateway
            .submit(GatewayAction::SaveAdminSettings, body)
            .await
            .map_err(SaveError::from)
            .and_then(|response| {
                if response.success {
                    Ok(())
                } else {
                    Err(SaveError::Rejected(
                        response
                            .message
                            .unwrap_or_else(|| "Failed to save autosave preference".to_string()),
                    ))
                }
            });

        let mut state = self.inner.state.lock();
        if result.is_ok() {
            state.registry.commit_field(AUTOSAVE_FIELD, Value::Bool(enabled));
        }
        self.recheck(&mut state);
        drop(state);

        match &result {
            Ok(()) => {
                info!(enabled, "Autosave preference saved");
                self.inner.events.emit_lossy(EditorEvent::AutosavePreferenceChanged {
                    enabled,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => error!("Failed to persist autosave preference: {}", e),
        }
        result
    }
}

/// Body of the armed autosave timer
async fn fire_autosave(session: Weak<Inner>, generation: u64) {
    let Some(inner) = session.upgrade() else {
        return;
    };
    let session = AdminSession { inner };
    {
        let mut state = session.inner.state.lock();
        if !state.autosave.take_fired(generation) {
            debug!(generation, "Stale autosave timer ignored");
            return;
        }
        if !state.autosave_enabled || state.is_saving || !state.dirty.is_dirty() {
            debug!(generation, "Autosave no longer applicable");
            return;
        }
        if !state.registry.has_changes() {
            debug!(generation, "Nothing left to autosave");
            session.refresh_dirty(&mut state);
            return;
        }
    }

    info!(generation, "Autosave firing");
    if let Err(e) = session.run_save(SaveOptions::default()).await {
        warn!("Autosave failed: {}", e);
    }
}
