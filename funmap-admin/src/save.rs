//! Save orchestration
//!
//! One save attempt collects every changed field, groups the changes into one
//! request per subsystem, submits the requests concurrently, and then:
//!
//! - all succeeded: the baselines advance to exactly what was sent, then the
//!   dirty state is rechecked (edits made while the requests were in flight
//!   stay dirty and re-arm autosave)
//! - some failed: only the fields carried by succeeded requests advance; the
//!   dirty flag is left as it was and a failure is reported with its kind
//!
//! `is_saving` guards the whole attempt; a second call while one is in flight
//! returns [`SaveOutcome::AlreadySaving`] without doing anything.

use crate::checkout::CHECKOUT_FIELD;
use crate::gateway::{GatewayError, SaveGateway};
use crate::messages::{self, MESSAGES_FIELD};
use crate::registry::FieldRegistry;
use crate::session::AdminSession;
use crate::settings;
use chrono::Utc;
use funmap_common::api::GatewayAction;
use funmap_common::events::{EditorEvent, SaveFailureKind};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Persistence subsystem a save request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    /// Flat settings (`settings.*`, `map.*`, `checkout.*`, `system_images.*`)
    Settings,
    /// Message catalog
    Messages,
    /// Checkout options
    CheckoutOptions,
    /// Nested form data (venues and other composites)
    FormData,
}

impl Subsystem {
    pub fn for_composite(id: &str) -> Self {
        match id {
            MESSAGES_FIELD => Subsystem::Messages,
            CHECKOUT_FIELD => Subsystem::CheckoutOptions,
            _ => Subsystem::FormData,
        }
    }

    pub fn action(self) -> GatewayAction {
        match self {
            Subsystem::FormData => GatewayAction::SaveForm,
            _ => GatewayAction::SaveAdminSettings,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Subsystem::Settings => "settings",
            Subsystem::Messages => "messages",
            Subsystem::CheckoutOptions => "checkout options",
            Subsystem::FormData => "form data",
        }
    }
}

/// Baseline to advance once a request succeeds
#[derive(Debug, Clone, PartialEq)]
pub enum Commit {
    /// Simple field; the baseline becomes the value that was sent
    Field { id: String, value: Value },
    /// Composite; the baseline becomes the snapshot captured for the request
    Composite { id: String, snapshot: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub subsystem: Subsystem,
    pub body: Value,
    pub commits: Vec<Commit>,
}

/// Options for one save attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Ask the UI to close the panel once everything saved
    pub close_after: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Every request succeeded
    Saved { requests: usize },
    /// Nothing differed from baseline
    NothingToSave,
    /// Another save is in flight; this call did nothing
    AlreadySaving,
}

/// Save failure, classified for the user
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SaveError {
    /// The server could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// The server refused or garbled a request
    #[error("Save rejected: {0}")]
    Rejected(String),
}

impl SaveError {
    pub fn kind(&self) -> SaveFailureKind {
        match self {
            SaveError::Network(_) => SaveFailureKind::Network,
            SaveError::Rejected(_) => SaveFailureKind::Rejected,
        }
    }
}

impl From<GatewayError> for SaveError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Network(message) => SaveError::Network(message),
            GatewayError::Rejected(message) => SaveError::Rejected(message),
            GatewayError::Decode(message) => SaveError::Rejected(format!("unexpected response: {}", message)),
        }
    }
}

/// Group the registry's changes into one request per subsystem
///
/// Simple fields outside the settings routes are ignored (logged).
pub fn build_requests(registry: &FieldRegistry) -> Vec<SaveRequest> {
    let mut requests = Vec::new();

    let changed = registry.changed_simple_values();
    if !changed.is_empty() {
        let (body, covered) = settings::settings_body(&changed);
        for (id, _) in changed.iter().filter(|(id, _)| !covered.contains(id)) {
            warn!("Changed field \"{}\" has no save route; skipped", id);
        }
        if !covered.is_empty() {
            let commits = changed
                .into_iter()
                .filter(|(id, _)| covered.contains(id))
                .map(|(id, value)| Commit::Field { id, value })
                .collect();
            requests.push(SaveRequest {
                subsystem: Subsystem::Settings,
                body,
                commits,
            });
        }
    }

    let mut form_data = Map::new();
    let mut form_commits = Vec::new();
    for (id, baseline, source) in registry.changed_composites() {
        let snapshot = source.capture();
        match Subsystem::for_composite(&id) {
            Subsystem::Messages => requests.push(SaveRequest {
                subsystem: Subsystem::Messages,
                body: messages::modified_messages(&baseline, &snapshot),
                commits: vec![Commit::Composite { id, snapshot }],
            }),
            Subsystem::CheckoutOptions => {
                let mut body = Map::new();
                body.insert(CHECKOUT_FIELD.to_string(), source.payload());
                requests.push(SaveRequest {
                    subsystem: Subsystem::CheckoutOptions,
                    body: Value::Object(body),
                    commits: vec![Commit::Composite { id, snapshot }],
                });
            }
            Subsystem::FormData | Subsystem::Settings => {
                form_data.insert(id.clone(), source.payload());
                form_commits.push(Commit::Composite { id, snapshot });
            }
        }
    }
    if !form_commits.is_empty() {
        requests.push(SaveRequest {
            subsystem: Subsystem::FormData,
            body: Value::Object(form_data),
            commits: form_commits,
        });
    }

    requests
}

async fn submit_one(gateway: &dyn SaveGateway, request: &SaveRequest) -> Result<(), SaveError> {
    let response = gateway
        .submit(request.subsystem.action(), request.body.clone())
        .await?;
    if response.success {
        Ok(())
    } else {
        Err(SaveError::Rejected(response.message.unwrap_or_else(|| {
            format!("Failed to save {}", request.subsystem.label())
        })))
    }
}

/// Advance the baselines carried by succeeded requests; returns how many
fn apply_commits(
    registry: &mut FieldRegistry,
    requests: &[SaveRequest],
    results: &[Result<(), SaveError>],
) -> usize {
    let mut committed = 0;
    for (request, result) in requests.iter().zip(results) {
        if result.is_err() {
            continue;
        }
        for commit in &request.commits {
            match commit {
                Commit::Field { id, value } => {
                    registry.commit_field(id, value.clone());
                }
                Commit::Composite { id, snapshot } => {
                    registry.commit_composite(id, snapshot.clone());
                }
            }
        }
        committed += 1;
    }
    committed
}

/// Submit every request concurrently; results are in request order
pub async fn submit_all(gateway: &dyn SaveGateway, requests: &[SaveRequest]) -> Vec<Result<(), SaveError>> {
    join_all(requests.iter().map(|request| submit_one(gateway, request))).await
}

impl AdminSession {
    /// Persist every pending change
    pub async fn run_save(&self, options: SaveOptions) -> Result<SaveOutcome, SaveError> {
        let requests = {
            let mut state = self.inner.state.lock();
            if state.is_saving {
                debug!("Save requested while another is in flight; ignored");
                return Ok(SaveOutcome::AlreadySaving);
            }
            state.autosave.cancel();

            if !state.registry.has_changes() {
                state.registry.mark_all_saved();
                if state.dirty.clear() {
                    self.emit_dirty(false);
                }
                if options.close_after {
                    self.inner.events.emit_lossy(EditorEvent::PanelCloseRequested {
                        timestamp: Utc::now(),
                    });
                }
                return Ok(SaveOutcome::NothingToSave);
            }

            let requests = build_requests(&state.registry);
            if requests.is_empty() {
                return Ok(SaveOutcome::NothingToSave);
            }
            state.is_saving = true;
            requests
        };

        let save_id = Uuid::new_v4();
        info!(%save_id, requests = requests.len(), "Saving changes");
        self.inner.events.emit_lossy(EditorEvent::SaveStarted {
            save_id,
            request_count: requests.len(),
            timestamp: Utc::now(),
        });

        let results = submit_all(self.inner.gateway.as_ref(), &requests).await;

        let mut state = self.inner.state.lock();
        state.is_saving = false;

        let committed = apply_commits(&mut state.registry, &requests, &results);

        let first_error = results.iter().find_map(|result| result.as_ref().err()).cloned();
        let Some(error) = first_error else {
            self.recheck(&mut state);
            let pending = state.dirty.is_dirty();
            drop(state);

            if pending {
                info!(%save_id, "Save complete; edits made during the save are still pending");
            } else {
                info!(%save_id, "Save complete");
            }
            self.inner.events.emit_lossy(EditorEvent::SaveSucceeded {
                save_id,
                timestamp: Utc::now(),
            });
            if options.close_after {
                self.inner.events.emit_lossy(EditorEvent::PanelCloseRequested {
                    timestamp: Utc::now(),
                });
            }
            return Ok(SaveOutcome::Saved {
                requests: requests.len(),
            });
        };

        drop(state);

        warn!(
            %save_id,
            committed,
            failed = requests.len() - committed,
            "Save failed: {}",
            error
        );
        self.inner.events.emit_lossy(EditorEvent::SaveFailed {
            save_id,
            kind: error.kind(),
            message: error.to_string(),
            timestamp: Utc::now(),
        });
        Err(error)
    }
}
