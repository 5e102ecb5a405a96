//! # Funmap Admin
//!
//! Change-tracking engine of the Funmap admin editor.
//!
//! **Purpose:** Know at any instant whether anything in the nested
//! venue/session/pricing graph (plus flat settings, messages, and checkout
//! options) differs from the last saved state, keep mirrored copies consistent
//! while edits happen, and persist or discard the differences.
//!
//! **Architecture:**
//! - [`registry`] / [`dirty`]: baselines and the single dirty flag
//! - [`mirror`] / [`autofill`]: propagation with one-way locks
//! - [`venue_editor`], [`messages`], [`checkout`]: stateful components
//! - [`save`] / [`discard`] / [`autosave`]: orchestration
//! - [`session::AdminSession`]: the facade tying it together

pub mod autofill;
pub mod autosave;
pub mod checkout;
pub mod dirty;
pub mod discard;
pub mod gateway;
pub mod messages;
pub mod mirror;
pub mod model;
pub mod registry;
pub mod save;
pub mod session;
pub mod settings;
pub mod venue_editor;

pub use discard::DiscardOutcome;
pub use gateway::{GatewayError, HttpGateway, SaveGateway};
pub use registry::{Capturable, FieldRegistry};
pub use save::{SaveError, SaveOptions, SaveOutcome, Subsystem};
pub use session::{AdminSession, BlockedSubsystem, ChangeNotifier, Workspace};
