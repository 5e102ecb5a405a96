//! Common error types for the Funmap editor

use thiserror::Error;

/// Common result type for editor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the editor crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON snapshot or payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A field was updated before `register_field` was called for it
    #[error("Field \"{0}\" was not registered before being updated")]
    UnregisteredField(String),

    /// A field id was registered twice without unregistering it first
    #[error("Field \"{0}\" is already registered")]
    AlreadyRegistered(String),

    /// Requested venue/session/slot/version/tier does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or structural edit
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Required context (e.g. the site currency) is not configured
    #[error("Missing required context: {0}")]
    MissingContext(String),

    /// User-facing validation rule failed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
