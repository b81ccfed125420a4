//! Unified error type for the invoicing core.
//!
//! User-facing conditions (validation, not found, access denied, conflict, bad
//! credentials) carry a displayable message. Store and infrastructure failures are
//! opaque: their `Display` never exposes driver diagnostics, the source is kept for logs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Access denied")]
    AccessDenied,

    #[error("{message}")]
    Conflict { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error")]
    Database(#[from] sea_orm::DbErr),

    #[error("Internal error")]
    PasswordHash(String),

    #[error("Internal error")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// True for failures the caller cannot act on (store, hashing, I/O).
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::PasswordHash(_) | Self::Io(_) | Self::EnvVar(_)
        )
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_keys()
            .map(|field| field.to_string())
            .collect();
        fields.sort_unstable();
        Self::validation(format!("invalid field(s): {}", fields.join(", ")))
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
