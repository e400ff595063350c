//! Rules store error types.

use thiserror::Error;

/// Errors surfaced by the rules store and its collections.
#[derive(Error, Debug)]
pub enum RulesError {
    /// An operation required a record that does not exist.
    #[error("no rules record for chat {0}")]
    NotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("malformed rules document: {0}")]
    Decode(#[from] mongodb::bson::de::Error),

    #[error("failed to encode rules document: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl RulesError {
    /// Whether this is the missing-record case rather than a backend failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, RulesError>;
