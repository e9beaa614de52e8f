// src/error.rs

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RanagError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("validation failed: {}", violations.join("; "))]
    Validation { violations: Vec<String> },

    #[error("worker address '{address}' is already registered")]
    AddressConflict { address: String },

    #[error("worker at '{address}' unreachable: {message}")]
    Unreachable {
        address: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("worker at '{address}' returned HTTP status {status}")]
    BadStatus { address: String, status: u16 },

    #[error("undecodable response from '{address}': {message}")]
    Decode { address: String, message: String },

    #[error("store error: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type Result<T> = std::result::Result<T, RanagError>;

// Convenience constructors
impl RanagError {
    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn validation(violations: Vec<String>) -> Self {
        Self::Validation { violations }
    }

    pub fn address_conflict(address: impl Into<String>) -> Self {
        Self::AddressConflict {
            address: address.into(),
        }
    }

    pub fn unreachable(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            address: address.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn unreachable_with_source(
        address: impl Into<String>,
        message: impl Into<String>,
        source: reqwest::Error,
    ) -> Self {
        Self::Unreachable {
            address: address.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn bad_status(address: impl Into<String>, status: u16) -> Self {
        Self::BadStatus {
            address: address.into(),
            status,
        }
    }

    pub fn decode(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            source: None,
        }
    }

    pub fn store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for errors raised while talking to a worker process.
    pub fn is_dispatch(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::BadStatus { .. } | Self::Decode { .. }
        )
    }
}
