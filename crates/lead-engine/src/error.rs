//! Error types for lead orchestration.

use database::{DatabaseError, ValidationError};
use thiserror::Error;

/// Errors returned by a [`LeadBackend`](crate::LeadBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    /// The requested row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A uniqueness constraint rejected the write.
    #[error("{entity} already exists: {id}")]
    Conflict { entity: String, id: String },

    /// The backend refused the request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A remote function failed or answered with an unexpected shape.
    #[error("rpc {function} failed: {message}")]
    Rpc { function: String, message: String },

    /// Storage failure.
    #[error("database error: {0}")]
    Database(DatabaseError),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

impl From<DatabaseError> for BackendError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity, id } => BackendError::NotFound {
                entity: entity.to_string(),
                id,
            },
            DatabaseError::AlreadyExists { entity, id } => BackendError::Conflict {
                entity: entity.to_string(),
                id,
            },
            DatabaseError::InvalidInput(message) => BackendError::InvalidRequest(message),
            other => BackendError::Database(other),
        }
    }
}

/// Uniform error surfaced by the lead services.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The operation needs a signed-in user.
    #[error("not authenticated")]
    Unauthenticated,

    /// Input rejected locally; nothing was sent to the backend.
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// A backend call failed.
    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    /// The company already holds an active bid on the lead.
    #[error("company {company_id} already has an active bid on lead {lead_id}")]
    DuplicateActiveBid { lead_id: String, company_id: String },

    /// The operation needs a company context.
    #[error("no company selected")]
    NoCompany,
}

impl ApiError {
    /// Wrap a backend failure and log it with its module and operation.
    pub(crate) fn backend(module: &'static str, operation: &'static str, source: BackendError) -> Self {
        tracing::error!(module, operation, error = %source, "Backend call failed");
        ApiError::Backend { operation, source }
    }

    /// The backend cause, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            ApiError::Backend { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from address lookups.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("address service returned status {0}")]
    Status(u16),
}

/// Errors from loading [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_map_to_backend_kinds() {
        let err: BackendError = DatabaseError::NotFound {
            entity: "Lead",
            id: "l1".to_string(),
        }
        .into();
        assert!(err.is_not_found());

        let err: BackendError = DatabaseError::AlreadyExists {
            entity: "ActiveBid",
            id: "l1/c1".to_string(),
        }
        .into();
        assert!(matches!(err, BackendError::Conflict { ref entity, .. } if entity == "ActiveBid"));
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let err = ApiError::Validation(vec![
            ValidationError::Empty("title".to_string()),
            ValidationError::Empty("category".to_string()),
        ]);
        let message = err.to_string();
        assert!(message.contains("title"));
        assert!(message.contains("category"));
    }
}
