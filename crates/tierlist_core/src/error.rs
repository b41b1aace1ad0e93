//! Recoverable failure taxonomy for the arrangement engine and its collaborators.

use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Validation,
    NotFoundOrForbidden,
    StaleReference,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{resource} was not found or is not accessible")]
    NotFoundOrForbidden { resource: String },
    #[error("stale reference: {0}")]
    StaleReference(String),
}

impl ClientError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFoundOrForbidden {
            resource: resource.into(),
        }
    }

    pub fn stale(message: impl Into<String>) -> Self {
        Self::StaleReference(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFoundOrForbidden { .. } => ErrorKind::NotFoundOrForbidden,
            Self::StaleReference(_) => ErrorKind::StaleReference,
        }
    }

    /// Text for a transient notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Could not reach the server; please try again.".to_string(),
            Self::Validation(message) => message.clone(),
            Self::NotFoundOrForbidden { resource } => {
                format!("The {resource} could not be found or you do not have access to it.")
            }
            Self::StaleReference(_) => {
                "That item or tier is no longer on the board; the move was ignored.".to_string()
            }
        }
    }

    /// Maps a backend error body onto the taxonomy; `resource` names what was requested.
    pub fn from_api_error(error: ApiError, resource: &str) -> Self {
        match error.code {
            code if code.is_access_denied() => Self::not_found(resource),
            ErrorCode::Validation => Self::Validation(error.message),
            _ => Self::Network(error.message),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        Self::Network(value.to_string())
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_access_denied_codes_to_not_found_or_forbidden() {
        for code in [ErrorCode::Unauthorized, ErrorCode::Forbidden, ErrorCode::NotFound] {
            let err = ClientError::from_api_error(ApiError::new(code, "nope"), "tier list");
            assert_eq!(err.kind(), ErrorKind::NotFoundOrForbidden);
        }
    }

    #[test]
    fn keeps_server_validation_message() {
        let err = ClientError::from_api_error(
            ApiError::new(ErrorCode::Validation, "name is required"),
            "template",
        );
        assert_eq!(err, ClientError::validation("name is required"));
        assert_eq!(err.user_message(), "name is required");
    }

    #[test]
    fn internal_errors_surface_as_network_failures() {
        let err = ClientError::from_api_error(
            ApiError::new(ErrorCode::Internal, "db down"),
            "template",
        );
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
