use axum::http::StatusCode;
use thiserror::Error;

/// Failure reported by the data or auth collaborator.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ServiceError {
    /// True when the failure most likely means the session is no longer valid.
    pub fn is_auth_related(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CONFLICT, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }

    fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unauthorized(message) => Self::unauthorized(message),
            ServiceError::NotFound(message) => Self::not_found(message),
            ServiceError::Rejected { status, message } => match StatusCode::from_u16(status) {
                Ok(code) if code.is_client_error() => Self::with_status(code, message),
                _ => Self::bad_gateway(message),
            },
            other => Self::bad_gateway(other.to_string()),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_client_errors_keep_their_status() {
        let err: AppError = ServiceError::Rejected {
            status: 409,
            message: "duplicate".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "duplicate");
    }

    #[test]
    fn upstream_failures_become_bad_gateway() {
        let err: AppError = ServiceError::Rejected {
            status: 503,
            message: "down".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);

        let err: AppError = ServiceError::Transport("reset".into()).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn only_unauthorized_is_auth_related() {
        assert!(ServiceError::Unauthorized("JWT expired".into()).is_auth_related());
        assert!(!ServiceError::NotFound("habit".into()).is_auth_related());
    }
}
