use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::backend::BackendError;
use crate::calendar::CalendarError;
use crate::lesson_form::FormError;
use crate::records::ApprovalError;
use crate::session::SessionError;

/// Body of every console error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    NotFound(String),
    MethodNotAllowed(String),
    Conflict(String),
    Upstream(StatusCode, String),
    BadGateway(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(status, _) => *status,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::MethodNotAllowed(msg)
            | ApiError::Conflict(msg)
            | ApiError::Upstream(_, msg)
            | ApiError::BadGateway(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<BackendError> for ApiError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::AccessDenied => ApiError::Forbidden(value.to_string()),
            BackendError::Status { status, message } => ApiError::Upstream(status, message),
            BackendError::MissingUsername(_) => ApiError::BadRequest(value.to_string()),
            BackendError::Transport(ref err) => {
                error!("HTTP error: {err}");
                ApiError::BadGateway("Failed to reach the backend".into())
            }
            BackendError::Decode(_) | BackendError::MissingProfileId(_) => {
                error!("Backend response error: {value}");
                ApiError::BadGateway(value.to_string())
            }
            BackendError::Url(_) | BackendError::InvalidBaseUrl => {
                ApiError::Internal(value.to_string())
            }
        }
    }
}

impl From<FormError> for ApiError {
    fn from(value: FormError) -> Self {
        ApiError::BadRequest(value.to_string())
    }
}

impl From<ApprovalError> for ApiError {
    fn from(value: ApprovalError) -> Self {
        match value {
            ApprovalError::AlreadyApproved(_) => ApiError::Conflict(value.to_string()),
            _ => ApiError::BadRequest(value.to_string()),
        }
    }
}

impl From<CalendarError> for ApiError {
    fn from(value: CalendarError) -> Self {
        ApiError::BadRequest(value.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(value: SessionError) -> Self {
        ApiError::BadRequest(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_map_to_statuses() {
        let denied: ApiError = BackendError::AccessDenied.into();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(denied.message(), "Access denied: insufficient permissions");

        let relayed: ApiError = BackendError::Status {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "Classroom is busy".into(),
        }
        .into();
        assert_eq!(relayed.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(relayed.message(), "Classroom is busy");
    }

    #[test]
    fn test_form_errors_are_bad_requests() {
        let err: ApiError = FormError::EndNotAfterStart.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "End time must be after start time");
    }

    #[test]
    fn test_approval_errors() {
        let twice: ApiError = ApprovalError::AlreadyApproved(11).into();
        assert_eq!(twice.status(), StatusCode::CONFLICT);
        let missing: ApiError = ApprovalError::MissingGroup.into();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            missing.message(),
            "Please select a group for the theory application"
        );
    }
}
