use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    graph::GraphError,
    models::{
        attendee::AttendeeError, conference::ConferenceError, session::SessionError,
        speaker::SpeakerError,
    },
    pagination::PaginationError,
};
use deployment::DeploymentError;
use serde_json::json;
use thiserror::Error;

/// Marker left on a 400 response; `middleware::failure_alert` turns it into
/// the `X-<app>-error` / `X-<app>-params` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureAlert {
    pub entity_name: &'static str,
    pub error_key: &'static str,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequestAlert {
        entity_name: &'static str,
        error_key: &'static str,
        message: String,
    },
    #[error("Not Found")]
    NotFound,
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
}

impl ApiError {
    pub fn bad_request(
        entity_name: &'static str,
        error_key: &'static str,
        message: impl Into<String>,
    ) -> Self {
        ApiError::BadRequestAlert {
            entity_name,
            error_key,
            message: message.into(),
        }
    }

    fn invalid_sort(entity_name: &'static str, err: PaginationError) -> Self {
        Self::bad_request(entity_name, "sortinvalid", err.to_string())
    }
}

impl From<ConferenceError> for ApiError {
    fn from(err: ConferenceError) -> Self {
        match err {
            ConferenceError::Database(e) => ApiError::Database(e),
            ConferenceError::NotFound => ApiError::NotFound,
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Database(e) => ApiError::Database(e),
            SessionError::Pagination(e) => ApiError::invalid_sort("session", e),
            SessionError::NotFound => ApiError::NotFound,
        }
    }
}

impl From<SpeakerError> for ApiError {
    fn from(err: SpeakerError) -> Self {
        match err {
            SpeakerError::Database(e) => ApiError::Database(e),
            SpeakerError::NotFound => ApiError::NotFound,
        }
    }
}

impl From<AttendeeError> for ApiError {
    fn from(err: AttendeeError) -> Self {
        match err {
            AttendeeError::Database(e) => ApiError::Database(e),
            AttendeeError::Pagination(e) => ApiError::invalid_sort("attendee", e),
            AttendeeError::NotFound => ApiError::NotFound,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequestAlert {
                entity_name,
                error_key,
                message,
            } => {
                let body = json!({
                    "message": message,
                    "entityName": entity_name,
                    "errorKey": error_key,
                    "status": StatusCode::BAD_REQUEST.as_u16(),
                });
                let mut response = (StatusCode::BAD_REQUEST, Json(body)).into_response();
                response.extensions_mut().insert(FailureAlert {
                    entity_name,
                    error_key,
                });
                response
            }
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
            err => {
                tracing::error!("Request failed: {}", err);
                let body = json!({
                    "message": "Internal server error",
                    "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
