use axum::{
    Json, Router,
    extract::Request,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{IntoMakeService, get},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use utils::headers::{entity_creation_alert, entity_deletion_alert, entity_update_alert};

use crate::{DeploymentImpl, error::ApiError, middleware as app_middleware};

pub mod attendees;
pub mod conferences;
pub mod params;
pub mod sessions;
pub mod speakers;
pub mod validation;

async fn health_check() -> &'static str {
    "OK"
}

/// PUT/PATCH on a collection path.
async fn missing_id() -> ApiError {
    ApiError::MethodNotAllowed
}

/// The API router without the make-service wrapper; used by tests.
pub fn app(deployment: DeploymentImpl) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .merge(conferences::router(&deployment))
        .merge(sessions::router(&deployment))
        .merge(speakers::router(&deployment))
        .merge(attendees::router(&deployment))
        .layer(middleware::from_fn_with_state(
            deployment.clone(),
            app_middleware::failure_alert,
        ))
        .with_state(deployment);

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn(app_middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
}

pub fn router(deployment: DeploymentImpl) -> IntoMakeService<Router> {
    app(deployment).into_make_service()
}

/// Store-assigned id of a row that was just written.
pub(crate) fn persisted_id(id: Option<i64>) -> Result<i64, ApiError> {
    id.ok_or(ApiError::Database(sqlx::Error::RowNotFound))
}

pub(crate) fn created<T: Serialize>(
    app_name: &str,
    entity_name: &str,
    collection: &str,
    id: i64,
    body: T,
) -> Response {
    (
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/{collection}/{id}"))],
        entity_creation_alert(app_name, entity_name, &id.to_string()),
        Json(body),
    )
        .into_response()
}

pub(crate) fn updated<T: Serialize>(app_name: &str, entity_name: &str, id: i64, body: T) -> Response {
    (
        entity_update_alert(app_name, entity_name, &id.to_string()),
        Json(body),
    )
        .into_response()
}

pub(crate) fn deleted(app_name: &str, entity_name: &str, id: i64) -> Response {
    (
        StatusCode::NO_CONTENT,
        entity_deletion_alert(app_name, entity_name, &id.to_string()),
    )
        .into_response()
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, Response, StatusCode},
    };
    use db::DBService;
    use local_deployment::LocalDeployment;
    use serde_json::Value;
    use tower::ServiceExt;
    use utils::config::AppConfig;

    pub const APP: &str = "conferenceApp";

    pub async fn test_app() -> Router {
        let db = DBService::new_in_memory()
            .await
            .expect("failed to open sqlite memory db");
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            "APP_NAME" => Some(APP.to_string()),
            "DEFAULT_PAGE_SIZE" => Some("2".to_string()),
            _ => None,
        });
        super::app(LocalDeployment::from_parts(db, config))
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(
                    "content-type",
                    if method == "PATCH" {
                        "application/merge-patch+json"
                    } else {
                        "application/json"
                    },
                )
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        let response: Response<Body> = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, headers, value)
    }

    pub fn header<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> &'a str {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::test_support::*;

    #[tokio::test]
    async fn health_responds_ok() {
        let app = test_app().await;
        let (status, headers, body) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!("OK"));
        assert!(!header(&headers, "x-request-id").is_empty());
    }

    #[tokio::test]
    async fn update_without_id_is_not_allowed() {
        let app = test_app().await;
        for (method, uri) in [
            ("PUT", "/api/conferences"),
            ("PATCH", "/api/sessions"),
            ("PUT", "/api/speakers"),
            ("PATCH", "/api/attendees"),
        ] {
            let (status, _, _) =
                send(&app, method, uri, Some(serde_json::json!({"id": 1}))).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method} {uri}");
        }
    }
}
