use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use deployment::Deployment;
use utils::headers::failure_alert as failure_alert_headers;

use crate::{DeploymentImpl, error::FailureAlert};

/// Adds `X-<app>-error` / `X-<app>-params` to responses produced by a
/// rejected request.
pub async fn failure_alert(
    State(deployment): State<DeploymentImpl>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if let Some(alert) = response.extensions_mut().remove::<FailureAlert>() {
        tracing::warn!(
            "Rejected request for {}: error.{}",
            alert.entity_name,
            alert.error_key
        );
        let headers = failure_alert_headers(
            &deployment.config().app_name,
            alert.entity_name,
            alert.error_key,
        );
        response.headers_mut().extend(headers);
    }
    response
}
