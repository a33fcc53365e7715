//! Access gate middleware

use crate::access_control::GateRequest;
use crate::server::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Run every request through the access gate
///
/// Rejections are answered with a JSON body and the inner service is never
/// called. Admitted requests carry the resolved [`Identity`] as an extension
/// when one was established.
///
/// [`Identity`]: crate::access_control::Identity
pub async fn gate_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    // Only the head is inspected; the body stays untouched for the handler
    let (mut parts, body) = request.into_parts();

    let decision = state.gate.evaluate(&GateRequest::from_parts(&parts)).await;

    if let Some(rejection) = decision.rejection() {
        return (decision.status(), Json(rejection)).into_response();
    }

    if let Some(identity) = decision.identity {
        parts.extensions.insert(identity);
    }

    next.run(Request::from_parts(parts, body)).await
}
