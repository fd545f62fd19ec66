//! One access line per request: method, path, status, caller and latency.
//! Runs outside authentication so rejected requests are logged too.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::AuthContext;

/// Carries the caller out of the inner layers so the access line can name it.
#[derive(Debug, Clone)]
pub(crate) struct LoggedCaller {
    pub user: uuid::Uuid,
    pub tenant: String,
}

pub async fn log_access(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match response.extensions().get::<LoggedCaller>() {
        Some(caller) => tracing::info!(
            %method,
            %path,
            status,
            elapsed_ms,
            user = %caller.user,
            tenant = %caller.tenant,
            "API request"
        ),
        None => tracing::info!(%method, %path, status, elapsed_ms, "API request"),
    }
    response
}

/// Copies the authenticated caller onto the response for `log_access`.
pub async fn tag_caller(req: Request, next: Next) -> Response {
    let caller = req.extensions().get::<AuthContext>().map(|auth| LoggedCaller {
        user: auth.identity.id,
        tenant: auth.identity.tenant_key.clone(),
    });
    let mut response = next.run(req).await;
    if let Some(caller) = caller {
        response.extensions_mut().insert(caller);
    }
    response
}
