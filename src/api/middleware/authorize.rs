//! Authorize stage: role capability check for one `Action`.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::AuthContext;
use crate::authorization::Action;

/// Used as `from_fn_with_state(Action::X, authorize)`.
pub async fn authorize(State(action): State<Action>, req: Request, next: Next) -> Response {
    let Some(auth) = req.extensions().get::<AuthContext>() else {
        return ApiError::Unauthenticated("Not authenticated".into()).into_response();
    };
    if !auth.identity.role.permits(action) {
        tracing::info!(
            user = %auth.identity.id,
            role = %auth.identity.role,
            ?action,
            "Role not permitted"
        );
        return ApiError::Forbidden(format!(
            "User role '{}' is not authorized to access this resource",
            auth.identity.role
        ))
        .into_response();
    }
    next.run(req).await
}
