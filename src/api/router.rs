//! HTTP router.
//!
//! Returns a composable `Router` with every endpoint under `/api/`.
//!
//! Layers (outermost → innermost):
//! 1. CORS (when configured) → 2. `Cache-Control: no-store` → 3. Request log
//! → 4. Authenticate (protected routes) → 5. Authorize → 6. Subscription
//! → 7. Feature → Handler
//!
//! Stages 5-7 are attached per route through `gate`.

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post, put, MethodRouter};
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints::{analytics, auth, health, lab, nursing, patients, records, tenants, users};
use crate::api::error;
use crate::api::middleware::auth::require_auth;
use crate::api::middleware::authorize::authorize;
use crate::api::middleware::request_log::{log_access, tag_caller};
use crate::api::middleware::subscription::{feature_guard, subscription_guard};
use crate::api::types::{ApiContext, TENANT_HEADER};
use crate::authorization::Action;
use crate::core_state::CoreState;
use crate::models::enums::Feature;

/// Tenant checks a route runs after the role check.
#[derive(Debug, Clone, Copy)]
enum Entitlement {
    /// Account-level routes: no tenant checks.
    Account,
    Subscription,
    /// Subscription, then the named feature flag.
    Feature(Feature),
}

/// Wrap one route in authorize → subscription → feature.
///
/// `MethodRouter::layer` wraps what is already there, so the innermost
/// stage is added first.
fn gate(
    route: MethodRouter<ApiContext>,
    action: Action,
    entitlement: Entitlement,
) -> MethodRouter<ApiContext> {
    let route = match entitlement {
        Entitlement::Feature(feature) => route
            .layer(from_fn_with_state(feature, feature_guard))
            .layer(from_fn(subscription_guard)),
        Entitlement::Subscription => route.layer(from_fn(subscription_guard)),
        Entitlement::Account => route,
    };
    route.layer(from_fn_with_state(action, authorize))
}

/// Build the API router.
///
/// Middleware reads `Extension<ApiContext>` (outermost layer); handlers use
/// `State<ApiContext>`.
pub fn api_router(core: Arc<CoreState>) -> Router {
    error::set_expose_detail(!core.config().environment.is_production());
    let cors = core.config().cors_origin.clone();
    let router = build_router(ApiContext::new(core));

    match cors.as_deref().map(cors_layer) {
        Some(Some(layer)) => router.layer(layer),
        Some(None) => {
            tracing::warn!(origin = ?cors, "Ignoring unparseable CORS origin");
            router
        }
        None => router,
    }
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = origin.parse::<HeaderValue>().ok()?;
    let tenant_header = HeaderName::from_bytes(TENANT_HEADER.as_bytes()).ok()?;
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                AUTHORIZATION,
                CONTENT_TYPE,
                tenant_header,
            ]),
    )
}

fn build_router(ctx: ApiContext) -> Router {
    use Entitlement::{Account as Open, Feature as Flag, Subscription as Paid};

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    // The same path with another method needs its own `.route` so each
    // method carries its own gate; axum merges them.
    let protected = Router::new()
        // Account
        .route("/auth/me", gate(get(auth::me), Action::ProfileRead, Open))
        .route(
            "/auth/preferences",
            gate(put(auth::preferences), Action::ProfileRead, Open),
        )
        .route(
            "/auth/password",
            gate(put(auth::password), Action::ProfileRead, Open),
        )
        // Platform administration
        .route("/tenants", gate(post(tenants::create), Action::TenantManage, Open))
        .route(
            "/tenants/:key/subscription",
            gate(put(tenants::update_subscription), Action::TenantManage, Open),
        )
        .route(
            "/tenants/:key/features",
            gate(put(tenants::update_features), Action::TenantManage, Open),
        )
        .route("/users", gate(post(users::create), Action::UserManage, Paid))
        // Patients and encounters
        .route("/patients", gate(post(patients::create), Action::PatientCreate, Paid))
        .route("/patients", gate(get(patients::list), Action::PatientRead, Paid))
        .route("/patients/:id", gate(get(patients::detail), Action::PatientRead, Paid))
        .route("/patients/:id", gate(put(patients::update), Action::PatientUpdate, Paid))
        .route(
            "/patients/:id/records",
            gate(get(records::list_for_patient), Action::RecordRead, Paid),
        )
        .route("/records", gate(post(records::create), Action::RecordCreate, Paid))
        .route("/records/:id", gate(delete(records::delete), Action::RecordCreate, Paid))
        // Nursing
        .route(
            "/nursing/orders",
            gate(
                post(nursing::create),
                Action::NursingOrderCreate,
                Flag(Feature::NursingModule),
            ),
        )
        .route(
            "/nursing/orders/pending",
            gate(
                get(nursing::pending),
                Action::NursingOrderRead,
                Flag(Feature::NursingModule),
            ),
        )
        .route(
            "/nursing/orders/:id/start",
            gate(
                put(nursing::start),
                Action::NursingOrderExecute,
                Flag(Feature::NursingModule),
            ),
        )
        .route(
            "/nursing/orders/:id/complete",
            gate(
                put(nursing::complete),
                Action::NursingOrderExecute,
                Flag(Feature::NursingModule),
            ),
        )
        .route(
            "/nursing/orders/:id/cancel",
            gate(
                put(nursing::cancel),
                Action::NursingOrderCancel,
                Flag(Feature::NursingModule),
            ),
        )
        // Lab (no feature flag)
        .route("/lab/catalog", gate(get(lab::catalog), Action::LabCatalogRead, Paid))
        .route(
            "/lab/catalog/:id/toggle",
            gate(put(lab::toggle), Action::LabCatalogToggle, Paid),
        )
        .route("/lab/orders", gate(post(lab::create_order), Action::LabOrderCreate, Paid))
        .route("/lab/orders/:id", gate(get(lab::order_detail), Action::LabOrderRead, Paid))
        .route(
            "/lab/orders/:id/start",
            gate(put(lab::start_order), Action::LabOrderExecute, Paid),
        )
        .route(
            "/lab/orders/:id/results",
            gate(put(lab::record_results), Action::LabOrderExecute, Paid),
        )
        // Analytics
        .route(
            "/analytics/dynamic",
            gate(
                get(analytics::dynamic),
                Action::AnalyticsView,
                Flag(Feature::Analytics),
            ),
        )
        .route(
            "/analytics/diagnosis-breakdown",
            gate(
                get(analytics::diagnosis_breakdown),
                Action::AnalyticsView,
                Flag(Feature::Analytics),
            ),
        )
        .with_state(ctx.clone())
        .layer(from_fn(tag_caller))
        .layer(from_fn(require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(Extension(ctx.clone()));

    let public = Router::new()
        .route("/health", get(health::check))
        .route("/auth/login", post(auth::login))
        .with_state(ctx.clone())
        .layer(Extension(ctx));

    Router::new()
        .nest("/api", public.merge(protected))
        .layer(from_fn(log_access))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}
