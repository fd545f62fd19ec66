//! HTTP API.
//!
//! Routes are nested under `/api/`. Protected routes pass through the
//! request gate: Authenticate → Authorize → Subscription → Feature → Handler.
//!
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server; `start_server()` runs it on its own listener.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer, ApiSession};
pub use types::ApiContext;
