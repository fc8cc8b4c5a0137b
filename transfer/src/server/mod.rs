//! HTTP surface of the transfer service.
//!
//! Two routes: `POST /transfers` accepts work, `GET /healthz` answers
//! liveness probes. Request/response logging rides on tower-http's
//! `TraceLayer`.

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the service router over shared state.
#[must_use]
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/transfers", post(handlers::create_transfer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
