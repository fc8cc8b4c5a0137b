//! Application state shared across HTTP handlers.

use crate::idempotency::IdempotencyStore;
use crate::router::CommandRouter;
use crate::saga::engine::ProcessEngine;
use std::sync::Arc;

/// Shared state handed to every handler.
///
/// Everything is behind an `Arc`, so the per-request clone Axum makes
/// is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Command router the workers execute through.
    pub router: Arc<CommandRouter>,
    /// Orchestrator that drives transfer process instances.
    pub engine: Arc<dyn ProcessEngine>,
    /// Response cache keyed by `Idempotency-Key`.
    pub idempotency: Arc<IdempotencyStore>,
    /// Process definition started for each transfer.
    pub process_id: String,
}
