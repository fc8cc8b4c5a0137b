//! Transfer endpoint: accept a transfer request and start its saga.
//!
//! `POST /transfers` never waits for the money to move. It mints a
//! transfer id, starts a process instance, and answers `202 Accepted`
//! with the ids the client needs to follow up. The debit and booking
//! happen asynchronously on the engine's schedule.
//!
//! With an `Idempotency-Key` header, the request claims the key first:
//! the first request for a key starts the saga and records the
//! response, duplicates replay that response verbatim, and a failed
//! first attempt releases the key for a retry. The recorded response
//! is returned byte-for-byte equal, including the process instance
//! key.

use crate::idempotency::Claim;
use crate::saga::trace::{TRACEPARENT_VARIABLE, current_traceparent, extract_trace_context};
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::types::{AcceptedTransfer, AccountId, Money, TransferId};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{Instrument, Span, debug, info};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Body of `POST /transfers`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Account to debit.
    pub account_id: AccountId,
    /// Amount to transfer, in minor units.
    pub amount: Money,
}

/// Accept a transfer and start its process instance.
///
/// # Errors
///
/// - `422` when `accountId` is blank
/// - `400` when the `Idempotency-Key` header is not valid UTF-8
/// - `500` when the process engine refuses to start the instance
pub async fn create_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<AcceptedTransfer>), ApiError> {
    if request.account_id.as_str().trim().is_empty() {
        return Err(ApiError::validation("accountId must not be empty"));
    }

    let inbound_traceparent = headers
        .get("traceparent")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let idempotency_key = match headers.get("idempotency-key") {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| ApiError::bad_request("Idempotency-Key must be valid UTF-8"))?
                .to_string(),
        ),
        None => None,
    };

    let Some(key) = idempotency_key else {
        let accepted = start_transfer(&state, &request, inbound_traceparent.as_deref()).await?;
        return Ok((StatusCode::ACCEPTED, Json(accepted)));
    };

    match state.idempotency.claim(&key).await {
        Claim::Replayed(accepted) => {
            debug!(%key, transfer_id = %accepted.transfer_id, "Replaying recorded transfer response");
            Ok((StatusCode::ACCEPTED, Json(accepted)))
        }
        Claim::New(token) => {
            // A failure here drops the token, releasing the key for a
            // retry to claim.
            let accepted = start_transfer(&state, &request, inbound_traceparent.as_deref()).await?;
            token.fulfill(accepted.clone());
            Ok((StatusCode::ACCEPTED, Json(accepted)))
        }
    }
}

/// Mint the transfer id and start the process instance, inside the
/// request's server span.
async fn start_transfer(
    state: &AppState,
    request: &TransferRequest,
    inbound_traceparent: Option<&str>,
) -> Result<AcceptedTransfer, ApiError> {
    let transfer_id = TransferId::generate();

    let span = tracing::info_span!(
        "transfer.create",
        otel.kind = "server",
        transfer.id = %transfer_id,
        account.id = %request.account_id,
        amount = request.amount.value(),
        process.instance.key = tracing::field::Empty,
    );
    if let Some(parent) = extract_trace_context(inbound_traceparent) {
        span.set_parent(parent);
    }

    async {
        let mut variables: HashMap<String, Value> = HashMap::from([
            ("accountId".to_string(), json!(request.account_id)),
            ("amount".to_string(), json!(request.amount)),
            ("transferId".to_string(), json!(transfer_id)),
        ]);
        if let Some(token) = current_traceparent() {
            variables.insert(TRACEPARENT_VARIABLE.to_string(), json!(token));
        }

        let started = state
            .engine
            .start_process(&state.process_id, variables)
            .await?;

        Span::current().record("process.instance.key", started.process_instance_key);
        info!(
            transfer_id = %transfer_id,
            process.instance.key = started.process_instance_key,
            "Transfer accepted"
        );

        Ok(AcceptedTransfer {
            transfer_id: transfer_id.clone(),
            process_instance_key: started.process_instance_key,
        })
    }
    .instrument(span)
    .await
}
