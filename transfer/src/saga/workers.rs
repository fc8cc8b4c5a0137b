//! Job workers: the saga's two steps, as [`JobHandler`]s over the
//! command router.
//!
//! Both workers follow the same delivery discipline:
//!
//! - The command id is the job key, so a re-delivered job repeats the
//!   command id and is absorbed as a duplicate downstream.
//! - The correlation id is the process instance key, tying every event
//!   back to its saga run.
//! - Each delivery runs inside a consumer span parented by the job's
//!   `traceparent` variable; failures mark the span and propagate to
//!   the engine undampened.
//! - A terminal domain rejection becomes [`WorkerError::Incident`];
//!   transient store trouble becomes [`WorkerError::Retryable`] and
//!   the engine re-delivers under the same key.

use crate::aggregates::{BookLedger, DebitAccount};
use crate::router::CommandRouter;
use crate::saga::engine::{Job, JobHandler, WorkerError};
use crate::saga::trace::job_span;
use crate::types::{AccountId, Money, TransferId};
use moneyrail_runtime::{CommandError, SagaMetrics};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{Instrument, Span, warn};

/// Job type of the debit step.
pub const DEBIT_JOB_TYPE: &str = "orchestration.account.debit";

/// Job type of the ledger booking step.
pub const BOOK_JOB_TYPE: &str = "orchestration.ledger.book";

/// Variables a transfer job carries, read leniently: missing strings
/// are empty, a missing amount is zero.
struct JobVariables {
    account_id: AccountId,
    transfer_id: TransferId,
    amount: Money,
}

impl JobVariables {
    fn read(variables: &HashMap<String, Value>) -> Self {
        let text = |key: &str| {
            variables
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            account_id: AccountId::new(text("accountId")),
            transfer_id: TransferId::new(text("transferId")),
            amount: Money::new(
                variables
                    .get("amount")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
            ),
        }
    }
}

fn to_worker_error(error: &CommandError) -> WorkerError {
    if error.is_transient() {
        WorkerError::Retryable(error.to_string())
    } else {
        WorkerError::Incident(error.to_string())
    }
}

async fn run_job(
    router: &CommandRouter,
    job_type: &'static str,
    command: crate::router::TransferCommand,
) -> Result<(), WorkerError> {
    match router.dispatch(command).await {
        Ok(outcome) => {
            SagaMetrics::record_completed(job_type);
            if outcome.duplicate {
                warn!(job_type, "Re-delivered job absorbed as duplicate");
            }
            Ok(())
        }
        Err(error) => {
            Span::current().record("otel.status_code", "ERROR");
            warn!(job_type, error = %error, "Job execution failed");
            SagaMetrics::record_failed(job_type);
            Err(to_worker_error(&error))
        }
    }
}

/// Worker for the debit step.
pub struct DebitWorker {
    router: Arc<CommandRouter>,
}

impl DebitWorker {
    /// Create a debit worker over the router.
    #[must_use]
    pub const fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }
}

impl JobHandler for DebitWorker {
    fn handle(
        &self,
        job: Job,
    ) -> Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + '_>> {
        let variables = JobVariables::read(&job.variables);
        let span = job_span(&job, variables.transfer_id.as_str());

        let command = DebitAccount {
            account_id: variables.account_id,
            amount: variables.amount,
            transfer_id: variables.transfer_id,
            command_id: job.key.to_string(),
            correlation_id: job.process_instance_key.to_string(),
        };

        Box::pin(run_job(&self.router, DEBIT_JOB_TYPE, command.into()).instrument(span))
    }
}

/// Worker for the ledger booking step.
pub struct BookWorker {
    router: Arc<CommandRouter>,
}

impl BookWorker {
    /// Create a booking worker over the router.
    #[must_use]
    pub const fn new(router: Arc<CommandRouter>) -> Self {
        Self { router }
    }
}

impl JobHandler for BookWorker {
    fn handle(
        &self,
        job: Job,
    ) -> Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + '_>> {
        let variables = JobVariables::read(&job.variables);
        let span = job_span(&job, variables.transfer_id.as_str());

        let command = BookLedger {
            transfer_id: variables.transfer_id,
            account_id: variables.account_id,
            amount: variables.amount,
            command_id: job.key.to_string(),
            correlation_id: job.process_instance_key.to_string(),
        };

        Box::pin(run_job(&self.router, BOOK_JOB_TYPE, command.into()).instrument(span))
    }
}
