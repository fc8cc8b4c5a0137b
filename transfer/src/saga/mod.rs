//! Saga orchestration: the process engine contract, the transfer
//! workers, and trace context propagation across the hops.
//!
//! A money transfer is one process instance with two sequenced steps,
//! debit then book. The engine owns sequencing and re-delivery; the
//! workers here translate job deliveries into router commands.

pub mod engine;
pub mod trace;
pub mod workers;

pub use engine::{
    EngineError, InProcessEngine, InProcessEngineBuilder, Job, JobHandler, ProcessEngine,
    ProcessState, StartedProcess, WorkerError,
};
pub use trace::{TRACEPARENT_VARIABLE, current_traceparent, extract_trace_context, job_span};
pub use workers::{BOOK_JOB_TYPE, BookWorker, DEBIT_JOB_TYPE, DebitWorker};

/// Process definition id of the two-step money transfer.
pub const MONEY_TRANSFER_PROCESS: &str = "MoneyTransferProcess";
