//! Process engine contract and the in-process implementation.
//!
//! The service talks to its orchestrator through the narrow
//! [`ProcessEngine`] trait: start a process instance, get its key back.
//! Everything else (step sequencing, job re-delivery, retry budgets,
//! incidents) happens on the engine's side of the line.
//!
//! [`InProcessEngine`] is that other side, in miniature. A process
//! definition is an ordered list of job types; each job type maps to a
//! registered [`JobHandler`]. The mapping is resolved when the engine
//! is built, so a missing handler is a startup error, not a runtime
//! surprise. Instances are driven by a spawned task: steps run in
//! order, a failed step is re-delivered under the same job key until
//! its attempt budget runs out, and the instance settles as
//! [`ProcessState::Completed`] or [`ProcessState::Incident`].

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How a job invocation failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Terminal failure: the engine must stop this instance and raise
    /// an incident for operator attention.
    #[error("Job raised an incident: {0}")]
    Incident(String),

    /// Transient failure: the engine may re-deliver the job under the
    /// same key.
    #[error("Job failed, retry possible: {0}")]
    Retryable(String),
}

/// Errors from the engine surface itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No process definition registered under this id.
    #[error("Unknown process definition: {0}")]
    UnknownProcess(String),

    /// A process step names a job type with no registered handler.
    #[error("No handler registered for job type: {0}")]
    MissingHandler(String),

    /// No instance with this key was ever started.
    #[error("Unknown process instance: {0}")]
    UnknownInstance(i64),

    /// The driving task went away before the instance settled.
    #[error("Process driver stopped before instance {0} settled")]
    DriverStopped(i64),
}

/// Lifecycle of one process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Steps are still running.
    Active,
    /// Every step completed.
    Completed,
    /// A step failed terminally or exhausted its attempts.
    Incident,
}

/// Receipt for a started process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartedProcess {
    /// Engine-assigned key identifying the instance.
    pub process_instance_key: i64,
}

/// One delivery of one step to a worker.
///
/// Re-delivery of a failed step reuses the same `key`, which is what
/// lets workers derive a stable command id from it.
#[derive(Debug, Clone)]
pub struct Job {
    /// Engine-assigned key, stable across re-deliveries of this step.
    pub key: i64,
    /// Which handler this job is for.
    pub job_type: String,
    /// Instance this job belongs to.
    pub process_instance_key: i64,
    /// Variables the instance was started with.
    pub variables: HashMap<String, Value>,
}

/// A worker for one job type.
pub trait JobHandler: Send + Sync {
    /// Execute one job delivery.
    ///
    /// # Errors
    ///
    /// [`WorkerError::Incident`] stops the instance;
    /// [`WorkerError::Retryable`] asks for re-delivery.
    fn handle(&self, job: Job)
    -> Pin<Box<dyn Future<Output = Result<(), WorkerError>> + Send + '_>>;
}

/// The orchestrator as the rest of the service sees it.
pub trait ProcessEngine: Send + Sync {
    /// Start an instance of a registered process definition.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownProcess`] for an unregistered id.
    fn start_process(
        &self,
        process_id: &str,
        variables: HashMap<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<StartedProcess, EngineError>> + Send + '_>>;
}

/// A step with its handler already resolved.
#[derive(Clone)]
struct Step {
    job_type: String,
    handler: Arc<dyn JobHandler>,
}

/// In-process [`ProcessEngine`] driving instances on spawned tasks.
pub struct InProcessEngine {
    processes: HashMap<String, Arc<Vec<Step>>>,
    step_attempts: usize,
    next_key: Arc<AtomicI64>,
    instances: Mutex<HashMap<i64, watch::Receiver<ProcessState>>>,
}

impl InProcessEngine {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> InProcessEngineBuilder {
        InProcessEngineBuilder::default()
    }

    /// Block until an instance settles, returning its terminal state.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownInstance`] if the key was never started;
    /// [`EngineError::DriverStopped`] if the driving task went away
    /// first.
    pub async fn wait_for_completion(
        &self,
        process_instance_key: i64,
    ) -> Result<ProcessState, EngineError> {
        let mut receiver = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&process_instance_key)
            .cloned()
            .ok_or(EngineError::UnknownInstance(process_instance_key))?;

        let state = receiver
            .wait_for(|state| *state != ProcessState::Active)
            .await
            .map_err(|_| EngineError::DriverStopped(process_instance_key))?;

        Ok(*state)
    }

    /// Current state of an instance, if it was ever started.
    #[must_use]
    pub fn state_of(&self, process_instance_key: i64) -> Option<ProcessState> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&process_instance_key)
            .map(|receiver| *receiver.borrow())
    }

    /// Number of instances ever started.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ProcessEngine for InProcessEngine {
    fn start_process(
        &self,
        process_id: &str,
        variables: HashMap<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<StartedProcess, EngineError>> + Send + '_>> {
        let steps = self.processes.get(process_id).cloned();
        let process_id = process_id.to_string();

        Box::pin(async move {
            let Some(steps) = steps else {
                return Err(EngineError::UnknownProcess(process_id));
            };

            let process_instance_key = self.next_key.fetch_add(1, Ordering::Relaxed);
            let (sender, receiver) = watch::channel(ProcessState::Active);
            self.instances
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(process_instance_key, receiver);

            info!(
                %process_id,
                process.instance.key = process_instance_key,
                "Process instance started"
            );

            tokio::spawn(drive(
                process_instance_key,
                steps,
                variables,
                Arc::clone(&self.next_key),
                self.step_attempts,
                sender,
            ));

            Ok(StartedProcess {
                process_instance_key,
            })
        })
    }
}

/// Run one instance's steps in order and settle its state.
async fn drive(
    process_instance_key: i64,
    steps: Arc<Vec<Step>>,
    variables: HashMap<String, Value>,
    next_key: Arc<AtomicI64>,
    step_attempts: usize,
    sender: watch::Sender<ProcessState>,
) {
    for step in steps.iter() {
        let job_key = next_key.fetch_add(1, Ordering::Relaxed);
        let mut attempts_left = step_attempts;

        loop {
            let job = Job {
                key: job_key,
                job_type: step.job_type.clone(),
                process_instance_key,
                variables: variables.clone(),
            };

            match step.handler.handle(job).await {
                Ok(()) => break,
                Err(WorkerError::Incident(reason)) => {
                    warn!(
                        job_type = %step.job_type,
                        process.instance.key = process_instance_key,
                        %reason,
                        "Job raised an incident"
                    );
                    let _ = sender.send(ProcessState::Incident);
                    return;
                }
                Err(WorkerError::Retryable(reason)) => {
                    attempts_left = attempts_left.saturating_sub(1);
                    if attempts_left == 0 {
                        warn!(
                            job_type = %step.job_type,
                            process.instance.key = process_instance_key,
                            %reason,
                            "Job exhausted its attempts, raising an incident"
                        );
                        let _ = sender.send(ProcessState::Incident);
                        return;
                    }

                    debug!(
                        job_type = %step.job_type,
                        job_key,
                        attempts_left,
                        "Job failed, re-delivering under the same key"
                    );
                }
            }
        }
    }

    debug!(
        process.instance.key = process_instance_key,
        "Process instance completed"
    );
    let _ = sender.send(ProcessState::Completed);
}

/// Builder wiring process definitions to job handlers.
#[derive(Default)]
pub struct InProcessEngineBuilder {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    processes: Vec<(String, Vec<String>)>,
    step_attempts: usize,
}

impl InProcessEngineBuilder {
    /// Register a handler for a job type.
    #[must_use]
    pub fn register(mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(job_type.into(), handler);
        self
    }

    /// Define a process as an ordered list of job types.
    #[must_use]
    pub fn process<I, S>(mut self, process_id: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processes
            .push((process_id.into(), steps.into_iter().map(Into::into).collect()));
        self
    }

    /// Attempt budget per step before an incident (defaults to 3).
    #[must_use]
    pub const fn step_attempts(mut self, attempts: usize) -> Self {
        self.step_attempts = attempts;
        self
    }

    /// Resolve every step against the registered handlers.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingHandler`] naming the first job
    /// type that no handler covers.
    pub fn build(self) -> Result<InProcessEngine, EngineError> {
        let mut processes = HashMap::new();

        for (process_id, steps) in self.processes {
            let mut resolved = Vec::with_capacity(steps.len());
            for job_type in steps {
                let handler = self
                    .handlers
                    .get(&job_type)
                    .ok_or_else(|| EngineError::MissingHandler(job_type.clone()))?;
                resolved.push(Step {
                    job_type,
                    handler: Arc::clone(handler),
                });
            }
            processes.insert(process_id, Arc::new(resolved));
        }

        Ok(InProcessEngine {
            processes,
            step_attempts: if self.step_attempts == 0 {
                3
            } else {
                self.step_attempts
            },
            next_key: Arc::new(AtomicI64::new(1)),
            instances: Mutex::new(HashMap::new()),
        })
    }
}
