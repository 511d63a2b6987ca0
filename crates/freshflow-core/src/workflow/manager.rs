//! Background run management.
//!
//! `WorkflowManager` turns a module configuration into a running workflow:
//! it initializes the run's state, then builds and executes the definition on
//! a tokio task. At most `max_concurrent_runs` runs execute at once; the rest
//! wait for a permit. Every run is exposed through a [`RunHandle`] with a
//! live status, cancellation, and a join future.

use std::sync::Arc;
use std::time::Duration;

use freshflow_types::config::EngineConfig;
use freshflow_types::error::RepositoryError;
use freshflow_types::event::WorkflowEvent;
use freshflow_types::module::WorkflowConfig;
use freshflow_types::state::{WorkflowRunStatus, WorkflowState};
use futures_util::Stream;
use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::builder::GraphBuilder;
use super::definition::WorkflowError;
use super::engine::{EngineError, ExecutionResult, RunObserver, WorkflowEngine};
use super::observer::StateObserver;
use crate::event::{EventBus, Mailbox, event_stream};
use crate::repository::StateStore;

/// Errors surfaced by the manager and by finished runs.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The configuration could not be turned into a definition.
    #[error(transparent)]
    Build(#[from] WorkflowError),

    /// A task or the declared outputs failed.
    #[error(transparent)]
    Execution(#[from] EngineError),

    #[error("workflow cancelled")]
    Cancelled,

    #[error("state store error: {0}")]
    Repository(#[from] RepositoryError),

    /// The run's task panicked or was aborted.
    #[error("run task failed: {0}")]
    Join(String),
}

// ---------------------------------------------------------------------------
// Run handle
// ---------------------------------------------------------------------------

/// Handle to one background run.
#[derive(Debug)]
pub struct RunHandle {
    workflow_id: String,
    status: watch::Receiver<WorkflowRunStatus>,
    cancel: CancellationToken,
    join: JoinHandle<Result<ExecutionResult, ManagerError>>,
}

impl RunHandle {
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Latest run status.
    pub fn status(&self) -> WorkflowRunStatus {
        *self.status.borrow()
    }

    /// A receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<WorkflowRunStatus> {
        self.status.clone()
    }

    /// Request cancellation. The run ends `FAILED` at its next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish.
    pub async fn join(self) -> Result<ExecutionResult, ManagerError> {
        self.join
            .await
            .map_err(|e| ManagerError::Join(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Bounded pool of background workflow runs sharing one engine, state store,
/// and event bus.
pub struct WorkflowManager<S> {
    engine: WorkflowEngine,
    store: Arc<S>,
    bus: Arc<EventBus>,
    permits: Arc<Semaphore>,
    poll_interval: Duration,
}

impl<S: StateStore + 'static> WorkflowManager<S> {
    /// Build a manager whose event bus and run pool are sized by `config`.
    pub fn new(engine: WorkflowEngine, store: Arc<S>, config: &EngineConfig) -> Self {
        Self {
            engine,
            store,
            bus: Arc::new(EventBus::new(config.mailbox_capacity)),
            permits: Arc::new(Semaphore::new(config.max_concurrent_runs.max(1))),
            poll_interval: config.listener_poll_interval(),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Start a run under a freshly generated workflow ID.
    pub async fn create_workflow(&self, config: WorkflowConfig) -> Result<RunHandle, ManagerError> {
        self.start_workflow(Uuid::now_v7().to_string(), config).await
    }

    /// Start a run under `workflow_id`.
    ///
    /// Initializes the run's state before returning. Building and validating
    /// the definition happens on the run's task, so configuration errors end
    /// the run `FAILED` rather than failing this call.
    pub async fn start_workflow(
        &self,
        workflow_id: impl Into<String>,
        config: WorkflowConfig,
    ) -> Result<RunHandle, ManagerError> {
        let workflow_id = workflow_id.into();
        let module_ids: Vec<String> = config.modules.keys().cloned().collect();
        self.store.initialize_workflow(&workflow_id, &module_ids).await?;

        let (status_tx, status_rx) = watch::channel(WorkflowRunStatus::Pending);
        let cancel = CancellationToken::new();
        let observer = Arc::new(StateObserver::new(self.store.clone(), self.bus.clone()));

        let run = Run {
            workflow_id: workflow_id.clone(),
            config,
            engine: self.engine.clone(),
            store: self.store.clone(),
            observer,
            permits: self.permits.clone(),
            cancel: cancel.clone(),
            status: status_tx,
        };
        let join = tokio::spawn(run.drive());

        tracing::info!(workflow_id = %workflow_id, "workflow submitted");
        Ok(RunHandle {
            workflow_id,
            status: status_rx,
            cancel,
            join,
        })
    }

    /// Current state of a run.
    pub async fn get_workflow_status(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowState>, ManagerError> {
        Ok(self.store.get_workflow_status(workflow_id).await?)
    }

    /// Subscribe a raw mailbox to a run's events.
    pub fn subscribe(&self, workflow_id: &str) -> Mailbox {
        self.bus.subscribe(workflow_id)
    }

    /// Live event stream for a run, ending when `cancel` fires.
    pub fn stream_events(
        &self,
        workflow_id: &str,
        cancel: CancellationToken,
    ) -> impl Stream<Item = WorkflowEvent> + Send + 'static {
        event_stream(self.bus.clone(), workflow_id, cancel, self.poll_interval)
    }
}

/// Everything one background run owns.
struct Run<S> {
    workflow_id: String,
    config: WorkflowConfig,
    engine: WorkflowEngine,
    store: Arc<S>,
    observer: Arc<StateObserver<S>>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    status: watch::Sender<WorkflowRunStatus>,
}

impl<S: StateStore + 'static> Run<S> {
    async fn drive(self) -> Result<ExecutionResult, ManagerError> {
        let workflow_id = self.workflow_id.as_str();

        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.permits.clone().acquire_owned() => permit.ok(),
        };

        let outcome = match permit {
            None => Err(ManagerError::Cancelled),
            Some(_permit) => {
                self.set_status(WorkflowRunStatus::Running).await;
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(ManagerError::Cancelled),
                    result = self.execute() => result,
                }
            }
        };

        match &outcome {
            Ok(result) => {
                self.observer
                    .on_workflow_complete(workflow_id, &result.outputs)
                    .await;
                let _ = self.status.send(WorkflowRunStatus::Completed);
            }
            Err(e) => {
                self.observer
                    .on_workflow_error(workflow_id, &e.to_string())
                    .await;
                let _ = self.status.send(WorkflowRunStatus::Failed);
            }
        }
        outcome
    }

    async fn execute(&self) -> Result<ExecutionResult, ManagerError> {
        let definition = GraphBuilder::new(self.config.clone()).create_workflow_definition()?;
        let observer = self.observer.clone() as Arc<dyn RunObserver>;
        Ok(self
            .engine
            .execute(&self.workflow_id, &definition, vec![observer])
            .await?)
    }

    async fn set_status(&self, status: WorkflowRunStatus) {
        let _ = self.status.send(status);
        if let Err(e) = self
            .store
            .update_workflow_status(&self.workflow_id, status, None)
            .await
        {
            tracing::error!(workflow_id = %self.workflow_id, error = %e, "failed to record workflow status");
        }
    }
}
