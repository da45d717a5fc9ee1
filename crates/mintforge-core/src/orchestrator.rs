//! Worker orchestration

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::RunConfiguration;
use crate::telemetry::{LogEntry, TelemetryAggregator, TelemetrySnapshot};
use crate::worker::{
    Envelope, SearchWorker, TelemetryEvent, TelemetrySink, WorkerError, WorkerInput,
};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Worker count must be at least 1")]
    InvalidWorkerCount,
    #[error("Failed to create worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to spawn telemetry dispatcher: {0}")]
    Dispatcher(#[from] std::io::Error),
}

/// Handle to one spawned worker
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    index: usize,
    cancel: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl WorkerHandle {
    /// Ordinal of the worker within its run
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether termination has been requested
    pub fn is_terminated(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Whether the worker's task has returned
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    fn terminate(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

struct ActiveRun {
    config: RunConfiguration,
    handles: Vec<WorkerHandle>,
    // Dropping the pool does not wait for running tasks
    _pool: rayon::ThreadPool,
}

/// Owns the run lifecycle: Idle when `run` is `None`, Running otherwise.
///
/// Workers are tasks on a rayon pool with one thread per worker. Their
/// telemetry flows through a crossbeam channel to a single dispatcher thread,
/// which is the only writer to the aggregator during a run.
///
/// Termination is cooperative at the thread level: `stop` raises each
/// worker's cancel flag and forgets the handle without joining. Anything the
/// worker sends afterwards is discarded, so from the caller's side the worker
/// is gone as soon as `stop` returns.
pub struct Orchestrator {
    worker: Arc<dyn SearchWorker>,
    aggregator: Arc<TelemetryAggregator>,
    worker_count: usize,
    run: Option<ActiveRun>,
}

impl Orchestrator {
    /// Create an idle orchestrator that will run `worker` on every spawn
    pub fn new(worker: impl SearchWorker + 'static) -> Self {
        Self::with_worker(Arc::new(worker))
    }

    pub fn with_worker(worker: Arc<dyn SearchWorker>) -> Self {
        Self {
            worker,
            aggregator: Arc::new(TelemetryAggregator::new(1)),
            worker_count: 1,
            run: None,
        }
    }

    /// Spawn `worker_count` workers for `config`.
    ///
    /// An active run is stopped and replaced. Returns as soon as the spawn
    /// requests are issued. Log history and the success counter carry over;
    /// the rate array is reset to `worker_count` empty slots.
    pub fn start(
        &mut self,
        config: RunConfiguration,
        worker_count: usize,
    ) -> Result<(), OrchestratorError> {
        if worker_count == 0 {
            return Err(OrchestratorError::InvalidWorkerCount);
        }
        if self.run.is_some() {
            info!("Replacing active run");
            self.stop();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("mint-worker-{i}"))
            .build()?;

        let (tx, rx) = unbounded();
        let generation = self.aggregator.begin_run(worker_count);
        self.worker_count = worker_count;

        let aggregator = Arc::clone(&self.aggregator);
        if let Err(e) = thread::Builder::new()
            .name("mint-telemetry".to_string())
            .spawn(move || dispatch(rx, aggregator))
        {
            self.aggregator.end_run();
            return Err(e.into());
        }

        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let cancel = Arc::new(AtomicBool::new(false));
            let finished = Arc::new(AtomicBool::new(false));
            let sink = TelemetrySink::new(index, generation, Arc::clone(&cancel), tx.clone());
            let input = WorkerInput::new(&config, index);
            let worker = Arc::clone(&self.worker);
            let done = Arc::clone(&finished);

            pool.spawn(move || {
                run_worker(worker.as_ref(), input, sink);
                done.store(true, Ordering::Relaxed);
            });
            handles.push(WorkerHandle {
                index,
                cancel,
                finished,
            });
        }

        info!(
            workers = worker_count,
            tick = %config.tick(),
            difficulty = %config.difficulty(),
            environment = %config.environment(),
            "Started mint run"
        );

        self.run = Some(ActiveRun {
            config,
            handles,
            _pool: pool,
        });
        Ok(())
    }

    /// Terminate every worker of the current run. No-op when idle.
    pub fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };

        for handle in &run.handles {
            handle.terminate();
        }
        self.aggregator.end_run();
        info!(workers = run.handles.len(), "Stopped mint run");
    }

    /// Change the worker count for the next run.
    ///
    /// While idle this resizes the rate array and returns `true`. While a run
    /// is active it does nothing and returns `false`; stop first.
    pub fn set_worker_count(&mut self, worker_count: usize) -> Result<bool, OrchestratorError> {
        if worker_count == 0 {
            return Err(OrchestratorError::InvalidWorkerCount);
        }
        if self.run.is_some() {
            warn!(
                requested = worker_count,
                current = self.worker_count,
                "Worker count change ignored while running"
            );
            return Ok(false);
        }
        self.worker_count = worker_count;
        self.aggregator.resize(worker_count);
        Ok(true)
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Workers of the current run whose task has not returned yet
    pub fn active_workers(&self) -> usize {
        self.handles().iter().filter(|h| !h.is_finished()).count()
    }

    /// Worker count of the current run, or the one prepared for the next
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Handles of the current run, ordered by ordinal
    pub fn handles(&self) -> &[WorkerHandle] {
        match &self.run {
            Some(run) => &run.handles,
            None => &[],
        }
    }

    /// Configuration of the current run
    pub fn config(&self) -> Option<&RunConfiguration> {
        self.run.as_ref().map(|run| &run.config)
    }

    /// Controller log line; not counted as a success
    pub fn log(&self, message: impl Into<String>) {
        self.aggregator.push_log(LogEntry::info(message));
    }

    /// Controller error line; not counted as a success
    pub fn log_error(&self, message: impl Into<String>) {
        self.aggregator.push_log(LogEntry::error(message));
    }

    pub fn clear_logs(&self) {
        self.aggregator.clear();
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.aggregator.snapshot()
    }

    /// Shared aggregator, for readers on other threads
    pub fn aggregator(&self) -> Arc<TelemetryAggregator> {
        Arc::clone(&self.aggregator)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch(rx: Receiver<Envelope>, aggregator: Arc<TelemetryAggregator>) {
    for envelope in rx.iter() {
        if !aggregator.on_run_event(envelope.generation, envelope.index, envelope.event) {
            trace!(worker = envelope.index, "dropped event from finished run");
        }
    }
    debug!("Telemetry dispatcher exiting");
}

fn run_worker(worker: &dyn SearchWorker, input: WorkerInput, sink: TelemetrySink) {
    let index = sink.index();
    debug!(worker = index, "Worker started");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.run(input, &sink)));
    let failure = match outcome {
        Ok(Ok(())) | Ok(Err(WorkerError::Cancelled)) | Ok(Err(WorkerError::ChannelClosed)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };

    match failure {
        Some(message) => {
            warn!(worker = index, error = %message, "Worker failed");
            let _ = sink.emit(TelemetryEvent::error(format!("Worker {index} error: {message}")));
        }
        None => debug!(worker = index, "Worker exited"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
