//! The fan-out run: pool lifecycle, result handling and completion.
//!
//! [`ProcessorBuilder`] collects configuration and produces a
//! [`ConcurrentProcessor`]. [`ConcurrentProcessor::run`] drives an explicit
//! state machine:
//!
//! ```text
//! Idle → Dispatching → AwaitingResults → Dispatching | Completed | Failed | Cancelled
//! ```
//!
//! Each result is handed to `on_process` first. If the abort signal is set at
//! that point the run stops; otherwise the slot goes idle and another dispatch
//! round runs. Every exit path terminates the pool.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{HostParallelism, Parallelism, PoolSettings};
use crate::dispatch::{DispatchOutcome, Dispatcher, Read, Reader, TransferCheck};
use crate::error::FanoutError;
use crate::pool::Pool;
use crate::signal::AbortSignal;
use crate::stack::PendingStack;
use crate::transfer::Transfer;
use crate::worker::{Worker, WorkerContext};

/// Builds one worker per slot.
pub type WorkerFactory<W> = Box<dyn Fn(WorkerContext) -> W + Send + Sync>;

/// Receives every worker result, including results flushed after cancellation.
pub type ProcessCallback<V> = Box<dyn FnMut(V) + Send>;

// ── RunState / RunSummary ────────────────────────────────────────────

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Dispatching,
    AwaitingResults,
    Completed,
    Failed,
    Cancelled,
}

/// What a finished (completed or cancelled) run did.
#[derive(Debug)]
pub struct RunSummary<T> {
    pub run_id: Uuid,
    /// [`RunState::Completed`] or [`RunState::Cancelled`].
    pub state: RunState,
    pub workers: usize,
    /// Values handed to workers.
    pub dispatched: usize,
    /// Results passed to `on_process`.
    pub processed: usize,
    /// Dispatch rounds that sent at least one value.
    pub rounds: usize,
    /// Values never dispatched, in their original order.
    pub remaining: Vec<T>,
}

impl<T> RunSummary<T> {
    pub fn is_cancelled(&self) -> bool {
        self.state == RunState::Cancelled
    }
}

// ── ProcessorBuilder ─────────────────────────────────────────────────

/// Fluent builder for a [`ConcurrentProcessor`].
///
/// # Example
/// ```ignore
/// let summary = ProcessorBuilder::new(|_| BlockingWorker::new(is_prime))
///     .values(numbers)
///     .concurrency(4)
///     .on_process(move |result| primes.push(result))
///     .build()?
///     .run()
///     .await?;
/// ```
pub struct ProcessorBuilder<T, W: Worker> {
    factory: WorkerFactory<W>,
    reader: Reader<T, W::Input>,
    values: Vec<T>,
    settings: PoolSettings,
    parallelism: Box<dyn Parallelism>,
    transfer: Option<TransferCheck<W::Input>>,
    signal: Option<AbortSignal>,
    on_process: Option<ProcessCallback<W::Output>>,
}

impl<W: Worker> ProcessorBuilder<W::Input, W> {
    /// Values are sent to workers unchanged.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(WorkerContext) -> W + Send + Sync + 'static,
    {
        Self::with_reader_inner(Box::new(factory), Reader::Identity(|value| value))
    }
}

impl<T, W: Worker> ProcessorBuilder<T, W> {
    /// Every value goes through `on_read` before it is sent. `on_read` may
    /// return [`Read::Ready`] or [`Read::Pending`].
    pub fn with_reader<F, R>(factory: F, on_read: R) -> Self
    where
        F: Fn(WorkerContext) -> W + Send + Sync + 'static,
        R: FnMut(T) -> Read<W::Input> + Send + 'static,
    {
        Self::with_reader_inner(Box::new(factory), Reader::Transform(Box::new(on_read)))
    }

    fn with_reader_inner(factory: WorkerFactory<W>, reader: Reader<T, W::Input>) -> Self {
        Self {
            factory,
            reader,
            values: Vec::new(),
            settings: PoolSettings::default(),
            parallelism: Box::new(HostParallelism),
            transfer: None,
            signal: None,
            on_process: None,
        }
    }

    /// The input stack. The last value is dispatched first.
    pub fn values(mut self, values: impl IntoIterator<Item = T>) -> Self {
        self.values = values.into_iter().collect();
        self
    }

    /// Pool size (default: available parallelism minus one).
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.settings.concurrency = Some(workers);
        self
    }

    /// Replace pool size and worker naming wholesale.
    pub fn settings(mut self, settings: PoolSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Prefix for worker names (default: `fanout-worker`).
    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.settings.worker_name = name.into();
        self
    }

    /// Source of the default pool size. Queried once, in [`build`](Self::build).
    pub fn parallelism(mut self, parallelism: impl Parallelism + 'static) -> Self {
        self.parallelism = Box::new(parallelism);
        self
    }

    /// Cancellation signal, checked whenever a result arrives.
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Callback for every worker result. Required.
    pub fn on_process<F>(mut self, on_process: F) -> Self
    where
        F: FnMut(W::Output) + Send + 'static,
    {
        self.on_process = Some(Box::new(on_process));
        self
    }

    /// Validate the builder and resolve the pool size.
    pub fn build(self) -> Result<ConcurrentProcessor<T, W>, FanoutError> {
        let on_process = self
            .on_process
            .ok_or_else(|| FanoutError::Config("on_process callback is required".into()))?;

        let workers = self.settings.resolved_concurrency(&*self.parallelism);

        Ok(ConcurrentProcessor {
            run_id: Uuid::new_v4(),
            workers,
            worker_name: self.settings.worker_name,
            factory: self.factory,
            dispatcher: Dispatcher::new(self.reader, self.transfer),
            pending: PendingStack::new(self.values),
            signal: self.signal,
            on_process,
        })
    }
}

impl<T, W> ProcessorBuilder<T, W>
where
    W: Worker,
    W::Input: Transfer,
{
    /// Require every sent value to be zero-copy transferable. A value that is
    /// not fails the run with [`FanoutError::NonTransferableValue`].
    pub fn transfer(mut self, enabled: bool) -> Self {
        let check: TransferCheck<W::Input> = <W::Input as Transfer>::transfer_kind;
        self.transfer = enabled.then_some(check);
        self
    }
}

// ── ConcurrentProcessor ──────────────────────────────────────────────

/// A configured, not-yet-started fan-out run.
pub struct ConcurrentProcessor<T, W: Worker> {
    run_id: Uuid,
    workers: usize,
    worker_name: String,
    factory: WorkerFactory<W>,
    dispatcher: Dispatcher<T, W::Input>,
    pending: PendingStack<T>,
    signal: Option<AbortSignal>,
    on_process: ProcessCallback<W::Output>,
}

impl<T, W> ConcurrentProcessor<T, W>
where
    T: Send + 'static,
    W: Worker,
{
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Resolved pool size.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process every value, returning once the stack is empty and every
    /// worker is idle, or once cancellation is observed.
    pub async fn run(self) -> Result<RunSummary<T>, FanoutError> {
        let Self {
            run_id,
            workers,
            worker_name,
            factory,
            mut dispatcher,
            mut pending,
            signal,
            mut on_process,
        } = self;

        info!(run = %run_id, workers, values = pending.len(), "starting fan-out run");

        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let mut pool = Pool::spawn(workers, &worker_name, &*factory, &results_tx);
        // Workers hold the only senders, so `recv` yields `None` once all have exited.
        drop(results_tx);

        let mut summary = RunSummary {
            run_id,
            state: RunState::Idle,
            workers,
            dispatched: 0,
            processed: 0,
            rounds: 0,
            remaining: Vec::new(),
        };
        let mut failure = None;

        loop {
            summary.state = match summary.state {
                RunState::Idle => RunState::Dispatching,
                RunState::Dispatching => {
                    match dispatcher.dispatch(&mut pool, &mut pending).await {
                        Ok(DispatchOutcome::Dispatched(sent)) => {
                            summary.dispatched += sent;
                            summary.rounds += 1;
                            RunState::AwaitingResults
                        }
                        Ok(DispatchOutcome::Drained) => RunState::AwaitingResults,
                        Ok(DispatchOutcome::Completed) => RunState::Completed,
                        Err(e) => {
                            failure = Some(e);
                            RunState::Failed
                        }
                    }
                }
                RunState::AwaitingResults => match results_rx.recv().await {
                    Some(result) => {
                        on_process(result.output);
                        summary.processed += 1;

                        if signal.as_ref().is_some_and(AbortSignal::is_aborted) {
                            RunState::Cancelled
                        } else {
                            pool.mark_idle(result.slot);
                            RunState::Dispatching
                        }
                    }
                    None => {
                        failure = Some(FanoutError::WorkersExited {
                            outstanding: pool.busy_count(),
                        });
                        RunState::Failed
                    }
                },
                RunState::Completed | RunState::Failed | RunState::Cancelled => break,
            };
            debug!(run = %run_id, state = ?summary.state, "run state changed");
        }

        pool.shutdown().await;

        if summary.state == RunState::Cancelled {
            // Results that were already delivered before teardown still count.
            while let Ok(result) = results_rx.try_recv() {
                on_process(result.output);
                summary.processed += 1;
            }
            warn!(
                run = %run_id,
                processed = summary.processed,
                remaining = pending.len(),
                "fan-out run cancelled"
            );
        }

        if let Some(e) = failure {
            warn!(run = %run_id, error = %e, "fan-out run failed");
            return Err(e);
        }

        if summary.state == RunState::Completed {
            info!(
                run = %run_id,
                processed = summary.processed,
                rounds = summary.rounds,
                "fan-out run completed"
            );
        }

        summary.remaining = pending.into_remaining();
        Ok(summary)
    }
}
