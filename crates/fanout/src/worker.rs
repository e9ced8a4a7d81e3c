//! Worker trait and per-slot execution units.
//!
//! Each pool slot runs its own [`Worker`] instance inside a dedicated tokio
//! task. The orchestrator talks to it only by message: a capacity-1 inbox for
//! values, and a shared result channel fanned in from every worker.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::FanoutError;
use crate::transfer::TransferKind;

// ── Worker trait ─────────────────────────────────────────────────────

/// The per-value computation a pool runs.
///
/// One instance exists per slot and is never shared, so `process` takes
/// `&mut self` and may keep state between values.
#[async_trait]
pub trait Worker: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Process one value into exactly one result.
    async fn process(&mut self, input: Self::Input) -> Self::Output;
}

/// What a worker factory is told about the slot it is building for.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub index: usize,
    pub name: String,
}

// ── BlockingWorker ───────────────────────────────────────────────────

/// Runs a synchronous function on tokio's blocking pool.
///
/// Use this for CPU-bound work so the computation runs in parallel with the
/// orchestrator instead of stalling an async executor thread.
pub struct BlockingWorker<F, I, O> {
    func: Arc<F>,
    _marker: PhantomData<fn(I) -> O>,
}

impl<F, I, O> BlockingWorker<F, I, O>
where
    F: Fn(I) -> O + Send + Sync + 'static,
{
    pub fn new(func: F) -> Self {
        Self::shared(Arc::new(func))
    }

    /// Build from a function already shared between slots.
    pub fn shared(func: Arc<F>) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, I, O> Worker for BlockingWorker<F, I, O>
where
    F: Fn(I) -> O + Send + Sync + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn process(&mut self, input: I) -> O {
        let func = Arc::clone(&self.func);
        match tokio::task::spawn_blocking(move || func(input)).await {
            Ok(output) => output,
            // Blocking tasks cannot be cancelled, so a join error is a panic.
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

// ── Messages ─────────────────────────────────────────────────────────

/// A value on its way to a worker.
#[derive(Debug)]
pub struct Envelope<T> {
    pub value: T,
    /// Set when the value was validated for zero-copy transfer.
    pub transfer: Option<TransferKind>,
}

impl<T> Envelope<T> {
    pub fn copy(value: T) -> Self {
        Self {
            value,
            transfer: None,
        }
    }

    pub fn transfer(value: T, kind: TransferKind) -> Self {
        Self {
            value,
            transfer: Some(kind),
        }
    }
}

/// One result, tagged with the slot that produced it.
#[derive(Debug)]
pub struct WorkerResult<V> {
    pub slot: usize,
    pub output: V,
}

// ── WorkerHandle ─────────────────────────────────────────────────────

/// The orchestrator's side of one running worker.
pub struct WorkerHandle<I> {
    index: usize,
    name: String,
    inbox: mpsc::Sender<Envelope<I>>,
    task: JoinHandle<()>,
}

impl<I: Send + 'static> WorkerHandle<I> {
    /// Spawn `worker` on its own task. Must be called within a tokio runtime.
    pub fn spawn<W>(
        context: WorkerContext,
        worker: W,
        results: mpsc::UnboundedSender<WorkerResult<W::Output>>,
    ) -> Self
    where
        W: Worker<Input = I>,
    {
        let (inbox, rx) = mpsc::channel(1);
        let index = context.index;
        let name = context.name;
        let task = tokio::spawn(worker_loop(index, name.clone(), worker, rx, results));

        Self {
            index,
            name,
            inbox,
            task,
        }
    }
}

impl<I> WorkerHandle<I> {
    /// Hand one value to the worker. The slot must be idle.
    pub fn dispatch(&self, envelope: Envelope<I>) -> Result<(), FanoutError> {
        self.inbox
            .try_send(envelope)
            .map_err(|_| FanoutError::WorkerUnavailable { slot: self.index })
    }

    /// Stop the worker now. Any value it is processing is discarded.
    pub fn terminate(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait until the worker task has fully ended. Call after [`terminate`](Self::terminate).
    pub(crate) async fn join(&mut self) {
        // A cancelled task reports a JoinError; that is the expected outcome.
        let _ = (&mut self.task).await;
    }
}

async fn worker_loop<W: Worker>(
    index: usize,
    name: String,
    mut worker: W,
    mut inbox: mpsc::Receiver<Envelope<W::Input>>,
    results: mpsc::UnboundedSender<WorkerResult<W::Output>>,
) {
    debug!(worker = %name, "worker started");

    while let Some(envelope) = inbox.recv().await {
        debug!(worker = %name, transfer = ?envelope.transfer, "worker received value");
        let output = worker.process(envelope.value).await;
        if results.send(WorkerResult { slot: index, output }).is_err() {
            break;
        }
    }

    debug!(worker = %name, "worker stopped");
}
