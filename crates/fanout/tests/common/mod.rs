//! Shared mock workers for the processor integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use stupid_fanout::{Worker, WorkerContext};

/// Counts how many workers have been dropped (i.e. torn down).
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Echoes its input and records `(slot, value)` for every value it receives.
pub struct RecordingWorker<T> {
    index: usize,
    delay: Duration,
    seen: Arc<Mutex<Vec<(usize, T)>>>,
    _dropped: DropCounter,
}

#[async_trait]
impl<T: Clone + Send + 'static> Worker for RecordingWorker<T> {
    type Input = T;
    type Output = T;

    async fn process(&mut self, input: T) -> T {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.seen.lock().unwrap().push((self.index, input.clone()));
        input
    }
}

/// Builds recording workers and exposes what they saw.
pub struct Harness<T> {
    pub seen: Arc<Mutex<Vec<(usize, T)>>>,
    pub dropped: Arc<AtomicUsize>,
    delay: Duration,
}

impl<T: Clone + Send + 'static> Harness<T> {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
            dropped: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }

    pub fn factory(&self) -> impl Fn(WorkerContext) -> RecordingWorker<T> + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        let dropped = Arc::clone(&self.dropped);
        let delay = self.delay;
        move |context: WorkerContext| RecordingWorker {
            index: context.index,
            delay,
            seen: Arc::clone(&seen),
            _dropped: DropCounter(Arc::clone(&dropped)),
        }
    }

    pub fn seen(&self) -> Vec<(usize, T)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// A results sink plus the `on_process` callback that fills it.
pub fn collector<V: Send + 'static>() -> (Arc<Mutex<Vec<V>>>, impl FnMut(V) + Send + 'static) {
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    (results, move |value| sink.lock().unwrap().push(value))
}
