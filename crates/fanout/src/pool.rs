//! The fixed-size worker pool and its busy/idle bookkeeping.

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::FanoutError;
use crate::worker::{Envelope, Worker, WorkerContext, WorkerHandle, WorkerResult};

/// One worker plus whether it has an outstanding value.
pub struct WorkerSlot<I> {
    pub handle: WorkerHandle<I>,
    pub is_processing: bool,
}

/// Ordered slots, sized once at construction.
///
/// Dropping the pool terminates every worker, so teardown also happens when a
/// run unwinds.
pub struct Pool<I> {
    slots: Vec<WorkerSlot<I>>,
}

impl<I: Send + 'static> Pool<I> {
    /// Spawn `size` workers named `{name}-{index}`, all idle.
    pub fn spawn<W, F>(
        size: usize,
        name: &str,
        factory: &F,
        results: &mpsc::UnboundedSender<WorkerResult<W::Output>>,
    ) -> Self
    where
        W: Worker<Input = I>,
        F: Fn(WorkerContext) -> W + ?Sized,
    {
        let slots = (0..size)
            .map(|index| {
                let context = WorkerContext {
                    index,
                    name: format!("{name}-{index}"),
                };
                let worker = factory(context.clone());
                WorkerSlot {
                    handle: WorkerHandle::spawn(context, worker, results.clone()),
                    is_processing: false,
                }
            })
            .collect();

        Self { slots }
    }
}

impl<I> Pool<I> {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Indices of idle slots, in slot order.
    pub fn idle_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_processing)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn all_idle(&self) -> bool {
        self.slots.iter().all(|slot| !slot.is_processing)
    }

    pub fn busy_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_processing).count()
    }

    pub fn mark_busy(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.is_processing = true;
        }
    }

    pub fn mark_idle(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.is_processing = false;
        }
    }

    pub fn send(&self, index: usize, envelope: Envelope<I>) -> Result<(), FanoutError> {
        self.slots
            .get(index)
            .ok_or(FanoutError::WorkerUnavailable { slot: index })?
            .handle
            .dispatch(envelope)
    }

    /// Abort every worker without waiting.
    pub fn terminate(&self) {
        for slot in &self.slots {
            slot.handle.terminate();
        }
    }

    /// Abort every worker and wait until each task has ended.
    pub async fn shutdown(&mut self) {
        self.terminate();
        for slot in &mut self.slots {
            slot.handle.join().await;
            slot.is_processing = false;
        }
        debug!(workers = self.slots.len(), "worker pool shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.slots.iter().all(|slot| slot.handle.is_finished())
    }
}

impl<I> Drop for Pool<I> {
    fn drop(&mut self) {
        self.terminate();
    }
}
