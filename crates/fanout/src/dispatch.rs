//! Batch dispatch: fill idle slots from the pending stack.
//!
//! A round pairs each idle slot (in slot order) with the next value popped off
//! the stack, marks those slots busy, runs the optional read transform,
//! validates for transfer mode, and sends. When a transform mixes ready and
//! pending outputs, ready outputs are sent first in pairing order, followed by
//! pending outputs in the order their calls were issued.

use std::future::Future;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tracing::debug;

use crate::error::FanoutError;
use crate::pool::Pool;
use crate::stack::PendingStack;
use crate::transfer::TransferKind;
use crate::worker::Envelope;

// ── Read transform ───────────────────────────────────────────────────

/// Output of a read transform: available now, or later.
pub enum Read<R> {
    Ready(R),
    Pending(BoxFuture<'static, R>),
}

impl<R> Read<R> {
    pub fn ready(value: R) -> Self {
        Read::Ready(value)
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = R> + Send + 'static,
    {
        Read::Pending(future.boxed())
    }
}

/// How a popped input becomes the value a worker receives.
pub(crate) enum Reader<T, R> {
    /// Input is sent as-is.
    Identity(fn(T) -> R),
    Transform(Box<dyn FnMut(T) -> Read<R> + Send>),
}

/// Classifier used in transfer mode; `None` means not transferable.
pub(crate) type TransferCheck<R> = fn(&R) -> Option<TransferKind>;

// ── Dispatcher ───────────────────────────────────────────────────────

/// What a dispatch round did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// This many values were sent.
    Dispatched(usize),
    /// Nothing left to send, but other slots are still outstanding.
    Drained,
    /// Nothing left to send and every slot is idle.
    Completed,
}

pub(crate) struct Dispatcher<T, R> {
    reader: Reader<T, R>,
    transfer: Option<TransferCheck<R>>,
}

impl<T, R> Dispatcher<T, R> {
    pub(crate) fn new(reader: Reader<T, R>, transfer: Option<TransferCheck<R>>) -> Self {
        Self { reader, transfer }
    }

    /// Run one dispatch round.
    pub(crate) async fn dispatch(
        &mut self,
        pool: &mut Pool<R>,
        pending: &mut PendingStack<T>,
    ) -> Result<DispatchOutcome, FanoutError> {
        let idle = pool.idle_slots();
        if idle.is_empty() {
            return Err(FanoutError::NoAvailableWorkers);
        }

        let mut batch = Vec::with_capacity(idle.len());
        for slot in idle {
            match pending.pop() {
                Some(value) => batch.push((slot, value)),
                None => break,
            }
        }

        if batch.is_empty() {
            return Ok(if pool.all_idle() {
                DispatchOutcome::Completed
            } else {
                DispatchOutcome::Drained
            });
        }

        // Claim the slots before any await so a later round cannot reuse them.
        for (slot, _) in &batch {
            pool.mark_busy(*slot);
        }

        let outgoing = self.read(batch).await;
        let envelopes = self.seal(outgoing)?;

        let count = envelopes.len();
        for (slot, envelope) in envelopes {
            pool.send(slot, envelope)?;
        }

        debug!(
            sent = count,
            remaining = pending.len(),
            busy = pool.busy_count(),
            "dispatch round complete"
        );
        Ok(DispatchOutcome::Dispatched(count))
    }

    /// Apply the read transform, returning `(slot, value)` in send order.
    pub(crate) async fn read(&mut self, batch: Vec<(usize, T)>) -> Vec<(usize, R)> {
        let transform = match &mut self.reader {
            Reader::Identity(identity) => {
                let identity = *identity;
                return batch
                    .into_iter()
                    .map(|(slot, value)| (slot, identity(value)))
                    .collect();
            }
            Reader::Transform(transform) => transform.as_mut(),
        };

        let mut ready = Vec::with_capacity(batch.len());
        let mut deferred = Vec::new();
        for (slot, value) in batch {
            match transform(value) {
                Read::Ready(output) => ready.push((slot, output)),
                Read::Pending(future) => deferred.push((slot, future)),
            }
        }

        if !deferred.is_empty() {
            let (slots, futures): (Vec<_>, Vec<_>) = deferred.into_iter().unzip();
            let outputs = join_all(futures).await;
            ready.extend(slots.into_iter().zip(outputs));
        }

        ready
    }

    /// Wrap values for sending. In transfer mode every value is checked first,
    /// and one failure rejects the whole round.
    fn seal(&self, outgoing: Vec<(usize, R)>) -> Result<Vec<(usize, Envelope<R>)>, FanoutError> {
        let Some(check) = self.transfer else {
            return Ok(outgoing
                .into_iter()
                .map(|(slot, value)| (slot, Envelope::copy(value)))
                .collect());
        };

        let mut kinds = Vec::with_capacity(outgoing.len());
        for (slot, value) in &outgoing {
            match check(value) {
                Some(kind) => kinds.push(kind),
                None => return Err(FanoutError::NonTransferableValue { slot: *slot }),
            }
        }

        Ok(outgoing
            .into_iter()
            .zip(kinds)
            .map(|((slot, value), kind)| (slot, Envelope::transfer(value, kind)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::sync::mpsc;

    use super::*;
    use crate::transfer::{Payload, Transfer};
    use crate::worker::{BlockingWorker, WorkerContext, WorkerResult};

    fn identity<T>() -> Reader<T, T> {
        Reader::Identity(|value| value)
    }

    fn pool_of<T: Send + 'static>(
        size: usize,
    ) -> (Pool<T>, mpsc::UnboundedReceiver<WorkerResult<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let factory = |_: WorkerContext| BlockingWorker::new(|value: T| value);
        let pool = Pool::spawn(size, "dispatch-test", &factory, &tx);
        (pool, rx)
    }

    #[tokio::test]
    async fn pairs_idle_slots_with_stack_tail() {
        let (mut pool, mut rx) = pool_of::<char>(3);
        let mut pending = PendingStack::from(vec!['a', 'b', 'c', 'd']);
        let mut dispatcher = Dispatcher::new(identity(), None);

        let outcome = dispatcher.dispatch(&mut pool, &mut pending).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Dispatched(3));
        assert_eq!(pool.busy_count(), 3);
        assert_eq!(pending.into_remaining(), vec!['a']);

        let mut received = Vec::new();
        for _ in 0..3 {
            let result = rx.recv().await.unwrap();
            received.push((result.slot, result.output));
        }
        received.sort();
        assert_eq!(received, vec![(0, 'd'), (1, 'c'), (2, 'b')]);
    }

    #[tokio::test]
    async fn fills_only_idle_slots() {
        let (mut pool, _rx) = pool_of::<u32>(3);
        pool.mark_busy(0);
        let mut pending = PendingStack::from(vec![1, 2, 3]);
        let mut dispatcher = Dispatcher::new(identity(), None);

        let outcome = dispatcher.dispatch(&mut pool, &mut pending).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Dispatched(2));
        assert_eq!(pending.len(), 1);
        assert_eq!(pool.busy_count(), 3);
    }

    #[tokio::test]
    async fn empty_stack_with_idle_pool_completes() {
        let (mut pool, _rx) = pool_of::<u32>(2);
        let mut pending = PendingStack::new(Vec::new());
        let mut dispatcher = Dispatcher::new(identity(), None);

        let outcome = dispatcher.dispatch(&mut pool, &mut pending).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed);
    }

    #[tokio::test]
    async fn empty_stack_with_busy_slot_drains() {
        let (mut pool, _rx) = pool_of::<u32>(2);
        pool.mark_busy(1);
        let mut pending = PendingStack::new(Vec::new());
        let mut dispatcher = Dispatcher::new(identity(), None);

        let outcome = dispatcher.dispatch(&mut pool, &mut pending).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Drained);
    }

    #[tokio::test]
    async fn no_idle_slot_is_an_error() {
        let (mut pool, _rx) = pool_of::<u32>(1);
        pool.mark_busy(0);
        let mut pending = PendingStack::from(vec![1]);
        let mut dispatcher = Dispatcher::new(identity(), None);

        let err = dispatcher.dispatch(&mut pool, &mut pending).await.unwrap_err();
        assert!(matches!(err, FanoutError::NoAvailableWorkers));
        assert_eq!(pending.len(), 1, "nothing is popped when no slot is idle");
    }

    #[tokio::test]
    async fn ready_outputs_precede_pending_outputs() {
        let transform = |value: u64| {
            if value % 2 == 0 {
                Read::ready(value * 10)
            } else {
                // Later calls resolve first.
                Read::pending(async move {
                    tokio::time::sleep(Duration::from_millis(50 - value * 10)).await;
                    value * 10
                })
            }
        };
        let mut dispatcher: Dispatcher<u64, u64> =
            Dispatcher::new(Reader::Transform(Box::new(transform)), None);

        let batch = vec![(0, 1), (1, 2), (2, 3), (3, 4)];
        let sent = dispatcher.read(batch).await;
        assert_eq!(sent, vec![(1, 20), (3, 40), (0, 10), (2, 30)]);
    }

    #[tokio::test]
    async fn transfer_mode_rejects_the_whole_round() {
        let (mut pool, _rx) = pool_of::<Payload>(3);
        let mut pending = PendingStack::from(vec![
            Payload::Buffer(Bytes::from_static(b"a")),
            Payload::Text("plain".into()),
            Payload::Buffer(Bytes::from_static(b"c")),
        ]);
        let check: TransferCheck<Payload> = <Payload as Transfer>::transfer_kind;
        let mut dispatcher = Dispatcher::new(identity(), Some(check));

        let err = dispatcher.dispatch(&mut pool, &mut pending).await.unwrap_err();
        assert!(matches!(err, FanoutError::NonTransferableValue { slot: 1 }));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn transfer_mode_tags_envelopes() {
        let (mut pool, mut rx) = pool_of::<Bytes>(2);
        let mut pending = PendingStack::from(vec![Bytes::from_static(b"x")]);
        let check: TransferCheck<Bytes> = <Bytes as Transfer>::transfer_kind;
        let mut dispatcher = Dispatcher::new(identity(), Some(check));

        let outcome = dispatcher.dispatch(&mut pool, &mut pending).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Dispatched(1));
        assert_eq!(rx.recv().await.unwrap().output, Bytes::from_static(b"x"));
    }
}
