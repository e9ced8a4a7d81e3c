use thiserror::Error;

/// Errors that end a fan-out run.
///
/// Every variant is fatal: the processor tears the pool down and returns the
/// error. Cancellation is not an error and never shows up here.
#[derive(Debug, Error)]
pub enum FanoutError {
    /// A dispatch round found no idle worker. Only a zero-sized pool can
    /// reach this, since rounds run at startup or right after a slot frees up.
    #[error("no available workers")]
    NoAvailableWorkers,

    /// Transfer mode is on and the value paired with `slot` has no transfer kind.
    #[error("value for worker slot {slot} is not transferable")]
    NonTransferableValue { slot: usize },

    /// The worker's inbox refused a value. A guard only: an idle slot's inbox
    /// is always empty, so this means the worker task has already ended.
    #[error("worker slot {slot} is not accepting values")]
    WorkerUnavailable { slot: usize },

    /// Every worker task ended while `outstanding` values had no result.
    #[error("all workers exited with {outstanding} result(s) outstanding")]
    WorkersExited { outstanding: usize },

    /// The processor was built with incomplete settings.
    #[error("config error: {0}")]
    Config(String),
}
