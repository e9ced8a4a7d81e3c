//! Cooperative cancellation.
//!
//! An [`AbortController`] flips a shared flag; the processor reads it through
//! an [`AbortSignal`] each time a worker result arrives. Nothing is
//! interrupted at the moment `abort()` is called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owner side of a cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    aborted: Arc<AtomicBool>,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a signal to hand to a processor.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            aborted: Arc::clone(&self.aborted),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }
}

/// Read side of a cancellation flag.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    aborted: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}
