pub mod config;
pub mod dispatch;
pub mod error;
pub mod pool;
pub mod processor;
pub mod signal;
pub mod stack;
pub mod transfer;
pub mod worker;

pub use config::{FixedParallelism, HostParallelism, Parallelism, PoolSettings};
pub use dispatch::Read;
pub use error::FanoutError;
pub use processor::{ConcurrentProcessor, ProcessorBuilder, RunState, RunSummary};
pub use signal::{AbortController, AbortSignal};
pub use stack::PendingStack;
pub use transfer::{is_transferable, ImageBitmap, Payload, Transfer, TransferKind, VideoFrame};
pub use worker::{BlockingWorker, Envelope, Worker, WorkerContext, WorkerHandle, WorkerResult};
