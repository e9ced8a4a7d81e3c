//! Zero-copy transfer validation.
//!
//! In transfer mode every value handed to a worker must be one of a closed
//! set of representations that can change owner without being copied:
//! buffers, image surfaces, message ports, stream endpoints and video frames.
//! Anything else (plain records, strings, numbers) fails the run.

use bytes::{Bytes, BytesMut};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;

/// The transferable representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferKind {
    /// Raw byte buffer.
    Buffer,
    /// Image bitmap or offscreen drawing surface.
    Bitmap,
    /// One end of a message channel.
    Port,
    ReadableStream,
    WritableStream,
    /// A bidirectional stream (both ends at once).
    TransformStream,
    /// A decoded video frame.
    Frame,
}

/// Classifies a value for transfer mode.
///
/// The default answer is "not transferable", so plain data types only need an
/// empty impl.
pub trait Transfer {
    fn transfer_kind(&self) -> Option<TransferKind> {
        None
    }
}

/// Pure predicate used by the dispatcher when transfer mode is on.
pub fn is_transferable<T: Transfer + ?Sized>(value: &T) -> bool {
    value.transfer_kind().is_some()
}

// ── Surfaces and frames ──────────────────────────────────────────────

/// RGBA pixel surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Bytes,
}

/// A single decoded video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub timestamp_us: i64,
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl Transfer for ImageBitmap {
    fn transfer_kind(&self) -> Option<TransferKind> {
        Some(TransferKind::Bitmap)
    }
}

impl Transfer for VideoFrame {
    fn transfer_kind(&self) -> Option<TransferKind> {
        Some(TransferKind::Frame)
    }
}

// ── Buffers ──────────────────────────────────────────────────────────

macro_rules! transfer_as {
    ($kind:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl Transfer for $ty {
                fn transfer_kind(&self) -> Option<TransferKind> {
                    Some($kind)
                }
            }
        )+
    };
}

transfer_as!(TransferKind::Buffer => Bytes, BytesMut, Vec<u8>, Box<[u8]>);
transfer_as!(TransferKind::TransformStream => DuplexStream);

// ── Ports and streams ────────────────────────────────────────────────

impl<M> Transfer for mpsc::Sender<M> {
    fn transfer_kind(&self) -> Option<TransferKind> {
        Some(TransferKind::Port)
    }
}

impl<M> Transfer for mpsc::Receiver<M> {
    fn transfer_kind(&self) -> Option<TransferKind> {
        Some(TransferKind::Port)
    }
}

impl<M> Transfer for mpsc::UnboundedSender<M> {
    fn transfer_kind(&self) -> Option<TransferKind> {
        Some(TransferKind::Port)
    }
}

impl<M> Transfer for mpsc::UnboundedReceiver<M> {
    fn transfer_kind(&self) -> Option<TransferKind> {
        Some(TransferKind::Port)
    }
}

impl<S> Transfer for ReadHalf<S> {
    fn transfer_kind(&self) -> Option<TransferKind> {
        Some(TransferKind::ReadableStream)
    }
}

impl<S> Transfer for WriteHalf<S> {
    fn transfer_kind(&self) -> Option<TransferKind> {
        Some(TransferKind::WritableStream)
    }
}

// ── Plain data ───────────────────────────────────────────────────────

macro_rules! copy_only {
    ($($ty:ty),+ $(,)?) => {
        $(impl Transfer for $ty {})+
    };
}

copy_only!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, &'static str, serde_json::Value,
);

// ── Payload ──────────────────────────────────────────────────────────

/// A heterogeneous value for pools that mix transferable and plain inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Buffer(Bytes),
    Bitmap(ImageBitmap),
    Frame(VideoFrame),
    Record(serde_json::Value),
    Text(String),
}

impl Transfer for Payload {
    fn transfer_kind(&self) -> Option<TransferKind> {
        match self {
            Payload::Buffer(b) => b.transfer_kind(),
            Payload::Bitmap(b) => b.transfer_kind(),
            Payload::Frame(f) => f.transfer_kind(),
            Payload::Record(_) | Payload::Text(_) => None,
        }
    }
}
