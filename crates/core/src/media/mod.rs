//! Media channel: RTP codec, frame sources and sinks, and the send/receive
//! loops that move frames over UDP.
//!
//! ## Data flow
//!
//! ```text
//! server                                      client
//! FrameStore::open -> FrameSource             UdpSocket
//!        |                                        |
//! MediaSender (tick every 50ms)               MediaReceiver (read timeout)
//!        |  rtp::encode                           |  rtp::decode
//!        +------------- UDP datagram ------------>+  high-water mark
//!                                                 |
//!                                              FrameSink
//! ```
//!
//! Both loops run on their own thread as a [`MediaTask`] and stop
//! cooperatively through a [`StopSignal`].

pub mod receiver;
pub mod rtp;
pub mod sender;
pub mod signal;
pub mod sink;
pub mod stream;

pub use receiver::{HighWaterMark, MediaReceiver};
pub use sender::MediaSender;
pub use signal::{MediaTask, StopSignal};
pub use sink::CacheFileSink;
pub use stream::{MediaDirectory, VideoStream};

use crate::error::Result;

/// A sequence of encoded frames for one resource.
pub trait FrameSource: Send {
    /// Next frame payload, or `None` at end of stream.
    fn next_frame(&mut self) -> Option<Vec<u8>>;

    /// 1-based index of the frame last returned by [`next_frame`](Self::next_frame).
    fn frame_number(&self) -> u32;
}

/// Opens frame sources by resource name (the SETUP request target).
pub trait FrameStore: Send + Sync {
    /// Fails with [`RtspError::ResourceNotFound`](crate::RtspError::ResourceNotFound)
    /// when `name` cannot be opened.
    fn open(&self, name: &str) -> Result<Box<dyn FrameSource>>;
}

/// A frame accepted by the receiver, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u16,
    pub payload: Vec<u8>,
}

/// Consumer of in-order frames on the client side (display, cache, ...).
pub trait FrameSink: Send {
    fn deliver(&mut self, frame: Frame);
}
