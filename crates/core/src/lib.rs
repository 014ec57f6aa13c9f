//! MJPEG video streaming over an RTSP-style control channel and RTP/UDP.
//!
//! The server ([`Server`]) accepts control connections and runs one
//! [`ServerSession`](session::ServerSession) per connection; PLAY starts a
//! [`MediaSender`](media::MediaSender) that pushes one RTP packet per JPEG
//! frame. The client ([`Client`]) issues SETUP/PLAY/PAUSE/TEARDOWN/DESCRIBE
//! and runs a [`MediaReceiver`](media::MediaReceiver) that forwards in-order
//! frames to a [`FrameSink`](media::FrameSink).

pub mod client;
pub mod error;
pub mod media;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use client::{Client, ClientConfig};
pub use error::{Result, RtspError};
pub use server::{Server, ServerConfig};
