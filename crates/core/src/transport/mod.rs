//! Network transport for control signaling and RTP media delivery.
//!
//! The protocol uses a split transport model:
//!
//! - **TCP** ([`tcp`]): carries control requests and replies. One TCP
//!   connection per client, with a thread per connection.
//!
//! - **UDP** ([`udp`]): carries RTP media packets. The server binds one
//!   socket per session when the client first sends PLAY.

pub mod tcp;
pub mod udp;

pub use udp::UdpTransport;
