//! Text control protocol.
//!
//! A trimmed RTSP dialect: five methods, `\n` line endings, one request and
//! one reply per message, each terminated by a blank line.
//!
//! ```text
//! SETUP movie.Mjpeg RTSP/1.0
//! CSeq: 1
//! Transport: RTP/UDP; client_port= 25000
//!
//! RTSP/1.0 200 OK
//! CSeq: 1
//! Session: 482913
//!
//! ```
//!
//! | Method | Purpose |
//! |--------|---------|
//! | SETUP | Open the resource, negotiate the client media port, assign a session id |
//! | PLAY | Start frame delivery |
//! | PAUSE | Suspend frame delivery |
//! | TEARDOWN | Destroy the session and close the connection |
//! | DESCRIBE | Retrieve the session description |

pub mod request;
pub mod response;
pub mod sdp;

pub use request::{Method, RtspRequest};
pub use response::RtspResponse;
pub use sdp::SessionDescription;
