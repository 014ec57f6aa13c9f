//! Error types for the MJPEG streaming library.

use std::fmt;

use crate::protocol::Method;
use crate::session::SessionState;

/// Errors that can occur in the streaming library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Media**: [`MalformedPacket`](Self::MalformedPacket): datagram too
///   short to hold an RTP header.
/// - **Protocol**: [`Parse`](Self::Parse): malformed control messages.
/// - **Session**: [`ResourceNotFound`](Self::ResourceNotFound),
///   [`CorrelationMismatch`](Self::CorrelationMismatch),
///   [`SessionMismatch`](Self::SessionMismatch),
///   [`InvalidState`](Self::InvalidState),
///   [`MediaNotBound`](Self::MediaNotBound).
/// - **Transport**: [`Io`](Self::Io), [`ConnectionClosed`](Self::ConnectionClosed).
/// - **Server**: [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning).
#[derive(Debug, thiserror::Error)]
pub enum RtspError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A datagram shorter than the fixed RTP header.
    #[error("malformed RTP packet: {len} bytes, need at least 12")]
    MalformedPacket { len: usize },

    /// SETUP named a resource the frame store cannot open.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// A reply whose CSeq does not match the outstanding request.
    #[error("reply CSeq {received:?} does not match outstanding request {expected:?}")]
    CorrelationMismatch {
        expected: Option<u32>,
        received: Option<u32>,
    },

    /// A message citing a session id other than the one bound at SETUP.
    #[error("session {received} does not match bound session {bound}")]
    SessionMismatch { bound: u32, received: u32 },

    /// The request is not allowed in the session's current state.
    #[error("{method} not allowed in state {state:?}")]
    InvalidState { method: Method, state: SessionState },

    /// PLAY was attempted before the UDP receive port was bound.
    #[error("media port not bound")]
    MediaNotBound,

    /// The peer closed the control connection.
    #[error("control connection closed")]
    ConnectionClosed,

    /// [`Server::start`](crate::Server::start) has not been called yet.
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,

    /// Failed to parse a control request or reply.
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },
}

/// Specific kind of control-message parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no request or status line).
    EmptyMessage,
    /// Request line did not have the expected `Method resource Version` format.
    InvalidRequestLine,
    /// Status line did not have the expected `Version code reason` format.
    InvalidStatusLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// The request method is not one of the five supported methods.
    UnknownMethod(String),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidStatusLine => write!(f, "invalid status line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::UnknownMethod(m) => write!(f, "unknown method {m}"),
        }
    }
}

impl RtspError {
    pub(crate) fn parse(kind: ParseErrorKind) -> Self {
        Self::Parse { kind }
    }

    /// Whether this error means a reply was dropped as stale rather than
    /// a real failure.
    pub fn is_stale_reply(&self) -> bool {
        matches!(
            self,
            Self::CorrelationMismatch { .. } | Self::SessionMismatch { .. }
        )
    }
}

/// Convenience alias for `Result<T, RtspError>`.
pub type Result<T> = std::result::Result<T, RtspError>;
