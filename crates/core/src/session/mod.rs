//! Session state machines.
//!
//! One session exists per control connection. Both ends walk the same
//! states:
//!
//! ```text
//!            SETUP            PLAY
//!   Init ----------> Ready ----------> Playing
//!    ^                 ^                  |
//!    |                 +------ PAUSE -----+
//!    |
//!    +------ TEARDOWN (from any state)
//!
//!   DESCRIBE: any state, no transition
//! ```
//!
//! [`SessionState::transition`] is the single transition table.
//! [`ServerSession`] executes requests against it and owns the media
//! sender; [`ClientSession`] checks preconditions before issuing requests
//! and applies replies.

pub mod client;
pub mod server;
pub mod transport;

use rand::Rng;

use crate::protocol::Method;

pub use client::{ClientSession, ReplyOutcome};
pub use server::ServerSession;
pub use transport::TransportHeader;

/// Lowest and highest session id the server hands out (6 digits).
pub const SESSION_ID_MIN: u32 = 100_000;
pub const SESSION_ID_MAX: u32 = 999_999;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No resource bound (before SETUP, or after TEARDOWN).
    #[default]
    Init,
    /// Resource bound, media stopped.
    Ready,
    /// Media flowing.
    Playing,
}

impl SessionState {
    /// State after `method` succeeds, or `None` if `method` is not valid here.
    pub fn transition(self, method: Method) -> Option<SessionState> {
        use Method::*;
        use SessionState::*;

        match (self, method) {
            (Init, Setup) => Some(Ready),
            (Ready, Play) => Some(Playing),
            (Playing, Pause) => Some(Ready),
            (_, Teardown) => Some(Init),
            (state, Describe) => Some(state),
            _ => None,
        }
    }

    /// Whether a client may issue `method` in this state.
    ///
    /// Same as [`transition`](Self::transition) except that a client in
    /// `Init` has nothing to tear down.
    pub fn can_issue(self, method: Method) -> bool {
        match (self, method) {
            (SessionState::Init, Method::Teardown) => false,
            _ => self.transition(method).is_some(),
        }
    }
}

/// Draw a fresh 6-digit session id.
pub fn generate_session_id() -> u32 {
    rand::rng().random_range(SESSION_ID_MIN..=SESSION_ID_MAX)
}
