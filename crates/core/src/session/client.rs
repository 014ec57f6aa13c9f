use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, RtspError};
use crate::protocol::{Method, RtspRequest, RtspResponse};
use crate::session::SessionState;
use crate::session::transport::TransportHeader;

/// What an accepted reply did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// SETUP succeeded; the session id is now bound.
    Ready { session_id: u32 },
    Playing,
    Paused,
    TornDown,
    /// DESCRIBE body (text after the blank line).
    Described(String),
    /// Non-200 reply; nothing changed.
    Failed { code: u16, reason: String },
}

/// Client half of a control connection, without any I/O.
///
/// [`request`](Self::request) builds the next request if the current state
/// allows it; [`handle_reply`](Self::handle_reply) applies the matching
/// reply. Replies that do not match the outstanding CSeq or the bound
/// session id come back as [`RtspError::CorrelationMismatch`] or
/// [`RtspError::SessionMismatch`] and change nothing.
#[derive(Debug)]
pub struct ClientSession {
    state: SessionState,
    /// 0 until a SETUP reply binds it.
    session_id: u32,
    cseq: u32,
    outstanding: Option<(Method, u32)>,
    resource: String,
    client_port: u16,
    teardown_acked: Arc<AtomicBool>,
}

impl ClientSession {
    pub fn new(resource: &str, client_port: u16) -> Self {
        ClientSession {
            state: SessionState::Init,
            session_id: 0,
            cseq: 0,
            outstanding: None,
            resource: resource.to_string(),
            client_port,
            teardown_acked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn client_port(&self) -> u16 {
        self.client_port
    }

    /// The request awaiting a reply, if any.
    pub fn outstanding(&self) -> Option<(Method, u32)> {
        self.outstanding
    }

    /// Flag the media receiver polls to learn that TEARDOWN was acknowledged.
    pub fn teardown_flag(&self) -> Arc<AtomicBool> {
        self.teardown_acked.clone()
    }

    pub fn teardown_acknowledged(&self) -> bool {
        self.teardown_acked.load(Ordering::SeqCst)
    }

    /// Build the next request for `method`.
    ///
    /// Fails with [`RtspError::InvalidState`] when the current state does not
    /// allow it; the counter and outstanding request are left untouched.
    pub fn request(&mut self, method: Method) -> Result<RtspRequest> {
        if !self.state.can_issue(method) {
            return Err(RtspError::InvalidState {
                method,
                state: self.state,
            });
        }

        self.cseq += 1;
        self.outstanding = Some((method, self.cseq));

        let request = RtspRequest::new(method, &self.resource, self.cseq);
        let request = match method {
            Method::Setup => request.add_header(
                "Transport",
                &TransportHeader {
                    client_port: self.client_port,
                }
                .to_header_value(),
            ),
            _ => request.add_header("Session", &self.session_id.to_string()),
        };

        tracing::debug!(%method, cseq = self.cseq, state = ?self.state, "request issued");
        Ok(request)
    }

    /// Apply a reply to the outstanding request.
    pub fn handle_reply(&mut self, reply: &RtspResponse) -> Result<ReplyOutcome> {
        let received = reply.cseq();
        let (method, expected) = match self.outstanding {
            Some((method, cseq)) if received == Some(cseq) => (method, cseq),
            other => {
                return Err(RtspError::CorrelationMismatch {
                    expected: other.map(|(_, cseq)| cseq),
                    received,
                });
            }
        };

        let reply_session = reply.session().unwrap_or(0);
        if self.session_id != 0 && reply_session != self.session_id {
            return Err(RtspError::SessionMismatch {
                bound: self.session_id,
                received: reply_session,
            });
        }

        self.outstanding = None;

        if !reply.is_ok() {
            tracing::warn!(%method, cseq = expected, code = reply.status_code, "request failed");
            return Ok(ReplyOutcome::Failed {
                code: reply.status_code,
                reason: reply.status_text.clone(),
            });
        }

        if method == Method::Setup {
            self.session_id = reply_session;
        }

        if let Some(next) = self.state.transition(method)
            && next != self.state
        {
            tracing::debug!(
                session_id = self.session_id,
                old_state = ?self.state,
                new_state = ?next,
                "state transition"
            );
            self.state = next;
        }

        let outcome = match method {
            Method::Setup => ReplyOutcome::Ready {
                session_id: self.session_id,
            },
            Method::Play => ReplyOutcome::Playing,
            Method::Pause => ReplyOutcome::Paused,
            Method::Teardown => {
                self.teardown_acked.store(true, Ordering::SeqCst);
                ReplyOutcome::TornDown
            }
            Method::Describe => ReplyOutcome::Described(reply.body.clone().unwrap_or_default()),
        };
        Ok(outcome)
    }
}
