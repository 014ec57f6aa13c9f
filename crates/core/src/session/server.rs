use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::media::rtp::MJPEG_PAYLOAD_TYPE;
use crate::media::{FrameSource, FrameStore, MediaSender, MediaTask};
use crate::protocol::{Method, RtspRequest, RtspResponse, SessionDescription};
use crate::server::ServerConfig;
use crate::session::transport::TransportHeader;
use crate::session::{SessionState, generate_session_id};
use crate::transport::UdpTransport;

/// Server half of one control connection.
///
/// All transitions happen on the connection thread that calls
/// [`handle`](Self::handle). The media sender only ever sees the frame
/// source and socket it was handed at PLAY.
pub struct ServerSession {
    state: SessionState,
    /// 0 until SETUP succeeds.
    session_id: u32,
    resource: Option<String>,
    peer_addr: SocketAddr,
    local_ip: IpAddr,
    client_port: Option<u16>,
    store: Arc<dyn FrameStore>,
    config: Arc<ServerConfig>,
    /// Parked here whenever the sender is not running.
    source: Option<Box<dyn FrameSource>>,
    udp: Option<UdpTransport>,
    sender: Option<MediaTask<MediaSender>>,
    terminated: bool,
}

impl ServerSession {
    pub fn new(
        peer_addr: SocketAddr,
        local_ip: IpAddr,
        store: Arc<dyn FrameStore>,
        config: Arc<ServerConfig>,
    ) -> Self {
        ServerSession {
            state: SessionState::Init,
            session_id: 0,
            resource: None,
            peer_addr,
            local_ip,
            client_port: None,
            store,
            config,
            source: None,
            udp: None,
            sender: None,
            terminated: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Where media for this session is sent, once SETUP has negotiated it.
    pub fn media_addr(&self) -> Option<SocketAddr> {
        self.client_port
            .map(|port| SocketAddr::new(self.peer_addr.ip(), port))
    }

    /// Whether TEARDOWN has been processed; the connection must close.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Whether a media sender thread is currently alive.
    pub fn is_sending(&self) -> bool {
        self.sender.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Execute one request.
    ///
    /// Returns `None` when the request is ignored: invalid for the current
    /// state, carrying a stale session id, or missing what it needs. Ignored
    /// requests get no reply and change nothing.
    pub fn handle(&mut self, request: &RtspRequest) -> Option<RtspResponse> {
        let Some(cseq) = request.cseq() else {
            tracing::warn!(method = %request.method, "request without CSeq ignored");
            return None;
        };

        if !self.session_matches(request) {
            tracing::warn!(
                method = %request.method,
                cseq,
                bound = self.session_id,
                received = ?request.session(),
                "stale session id, request ignored"
            );
            return None;
        }

        let Some(next) = self.state.transition(request.method) else {
            tracing::warn!(
                method = %request.method,
                cseq,
                state = ?self.state,
                "request not valid in current state, ignored"
            );
            return None;
        };

        let response = match request.method {
            Method::Setup => self.handle_setup(request),
            Method::Play => self.handle_play(),
            Method::Pause => self.handle_pause(),
            Method::Teardown => self.handle_teardown(),
            Method::Describe => Some(self.handle_describe()),
        }?;

        if response.is_ok() && next != self.state {
            tracing::debug!(
                session_id = self.session_id,
                old_state = ?self.state,
                new_state = ?next,
                "state transition"
            );
            self.state = next;
        }

        Some(
            response
                .add_header("CSeq", &cseq.to_string())
                .add_header("Session", &self.session_id.to_string()),
        )
    }

    /// Once an id is bound, every request but SETUP must cite it.
    fn session_matches(&self, request: &RtspRequest) -> bool {
        self.session_id == 0
            || request.method == Method::Setup
            || request.session() == Some(self.session_id)
    }

    fn handle_setup(&mut self, request: &RtspRequest) -> Option<RtspResponse> {
        let Some(transport) = request
            .get_header("Transport")
            .and_then(TransportHeader::parse)
        else {
            tracing::warn!(resource = %request.resource, "SETUP without client_port, ignored");
            return None;
        };

        let source = match self.store.open(&request.resource) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(resource = %request.resource, error = %e, "SETUP for unknown resource");
                return Some(RtspResponse::not_found());
            }
        };

        self.session_id = generate_session_id();
        self.source = Some(source);
        self.resource = Some(request.resource.clone());
        self.client_port = Some(transport.client_port);

        tracing::info!(
            session_id = self.session_id,
            resource = %request.resource,
            peer = %self.peer_addr,
            client_port = transport.client_port,
            "session created via SETUP"
        );

        Some(RtspResponse::ok())
    }

    fn handle_play(&mut self) -> Option<RtspResponse> {
        let (Some(dest), Some(source)) = (self.media_addr(), self.source.take()) else {
            tracing::error!(session_id = self.session_id, "PLAY without negotiated media");
            return Some(RtspResponse::connection_error());
        };

        let udp = match &self.udp {
            Some(udp) => udp.clone(),
            None => match UdpTransport::bind(&self.config.media_bind_addr) {
                Ok(udp) => {
                    self.udp = Some(udp.clone());
                    udp
                }
                Err(e) => {
                    tracing::error!(session_id = self.session_id, error = %e, "failed to allocate media socket");
                    self.source = Some(source);
                    return Some(RtspResponse::connection_error());
                }
            },
        };

        let sender = MediaSender::new(
            source,
            udp,
            dest,
            self.config.frame_interval,
            self.session_id,
        );
        match sender.spawn() {
            Ok(task) => {
                self.sender = Some(task);
                tracing::info!(session_id = self.session_id, %dest, "session started playing");
                Some(RtspResponse::ok())
            }
            Err(e) => {
                // The source went down with the unspawned closure.
                tracing::error!(session_id = self.session_id, error = %e, "failed to spawn media sender");
                Some(RtspResponse::connection_error())
            }
        }
    }

    fn handle_pause(&mut self) -> Option<RtspResponse> {
        self.stop_sender();
        tracing::info!(session_id = self.session_id, "session paused");
        Some(RtspResponse::ok())
    }

    fn handle_teardown(&mut self) -> Option<RtspResponse> {
        self.release();
        self.terminated = true;
        tracing::info!(session_id = self.session_id, "session terminated via TEARDOWN");
        Some(RtspResponse::ok())
    }

    fn handle_describe(&self) -> RtspResponse {
        let host = self
            .config
            .public_host
            .clone()
            .unwrap_or_else(|| self.local_ip.to_string());

        let sdp = SessionDescription {
            session_id: self.session_id,
            host: &host,
            session_name: &self.config.sdp_session_name,
            media_port: self.client_port.unwrap_or(0),
            payload_type: MJPEG_PAYLOAD_TYPE,
        }
        .generate();

        tracing::debug!(session_id = self.session_id, "DESCRIBE");
        RtspResponse::ok().with_body(sdp)
    }

    /// Stop and join the sender, parking its frame source for the next PLAY.
    fn stop_sender(&mut self) {
        if let Some(task) = self.sender.take()
            && let Some(sender) = task.stop()
        {
            tracing::debug!(
                session_id = self.session_id,
                sent = sender.packets_sent(),
                "media sender stopped"
            );
            self.source = Some(sender.into_source());
        }
    }

    /// Stop media and release the socket and frame source.
    ///
    /// Called on TEARDOWN and when the control connection is lost.
    pub fn release(&mut self) {
        self.stop_sender();
        self.udp = None;
        self.source = None;
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, RtspError};
    use crate::session::{SESSION_ID_MAX, SESSION_ID_MIN};
    use std::net::{Ipv4Addr, UdpSocket};
    use std::time::Duration;

    struct CountingSource {
        remaining: u32,
        number: u32,
    }

    impl FrameSource for CountingSource {
        fn next_frame(&mut self) -> Option<Vec<u8>> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            self.number += 1;
            Some(format!("jpeg{}", self.number).into_bytes())
        }

        fn frame_number(&self) -> u32 {
            self.number
        }
    }

    struct TestStore;

    impl FrameStore for TestStore {
        fn open(&self, name: &str) -> Result<Box<dyn FrameSource>> {
            match name {
                "movie.Mjpeg" => Ok(Box::new(CountingSource {
                    remaining: 10_000,
                    number: 0,
                })),
                _ => Err(RtspError::ResourceNotFound(name.to_string())),
            }
        }
    }

    struct Harness {
        session: ServerSession,
        media: UdpSocket,
        cseq: u32,
    }

    impl Harness {
        fn new() -> Self {
            let media = UdpSocket::bind("127.0.0.1:0").unwrap();
            media
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            let config = ServerConfig {
                frame_interval: Duration::from_millis(5),
                ..ServerConfig::default()
            };
            let peer = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 40000);
            Self {
                session: ServerSession::new(
                    peer,
                    Ipv4Addr::LOCALHOST.into(),
                    Arc::new(TestStore),
                    Arc::new(config),
                ),
                media,
                cseq: 0,
            }
        }

        fn media_port(&self) -> u16 {
            self.media.local_addr().unwrap().port()
        }

        fn send(&mut self, method: Method) -> Option<RtspResponse> {
            self.send_to(method, "movie.Mjpeg")
        }

        fn send_to(&mut self, method: Method, resource: &str) -> Option<RtspResponse> {
            self.cseq += 1;
            let mut request = RtspRequest::new(method, resource, self.cseq);
            request = match method {
                Method::Setup => request.add_header(
                    "Transport",
                    &TransportHeader {
                        client_port: self.media_port(),
                    }
                    .to_header_value(),
                ),
                _ => request.add_header("Session", &self.session.session_id().to_string()),
            };
            self.session.handle(&request)
        }

        fn in_state(state: SessionState) -> Self {
            let mut h = Self::new();
            match state {
                SessionState::Init => {}
                SessionState::Ready => assert!(h.send(Method::Setup).unwrap().is_ok()),
                SessionState::Playing => h.into_playing(),
            }
            h
        }

        fn into_playing(&mut self) {
            assert!(self.send(Method::Setup).unwrap().is_ok());
            assert!(self.send(Method::Play).unwrap().is_ok());
        }
    }

    #[test]
    fn setup_assigns_session_and_reads_port() {
        let mut h = Harness::new();
        let reply = h.send(Method::Setup).unwrap();
        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.cseq(), Some(1));
        let id = reply.session().unwrap();
        assert!((100_000..=999_999).contains(&id));
        assert_eq!(h.session.session_id(), id);
        assert_eq!(h.session.state(), SessionState::Ready);
        assert_eq!(h.session.resource(), Some("movie.Mjpeg"));
        assert_eq!(h.session.media_addr().unwrap().port(), h.media_port());
        assert!(reply.serialize().starts_with(&format!(
            "RTSP/1.0 200 OK\nCSeq: 1\nSession: {id}\n"
        )));
    }

    #[test]
    fn setup_unknown_resource_is_404_and_stays_init() {
        let mut h = Harness::new();
        let reply = h.send_to(Method::Setup, "missing.Mjpeg").unwrap();
        assert_eq!(reply.status_code, 404);
        assert_eq!(reply.session(), Some(0));
        assert_eq!(h.session.state(), SessionState::Init);
        assert_eq!(h.session.session_id(), 0);
    }

    #[test]
    fn setup_without_transport_is_ignored() {
        let mut h = Harness::new();
        let request = RtspRequest::new(Method::Setup, "movie.Mjpeg", 1);
        assert!(h.session.handle(&request).is_none());
        assert_eq!(h.session.state(), SessionState::Init);
    }

    #[test]
    fn play_starts_sender_with_sequence_from_one() {
        let mut h = Harness::new();
        h.into_playing();
        assert_eq!(h.session.state(), SessionState::Playing);
        assert!(h.session.is_sending());

        let mut buf = [0u8; 1024];
        for expected in 1u16..=3 {
            let n = h.media.recv(&mut buf).unwrap();
            let packet = crate::media::rtp::decode(&buf[..n]).unwrap();
            assert_eq!(packet.sequence(), expected);
            assert_eq!(packet.payload, format!("jpeg{expected}").into_bytes());
        }
    }

    #[test]
    fn pause_stops_sender_and_resume_continues_numbering() {
        let mut h = Harness::new();
        h.into_playing();

        let reply = h.send(Method::Pause).unwrap();
        assert!(reply.is_ok());
        assert_eq!(h.session.state(), SessionState::Ready);
        assert!(!h.session.is_sending());

        // Drain whatever was sent before the pause.
        h.media
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        let mut buf = [0u8; 1024];
        let mut last = 0u16;
        while let Ok(n) = h.media.recv(&mut buf) {
            last = crate::media::rtp::decode(&buf[..n]).unwrap().sequence();
        }

        h.media
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        assert!(h.send(Method::Play).unwrap().is_ok());
        let n = h.media.recv(&mut buf).unwrap();
        assert_eq!(
            crate::media::rtp::decode(&buf[..n]).unwrap().sequence(),
            last + 1
        );
    }

    #[test]
    fn pause_in_ready_is_ignored() {
        let mut h = Harness::new();
        h.send(Method::Setup).unwrap();
        assert!(h.send(Method::Pause).is_none());
        assert_eq!(h.session.state(), SessionState::Ready);
    }

    const STATES: [SessionState; 3] = [
        SessionState::Init,
        SessionState::Ready,
        SessionState::Playing,
    ];
    const METHODS: [Method; 5] = [
        Method::Setup,
        Method::Play,
        Method::Pause,
        Method::Teardown,
        Method::Describe,
    ];

    fn other_id(id: u32) -> u32 {
        if id == SESSION_ID_MAX {
            SESSION_ID_MIN
        } else {
            id + 1
        }
    }

    #[test]
    fn every_invalid_pair_gets_no_reply() {
        for state in STATES {
            for method in METHODS {
                if state.transition(method).is_some() {
                    continue;
                }
                let mut h = Harness::in_state(state);
                assert!(h.send(method).is_none(), "{state:?} + {method}");
                assert_eq!(h.session.state(), state, "{state:?} + {method}");
                assert!(!h.session.is_terminated());
                assert_eq!(h.session.is_sending(), state == SessionState::Playing);
            }
        }
    }

    #[test]
    fn stale_session_id_is_ignored_in_every_bound_state() {
        for state in [SessionState::Ready, SessionState::Playing] {
            for method in METHODS.into_iter().filter(|&m| m != Method::Setup) {
                let mut h = Harness::in_state(state);
                let wrong = other_id(h.session.session_id());
                let request = RtspRequest::new(method, "movie.Mjpeg", 99)
                    .add_header("Session", &wrong.to_string());
                assert!(h.session.handle(&request).is_none(), "{state:?} + {method}");

                let missing = RtspRequest::new(method, "movie.Mjpeg", 100);
                assert!(h.session.handle(&missing).is_none(), "{state:?} + {method}");

                assert_eq!(h.session.state(), state);
                assert!(!h.session.is_terminated());
            }
        }
    }

    #[test]
    fn teardown_from_any_state() {
        for steps in 0..3 {
            let mut h = Harness::new();
            if steps >= 1 {
                h.send(Method::Setup).unwrap();
            }
            if steps >= 2 {
                h.send(Method::Play).unwrap();
            }
            let reply = h.send(Method::Teardown).unwrap();
            assert!(reply.is_ok());
            assert_eq!(h.session.state(), SessionState::Init);
            assert!(h.session.is_terminated());
            assert!(!h.session.is_sending());
        }
    }

    #[test]
    fn describe_in_every_state_keeps_state() {
        let mut h = Harness::new();
        let reply = h.send(Method::Describe).unwrap();
        let body = reply.body.as_deref().unwrap();
        assert!(body.contains("o=- 0 1 IN IP4 127.0.0.1\n"));
        assert!(body.contains("m=video 0 RTP/AVP 26\n"));
        assert_eq!(h.session.state(), SessionState::Init);

        h.send(Method::Setup).unwrap();
        let reply = h.send(Method::Describe).unwrap();
        let body = reply.body.unwrap();
        assert!(body.contains(&format!("o=- {} 1 IN IP4", h.session.session_id())));
        assert!(body.contains(&format!("m=video {} RTP/AVP 26", h.media_port())));
        assert!(body.contains("s=RTSP Session\n"));
        assert!(body.contains("a=mimetype:string; \"video/MJPEG\"\n"));
        assert_eq!(h.session.state(), SessionState::Ready);
    }
}
