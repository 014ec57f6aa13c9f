use std::io::{BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Result, RtspError};
use crate::media::receiver::DEFAULT_RECV_TIMEOUT;
use crate::media::{FrameSink, MediaReceiver, MediaTask};
use crate::protocol::{Method, RtspResponse};
use crate::session::{ClientSession, ReplyOutcome, SessionState};
use crate::transport::tcp::read_message;

/// Client-side configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Control address of the server (`host:port`).
    pub server_addr: String,
    /// Local UDP port the media receiver binds after SETUP.
    pub rtp_port: u16,
    /// Resource (video file name) requested at SETUP.
    pub resource: String,
    /// Local IP the media receiver binds to.
    pub media_bind_ip: String,
    /// UDP read timeout; how quickly the receiver notices PAUSE/TEARDOWN.
    pub recv_timeout: Duration,
    /// How long to wait for a reply before giving up on it.
    pub reply_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8554".to_string(),
            rtp_port: 25000,
            resource: "movie.Mjpeg".to_string(),
            media_bind_ip: "0.0.0.0".to_string(),
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            reply_timeout: Duration::from_secs(5),
        }
    }
}

/// Builds the frame sink once the session id is known.
pub type SinkFactory = Box<dyn FnOnce(u32) -> Box<dyn FrameSink> + Send>;

/// Media channel lifecycle on the client.
enum Media {
    /// Before SETUP: nothing bound yet.
    Unbound(SinkFactory),
    /// Socket bound, receiver parked (READY).
    Idle(MediaReceiver),
    /// Receiver thread running (PLAYING).
    Running(MediaTask<MediaReceiver>),
    /// After TEARDOWN, or after a receiver panic.
    Closed,
}

/// Drives a [`ClientSession`] over one control connection.
///
/// Each call sends one request and waits for its reply. All session state
/// changes happen on the calling thread; the receiver thread only reads
/// its stop signal and the teardown flag.
pub struct Client {
    session: ClientSession,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    media: Media,
    config: ClientConfig,
    closed: bool,
}

impl Client {
    /// Connect and deliver frames to `sink`.
    pub fn connect(config: ClientConfig, sink: Box<dyn FrameSink>) -> Result<Self> {
        Self::connect_with(config, Box::new(move |_: u32| sink))
    }

    /// Connect, building the sink from the session id once SETUP succeeds.
    pub fn connect_with(config: ClientConfig, sink: SinkFactory) -> Result<Self> {
        let addr = config
            .server_addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no address resolved")
            })?;

        let stream = TcpStream::connect_timeout(&addr, config.reply_timeout)?;
        stream.set_read_timeout(Some(config.reply_timeout))?;
        let reader = BufReader::new(stream.try_clone()?);

        tracing::info!(server = %addr, resource = %config.resource, "connected");

        Ok(Self {
            session: ClientSession::new(&config.resource, config.rtp_port),
            reader,
            writer: stream,
            media: Media::Unbound(sink),
            config,
            closed: false,
        })
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Whether the media receiver thread is running.
    pub fn is_receiving(&self) -> bool {
        matches!(&self.media, Media::Running(task) if !task.is_finished())
    }

    pub fn setup(&mut self) -> Result<ReplyOutcome> {
        self.send(Method::Setup)
    }

    pub fn play(&mut self) -> Result<ReplyOutcome> {
        self.send(Method::Play)
    }

    pub fn pause(&mut self) -> Result<ReplyOutcome> {
        self.send(Method::Pause)
    }

    pub fn teardown(&mut self) -> Result<ReplyOutcome> {
        self.send(Method::Teardown)
    }

    /// Fetch the session description. `None` if the server refused.
    pub fn describe(&mut self) -> Result<Option<String>> {
        Ok(match self.send(Method::Describe)? {
            ReplyOutcome::Described(body) => Some(body),
            _ => None,
        })
    }

    /// Send one request and apply its reply.
    ///
    /// Replies that do not match the request (a CSeq or session id left
    /// over from an earlier exchange) are dropped and reading continues
    /// until the matching reply arrives. Gives up with
    /// [`ErrorKind::TimedOut`] after `reply_timeout`.
    pub fn send(&mut self, method: Method) -> Result<ReplyOutcome> {
        if self.closed {
            return Err(RtspError::ConnectionClosed);
        }
        if method == Method::Play && self.session.state() == SessionState::Ready {
            if matches!(self.media, Media::Unbound(_)) {
                self.bind_media(self.session.session_id())?;
            }
            if !matches!(self.media, Media::Idle(_)) {
                return Err(RtspError::MediaNotBound);
            }
        }

        let request = self.session.request(method)?;
        self.writer.write_all(request.serialize().as_bytes())?;

        let deadline = Instant::now() + self.config.reply_timeout;
        loop {
            let reply = self.read_reply()?;
            match self.session.handle_reply(&reply) {
                Ok(outcome) => {
                    self.apply(&outcome)?;
                    return Ok(outcome);
                }
                Err(e) if e.is_stale_reply() => {
                    tracing::debug!(%method, error = %e, "stale reply dropped");
                    if Instant::now() >= deadline {
                        return Err(std::io::Error::new(
                            ErrorKind::TimedOut,
                            "no reply matching the request",
                        )
                        .into());
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn read_reply(&mut self) -> Result<RtspResponse> {
        match read_message(&mut self.reader)? {
            Some(text) => RtspResponse::parse(&text),
            None => {
                self.closed = true;
                Err(RtspError::ConnectionClosed)
            }
        }
    }

    /// Media side effects of an accepted reply.
    fn apply(&mut self, outcome: &ReplyOutcome) -> Result<()> {
        match outcome {
            ReplyOutcome::Ready { session_id } => self.bind_media(*session_id),
            ReplyOutcome::Playing => self.start_receiver(),
            ReplyOutcome::Paused => {
                self.stop_receiver();
                Ok(())
            }
            ReplyOutcome::TornDown => {
                self.stop_receiver();
                self.media = Media::Closed;
                self.closed = true;
                let _ = self.writer.shutdown(Shutdown::Both);
                tracing::info!(session_id = self.session.session_id(), "session closed");
                Ok(())
            }
            ReplyOutcome::Described(_) | ReplyOutcome::Failed { .. } => Ok(()),
        }
    }

    fn bind_media(&mut self, session_id: u32) -> Result<()> {
        let factory = match std::mem::replace(&mut self.media, Media::Closed) {
            Media::Unbound(factory) => factory,
            other => {
                self.media = other;
                return Ok(());
            }
        };

        let addr = format!("{}:{}", self.config.media_bind_ip, self.config.rtp_port);
        let socket = match UdpSocket::bind(&addr) {
            Ok(socket) => socket,
            Err(e) => {
                tracing::error!(%addr, error = %e, "unable to bind media port");
                self.media = Media::Unbound(factory);
                return Err(e.into());
            }
        };

        let receiver = MediaReceiver::new(
            Arc::new(socket),
            factory(session_id),
            self.config.recv_timeout,
            self.session.teardown_flag(),
        )?;
        tracing::debug!(%addr, session_id, "media port bound");
        self.media = Media::Idle(receiver);
        Ok(())
    }

    fn start_receiver(&mut self) -> Result<()> {
        self.media = match std::mem::replace(&mut self.media, Media::Closed) {
            Media::Idle(receiver) => Media::Running(receiver.spawn()?),
            other => other,
        };
        Ok(())
    }

    fn stop_receiver(&mut self) {
        self.media = match std::mem::replace(&mut self.media, Media::Closed) {
            Media::Running(task) => match task.stop() {
                Some(receiver) => {
                    tracing::debug!(
                        delivered = receiver.frames_delivered(),
                        high_water = receiver.high_water(),
                        "media receiver stopped"
                    );
                    Media::Idle(receiver)
                }
                None => Media::Closed,
            },
            other => other,
        };
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Media::Running(task) = std::mem::replace(&mut self.media, Media::Closed) {
            task.stop();
        }
    }
}
