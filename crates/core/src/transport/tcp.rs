use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::media::FrameStore;
use crate::protocol::RtspRequest;
use crate::server::ServerConfig;
use crate::session::ServerSession;

/// Upper bound on the request/status line plus headers of one message.
pub const MAX_HEADER_LEN: usize = 8 * 1024;

/// Upper bound on a declared `Content-Length` body.
pub const MAX_BODY_LEN: usize = 64 * 1024;

fn too_large(what: &str, limit: usize) -> std::io::Error {
    std::io::Error::new(
        ErrorKind::InvalidData,
        format!("{what} exceeds {limit} bytes"),
    )
}

/// Read one control message: lines up to a blank line, plus a
/// `Content-Length` body if one is declared.
///
/// Leading blank lines are skipped. Returns `Ok(None)` on a clean EOF
/// before any content; a message cut short by EOF is returned as-is.
/// Headers beyond [`MAX_HEADER_LEN`] or a body beyond [`MAX_BODY_LEN`]
/// fail with [`ErrorKind::InvalidData`].
pub fn read_message<R: BufRead>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut message = String::new();
    let mut consumed = 0usize;
    loop {
        let mut line = String::new();
        let budget = (MAX_HEADER_LEN - consumed) as u64 + 1;
        let n = reader.by_ref().take(budget).read_line(&mut line)?;
        if n == 0 {
            return Ok((!message.is_empty()).then_some(message));
        }
        consumed += n;
        if consumed > MAX_HEADER_LEN {
            return Err(too_large("message header", MAX_HEADER_LEN));
        }
        if line.trim().is_empty() {
            if message.is_empty() {
                continue;
            }
            message.push_str(&line);
            break;
        }
        message.push_str(&line);
    }

    let content_length = message
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<u64>().ok());

    if let Some(len) = content_length
        && len > 0
    {
        if len > MAX_BODY_LEN as u64 {
            return Err(too_large("message body", MAX_BODY_LEN));
        }
        let mut body = vec![0u8; len as usize];
        reader.read_exact(&mut body)?;
        message.push_str(&String::from_utf8_lossy(&body));
    }

    Ok(Some(message))
}

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50ms poll interval
/// so that [`crate::server::Server::stop`] can terminate it promptly.
pub fn accept_loop(
    listener: TcpListener,
    store: Arc<dyn FrameStore>,
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let s = store.clone();
                let c = config.clone();
                let r = running.clone();
                thread::spawn(move || {
                    Connection::handle(stream, s, c, r);
                });
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// A single control connection and the session it carries.
struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    session: ServerSession,
    peer_addr: SocketAddr,
}

impl Connection {
    /// Entry point: set up a connection and run its request loop.
    pub fn handle(
        stream: TcpStream,
        store: Arc<dyn FrameStore>,
        config: Arc<ServerConfig>,
        running: Arc<AtomicBool>,
    ) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => return,
        };
        let local_ip = stream
            .local_addr()
            .map(|a| a.ip())
            .unwrap_or(IpAddr::from([127, 0, 0, 1]));

        tracing::info!(%peer_addr, "client connected");

        let reader_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(_) => return,
        };

        let mut conn = Connection {
            reader: BufReader::new(reader_stream),
            writer: stream,
            session: ServerSession::new(peer_addr, local_ip, store, config),
            peer_addr,
        };

        let reason = conn.run(&running);
        conn.session.release();

        tracing::info!(
            %peer_addr,
            session_id = conn.session.session_id(),
            reason,
            "client disconnected"
        );
    }

    /// Request/reply loop. Returns the reason for exiting.
    fn run(&mut self, running: &Arc<AtomicBool>) -> &'static str {
        while running.load(Ordering::SeqCst) {
            let request_text = match read_message(&mut self.reader) {
                Ok(Some(text)) => text,
                Ok(None) => return "connection closed by client",
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "control read failed");
                    return "read error";
                }
            };

            let request = match RtspRequest::parse(&request_text) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "parse error");
                    continue;
                }
            };

            tracing::debug!(
                peer = %self.peer_addr,
                method = %request.method,
                resource = %request.resource,
                cseq = ?request.cseq(),
                "request"
            );

            let Some(response) = self.session.handle(&request) else {
                continue;
            };

            tracing::debug!(
                peer = %self.peer_addr,
                status = response.status_code,
                "response"
            );

            if self
                .writer
                .write_all(response.serialize().as_bytes())
                .is_err()
            {
                return "write error";
            }

            if self.session.is_terminated() {
                let _ = self.writer.flush();
                let _ = self.writer.shutdown(Shutdown::Both);
                return "session torn down";
            }
        }

        "server shutting down"
    }
}
