use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::{Result, RtspError};
use crate::media::sender::DEFAULT_FRAME_INTERVAL;
use crate::media::{FrameStore, MediaDirectory};
use crate::transport::tcp;

/// Server-level configuration used by sessions.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address advertised in the session description origin line.
    /// When `None`, the local IP of the control connection is used.
    pub public_host: Option<String>,
    /// Session description name (`s=`).
    pub sdp_session_name: String,
    /// Delay between frames sent by the media sender.
    pub frame_interval: Duration,
    /// Local address each session's media socket binds to.
    pub media_bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            public_host: None,
            sdp_session_name: "RTSP Session".to_string(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            media_bind_addr: "0.0.0.0:0".to_string(),
        }
    }
}

/// Streaming server: accepts control connections and runs one session
/// per connection.
///
/// Delegates connection handling to [`transport::tcp`](crate::transport::tcp);
/// each session owns its own media sender and UDP socket.
pub struct Server {
    running: Arc<AtomicBool>,
    bind_addr: String,
    local_addr: Option<SocketAddr>,
    store: Arc<dyn FrameStore>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Serve video files from `media_root`.
    pub fn new(bind_addr: &str, media_root: impl Into<PathBuf>) -> Self {
        Self::with_store(
            bind_addr,
            Arc::new(MediaDirectory::new(media_root)),
            ServerConfig::default(),
        )
    }

    /// Create a server with a custom frame store and configuration.
    pub fn with_store(bind_addr: &str, store: Arc<dyn FrameStore>, config: ServerConfig) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            bind_addr: bind_addr.to_string(),
            local_addr: None,
            store,
            config: Arc::new(config),
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RtspError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let store = self.store.clone();
        let config = self.config.clone();

        tracing::info!(addr = %local_addr, "RTSP server listening");

        thread::spawn(move || {
            tcp::accept_loop(listener, store, config, running);
        });

        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The bound listener address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.local_addr.ok_or(RtspError::NotStarted)
    }

    /// Returns the server's configuration.
    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_addr_requires_start() {
        let mut server = Server::new("127.0.0.1:0", std::env::temp_dir());
        assert!(matches!(server.local_addr(), Err(RtspError::NotStarted)));

        server.start().unwrap();
        assert!(server.is_running());
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert!(matches!(server.start(), Err(RtspError::AlreadyRunning)));

        server.stop();
        assert!(!server.is_running());
    }
}
