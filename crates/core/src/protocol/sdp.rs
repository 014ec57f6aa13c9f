//! Session description returned by DESCRIBE.
//!
//! ```text
//! v=0                                   ← protocol version
//! o=- <session-id> 1 IN IP4 <addr>      ← origin
//! s=RTSP Session                        ← session name
//! m=video <port> RTP/AVP 26             ← media line (negotiated client port)
//! a=mimetype:string; "video/MJPEG"      ← payload mime type
//! ```

/// Fields that vary per session.
#[derive(Debug, Clone)]
pub struct SessionDescription<'a> {
    /// Bound session id, or 0 before SETUP.
    pub session_id: u32,
    /// Server address advertised in the origin line.
    pub host: &'a str,
    /// Session name (`s=`).
    pub session_name: &'a str,
    /// Negotiated client media port, or 0 before SETUP.
    pub media_port: u16,
    pub payload_type: u8,
}

impl SessionDescription<'_> {
    /// Render as newline-separated lines with a trailing newline.
    pub fn generate(&self) -> String {
        let sdp = [
            "v=0".to_string(),
            format!("o=- {} 1 IN IP4 {}", self.session_id, self.host),
            format!("s={}", self.session_name),
            format!(
                "m=video {} RTP/AVP {}",
                self.media_port, self.payload_type
            ),
            "a=mimetype:string; \"video/MJPEG\"".to_string(),
        ];

        tracing::debug!(
            session_id = self.session_id,
            sdp = %sdp.join(" | "),
            "session description"
        );

        format!("{}\n", sdp.join("\n"))
    }
}
