use crate::error::{ParseErrorKind, RtspError};
use crate::protocol::request::{RTSP_VERSION, find_header, parse_headers, parse_session_id};

/// A control reply.
///
/// Serializes to:
///
/// ```text
/// RTSP/1.0 200 OK
/// CSeq: 4
/// Session: 123456
/// Content-Type: application/sdp
/// Content-Length: 112
///
/// v=0
/// ...
/// ```
///
/// Builder: chain [`add_header`](Self::add_header) and
/// [`with_body`](Self::with_body), then call [`serialize`](Self::serialize).
/// `Content-Length` is computed automatically when a body is present.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RtspResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        RtspResponse {
            status_code,
            status_text: status_text.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// 200 OK.
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// 404 Not Found: SETUP named a resource that cannot be opened.
    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    /// 500 Connection Error: the media socket could not be allocated.
    pub fn connection_error() -> Self {
        Self::new(500, "Connection Error")
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Attach a session description body.
    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn cseq(&self) -> Option<u32> {
        self.get_header("CSeq").and_then(|v| v.parse().ok())
    }

    pub fn session(&self) -> Option<u32> {
        self.get_header("Session").and_then(parse_session_id)
    }

    /// Declared body length, if any.
    pub fn content_length(&self) -> Option<usize> {
        self.get_header("Content-Length")
            .and_then(|v| v.parse().ok())
    }

    /// Serialize to the wire format.
    ///
    /// With a body, `Content-Type` and `Content-Length` are appended; the
    /// message always ends with (or is split by) a blank line.
    pub fn serialize(&self) -> String {
        let mut response = format!(
            "{} {} {}\n",
            RTSP_VERSION, self.status_code, self.status_text
        );

        for (name, value) in &self.headers {
            response.push_str(&format!("{}: {}\n", name, value));
        }

        if let Some(body) = &self.body {
            response.push_str("Content-Type: application/sdp\n");
            response.push_str(&format!("Content-Length: {}\n", body.len()));
            response.push('\n');
            response.push_str(body);
        } else {
            response.push('\n');
        }
        response
    }

    /// Parse a reply: status line, headers, and everything after the first
    /// blank line as the body.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let normalized;
        let raw = if raw.contains('\r') {
            normalized = raw.replace("\r\n", "\n");
            normalized.as_str()
        } else {
            raw
        };

        let (head, body) = match raw.split_once("\n\n") {
            Some((head, body)) => (head, Some(body)),
            None => (raw, None),
        };

        let mut lines = head.lines().skip_while(|l| l.trim().is_empty());
        let status_line = lines
            .next()
            .ok_or(RtspError::parse(ParseErrorKind::EmptyMessage))?;

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        let status_code = parts
            .next()
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or(RtspError::parse(ParseErrorKind::InvalidStatusLine))?;
        let status_text = parts.next().unwrap_or("").trim().to_string();

        if !version.starts_with("RTSP/") {
            return Err(RtspError::parse(ParseErrorKind::InvalidStatusLine));
        }

        let headers = parse_headers(lines)?;
        let body = body.filter(|b| !b.is_empty()).map(str::to_string);

        Ok(RtspResponse {
            status_code,
            status_text,
            headers,
            body,
        })
    }
}
