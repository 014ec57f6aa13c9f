use std::fmt;
use std::str::FromStr;

use crate::error::{ParseErrorKind, RtspError};

/// Protocol version written on every request and reply line.
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// The control methods this protocol speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Setup,
    Play,
    Pause,
    Teardown,
    Describe,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Teardown => "TEARDOWN",
            Self::Describe => "DESCRIBE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RtspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SETUP" => Ok(Self::Setup),
            "PLAY" => Ok(Self::Play),
            "PAUSE" => Ok(Self::Pause),
            "TEARDOWN" => Ok(Self::Teardown),
            "DESCRIBE" => Ok(Self::Describe),
            other => Err(RtspError::parse(ParseErrorKind::UnknownMethod(
                other.to_string(),
            ))),
        }
    }
}

/// A parsed control request.
///
/// ```text
/// SETUP movie.Mjpeg RTSP/1.0
/// CSeq: 1
/// Transport: RTP/UDP; client_port= 25000
///
/// ```
///
/// Header lookup is case-insensitive. Both `\n` and `\r\n` line endings are
/// accepted; [`serialize`](Self::serialize) writes `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspRequest {
    pub method: Method,
    /// Resource name (the video file requested at SETUP).
    pub resource: String,
    pub version: String,
    /// Headers as ordered (name, value) pairs.
    pub headers: Vec<(String, String)>,
}

impl RtspRequest {
    pub fn new(method: Method, resource: &str, cseq: u32) -> Self {
        RtspRequest {
            method,
            resource: resource.to_string(),
            version: RTSP_VERSION.to_string(),
            headers: vec![("CSeq".to_string(), cseq.to_string())],
        }
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Parse a request from its text representation.
    ///
    /// Parsing stops at the first blank line.
    pub fn parse(raw: &str) -> crate::error::Result<Self> {
        let mut lines = raw.lines().skip_while(|l| l.trim().is_empty());

        let request_line = lines
            .next()
            .ok_or(RtspError::parse(ParseErrorKind::EmptyMessage))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(RtspError::parse(ParseErrorKind::InvalidRequestLine));
        }

        let method = parts[0].parse()?;
        let resource = parts[1].to_string();
        let version = parts[2].to_string();

        if version != RTSP_VERSION {
            tracing::warn!(version, "client sent non-RTSP/1.0 version");
        }

        let headers = parse_headers(lines)?;

        Ok(RtspRequest {
            method,
            resource,
            version,
            headers,
        })
    }

    /// Look up a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The CSeq header, which correlates a reply with its request.
    pub fn cseq(&self) -> Option<u32> {
        self.get_header("CSeq").and_then(|v| v.parse().ok())
    }

    /// The `Session` header as a numeric id.
    pub fn session(&self) -> Option<u32> {
        self.get_header("Session").and_then(parse_session_id)
    }

    /// Serialize to the wire format, terminated by a blank line.
    pub fn serialize(&self) -> String {
        let mut request = format!("{} {} {}\n", self.method, self.resource, self.version);
        for (name, value) in &self.headers {
            request.push_str(&format!("{}: {}\n", name, value));
        }
        request.push('\n');
        request
    }
}

/// Parse `Name: value` lines up to the first blank line.
pub(crate) fn parse_headers<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> crate::error::Result<Vec<(String, String)>> {
    let mut headers = Vec::new();

    for line in lines {
        if line.trim().is_empty() {
            break;
        }

        let colon_pos = line
            .find(':')
            .ok_or(RtspError::parse(ParseErrorKind::InvalidHeader))?;

        let name = line[..colon_pos].trim().to_string();
        let value = line[colon_pos + 1..].trim().to_string();

        headers.push((name, value));
    }

    Ok(headers)
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Session ids may carry a `;timeout=` suffix: `"123456;timeout=60"` -> 123456.
pub(crate) fn parse_session_id(value: &str) -> Option<u32> {
    value.split(';').next().unwrap_or(value).trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_setup_with_transport() {
        let raw = "SETUP movie.Mjpeg RTSP/1.0\nCSeq: 1\nTransport: RTP/UDP; client_port= 25000\n\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, Method::Setup);
        assert_eq!(req.resource, "movie.Mjpeg");
        assert_eq!(req.version, "RTSP/1.0");
        assert_eq!(req.cseq(), Some(1));
        assert_eq!(
            req.get_header("Transport"),
            Some("RTP/UDP; client_port= 25000")
        );
        assert_eq!(req.session(), None);
    }

    #[test]
    fn parse_play_with_session_crlf() {
        let raw = "PLAY movie.Mjpeg RTSP/1.0\r\nCSeq: 2\r\nSession: 123456\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, Method::Play);
        assert_eq!(req.cseq(), Some(2));
        assert_eq!(req.session(), Some(123456));
    }

    #[test]
    fn parse_without_trailing_blank_line() {
        let raw = "TEARDOWN movie.Mjpeg RTSP/1.0\nCSeq: 5\nSession: 654321\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, Method::Teardown);
        assert_eq!(req.session(), Some(654321));
    }

    #[test]
    fn parse_empty_request() {
        assert!(RtspRequest::parse("").is_err());
        assert!(RtspRequest::parse("\n\n").is_err());
    }

    #[test]
    fn parse_invalid_request_line() {
        assert!(RtspRequest::parse("JUST_A_METHOD\n\n").is_err());
    }

    #[test]
    fn parse_unknown_method() {
        match RtspRequest::parse("OPTIONS * RTSP/1.0\nCSeq: 1\n\n") {
            Err(RtspError::Parse {
                kind: ParseErrorKind::UnknownMethod(m),
            }) => assert_eq!(m, "OPTIONS"),
            other => panic!("expected UnknownMethod, got {other:?}"),
        }
    }

    #[test]
    fn header_lookup_case_insensitive() {
        let req = RtspRequest::parse("PAUSE f RTSP/1.0\ncseq: 42\n\n").unwrap();
        assert_eq!(req.get_header("CSeq"), Some("42"));
        assert_eq!(req.cseq(), Some(42));
    }

    #[test]
    fn serialize_matches_wire_format() {
        let req = RtspRequest::new(Method::Setup, "movie.Mjpeg", 1)
            .add_header("Transport", "RTP/UDP; client_port= 25000");
        assert_eq!(
            req.serialize(),
            "SETUP movie.Mjpeg RTSP/1.0\nCSeq: 1\nTransport: RTP/UDP; client_port= 25000\n\n"
        );
        assert_eq!(RtspRequest::parse(&req.serialize()).unwrap(), req);
    }

    #[test]
    fn session_id_with_timeout_suffix() {
        assert_eq!(parse_session_id("123456;timeout=60"), Some(123456));
        assert_eq!(parse_session_id("abc"), None);
    }
}
