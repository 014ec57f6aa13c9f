/// Parsed client-side transport info from the `Transport` request header.
///
/// Only the client's media port matters; the protocol field is not checked.
///
/// ## Wire format example
///
/// ```text
/// Transport: RTP/UDP; client_port= 25000
/// Transport: RTP/AVP;unicast;client_port=8000-8001
/// ```
///
/// For a port range only the first (RTP) port is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHeader {
    /// Client's requested media receive port.
    pub client_port: u16,
}

impl TransportHeader {
    /// Look for `client_port=` among semicolon-separated parameters.
    ///
    /// ## Examples
    ///
    /// ```
    /// use rtsp_mjpeg::session::TransportHeader;
    ///
    /// let th = TransportHeader::parse("RTP/UDP; client_port= 25000").unwrap();
    /// assert_eq!(th.client_port, 25000);
    ///
    /// assert!(TransportHeader::parse("RTP/UDP").is_none());
    /// ```
    pub fn parse(header: &str) -> Option<Self> {
        header.split(';').find_map(|part| {
            let ports = part.trim().strip_prefix("client_port=")?;
            let rtp = ports.split('-').next()?.trim();
            rtp.parse().ok().map(|client_port| TransportHeader { client_port })
        })
    }

    /// Header value the client sends with SETUP.
    pub fn to_header_value(&self) -> String {
        format!("RTP/UDP; client_port= {}", self.client_port)
    }
}
