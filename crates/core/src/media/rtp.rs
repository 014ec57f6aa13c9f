//! RTP codec for MJPEG frames.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             SSRC                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! One JPEG frame travels in one packet. The sequence number is the frame
//! index truncated to 16 bits; timestamp and SSRC are always 0.
//!
//! No size ceiling is enforced: a frame larger than a UDP datagram can carry
//! (65507 bytes of IPv4 payload) still encodes, and fails later at send time.

use crate::error::{Result, RtspError};

/// RTP version written into every header.
pub const RTP_VERSION: u8 = 2;

/// Static payload type for JPEG video (RFC 3551).
pub const MJPEG_PAYLOAD_TYPE: u8 = 26;

/// Length of the fixed RTP header.
pub const HEADER_LEN: usize = 12;

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// The 12-byte fixed RTP header (RFC 3550 §5.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    /// Header for one MJPEG frame with the given sequence number.
    pub fn mjpeg(sequence: u16) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type: MJPEG_PAYLOAD_TYPE,
            sequence,
            timestamp: 0,
            ssrc: 0,
        }
    }

    /// Serialize to the 12-byte wire format.
    pub fn write(&self) -> [u8; HEADER_LEN] {
        let first_byte = (self.version << 6)
            | ((self.padding as u8) << 5)
            | ((self.extension as u8) << 4)
            | (self.csrc_count & 0x0f);
        let second_byte = ((self.marker as u8) << 7) | (self.payload_type & 0x7f);

        let mut header = [0u8; HEADER_LEN];
        header[0] = first_byte;
        header[1] = second_byte;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        header
    }

    /// Parse the fixed header from the front of `buf`.
    ///
    /// Fields are taken as-is; version and payload type are not checked.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(RtspError::MalformedPacket { len: buf.len() });
        }

        Ok(Self {
            version: buf[0] >> 6,
            padding: buf[0] & 0x20 != 0,
            extension: buf[0] & 0x10 != 0,
            csrc_count: buf[0] & 0x0f,
            marker: buf[1] & 0x80 != 0,
            payload_type: buf[1] & 0x7f,
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

/// A decoded RTP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    pub payload: Vec<u8>,
}

impl RtpPacket {
    pub fn sequence(&self) -> u16 {
        self.header.sequence
    }
}

/// Packetize one frame. `frame_number` is truncated to 16 bits.
pub fn encode(frame_number: u32, payload: &[u8]) -> Vec<u8> {
    let header = RtpHeader::mjpeg(frame_number as u16);
    let mut packet = Vec::with_capacity(HEADER_LEN + payload.len());
    packet.extend_from_slice(&header.write());
    packet.extend_from_slice(payload);
    packet
}

/// Decode a received datagram.
pub fn decode(datagram: &[u8]) -> Result<RtpPacket> {
    let header = RtpHeader::parse(datagram)?;
    Ok(RtpPacket {
        header,
        payload: datagram[HEADER_LEN..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_2() {
        let buf = encode(1, b"jpeg");
        assert_eq!(buf[0] >> 6, 2);
    }

    #[test]
    fn fixed_fields() {
        let buf = encode(7, b"");
        assert_eq!(buf.len(), HEADER_LEN);
        // P, X, CC and M all clear
        assert_eq!(buf[0] & 0x3f, 0);
        assert_eq!(buf[1] & 0x80, 0);
        assert_eq!(buf[1] & 0x7f, MJPEG_PAYLOAD_TYPE);
        assert_eq!(&buf[4..12], &[0u8; 8]);
    }

    #[test]
    fn sequence_big_endian() {
        let buf = encode(0x1234, b"x");
        assert_eq!(&buf[2..4], &[0x12, 0x34]);
    }

    #[test]
    fn round_trip_masks_sequence() {
        for seq in [0u32, 1, 2, 65_535, 65_536, 65_537, 131_071, u32::MAX] {
            for len in [0usize, 1, 11, 12, 1400] {
                let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
                let packet = decode(&encode(seq, &payload)).unwrap();
                assert_eq!(u32::from(packet.sequence()), seq % 65_536);
                assert_eq!(packet.payload, payload);
            }
        }
    }

    #[test]
    fn short_datagram_is_malformed() {
        for len in 0..HEADER_LEN {
            let buf = vec![0x80u8; len];
            match decode(&buf) {
                Err(RtspError::MalformedPacket { len: got }) => assert_eq!(got, len),
                other => panic!("expected MalformedPacket, got {other:?}"),
            }
        }
    }

    #[test]
    fn decode_is_lenient_about_header_fields() {
        let mut buf = encode(5, b"abc");
        buf[0] = 0x3f; // version 0, padding, extension, cc=15
        buf[1] = 0xff; // marker, pt 127
        let packet = decode(&buf).unwrap();
        assert_eq!(packet.header.version, 0);
        assert!(packet.header.padding);
        assert!(packet.header.extension);
        assert_eq!(packet.header.csrc_count, 15);
        assert!(packet.header.marker);
        assert_eq!(packet.header.payload_type, 127);
        assert_eq!(packet.sequence(), 5);
        assert_eq!(packet.payload, b"abc");
    }

    #[test]
    fn header_write_parse() {
        let header = RtpHeader {
            marker: true,
            timestamp: 0xAABBCCDD,
            ssrc: 0x01020304,
            ..RtpHeader::mjpeg(42)
        };
        assert_eq!(RtpHeader::parse(&header.write()).unwrap(), header);
    }

    #[test]
    fn oversize_payload_still_encodes() {
        let payload = vec![0u8; MAX_UDP_PAYLOAD];
        let buf = encode(1, &payload);
        assert_eq!(buf.len(), MAX_UDP_PAYLOAD + HEADER_LEN);
    }
}
