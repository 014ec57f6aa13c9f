use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::media::signal::{MediaTask, StopSignal};
use crate::media::{FrameSource, rtp};
use crate::transport::UdpTransport;

/// Default delay between frames (20 fps).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Server-side media loop: one frame per tick, one RTP packet per frame.
///
/// Owns the session's frame source while running; [`MediaTask::stop`]
/// returns it so the next PLAY resumes at the following frame.
pub struct MediaSender {
    source: Box<dyn FrameSource>,
    transport: UdpTransport,
    dest: SocketAddr,
    interval: Duration,
    session_id: u32,
    sent: u64,
}

impl MediaSender {
    pub fn new(
        source: Box<dyn FrameSource>,
        transport: UdpTransport,
        dest: SocketAddr,
        interval: Duration,
        session_id: u32,
    ) -> Self {
        Self {
            source,
            transport,
            dest,
            interval,
            session_id,
            sent: 0,
        }
    }

    /// Start the loop on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<MediaTask<Self>> {
        let name = format!("rtp-send-{}", self.session_id);
        MediaTask::spawn(&name, move |signal| self.run(&signal))
    }

    /// Give back the frame source once the loop has stopped.
    pub fn into_source(self) -> Box<dyn FrameSource> {
        self.source
    }

    /// Packets handed to the socket without error so far.
    pub fn packets_sent(&self) -> u64 {
        self.sent
    }

    fn run(mut self, signal: &Arc<StopSignal>) -> Self {
        tracing::debug!(session_id = self.session_id, dest = %self.dest, "media sender started");

        let reason = loop {
            if signal.wait(self.interval) {
                break "stopped";
            }

            let Some(frame) = self.source.next_frame() else {
                break "end of stream";
            };

            let frame_number = self.source.frame_number();
            let packet = rtp::encode(frame_number, &frame);
            match self.transport.send_to(&packet, self.dest) {
                Ok(_) => self.sent += 1,
                Err(e) => {
                    tracing::warn!(
                        session_id = self.session_id,
                        frame_number,
                        bytes = packet.len(),
                        error = %e,
                        "RTP send failed"
                    );
                }
            }
        };

        tracing::debug!(
            session_id = self.session_id,
            sent = self.sent,
            reason,
            "media sender exited"
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;

    struct Frames {
        frames: Vec<Vec<u8>>,
        index: usize,
    }

    impl Frames {
        fn boxed(frames: Vec<Vec<u8>>) -> Box<dyn FrameSource> {
            Box::new(Self { frames, index: 0 })
        }
    }

    impl FrameSource for Frames {
        fn next_frame(&mut self) -> Option<Vec<u8>> {
            let frame = self.frames.get(self.index).cloned()?;
            self.index += 1;
            Some(frame)
        }

        fn frame_number(&self) -> u32 {
            self.index as u32
        }
    }

    fn receiver() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    #[test]
    fn sends_frames_numbered_from_one_then_exits_at_end() {
        let (socket, addr) = receiver();
        let source = Frames::boxed(vec![b"a".to_vec(), b"bb".to_vec(), b"ccc".to_vec()]);
        let sender = MediaSender::new(
            source,
            UdpTransport::bind("127.0.0.1:0").unwrap(),
            addr,
            Duration::from_millis(1),
            123_456,
        );
        let task = sender.spawn().unwrap();

        let mut buf = [0u8; 2048];
        for (expected_seq, expected_payload) in [(1u16, &b"a"[..]), (2, &b"bb"[..]), (3, &b"ccc"[..])] {
            let n = socket.recv(&mut buf).unwrap();
            let packet = rtp::decode(&buf[..n]).unwrap();
            assert_eq!(packet.sequence(), expected_seq);
            assert_eq!(packet.payload, expected_payload);
        }

        let sender = task.stop().unwrap();
        assert_eq!(sender.packets_sent(), 3);
        assert_eq!(sender.into_source().frame_number(), 3);
    }

    #[test]
    fn stop_returns_source_for_resume() {
        let (_socket, addr) = receiver();
        let frames = (0..1000).map(|i| vec![i as u8]).collect();
        let sender = MediaSender::new(
            Frames::boxed(frames),
            UdpTransport::bind("127.0.0.1:0").unwrap(),
            addr,
            Duration::from_secs(60),
            1,
        );
        let task = sender.spawn().unwrap();
        let sender = task.stop().unwrap();
        // Stopped before the first tick elapsed.
        assert_eq!(sender.packets_sent(), 0);
        assert_eq!(sender.into_source().frame_number(), 0);
    }

    #[test]
    fn oversize_frame_send_error_does_not_end_loop() {
        let (socket, addr) = receiver();
        let frames = vec![vec![0u8; rtp::MAX_UDP_PAYLOAD + 1], b"small".to_vec()];
        let sender = MediaSender::new(
            Frames::boxed(frames),
            UdpTransport::bind("127.0.0.1:0").unwrap(),
            addr,
            Duration::from_millis(1),
            2,
        );
        let task = sender.spawn().unwrap();

        let mut buf = [0u8; 2048];
        let n = socket.recv(&mut buf).unwrap();
        let packet = rtp::decode(&buf[..n]).unwrap();
        assert_eq!(packet.sequence(), 2);
        assert_eq!(packet.payload, b"small");

        let sender = task.stop().unwrap();
        assert_eq!(sender.packets_sent(), 1);
    }
}
