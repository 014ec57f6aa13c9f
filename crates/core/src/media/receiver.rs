use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::RtspError;
use crate::media::signal::{MediaTask, StopSignal};
use crate::media::{Frame, FrameSink, rtp};

/// Default UDP read timeout; bounds how long a stop request can go unnoticed.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// Large enough for any single UDP datagram.
const RECV_BUFFER_LEN: usize = 65_536;

/// Staleness gate: accepts a sequence number only if it is above every
/// number accepted before.
///
/// There is no reordering buffer and no wraparound handling; once the
/// 16-bit counter wraps, later frames compare as stale.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HighWaterMark(u16);

impl HighWaterMark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u16 {
        self.0
    }

    /// Accept `sequence` and raise the mark, or reject it as stale.
    pub fn admit(&mut self, sequence: u16) -> bool {
        if sequence > self.0 {
            self.0 = sequence;
            true
        } else {
            false
        }
    }
}

/// Client-side media loop: UDP datagrams in, in-order frames out to a sink.
///
/// The sink and high-water mark persist across PAUSE/PLAY because the task
/// hands the receiver back when it is stopped.
pub struct MediaReceiver {
    socket: Arc<UdpSocket>,
    sink: Box<dyn FrameSink>,
    high_water: HighWaterMark,
    teardown_acked: Arc<AtomicBool>,
    delivered: u64,
    discarded: u64,
}

impl MediaReceiver {
    /// `socket` must already be bound to the negotiated client port.
    pub fn new(
        socket: Arc<UdpSocket>,
        sink: Box<dyn FrameSink>,
        recv_timeout: Duration,
        teardown_acked: Arc<AtomicBool>,
    ) -> std::io::Result<Self> {
        socket.set_read_timeout(Some(recv_timeout))?;
        Ok(Self {
            socket,
            sink,
            high_water: HighWaterMark::new(),
            teardown_acked,
            delivered: 0,
            discarded: 0,
        })
    }

    pub fn spawn(self) -> std::io::Result<MediaTask<Self>> {
        MediaTask::spawn("rtp-recv", move |signal| self.run(&signal))
    }

    pub fn high_water(&self) -> u16 {
        self.high_water.get()
    }

    pub fn frames_delivered(&self) -> u64 {
        self.delivered
    }

    pub fn frames_discarded(&self) -> u64 {
        self.discarded
    }

    /// Release the socket and hand back the sink.
    pub fn into_sink(self) -> Box<dyn FrameSink> {
        self.sink
    }

    fn should_exit(&self, signal: &StopSignal) -> bool {
        signal.is_stopped() || self.teardown_acked.load(Ordering::SeqCst)
    }

    fn run(mut self, signal: &Arc<StopSignal>) -> Self {
        tracing::debug!(high_water = self.high_water.get(), "media receiver started");
        let mut buf = vec![0u8; RECV_BUFFER_LEN];

        while !self.should_exit(signal) {
            match self.socket.recv(&mut buf) {
                Ok(n) => self.handle_datagram(&buf[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => {
                    if self.should_exit(signal) {
                        break;
                    }
                    tracing::warn!(error = %e, "RTP receive failed");
                    // Avoid spinning on a persistent socket error.
                    signal.wait(Duration::from_millis(50));
                }
            }
        }

        tracing::debug!(
            delivered = self.delivered,
            discarded = self.discarded,
            high_water = self.high_water.get(),
            "media receiver exited"
        );
        self
    }

    fn handle_datagram(&mut self, datagram: &[u8]) {
        let packet = match rtp::decode(datagram) {
            Ok(packet) => packet,
            Err(e @ RtspError::MalformedPacket { .. }) => {
                tracing::debug!(error = %e, "dropping datagram");
                self.discarded += 1;
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "unexpected decode error");
                return;
            }
        };

        let sequence = packet.sequence();
        if self.high_water.admit(sequence) {
            self.delivered += 1;
            self.sink.deliver(Frame {
                sequence,
                payload: packet.payload,
            });
        } else {
            tracing::trace!(sequence, high_water = self.high_water.get(), "stale frame discarded");
            self.discarded += 1;
        }
    }
}
