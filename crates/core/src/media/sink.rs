use std::path::PathBuf;
use std::sync::mpsc;

use crate::media::{Frame, FrameSink};

/// Prefix and extension of the file the client overwrites with each frame.
pub const CACHE_FILE_PREFIX: &str = "cache-";
pub const CACHE_FILE_EXT: &str = ".jpg";

/// Writes the latest frame to `cache-<session>.jpg` for an external viewer.
#[derive(Debug, Clone)]
pub struct CacheFileSink {
    path: PathBuf,
}

impl CacheFileSink {
    pub fn new(dir: impl Into<PathBuf>, session_id: u32) -> Self {
        let path = dir
            .into()
            .join(format!("{CACHE_FILE_PREFIX}{session_id}{CACHE_FILE_EXT}"));
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Remove the cache file, ignoring a file that was never written.
    pub fn remove(&self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove cache file");
        }
    }
}

impl FrameSink for CacheFileSink {
    fn deliver(&mut self, frame: Frame) {
        if let Err(e) = std::fs::write(&self.path, &frame.payload) {
            tracing::warn!(
                path = %self.path.display(),
                sequence = frame.sequence,
                error = %e,
                "failed to write cache frame"
            );
        }
    }
}

impl FrameSink for mpsc::Sender<Frame> {
    fn deliver(&mut self, frame: Frame) {
        // Receiver side gone means nobody is watching; drop the frame.
        let _ = self.send(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_file_holds_latest_frame() {
        let dir = std::env::temp_dir();
        let mut sink = CacheFileSink::new(&dir, 912_345);
        assert!(sink.path().ends_with("cache-912345.jpg"));

        sink.deliver(Frame {
            sequence: 1,
            payload: b"one".to_vec(),
        });
        sink.deliver(Frame {
            sequence: 2,
            payload: b"two".to_vec(),
        });
        assert_eq!(std::fs::read(sink.path()).unwrap(), b"two");

        sink.remove();
        assert!(!sink.path().exists());
        sink.remove();
    }

    #[test]
    fn channel_sink_forwards() {
        let (mut tx, rx) = mpsc::channel();
        tx.deliver(Frame {
            sequence: 9,
            payload: vec![1, 2],
        });
        assert_eq!(rx.recv().unwrap().sequence, 9);
    }
}
