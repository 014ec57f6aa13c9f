use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, RtspError};
use crate::media::{FrameSource, FrameStore};

/// Width of the ASCII length prefix in front of every frame.
const LENGTH_PREFIX_LEN: usize = 5;

/// Reads length-prefixed JPEG frames from any byte source.
///
/// Each frame on disk is a 5-digit ASCII decimal length followed by that
/// many bytes of JPEG data:
///
/// ```text
/// 01234<1234 bytes of JPEG>00982<982 bytes of JPEG>...
/// ```
///
/// A truncated frame or a non-numeric prefix ends the stream.
pub struct VideoStream<R> {
    reader: R,
    frame_number: u32,
}

impl VideoStream<BufReader<File>> {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> VideoStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            frame_number: 0,
        }
    }

    fn read_frame(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        match self.reader.read_exact(&mut prefix) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }

        let length = match std::str::from_utf8(&prefix)
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
        {
            Some(len) => len,
            None => {
                tracing::warn!(prefix = ?prefix, "invalid frame length prefix");
                return Ok(None);
            }
        };

        let mut frame = vec![0u8; length];
        self.reader.read_exact(&mut frame)?;
        self.frame_number += 1;
        Ok(Some(frame))
    }
}

impl<R: Read + Send> FrameSource for VideoStream<R> {
    fn next_frame(&mut self) -> Option<Vec<u8>> {
        match self.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, frame = self.frame_number, "frame read failed");
                None
            }
        }
    }

    fn frame_number(&self) -> u32 {
        self.frame_number
    }
}

/// [`FrameStore`] backed by a directory of length-prefixed video files.
///
/// Resource names are resolved relative to the root. Absolute names and
/// names containing `..` are refused.
#[derive(Debug, Clone)]
pub struct MediaDirectory {
    root: PathBuf,
}

impl MediaDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        (plain && !name.is_empty()).then(|| self.root.join(relative))
    }
}

impl FrameStore for MediaDirectory {
    fn open(&self, name: &str) -> Result<Box<dyn FrameSource>> {
        let path = self
            .resolve(name)
            .ok_or_else(|| RtspError::ResourceNotFound(name.to_string()))?;

        match VideoStream::open(&path) {
            Ok(stream) => {
                tracing::debug!(path = %path.display(), "opened video file");
                Ok(Box::new(stream))
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot open video file");
                Err(RtspError::ResourceNotFound(name.to_string()))
            }
        }
    }
}
