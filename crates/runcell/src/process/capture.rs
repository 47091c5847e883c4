//! Bounded output capture

use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

const CHUNK_SIZE: usize = 8192;

/// Accumulated bytes of one stream, capped at a byte limit
#[derive(Debug)]
pub struct Capture {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl Capture {
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    /// Append a chunk, discarding whatever exceeds the limit
    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Lossy UTF-8 view of the captured bytes
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Shared handle to a [`Capture`], written by a drain task
///
/// The supervisor snapshots it either after the stream closes or at the
/// deadline, while the drain task may still be running.
#[derive(Debug, Clone)]
pub struct OutputBuffer(Arc<Mutex<Capture>>);

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self(Arc::new(Mutex::new(Capture::new(limit))))
    }

    pub fn push(&self, chunk: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(chunk);
    }

    /// Current text and truncation flag
    pub fn snapshot(&self) -> (String, bool) {
        let capture = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        (capture.text(), capture.is_truncated())
    }
}

/// Read `reader` to end-of-stream into `buffer`
///
/// Keeps reading past the capture limit so the child never blocks on a
/// full pipe.
pub async fn drain<R>(mut reader: R, buffer: OutputBuffer)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buffer.push(&chunk[..n]),
            Err(e) => {
                debug!(error = %e, "output stream read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_below_limit() {
        let mut capture = Capture::new(1024);
        capture.push(b"hello ");
        capture.push(b"world");
        assert_eq!(capture.text(), "hello world");
        assert!(!capture.is_truncated());
    }

    #[test]
    fn capture_truncates_at_limit() {
        let mut capture = Capture::new(8);
        capture.push(b"12345");
        assert!(!capture.is_truncated());
        capture.push(b"67890");
        assert_eq!(capture.text(), "12345678");
        assert!(capture.is_truncated());

        capture.push(b"more");
        assert_eq!(capture.len(), 8);
    }

    #[test]
    fn capture_exact_limit_is_not_truncated() {
        let mut capture = Capture::new(4);
        capture.push(b"abcd");
        assert!(!capture.is_truncated());
        capture.push(b"");
        assert!(!capture.is_truncated());
    }

    #[test]
    fn capture_lossy_utf8() {
        let mut capture = Capture::new(16);
        capture.push(&[0x68, 0x69, 0xff]);
        assert_eq!(capture.text(), "hi\u{fffd}");
    }

    #[tokio::test]
    async fn drain_reads_to_end() {
        let buffer = OutputBuffer::new(5);
        drain(&b"abcdefgh"[..], buffer.clone()).await;
        let (text, truncated) = buffer.snapshot();
        assert_eq!(text, "abcde");
        assert!(truncated);
    }
}
