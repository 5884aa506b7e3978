use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};

const TRUNCATED_MARKER: &str = "\n[output truncated]";
const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Default)]
pub(crate) struct CapturedStream {
    bytes: Vec<u8>,
    truncated: bool,
}

impl CapturedStream {
    fn absorb(&mut self, chunk: &[u8], max_bytes: usize) {
        let room = max_bytes.saturating_sub(self.bytes.len());
        let kept = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..kept]);
        if kept < chunk.len() {
            self.truncated = true;
        }
    }

    pub(crate) fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    pub(crate) fn into_text(self) -> String {
        let mut out = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            out.push_str(TRUNCATED_MARKER);
        }
        out
    }
}

/// Output collected from one pipe. The buffer lives outside the reader task,
/// so whatever arrived before the reader was abandoned can still be taken.
#[derive(Debug, Clone, Default)]
pub(crate) struct OutputBuffer {
    inner: Arc<Mutex<CapturedStream>>,
}

impl OutputBuffer {
    fn absorb(&self, chunk: &[u8], max_bytes: usize) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .absorb(chunk, max_bytes);
    }

    pub(crate) fn take(&self) -> CapturedStream {
        std::mem::take(&mut *self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Copies `reader` into `buffer` until EOF. Bytes past `max_bytes` are read
/// and dropped so the writer never blocks on a full pipe.
pub(crate) async fn drain_into<R: AsyncRead + Unpin>(
    mut reader: R,
    buffer: OutputBuffer,
    max_bytes: usize,
) -> io::Result<()> {
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await? {
            0 => return Ok(()),
            n => buffer.absorb(&chunk[..n], max_bytes),
        }
    }
}
