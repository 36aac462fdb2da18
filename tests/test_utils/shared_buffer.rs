//! Shared buffer used to capture stream backend output.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Thread-safe wrapper around a byte buffer handed to stream backends.
///
/// The inner buffer is private so tests can't bypass the `Write`
/// implementation or mutate it without locking.
#[derive(Clone, Default)]
pub struct SharedBuf {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuf {
    /// Return the buffer contents as UTF-8 text.
    #[allow(dead_code)]
    pub fn text(&self) -> String {
        String::from_utf8(
            self.buffer
                .lock()
                .expect("SharedBuf mutex poisoned")
                .clone(),
        )
        .expect("buffer contains invalid UTF-8")
    }

    /// Return the captured output split into lines.
    #[allow(dead_code)]
    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_owned).collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .expect("SharedBuf mutex poisoned")
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.buffer
            .lock()
            .expect("SharedBuf mutex poisoned")
            .flush()
    }
}
