//! Scoped capture of snippet output.
//!
//! The script engine routes `print`/`debug` to an [`OutputSink`]. Output is only
//! retained while an [`OutputCapture`] handle is alive; dropping the handle (on
//! any exit path) uninstalls the buffer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

#[derive(Debug)]
struct CaptureBuffer {
    text: String,
    limit: usize,
    dropped: usize,
}

impl CaptureBuffer {
    fn push_line(&mut self, line: &str) {
        let needed = line.len() + 1;
        if self.dropped > 0 || self.text.len() + needed > self.limit {
            self.dropped += needed;
            return;
        }
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn into_text(mut self) -> String {
        if self.dropped > 0 {
            self.text
                .push_str(&format!("[truncated {} bytes]\n", self.dropped));
        }
        self.text
    }
}

/// Shared destination for engine output callbacks.
#[derive(Debug, Clone, Default)]
pub struct OutputSink {
    inner: Arc<Mutex<Option<CaptureBuffer>>>,
}

impl OutputSink {
    /// Start capturing; output is retained until the returned handle is finished or dropped.
    pub fn capture(&self, limit_bytes: usize) -> OutputCapture {
        *self.lock() = Some(CaptureBuffer {
            text: String::new(),
            limit: limit_bytes,
            dropped: 0,
        });
        OutputCapture { sink: self.clone() }
    }

    /// Append one line of output to the active capture.
    pub fn write_line(&self, line: &str) {
        match self.lock().as_mut() {
            Some(buffer) => buffer.push_line(line),
            None => debug!(line, "snippet output outside of a capture"),
        }
    }

    #[cfg(test)]
    fn contents(&self) -> String {
        self.lock()
            .as_ref()
            .map(|buffer| buffer.text.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<CaptureBuffer>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Live capture handle. Dropping it stops the capture.
#[derive(Debug)]
pub struct OutputCapture {
    sink: OutputSink,
}

impl OutputCapture {
    /// Stop capturing and return everything written, with a truncation notice if needed.
    pub fn finish(self) -> String {
        let buffer = self.sink.lock().take();
        buffer.map(CaptureBuffer::into_text).unwrap_or_default()
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        self.sink.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_lines_while_handle_is_alive() {
        let sink = OutputSink::default();
        sink.write_line("before");

        let capture = sink.capture(1024);
        sink.write_line("hello");
        sink.write_line("world");
        assert_eq!(sink.contents(), "hello\nworld\n");
        assert_eq!(capture.finish(), "hello\nworld\n");

        sink.write_line("after");
        assert_eq!(sink.contents(), "");
    }

    #[test]
    fn dropping_the_handle_releases_the_buffer() {
        let sink = OutputSink::default();
        {
            let _capture = sink.capture(1024);
            sink.write_line("lost");
        }
        assert_eq!(sink.contents(), "");
    }

    #[test]
    fn output_beyond_limit_is_truncated_with_notice() {
        let sink = OutputSink::default();
        let capture = sink.capture(8);
        sink.write_line("1234");
        sink.write_line("5678");
        sink.write_line("9");

        assert_eq!(capture.finish(), "1234\n[truncated 7 bytes]\n");
    }
}
