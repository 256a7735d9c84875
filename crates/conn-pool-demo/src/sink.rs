//! Output sinks shared by connections.
//!
//! Several connections may write to the same sink at once, so every sink
//! carries its own lock. That lock is independent of the pool's.

use std::io::{self, Write};

use parking_lot::Mutex;

/// Destination for lines written by fake connections and the monitor.
pub trait MessageSink: Send + Sync {
    /// Write one complete line.
    fn write_line(&self, line: &str) -> io::Result<()>;
}

/// Sink over any writer, e.g. stdout.
pub struct WriterSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> MessageSink for WriterSink<W> {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = self.out.lock();
        writeln!(out, "{line}")?;
        out.flush()
    }
}

/// Sink that keeps lines in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every line written so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

#[cfg(test)]
impl MessageSink for MemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_sink_terminates_lines() {
        let sink = WriterSink::new(Vec::new());
        sink.write_line("one").unwrap();
        sink.write_line("two").unwrap();

        let bytes = sink.out.into_inner();
        assert_eq!(String::from_utf8(bytes).unwrap(), "one\ntwo\n");
    }
}
