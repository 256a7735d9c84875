//! Fake connection used by the demo.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use conn_pool::ResourceId;

use crate::sink::MessageSink;

/// Stand-in for a connection to a database or network service.
///
/// Writing takes `latency` and then prints a line to the shared sink.
pub struct FakeConnection {
    id: ResourceId,
    sink: Arc<dyn MessageSink>,
    latency: Duration,
}

impl FakeConnection {
    /// Open a connection numbered `id` that reports to `sink`.
    pub fn new(id: ResourceId, sink: Arc<dyn MessageSink>, latency: Duration) -> Self {
        Self { id, sink, latency }
    }

    /// Pool-assigned number.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Pretend to send `message` over the connection.
    pub fn write_something(&self, message: &str) -> io::Result<()> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        self.sink.write_line(&format!(
            "Connection #{} write something: {message}",
            self.id
        ))
    }
}

impl fmt::Debug for FakeConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeConnection")
            .field("id", &self.id)
            .field("latency", &self.latency)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn test_write_goes_to_sink() {
        let sink = Arc::new(MemorySink::new());
        let conn = FakeConnection::new(ResourceId::new(4), sink.clone(), Duration::ZERO);

        conn.write_something("hello").unwrap();
        assert_eq!(sink.lines(), vec!["Connection #4 write something: hello"]);
    }
}
