//! # Trace Sinks
//!
//! A [`TraceSink`] receives the exact bytes of every request envelope the proxy sends and every
//! response envelope it receives. Sinks are called synchronously around the transport call and
//! cannot influence the call: they return nothing and their failures are only logged.
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Direction of a traced envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    fn arrow(self) -> &'static str {
        match self {
            Direction::Outgoing => ">>>",
            Direction::Incoming => "<<<",
        }
    }
}

pub trait TraceSink: Send + Sync {
    /// Called with the request envelope, right before it is handed to the transport.
    fn outgoing(&self, operation: &str, envelope: &[u8]);

    /// Called with the raw response bytes, before they are parsed.
    fn incoming(&self, operation: &str, envelope: &[u8]);
}

/// Writes every envelope, unmodified, to an [`std::io::Write`] implementation.
///
/// Each envelope is preceded by a `>>> Operation` or `<<< Operation` line.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, direction: Direction, operation: &str, envelope: &[u8]) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let result = writeln!(writer, "{} {operation}", direction.arrow())
            .and_then(|_| writer.write_all(envelope))
            .and_then(|_| writeln!(writer))
            .and_then(|_| writer.flush());

        if let Err(err) = result {
            tracing::warn!(operation, error = %err, "Failed to write envelope trace");
        }
    }
}

impl<W: Write + Send> TraceSink for WriterSink<W> {
    fn outgoing(&self, operation: &str, envelope: &[u8]) {
        self.write(Direction::Outgoing, operation, envelope);
    }

    fn incoming(&self, operation: &str, envelope: &[u8]) {
        self.write(Direction::Incoming, operation, envelope);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub direction: Direction,
    pub operation: String,
    pub envelope: Vec<u8>,
}

/// Keeps every traced envelope in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct TraceBuffer {
    entries: Arc<Mutex<Vec<TraceEntry>>>,
}

impl TraceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the entries recorded so far, oldest first.
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, direction: Direction, operation: &str, envelope: &[u8]) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TraceEntry {
                direction,
                operation: operation.to_string(),
                envelope: envelope.to_vec(),
            });
    }
}

impl TraceSink for TraceBuffer {
    fn outgoing(&self, operation: &str, envelope: &[u8]) {
        self.push(Direction::Outgoing, operation, envelope);
    }

    fn incoming(&self, operation: &str, envelope: &[u8]) {
        self.push(Direction::Incoming, operation, envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_sink_writes_bytes_unmodified() {
        let sink = WriterSink::new(Vec::new());
        sink.outgoing("echo", b"<a>&amp;</a>");
        sink.incoming("echo", b"<b/>");

        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(written, ">>> echo\n<a>&amp;</a>\n<<< echo\n<b/>\n");
    }

    #[test]
    fn buffer_clones_share_entries() {
        let buffer = TraceBuffer::new();
        let handle = buffer.clone();

        buffer.outgoing("GetUser", b"request");
        buffer.incoming("GetUser", b"response");

        let entries = handle.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].direction, Direction::Outgoing);
        assert_eq!(entries[1].envelope, b"response");
    }
}
