use std::io::Write;

use crate::crawl::LeafRecord;
use crate::error::Result;

/// Append-only consumer of the final leaf-record stream.
///
/// One record at a time, no batching; a write error is fatal to the whole
/// crawl. Records written before a failure stay where they are.
pub trait RecordSink: Send {
    fn write(&mut self, record: &LeafRecord) -> Result<()>;

    /// Flush buffered output; called once when the stream ends.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink serializing each record as one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn write(&mut self, record: &LeafRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
