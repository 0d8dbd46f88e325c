use crate::error::Result;
use crate::record::LogRecord;
use crate::sink::LogSink;

/// Sink that accepts every level and discards every record.
///
/// The load demos put it behind an engine to time the engine alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn send(&self, _record: &LogRecord) -> Result<()> {
        Ok(())
    }
}
