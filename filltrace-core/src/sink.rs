use crate::{error::Result, types::DecodedEvent};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Append-only collection of decoded events.
///
/// Events stay in discovery order (newest transaction first, as the history
/// is walked backward) unless the caller reorders them explicitly.
#[derive(Debug, Default, Clone)]
pub struct ResultSink {
    events: Vec<DecodedEvent>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: DecodedEvent) {
        self.events.push(event);
    }

    pub fn all(&self) -> &[DecodedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<DecodedEvent> {
        self.events
    }

    /// Sort oldest first. Events of the same transaction keep their log order.
    pub fn reorder_chronological(&mut self) {
        self.events
            .sort_by_key(|event| (event.timestamp, event.slot, event.log_index));
    }

    /// All events as one JSON array
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.events)?)
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.events)?;
        Ok(())
    }

    /// Write the JSON array to `path`, flushing before returning.
    pub fn write_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_json(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventDetail, OrderAction, OrderDetail, TimestampSource};

    fn event(signature: &str, timestamp: i64, slot: u64, log_index: usize) -> DecodedEvent {
        DecodedEvent {
            id: format!("{}-{}", signature, log_index),
            instrument: "SOL-PERP".to_string(),
            signature: signature.to_string(),
            slot,
            log_index,
            timestamp,
            timestamp_source: TimestampSource::BlockTime,
            detail: EventDetail::OrderManagement(OrderDetail {
                action: OrderAction::Placed,
                order_id: u64::MAX,
            }),
            raw: vec![0x10, 0x00],
        }
    }

    #[test]
    fn test_append_preserves_discovery_order() {
        let mut sink = ResultSink::new();
        sink.append(event("c", 300, 3, 0));
        sink.append(event("b", 200, 2, 0));
        sink.append(event("a", 100, 1, 0));

        let signatures: Vec<_> = sink.all().iter().map(|e| e.signature.as_str()).collect();
        assert_eq!(signatures, vec!["c", "b", "a"]);
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn test_reorder_chronological() {
        let mut sink = ResultSink::new();
        sink.append(event("b", 200, 2, 0));
        sink.append(event("b", 200, 2, 1));
        sink.append(event("a", 100, 1, 0));
        sink.reorder_chronological();

        let ids: Vec<_> = sink.all().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a-0", "b-0", "b-1"]);
    }

    #[test]
    fn test_json_array_uses_decimal_strings() {
        let mut sink = ResultSink::new();
        sink.append(event("a", 100, 1, 0));

        let json: serde_json::Value = serde_json::from_str(&sink.to_json_string().unwrap()).unwrap();
        let first = &json[0];
        assert_eq!(first["type"], "OrderManagement");
        assert_eq!(first["order_id"], "18446744073709551615");
        assert_eq!(first["timestamp"], 100);
        assert_eq!(first["signature"], "a");

        let mut buf = Vec::new();
        sink.write_json(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), sink.to_json_string().unwrap());
    }

    #[test]
    fn test_write_json_file() {
        let mut sink = ResultSink::new();
        sink.append(event("a", 100, 1, 0));
        sink.append(event("b", 200, 2, 0));

        let path = std::env::temp_dir().join(format!("filltrace-sink-{}.json", std::process::id()));
        sink.write_json_file(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(written, sink.to_json_string().unwrap());
    }

    #[test]
    fn test_write_json_file_reports_io_errors() {
        let sink = ResultSink::new();
        let path = std::env::temp_dir()
            .join("filltrace-missing-dir")
            .join("events.json");
        assert!(matches!(
            sink.write_json_file(&path),
            Err(crate::error::FilltraceError::Io(_))
        ));
    }

    #[test]
    fn test_empty_sink_serializes_to_empty_array() {
        let sink = ResultSink::new();
        assert!(sink.is_empty());
        assert_eq!(sink.to_json_string().unwrap(), "[]");
    }
}
