//! Event encoders.
//!
//! Sinks only ever see the narrow [`Encoder`] contract; message layout lives
//! entirely behind it.

use std::fmt;

use crate::event::Event;

/// Serializes one event to bytes.
pub trait Encoder: Send + Sync + fmt::Debug {
    fn encode(&self, event: &Event) -> Vec<u8>;
}

/// Plain text, one event per line: `<millis> <LEVEL> <message>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineEncoder;

impl Encoder for LineEncoder {
    fn encode(&self, event: &Event) -> Vec<u8> {
        format!("{} {:<5} {}\n", event.timestamp(), event.level(), event.message()).into_bytes()
    }
}

/// JSON lines, context included.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, event: &Event) -> Vec<u8> {
        match serde_json::to_vec(event) {
            Ok(mut bytes) => {
                bytes.push(b'\n');
                bytes
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode event as JSON, falling back to plain text");
                LineEncoder.encode(event)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;

    #[test]
    fn test_line_encoder() {
        let event = Event::new(Level::Warn, "disk almost full").at(42);
        let line = String::from_utf8(LineEncoder.encode(&event)).unwrap();
        assert_eq!(line, "42 WARN  disk almost full\n");
    }

    #[test]
    fn test_json_encoder_keeps_context() {
        let event = Event::new(Level::Info, "sync started")
            .at(7)
            .with_context("job_log_path", "/tmp/job-1");
        let bytes = JsonEncoder.encode(&event);
        assert_eq!(bytes.last(), Some(&b'\n'));

        let decoded: Event = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, event);
    }
}
