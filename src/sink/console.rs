//! Console output for platform events.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::encoder::Encoder;
use crate::event::Event;
use crate::sink::{Sink, SinkError};

/// Writes every event to a shared output stream (stdout by default).
pub struct ConsoleSink {
    name: String,
    encoder: Arc<dyn Encoder>,
    out: Mutex<Box<dyn Write + Send>>,
    stopped: AtomicBool,
}

impl ConsoleSink {
    /// Console sink on the process stdout.
    pub fn stdout(name: impl Into<String>, encoder: Arc<dyn Encoder>) -> Self {
        Self::with_writer(name, encoder, Box::new(io::stdout()))
    }

    /// Console sink on an arbitrary writer.
    pub fn with_writer(
        name: impl Into<String>,
        encoder: Arc<dyn Encoder>,
        out: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            name: name.into(),
            encoder,
            out: Mutex::new(out),
            stopped: AtomicBool::new(false),
        }
    }
}

impl std::fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSink")
            .field("name", &self.name)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, event: &Event) -> Result<(), SinkError> {
        if self.is_stopped() {
            return Err(SinkError::Stopped(self.name.clone()));
        }
        let bytes = self.encoder.encode(event);
        self.out
            .lock()
            .write_all(&bytes)
            .map_err(|e| SinkError::io("<console>", e))
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.out
            .lock()
            .flush()
            .map_err(|e| SinkError::io("<console>", e))
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::warn!(sink = %self.name, error = %e, "Console flush failed on stop");
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
