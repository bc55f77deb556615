//! Routing key extraction.

use crate::event::Event;

/// Reads the routing key from one designated context entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminator {
    key_name: String,
}

impl Discriminator {
    pub fn new(key_name: impl Into<String>) -> Self {
        Self {
            key_name: key_name.into(),
        }
    }

    /// Context entry this discriminator reads.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// The routing key, or an empty string when the entry is absent.
    pub fn extract<'a>(&self, event: &'a Event) -> &'a str {
        event.context_value(&self.key_name).unwrap_or("")
    }
}
