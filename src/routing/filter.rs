//! Pre-routing filter.
//!
//! Events without a routing key are routine (background and system lines
//! carry no workspace context). They are suppressed here, silently, before
//! any router state is touched.

use crate::event::Event;
use crate::routing::discriminator::Discriminator;

/// Passes only events whose routing key is present and not blank.
#[derive(Debug, Clone)]
pub struct KeyPresenceFilter {
    discriminator: Discriminator,
}

impl KeyPresenceFilter {
    pub fn new(discriminator: Discriminator) -> Self {
        Self { discriminator }
    }

    pub fn should_process(&self, event: &Event) -> bool {
        !self.discriminator.extract(event).trim().is_empty()
    }
}
