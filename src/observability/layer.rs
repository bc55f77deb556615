//! Bridge from `tracing` into the router.
//!
//! # Data Flow
//! ```text
//! span created / recorded → ContextFields (span extension)
//! event emitted
//!     → skip own targets, skip below root level
//!     → context = span fields root → leaf, then event fields
//!     → Dispatcher::dispatch(Event)
//! ```
//!
//! Application code attaches routing keys by opening a span:
//! `info_span!("sync", workspace_app_root = %dir)`.
//!
//! The layer can be installed before the router exists
//! ([`RoutingLayer::unbound`]) and bound later; events seen before
//! [`RoutingLayer::bind`] are not routed.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::event::{ContextMap, Event, Level};
use crate::routing::Dispatcher;

/// Events from these targets never reach the router.
const OWN_TARGET: &str = "logsift";

/// Context recorded on one span.
#[derive(Debug, Default)]
struct ContextFields(ContextMap);

struct FieldVisitor<'a> {
    context: &'a mut ContextMap,
    message: Option<String>,
}

impl<'a> FieldVisitor<'a> {
    fn new(context: &'a mut ContextMap) -> Self {
        Self { context, message: None }
    }

    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.context.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

/// `tracing_subscriber` layer that turns events into routed [`Event`]s.
///
/// Clones share the same binding.
#[derive(Debug, Clone, Default)]
pub struct RoutingLayer {
    dispatcher: Arc<OnceLock<Arc<Dispatcher>>>,
}

impl RoutingLayer {
    /// Layer already routing into `dispatcher`.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let layer = Self::unbound();
        layer.bind(dispatcher);
        layer
    }

    /// Layer that drops events until [`bind`](Self::bind) is called.
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Start routing into `dispatcher`. Only the first binding takes effect;
    /// returns false if the layer was already bound.
    pub fn bind(&self, dispatcher: Arc<Dispatcher>) -> bool {
        self.dispatcher.set(dispatcher).is_ok()
    }

    pub fn is_bound(&self) -> bool {
        self.dispatcher.get().is_some()
    }
}

impl<S> Layer<S> for RoutingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = ContextMap::new();
        attrs.record(&mut FieldVisitor::new(&mut fields));
        span.extensions_mut().insert(ContextFields(fields));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<ContextFields>() {
            values.record(&mut FieldVisitor::new(&mut fields.0));
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(OWN_TARGET) {
            return;
        }
        let Some(dispatcher) = self.dispatcher.get() else {
            return;
        };
        let level = Level::from(metadata.level());
        if level < dispatcher.min_level() || !dispatcher.is_accepting() {
            return;
        }

        let mut context = ContextMap::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<ContextFields>() {
                    context.extend(fields.0.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }
        let mut visitor = FieldVisitor::new(&mut context);
        event.record(&mut visitor);
        let message = visitor.message.take().unwrap_or_default();

        let routed = Event::new(level, message).with_context_map(context);
        // Failures are already reported by the router; logging them here
        // would re-enter this layer.
        let _ = dispatcher.dispatch(&routed);
    }
}
