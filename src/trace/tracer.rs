//! # Tracer
//!
//! The `Tracer` is the entry point for creating spans. It combines the
//! provider's resource identity and span processors with a per-context
//! [`SpanStack`] that tracks which span is current, so each new span is
//! linked to its parent by call nesting.

use crate::trace::provider::TracerProvider;
use crate::trace::span::{Span, SpanRecording, Status};
use crate::trace::{SpanContext, SpanId, SpanStack};
use std::borrow::Cow;
use std::fmt;
use std::time::{Instant, SystemTime};

/// `Tracer` implementation to create and manage spans.
///
/// Tracers are cheap to clone; all clones share the provider's processors
/// and resource. Creating a tracer performs no I/O.
#[derive(Clone)]
pub struct Tracer {
    name: Cow<'static, str>,
    provider: TracerProvider,
}

impl fmt::Debug for Tracer {
    /// Omits `provider` to keep span debug output readable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer").field("name", &self.name).finish()
    }
}

impl Tracer {
    pub(crate) fn new(name: Cow<'static, str>, provider: TracerProvider) -> Self {
        Tracer { name, provider }
    }

    /// The instrumentation name this tracer was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn provider(&self) -> &TracerProvider {
        &self.provider
    }

    /// Starts a new span named `name` in the logical context tracked by `cx`.
    ///
    /// The new span's parent is `cx`'s current span; if no span is open in
    /// `cx`, it becomes a root span with a fresh trace id. The span is pushed
    /// onto `cx`'s active-span stack and must be ended in LIFO order via
    /// [`Span::end`] (or use [`Tracer::in_span`], which ends it for you).
    ///
    /// After the provider has shut down this returns a non-recording span:
    /// all operations on it are no-ops and nothing is exported.
    pub fn start(&self, cx: &mut SpanStack, name: impl Into<Cow<'static, str>>) -> Span {
        if self.provider.is_shutdown() {
            return Span::new(
                SpanContext::empty_context(),
                SpanId::INVALID,
                None,
                self.clone(),
            );
        }

        let parent = cx.current();
        let id_generator = self.provider.id_generator();
        let trace_id = match &parent {
            Some(parent) => parent.trace_id,
            None => id_generator.new_trace_id(),
        };
        let span_context = SpanContext::new(trace_id, id_generator.new_span_id());
        cx.push(span_context);

        Span::new(
            span_context,
            parent.map(|p| p.span_id).unwrap_or(SpanId::INVALID),
            Some(SpanRecording {
                name: name.into(),
                start_time: SystemTime::now(),
                started_at: Instant::now(),
                attributes: Vec::new(),
                events: Vec::new(),
                status: Status::default(),
            }),
            self.clone(),
        )
    }

    /// Starts a span, runs `f` with it, and ends the span on every exit path
    /// of the closure, including early returns.
    ///
    /// The closure receives the same `cx` so nested calls can start child
    /// spans against it.
    pub fn in_span<T, F>(&self, cx: &mut SpanStack, name: impl Into<Cow<'static, str>>, f: F) -> T
    where
        F: FnOnce(&mut SpanStack, &mut Span) -> T,
    {
        let mut span = self.start(cx, name);
        let value = f(cx, &mut span);
        if let Err(err) = span.end(cx) {
            // Children left open by the closure; the span stays open rather
            // than corrupting the stack.
            tracing::warn!(
                name: "Tracer.InSpan.EndError",
                target: env!("CARGO_PKG_NAME"),
                reason = %err,
            );
        }
        value
    }
}
