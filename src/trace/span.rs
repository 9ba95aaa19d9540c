//! # Span
//!
//! `Span`s represent a single operation within a trace. `Span`s can be nested
//! to form a trace tree. Each trace contains a root span, which typically
//! describes the end-to-end latency, and one or more sub-spans for its
//! sub-operations.
//!
//! A `Span` is mutable only while it is open: attributes, events, and status
//! can be set until [`Span::end`] freezes it into an immutable [`SpanData`]
//! owned by the span processors.

use crate::common::KeyValue;
use crate::error::TraceResult;
use crate::trace::{SpanContext, SpanId, SpanStack, Tracer};
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// The status of a [`Span`].
///
/// These values form a total order: `Ok > Error > Unset`. [`Span::set_status`]
/// only ever upgrades, so a status explicitly set to `Ok` cannot be
/// overwritten by a later `Error`.
#[derive(Clone, Debug, Default, PartialEq, PartialOrd, Serialize)]
#[serde(tag = "code", rename_all = "UPPERCASE")]
pub enum Status {
    /// The default status.
    #[default]
    Unset,
    /// The operation contains an error.
    Error {
        /// The description of the error
        description: Cow<'static, str>,
    },
    /// The operation has been validated by an application developer or
    /// operator to have completed successfully.
    Ok,
}

impl Status {
    /// Create a new error status with the given description.
    pub fn error(description: impl Into<Cow<'static, str>>) -> Self {
        Status::Error {
            description: description.into(),
        }
    }
}

/// A timestamped annotation on an open [`Span`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    /// The name of this event.
    pub name: Cow<'static, str>,
    /// The wall clock time at which this event occurred.
    #[serde(serialize_with = "serialize_unix_nanos")]
    pub timestamp: SystemTime,
    /// Attributes describing this event.
    pub attributes: Vec<KeyValue>,
}

impl Event {
    /// Create a new event.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) -> Self {
        Event {
            name: name.into(),
            timestamp,
            attributes,
        }
    }
}

/// `SpanData` contains all the information collected by a finished `Span` and
/// is the input handed to span processors and exporters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpanData {
    /// Exportable `SpanContext`.
    pub span_context: SpanContext,
    /// Span parent id, [`SpanId::INVALID`] for root spans.
    pub parent_span_id: SpanId,
    /// Span name.
    pub name: Cow<'static, str>,
    /// Wall clock time at which the span was started.
    #[serde(serialize_with = "serialize_unix_nanos")]
    pub start_time: SystemTime,
    /// End time, derived from the monotonic clock so the recorded duration
    /// cannot go backwards.
    #[serde(serialize_with = "serialize_unix_nanos")]
    pub end_time: SystemTime,
    /// Span attributes, unique by key.
    pub attributes: Vec<KeyValue>,
    /// Ordered span events.
    pub events: Vec<Event>,
    /// Span status.
    pub status: Status,
}

fn serialize_unix_nanos<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let nanos = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    serializer.serialize_u64(nanos as u64)
}

/// Mutable state of an open span. Taken out on `end`, leaving the span in a
/// non-recording state where all mutation is a guarded no-op.
#[derive(Debug)]
pub(crate) struct SpanRecording {
    pub(crate) name: Cow<'static, str>,
    pub(crate) start_time: SystemTime,
    pub(crate) started_at: Instant,
    pub(crate) attributes: Vec<KeyValue>,
    pub(crate) events: Vec<Event>,
    pub(crate) status: Status,
}

/// Single operation within a trace.
#[derive(Debug)]
pub struct Span {
    span_context: SpanContext,
    parent_span_id: SpanId,
    data: Option<SpanRecording>,
    tracer: Tracer,
}

impl Span {
    pub(crate) fn new(
        span_context: SpanContext,
        parent_span_id: SpanId,
        data: Option<SpanRecording>,
        tracer: Tracer,
    ) -> Self {
        Span {
            span_context,
            parent_span_id,
            data,
            tracer,
        }
    }

    /// Returns the `SpanContext` for the given `Span`.
    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    /// The parent span id, [`SpanId::INVALID`] for root spans.
    pub fn parent_span_id(&self) -> SpanId {
        self.parent_span_id
    }

    /// Returns true if this `Span` is recording information like events and
    /// attributes. Always returns false after [`Span::end`].
    pub fn is_recording(&self) -> bool {
        self.data.is_some()
    }

    /// Operate on a mutable reference to span data, if the span is still open.
    fn with_data<T, F>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(&mut SpanRecording) -> T,
    {
        self.data.as_mut().map(f)
    }

    /// Sets a single attribute. Keys are unique; setting an existing key
    /// replaces its value.
    pub fn set_attribute(&mut self, attribute: KeyValue) {
        self.with_data(|data| {
            match data.attributes.iter_mut().find(|kv| kv.key == attribute.key) {
                Some(existing) => existing.value = attribute.value,
                None => data.attributes.push(attribute),
            }
        });
    }

    /// Sets multiple attributes, with the same last-write-wins semantics as
    /// [`Span::set_attribute`].
    pub fn set_attributes(&mut self, attributes: impl IntoIterator<Item = KeyValue>) {
        for attribute in attributes {
            self.set_attribute(attribute);
        }
    }

    /// Records an event in the context of this span.
    pub fn add_event(&mut self, name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) {
        self.add_event_with_timestamp(name, SystemTime::now(), attributes)
    }

    /// Records an event with an explicit timestamp.
    pub fn add_event_with_timestamp(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) {
        let event = Event::new(name, timestamp, attributes);
        self.with_data(|data| data.events.push(event));
    }

    /// Sets the status of this `Span`. Statuses form a total order
    /// `Ok > Error > Unset` and only upgrades are applied.
    pub fn set_status(&mut self, status: Status) {
        self.with_data(|data| {
            if status > data.status {
                data.status = status;
            }
        });
    }

    /// Records `err` on this span: sets the status to [`Status::Error`] with
    /// the error's message and appends an `exception` event carrying it.
    ///
    /// The error stays local to the caller's control flow; recording it never
    /// affects the tracing pipeline.
    pub fn record_error(&mut self, err: &dyn std::error::Error) {
        let message = err.to_string();
        self.add_event(
            "exception",
            vec![KeyValue::new("exception.message", message.clone())],
        );
        self.set_status(Status::error(message));
    }

    /// Ends this span: sets the end timestamp, freezes it, pops it from
    /// `cx`'s active-span stack, and hands the finished data to the owning
    /// provider's span processors.
    ///
    /// The span must be the current top of `cx`'s stack. Ending it out of
    /// order returns [`TraceError::UsageViolation`] and leaves both the stack
    /// and the span untouched, so it can be ended again once its children
    /// are. Ending an already-ended span is a no-op.
    ///
    /// [`TraceError::UsageViolation`]: crate::TraceError::UsageViolation
    pub fn end(&mut self, cx: &mut SpanStack) -> TraceResult<()> {
        if self.data.is_none() {
            // Already ended, or never recording (e.g. started after provider
            // shutdown); nothing was pushed that needs popping.
            return Ok(());
        }
        cx.pop(&self.span_context)?;

        let Some(data) = self.data.take() else {
            return Ok(());
        };
        let end_time = data.start_time + data.started_at.elapsed();
        self.tracer.provider().export_span(SpanData {
            span_context: self.span_context,
            parent_span_id: self.parent_span_id,
            name: data.name,
            start_time: data.start_time,
            end_time,
            attributes: data.attributes,
            events: data.events,
            status: data.status,
        });
        Ok(())
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if let Some(data) = &self.data {
            tracing::debug!(
                name: "Span.DroppedWithoutEnd",
                target: env!("CARGO_PKG_NAME"),
                span_name = %data.name,
                span_id = %self.span_context.span_id,
            );
        }
    }
}
