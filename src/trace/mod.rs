//! # Trace SDK
//!
//! The tracing SDK consists of a few main structs:
//!
//! * The [`Tracer`] struct which performs all tracing operations.
//! * The [`Span`] struct which is a mutable object storing information about
//!   the current operation execution.
//! * The [`SpanStack`] which tracks the currently open spans of one logical
//!   execution context, giving new spans their parent.
//! * The [`TracerProvider`] struct which configures and produces [`Tracer`]s
//!   and owns the span processors.
mod context;
mod export;
mod id_generator;
mod in_memory_exporter;
mod provider;
mod span;
mod span_processor;
mod trace_context;
mod tracer;

pub use context::SpanStack;
pub use export::{ExportResult, SpanExporter};
pub use id_generator::{IdGenerator, IncrementIdGenerator, RandomIdGenerator};
pub use in_memory_exporter::{InMemorySpanExporter, InMemorySpanExporterBuilder};
pub use provider::{Builder, TracerProvider};
pub use span::{Event, Span, SpanData, Status};
pub use span_processor::{
    BatchConfig, BatchConfigBuilder, BatchSpanProcessor, BatchSpanProcessorBuilder,
    SimpleSpanProcessor, SpanProcessor,
};
pub use trace_context::{SpanContext, SpanId, TraceId};
pub use tracer::Tracer;
