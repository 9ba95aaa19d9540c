//! Concrete span exporters.
//!
//! The [`SpanExporter`] contract lives in [`crate::trace`]; this module
//! provides the bundled transports: an HTTP/JSON exporter for shipping spans
//! to a collector and a stdout exporter for local debugging. The in-memory
//! exporter for tests lives alongside the trace SDK in
//! [`crate::trace::InMemorySpanExporter`].
//!
//! [`SpanExporter`]: crate::trace::SpanExporter

mod http;
mod stdout;

pub use http::{HttpExporterBuilder, HttpSpanExporter, TlsMode};
pub use stdout::StdoutSpanExporter;
