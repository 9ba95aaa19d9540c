//! A minimal in-process tracing SDK.
//!
//! `microtel` provides the client-side span-tree and batch-pipeline
//! abstractions a tracer needs: spans with attributes, events, and status; an
//! explicit per-context active-span stack that turns call nesting into
//! parent/child links; a batch processor that buffers finished spans and
//! flushes them to a pluggable exporter on size or timer triggers; and a
//! provider facade with an explicit lifecycle.
//!
//! Tracing never crashes or blocks the instrumented code: export failures are
//! logged and the affected batch is dropped, and application errors recorded
//! on a span stay local to the caller's control flow.
//!
//! # Getting started
//!
//! ```
//! use microtel::trace::{InMemorySpanExporterBuilder, SpanStack, TracerProvider};
//! use microtel::{KeyValue, Resource};
//!
//! fn run(provider: &TracerProvider) {
//!     let tracer = provider.tracer("meetup");
//!     let mut cx = SpanStack::new();
//!
//!     tracer.in_span(&mut cx, "start-meetup", |cx, _span| {
//!         tracer.in_span(cx, "discuss-observability", |_cx, span| {
//!             span.add_event(
//!                 "demo",
//!                 vec![KeyValue::new("topic", "tracing"), KeyValue::new("feedback", "works")],
//!             );
//!         });
//!         tracer.in_span(cx, "load-config", |_cx, span| {
//!             let err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
//!             // Record and continue; the error does not abort the operation.
//!             span.record_error(&err);
//!             span.set_attribute(KeyValue::new("file.name", "config.yaml"));
//!         });
//!     });
//! }
//!
//! let exporter = InMemorySpanExporterBuilder::new().build();
//! let provider = TracerProvider::builder()
//!     .with_simple_exporter(exporter.clone())
//!     .with_resource(Resource::builder().with_service_name("demo").build())
//!     .build();
//!
//! run(&provider);
//! provider.shutdown().unwrap();
//! assert_eq!(exporter.get_finished_spans().unwrap().len(), 3);
//! ```
//!
//! For production use, replace the in-memory exporter with
//! [`exporter::HttpSpanExporter`] behind a
//! [`trace::BatchSpanProcessor`]:
//!
//! ```no_run
//! use microtel::exporter::{HttpSpanExporter, TlsMode};
//! use microtel::trace::TracerProvider;
//!
//! # fn main() -> Result<(), microtel::TraceError> {
//! let exporter = HttpSpanExporter::builder()
//!     .with_endpoint("http://localhost:4318/v1/traces")
//!     .with_tls_mode(TlsMode::Insecure)
//!     .build()?; // invalid configuration is fatal at startup
//! let provider = TracerProvider::builder()
//!     .with_batch_exporter(exporter)
//!     .build();
//! // ... create tracers, run the workload ...
//! provider.shutdown()?;
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs, unreachable_pub, missing_debug_implementations)]

mod common;
mod error;

pub mod exporter;
pub mod resource;
pub mod trace;

pub use common::{Key, KeyValue, Value};
pub use error::{TraceError, TraceResult};
pub use resource::Resource;
