//! Span export interface.
use crate::error::TraceError;
use crate::resource::Resource;
use crate::trace::SpanData;
use futures_util::future::BoxFuture;
use std::fmt::Debug;

/// Describes the result of an export.
pub type ExportResult = Result<(), TraceError>;

/// `SpanExporter` defines the interface that protocol-specific exporters must
/// implement so they can be plugged into the SDK.
///
/// The exporter is expected to be primarily a simple telemetry data encoder
/// and transmitter; batching, buffering, and flush policy live in the span
/// processors.
pub trait SpanExporter: Send + Sync + Debug {
    /// Exports a batch of finished spans. Implementations typically serialize
    /// and transmit the data to their destination.
    ///
    /// This function is never called concurrently for the same exporter
    /// instance: the span processors serialize all export calls, preserving
    /// backend ingestion order.
    ///
    /// Any retry logic that is required by the exporter is the responsibility
    /// of the exporter; the processors drop a failed batch and move on.
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult>;

    /// Shuts down the exporter. Called once when the owning processor shuts
    /// down; subsequent `export` calls should fail.
    fn shutdown(&mut self) {}

    /// Set the resource describing the process whose spans this exporter
    /// transmits. Called by the provider at build time.
    fn set_resource(&mut self, _resource: &Resource) {}
}
