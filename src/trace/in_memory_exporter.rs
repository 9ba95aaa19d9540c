use crate::error::{TraceError, TraceResult};
use crate::resource::Resource;
use crate::trace::{ExportResult, SpanData, SpanExporter};
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// An in-memory span exporter that stores span data in memory.
///
/// This exporter is useful for testing and debugging purposes. Finished spans
/// can be retrieved with [`InMemorySpanExporter::get_finished_spans`]; they
/// are retained across shutdown so tests can assert on the final flush.
///
/// # Example
///
/// ```
/// use microtel::trace::{InMemorySpanExporterBuilder, SpanStack, TracerProvider};
///
/// let exporter = InMemorySpanExporterBuilder::new().build();
/// let provider = TracerProvider::builder()
///     .with_simple_exporter(exporter.clone())
///     .build();
///
/// let tracer = provider.tracer("example/in_memory");
/// let mut cx = SpanStack::new();
/// tracer.in_span(&mut cx, "say hello", |_cx, span| {
///     span.add_event("handling this...", Vec::new());
/// });
///
/// provider.shutdown().unwrap();
/// for span in exporter.get_finished_spans().unwrap() {
///     println!("{span:?}");
/// }
/// ```
#[derive(Clone, Debug)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
    resource: Arc<Mutex<Resource>>,
    is_shutdown: Arc<AtomicBool>,
}

impl Default for InMemorySpanExporter {
    fn default() -> Self {
        InMemorySpanExporterBuilder::new().build()
    }
}

/// Builder for [`InMemorySpanExporter`].
#[derive(Clone, Debug, Default)]
pub struct InMemorySpanExporterBuilder {}

impl InMemorySpanExporterBuilder {
    /// Creates a new instance of the `InMemorySpanExporterBuilder`.
    pub fn new() -> Self {
        Self {}
    }

    /// Creates a new instance of the `InMemorySpanExporter`.
    pub fn build(&self) -> InMemorySpanExporter {
        InMemorySpanExporter {
            spans: Arc::new(Mutex::new(Vec::new())),
            resource: Arc::new(Mutex::new(Resource::empty())),
            is_shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl InMemorySpanExporter {
    /// Returns the finished spans as a vector of `SpanData`.
    ///
    /// # Errors
    ///
    /// Returns a `TraceError` if the internal lock cannot be acquired.
    pub fn get_finished_spans(&self) -> TraceResult<Vec<SpanData>> {
        self.spans
            .lock()
            .map(|spans_guard| spans_guard.iter().cloned().collect())
            .map_err(TraceError::from)
    }

    /// The resource most recently installed via [`SpanExporter::set_resource`].
    pub fn resource(&self) -> TraceResult<Resource> {
        self.resource
            .lock()
            .map(|guard| guard.clone())
            .map_err(TraceError::from)
    }

    /// Clears the internal storage of finished spans.
    pub fn reset(&self) {
        if let Ok(mut spans_guard) = self.spans.lock() {
            spans_guard.clear();
        }
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&mut self, mut batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Box::pin(futures_util::future::ready(Err(
                TraceError::AlreadyShutdown,
            )));
        }
        let spans = self.spans.clone();
        Box::pin(async move {
            spans
                .lock()
                .map(|mut spans_guard| spans_guard.append(&mut batch))
                .map_err(TraceError::from)
        })
    }

    fn shutdown(&mut self) {
        self.is_shutdown.store(true, Ordering::Relaxed);
    }

    fn set_resource(&mut self, resource: &Resource) {
        if let Ok(mut guard) = self.resource.lock() {
            *guard = resource.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{SpanContext, SpanId, Status, TraceId};
    use futures_executor::block_on;
    use std::time::SystemTime;

    fn span_data(name: &str) -> SpanData {
        SpanData {
            span_context: SpanContext::new(TraceId::from(1u128), SpanId::from(1u64)),
            parent_span_id: SpanId::INVALID,
            name: name.to_string().into(),
            start_time: SystemTime::now(),
            end_time: SystemTime::now(),
            attributes: Vec::new(),
            events: Vec::new(),
            status: Status::Unset,
        }
    }

    #[test]
    fn stores_and_resets_spans() {
        let mut exporter = InMemorySpanExporter::default();
        block_on(exporter.export(vec![span_data("a"), span_data("b")])).unwrap();
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 2);

        exporter.reset();
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn rejects_export_after_shutdown_but_keeps_spans() {
        let mut exporter = InMemorySpanExporter::default();
        block_on(exporter.export(vec![span_data("kept")])).unwrap();
        exporter.shutdown();

        assert!(block_on(exporter.export(vec![span_data("late")])).is_err());
        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "kept");
    }
}
