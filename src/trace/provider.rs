//! # Trace Provider
//!
//! The `TracerProvider` handles the creation of [`Tracer`] instances and
//! coordinates span processing. All tracers it creates share its [`Resource`],
//! id generator, and registered span processors.
//!
//! Providers have an explicit lifecycle: they are constructed through
//! [`TracerProvider::builder`] and stopped with [`TracerProvider::shutdown`],
//! which delegates to each processor (final flush, exporter close). Dropping
//! the last handle to a provider that was never shut down triggers the same
//! shutdown path. There is no hidden global instance; callers hold and pass
//! the handle they built.

use crate::error::{TraceError, TraceResult};
use crate::resource::Resource;
use crate::trace::{
    BatchSpanProcessor, IdGenerator, RandomIdGenerator, SimpleSpanProcessor, SpanData,
    SpanExporter, SpanProcessor, Tracer,
};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct Config {
    pub(crate) id_generator: Box<dyn IdGenerator>,
    pub(crate) resource: Resource,
}

#[derive(Debug)]
pub(crate) struct TracerProviderInner {
    processors: Vec<Box<dyn SpanProcessor>>,
    config: Config,
    is_shutdown: AtomicBool,
}

impl TracerProviderInner {
    /// Shut down all processors, collecting every result. Called from both
    /// explicit shutdown and from `Drop` of the last provider handle.
    fn shutdown_processors(&self) -> Vec<TraceResult<()>> {
        let mut results = Vec::with_capacity(self.processors.len());
        for processor in &self.processors {
            let result = processor.shutdown();
            if let Err(err) = &result {
                tracing::debug!(
                    name: "TracerProvider.Shutdown.ProcessorError",
                    target: env!("CARGO_PKG_NAME"),
                    reason = %err,
                );
            }
            results.push(result);
        }
        results
    }
}

impl Drop for TracerProviderInner {
    fn drop(&mut self) {
        if !self.is_shutdown.load(Ordering::Relaxed) {
            let _ = self.shutdown_processors();
        }
    }
}

/// Creator and registry of named [`Tracer`] instances.
///
/// Cloning a `TracerProvider` creates a new handle to the same provider, not
/// a new instance. Once shut down, tracers created from it produce
/// non-recording spans.
#[derive(Clone, Debug)]
pub struct TracerProvider {
    inner: Arc<TracerProviderInner>,
}

impl Default for TracerProvider {
    fn default() -> Self {
        TracerProvider::builder().build()
    }
}

impl TracerProvider {
    /// Create a new builder.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Create a new [`Tracer`] with the given instrumentation name.
    ///
    /// This is a pure constructor; no I/O happens until spans are exported.
    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> Tracer {
        Tracer::new(name.into(), self.clone())
    }

    /// The resource describing the process this provider produces spans for.
    pub fn resource(&self) -> &Resource {
        &self.inner.config.resource
    }

    pub(crate) fn id_generator(&self) -> &dyn IdGenerator {
        self.inner.config.id_generator.as_ref()
    }

    /// Whether [`TracerProvider::shutdown`] has been called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown.load(Ordering::Relaxed)
    }

    /// Hand a finished span to every registered processor.
    pub(crate) fn export_span(&self, span: SpanData) {
        if let Some((last, rest)) = self.inner.processors.split_last() {
            for processor in rest {
                processor.on_end(span.clone());
            }
            last.on_end(span);
        }
    }

    /// Immediately flush all pending spans on every processor, blocking until
    /// they have been handed to the exporters.
    pub fn force_flush(&self) -> Vec<TraceResult<()>> {
        self.inner
            .processors
            .iter()
            .map(|processor| processor.force_flush())
            .collect()
    }

    /// Shut down this provider: every processor performs one final flush and
    /// closes its exporter. Blocks with a bounded timeout per processor and
    /// returns the first error encountered, if any.
    ///
    /// Only the first call performs work; later calls return
    /// [`TraceError::AlreadyShutdown`].
    pub fn shutdown(&self) -> TraceResult<()> {
        if self.inner.is_shutdown.swap(true, Ordering::SeqCst) {
            return Err(TraceError::AlreadyShutdown);
        }
        tracing::debug!(
            name: "TracerProvider.Shutdown",
            target: env!("CARGO_PKG_NAME"),
            processors = self.inner.processors.len(),
        );
        self.inner
            .shutdown_processors()
            .into_iter()
            .find(Result::is_err)
            .unwrap_or(Ok(()))
    }
}

/// Builder for [`TracerProvider`].
#[derive(Debug, Default)]
pub struct Builder {
    processors: Vec<Box<dyn SpanProcessor>>,
    id_generator: Option<Box<dyn IdGenerator>>,
    resource: Option<Resource>,
}

impl Builder {
    /// Register a [`SimpleSpanProcessor`] exporting each span to `exporter`
    /// as it finishes. Intended for debugging and tests.
    pub fn with_simple_exporter<E: SpanExporter + 'static>(self, exporter: E) -> Self {
        self.with_span_processor(SimpleSpanProcessor::new(Box::new(exporter)))
    }

    /// Register a [`BatchSpanProcessor`] with default batch configuration
    /// exporting to `exporter`. For custom batching, build the processor
    /// yourself and use [`Builder::with_span_processor`].
    pub fn with_batch_exporter<E: SpanExporter + 'static>(self, exporter: E) -> Self {
        self.with_span_processor(BatchSpanProcessor::builder(exporter).build())
    }

    /// Register a custom span processor.
    pub fn with_span_processor<P: SpanProcessor + 'static>(mut self, processor: P) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Set the id generator used for new trace and span ids.
    pub fn with_id_generator<G: IdGenerator + 'static>(mut self, id_generator: G) -> Self {
        self.id_generator = Some(Box::new(id_generator));
        self
    }

    /// Set the [`Resource`] attached to all spans of this provider.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Build the provider, wiring the resource into every processor.
    pub fn build(self) -> TracerProvider {
        let resource = self.resource.unwrap_or_default();
        let mut processors = self.processors;
        for processor in &mut processors {
            processor.set_resource(&resource);
        }
        tracing::debug!(
            name: "TracerProvider.Built",
            target: env!("CARGO_PKG_NAME"),
            processors = processors.len(),
        );
        TracerProvider {
            inner: Arc::new(TracerProviderInner {
                processors,
                config: Config {
                    id_generator: self
                        .id_generator
                        .unwrap_or_else(|| Box::<RandomIdGenerator>::default()),
                    resource,
                },
                is_shutdown: AtomicBool::new(false),
            }),
        }
    }
}
