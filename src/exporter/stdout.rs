use crate::error::TraceError;
use crate::resource::Resource;
use crate::trace::{ExportResult, SpanData, SpanExporter};
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};

/// A span exporter that writes spans to stdout as JSON lines, one span per
/// line. Useful for local debugging without a collector.
#[derive(Debug, Default)]
pub struct StdoutSpanExporter {
    resource: Resource,
    is_shutdown: AtomicBool,
    resource_emitted: bool,
}

impl StdoutSpanExporter {
    /// Create a new stdout exporter.
    pub fn new() -> Self {
        StdoutSpanExporter::default()
    }
}

impl SpanExporter for StdoutSpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Box::pin(futures_util::future::ready(Err(
                TraceError::AlreadyShutdown,
            )));
        }
        if !self.resource_emitted {
            self.resource_emitted = true;
            if let Ok(resource) = serde_json::to_string(&self.resource) {
                println!("{{\"resource\":{resource}}}");
            }
        }
        for span in &batch {
            match serde_json::to_string(span) {
                Ok(line) => println!("{line}"),
                Err(err) => {
                    return Box::pin(futures_util::future::ready(Err(TraceError::Other(
                        err.to_string(),
                    ))))
                }
            }
        }
        Box::pin(futures_util::future::ready(Ok(())))
    }

    fn shutdown(&mut self) {
        self.is_shutdown.store(true, Ordering::SeqCst);
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = resource.clone();
    }
}
