//! # Span Processor Interface
//!
//! Span processors decouple span completion from export I/O. Every finished
//! span is handed to the processors registered on the [`TracerProvider`]; the
//! built-in processors convert them to batches and pass those to a
//! [`SpanExporter`].
//!
//! ```ascii
//!   +-------+------------+   +-----------------------+   +-------------------+
//!   |       |            |   |                       |   |                   |
//!   |       |            |   | (Batch)SpanProcessor  |   |    SpanExporter   |
//!   |       |            +---> (Simple)SpanProcessor +--->  (HTTP, stdout)   |
//!   |  SDK  | Span::end()|   |                       |   |                   |
//!   |       |            |   +-----------------------+   +-------------------+
//!   +-------+------------+
//! ```
//!
//! [`TracerProvider`]: crate::trace::TracerProvider

use crate::error::{TraceError, TraceResult};
use crate::resource::Resource;
use crate::trace::{ExportResult, SpanData, SpanExporter};
use futures_executor::block_on;
use futures_util::future::BoxFuture;
use std::cmp::min;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use std::{env, str::FromStr};

/// Delay interval between two consecutive exports.
pub(crate) const MICROTEL_BSP_SCHEDULE_DELAY: &str = "MICROTEL_BSP_SCHEDULE_DELAY";
/// Default delay interval between two consecutive exports, in milliseconds.
pub(crate) const MICROTEL_BSP_SCHEDULE_DELAY_DEFAULT: u64 = 5_000;
/// Maximum queue size.
pub(crate) const MICROTEL_BSP_MAX_QUEUE_SIZE: &str = "MICROTEL_BSP_MAX_QUEUE_SIZE";
/// Default maximum queue size.
pub(crate) const MICROTEL_BSP_MAX_QUEUE_SIZE_DEFAULT: usize = 2_048;
/// Maximum batch size, must be less than or equal to the maximum queue size.
pub(crate) const MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE: &str = "MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE";
/// Default maximum batch size.
pub(crate) const MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT: usize = 512;
/// Maximum allowed time to export data.
pub(crate) const MICROTEL_BSP_EXPORT_TIMEOUT: &str = "MICROTEL_BSP_EXPORT_TIMEOUT";
/// Default maximum allowed time to export data, in milliseconds.
pub(crate) const MICROTEL_BSP_EXPORT_TIMEOUT_DEFAULT: u64 = 30_000;

/// `SpanProcessor` is the hook invoked when a span ends. Implementations must
/// not block the calling thread in `on_end`.
pub trait SpanProcessor: Send + Sync + std::fmt::Debug {
    /// Called after a span is ended, with the finished immutable data. Invoked
    /// synchronously within [`Span::end`], possibly from many threads at once.
    ///
    /// [`Span::end`]: crate::trace::Span::end
    fn on_end(&self, span: SpanData);
    /// Force any buffered spans to be exported.
    fn force_flush(&self) -> TraceResult<()>;
    /// Shuts down the processor: one final flush, then the exporter is closed.
    /// Only the first call performs work; later calls return
    /// [`TraceError::AlreadyShutdown`].
    fn shutdown(&self) -> TraceResult<()>;
    /// Set the resource describing the producing process. Called by the
    /// provider at build time.
    fn set_resource(&mut self, _resource: &Resource) {}
}

/// A [SpanProcessor] that passes finished spans to the configured
/// [`SpanExporter`] as soon as they are finished, without batching. Useful for
/// debugging and testing; use [BatchSpanProcessor] otherwise.
#[derive(Debug)]
pub struct SimpleSpanProcessor {
    exporter: Mutex<Box<dyn SpanExporter>>,
    is_shutdown: AtomicBool,
}

impl SimpleSpanProcessor {
    /// Create a new [SimpleSpanProcessor] using the provided exporter.
    pub fn new(exporter: Box<dyn SpanExporter>) -> Self {
        Self {
            exporter: Mutex::new(exporter),
            is_shutdown: AtomicBool::new(false),
        }
    }
}

impl SpanProcessor for SimpleSpanProcessor {
    fn on_end(&self, span: SpanData) {
        if self.is_shutdown.load(Ordering::Relaxed) {
            tracing::warn!(
                name: "SimpleSpanProcessor.OnEnd.AfterShutdown",
                target: env!("CARGO_PKG_NAME"),
                span_name = %span.name,
            );
            return;
        }
        let result = self
            .exporter
            .lock()
            .map_err(TraceError::from)
            .and_then(|mut exporter| block_on(exporter.export(vec![span])));
        if let Err(err) = result {
            tracing::debug!(
                name: "SimpleSpanProcessor.OnEnd.ExportError",
                target: env!("CARGO_PKG_NAME"),
                reason = %err,
            );
        }
    }

    fn force_flush(&self) -> TraceResult<()> {
        // Nothing buffered.
        Ok(())
    }

    fn shutdown(&self) -> TraceResult<()> {
        if self.is_shutdown.swap(true, Ordering::Relaxed) {
            return Err(TraceError::AlreadyShutdown);
        }
        let mut exporter = self.exporter.lock()?;
        exporter.shutdown();
        Ok(())
    }

    fn set_resource(&mut self, resource: &Resource) {
        if let Ok(mut exporter) = self.exporter.lock() {
            exporter.set_resource(resource);
        }
    }
}

/// Messages exchanged between the caller threads and the worker thread.
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
enum BatchMessage {
    ExportSpan(SpanData),
    ForceFlush(SyncSender<TraceResult<()>>),
    Shutdown(SyncSender<TraceResult<()>>),
    SetResource(Resource),
}

/// A [SpanProcessor] buffering finished spans and exporting them in batches
/// from a dedicated background thread.
///
/// Spans are flushed when the buffer reaches the configured maximum batch
/// size, when the schedule-delay timer fires with a non-empty buffer, on
/// [`force_flush`], and once more on [`shutdown`]. All flush triggers run on
/// the single worker thread, so no two exports are ever in flight at once and
/// batches reach the exporter in FIFO completion order.
///
/// Exporter failures are logged and the affected batch is dropped
/// (at-most-once delivery); they are never surfaced to the code that created
/// the spans.
///
/// [`force_flush`]: SpanProcessor::force_flush
/// [`shutdown`]: SpanProcessor::shutdown
#[derive(Debug)]
pub struct BatchSpanProcessor {
    message_sender: SyncSender<BatchMessage>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    forceflush_timeout: Duration,
    shutdown_timeout: Duration,
    is_shutdown: AtomicBool,
    dropped_span_count: Arc<AtomicUsize>,
}

impl BatchSpanProcessor {
    /// Creates a new `BatchSpanProcessor` exporting to `exporter`.
    pub fn new<E>(mut exporter: E, config: BatchConfig) -> Self
    where
        E: SpanExporter + 'static,
    {
        let (message_sender, message_receiver) = sync_channel(config.max_queue_size);

        let handle = thread::Builder::new()
            .name("microtel.BatchSpanProcessor".to_string())
            .spawn(move || {
                let mut spans: Vec<SpanData> = Vec::with_capacity(config.max_export_batch_size);
                let mut last_export_time = Instant::now();

                loop {
                    let timeout = config
                        .scheduled_delay
                        .saturating_sub(last_export_time.elapsed());
                    match message_receiver.recv_timeout(timeout) {
                        Ok(BatchMessage::ExportSpan(span)) => {
                            spans.push(span);
                            if spans.len() >= config.max_export_batch_size {
                                let _ = export_batches(&mut exporter, &mut spans, &config);
                                last_export_time = Instant::now();
                            }
                        }
                        Ok(BatchMessage::ForceFlush(sender)) => {
                            let result = export_batches(&mut exporter, &mut spans, &config);
                            let _ = sender.send(result);
                            last_export_time = Instant::now();
                        }
                        Ok(BatchMessage::Shutdown(sender)) => {
                            let result = export_batches(&mut exporter, &mut spans, &config);
                            exporter.shutdown();
                            let _ = sender.send(result);
                            break;
                        }
                        Ok(BatchMessage::SetResource(resource)) => {
                            exporter.set_resource(&resource);
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            if !spans.is_empty() {
                                let _ = export_batches(&mut exporter, &mut spans, &config);
                            }
                            last_export_time = Instant::now();
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            // All processor handles are gone; flush what is
                            // left and stop.
                            let _ = export_batches(&mut exporter, &mut spans, &config);
                            exporter.shutdown();
                            break;
                        }
                    }
                }
            })
            .expect("failed to spawn batch span processor thread");

        Self {
            message_sender,
            handle: Mutex::new(Some(handle)),
            forceflush_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
            is_shutdown: AtomicBool::new(false),
            dropped_span_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a builder for a processor exporting to `exporter`.
    pub fn builder<E>(exporter: E) -> BatchSpanProcessorBuilder<E>
    where
        E: SpanExporter + 'static,
    {
        BatchSpanProcessorBuilder {
            exporter,
            config: BatchConfig::default(),
        }
    }
}

/// Drain `spans` in FIFO order as batches of at most `max_export_batch_size`
/// and hand them to the exporter. A failed batch is dropped and logged; the
/// remaining batches are still attempted.
fn export_batches<E: SpanExporter>(
    exporter: &mut E,
    spans: &mut Vec<SpanData>,
    config: &BatchConfig,
) -> TraceResult<()> {
    let mut result = Ok(());
    while !spans.is_empty() {
        let split = min(spans.len(), config.max_export_batch_size);
        let rest = spans.split_off(split);
        let batch = std::mem::replace(spans, rest);
        let batch_len = batch.len();
        if let Err(err) = export_with_timeout(exporter.export(batch), config.max_export_timeout) {
            tracing::warn!(
                name: "BatchSpanProcessor.ExportError",
                target: env!("CARGO_PKG_NAME"),
                dropped_spans = batch_len,
                reason = %err,
            );
            result = Err(err);
        }
    }
    result
}

/// Run one export to completion, giving up after `timeout`. The export runs
/// on a helper thread so an unresponsive exporter can be abandoned without
/// stalling the worker; an abandoned export may still finish in the
/// background, but its batch is reported as dropped.
fn export_with_timeout(
    export: BoxFuture<'static, ExportResult>,
    timeout: Duration,
) -> ExportResult {
    let (sender, receiver) = sync_channel(1);
    thread::Builder::new()
        .name("microtel.Export".to_string())
        .spawn(move || {
            let _ = sender.send(block_on(export));
        })
        .expect("failed to spawn export thread");
    receiver
        .recv_timeout(timeout)
        .unwrap_or(Err(TraceError::ExportTimedOut(timeout)))
}

impl SpanProcessor for BatchSpanProcessor {
    fn on_end(&self, span: SpanData) {
        if self.is_shutdown.load(Ordering::Relaxed) {
            tracing::warn!(
                name: "BatchSpanProcessor.OnEnd.AfterShutdown",
                target: env!("CARGO_PKG_NAME"),
                span_name = %span.name,
            );
            return;
        }
        if self
            .message_sender
            .try_send(BatchMessage::ExportSpan(span))
            .is_err()
        {
            // Queue full or worker gone. Warn the first time only; the total
            // is reported at shutdown.
            if self.dropped_span_count.fetch_add(1, Ordering::Relaxed) == 0 {
                tracing::warn!(
                    name: "BatchSpanProcessor.SpanDroppingStarted",
                    target: env!("CARGO_PKG_NAME"),
                    message = "span queue full; spans will be dropped until there is capacity",
                );
            }
        }
    }

    fn force_flush(&self) -> TraceResult<()> {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Err(TraceError::AlreadyShutdown);
        }
        let (sender, receiver) = sync_channel(1);
        self.message_sender
            .try_send(BatchMessage::ForceFlush(sender))
            .map_err(|_| TraceError::Other("failed to send ForceFlush message".into()))?;
        receiver
            .recv_timeout(self.forceflush_timeout)
            .map_err(|_| TraceError::ExportTimedOut(self.forceflush_timeout))?
    }

    fn shutdown(&self) -> TraceResult<()> {
        if self.is_shutdown.swap(true, Ordering::Relaxed) {
            return Err(TraceError::AlreadyShutdown);
        }
        let dropped = self.dropped_span_count.load(Ordering::Relaxed);
        if dropped > 0 {
            tracing::warn!(
                name: "BatchSpanProcessor.SpansDropped",
                target: env!("CARGO_PKG_NAME"),
                dropped_spans = dropped,
            );
        }
        let (sender, receiver) = sync_channel(1);
        self.message_sender
            .try_send(BatchMessage::Shutdown(sender))
            .map_err(|_| TraceError::Other("failed to send Shutdown message".into()))?;

        match receiver.recv_timeout(self.shutdown_timeout) {
            Ok(result) => {
                if let Ok(mut handle) = self.handle.lock() {
                    if let Some(handle) = handle.take() {
                        let _ = handle.join();
                    }
                }
                result
            }
            Err(_) => {
                // Proceed without the worker rather than hanging the process.
                tracing::warn!(
                    name: "BatchSpanProcessor.Shutdown.Timeout",
                    target: env!("CARGO_PKG_NAME"),
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                );
                Err(TraceError::ExportTimedOut(self.shutdown_timeout))
            }
        }
    }

    fn set_resource(&mut self, resource: &Resource) {
        if self
            .message_sender
            .try_send(BatchMessage::SetResource(resource.clone()))
            .is_err()
        {
            tracing::debug!(
                name: "BatchSpanProcessor.SetResource.Dropped",
                target: env!("CARGO_PKG_NAME"),
                message = "resource update dropped; queue full or worker stopped",
            );
        }
    }
}

/// Builder for [`BatchSpanProcessor`].
#[derive(Debug, Default)]
pub struct BatchSpanProcessorBuilder<E>
where
    E: SpanExporter + 'static,
{
    exporter: E,
    config: BatchConfig,
}

impl<E> BatchSpanProcessorBuilder<E>
where
    E: SpanExporter + 'static,
{
    /// Set the [`BatchConfig`] for this processor.
    pub fn with_batch_config(self, config: BatchConfig) -> Self {
        BatchSpanProcessorBuilder { config, ..self }
    }

    /// Build a new instance of [`BatchSpanProcessor`].
    pub fn build(self) -> BatchSpanProcessor {
        BatchSpanProcessor::new(self.exporter, self.config)
    }
}

/// Batch span processor configuration.
/// Use [`BatchConfigBuilder`] to configure your own instance of [`BatchConfig`].
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// The maximum queue size to buffer spans for delayed processing. If the
    /// queue gets full spans are dropped. The default value is 2048.
    pub(crate) max_queue_size: usize,

    /// The delay interval between two consecutive processing of batches. The
    /// default value is 5 seconds.
    pub(crate) scheduled_delay: Duration,

    /// The maximum number of spans to export in a single batch. If more spans
    /// are buffered, multiple batches are exported one after the other
    /// without delay. The default value is 512.
    pub(crate) max_export_batch_size: usize,

    /// The maximum duration to export a batch of data. An export still
    /// running when it elapses is abandoned and its batch counted as dropped.
    /// The default value is 30 seconds.
    pub(crate) max_export_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfigBuilder::default().build()
    }
}

/// A builder for creating [`BatchConfig`] instances.
#[derive(Debug)]
pub struct BatchConfigBuilder {
    max_queue_size: usize,
    scheduled_delay: Duration,
    max_export_batch_size: usize,
    max_export_timeout: Duration,
}

impl Default for BatchConfigBuilder {
    /// Create a new [`BatchConfigBuilder`] initialized with the default batch
    /// config values, overridden by environment variables if set:
    /// * `MICROTEL_BSP_MAX_QUEUE_SIZE`
    /// * `MICROTEL_BSP_SCHEDULE_DELAY`
    /// * `MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE`
    /// * `MICROTEL_BSP_EXPORT_TIMEOUT`
    fn default() -> Self {
        BatchConfigBuilder {
            max_queue_size: MICROTEL_BSP_MAX_QUEUE_SIZE_DEFAULT,
            scheduled_delay: Duration::from_millis(MICROTEL_BSP_SCHEDULE_DELAY_DEFAULT),
            max_export_batch_size: MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT,
            max_export_timeout: Duration::from_millis(MICROTEL_BSP_EXPORT_TIMEOUT_DEFAULT),
        }
        .init_from_env_vars()
    }
}

impl BatchConfigBuilder {
    /// Set the maximum queue size. If the queue gets full spans are dropped.
    /// The default value is 2048.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set the maximum number of spans exported in a single batch. The
    /// default value is 512.
    pub fn with_max_export_batch_size(mut self, max_export_batch_size: usize) -> Self {
        self.max_export_batch_size = max_export_batch_size;
        self
    }

    /// Set the delay interval between two consecutive batch exports. The
    /// default value is 5000 milliseconds.
    pub fn with_scheduled_delay(mut self, scheduled_delay: Duration) -> Self {
        self.scheduled_delay = scheduled_delay;
        self
    }

    /// Set the maximum duration to export a batch of data. The default value
    /// is 30000 milliseconds.
    pub fn with_max_export_timeout(mut self, max_export_timeout: Duration) -> Self {
        self.max_export_timeout = max_export_timeout;
        self
    }

    /// Builds a `BatchConfig` enforcing that `max_export_batch_size` is less
    /// than or equal to `max_queue_size`.
    pub fn build(self) -> BatchConfig {
        let max_export_batch_size = min(self.max_export_batch_size, self.max_queue_size);

        BatchConfig {
            max_queue_size: self.max_queue_size,
            scheduled_delay: self.scheduled_delay,
            max_export_timeout: self.max_export_timeout,
            max_export_batch_size,
        }
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Some(max_queue_size) = env::var(MICROTEL_BSP_MAX_QUEUE_SIZE)
            .ok()
            .and_then(|queue_size| usize::from_str(&queue_size).ok())
        {
            self.max_queue_size = max_queue_size;
        }

        if let Some(scheduled_delay) = env::var(MICROTEL_BSP_SCHEDULE_DELAY)
            .ok()
            .and_then(|delay| u64::from_str(&delay).ok())
        {
            self.scheduled_delay = Duration::from_millis(scheduled_delay);
        }

        if let Some(max_export_batch_size) = env::var(MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE)
            .ok()
            .and_then(|batch_size| usize::from_str(&batch_size).ok())
        {
            self.max_export_batch_size = max_export_batch_size;
        }

        if self.max_export_batch_size > self.max_queue_size {
            self.max_export_batch_size = self.max_queue_size;
        }

        if let Some(max_export_timeout) = env::var(MICROTEL_BSP_EXPORT_TIMEOUT)
            .ok()
            .and_then(|timeout| u64::from_str(&timeout).ok())
        {
            self.max_export_timeout = Duration::from_millis(max_export_timeout);
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{
        ExportResult, InMemorySpanExporterBuilder, SpanContext, SpanId, Status, TraceId,
    };
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use std::time::SystemTime;

    fn create_test_span(name: &str) -> SpanData {
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

    #[derive(Debug)]
    struct MockSpanExporter {
        batches: Arc<Mutex<Vec<Vec<SpanData>>>>,
        fail_next: Arc<AtomicBool>,
    }

    impl MockSpanExporter {
        fn new() -> Self {
            Self {
                batches: Arc::new(Mutex::new(Vec::new())),
                fail_next: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl SpanExporter for MockSpanExporter {
        fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
            let batches = self.batches.clone();
            let fail = self.fail_next.swap(false, Ordering::SeqCst);
            async move {
                if fail {
                    return Err(TraceError::Other("mock export failure".into()));
                }
                batches.lock().unwrap().push(batch);
                Ok(())
            }
            .boxed()
        }
    }

    #[test]
    fn simple_span_processor_on_end_calls_export() {
        let exporter = InMemorySpanExporterBuilder::new().build();
        let processor = SimpleSpanProcessor::new(Box::new(exporter.clone()));
        let span_data = create_test_span("simple");
        processor.on_end(span_data.clone());
        assert_eq!(exporter.get_finished_spans().unwrap()[0], span_data);
        let _result = processor.shutdown();
    }

    #[test]
    fn simple_span_processor_shutdown_is_idempotent_guarded() {
        let exporter = InMemorySpanExporterBuilder::new().build();
        let processor = SimpleSpanProcessor::new(Box::new(exporter.clone()));
        assert!(processor.shutdown().is_ok());
        assert!(matches!(
            processor.shutdown(),
            Err(TraceError::AlreadyShutdown)
        ));
    }

    #[test]
    fn test_default_const_values() {
        assert_eq!(MICROTEL_BSP_MAX_QUEUE_SIZE, "MICROTEL_BSP_MAX_QUEUE_SIZE");
        assert_eq!(MICROTEL_BSP_MAX_QUEUE_SIZE_DEFAULT, 2048);
        assert_eq!(MICROTEL_BSP_SCHEDULE_DELAY, "MICROTEL_BSP_SCHEDULE_DELAY");
        assert_eq!(MICROTEL_BSP_SCHEDULE_DELAY_DEFAULT, 5000);
        assert_eq!(
            MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE,
            "MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE"
        );
        assert_eq!(MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT, 512);
        assert_eq!(MICROTEL_BSP_EXPORT_TIMEOUT, "MICROTEL_BSP_EXPORT_TIMEOUT");
        assert_eq!(MICROTEL_BSP_EXPORT_TIMEOUT_DEFAULT, 30000);
    }

    #[test]
    fn batch_config_defaults() {
        let env_vars = vec![
            MICROTEL_BSP_SCHEDULE_DELAY,
            MICROTEL_BSP_EXPORT_TIMEOUT,
            MICROTEL_BSP_MAX_QUEUE_SIZE,
            MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE,
        ];
        let config = temp_env::with_vars_unset(env_vars, BatchConfig::default);

        assert_eq!(config.max_queue_size, MICROTEL_BSP_MAX_QUEUE_SIZE_DEFAULT);
        assert_eq!(
            config.scheduled_delay,
            Duration::from_millis(MICROTEL_BSP_SCHEDULE_DELAY_DEFAULT)
        );
        assert_eq!(
            config.max_export_batch_size,
            MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT
        );
        assert_eq!(
            config.max_export_timeout,
            Duration::from_millis(MICROTEL_BSP_EXPORT_TIMEOUT_DEFAULT)
        );
    }

    #[test]
    fn batch_config_configurable_by_env_vars() {
        let env_vars = vec![
            (MICROTEL_BSP_SCHEDULE_DELAY, Some("2000")),
            (MICROTEL_BSP_EXPORT_TIMEOUT, Some("60000")),
            (MICROTEL_BSP_MAX_QUEUE_SIZE, Some("4096")),
            (MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE, Some("1024")),
        ];
        let config = temp_env::with_vars(env_vars, BatchConfig::default);

        assert_eq!(config.scheduled_delay, Duration::from_millis(2000));
        assert_eq!(config.max_export_timeout, Duration::from_millis(60000));
        assert_eq!(config.max_queue_size, 4096);
        assert_eq!(config.max_export_batch_size, 1024);
    }

    #[test]
    fn batch_config_max_export_batch_size_validation() {
        let env_vars = vec![
            (MICROTEL_BSP_MAX_QUEUE_SIZE, Some("256")),
            (MICROTEL_BSP_MAX_EXPORT_BATCH_SIZE, Some("1024")),
        ];
        let config = temp_env::with_vars(env_vars, BatchConfig::default);

        assert_eq!(config.max_queue_size, 256);
        assert_eq!(config.max_export_batch_size, 256);
    }

    #[test]
    fn batch_config_with_fields() {
        let batch = BatchConfigBuilder::default()
            .with_max_export_batch_size(10)
            .with_scheduled_delay(Duration::from_millis(10))
            .with_max_export_timeout(Duration::from_millis(10))
            .with_max_queue_size(10)
            .build();
        assert_eq!(batch.max_export_batch_size, 10);
        assert_eq!(batch.scheduled_delay, Duration::from_millis(10));
        assert_eq!(batch.max_export_timeout, Duration::from_millis(10));
        assert_eq!(batch.max_queue_size, 10);
    }

    #[test]
    fn batch_processor_flushes_when_batch_size_reached() {
        let exporter = MockSpanExporter::new();
        let batches = exporter.batches.clone();
        let config = BatchConfigBuilder::default()
            .with_max_queue_size(100)
            .with_max_export_batch_size(5)
            .with_scheduled_delay(Duration::from_secs(60))
            .build();
        let processor = BatchSpanProcessor::new(exporter, config);

        // 10 spans with a batch size of 5 and no timer: exactly 2 size
        // triggered flushes of 5 spans each, FIFO order.
        for i in 0..10 {
            processor.on_end(create_test_span(&format!("span-{i}")));
        }
        std::thread::sleep(Duration::from_millis(200));

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|batch| batch.len() == 5));
        assert_eq!(batches[0][0].name, "span-0");
        assert_eq!(batches[1][4].name, "span-9");
    }

    #[test]
    fn batch_processor_timer_flushes_non_empty_buffer() {
        let exporter = MockSpanExporter::new();
        let batches = exporter.batches.clone();
        let config = BatchConfigBuilder::default()
            .with_max_queue_size(100)
            .with_max_export_batch_size(50)
            .with_scheduled_delay(Duration::from_millis(100))
            .build();
        let processor = BatchSpanProcessor::new(exporter, config);

        processor.on_end(create_test_span("timer-span"));
        std::thread::sleep(Duration::from_millis(500));

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].name, "timer-span");
        drop(batches);

        let _ = processor.shutdown();
    }

    #[test]
    fn batch_processor_force_flush() {
        let exporter = MockSpanExporter::new();
        let batches = exporter.batches.clone();
        let config = BatchConfigBuilder::default()
            .with_max_queue_size(100)
            .with_max_export_batch_size(50)
            .with_scheduled_delay(Duration::from_secs(60))
            .build();
        let processor = BatchSpanProcessor::new(exporter, config);

        processor.on_end(create_test_span("flush-span"));
        assert!(processor.force_flush().is_ok());

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].name, "flush-span");
    }

    #[test]
    fn batch_processor_shutdown_flushes_remaining_and_rejects_further_work() {
        let exporter = MockSpanExporter::new();
        let batches = exporter.batches.clone();
        let config = BatchConfigBuilder::default()
            .with_max_queue_size(100)
            .with_max_export_batch_size(2)
            .with_scheduled_delay(Duration::from_secs(60))
            .build();
        let processor = BatchSpanProcessor::new(exporter, config);

        // 5 spans, batch size 2: two size flushes plus the shutdown flush of
        // the remainder, ceil(5 / 2) == 3 batches in total.
        for i in 0..5 {
            processor.on_end(create_test_span(&format!("span-{i}")));
        }
        assert!(processor.shutdown().is_ok());

        {
            let batches = batches.lock().unwrap();
            assert_eq!(batches.len(), 3);
            assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 5);
            assert_eq!(batches[2][0].name, "span-4");
        }

        // Further calls are rejected or ignored.
        assert!(matches!(
            processor.shutdown(),
            Err(TraceError::AlreadyShutdown)
        ));
        assert!(matches!(
            processor.force_flush(),
            Err(TraceError::AlreadyShutdown)
        ));
        processor.on_end(create_test_span("late-span"));
        assert_eq!(batches.lock().unwrap().len(), 3);
    }

    /// An exporter whose exports take `delay` to complete.
    #[derive(Debug)]
    struct SlowExporter {
        delay: Duration,
    }

    impl SpanExporter for SlowExporter {
        fn export(&mut self, _batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
            let delay = self.delay;
            async move {
                std::thread::sleep(delay);
                Ok(())
            }
            .boxed()
        }
    }

    #[test]
    fn export_timeout_abandons_slow_exports() {
        let config = BatchConfigBuilder::default()
            .with_max_queue_size(100)
            .with_max_export_batch_size(50)
            .with_scheduled_delay(Duration::from_secs(60))
            .with_max_export_timeout(Duration::from_millis(50))
            .build();
        let processor = BatchSpanProcessor::new(
            SlowExporter {
                delay: Duration::from_secs(3),
            },
            config,
        );

        processor.on_end(create_test_span("slow"));
        let started = Instant::now();
        let result = processor.force_flush();
        assert!(matches!(result, Err(TraceError::ExportTimedOut(_))));
        assert!(started.elapsed() < Duration::from_secs(2));

        let _ = processor.shutdown();
    }

    #[test]
    fn set_resource_after_worker_stopped_is_a_quiet_noop() {
        let exporter = MockSpanExporter::new();
        let config = BatchConfigBuilder::default()
            .with_max_queue_size(100)
            .with_max_export_batch_size(50)
            .with_scheduled_delay(Duration::from_secs(60))
            .build();
        let mut processor = BatchSpanProcessor::new(exporter, config);
        assert!(processor.shutdown().is_ok());

        // The worker is gone, so the update cannot be delivered; it is
        // dropped and logged rather than panicking or blocking.
        processor.set_resource(&Resource::empty());
    }

    #[test]
    fn batch_processor_drops_failed_batch_and_stays_usable() {
        let exporter = MockSpanExporter::new();
        let batches = exporter.batches.clone();
        let fail_next = exporter.fail_next.clone();
        let config = BatchConfigBuilder::default()
            .with_max_queue_size(100)
            .with_max_export_batch_size(50)
            .with_scheduled_delay(Duration::from_secs(60))
            .build();
        let processor = BatchSpanProcessor::new(exporter, config);

        fail_next.store(true, Ordering::SeqCst);
        processor.on_end(create_test_span("doomed"));
        assert!(processor.force_flush().is_err());
        assert!(batches.lock().unwrap().is_empty());

        // The failed batch was dropped, not re-enqueued; the buffer keeps
        // accepting spans.
        processor.on_end(create_test_span("survivor"));
        assert!(processor.force_flush().is_ok());
        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].name, "survivor");
    }
}
