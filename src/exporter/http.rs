//! Span exporter posting batches to a collector over HTTP.
//!
//! The payload is a single JSON document per batch carrying the resource and
//! the finished spans; the collector contract is treated as opaque here. The
//! endpoint and the transport security mode are explicit, required
//! parameters: a missing or contradictory configuration fails at
//! construction time rather than silently dropping traces later.

use crate::error::{TraceError, TraceResult};
use crate::resource::Resource;
use crate::trace::{ExportResult, SpanData, SpanExporter};
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Transport security for the collector connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsMode {
    /// Plaintext HTTP. The endpoint scheme must be `http`.
    Insecure,
    /// TLS. The endpoint scheme must be `https`.
    Tls,
}

/// Builder for [`HttpSpanExporter`].
#[derive(Debug, Default)]
pub struct HttpExporterBuilder {
    endpoint: Option<String>,
    tls_mode: Option<TlsMode>,
    timeout: Option<Duration>,
    headers: Vec<(String, String)>,
}

impl HttpExporterBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        HttpExporterBuilder::default()
    }

    /// Set the collector endpoint, e.g. `http://localhost:4318/v1/traces`.
    /// Required.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the transport security mode. Required, and must agree with the
    /// endpoint scheme.
    pub fn with_tls_mode(mut self, tls_mode: TlsMode) -> Self {
        self.tls_mode = Some(tls_mode);
        self
    }

    /// Set the per-request timeout. Defaults to 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add an HTTP header to every export request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Validate the configuration and build the exporter.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::InvalidConfig`] if the endpoint is missing or
    /// unparsable, the security mode is missing, or the endpoint scheme
    /// contradicts the security mode. These errors are fatal to startup:
    /// tracing was requested but cannot be provided.
    pub fn build(self) -> TraceResult<HttpSpanExporter> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| TraceError::InvalidConfig("collector endpoint is required".into()))?;
        let tls_mode = self.tls_mode.ok_or_else(|| {
            TraceError::InvalidConfig("transport security mode is required".into())
        })?;
        let endpoint = Url::parse(&endpoint).map_err(|err| {
            TraceError::InvalidConfig(format!("invalid endpoint {endpoint:?}: {err}"))
        })?;
        match (endpoint.scheme(), tls_mode) {
            ("http", TlsMode::Insecure) | ("https", TlsMode::Tls) => {}
            ("http", TlsMode::Tls) => {
                return Err(TraceError::InvalidConfig(
                    "endpoint scheme is http but TlsMode::Tls was requested".into(),
                ))
            }
            ("https", TlsMode::Insecure) => {
                return Err(TraceError::InvalidConfig(
                    "endpoint scheme is https but TlsMode::Insecure was requested".into(),
                ))
            }
            (scheme, _) => {
                return Err(TraceError::InvalidConfig(format!(
                    "unsupported endpoint scheme {scheme:?}"
                )))
            }
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(10)))
            .build();
        Ok(HttpSpanExporter {
            endpoint,
            agent,
            headers: self.headers,
            resource: Resource::empty(),
            is_shutdown: false,
        })
    }
}

/// One export request body. The exact shape is an agreed contract with the
/// collector; the rest of the SDK does not depend on it.
#[derive(Serialize)]
struct ExportPayload<'a> {
    resource: &'a Resource,
    spans: &'a [SpanData],
}

/// A [`SpanExporter`] posting each batch as JSON to a collector endpoint.
pub struct HttpSpanExporter {
    endpoint: Url,
    agent: ureq::Agent,
    headers: Vec<(String, String)>,
    resource: Resource,
    is_shutdown: bool,
}

impl fmt::Debug for HttpSpanExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSpanExporter")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl HttpSpanExporter {
    /// Create a builder for configuring an exporter.
    pub fn builder() -> HttpExporterBuilder {
        HttpExporterBuilder::new()
    }

    fn export_sync(&mut self, batch: &[SpanData]) -> ExportResult {
        if self.is_shutdown {
            return Err(TraceError::AlreadyShutdown);
        }
        let body = serde_json::to_string(&ExportPayload {
            resource: &self.resource,
            spans: batch,
        })
        .map_err(|err| TraceError::Other(err.to_string()))?;

        let mut request = self
            .agent
            .request_url("POST", &self.endpoint)
            .set("Content-Type", "application/json");
        for (key, value) in &self.headers {
            request = request.set(key, value);
        }
        // Transport failures and non-2xx responses both surface as errors
        // here; the batch processor logs them and drops the batch.
        request
            .send_string(&body)
            .map_err(|err| TraceError::ExportFailed(Box::new(err)))?;
        Ok(())
    }
}

impl SpanExporter for HttpSpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let result = self.export_sync(&batch);
        Box::pin(futures_util::future::ready(result))
    }

    fn shutdown(&mut self) {
        self.is_shutdown = true;
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = resource.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_required() {
        let err = HttpExporterBuilder::new()
            .with_tls_mode(TlsMode::Insecure)
            .build()
            .unwrap_err();
        assert!(matches!(err, TraceError::InvalidConfig(_)));
    }

    #[test]
    fn tls_mode_is_required() {
        let err = HttpExporterBuilder::new()
            .with_endpoint("http://localhost:4318/v1/traces")
            .build()
            .unwrap_err();
        assert!(matches!(err, TraceError::InvalidConfig(_)));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let err = HttpExporterBuilder::new()
            .with_endpoint("not a url")
            .with_tls_mode(TlsMode::Insecure)
            .build()
            .unwrap_err();
        assert!(matches!(err, TraceError::InvalidConfig(_)));
    }

    #[test]
    fn scheme_and_tls_mode_must_agree() {
        let err = HttpExporterBuilder::new()
            .with_endpoint("http://localhost:4318/v1/traces")
            .with_tls_mode(TlsMode::Tls)
            .build()
            .unwrap_err();
        assert!(matches!(err, TraceError::InvalidConfig(_)));

        let err = HttpExporterBuilder::new()
            .with_endpoint("https://collector.example.com/v1/traces")
            .with_tls_mode(TlsMode::Insecure)
            .build()
            .unwrap_err();
        assert!(matches!(err, TraceError::InvalidConfig(_)));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let err = HttpExporterBuilder::new()
            .with_endpoint("ftp://localhost:4318")
            .with_tls_mode(TlsMode::Insecure)
            .build()
            .unwrap_err();
        assert!(matches!(err, TraceError::InvalidConfig(_)));
    }

    #[test]
    fn matching_configurations_build() {
        assert!(HttpExporterBuilder::new()
            .with_endpoint("http://localhost:4318/v1/traces")
            .with_tls_mode(TlsMode::Insecure)
            .with_header("x-api-key", "secret")
            .build()
            .is_ok());
        assert!(HttpExporterBuilder::new()
            .with_endpoint("https://collector.example.com/v1/traces")
            .with_tls_mode(TlsMode::Tls)
            .build()
            .is_ok());
    }
}
