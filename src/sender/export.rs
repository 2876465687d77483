//! OTLP gRPC exporters.
//!
//! One exporter per signal, each holding a long-lived channel to the target
//! collector. Channels are lazy: construction only fails on a bad endpoint
//! or header, and connection problems surface per export call, where the
//! worker records them and moves on. Configured headers are attached
//! verbatim as outbound metadata on every call.

use crate::core::{BlastError, Result};
use opentelemetry_proto::tonic::collector::logs::v1::logs_service_client::LogsServiceClient;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_client::TraceServiceClient;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use std::collections::HashMap;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

/// Transport settings shared by the three exporters
#[derive(Debug, Clone)]
pub struct ExporterSettings {
    pub endpoint: String,
    pub headers: HashMap<String, String>,
    pub insecure: bool,
}

impl ExporterSettings {
    fn channel(&self) -> Result<Channel> {
        let uri = endpoint_uri(&self.endpoint, self.insecure);
        let mut endpoint =
            Endpoint::from_shared(uri.clone()).map_err(|_| BlastError::Endpoint(uri))?;
        if !self.insecure {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_native_roots())?;
        }
        Ok(endpoint.connect_lazy())
    }

    fn metadata(&self) -> Result<MetadataMap> {
        let mut map = MetadataMap::with_capacity(self.headers.len());
        for (key, value) in &self.headers {
            let key: AsciiMetadataKey = key
                .parse()
                .map_err(|_| BlastError::Header(format!("invalid header name: {}", key)))?;
            let value: AsciiMetadataValue = value
                .parse()
                .map_err(|_| BlastError::Header(format!("invalid value for header {}", key)))?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

/// Prefix a scheme when the configured endpoint is a bare host:port
fn endpoint_uri(endpoint: &str, insecure: bool) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else if insecure {
        format!("http://{}", endpoint)
    } else {
        format!("https://{}", endpoint)
    }
}

macro_rules! exporter {
    ($name:ident, $client:ident, $request:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone)]
        pub struct $name {
            client: $client<Channel>,
            headers: MetadataMap,
        }

        impl $name {
            pub fn new(settings: &ExporterSettings) -> Result<Self> {
                Ok(Self {
                    client: $client::new(settings.channel()?),
                    headers: settings.metadata()?,
                })
            }

            /// Perform one unary export call with the configured metadata
            pub async fn export(&self, request: $request) -> Result<()> {
                let mut request = tonic::Request::new(request);
                *request.metadata_mut() = self.headers.clone();
                self.client.clone().export(request).await?;
                Ok(())
            }
        }
    };
}

exporter!(
    TraceExporter,
    TraceServiceClient,
    ExportTraceServiceRequest,
    "Exports trace batches to the OTLP trace service"
);
exporter!(
    MetricsExporter,
    MetricsServiceClient,
    ExportMetricsServiceRequest,
    "Exports metric batches to the OTLP metrics service"
);
exporter!(
    LogsExporter,
    LogsServiceClient,
    ExportLogsServiceRequest,
    "Exports log batches to the OTLP logs service"
);
