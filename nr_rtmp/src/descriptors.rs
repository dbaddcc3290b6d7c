//! ABOUTME: Static table of metric descriptors the exporter can emit
//! ABOUTME: Built once at startup and owned by the exporter

use prometheus_client::metrics::MetricType;

/// Prefix shared by every exported metric
pub const NAMESPACE: &str = "nginx_rtmp";

/// Label carried by every stream metric
pub const STREAM_LABEL: &str = "stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn metric_type(self) -> MetricType {
        match self {
            MetricKind::Counter => MetricType::Counter,
            MetricKind::Gauge => MetricType::Gauge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Server,
    Stream,
}

impl Subsystem {
    pub fn as_str(self) -> &'static str {
        match self {
            Subsystem::Server => "server",
            Subsystem::Stream => "stream",
        }
    }
}

/// Name, help text and label schema of one metric.
///
/// `name` excludes the namespace and the `_total` suffix counters get when
/// encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub subsystem: Subsystem,
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

impl MetricDescriptor {
    const fn server(name: &'static str, help: &'static str, kind: MetricKind) -> Self {
        Self {
            subsystem: Subsystem::Server,
            name,
            help,
            kind,
            labels: &[],
        }
    }

    const fn stream(name: &'static str, help: &'static str, kind: MetricKind) -> Self {
        Self {
            subsystem: Subsystem::Stream,
            name,
            help,
            kind,
            labels: &[STREAM_LABEL],
        }
    }

    /// Name relative to the namespace, e.g. `server_incoming_bytes`
    pub fn local_name(&self) -> String {
        format!("{}_{}", self.subsystem.as_str(), self.name)
    }
}

/// Every descriptor the exporter may emit.
#[derive(Debug, Clone)]
pub struct Descriptors {
    pub server_incoming_bytes: MetricDescriptor,
    pub server_outgoing_bytes: MetricDescriptor,
    pub server_receive_bytes: MetricDescriptor,
    pub server_transmit_bytes: MetricDescriptor,
    pub server_uptime: MetricDescriptor,
    pub server_current_streams: MetricDescriptor,
    pub stream_incoming_bytes: MetricDescriptor,
    pub stream_outgoing_bytes: MetricDescriptor,
    pub stream_receive_bytes: MetricDescriptor,
    pub stream_transmit_bytes: MetricDescriptor,
    pub stream_uptime: MetricDescriptor,
}

impl Descriptors {
    pub fn new() -> Self {
        use MetricKind::{Counter, Gauge};

        Self {
            server_incoming_bytes: MetricDescriptor::server(
                "incoming_bytes",
                "Current total of incoming bytes",
                Counter,
            ),
            server_outgoing_bytes: MetricDescriptor::server(
                "outgoing_bytes",
                "Current total of outgoing bytes",
                Counter,
            ),
            server_receive_bytes: MetricDescriptor::server(
                "receive_bytes",
                "Current reception bandwidth per second, in megabytes",
                Gauge,
            ),
            server_transmit_bytes: MetricDescriptor::server(
                "transmit_bytes",
                "Current transmission bandwidth per second, in megabytes",
                Gauge,
            ),
            server_uptime: MetricDescriptor::server(
                "uptime_seconds",
                "Number of seconds since NGINX-RTMP started",
                Counter,
            ),
            server_current_streams: MetricDescriptor::server(
                "current_streams",
                "Current number of active streams",
                Gauge,
            ),
            stream_incoming_bytes: MetricDescriptor::stream(
                "incoming_bytes",
                "Current total of incoming bytes",
                Counter,
            ),
            stream_outgoing_bytes: MetricDescriptor::stream(
                "outgoing_bytes",
                "Current total of outgoing bytes",
                Counter,
            ),
            stream_receive_bytes: MetricDescriptor::stream(
                "receive_bytes",
                "Current reception bandwidth per second, in megabytes",
                Gauge,
            ),
            stream_transmit_bytes: MetricDescriptor::stream(
                "transmit_bytes",
                "Current transmission bandwidth per second, in megabytes",
                Gauge,
            ),
            stream_uptime: MetricDescriptor::stream(
                "uptime_seconds",
                "Number of seconds since the stream started",
                Counter,
            ),
        }
    }

    /// Server descriptors in emission order
    pub fn server(&self) -> [&MetricDescriptor; 6] {
        [
            &self.server_incoming_bytes,
            &self.server_outgoing_bytes,
            &self.server_receive_bytes,
            &self.server_transmit_bytes,
            &self.server_uptime,
            &self.server_current_streams,
        ]
    }

    /// Stream descriptors in emission order
    pub fn stream(&self) -> [&MetricDescriptor; 5] {
        [
            &self.stream_incoming_bytes,
            &self.stream_outgoing_bytes,
            &self.stream_receive_bytes,
            &self.stream_transmit_bytes,
            &self.stream_uptime,
        ]
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.server().into_iter().chain(self.stream())
    }
}

impl Default for Descriptors {
    fn default() -> Self {
        Self::new()
    }
}
