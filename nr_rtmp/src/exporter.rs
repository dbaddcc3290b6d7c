//! ABOUTME: Publishes one fresh snapshot of NGINX-RTMP metrics per scrape
//! ABOUTME: Serializes fetch, parse and emit behind a single lock

use crate::descriptors::{Descriptors, MetricDescriptor, MetricKind, NAMESPACE, STREAM_LABEL};
use crate::fetch::{HttpStatusSource, StatusSource};
use crate::model::Snapshot;
use crate::normalize::StreamNameNormalizer;
use crate::parser::parse_status;
use nr_core::{MonotonicTimer, Result};
use prometheus_client::collector::Collector;
use prometheus_client::encoding::{
    DescriptorEncoder, EncodeLabelValue, EncodeMetric, LabelValueEncoder, MetricEncoder,
};
use prometheus_client::metrics::counter::ConstCounter;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;
use std::fmt::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// One value for one descriptor, optionally labelled with a stream name.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub descriptor: MetricDescriptor,
    pub stream: Option<String>,
    pub value: f64,
}

impl Sample {
    fn server(descriptor: &MetricDescriptor, value: f64) -> Self {
        Self {
            descriptor: *descriptor,
            stream: None,
            value,
        }
    }

    fn stream(descriptor: &MetricDescriptor, stream: &str, value: f64) -> Self {
        Self {
            descriptor: *descriptor,
            stream: Some(stream.to_string()),
            value,
        }
    }
}

/// Stage at which a scrape gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeFailure {
    Fetch,
    Parse,
}

impl ScrapeFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrapeFailure::Fetch => "fetch",
            ScrapeFailure::Parse => "parse",
        }
    }
}

/// Outcome of one scrape: either the full sample set or nothing.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub samples: Vec<Sample>,
    pub failure: Option<ScrapeFailure>,
    pub duration: Duration,
}

impl ScrapeReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Exporter for a single NGINX-RTMP status endpoint.
///
/// Nothing is cached between scrapes. Concurrent callers queue on an
/// internal lock so only one fetch is ever in flight.
pub struct Exporter {
    source: Arc<dyn StatusSource>,
    normalizer: StreamNameNormalizer,
    descriptors: Descriptors,
    scrape_lock: Mutex<()>,
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("source", &self.source)
            .field("pattern", &self.normalizer.pattern())
            .finish()
    }
}

impl Exporter {
    /// Exporter scraping `uri` over HTTP
    pub fn new(
        uri: impl Into<String>,
        timeout: Duration,
        normalizer: StreamNameNormalizer,
    ) -> Result<Self> {
        let source = HttpStatusSource::new(uri, timeout)?;
        Ok(Self::with_source(source, normalizer))
    }

    /// Exporter reading from any [`StatusSource`]
    pub fn with_source(source: impl StatusSource + 'static, normalizer: StreamNameNormalizer) -> Self {
        Self {
            source: Arc::new(source),
            normalizer,
            descriptors: Descriptors::new(),
            scrape_lock: Mutex::new(()),
        }
    }

    pub fn descriptors(&self) -> &Descriptors {
        &self.descriptors
    }

    /// Every descriptor this exporter may emit. Performs no I/O.
    pub fn describe(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.descriptors.iter()
    }

    /// Fetch, parse and return the current samples; empty on failure.
    pub async fn collect(&self) -> Vec<Sample> {
        self.scrape().await.samples
    }

    /// Like [`Exporter::collect`] but also reports how the scrape went.
    pub async fn scrape(&self) -> ScrapeReport {
        let _guard = self.scrape_lock.lock().await;
        let timer = MonotonicTimer::new();

        let result = self.fetch_and_parse().await;
        let duration = timer.elapsed();

        match result {
            Ok(snapshot) => {
                debug!(
                    streams = snapshot.streams.len(),
                    duration_ms = duration.as_millis() as u64,
                    "Scrape complete"
                );
                ScrapeReport {
                    samples: self.samples(&snapshot),
                    failure: None,
                    duration,
                }
            }
            Err(e) => {
                let failure = if e.is_fetch() {
                    error!(error = %e, "Can't scrape NGINX-RTMP");
                    ScrapeFailure::Fetch
                } else {
                    error!(error = %e, "Can't parse status XML");
                    ScrapeFailure::Parse
                };
                ScrapeReport {
                    samples: Vec::new(),
                    failure: Some(failure),
                    duration,
                }
            }
        }
    }

    async fn fetch_and_parse(&self) -> Result<Snapshot> {
        let body = self.source.fetch().await?;
        parse_status(&body, &self.normalizer)
    }

    /// Flatten a snapshot into samples: server first, then each stream.
    pub fn samples(&self, snapshot: &Snapshot) -> Vec<Sample> {
        let d = &self.descriptors;
        let server = &snapshot.server;

        let mut samples = Vec::with_capacity(6 + snapshot.streams.len() * 5);
        samples.extend([
            Sample::server(&d.server_incoming_bytes, server.bytes_in),
            Sample::server(&d.server_outgoing_bytes, server.bytes_out),
            Sample::server(&d.server_receive_bytes, server.receive_bytes),
            Sample::server(&d.server_transmit_bytes, server.transmit_bytes),
            Sample::server(&d.server_uptime, server.uptime_seconds),
            Sample::server(&d.server_current_streams, server.current_streams as f64),
        ]);

        for stream in &snapshot.streams {
            let name = stream.name.as_str();
            samples.extend([
                Sample::stream(&d.stream_incoming_bytes, name, stream.bytes_in),
                Sample::stream(&d.stream_outgoing_bytes, name, stream.bytes_out),
                Sample::stream(&d.stream_receive_bytes, name, stream.receive_bytes),
                Sample::stream(&d.stream_transmit_bytes, name, stream.transmit_bytes),
                Sample::stream(&d.stream_uptime, name, stream.uptime_seconds),
            ]);
        }
        samples
    }
}

/// Encodes one scrape's samples as constant metrics.
#[derive(Debug)]
pub struct SnapshotCollector {
    descriptors: Descriptors,
    samples: Vec<Sample>,
}

impl SnapshotCollector {
    pub fn new(descriptors: Descriptors, samples: Vec<Sample>) -> Self {
        Self {
            descriptors,
            samples,
        }
    }

    /// Register under the `nginx_rtmp` prefix of `registry`
    pub fn register(self, registry: &mut Registry) {
        registry
            .sub_registry_with_prefix(NAMESPACE)
            .register_collector(Box::new(self));
    }
}

fn encode_value(kind: MetricKind, value: f64, encoder: MetricEncoder) -> fmt::Result {
    match kind {
        MetricKind::Counter => ConstCounter::new(value).encode(encoder),
        MetricKind::Gauge => ConstGauge::new(value).encode(encoder),
    }
}

/// Stream label value escaped for the text exposition format.
///
/// The encoder writes label values verbatim, so a backslash, a double quote
/// or a newline in a stream name would otherwise end the line early.
struct StreamLabel<'a>(&'a str);

impl EncodeLabelValue for StreamLabel<'_> {
    fn encode(&self, encoder: &mut LabelValueEncoder) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '\\' => encoder.write_str("\\\\")?,
                '"' => encoder.write_str("\\\"")?,
                '\n' => encoder.write_str("\\n")?,
                c => encoder.write_char(c)?,
            }
        }
        Ok(())
    }
}

impl Collector for SnapshotCollector {
    fn encode(&self, mut encoder: DescriptorEncoder) -> fmt::Result {
        for descriptor in self.descriptors.iter() {
            let mut matching = self
                .samples
                .iter()
                .filter(|s| s.descriptor == *descriptor)
                .peekable();
            // Descriptors without samples are left out entirely
            if matching.peek().is_none() {
                continue;
            }

            let name = descriptor.local_name();
            let mut metric_encoder = encoder.encode_descriptor(
                &name,
                descriptor.help,
                None,
                descriptor.kind.metric_type(),
            )?;

            if descriptor.labels.is_empty() {
                // Unlabelled metrics carry exactly one sample
                if let Some(sample) = matching.next() {
                    encode_value(descriptor.kind, sample.value, metric_encoder)?;
                }
            } else {
                for sample in matching {
                    let stream = StreamLabel(sample.stream.as_deref().unwrap_or(""));
                    let labels = [(STREAM_LABEL, stream)];
                    let family = metric_encoder.encode_family(&labels)?;
                    encode_value(descriptor.kind, sample.value, family)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use nr_core::Error;
    use prometheus_client::encoding::text::encode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_support::{NOT_XML, SPECIAL_NAME_XML, STATUS_XML};

    /// Replies with a fixed body or HTTP status
    #[derive(Debug)]
    struct FixedSource(std::result::Result<&'static str, u16>);

    #[async_trait]
    impl StatusSource for FixedSource {
        async fn fetch(&self) -> Result<Bytes> {
            match self.0 {
                Ok(body) => Ok(Bytes::from_static(body.as_bytes())),
                Err(code) => Err(Error::Status(code)),
            }
        }
    }

    /// Records how many fetches overlap
    #[derive(Debug, Default)]
    struct SlowSource {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StatusSource for SlowSource {
        async fn fetch(&self) -> Result<Bytes> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(50)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Bytes::from_static(STATUS_XML.as_bytes()))
        }
    }

    fn exporter(source: impl StatusSource + 'static) -> Exporter {
        Exporter::with_source(source, StreamNameNormalizer::default())
    }

    fn render(exporter: &Exporter, samples: Vec<Sample>) -> String {
        let mut registry = Registry::default();
        SnapshotCollector::new(exporter.descriptors().clone(), samples).register(&mut registry);
        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        buffer
    }

    #[test]
    fn test_describe_is_static() {
        let exporter = exporter(FixedSource(Err(500)));
        let described: Vec<_> = exporter.describe().collect();
        assert_eq!(described.len(), 11);
        assert_eq!(
            described
                .iter()
                .filter(|d| d.labels.contains(&STREAM_LABEL))
                .count(),
            5
        );
    }

    #[tokio::test]
    async fn test_collect_full_snapshot() {
        let exporter = exporter(FixedSource(Ok(STATUS_XML)));
        let report = exporter.scrape().await;

        assert!(report.is_success());
        // 6 server samples + 5 per stream
        assert_eq!(report.samples.len(), 6 + 2 * 5);

        let current = report
            .samples
            .iter()
            .find(|s| s.descriptor == exporter.descriptors().server_current_streams)
            .unwrap();
        assert_eq!(current.value, 2.0);

        let stream_names: Vec<_> = report
            .samples
            .iter()
            .filter(|s| s.descriptor == exporter.descriptors().stream_uptime)
            .map(|s| (s.stream.clone().unwrap(), s.value))
            .collect();
        assert_eq!(
            stream_names,
            vec![
                ("live-cam_1a2b3c".to_string(), 1.5),
                ("backup-cam_1a2b3c".to_string(), 3.0)
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_emits_nothing() {
        let exporter = exporter(FixedSource(Err(500)));
        let report = exporter.scrape().await;
        assert!(report.samples.is_empty());
        assert_eq!(report.failure, Some(ScrapeFailure::Fetch));
    }

    #[tokio::test]
    async fn test_parse_failure_emits_nothing() {
        let exporter = exporter(FixedSource(Ok(NOT_XML)));
        let report = exporter.scrape().await;
        assert!(report.samples.is_empty());
        assert_eq!(report.failure, Some(ScrapeFailure::Parse));
        assert!(exporter.collect().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_scrapes_do_not_overlap() {
        let source = Arc::new(SlowSource::default());

        #[derive(Debug)]
        struct Shared(Arc<SlowSource>);

        #[async_trait]
        impl StatusSource for Shared {
            async fn fetch(&self) -> Result<Bytes> {
                self.0.fetch().await
            }
        }

        let exporter = Arc::new(exporter(Shared(source.clone())));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let exporter = exporter.clone();
                tokio::spawn(async move { exporter.collect().await })
            })
            .collect();

        for handle in handles {
            let samples = handle.await.unwrap();
            assert_eq!(samples.len(), 16);
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_collector_text_encoding() {
        let exporter = exporter(FixedSource(Ok(STATUS_XML)));
        let samples = exporter.collect().await;
        let text = render(&exporter, samples);

        assert!(text.contains("# TYPE nginx_rtmp_server_incoming_bytes counter"));
        assert!(text.contains("nginx_rtmp_server_incoming_bytes_total 734003200"));
        assert!(text.contains("nginx_rtmp_server_receive_bytes 2.0"));
        assert!(text.contains("nginx_rtmp_server_uptime_seconds_total 1500"));
        assert!(text.contains("nginx_rtmp_server_current_streams 2"));
        assert!(text.contains("nginx_rtmp_stream_receive_bytes{stream=\"live-cam_1a2b3c\"} 1.0"));
        assert!(text.contains(
            "nginx_rtmp_stream_uptime_seconds_total{stream=\"backup-cam_1a2b3c\"} 3.0"
        ));
        // Each family header appears once even with several streams
        assert_eq!(
            text.matches("# TYPE nginx_rtmp_stream_outgoing_bytes counter")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_stream_label_is_escaped() {
        let exporter = exporter(FixedSource(Ok(SPECIAL_NAME_XML)));
        let samples = exporter.collect().await;
        assert_eq!(samples[6].stream.as_deref(), Some("live-a\"b\\c\nd"));

        let text = render(&exporter, samples);
        assert!(text.contains(
            r#"nginx_rtmp_stream_incoming_bytes_total{stream="live-a\"b\\c\nd"} 5"#
        ));
        // Every sample still sits on a single line
        assert!(text
            .lines()
            .filter(|l| l.starts_with("nginx_rtmp_stream_"))
            .all(|l| l.contains("{stream=\"live-a")));
    }

    #[tokio::test]
    async fn test_collector_empty_on_failure() {
        let exporter = exporter(FixedSource(Err(502)));
        let samples = exporter.collect().await;
        let text = render(&exporter, samples);
        assert!(!text.contains("nginx_rtmp_"));
        assert!(text.ends_with("# EOF\n"));
    }
}
