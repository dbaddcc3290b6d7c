//! ABOUTME: NGINX-RTMP status scraping pipeline
//! ABOUTME: Fetches the stat page, parses it and turns it into metric samples

pub mod descriptors;
pub mod exporter;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod units;

pub use descriptors::{Descriptors, MetricDescriptor, MetricKind, Subsystem, NAMESPACE};
pub use exporter::{Exporter, Sample, ScrapeFailure, ScrapeReport, SnapshotCollector};
pub use fetch::{HttpStatusSource, StatusSource};
pub use model::{ServerInfo, Snapshot, StreamInfo};
pub use normalize::StreamNameNormalizer;
pub use parser::parse_status;
