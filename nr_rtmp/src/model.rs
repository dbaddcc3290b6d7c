//! ABOUTME: Server and stream records extracted from one status page
//! ABOUTME: Rebuilt from scratch on every scrape, never merged

/// Counters for the whole RTMP server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerInfo {
    /// Total bytes received by the server
    pub bytes_in: f64,
    /// Total bytes sent by the server
    pub bytes_out: f64,
    /// Current inbound bandwidth, megabytes per second
    pub receive_bytes: f64,
    /// Current outbound bandwidth, megabytes per second
    pub transmit_bytes: f64,
    /// Server uptime in seconds
    pub uptime_seconds: f64,
    /// Number of streams found on the page
    pub current_streams: usize,
}

/// Counters for a single stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamInfo {
    /// Normalized name, prefixed with the application when known
    pub name: String,
    pub bytes_in: f64,
    pub bytes_out: f64,
    /// Megabytes per second
    pub receive_bytes: f64,
    /// Megabytes per second
    pub transmit_bytes: f64,
    pub uptime_seconds: f64,
}

/// Everything one scrape learned about the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub server: ServerInfo,
    /// Streams in document order
    pub streams: Vec<StreamInfo>,
}

impl Snapshot {
    pub fn new(mut server: ServerInfo, streams: Vec<StreamInfo>) -> Self {
        server.current_streams = streams.len();
        Self { server, streams }
    }
}
