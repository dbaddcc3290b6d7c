//! ABOUTME: Numeric conversions for fields read from the status page
//! ABOUTME: Unparsable input always collapses to zero

/// Bits per second in one megabyte per second, as NGINX-RTMP reports `bw_*`.
pub const BITS_PER_MEGABYTE: f64 = 1_048_576.0;

/// Milliseconds in a second; stream `time` is reported in milliseconds.
pub const MILLIS_PER_SECOND: f64 = 1_000.0;

/// Parse a numeric field, yielding 0 when it is empty or not a number.
pub fn parse_number(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(0.0)
}

/// Convert a `bw_in`/`bw_out` value into megabytes per second.
pub fn megabytes_per_second(raw: &str) -> f64 {
    parse_number(raw) / BITS_PER_MEGABYTE
}

/// Convert a millisecond duration into seconds.
pub fn seconds_from_millis(raw: &str) -> f64 {
    parse_number(raw) / MILLIS_PER_SECOND
}
