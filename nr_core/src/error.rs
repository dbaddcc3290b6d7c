/// Core error type for the exporter
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Fetch timed out: {0}")]
    Timeout(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors raised while talking to the status endpoint
    pub fn is_fetch(&self) -> bool {
        matches!(self, Error::Fetch(_) | Error::Timeout(_) | Error::Status(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Config(format!("invalid stream name pattern: {}", err))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_classification() {
        assert!(Error::Fetch("connection refused".into()).is_fetch());
        assert!(Error::Timeout("5s".into()).is_fetch());
        assert!(Error::Status(500).is_fetch());
        assert!(!Error::Parse("bad xml".into()).is_fetch());
        assert!(!Error::Config("bad".into()).is_fetch());
    }

    #[test]
    fn test_regex_error_is_config() {
        let err: Error = regex::Regex::new("(unclosed").unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("invalid stream name pattern"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Error::Status(503).to_string(), "Unexpected HTTP status 503");
    }
}
