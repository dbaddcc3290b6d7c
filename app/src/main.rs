use clap::Parser;
use nr_config::{Config, Overrides};
use nr_core::telemetry;
use nr_obs::ObsState;
use nr_rtmp::{Exporter, StreamNameNormalizer};
use std::path::PathBuf;
use std::process;

/// Prometheus exporter for NGINX-RTMP statistics
#[derive(Debug, Parser)]
#[command(name = "nginx_rtmp_exporter", version, about)]
struct Args {
    /// Optional configuration file (toml, yaml or json)
    #[arg(long = "config.file")]
    config_file: Option<PathBuf>,

    /// Address to listen on for web interface and telemetry
    #[arg(long = "web.listen-address")]
    listen_address: Option<String>,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path")]
    telemetry_path: Option<String>,

    /// URI on which to scrape NGINX-RTMP stats
    #[arg(long = "nginxrtmp.scrape-uri")]
    scrape_uri: Option<String>,

    /// Timeout for trying to get stats from NGINX-RTMP, e.g. 5s
    #[arg(long = "nginxrtmp.timeout")]
    timeout: Option<String>,

    /// Regex applied to stream names to build the stream label
    #[arg(long = "nginxrtmp.regex")]
    stream_name_pattern: Option<String>,

    /// Only log messages with the given severity or above
    #[arg(long = "log.level")]
    log_level: Option<String>,

    /// Output format of log messages: pretty or json
    #[arg(long = "log.format")]
    log_format: Option<String>,
}

impl From<Args> for Overrides {
    fn from(args: Args) -> Self {
        Overrides {
            config_file: args.config_file,
            listen_address: args.listen_address,
            telemetry_path: args.telemetry_path,
            scrape_uri: args.scrape_uri,
            scrape_timeout: args.timeout,
            stream_name_pattern: args.stream_name_pattern,
            log_level: args.log_level,
            log_format: args.log_format,
        }
    }
}

fn build_exporter(config: &Config) -> nr_core::Result<Exporter> {
    let normalizer = StreamNameNormalizer::new(&config.scrape.stream_name_pattern)?;
    let timeout = config.scrape_timeout()?;
    Exporter::new(config.scrape.uri.clone(), timeout, normalizer)
}

#[tokio::main]
async fn main() {
    let overrides = Overrides::from(Args::parse());

    // Load configuration - exit with non-zero if invalid
    let config = match Config::load_with(&overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    telemetry::init_tracing(&config.log.format, &config.log.level, "nginx_rtmp_exporter");
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting nginx_rtmp_exporter");
    tracing::debug!(?config, "Configuration loaded successfully");

    let exporter = match build_exporter(&config) {
        Ok(exporter) => exporter,
        Err(e) => {
            tracing::error!("Error creating an exporter: {}", e);
            process::exit(1);
        }
    };

    tracing::info!(
        scrape_uri = %config.scrape.uri,
        timeout = %config.scrape.timeout,
        pattern = %config.scrape.stream_name_pattern,
        "Exporter configured"
    );

    let state = ObsState::new(exporter, config.web.telemetry_path.clone());
    if let Err(e) = nr_obs::start_server(&config.web.listen_address, state).await {
        tracing::error!("Error starting HTTP server: {}", e);
        process::exit(1);
    }
}
