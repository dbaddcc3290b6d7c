//! ABOUTME: HTTP surface exposing the exporter's metrics
//! ABOUTME: Serves the metrics path, a health check and a landing page

use actix_web::{
    dev::{ServiceRequest, ServiceResponse},
    middleware::Logger,
    web, App, HttpResponse, HttpServer, Result as ActixResult,
};
use nr_core::Result;
use nr_rtmp::{Descriptors, Exporter, Sample, ScrapeReport, SnapshotCollector};
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family, gauge::Gauge, histogram::Histogram},
    registry::Registry,
};
use serde_json::json;
use std::sync::Arc;

/// Prefix of the exporter's own metrics
const SELF_PREFIX: &str = "nginx_rtmp_exporter";

type Labels = Vec<(String, String)>;

/// The exporter's own bookkeeping, kept apart from the scraped snapshot
#[derive(Debug)]
pub struct Metrics {
    scrapes_total: Counter,
    scrape_errors_total: Family<Labels, Counter>,
    scrape_duration_seconds: Histogram,
    build_info: Family<Labels, Gauge>,
}

impl Metrics {
    pub fn new() -> Self {
        let build_info = Family::<Labels, Gauge>::default();
        build_info
            .get_or_create(&vec![(
                "version".to_string(),
                env!("CARGO_PKG_VERSION").to_string(),
            )])
            .set(1);

        Self {
            scrapes_total: Counter::default(),
            scrape_errors_total: Family::default(),
            scrape_duration_seconds: Histogram::new(
                [0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0].into_iter(),
            ),
            build_info,
        }
    }

    /// Record the outcome of one scrape
    pub fn observe_scrape(&self, report: &ScrapeReport) {
        self.scrapes_total.inc();
        self.scrape_duration_seconds
            .observe(report.duration.as_secs_f64());
        if let Some(failure) = report.failure {
            self.scrape_errors_total
                .get_or_create(&vec![("kind".to_string(), failure.as_str().to_string())])
                .inc();
        }
    }

    /// Encode the exporter's own metrics together with one scrape's samples
    pub fn render(&self, descriptors: &Descriptors, samples: Vec<Sample>) -> Result<String> {
        let mut registry = Registry::default();

        let own = registry.sub_registry_with_prefix(SELF_PREFIX);
        own.register(
            "scrapes",
            "Total number of scrapes of the NGINX-RTMP status page",
            self.scrapes_total.clone(),
        );
        own.register(
            "scrape_errors",
            "Total number of failed scrapes by failure kind",
            self.scrape_errors_total.clone(),
        );
        own.register(
            "scrape_duration_seconds",
            "Duration of scrapes of the NGINX-RTMP status page",
            self.scrape_duration_seconds.clone(),
        );
        own.register(
            "build_info",
            "Version of the exporter, always 1",
            self.build_info.clone(),
        );

        SnapshotCollector::new(descriptors.clone(), samples).register(&mut registry);

        let mut buffer = String::new();
        encode(&mut buffer, &registry)
            .map_err(|e| nr_core::Error::Config(format!("Failed to encode metrics: {}", e)))?;

        Ok(buffer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state for the HTTP endpoints
#[derive(Debug, Clone)]
pub struct ObsState {
    pub exporter: Arc<Exporter>,
    pub metrics: Arc<Metrics>,
    pub telemetry_path: String,
}

impl ObsState {
    pub fn new(exporter: Exporter, telemetry_path: impl Into<String>) -> Self {
        Self {
            exporter: Arc::new(exporter),
            metrics: Arc::new(Metrics::new()),
            telemetry_path: telemetry_path.into(),
        }
    }
}

/// Health endpoint handler
async fn health() -> ActixResult<HttpResponse> {
    tracing::debug!("Health check requested");
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok"
    })))
}

/// Landing page linking to the metrics path
async fn index(state: web::Data<ObsState>) -> ActixResult<HttpResponse> {
    let body = format!(
        "<html>\n<head><title>NGINX-RTMP exporter</title></head>\n<body>\n\
         <h1>NGINX-RTMP exporter</h1>\n<p><a href='{}'>Metrics</a></p>\n</body>\n</html>\n",
        state.telemetry_path
    );
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body))
}

/// Metrics endpoint handler; every request triggers a fresh scrape
async fn metrics(state: web::Data<ObsState>) -> ActixResult<HttpResponse> {
    tracing::debug!("Metrics scrape requested");

    let report = state.exporter.scrape().await;
    state.metrics.observe_scrape(&report);

    match state
        .metrics
        .render(state.exporter.descriptors(), report.samples)
    {
        Ok(metrics_text) => {
            tracing::debug!("Metrics encoded successfully, {} bytes", metrics_text.len());
            Ok(HttpResponse::Ok()
                .content_type("text/plain; version=0.0.4; charset=utf-8")
                .body(metrics_text))
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to encode metrics"
            })))
        }
    }
}

/// Create the HTTP service factory
pub fn create_service(
    state: ObsState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let telemetry_path = state.telemetry_path.clone();
    App::new()
        .app_data(web::Data::new(state))
        .wrap(Logger::default())
        .route(&telemetry_path, web::get().to(metrics))
        .route("/healthz", web::get().to(health))
        .route("/", web::get().to(index))
}

/// Start the HTTP server
pub async fn start_server(bind_addr: &str, state: ObsState) -> Result<()> {
    tracing::info!(
        address = %bind_addr,
        telemetry_path = %state.telemetry_path,
        "Listening on address"
    );

    HttpServer::new(move || create_service(state.clone()))
        .bind(bind_addr)
        .map_err(|e| nr_core::Error::Config(format!("Failed to bind server: {}", e)))?
        .run()
        .await?;

    Ok(())
}
