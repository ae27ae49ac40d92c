//! Here we expose prometheus metrics about alertlab
use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use once_cell::sync::Lazy;
use prometheus::{
    exponential_buckets, histogram_opts, opts, register_histogram, register_int_counter,
    register_int_counter_vec, Encoder, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryEndpointSettings {
    #[serde(rename = "bindAddress", alias = "bindaddress", alias = "bind_address")]
    pub bind_address: IpAddr,
    pub port: u16,
}

impl TelemetryEndpointSettings {
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// meters recorded by the webhook receiver and the gitlab client
pub struct Metrics {
    /// successfully decoded alert notifications
    pub received_alerts: IntCounter,
    /// requests answered with an error, by pipeline stage
    pub failed_requests: IntCounterVec,
    /// issues gitlab answered for, by status code
    pub forwarded_issues: IntCounterVec,
    pub dispatch_duration: Histogram,
}

impl Metrics {
    fn new() -> Result<Self, prometheus::Error> {
        let received_alerts = register_int_counter!(opts!(
            "received_alerts",
            "total number of deserialized alert notifications"
        )
        .namespace("alertlab")
        .subsystem("alertmanager_webhook"))?;

        let failed_requests = register_int_counter_vec!(
            opts!("failed_requests", "requests answered with an error")
                .namespace("alertlab")
                .subsystem("alertmanager_webhook"),
            &["stage"]
        )?;

        let forwarded_issues = register_int_counter_vec!(
            opts!("forwarded_issues", "issues sent to gitlab")
                .namespace("alertlab")
                .subsystem("gitlab"),
            &["status_code"]
        )?;

        let dispatch_duration = register_histogram!(histogram_opts!(
            "request_duration_seconds",
            "total time of a gitlab request in seconds",
            exponential_buckets(0.01, 2., 12)?
        )
        .namespace("alertlab")
        .subsystem("gitlab"))?;

        Ok(Self {
            received_alerts,
            failed_requests,
            forwarded_issues,
            dispatch_duration,
        })
    }

    pub fn global() -> &'static Self {
        static METRICS: Lazy<Metrics> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Metrics::new().expect("failed to register prometheus metrics")
        });

        &METRICS
    }
}

async fn metrics_handler() -> Response {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {:?}", err);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    ([(CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response()
}

pub fn router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_telemetry_endpoint(settings: TelemetryEndpointSettings) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(settings.to_socket_addr())
        .await
        .context("failed to bind telemetry endpoint")?;

    axum::serve(listener, router())
        .await
        .context("telemetry endpoint crashed")?;

    Ok(())
}
