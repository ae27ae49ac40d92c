//! Webhook endpoint alertmanager posts notifications to.
//!
//! Every request runs through the same pipeline: read body, decode, render the
//! issue, send it to gitlab. The first failing stage ends the request with a
//! 500 carrying the error message.
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Extension, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use bytes::Bytes;
use tokio::net::TcpListener;

use crate::{
    alert,
    error::{self, Error},
    gitlab_client::IssueDispatcher,
    issue::IssueRequest,
    settings::Settings,
    telemetry_endpoint::Metrics,
};

#[derive(Debug)]
pub struct State {
    dispatcher: IssueDispatcher,
}

impl State {
    pub fn new(settings: &Settings) -> error::Result<Self> {
        Ok(Self {
            dispatcher: IssueDispatcher::new(settings)?,
        })
    }
}

/// largest notification body accepted, bigger ones fail with [Error::Body]
pub const MAX_BODY_LEN: usize = 8 * 1024 * 1024;

async fn alertmanager_receiver(
    Extension(state): Extension<Arc<State>>,
    request: Request,
) -> Response {
    // the pipeline runs to completion and records its outcome even if
    // alertmanager hangs up before we answer
    let outcome = tokio::spawn(async move {
        let outcome = relay(&state, request.into_body()).await;
        record(&outcome);
        outcome
    })
    .await
    .unwrap_or_else(|err| {
        let err = Error::Interrupted(err);
        record_failure(&err);
        Err(err)
    });

    match outcome {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {err}\n")).into_response()
        }
    }
}

fn record(outcome: &error::Result<Bytes>) {
    match outcome {
        Ok(response) => tracing::info!(
            "response from gitlab: {}",
            String::from_utf8_lossy(response)
        ),
        Err(err) => record_failure(err),
    }
}

fn record_failure(err: &Error) {
    Metrics::global()
        .failed_requests
        .with_label_values(&[err.stage()])
        .inc();
    tracing::error!("failed to relay alert: {:?}", err);
}

async fn relay(state: &State, body: Body) -> error::Result<Bytes> {
    let raw = axum::body::to_bytes(body, MAX_BODY_LEN)
        .await
        .map_err(Error::Body)?;

    tracing::debug!("receiving: {}", String::from_utf8_lossy(&raw));

    let alert = alert::Data::decode(&raw)?;
    Metrics::global().received_alerts.inc();

    let issue = IssueRequest::from_alert(&alert)?;

    state.dispatcher.dispatch(&issue).await
}

/// router with the webhook bound to `/`, other paths end up at the same handler
pub fn router(state: State) -> Router {
    Router::new()
        .route("/", any(alertmanager_receiver))
        .fallback(alertmanager_receiver)
        .layer(Extension(Arc::new(state)))
}

/// Serve the webhook receiver, terminating tls if `sslEnabled` is set.
///
/// Only returns if binding the listener failed or the server crashed.
pub async fn run_alertmanager_receiver(settings: Arc<Settings>) -> Result<()> {
    let addr = settings.listen_addr()?;
    let state = State::new(&settings).context("failed to construct webhook receiver")?;
    let app = router(state);

    tracing::info!(
        "forwarding alerts received on {} to {}",
        addr,
        settings.issues_url()
    );

    if settings.ssl_enabled {
        let (cert, key) = settings
            .tls_files()
            .context("sslEnabled requires sslCertFileName and sslKeyFileName")?;
        let tls = RustlsConfig::from_pem_file(cert, key)
            .await
            .context("failed to load tls certificate or key")?;

        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service())
            .await
            .context("alertmanager endpoint crashed")?;
    } else {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        axum::serve(listener, app)
            .await
            .context("alertmanager endpoint crashed")?;
    }

    Ok(())
}
