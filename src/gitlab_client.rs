//! Client filing issues at the gitlab api.
//!
//! Exactly one request is made per issue. The answer of gitlab is handed back
//! untouched, its status code is only logged and recorded, never treated as a
//! failure.
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;

use crate::{
    error::{Error, Result},
    issue::IssueRequest,
    settings::Settings,
    telemetry_endpoint::Metrics,
};

/// header gitlab reads personal/project access tokens from
pub const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

#[derive(Clone)]
pub struct IssueDispatcher {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl IssueDispatcher {
    /// Build a dispatcher for the gitlab project in `settings`.
    ///
    /// Certificate verification of the gitlab instance is only done if
    /// `tlsVerify` is set, requests time out after `requestTimeout`.
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!settings.tls_verify)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| Error::Config(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            url: settings.issues_url(),
            token: settings.gitlab_access_token.clone(),
        })
    }

    /// endpoint issues are posted to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post `issue` and return the raw response body.
    ///
    /// Only transport errors (connect, tls, timeout, reading the body) are
    /// returned as [Error::Dispatch].
    pub async fn dispatch(&self, issue: &IssueRequest) -> Result<Bytes> {
        let metrics = Metrics::global();
        let body = issue.to_json()?;

        let _timer = metrics.dispatch_duration.start_timer();

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(PRIVATE_TOKEN_HEADER, &self.token)
            .body(body)
            .send()
            .await
            .map_err(Error::Dispatch)?;

        let status = response.status();
        metrics
            .forwarded_issues
            .with_label_values(&[status.as_str()])
            .inc();

        if !status.is_success() {
            tracing::warn!(%status, url = %self.url, "gitlab did not accept issue");
        }

        response.bytes().await.map_err(Error::Dispatch)
    }
}

impl std::fmt::Debug for IssueDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueDispatcher")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
