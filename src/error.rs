//! errors that can occur while relaying an alert
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
	/// settings missing or malformed, fatal at startup
	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("failed to read request body: {0}")]
	Body(#[source] axum::Error),

	/// inbound payload is not the json shape alertmanager sends
	#[error("failed to decode alert: {0}")]
	Decode(#[source] serde_json::Error),

	/// payload decoded but can't be turned into an issue
	#[error("invalid alert: {0}")]
	Validation(&'static str),

	#[error("failed to encode issue: {0}")]
	Encode(#[source] serde_json::Error),

	/// transport level failure talking to gitlab
	#[error("failed to send issue to gitlab: {0}")]
	Dispatch(#[source] reqwest::Error),

	#[error("request to gitlab was interrupted: {0}")]
	Interrupted(#[source] tokio::task::JoinError),
}

impl Error {
	/// label used for the failed request metric
	pub fn stage(&self) -> &'static str {
		match self {
			Error::Config(_) => "config",
			Error::Body(_) => "body",
			Error::Decode(_) => "decode",
			Error::Validation(_) => "validation",
			Error::Encode(_) => "encode",
			Error::Dispatch(_) | Error::Interrupted(_) => "dispatch",
		}
	}
}

impl From<config::ConfigError> for Error {
	fn from(err: config::ConfigError) -> Self {
		Error::Config(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
