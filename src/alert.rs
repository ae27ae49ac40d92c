//! data structures for deserializing incoming alerts
//!
//! Only the fields needed to file an issue are kept, everything else
//! alertmanager sends is ignored. Missing fields decode to empty strings, all
//! values are passed through as received, `null` is read as empty.
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::error::{Error, Result};

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
/// notification posted by the alertmanager webhook
pub struct Data {
	#[serde_as(as = "DefaultOnNull")]
	pub receiver: String,
	#[serde_as(as = "DefaultOnNull")]
	pub status: String,
	#[serde_as(as = "DefaultOnNull")]
	pub alerts: Vec<Alert>,
	#[serde_as(as = "DefaultOnNull")]
	pub common_annotations: CommonAnnotations,
	#[serde_as(as = "DefaultOnNull")]
	pub common_labels: CommonLabels,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
/// a single alert of a notification. timestamps are not parsed
pub struct Alert {
	#[serde_as(as = "DefaultOnNull")]
	pub starts_at: String,
	#[serde_as(as = "DefaultOnNull")]
	pub ends_at: String,
	#[serde_as(as = "DefaultOnNull")]
	#[serde(rename = "generatorURL")]
	pub generator_url: String,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommonAnnotations {
	#[serde_as(as = "DefaultOnNull")]
	pub description: String,
	#[serde_as(as = "DefaultOnNull")]
	pub summary: String,
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommonLabels {
	#[serde_as(as = "DefaultOnNull")]
	pub alertname: String,
	#[serde_as(as = "DefaultOnNull")]
	pub namespace: String,
	#[serde_as(as = "DefaultOnNull")]
	pub node: String,
	#[serde_as(as = "DefaultOnNull")]
	pub service: String,
	/// accepted but not part of the issue
	#[serde_as(as = "DefaultOnNull")]
	pub severity: String,
}

impl Data {
	/// Decode a webhook body.
	///
	/// Fails with [Error::Decode] on malformed json or a type mismatch and with
	/// [Error::Validation] if the notification carries no alerts.
	pub fn decode(raw: &[u8]) -> Result<Self> {
		let data: Data = serde_json::from_slice(raw).map_err(Error::Decode)?;
		data.validate()?;

		Ok(data)
	}

	/// the issue is built from the first alert, so there has to be one
	pub fn validate(&self) -> Result<()> {
		if self.alerts.is_empty() {
			return Err(Error::Validation("notification contains no alerts"));
		}

		Ok(())
	}

	/// first alert of the notification
	pub fn first_alert(&self) -> Result<&Alert> {
		self.alerts
			.first()
			.ok_or(Error::Validation("notification contains no alerts"))
	}
}
