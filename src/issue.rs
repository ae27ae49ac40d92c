//! Turns alert notifications into gitlab issues.
//!
//! The issue text layout is relied upon by people filtering issue lists, keep
//! it stable.
use serde::{Deserialize, Serialize};

use crate::{alert, error::Result};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
/// body of a gitlab "new issue" request
pub struct IssueRequest {
	pub title: String,
	pub description: String,
}

impl IssueRequest {
	/// Render an issue for an alert notification.
	///
	/// Start, end and generator url are taken from the first alert, everything
	/// else from the common labels and annotations. Values are inserted
	/// verbatim, empty ones included.
	///
	/// # Arguments
	///
	/// * `data` - a notification with at least one alert, see
	///   [alert::Data::validate]
	pub fn from_alert(data: &alert::Data) -> Result<Self> {
		let first = data.first_alert()?;
		let labels = &data.common_labels;
		let annotations = &data.common_annotations;

		let title = format!(
			"ALERTMANAGER -> Namespace:{} Node:{}",
			labels.namespace, labels.node
		);

		let mut description = format!(
			"Service: {}\n\n AlertName: {}\n\n Receiver: {}\n\n Status: {}\n\n StartTime: {}\n\n EndTime: {}\n\n",
			labels.service, labels.alertname, data.receiver, data.status, first.starts_at, first.ends_at,
		);
		description.push_str(&format!(
			"generatorURL: {}\n\n Description: {}\n\n Summary: {}\n\n",
			first.generator_url, annotations.description, annotations.summary,
		));

		Ok(Self { title, description })
	}

	pub fn to_json(&self) -> Result<Vec<u8>> {
		serde_json::to_vec(self).map_err(crate::error::Error::Encode)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		alert::{Alert, CommonAnnotations, CommonLabels, Data},
		error::Error,
	};

	fn notification() -> Data {
		Data {
			receiver: "r".to_string(),
			status: "firing".to_string(),
			alerts: vec![
				Alert {
					starts_at: "t1".to_string(),
					ends_at: "t2".to_string(),
					generator_url: "u".to_string(),
				},
				Alert {
					starts_at: "later".to_string(),
					ends_at: "later".to_string(),
					generator_url: "other".to_string(),
				},
			],
			common_annotations: CommonAnnotations {
				description: "d".to_string(),
				summary: "s".to_string(),
			},
			common_labels: CommonLabels {
				alertname: "a".to_string(),
				namespace: "ns".to_string(),
				node: "n".to_string(),
				service: "svc".to_string(),
				severity: "crit".to_string(),
			},
		}
	}

	#[test]
	fn renders_issue_from_first_alert() {
		let issue = IssueRequest::from_alert(&notification()).unwrap();

		assert_eq!(issue.title, "ALERTMANAGER -> Namespace:ns Node:n");
		assert_eq!(
			issue.description,
			"Service: svc\n\n AlertName: a\n\n Receiver: r\n\n Status: firing\n\n StartTime: t1\n\n EndTime: t2\n\n\
			generatorURL: u\n\n Description: d\n\n Summary: s\n\n"
		);
		assert!(!issue.description.contains("crit"));
		assert!(!issue.description.contains("later"));
	}

	#[test]
	fn empty_values_are_kept() {
		let mut data = Data {
			alerts: vec![Alert::default()],
			..Data::default()
		};
		data.common_labels.node = "  padded ".to_string();

		let issue = IssueRequest::from_alert(&data).unwrap();

		assert_eq!(issue.title, "ALERTMANAGER -> Namespace: Node:  padded ");
		assert!(issue.description.starts_with("Service: \n\n AlertName: \n\n"));
		assert!(issue.description.ends_with(" Summary: \n\n"));
	}

	#[test]
	fn refuses_notification_without_alerts() {
		let data = Data {
			alerts: vec![],
			..notification()
		};

		assert!(matches!(
			IssueRequest::from_alert(&data),
			Err(Error::Validation(_))
		));
	}

	#[test]
	fn json_has_exactly_title_and_description() {
		let issue = IssueRequest::from_alert(&notification()).unwrap();
		let value: serde_json::Value = serde_json::from_slice(&issue.to_json().unwrap()).unwrap();
		let object = value.as_object().unwrap();

		assert_eq!(object.len(), 2);
		assert_eq!(object["title"], issue.title.as_str());
		assert_eq!(object["description"], issue.description.as_str());

		let decoded: IssueRequest = serde_json::from_value(value).unwrap();
		assert_eq!(decoded, issue);
	}
}
