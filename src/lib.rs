//! prometheus alertmanager receiver that files alerts as gitlab issues
//!
//! Features:
//! - one gitlab issue per alertmanager notification
//! - optional tls termination for the webhook endpoint
//! - prometheus metrics about received and forwarded alerts

pub mod alert;
pub mod alertmanager_webhook_receiver;
pub mod error;
pub mod gitlab_client;
pub mod issue;
pub mod log;
pub mod settings;
pub mod telemetry_endpoint;
