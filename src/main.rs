use std::sync::Arc;

use alertlab::{alertmanager_webhook_receiver, log, settings::Settings, telemetry_endpoint};
use anyhow::{Context, Result};

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	// tracing isn't setup yet, errors end up on stderr through anyhow
	let settings = Arc::new(Settings::load().context("failed to load config and command line arguments")?);

	log::setup_logging(&settings.log).context("could not setup logging")?;

	tracing::info!("start webhook for alerting");
	tracing::debug!("{:?}", settings);

	if let Some(telemetry) = settings.telemetry_endpoint.clone() {
		tokio::spawn(async move {
			#[allow(clippy::expect_used)]
			telemetry_endpoint::run_telemetry_endpoint(telemetry)
				.await
				.expect("telemetry endpoint failed to start or crashed");
		});
	}

	alertmanager_webhook_receiver::run_alertmanager_receiver(settings).await
}
