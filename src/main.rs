//! lbs-gateway binary: load configuration, install logging, serve.

// std
use std::process::ExitCode;
// self
use lbs_gateway::{
	config::{Args, GatewayConfig},
	obs, server,
};

#[tokio::main]
async fn main() -> ExitCode {
	let args = Args::load();

	obs::init_logging(&args.log_level);

	let config = match GatewayConfig::try_from(args) {
		Ok(config) => config,
		Err(e) => {
			tracing::error!(error = %e, "Configuration error.");

			return ExitCode::FAILURE;
		},
	};

	tracing::info!(
		service = %config.service_name,
		identity = %config.identity_base_url,
		lbs = %config.lbs_base_url,
		cache_app_credential = config.cache_app_credential,
		"Starting gateway."
	);

	match server::serve(config).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!(error = ?e, "Gateway stopped with an error.");

			ExitCode::FAILURE
		},
	}
}
