// self
use crate::{_prelude::*, obs::OperationKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// A span builder used by gateway operations.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the provided operation kind + stage.
	pub fn new(kind: OperationKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("lbs_gateway.operation", operation = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a failed operation; unhandled failures go out at `error`, client-caused ones at `debug`.
pub fn log_operation_failure(kind: OperationKind, error: &Error) {
	#[cfg(feature = "tracing")]
	match error {
		Error::MissingParameter { .. } | Error::InvalidPath { .. } | Error::RouteNotFound { .. } =>
			tracing::debug!(operation = kind.as_str(), %error, "Rejected client request."),
		Error::Unauthorized { .. } | Error::UpstreamAuth(_) =>
			tracing::info!(operation = kind.as_str(), %error, "Upstream rejected the request."),
		Error::Unreachable(_) | Error::Protocol(_) =>
			tracing::warn!(operation = kind.as_str(), %error, "Upstream call failed."),
		Error::Config(_) | Error::Internal { .. } =>
			tracing::error!(operation = kind.as_str(), ?error, "Unhandled gateway failure."),
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, error);
	}
}

/// Installs the global `tracing-subscriber` formatter.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to this crate and `tower_http`.
#[cfg(feature = "tracing")]
pub fn init_logging(default_level: &str) {
	use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(format!("lbs_gateway={default_level},tower_http={default_level},warn"))
	});
	let _ = tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).try_init();
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OperationSpan::new(OperationKind::Forward, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}

	#[test]
	fn logging_failures_never_panics() {
		log_operation_failure(OperationKind::Verify, &Error::internal("boom"));
		log_operation_failure(OperationKind::Login, &Error::MissingParameter { field: "code" });
	}
}
