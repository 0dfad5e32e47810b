//! Single translation point from [`Error`] to the outward status + envelope.

// crates.io
use reqwest::StatusCode;
use serde_json::json;
// self
use crate::{
	_prelude::*,
	envelope::Envelope,
	error::{TransportError, UpstreamError},
};

/// Envelope code used for server-side failures.
pub const INTERNAL_CODE: i64 = -1;

/// Outward rendering of an [`Error`].
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedError {
	/// HTTP status to send.
	pub status: StatusCode,
	/// JSON body to send.
	pub envelope: Envelope<Value>,
}

/// Maps `error` to its HTTP status and envelope.
///
/// Authentication failures stay on 400, timeouts map to 408, and anything the client cannot act
/// on becomes a 500 with a stable generic message. Provider payloads are kept in `data`.
pub fn normalize(error: &Error) -> NormalizedError {
	let (status, envelope) = match error {
		Error::MissingParameter { field } => (
			StatusCode::BAD_REQUEST,
			Envelope::failure(400, format!("Missing required parameter: {field}."), Value::Null),
		),
		Error::InvalidPath { path } => (
			StatusCode::BAD_REQUEST,
			Envelope::failure(400, "Request path is not allowed.", json!({ "path": path })),
		),
		Error::Unauthorized { reason, upstream } => {
			let (code, data) = match upstream {
				Some(upstream) => (upstream.errcode, upstream.raw.clone()),
				None => (400, Value::Null),
			};

			(StatusCode::BAD_REQUEST, Envelope::failure(code, format!("Unauthorized: {reason}"), data))
		},
		Error::UpstreamAuth(upstream) => (StatusCode::BAD_REQUEST, upstream_envelope(upstream)),
		Error::Unreachable(TransportError::Timeout { .. }) => (
			StatusCode::REQUEST_TIMEOUT,
			Envelope::failure(408, "Upstream request timed out.", Value::Null),
		),
		Error::Unreachable(_) => (
			StatusCode::INTERNAL_SERVER_ERROR,
			Envelope::failure(INTERNAL_CODE, "Upstream service is unreachable.", Value::Null),
		),
		Error::Protocol(_) => (
			StatusCode::INTERNAL_SERVER_ERROR,
			Envelope::failure(INTERNAL_CODE, "Upstream returned an invalid response.", Value::Null),
		),
		Error::RouteNotFound { path } => (
			StatusCode::NOT_FOUND,
			Envelope::failure(404, "Route not found.", json!({ "path": path })),
		),
		Error::Config(_) | Error::Internal { .. } => (
			StatusCode::INTERNAL_SERVER_ERROR,
			Envelope::failure(INTERNAL_CODE, "Internal server error.", Value::Null),
		),
	};

	NormalizedError { status, envelope }
}

fn upstream_envelope(upstream: &UpstreamError) -> Envelope<Value> {
	let message = if upstream.errmsg.is_empty() {
		format!("Upstream rejected the request with errcode {}.", upstream.errcode)
	} else {
		upstream.errmsg.clone()
	};

	Envelope::failure(upstream.errcode, message, upstream.raw.clone())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::ProtocolError;

	fn upstream() -> UpstreamError {
		UpstreamError {
			errcode: 40029,
			errmsg: "invalid code".into(),
			raw: json!({ "errcode": 40029, "errmsg": "invalid code" }),
		}
	}

	#[test]
	fn client_errors_map_to_400() {
		let missing = normalize(&Error::MissingParameter { field: "openid or session_key" });

		assert_eq!(missing.status, StatusCode::BAD_REQUEST);
		assert_eq!(missing.envelope.code, 400);
		assert!(!missing.envelope.success);
		assert_eq!(missing.envelope.data, Value::Null);
	}

	#[test]
	fn auth_failures_stay_on_400_and_keep_the_provider_payload() {
		let auth = normalize(&Error::UpstreamAuth(upstream()));
		let unauthorized =
			normalize(&Error::Unauthorized { reason: "session check failed".into(), upstream: Some(upstream()) });

		for normalized in [auth, unauthorized] {
			assert_eq!(normalized.status, StatusCode::BAD_REQUEST);
			assert_eq!(normalized.envelope.code, 40029);
			assert_eq!(normalized.envelope.data, json!({ "errcode": 40029, "errmsg": "invalid code" }));
		}
	}

	#[test]
	fn unauthorized_messages_keep_the_reason_punctuation() {
		let local = normalize(&Error::Unauthorized {
			reason: "Identity identifier cannot be empty.".into(),
			upstream: None,
		});
		let gated =
			normalize(&Error::Unauthorized { reason: "session check failed".into(), upstream: Some(upstream()) });

		assert_eq!(local.envelope.code, 400);
		assert_eq!(local.envelope.message, "Unauthorized: Identity identifier cannot be empty.");
		assert_eq!(gated.envelope.message, "Unauthorized: session check failed");
	}

	#[test]
	fn transport_failures_split_on_timeout() {
		let timeout = normalize(&TransportError::Timeout { limit: Duration::from_secs(1) }.into());
		let refused = normalize(
			&TransportError::network(std::io::Error::other("connection reset")).into(),
		);

		assert_eq!(timeout.status, StatusCode::REQUEST_TIMEOUT);
		assert_eq!(timeout.envelope.code, 408);
		assert_eq!(refused.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(refused.envelope.code, INTERNAL_CODE);
	}

	#[test]
	fn internal_details_never_leak() {
		let internal = normalize(&Error::internal("database password is hunter2"));
		let protocol = normalize(
			&ProtocolError::body(std::io::Error::other("stream closed by 10.0.0.7")).into(),
		);

		assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(internal.envelope.message, "Internal server error.");
		assert_eq!(protocol.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(protocol.envelope.message, "Upstream returned an invalid response.");
		assert!(!serde_json::to_string(&internal.envelope).expect("Envelope should serialize.").contains("hunter2"));
	}

	#[test]
	fn missing_routes_echo_the_path() {
		let normalized = normalize(&Error::RouteNotFound { path: "/nope?x=1".into() });

		assert_eq!(normalized.status, StatusCode::NOT_FOUND);
		assert_eq!(normalized.envelope.data, json!({ "path": "/nope?x=1" }));
	}
}
