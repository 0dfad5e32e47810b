//! Gateway-level error types shared across identity calls, forwarding, and the HTTP surface.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
///
/// Every failure raised by an outbound call is converted into one of these variants at the
/// boundary of the component that issued it; [`crate::normalize`] is the only place that turns
/// them into wire responses.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Client input is incomplete.
	#[error("Missing required parameter: {field}.")]
	MissingParameter {
		/// Name of the missing field(s) as the client spells them.
		field: &'static str,
	},
	/// Forwarded path would escape the upstream path space.
	#[error("Request path is not allowed: {path}.")]
	InvalidPath {
		/// Offending inbound path.
		path: String,
	},
	/// Session-gated forwarding rejected the caller's session.
	#[error("Session is not authorized: {reason}.")]
	Unauthorized {
		/// Human-readable reason.
		reason: String,
		/// Provider payload that caused the rejection, when one exists.
		upstream: Option<UpstreamError>,
	},
	/// Identity or LBS provider reported a domain error code.
	#[error(transparent)]
	UpstreamAuth(#[from] UpstreamError),
	/// Upstream could not be reached (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Unreachable(#[from] TransportError),
	/// Upstream answered with something this gateway cannot parse.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// No route matched the inbound request.
	#[error("No route matches {path}.")]
	RouteNotFound {
		/// Path the client asked for.
		path: String,
	},
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Anything else; logged server-side and reported generically.
	#[error("Internal error: {message}.")]
	Internal {
		/// Server-side description, never sent to clients.
		message: String,
	},
}
impl Error {
	/// Builds an [`Error::Internal`] from any displayable value.
	pub fn internal(message: impl Display) -> Self {
		Self::Internal { message: message.to_string() }
	}

	/// Returns `true` when the failure was an upstream timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Unreachable(TransportError::Timeout { .. }))
	}
}

/// Provider-native error payload (`{errcode, errmsg}`), preserved for diagnostics.
#[derive(Clone, Debug, PartialEq, ThisError)]
#[error("Upstream rejected the request with errcode {errcode}: {errmsg}.")]
pub struct UpstreamError {
	/// Provider error code (never zero).
	pub errcode: i64,
	/// Provider error message; empty when the provider omitted it.
	pub errmsg: String,
	/// Raw provider payload as received.
	pub raw: Value,
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Outbound call exceeded its configured bound.
	#[error("Upstream call timed out after {limit:?}.")]
	Timeout {
		/// Configured timeout for the call.
		limit: Duration,
	},
	/// Connection could not be established.
	#[error("Failed to connect to the upstream service.")]
	Connect {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Any other network failure.
	#[error("Network error occurred while calling the upstream service.")]
	Network {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific connect error.
	pub fn connect(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Connect { source: Box::new(src) }
	}

	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// Malformed upstream responses.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Body was not the JSON shape the endpoint promises.
	#[error("Upstream returned malformed JSON (HTTP {status}).")]
	MalformedJson {
		/// Structured parsing failure, including the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status of the response.
		status: u16,
	},
	/// Body could not be read off the wire.
	#[error("Upstream response body could not be read.")]
	Body {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
}
impl ProtocolError {
	/// Wraps a transport-specific body read failure.
	pub fn body(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Body { source: Box::new(src) }
	}
}

/// Configuration and validation failures raised while assembling the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured URL cannot be parsed or joined.
	#[error("The {name} URL is invalid.")]
	InvalidUrl {
		/// Which setting failed.
		name: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured URL uses a scheme other than `http`/`https`.
	#[error("The {name} URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which setting failed.
		name: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// A configured URL cannot serve as a base.
	#[error("The {name} URL cannot be used as a base: {url}.")]
	CannotBeBase {
		/// Which setting failed.
		name: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// Secret validation failed.
	#[error(transparent)]
	Secret(#[from] crate::auth::SecretError),
	/// Route prefix is malformed.
	#[error("Route prefix must start with `/` and must not end with `/`: {prefix}.")]
	InvalidRoutePrefix {
		/// Prefix as configured.
		prefix: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
