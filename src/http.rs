//! Transport primitives for outbound identity and LBS calls.
//!
//! The module exposes [`HttpTransport`] alongside the owned [`UpstreamRequest`] and
//! [`UpstreamResponse`] values so callers can swap the HTTP stack (or a fake in tests) without
//! touching the identity client or the forwarding gateway. Every request carries its own
//! timeout; identity calls and forwarded calls never share one.

// std
use std::ops::Deref;
// crates.io
use reqwest::{Method, StatusCode, header::HeaderMap, redirect::Policy};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, ProtocolError, TransportError},
};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<UpstreamResponse>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to execute one upstream call.
///
/// Implementations must resolve with an [`UpstreamResponse`] for every well-formed HTTP
/// response regardless of its status code, and map failures onto
/// [`TransportError`]/[`ProtocolError`] so callers never see stack-specific errors.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request`, honoring [`UpstreamRequest::timeout`].
	fn execute(&self, request: UpstreamRequest) -> TransportFuture<'_>;
}

/// Owned description of one outbound call.
#[derive(Clone, Debug)]
pub struct UpstreamRequest {
	/// HTTP method.
	pub method: Method,
	/// Fully built URL, query included.
	pub url: Url,
	/// Headers to send.
	pub headers: HeaderMap,
	/// Request body, passed through untouched.
	pub body: Bytes,
	/// Bound for the whole call (connect, send, and body read).
	pub timeout: Duration,
}
impl UpstreamRequest {
	/// Creates a body-less `GET` for `url`.
	pub fn get(url: Url, timeout: Duration) -> Self {
		Self { method: Method::GET, url, headers: HeaderMap::new(), body: Bytes::new(), timeout }
	}
}

/// Upstream response captured in full.
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
	/// Status code as returned.
	pub status: StatusCode,
	/// Headers as returned.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Bytes,
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Redirects are not followed: the identity endpoints answer directly and forwarded redirects
/// are relayed to the client as-is.
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Builds the default client with redirects disabled.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestHttpClient(..)")
	}
}
impl HttpTransport for ReqwestHttpClient {
	fn execute(&self, request: UpstreamRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let UpstreamRequest { method, url, headers, body, timeout } = request;
			let mut builder = self.0.request(method, url).headers(headers).timeout(timeout);

			if !body.is_empty() {
				builder = builder.body(body);
			}

			let response = builder.send().await.map_err(|e| map_reqwest_error(e, timeout))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(|e| map_body_error(e, timeout))?;

			Ok(UpstreamResponse { status, headers, body })
		})
	}
}

/// Classifies a reqwest send failure.
pub fn map_reqwest_error(err: ReqwestError, timeout: Duration) -> Error {
	if err.is_builder() {
		return Error::internal(format!("outbound request could not be built: {err}"));
	}
	if err.is_timeout() {
		return TransportError::Timeout { limit: timeout }.into();
	}
	if err.is_connect() {
		return TransportError::connect(err).into();
	}

	TransportError::network(err).into()
}

fn map_body_error(err: ReqwestError, timeout: Duration) -> Error {
	if err.is_timeout() {
		return TransportError::Timeout { limit: timeout }.into();
	}

	ProtocolError::body(err).into()
}

#[cfg(test)]
mod tests {
	// std
	use std::net::TcpListener;
	// self
	use super::*;

	fn closed_port_url() -> Url {
		// Bind then drop so the port is very likely closed.
		let listener = TcpListener::bind("127.0.0.1:0").expect("Ephemeral port should bind.");
		let addr = listener.local_addr().expect("Listener should expose its address.");

		drop(listener);

		Url::parse(&format!("http://{addr}/")).expect("Loopback URL should parse.")
	}

	#[tokio::test]
	async fn refused_connections_surface_as_unreachable() {
		let client = ReqwestHttpClient::new().expect("Default client should build.");
		let err = client
			.execute(UpstreamRequest::get(closed_port_url(), Duration::from_secs(2)))
			.await
			.expect_err("Closed port should fail.");

		assert!(matches!(err, Error::Unreachable(_)));
		assert!(!err.is_timeout());
	}

	#[test]
	fn get_requests_start_empty() {
		let request = UpstreamRequest::get(
			Url::parse("https://example.com/a").expect("URL should parse."),
			Duration::from_secs(1),
		);

		assert_eq!(request.method, Method::GET);
		assert!(request.headers.is_empty());
		assert!(request.body.is_empty());
	}
}
