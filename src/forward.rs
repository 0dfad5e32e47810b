//! Credential-injecting transparent forwarding to the LBS provider.
//!
//! [`ForwardingGateway`] rewrites an inbound request into an upstream one. Only allow-listed
//! headers are copied, session markers and any client `key` are stripped, and the server-held
//! key is appended. The upstream status, allow-listed response headers and body bytes are relayed
//! unchanged. Exactly one [`ForwardPolicy`] applies per deployment.

pub mod headers;
pub mod request;

pub use request::{GATEWAY_PREFIX, KEY_PARAM, QueryPair, SESSION_MARKERS};

// crates.io
use reqwest::{Method, StatusCode, header::HeaderMap};
// self
use crate::{
	_prelude::*,
	auth::LbsKey,
	config::{ForwardMode, GatewayConfig},
	http::{HttpTransport, UpstreamRequest},
	obs::{self, OperationKind},
	session::{SESSION_PAIR_FIELD, SessionValidator},
};

/// Address geocoded by [`ForwardingGateway::probe_key`] when the caller gives none.
pub const DEFAULT_PROBE_ADDRESS: &str = "北京市天安门";

const GEOCODER_PATH: &str = "/api/lbs/ws/geocoder/v1";

/// Inbound request description handed to the gateway.
#[derive(Clone, Debug)]
pub struct ForwardRequest {
	/// Inbound method, reused upstream.
	pub method: Method,
	/// Inbound path including [`GATEWAY_PREFIX`].
	pub path: String,
	/// Raw inbound query string.
	pub query: Option<String>,
	/// Inbound headers; filtered before use.
	pub headers: HeaderMap,
	/// Inbound body, forwarded unchanged.
	pub body: Bytes,
}
impl ForwardRequest {
	/// Body-less `GET` with no headers.
	pub fn get(path: impl Into<String>, query: Option<String>) -> Self {
		Self {
			method: Method::GET,
			path: path.into(),
			query,
			headers: HeaderMap::new(),
			body: Bytes::new(),
		}
	}
}

/// Upstream response as relayed to the client.
#[derive(Clone, Debug)]
pub struct ForwardResponse {
	/// Upstream status.
	pub status: StatusCode,
	/// Allow-listed upstream headers.
	pub headers: HeaderMap,
	/// Upstream body bytes.
	pub body: Bytes,
}

/// Authorization applied before forwarding.
#[derive(Clone, Debug)]
pub enum ForwardPolicy {
	/// Forward unconditionally.
	Open,
	/// Require `openid` + `session_key` markers accepted by the validator.
	SessionGated(Arc<SessionValidator>),
}
impl ForwardPolicy {
	/// Mode label for logs.
	pub fn mode(&self) -> ForwardMode {
		match self {
			ForwardPolicy::Open => ForwardMode::Open,
			ForwardPolicy::SessionGated(_) => ForwardMode::SessionGated,
		}
	}
}

/// Forwarding gateway bound to one LBS base URL and key.
#[derive(Clone)]
pub struct ForwardingGateway {
	transport: Arc<dyn HttpTransport>,
	base_url: Url,
	key: LbsKey,
	timeout: Duration,
	policy: ForwardPolicy,
}
impl ForwardingGateway {
	/// Creates an open gateway.
	pub fn new(transport: Arc<dyn HttpTransport>, base_url: Url, key: LbsKey, timeout: Duration) -> Self {
		Self { transport, base_url, key, timeout, policy: ForwardPolicy::Open }
	}

	/// Creates the gateway the configuration asks for; `validator` backs session-gated mode.
	pub fn from_config(
		config: &GatewayConfig,
		transport: Arc<dyn HttpTransport>,
		validator: Arc<SessionValidator>,
	) -> Self {
		let gateway = Self::new(
			transport,
			config.lbs_base_url.clone(),
			config.lbs_key.clone(),
			config.forward_timeout,
		);

		match config.forward_mode {
			ForwardMode::Open => gateway,
			ForwardMode::SessionGated => gateway.with_policy(ForwardPolicy::SessionGated(validator)),
		}
	}

	/// Replaces the forwarding policy.
	pub fn with_policy(mut self, policy: ForwardPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Authorizes, rewrites, and relays one inbound request.
	pub async fn forward(&self, inbound: ForwardRequest) -> Result<ForwardResponse> {
		obs::observe(OperationKind::Forward, "forward", async move {
			let ForwardRequest { method, path, query, headers: inbound_headers, body } = inbound;
			let upstream_path = request::normalize_path(request::strip_gateway_prefix(&path))
				.map_err(|_| Error::InvalidPath { path: path.clone() })?;
			let query = request::parse_query(query.as_deref());

			self.authorize(&query).await?;

			let url = request::upstream_url(&self.base_url, &upstream_path, &query, &self.key);

			self.relay(UpstreamRequest {
				method,
				url,
				headers: headers::outbound(&inbound_headers),
				body,
				timeout: self.timeout,
			})
			.await
		})
		.await
	}

	/// Sends a geocoder lookup to check the configured key.
	///
	/// The raw query is authorized exactly like [`Self::forward`]; only its `address` is relayed,
	/// falling back to [`DEFAULT_PROBE_ADDRESS`].
	pub async fn probe_key(&self, query: Option<&str>) -> Result<ForwardResponse> {
		obs::observe(OperationKind::Forward, "probe_key", async move {
			let query = request::parse_query(query);

			self.authorize(&query).await?;

			let address = query
				.iter()
				.find(|pair| pair.name == "address" && !pair.value.is_empty())
				.cloned()
				.unwrap_or_else(|| QueryPair::encoded("address", DEFAULT_PROBE_ADDRESS));
			let path = request::strip_gateway_prefix(GEOCODER_PATH).trim_start_matches('/');
			let url = request::upstream_url(&self.base_url, path, &[address], &self.key);

			self.relay(UpstreamRequest::get(url, self.timeout)).await
		})
		.await
	}

	async fn authorize(&self, query: &[QueryPair]) -> Result<()> {
		let ForwardPolicy::SessionGated(validator) = &self.policy else {
			return Ok(());
		};
		let identity_id = request::first_value(query, "openid")
			.or_else(|| request::first_value(query, "identityId"))
			.unwrap_or_default();
		let session_secret = request::first_value(query, "session_key")
			.or_else(|| request::first_value(query, "sessionSecret"))
			.unwrap_or_default();

		if identity_id.is_empty() || session_secret.is_empty() {
			return Err(Error::MissingParameter { field: SESSION_PAIR_FIELD });
		}

		match validator.validate(identity_id, session_secret).await {
			Ok(_) => Ok(()),
			Err(Error::UpstreamAuth(upstream)) => Err(Error::Unauthorized {
				reason: "session check failed".into(),
				upstream: Some(upstream),
			}),
			Err(e) => Err(e),
		}
	}

	async fn relay(&self, request: UpstreamRequest) -> Result<ForwardResponse> {
		let response = self.transport.execute(request).await?;

		#[cfg(feature = "tracing")]
		tracing::debug!(status = response.status.as_u16(), "Relaying upstream response.");

		Ok(ForwardResponse {
			status: response.status,
			headers: headers::relayed(&response.headers),
			body: response.body,
		})
	}
}
impl Debug for ForwardingGateway {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ForwardingGateway")
			.field("base_url", &self.base_url.as_str())
			.field("timeout", &self.timeout)
			.field("mode", &self.policy.mode())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use reqwest::header::{self, HeaderValue};
	// self
	use super::*;
	use crate::{
		auth::{AppId, AppSecret},
		http::{TransportFuture, UpstreamResponse},
		identity::{IdentityClient, IdentityEndpoints},
	};

	/// Records every request and answers `404` with a fixed body and a mix of headers.
	#[derive(Default)]
	struct RecordingTransport {
		calls: AtomicUsize,
		last: Mutex<Option<UpstreamRequest>>,
	}
	impl HttpTransport for RecordingTransport {
		fn execute(&self, request: UpstreamRequest) -> TransportFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			*self.last.lock() = Some(request);

			Box::pin(async move {
				let mut headers = HeaderMap::new();

				headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
				headers.insert(header::SERVER, HeaderValue::from_static("upstream"));
				headers.insert(header::CONNECTION, HeaderValue::from_static("close"));

				Ok(UpstreamResponse {
					status: StatusCode::NOT_FOUND,
					headers,
					body: Bytes::from_static(b"no such endpoint"),
				})
			})
		}
	}

	fn gateway(transport: Arc<RecordingTransport>) -> ForwardingGateway {
		ForwardingGateway::new(
			transport,
			Url::parse("https://lbs.test").expect("Base fixture should parse."),
			LbsKey::new("server-key").expect("Key fixture should be valid."),
			Duration::from_secs(1),
		)
	}

	fn gated(gateway: ForwardingGateway, transport: Arc<RecordingTransport>) -> ForwardingGateway {
		let identity = IdentityClient::new(
			transport,
			IdentityEndpoints::from_base(&Url::parse("https://identity.test").expect("Base should parse."))
				.expect("Endpoints should derive."),
			AppId::new("wx-app").expect("App id fixture should be valid."),
			AppSecret::new("app-secret").expect("App secret fixture should be valid."),
			Duration::from_secs(1),
		);

		gateway.with_policy(ForwardPolicy::SessionGated(Arc::new(SessionValidator::new(Arc::new(
			identity,
		)))))
	}

	#[tokio::test]
	async fn relays_status_body_and_allow_listed_headers() {
		let transport = Arc::new(RecordingTransport::default());
		let mut request = ForwardRequest::get(
			"/api/lbs/ws/geocoder/v1",
			Some("address=X&key=client&session_code=abc".into()),
		);

		request.method = Method::POST;
		request.body = Bytes::from_static(b"{\"a\":1}");
		request.headers.insert(header::HOST, HeaderValue::from_static("gateway.local"));
		request.headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

		let response = gateway(transport.clone()).forward(request).await.expect("Forwarding should succeed.");

		assert_eq!(response.status, StatusCode::NOT_FOUND);
		assert_eq!(response.body, Bytes::from_static(b"no such endpoint"));
		assert_eq!(response.headers.len(), 1);
		assert_eq!(response.headers[header::CONTENT_TYPE], "text/plain");

		let sent = transport.last.lock().take().expect("Upstream request should be recorded.");

		assert_eq!(sent.method, Method::POST);
		assert_eq!(sent.url.as_str(), "https://lbs.test/ws/geocoder/v1?address=X&key=server-key");
		assert_eq!(sent.body, Bytes::from_static(b"{\"a\":1}"));
		assert!(!sent.headers.contains_key(header::HOST));
		assert_eq!(sent.headers[header::CONTENT_TYPE], "application/json");
		assert_eq!(sent.timeout, Duration::from_secs(1));
	}

	#[tokio::test]
	async fn traversal_is_rejected_before_any_call() {
		let transport = Arc::new(RecordingTransport::default());
		let err = gateway(transport.clone())
			.forward(ForwardRequest::get("/api/lbs/ws/%2e%2e/secret", None))
			.await
			.expect_err("Traversal should be rejected.");

		assert!(matches!(err, Error::InvalidPath { ref path } if path == "/api/lbs/ws/%2e%2e/secret"));
		assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn gated_mode_requires_both_markers() {
		let transport = Arc::new(RecordingTransport::default());
		let gateway = gated(gateway(transport.clone()), transport.clone());
		let err = gateway
			.forward(ForwardRequest::get("/api/lbs/ws/geocoder/v1", Some("openid=oid1".into())))
			.await
			.expect_err("Missing session key should be rejected.");

		assert!(matches!(err, Error::MissingParameter { field: SESSION_PAIR_FIELD }));
		assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn gated_probe_is_authorized_like_forwarding() {
		let transport = Arc::new(RecordingTransport::default());
		let gateway = gated(gateway(transport.clone()), transport.clone());
		let err = gateway
			.probe_key(Some("address=anywhere"))
			.await
			.expect_err("Probe without a session should be rejected.");

		assert!(matches!(err, Error::MissingParameter { field: SESSION_PAIR_FIELD }));
		assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn probe_relays_only_the_address() {
		let transport = Arc::new(RecordingTransport::default());

		gateway(transport.clone())
			.probe_key(Some("address=%B1%B1%BE%A9&key=client&extra=1"))
			.await
			.expect("Probe should relay.");

		let sent = transport.last.lock().take().expect("Upstream request should be recorded.");

		assert_eq!(sent.url.query(), Some("address=%B1%B1%BE%A9&key=server-key"));
	}

	#[tokio::test]
	async fn probe_uses_the_geocoder_with_the_server_key() {
		let transport = Arc::new(RecordingTransport::default());

		gateway(transport.clone()).probe_key(None).await.expect("Probe should relay.");

		let sent = transport.last.lock().take().expect("Upstream request should be recorded.");
		let pairs = sent.url.query_pairs().into_owned().collect::<Vec<_>>();

		assert_eq!(sent.url.path(), "/ws/geocoder/v1");
		assert_eq!(
			pairs,
			vec![
				("address".to_owned(), DEFAULT_PROBE_ADDRESS.to_owned()),
				("key".to_owned(), "server-key".to_owned()),
			]
		);
	}
}
