//! HTTP surface: routes, shared state, and response rendering.

// crates.io
use axum::{
	Json, Router,
	extract::{OriginalUri, Path, RawQuery, State},
	http::{HeaderMap, Method, Uri},
	response::{IntoResponse, Response},
	routing::{any, get},
};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	envelope::Envelope,
	forward::{self, ForwardRequest, ForwardResponse, ForwardingGateway, request},
	http::{HttpTransport, ReqwestHttpClient},
	identity::{AppCredentialCache, IdentityClient, Session, ValidationResult},
	normalize,
	session::SessionValidator,
};

/// Shared, read-only request handling state.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Process configuration.
	pub config: Arc<GatewayConfig>,
	/// Identity provider client.
	pub identity: Arc<IdentityClient>,
	/// Session validator.
	pub validator: Arc<SessionValidator>,
	/// LBS forwarding gateway.
	pub gateway: Arc<ForwardingGateway>,
}
impl AppState {
	/// Wires the components over the default reqwest transport.
	pub fn from_config(config: Arc<GatewayConfig>) -> Result<Self> {
		let transport = ReqwestHttpClient::new()?;

		Self::with_transport(config, Arc::new(transport))
	}

	/// Wires the components over `transport`.
	pub fn with_transport(config: Arc<GatewayConfig>, transport: Arc<dyn HttpTransport>) -> Result<Self> {
		config.validate()?;

		let identity = Arc::new(IdentityClient::from_config(&config, transport.clone())?);
		let validator = if config.cache_app_credential {
			SessionValidator::new(identity.clone()).with_cache(AppCredentialCache::default())
		} else {
			SessionValidator::new(identity.clone())
		};
		let validator = Arc::new(validator);
		let gateway = Arc::new(ForwardingGateway::from_config(&config, transport, validator.clone()));

		Ok(Self { config, identity, validator, gateway })
	}
}

/// Builds the router; with a route prefix the same routes are also mounted under it.
pub fn router(state: AppState) -> Router {
	let routes = Router::new()
		.route("/", get(index))
		.route("/health", get(health))
		.route("/login/{code}", get(login))
		.route("/verify", get(verify))
		.route("/test-key", get(test_key))
		.route(forward::GATEWAY_PREFIX, any(forward_lbs))
		.route(&format!("{}/{{*rest}}", forward::GATEWAY_PREFIX), any(forward_lbs));
	let routes = match state.config.route_prefix.as_deref() {
		Some(prefix) => routes.clone().nest(prefix, routes),
		None => routes,
	};

	routes
		.fallback(not_found)
		.with_state(state)
		.layer(CorsLayer::permissive())
		.layer(TraceLayer::new_for_http())
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn serve(config: GatewayConfig) -> Result<()> {
	let config = Arc::new(config);
	let state = AppState::from_config(config.clone())?;
	let listener = TcpListener::bind(config.listen)
		.await
		.map_err(|e| Error::internal(format!("failed to bind {}: {e}", config.listen)))?;

	#[cfg(feature = "tracing")]
	tracing::info!(
		listen = %config.listen,
		mode = %config.forward_mode,
		prefix = config.route_prefix.as_deref().unwrap_or("-"),
		"Gateway listening."
	);

	axum::serve(listener, router(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.map_err(|e| Error::internal(format!("server terminated: {e}")))
}

async fn shutdown_signal() {
	if tokio::signal::ctrl_c().await.is_err() {
		#[cfg(feature = "tracing")]
		tracing::warn!("Ctrl-C handler unavailable; shutting down.");
	}

	#[cfg(feature = "tracing")]
	tracing::info!("Shutdown signal received.");
}

async fn index(State(state): State<AppState>) -> Json<Envelope> {
	let prefix = state.config.route_prefix.as_deref().unwrap_or_default();

	Json(Envelope::ok(
		"Gateway is running.",
		json!({
			"service": state.config.service_name,
			"version": env!("CARGO_PKG_VERSION"),
			"mode": state.config.forward_mode.as_str(),
			"endpoints": {
				"health": "GET /health",
				"login": format!("GET {prefix}/login/{{code}}"),
				"verify": format!("GET {prefix}/verify?openid=&session_key="),
				"lbs": format!("ANY {prefix}{}/*", forward::GATEWAY_PREFIX),
				"testKey": format!("GET {prefix}/test-key?address="),
			},
		}),
	))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
	let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();

	Json(json!({ "status": "ok", "timestamp": timestamp, "service": state.config.service_name }))
}

async fn login(
	State(state): State<AppState>,
	Path(code): Path<String>,
) -> Result<Json<Envelope<Session>>> {
	let session = state.identity.exchange_code(&code).await?;

	Ok(Json(Envelope::ok("Login succeeded.", session)))
}

async fn verify(
	State(state): State<AppState>,
	RawQuery(raw): RawQuery,
) -> Result<Json<Envelope<ValidationResult>>> {
	let query = request::parse_query(raw.as_deref());
	let identity_id = request::first_value(&query, "openid")
		.or_else(|| request::first_value(&query, "identityId"))
		.unwrap_or_default();
	let session_secret = request::first_value(&query, "session_key")
		.or_else(|| request::first_value(&query, "sessionSecret"))
		.unwrap_or_default();
	let result = state.validator.validate(identity_id, session_secret).await?;

	Ok(Json(Envelope::ok("Session is valid.", result)))
}

async fn forward_lbs(
	State(state): State<AppState>,
	method: Method,
	uri: Uri,
	headers: HeaderMap,
	body: Bytes,
) -> Result<ForwardResponse> {
	let inbound = ForwardRequest {
		method,
		path: uri.path().to_owned(),
		query: uri.query().map(ToOwned::to_owned),
		headers,
		body,
	};

	state.gateway.forward(inbound).await
}

async fn test_key(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Result<ForwardResponse> {
	state.gateway.probe_key(raw.as_deref()).await
}

async fn not_found(OriginalUri(uri): OriginalUri) -> Error {
	Error::RouteNotFound { path: uri.path().to_owned() }
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let normalized = normalize::normalize(&self);

		(normalized.status, Json(normalized.envelope)).into_response()
	}
}

impl IntoResponse for ForwardResponse {
	fn into_response(self) -> Response {
		(self.status, self.headers, self.body).into_response()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use axum::body;
	// self
	use super::*;
	use crate::error::UpstreamError;

	async fn body_json(response: Response) -> Value {
		let bytes = body::to_bytes(response.into_body(), usize::MAX)
			.await
			.expect("Response body should be readable.");

		serde_json::from_slice(&bytes).expect("Response body should be JSON.")
	}

	#[tokio::test]
	async fn errors_render_through_the_normalizer() {
		let response = Error::UpstreamAuth(UpstreamError {
			errcode: 40029,
			errmsg: "invalid code".into(),
			raw: json!({ "errcode": 40029, "errmsg": "invalid code" }),
		})
		.into_response();

		assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
		assert_eq!(
			body_json(response).await,
			json!({
				"code": 40029,
				"success": false,
				"message": "invalid code",
				"data": { "errcode": 40029, "errmsg": "invalid code" },
			})
		);
	}

	#[tokio::test]
	async fn forwarded_responses_keep_status_headers_and_bytes() {
		let mut headers = HeaderMap::new();

		headers.insert(axum::http::header::ETAG, axum::http::HeaderValue::from_static("\"v1\""));

		let response = ForwardResponse {
			status: axum::http::StatusCode::NOT_FOUND,
			headers,
			body: Bytes::from_static(b"{\"status\":404}"),
		}
		.into_response();

		assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
		assert_eq!(response.headers()[axum::http::header::ETAG], "\"v1\"");

		let bytes = body::to_bytes(response.into_body(), usize::MAX)
			.await
			.expect("Response body should be readable.");

		assert_eq!(bytes, Bytes::from_static(b"{\"status\":404}"));
	}
}
