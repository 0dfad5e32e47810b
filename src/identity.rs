//! Identity provider client: login code exchange, app credential acquisition, session check.
//!
//! Each operation is one outbound `GET` bounded by the identity timeout. The provider reports
//! domain failures inside a `200 OK` body (`{errcode, errmsg}`), so every payload is checked for a
//! non-zero `errcode` before it is decoded; those surface as [`Error::UpstreamAuth`] with the raw
//! payload preserved. Transport failures surface as [`Error::Unreachable`] and undecodable bodies
//! as [`Error::Protocol`].

pub mod cache;
pub mod endpoints;

mod wire;

pub use cache::*;
pub use endpoints::*;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AppId, AppSecret, IdentityId, SIGNATURE_METHOD, SessionSecret},
	config::GatewayConfig,
	error::ConfigError,
	http::{HttpTransport, UpstreamRequest},
	obs::{self, OperationKind},
};

/// Session minted by exchanging a login code. Serialized with the provider's field names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
	/// Per-user identity.
	#[serde(rename = "openid")]
	pub identity_id: IdentityId,
	/// Per-session HMAC key.
	#[serde(rename = "session_key")]
	pub session_secret: SessionSecret,
	/// Cross-app identity, when the provider discloses one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub unionid: Option<String>,
}

/// App-level access token required by the session check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppCredential {
	/// Access token secret.
	pub access_token: AccessToken,
	/// Instant the token was received.
	pub obtained_at: OffsetDateTime,
	/// Expiry derived from the provider's `expires_in`, when declared.
	pub expires_at: Option<OffsetDateTime>,
}
impl AppCredential {
	/// Returns `true` when the credential remains usable for at least `window` after `now`.
	pub fn is_fresh_at(&self, now: OffsetDateTime, window: time::Duration) -> bool {
		match self.expires_at {
			Some(expires_at) => expires_at - now > window,
			None => false,
		}
	}
}

/// Provider's session-check payload, relayed as opaque evidence of validity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationResult {
	/// Raw payload.
	pub payload: Value,
}

/// Client for the identity provider's three endpoints.
#[derive(Clone)]
pub struct IdentityClient {
	transport: Arc<dyn HttpTransport>,
	endpoints: IdentityEndpoints,
	app_id: AppId,
	app_secret: AppSecret,
	timeout: Duration,
}
impl IdentityClient {
	/// Creates a client from explicit parts.
	pub fn new(
		transport: Arc<dyn HttpTransport>,
		endpoints: IdentityEndpoints,
		app_id: AppId,
		app_secret: AppSecret,
		timeout: Duration,
	) -> Self {
		Self { transport, endpoints, app_id, app_secret, timeout }
	}

	/// Creates a client from the process configuration.
	pub fn from_config(
		config: &GatewayConfig,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self, ConfigError> {
		let endpoints = IdentityEndpoints::from_base(&config.identity_base_url)?;

		Ok(Self::new(
			transport,
			endpoints,
			config.app_id.clone(),
			config.app_secret.clone(),
			config.identity_timeout,
		))
	}

	/// Exchanges a single-use login code for a [`Session`].
	pub async fn exchange_code(&self, code: &str) -> Result<Session> {
		obs::observe(OperationKind::Login, "exchange_code", async move {
			if code.is_empty() {
				return Err(Error::MissingParameter { field: "code" });
			}

			let mut url = self.endpoints.code_exchange.clone();

			url.query_pairs_mut()
				.append_pair("appid", &self.app_id)
				.append_pair("secret", self.app_secret.expose())
				.append_pair("js_code", code)
				.append_pair("grant_type", "authorization_code");

			let payload = self.call(url).await?;

			wire::decode::<Session>(payload)
		})
		.await
	}

	/// Acquires a fresh app-level access token using the static app id/secret.
	pub async fn acquire_app_credential(&self) -> Result<AppCredential> {
		obs::observe(OperationKind::AppCredential, "acquire_app_credential", async move {
			let mut url = self.endpoints.app_credential.clone();

			url.query_pairs_mut()
				.append_pair("grant_type", "client_credential")
				.append_pair("appid", &self.app_id)
				.append_pair("secret", self.app_secret.expose());

			let payload = self.call(url).await?;
			let body = wire::decode::<wire::AccessTokenBody>(payload)?;

			Ok(body.into_credential(OffsetDateTime::now_utc()))
		})
		.await
	}

	/// Asks the provider whether the session behind `signature` is still live.
	pub async fn validate_session(
		&self,
		access_token: &AccessToken,
		identity_id: &IdentityId,
		signature: &str,
	) -> Result<ValidationResult> {
		obs::observe(OperationKind::SessionCheck, "validate_session", async move {
			let mut url = self.endpoints.session_check.clone();

			url.query_pairs_mut()
				.append_pair("access_token", access_token.expose())
				.append_pair("openid", identity_id)
				.append_pair("signature", signature)
				.append_pair("sig_method", SIGNATURE_METHOD);

			let payload = self.call(url).await?;

			Ok(ValidationResult { payload })
		})
		.await
	}

	async fn call(&self, url: Url) -> Result<Value> {
		let response = self.transport.execute(UpstreamRequest::get(url, self.timeout)).await?;
		let payload = wire::parse_payload(&response)?;

		wire::ensure_no_errcode(&payload)?;

		Ok(payload)
	}
}
impl Debug for IdentityClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityClient")
			.field("endpoints", &self.endpoints)
			.field("app_id", &self.app_id)
			.field("timeout", &self.timeout)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn credential(expires_in: Option<i64>, now: OffsetDateTime) -> AppCredential {
		AppCredential {
			access_token: AccessToken::new("token").expect("Token fixture should be valid."),
			obtained_at: now,
			expires_at: expires_in.map(|secs| now + time::Duration::seconds(secs)),
		}
	}

	#[test]
	fn credentials_without_declared_expiry_are_never_fresh() {
		let now = OffsetDateTime::now_utc();

		assert!(!credential(None, now).is_fresh_at(now, time::Duration::ZERO));
	}

	#[test]
	fn freshness_honors_the_preemptive_window() {
		let now = OffsetDateTime::now_utc();
		let record = credential(Some(7200), now);

		assert!(record.is_fresh_at(now, time::Duration::seconds(60)));
		assert!(!record.is_fresh_at(now + time::Duration::seconds(7150), time::Duration::seconds(60)));
	}

	#[test]
	fn session_serializes_with_provider_field_names() {
		let session = Session {
			identity_id: IdentityId::new("oid1").expect("Identity fixture should be valid."),
			session_secret: SessionSecret::new("sk1").expect("Secret fixture should be valid."),
			unionid: None,
		};

		assert_eq!(
			serde_json::to_value(&session).expect("Session should serialize."),
			serde_json::json!({ "openid": "oid1", "session_key": "sk1" })
		);
	}
}
