//! Provider payload parsing shared by the identity operations.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::{ProtocolError, UpstreamError},
	http::UpstreamResponse,
	identity::AppCredential,
};

/// `cgi-bin/token` success body.
#[derive(Debug, Deserialize)]
pub(crate) struct AccessTokenBody {
	pub(crate) access_token: AccessToken,
	#[serde(default)]
	pub(crate) expires_in: Option<i64>,
}
impl AccessTokenBody {
	pub(crate) fn into_credential(self, now: OffsetDateTime) -> AppCredential {
		let expires_at = self
			.expires_in
			.filter(|secs| *secs > 0)
			.map(|secs| now + time::Duration::seconds(secs));

		AppCredential { access_token: self.access_token, obtained_at: now, expires_at }
	}
}

/// Parses the response body as JSON regardless of the HTTP status.
pub(crate) fn parse_payload(response: &UpstreamResponse) -> Result<Value> {
	let de = &mut serde_json::Deserializer::from_slice(&response.body);

	serde_path_to_error::deserialize(de).map_err(|source| {
		ProtocolError::MalformedJson { source, status: response.status.as_u16() }.into()
	})
}

/// Fails with the provider's own error when the payload carries a non-zero `errcode`.
pub(crate) fn ensure_no_errcode(payload: &Value) -> Result<(), UpstreamError> {
	let errcode = match payload.get("errcode").and_then(errcode_of) {
		Some(0) | None => return Ok(()),
		Some(code) => code,
	};
	let errmsg = payload.get("errmsg").and_then(Value::as_str).unwrap_or_default().to_owned();

	Err(UpstreamError { errcode, errmsg, raw: payload.clone() })
}

/// Decodes a checked payload into its success shape.
pub(crate) fn decode<T>(payload: Value) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(payload)
		.map_err(|source| ProtocolError::MalformedJson { source, status: 200 }.into())
}

fn errcode_of(value: &Value) -> Option<i64> {
	match value {
		Value::Number(number) => number.as_i64(),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}
