//! Secret wrappers that redact sensitive material.

// self
use crate::_prelude::*;

macro_rules! def_secret {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Wraps a new secret string; empty values are rejected.
			pub fn new(value: impl Into<String>) -> Result<Self, SecretError> {
				let value = value.into();

				if value.is_empty() {
					return Err(SecretError::Empty { kind: $kind });
				}

				Ok(Self(value))
			}

			/// Returns the inner value. Callers must avoid logging this string.
			pub fn expose(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				self.expose()
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = SecretError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.debug_tuple(stringify!($name)).field(&"<redacted>").finish()
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str("<redacted>")
			}
		}
	};
}

/// Error returned when a secret is rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SecretError {
	/// The secret was empty.
	#[error("{kind} cannot be empty.")]
	Empty {
		/// Kind of secret.
		kind: &'static str,
	},
}

def_secret! { AppSecret, "Static app secret paired with [`crate::auth::AppId`].", "App secret" }
def_secret! { SessionSecret, "Per-session key (`session_key`); only ever used as an HMAC key.", "Session secret" }
def_secret! { AccessToken, "App-level access token issued by the identity provider.", "Access token" }
def_secret! { LbsKey, "Static LBS key injected into every forwarded request.", "LBS key" }

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = SessionSecret::new("super-secret").expect("Secret fixture should be valid.");

		assert_eq!(format!("{secret:?}"), "SessionSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(secret.expose(), "super-secret");
	}

	#[test]
	fn empty_secrets_are_rejected() {
		assert_eq!(LbsKey::new(""), Err(SecretError::Empty { kind: "LBS key" }));
	}

	#[test]
	fn serialization_exposes_value_for_the_owning_client() {
		let secret = SessionSecret::new("sk1").expect("Secret fixture should be valid.");

		assert_eq!(serde_json::to_string(&secret).expect("Secret should serialize."), "\"sk1\"");
	}
}
