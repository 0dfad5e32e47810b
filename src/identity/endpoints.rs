//! Identity provider endpoint set derived from one base URL.

// self
use crate::{_prelude::*, error::ConfigError};

const CODE_EXCHANGE_PATH: &str = "sns/jscode2session";
const APP_CREDENTIAL_PATH: &str = "cgi-bin/token";
const SESSION_CHECK_PATH: &str = "wxa/checksession";

/// Absolute endpoint URLs, query-less.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityEndpoints {
	/// Login code exchange.
	pub code_exchange: Url,
	/// App access token acquisition.
	pub app_credential: Url,
	/// Session check.
	pub session_check: Url,
}
impl IdentityEndpoints {
	/// Derives the endpoint set from `base`; a path on the base is kept as a prefix.
	pub fn from_base(base: &Url) -> Result<Self, ConfigError> {
		if !matches!(base.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { name: "identity base", url: base.to_string() });
		}
		if base.cannot_be_a_base() {
			return Err(ConfigError::CannotBeBase { name: "identity base", url: base.to_string() });
		}

		let mut root = base.clone();

		root.set_query(None);
		root.set_fragment(None);

		if !root.path().ends_with('/') {
			let path = format!("{}/", root.path());

			root.set_path(&path);
		}

		let join = |path: &str| {
			root.join(path).map_err(|source| ConfigError::InvalidUrl { name: "identity base", source })
		};

		Ok(Self {
			code_exchange: join(CODE_EXCHANGE_PATH)?,
			app_credential: join(APP_CREDENTIAL_PATH)?,
			session_check: join(SESSION_CHECK_PATH)?,
		})
	}
}
