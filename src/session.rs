//! Session validation: app credential, then signature, then provider session check.

// self
use crate::{
	_prelude::*,
	auth::{self, IdentityId, SessionSecret},
	identity::{AppCredential, AppCredentialCache, IdentityClient, ValidationResult},
	obs::{self, OperationKind},
};

/// Field label reported when either half of the session pair is absent.
pub const SESSION_PAIR_FIELD: &str = "openid or session_key";

/// Answers whether an `(identity, session secret)` pair is currently live.
///
/// No retries: the first upstream failure is returned unchanged.
#[derive(Debug)]
pub struct SessionValidator {
	identity: Arc<IdentityClient>,
	cache: Option<AppCredentialCache>,
}
impl SessionValidator {
	/// Creates a validator that re-acquires the app credential on every call.
	pub fn new(identity: Arc<IdentityClient>) -> Self {
		Self { identity, cache: None }
	}

	/// Reuses app credentials through `cache` until shortly before their declared expiry.
	pub fn with_cache(mut self, cache: AppCredentialCache) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Validates the pair, rejecting empty inputs before any upstream call.
	pub async fn validate(
		&self,
		identity_id: &str,
		session_secret: &str,
	) -> Result<ValidationResult> {
		obs::observe(OperationKind::Verify, "validate", async move {
			if identity_id.is_empty() || session_secret.is_empty() {
				return Err(Error::MissingParameter { field: SESSION_PAIR_FIELD });
			}

			let identity_id = IdentityId::new(identity_id).map_err(|e| Error::Unauthorized {
				reason: e.to_string(),
				upstream: None,
			})?;
			let session_secret = SessionSecret::new(session_secret)
				.map_err(|_| Error::MissingParameter { field: SESSION_PAIR_FIELD })?;
			let credential = self.app_credential().await?;
			let signature = auth::sign(&session_secret).map_err(Error::internal)?;
			let result = self
				.identity
				.validate_session(&credential.access_token, &identity_id, &signature)
				.await;

			if let (Err(e), Some(cache)) = (&result, &self.cache) {
				cache.invalidate_on(e);
			}

			result
		})
		.await
	}

	async fn app_credential(&self) -> Result<AppCredential> {
		match &self.cache {
			Some(cache) => cache.get_or_acquire(&self.identity).await,
			None => self.identity.acquire_app_credential().await,
		}
	}
}
