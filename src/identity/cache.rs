//! Optional app credential cache with a singleflight guard.
//!
//! The gateway re-acquires the app access token on every validation by default. When caching is
//! enabled, a credential is reused until [`AppCredentialCache::DEFAULT_PREEMPTIVE_WINDOW`] before
//! the expiry the provider declared, and concurrent callers piggy-back on one in-flight
//! acquisition instead of stampeding the token endpoint. Credentials without a declared expiry
//! are never cached.

// self
use crate::{
	_prelude::*,
	identity::{AppCredential, IdentityClient},
};

/// Provider codes meaning the access token itself is no longer accepted.
pub const STALE_ACCESS_TOKEN_CODES: [i64; 3] = [40001, 40014, 42001];

/// In-process cache for the single app-level credential.
#[derive(Debug)]
pub struct AppCredentialCache {
	current: Mutex<Option<AppCredential>>,
	refresh_guard: AsyncMutex<()>,
	preemptive_window: time::Duration,
}
impl AppCredentialCache {
	/// Default margin before declared expiry at which the credential is re-acquired.
	pub const DEFAULT_PREEMPTIVE_WINDOW: time::Duration = time::Duration::seconds(60);

	/// Creates an empty cache with a custom preemptive window.
	pub fn with_preemptive_window(window: time::Duration) -> Self {
		let window = if window.is_negative() { time::Duration::ZERO } else { window };

		Self { current: Mutex::new(None), refresh_guard: AsyncMutex::new(()), preemptive_window: window }
	}

	/// Returns the cached credential if it stays fresh past the preemptive window.
	pub fn fresh_at(&self, now: OffsetDateTime) -> Option<AppCredential> {
		self.current
			.lock()
			.as_ref()
			.filter(|credential| credential.is_fresh_at(now, self.preemptive_window))
			.cloned()
	}

	/// Returns a fresh credential, acquiring one through `client` when needed.
	pub async fn get_or_acquire(&self, client: &IdentityClient) -> Result<AppCredential> {
		if let Some(credential) = self.fresh_at(OffsetDateTime::now_utc()) {
			return Ok(credential);
		}

		let _singleflight = self.refresh_guard.lock().await;

		if let Some(credential) = self.fresh_at(OffsetDateTime::now_utc()) {
			return Ok(credential);
		}

		let credential = client.acquire_app_credential().await?;

		if credential.expires_at.is_some() {
			*self.current.lock() = Some(credential.clone());
		}

		Ok(credential)
	}

	/// Drops the cached credential.
	pub fn invalidate(&self) {
		self.current.lock().take();
	}

	/// Drops the cached credential when `error` says the provider no longer accepts it.
	pub fn invalidate_on(&self, error: &Error) {
		if matches!(error, Error::UpstreamAuth(upstream) if STALE_ACCESS_TOKEN_CODES.contains(&upstream.errcode))
		{
			self.invalidate();
		}
	}
}
impl Default for AppCredentialCache {
	fn default() -> Self {
		Self::with_preemptive_window(Self::DEFAULT_PREEMPTIVE_WINDOW)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::AccessToken, error::UpstreamError};

	fn credential(now: OffsetDateTime, expires_in: i64) -> AppCredential {
		AppCredential {
			access_token: AccessToken::new("cached").expect("Token fixture should be valid."),
			obtained_at: now,
			expires_at: Some(now + time::Duration::seconds(expires_in)),
		}
	}

	fn seed(cache: &AppCredentialCache, credential: AppCredential) {
		*cache.current.lock() = Some(credential);
	}

	#[test]
	fn serves_only_fresh_credentials() {
		let cache = AppCredentialCache::default();
		let now = OffsetDateTime::now_utc();

		assert!(cache.fresh_at(now).is_none());

		seed(&cache, credential(now, 7200));

		assert!(cache.fresh_at(now).is_some());
		assert!(cache.fresh_at(now + time::Duration::seconds(7170)).is_none());
	}

	#[test]
	fn stale_token_errors_invalidate() {
		let cache = AppCredentialCache::default();
		let now = OffsetDateTime::now_utc();
		let stale = Error::UpstreamAuth(UpstreamError {
			errcode: 42001,
			errmsg: "access_token expired".into(),
			raw: Value::Null,
		});
		let unrelated = Error::UpstreamAuth(UpstreamError {
			errcode: 87009,
			errmsg: "invalid signature".into(),
			raw: Value::Null,
		});

		seed(&cache, credential(now, 7200));
		cache.invalidate_on(&unrelated);

		assert!(cache.fresh_at(now).is_some());

		cache.invalidate_on(&stale);

		assert!(cache.fresh_at(now).is_none());
	}
}
