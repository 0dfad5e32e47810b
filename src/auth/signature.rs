//! Session signature sent to the identity provider's session check.

// crates.io
use hmac::{Hmac, Mac, digest::InvalidLength};
use sha2::Sha256;
// self
use crate::auth::SessionSecret;

type HmacSha256 = Hmac<Sha256>;

/// Signature method label the session-check endpoint expects alongside the digest.
pub const SIGNATURE_METHOD: &str = "hmac_sha256";

/// Computes the lowercase hex HMAC-SHA256 of the empty message keyed by `secret`.
///
/// Deterministic and free of I/O. [`SessionSecret`] cannot be empty, so the only error is the
/// key-length rejection HMAC never raises in practice.
pub fn sign(secret: &SessionSecret) -> Result<String, InvalidLength> {
	let mut mac = HmacSha256::new_from_slice(secret.expose().as_bytes())?;

	mac.update(b"");

	Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn secret(value: &str) -> SessionSecret {
		SessionSecret::new(value).expect("Session secret fixture should be valid.")
	}

	#[test]
	fn matches_known_vectors() {
		assert_eq!(
			sign(&secret("sk1")).expect("Signing should succeed."),
			"f2c4c5b453f2e276bbac8149653e40691ee91b935e585f31a35b6721ed2245bc"
		);
		assert_eq!(
			sign(&secret("session-key-123")).expect("Signing should succeed."),
			"a46b6a1174b0953c285f6a9e069d920dd8a948ae3230ffc6fa4ae1004958c2d2"
		);
	}

	#[test]
	fn deterministic_and_key_sensitive() {
		let first = sign(&secret("sk1")).expect("Signing should succeed.");
		let again = sign(&secret("sk1")).expect("Signing should succeed.");
		let other = sign(&secret("sk2")).expect("Signing should succeed.");

		assert_eq!(first, again);
		assert_ne!(first, other);
		assert_eq!(first.len(), 64);
		assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
	}
}
