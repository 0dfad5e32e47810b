//! Four-field response envelope shared by every JSON route.

// self
use crate::_prelude::*;

/// `{code, success, message, data}` wrapper; `code` is `0` on success.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
	/// Zero on success, otherwise the HTTP-like or provider error code.
	pub code: i64,
	/// Whether the operation succeeded.
	pub success: bool,
	/// Human-readable message.
	pub message: String,
	/// Payload or diagnostic data.
	pub data: T,
}
impl<T> Envelope<T> {
	/// Successful envelope.
	pub fn ok(message: impl Into<String>, data: T) -> Self {
		Self { code: 0, success: true, message: message.into(), data }
	}

	/// Failed envelope.
	pub fn failure(code: i64, message: impl Into<String>, data: T) -> Self {
		Self { code, success: false, message: message.into(), data }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn serializes_all_four_fields() {
		let ok = serde_json::to_value(Envelope::ok("done", serde_json::json!({ "a": 1 })))
			.expect("Envelope should serialize.");
		let failed = serde_json::to_value(Envelope::failure(400, "bad", Value::Null))
			.expect("Envelope should serialize.");

		assert_eq!(
			ok,
			serde_json::json!({ "code": 0, "success": true, "message": "done", "data": { "a": 1 } })
		);
		assert_eq!(
			failed,
			serde_json::json!({ "code": 400, "success": false, "message": "bad", "data": null })
		);
	}
}
