//! Outbound request construction: prefix stripping, path normalization, query rewriting.

// crates.io
use url::form_urlencoded;
// self
use crate::{_prelude::*, auth::LbsKey};

/// Inbound prefix routed to the forwarding gateway.
pub const GATEWAY_PREFIX: &str = "/api/lbs";
/// Query parameter carrying the server-held LBS key.
pub const KEY_PARAM: &str = "key";
/// Session-correlation parameters that only mean something to this gateway.
pub const SESSION_MARKERS: [&str; 5] =
	["session_code", "openid", "session_key", "identityId", "sessionSecret"];

/// Returns the part of `inbound_path` after [`GATEWAY_PREFIX`].
pub fn strip_gateway_prefix(inbound_path: &str) -> &str {
	match inbound_path.strip_prefix(GATEWAY_PREFIX) {
		Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
		_ => inbound_path,
	}
}

/// Normalizes the stripped remainder into a relative upstream path.
///
/// Empty and `.` segments are dropped; `..` (plain or percent-encoded), backslashes and encoded
/// separators are rejected. A trailing slash survives.
pub fn normalize_path(remainder: &str) -> Result<String> {
	let invalid = || Error::InvalidPath { path: remainder.to_owned() };
	let mut segments = Vec::new();

	for segment in remainder.split('/') {
		let lowered = segment.to_ascii_lowercase();

		if lowered.contains('\\') || lowered.contains("%5c") || lowered.contains("%2f") {
			return Err(invalid());
		}

		match lowered.replace("%2e", ".").as_str() {
			"" | "." => continue,
			".." => return Err(invalid()),
			_ => segments.push(segment),
		}
	}

	let mut path = segments.join("/");

	if remainder.ends_with('/') && !path.is_empty() {
		path.push('/');
	}

	Ok(path)
}

/// One inbound query pair.
///
/// `name` and `value` are decoded for matching; the pair is relayed upstream from its raw text, so
/// percent-encoded bytes that are not UTF-8 survive untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPair {
	/// Decoded name.
	pub name: String,
	/// Decoded value; invalid UTF-8 is replaced for matching only.
	pub value: String,
	raw: String,
}
impl QueryPair {
	/// Builds a pair from decoded text, form-encoding it for relaying.
	pub fn encoded(name: &str, value: &str) -> Self {
		let raw = form_urlencoded::Serializer::new(String::new()).append_pair(name, value).finish();

		Self { name: name.to_owned(), value: value.to_owned(), raw }
	}

	/// Raw `name=value` text as received.
	pub fn raw(&self) -> &str {
		&self.raw
	}

	fn is_relayed(&self) -> bool {
		self.name != KEY_PARAM && !SESSION_MARKERS.contains(&self.name.as_str())
	}
}

/// Splits the raw inbound query string, preserving order and duplicates.
pub fn parse_query(raw: Option<&str>) -> Vec<QueryPair> {
	raw.unwrap_or_default()
		.split('&')
		.filter_map(|segment| {
			let (name, value) = form_urlencoded::parse(segment.as_bytes()).next()?;

			Some(QueryPair { name: name.into_owned(), value: value.into_owned(), raw: segment.to_owned() })
		})
		.collect()
}

/// Returns the first decoded value for `name`, if any.
pub fn first_value<'a>(query: &'a [QueryPair], name: &str) -> Option<&'a str> {
	query.iter().find(|pair| pair.name == name).map(|pair| pair.value.as_str())
}

/// Builds the upstream URL: `base` + `path`, inbound query minus markers, then the server `key`.
///
/// A client-supplied `key` never reaches upstream.
pub fn upstream_url(base: &Url, path: &str, query: &[QueryPair], key: &LbsKey) -> Url {
	let mut url = base.clone();
	let mut full_path = url.path().trim_end_matches('/').to_owned();

	full_path.push('/');
	full_path.push_str(path);
	url.set_path(&full_path);
	url.set_fragment(None);

	let mut relayed =
		query.iter().filter(|pair| pair.is_relayed()).map(QueryPair::raw).collect::<Vec<_>>();
	let server_key = QueryPair::encoded(KEY_PARAM, key.expose());

	relayed.push(server_key.raw());
	url.set_query(Some(&relayed.join("&")));

	url
}
