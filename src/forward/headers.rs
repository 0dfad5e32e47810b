//! Header allow-lists applied in both directions.

// crates.io
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

/// Inbound headers copied onto the outbound request.
pub static REQUEST_ALLOW_LIST: [HeaderName; 4] =
	[header::ACCEPT, header::ACCEPT_LANGUAGE, header::CONTENT_TYPE, header::USER_AGENT];
/// Upstream headers relayed back to the client.
pub static RESPONSE_ALLOW_LIST: [HeaderName; 10] = [
	header::CONTENT_TYPE,
	header::CONTENT_ENCODING,
	header::CONTENT_LANGUAGE,
	header::CONTENT_DISPOSITION,
	header::CACHE_CONTROL,
	header::ETAG,
	header::EXPIRES,
	header::LAST_MODIFIED,
	header::VARY,
	header::RETRY_AFTER,
];

const DEFAULT_USER_AGENT: &str = concat!("lbs-gateway/", env!("CARGO_PKG_VERSION"));

/// Builds the outbound header set; anything not allow-listed (`host`, cookies, hop-by-hop) is dropped.
pub fn outbound(inbound: &HeaderMap) -> HeaderMap {
	let mut headers = copy_allowed(inbound, &REQUEST_ALLOW_LIST);

	if !headers.contains_key(header::USER_AGENT) {
		headers.insert(header::USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
	}

	headers
}

/// Builds the header set relayed to the client.
pub fn relayed(upstream: &HeaderMap) -> HeaderMap {
	copy_allowed(upstream, &RESPONSE_ALLOW_LIST)
}

fn copy_allowed(source: &HeaderMap, allowed: &[HeaderName]) -> HeaderMap {
	let mut headers = HeaderMap::new();

	for name in allowed {
		for value in source.get_all(name) {
			headers.append(name.clone(), value.clone());
		}
	}

	headers
}
