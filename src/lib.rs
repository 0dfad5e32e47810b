//! Session-checking gateway for mini-app clients.
//!
//! The gateway exchanges login codes for sessions, validates live sessions against the identity
//! provider, and forwards location-service calls with a server-held key the client never sees.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod forward;
pub mod http;
pub mod identity;
pub mod normalize;
pub mod obs;
pub mod server;
pub mod session;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::net::SocketAddr;
	// crates.io
	use tokio::{net::TcpListener, task::JoinHandle};
	// self
	use crate::{
		auth::{AppId, AppSecret, LbsKey},
		config::GatewayConfig,
		http::ReqwestHttpClient,
		server::{self, AppState},
	};

	/// App identifier used by test configurations.
	pub const TEST_APP_ID: &str = "wx-test-app";
	/// App secret used by test configurations.
	pub const TEST_APP_SECRET: &str = "test-app-secret";
	/// Static LBS key used by test configurations.
	pub const TEST_LBS_KEY: &str = "server-static-key";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Parses a mock server URL, panicking with a readable message on failure.
	pub fn mock_url(value: &str) -> Url {
		Url::parse(value).expect("Mock server URL should parse successfully.")
	}

	/// Configuration pointing both upstreams at the provided mock base URLs.
	pub fn test_config(identity_base: Url, lbs_base: Url) -> GatewayConfig {
		GatewayConfig::new(
			AppId::new(TEST_APP_ID).expect("Test app identifier should be valid."),
			AppSecret::new(TEST_APP_SECRET).expect("Test app secret should be valid."),
			LbsKey::new(TEST_LBS_KEY).expect("Test LBS key should be valid."),
		)
		.expect("Test configuration should build.")
		.with_identity_base_url(identity_base)
		.with_lbs_base_url(lbs_base)
	}

	/// Builds application state backed by the insecure test transport.
	pub fn build_test_state(config: GatewayConfig) -> AppState {
		AppState::with_transport(Arc::new(config), Arc::new(test_reqwest_http_client()))
			.expect("Test application state should build successfully.")
	}

	/// Serves the gateway router on an ephemeral loopback port.
	pub async fn spawn_test_server(config: GatewayConfig) -> (SocketAddr, JoinHandle<()>) {
		let state = build_test_state(config);
		let router = server::router(state);
		let listener = TcpListener::bind("127.0.0.1:0")
			.await
			.expect("Ephemeral test listener should bind successfully.");
		let addr = listener.local_addr().expect("Test listener should expose its address.");
		let handle = tokio::spawn(async move {
			axum::serve(listener, router).await.expect("Test server should run until aborted.");
		});

		(addr, handle)
	}

	/// Reads a gateway response body as JSON.
	pub async fn response_json(response: reqwest::Response) -> Value {
		let bytes = response.bytes().await.expect("Gateway response body should be readable.");

		serde_json::from_slice(&bytes).expect("Gateway response body should be JSON.")
	}

	/// Plain reqwest client used by tests to call the gateway itself.
	pub fn gateway_client() -> ReqwestClient {
		ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build gateway test client.")
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use bytes::Bytes;
	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
