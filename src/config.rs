//! Process-wide configuration, read once at startup and immutable afterwards.
//!
//! [`Args`] mirrors every setting as a CLI flag backed by an environment variable (a `.env` file
//! is honored through `dotenvy`). [`GatewayConfig`] is the validated value the rest of the crate
//! receives by injection; nothing reads the environment once traffic is accepted.

// std
use std::net::{IpAddr, SocketAddr};
// crates.io
use clap::{Parser, ValueEnum};
// self
use crate::{
	_prelude::*,
	auth::{AppId, AppSecret, LbsKey},
	error::ConfigError,
};

const DEFAULT_IDENTITY_BASE_URL: &str = "https://api.weixin.qq.com";
const DEFAULT_LBS_BASE_URL: &str = "https://apis.map.qq.com";

/// Forwarding policy; exactly one applies per deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ForwardMode {
	/// Forward unconditionally.
	#[default]
	Open,
	/// Require and validate a session marker before forwarding.
	SessionGated,
}
impl ForwardMode {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			ForwardMode::Open => "open",
			ForwardMode::SessionGated => "session-gated",
		}
	}
}
impl Display for ForwardMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Command-line and environment surface of the gateway binary.
#[derive(Clone, Debug, Parser)]
#[command(name = "lbs-gateway", version, about = "Session-checking gateway for LBS requests")]
pub struct Args {
	/// Mini-app identifier registered with the identity provider.
	#[arg(long, env = "WECHAT_APPID")]
	pub app_id: String,
	/// Mini-app secret paired with the identifier.
	#[arg(long, env = "WECHAT_SECRET", hide_env_values = true)]
	pub app_secret: String,
	/// Static LBS key injected into forwarded requests.
	#[arg(long, env = "TENCENT_MAP_KEY", hide_env_values = true)]
	pub lbs_key: String,
	/// Address to bind.
	#[arg(long, env = "HOST", default_value = "0.0.0.0")]
	pub host: IpAddr,
	/// Port to listen on.
	#[arg(long, env = "PORT", default_value_t = 3000)]
	pub port: u16,
	/// Identity provider base URL.
	#[arg(long, env = "IDENTITY_BASE_URL", default_value = DEFAULT_IDENTITY_BASE_URL)]
	pub identity_base_url: String,
	/// LBS provider base URL.
	#[arg(long, env = "LBS_BASE_URL", default_value = DEFAULT_LBS_BASE_URL)]
	pub lbs_base_url: String,
	/// Timeout for each identity provider call, in milliseconds.
	#[arg(long, env = "IDENTITY_TIMEOUT_MS", default_value_t = 5_000)]
	pub identity_timeout_ms: u64,
	/// Timeout for each forwarded call, in milliseconds.
	#[arg(long, env = "FORWARD_TIMEOUT_MS", default_value_t = 10_000)]
	pub forward_timeout_ms: u64,
	/// Forwarding policy.
	#[arg(long, env = "FORWARD_MODE", value_enum, default_value_t = ForwardMode::Open)]
	pub forward_mode: ForwardMode,
	/// Optional version prefix (e.g. `/v2`) mounted next to the unprefixed routes.
	#[arg(long, env = "ROUTE_PREFIX")]
	pub route_prefix: Option<String>,
	/// Reuse the app access token until shortly before its declared expiry.
	#[arg(long, env = "CACHE_APP_CREDENTIAL", default_value_t = false)]
	pub cache_app_credential: bool,
	/// Service name reported by the health probe.
	#[arg(long, env = "SERVICE_NAME", default_value = "lbs-gateway")]
	pub service_name: String,
	/// Log level used when `RUST_LOG` is unset.
	#[arg(long, env = "LOG_LEVEL", default_value = "info")]
	pub log_level: String,
}
impl Args {
	/// Loads `.env` (when present) and parses the process arguments.
	pub fn load() -> Self {
		let _ = dotenvy::dotenv();

		Self::parse()
	}
}

/// Validated, immutable gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
	/// Mini-app identifier.
	pub app_id: AppId,
	/// Mini-app secret.
	pub app_secret: AppSecret,
	/// Static LBS key.
	pub lbs_key: LbsKey,
	/// Socket address to bind.
	pub listen: SocketAddr,
	/// Identity provider base URL.
	pub identity_base_url: Url,
	/// LBS provider base URL.
	pub lbs_base_url: Url,
	/// Bound applied to every identity provider call.
	pub identity_timeout: Duration,
	/// Bound applied to every forwarded call.
	pub forward_timeout: Duration,
	/// Forwarding policy.
	pub forward_mode: ForwardMode,
	/// Optional version prefix.
	pub route_prefix: Option<String>,
	/// Whether the app access token is cached.
	pub cache_app_credential: bool,
	/// Service name reported by the health probe.
	pub service_name: String,
}
impl GatewayConfig {
	/// Default identity call bound.
	pub const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_secs(5);
	/// Default forwarding call bound.
	pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

	/// Creates a configuration with the default upstreams, timeouts, and open forwarding.
	pub fn new(
		app_id: AppId,
		app_secret: AppSecret,
		lbs_key: LbsKey,
	) -> Result<Self, ConfigError> {
		Ok(Self {
			app_id,
			app_secret,
			lbs_key,
			listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
			identity_base_url: parse_url("identity base", DEFAULT_IDENTITY_BASE_URL)?,
			lbs_base_url: parse_url("LBS base", DEFAULT_LBS_BASE_URL)?,
			identity_timeout: Self::DEFAULT_IDENTITY_TIMEOUT,
			forward_timeout: Self::DEFAULT_FORWARD_TIMEOUT,
			forward_mode: ForwardMode::Open,
			route_prefix: None,
			cache_app_credential: false,
			service_name: "lbs-gateway".into(),
		})
	}

	/// Overrides the identity provider base URL.
	pub fn with_identity_base_url(mut self, url: Url) -> Self {
		self.identity_base_url = url;

		self
	}

	/// Overrides the LBS provider base URL.
	pub fn with_lbs_base_url(mut self, url: Url) -> Self {
		self.lbs_base_url = url;

		self
	}

	/// Overrides the identity call bound.
	pub fn with_identity_timeout(mut self, timeout: Duration) -> Self {
		self.identity_timeout = timeout;

		self
	}

	/// Overrides the forwarding call bound.
	pub fn with_forward_timeout(mut self, timeout: Duration) -> Self {
		self.forward_timeout = timeout;

		self
	}

	/// Overrides the forwarding policy.
	pub fn with_forward_mode(mut self, mode: ForwardMode) -> Self {
		self.forward_mode = mode;

		self
	}

	/// Mounts the routes under an additional version prefix.
	pub fn with_route_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.route_prefix = Some(prefix.into());

		self
	}

	/// Enables or disables app credential caching.
	pub fn with_credential_cache(mut self, enabled: bool) -> Self {
		self.cache_app_credential = enabled;

		self
	}

	/// Checks the invariants that cannot be enforced by construction.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_base_url("identity base", &self.identity_base_url)?;
		validate_base_url("LBS base", &self.lbs_base_url)?;

		if let Some(prefix) = self.route_prefix.as_ref().filter(|prefix| !is_route_prefix(prefix)) {
			return Err(ConfigError::InvalidRoutePrefix { prefix: prefix.clone() });
		}

		Ok(())
	}
}
impl TryFrom<Args> for GatewayConfig {
	type Error = ConfigError;

	fn try_from(args: Args) -> Result<Self, Self::Error> {
		let identity_base_url = parse_url("identity base", &args.identity_base_url)?;
		let lbs_base_url = parse_url("LBS base", &args.lbs_base_url)?;
		let config = Self {
			app_id: AppId::new(&args.app_id)?,
			app_secret: AppSecret::new(args.app_secret)?,
			lbs_key: LbsKey::new(args.lbs_key)?,
			listen: SocketAddr::new(args.host, args.port),
			identity_base_url,
			lbs_base_url,
			identity_timeout: Duration::from_millis(args.identity_timeout_ms),
			forward_timeout: Duration::from_millis(args.forward_timeout_ms),
			forward_mode: args.forward_mode,
			route_prefix: args.route_prefix.filter(|prefix| !prefix.is_empty()),
			cache_app_credential: args.cache_app_credential,
			service_name: args.service_name,
		};

		config.validate()?;

		Ok(config)
	}
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
	Url::parse(value).map_err(|source| ConfigError::InvalidUrl { name, source })
}

fn is_route_prefix(prefix: &str) -> bool {
	prefix.len() > 1 && prefix.starts_with('/') && !prefix.ends_with('/')
}

fn validate_base_url(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if !matches!(url.scheme(), "http" | "https") {
		return Err(ConfigError::UnsupportedScheme { name, url: url.to_string() });
	}
	if url.cannot_be_a_base() {
		return Err(ConfigError::CannotBeBase { name, url: url.to_string() });
	}

	Ok(())
}
