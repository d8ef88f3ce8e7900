//! Configuration for the Slack token relay.

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Slack endpoint constants.
pub mod slack {
    use std::time::Duration;

    /// User-facing authorization endpoint.
    pub const AUTHORIZE_URL: &str = "https://slack.com/oauth/v2/authorize";

    /// Server-to-server token endpoint.
    pub const TOKEN_URL: &str = "https://slack.com/api/oauth.v2.access";

    /// Upper bound for the whole token exchange request.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Relay defaults.
pub mod defaults {
    use std::time::Duration;

    /// Listen port when `PORT` is unset.
    pub const LISTEN_PORT: u16 = 3000;

    /// How long a minted state token stays redeemable (10 minutes).
    pub const STATE_TTL: Duration = Duration::from_secs(600);

    /// How often expired state tokens are swept (5 minutes).
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
}

/// Permission scope sets.
pub mod scopes {
    /// Canonical read-only user scopes requested by the relay.
    pub const READ_ONLY: &[&str] = &[
        "channels:history",
        "channels:read",
        "groups:history",
        "groups:read",
        "im:history",
        "im:read",
        "mpim:history",
        "mpim:read",
        "search:read",
        "team:read",
        "users:read",
        "users:read.email",
    ];
}

/// How the relay is being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Long-running HTTP listener.
    #[default]
    Server,
    /// One JSON request event per line on stdin.
    Invocation,
}

impl Mode {
    /// Label reported by the health and info endpoints.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Invocation => "invocation",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Relay configuration, built once at startup.
#[derive(Clone)]
pub struct Config {
    /// Slack app client ID.
    pub client_id: String,

    /// Slack app client secret.
    pub client_secret: String,

    /// Registered OAuth redirect URL pointing at `/auth/callback`.
    pub callback_url: Option<String>,

    /// HTTP listen port.
    pub listen_port: u16,

    /// Lifetime of a pending state token.
    pub state_ttl: Duration,

    /// Period of the background sweep.
    pub sweep_interval: Duration,

    /// User scopes requested on the authorization URL.
    pub scopes: Vec<String>,

    /// Authorization endpoint (overridable for mock servers).
    pub authorize_url: String,

    /// Token endpoint (overridable for mock servers).
    pub token_url: String,

    /// Token exchange request timeout.
    pub request_timeout: Duration,

    /// Token exchange connection timeout.
    pub connect_timeout: Duration,

    /// Transport driving the relay.
    pub mode: Mode,
}

impl Config {
    /// Create a configuration with Slack endpoints and default timings.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        callback_url: Option<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            callback_url,
            listen_port: defaults::LISTEN_PORT,
            state_ttl: defaults::STATE_TTL,
            sweep_interval: defaults::SWEEP_INTERVAL,
            scopes: scopes::READ_ONLY.iter().map(|s| (*s).to_string()).collect(),
            authorize_url: slack::AUTHORIZE_URL.to_string(),
            token_url: slack::TOKEN_URL.to_string(),
            request_timeout: slack::REQUEST_TIMEOUT,
            connect_timeout: slack::CONNECT_TIMEOUT,
            mode: Mode::Server,
        }
    }

    /// Create a test configuration with provider URLs on a mock server.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            authorize_url: format!("{base_url}/oauth/v2/authorize"),
            token_url: format!("{base_url}/api/oauth.v2.access"),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            ..Self::new(
                "test-client-id",
                "test-client-secret",
                Some("https://relay.example.com/auth/callback".to_string()),
            )
        }
    }

    /// Replace the requested scopes with a comma- or space-separated list.
    ///
    /// Blank input keeps the current set.
    #[must_use]
    pub fn with_scopes(mut self, list: &str) -> Self {
        let parsed: Vec<String> = list
            .split([',', ' '])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !parsed.is_empty() {
            self.scopes = parsed;
        }
        self
    }

    /// Check that the credentials needed for any exchange are present and
    /// that every configured endpoint parses as a URL.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::missing("SLACK_CLIENT_ID"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::missing("SLACK_CLIENT_SECRET"));
        }
        if self.state_ttl.is_zero() {
            return Err(ConfigError::invalid("STATE_TTL_SECS", "must be greater than zero"));
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::invalid("SWEEP_INTERVAL_SECS", "must be greater than zero"));
        }
        check_url("SLACK_AUTHORIZE_URL", &self.authorize_url)?;
        check_url("SLACK_TOKEN_URL", &self.token_url)?;
        if let Some(callback_url) = self.callback_url() {
            check_url("SLACK_REDIRECT_URI", callback_url)?;
        }
        Ok(())
    }

    /// Callback URL, if one is configured and non-blank.
    #[must_use]
    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// Callback URL to send with an authorization redirect.
    ///
    /// # Errors
    ///
    /// Returns the first setting a redirect cannot be built without.
    pub fn flow_callback_url(&self) -> Result<&str, ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::missing("SLACK_CLIENT_ID"));
        }
        self.callback_url().ok_or(ConfigError::missing("SLACK_REDIRECT_URI"))
    }
}

fn check_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value).map(drop).map_err(|e| ConfigError::invalid(name, e.to_string()))
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("callback_url", &self.callback_url)
            .field("listen_port", &self.listen_port)
            .field("state_ttl", &self.state_ttl)
            .field("sweep_interval", &self.sweep_interval)
            .field("scopes", &self.scopes)
            .field("mode", &self.mode)
            .finish()
    }
}
