//! The OAuth relay: start a flow, redeem a callback, report health.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{Config, Mode};
use crate::error::{RelayError, RelayResult};
use crate::provider::{SlackClient, TokenExchangeResult, TokenExchanger};
use crate::state::{InMemoryStateStore, RequesterMeta, StateStore, state_prefix};

/// Query parameters accepted by the start endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StartParams {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

/// Query parameters sent by Slack to the callback endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// A redeemed callback: the exchanged token and who asked for it.
#[derive(Debug)]
pub struct Authorized {
    pub result: TokenExchangeResult,
    pub requester: RequesterMeta,
}

/// Liveness snapshot.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime: f64,
    pub mode: Mode,
    pub pending_states: usize,
}

/// Static relay metadata.
#[derive(Debug, Serialize)]
pub struct RelayInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub mode: Mode,
    pub scopes: Vec<String>,
    pub callback_url: Option<String>,
    pub state_ttl_secs: u64,
    pub endpoints: &'static [&'static str],
}

/// Endpoint paths reported by `/info`.
const ENDPOINTS: &[&str] = &["/", "/auth/start", "/auth/callback", "/health", "/info"];

/// Treat blank query values as absent.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Relay component shared by every transport.
pub struct Relay {
    config: Config,
    store: Arc<dyn StateStore>,
    exchanger: Arc<dyn TokenExchanger>,
    started_at: Instant,
}

impl Relay {
    /// Create a relay from explicit collaborators.
    #[must_use]
    pub fn new(
        config: Config,
        store: Arc<dyn StateStore>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Self {
        Self { config, store, exchanger, started_at: Instant::now() }
    }

    /// Create a relay with an in-memory store and the Slack token client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(InMemoryStateStore::new(config.state_ttl));
        let exchanger = Arc::new(SlackClient::new(&config)?);
        Ok(Self::new(config, store, exchanger))
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.store)
    }

    fn flow_callback_url(&self) -> RelayResult<&str> {
        self.config.flow_callback_url().map_err(|e| RelayError::configuration(e.to_string()))
    }

    /// Build the Slack authorization URL for a minted state.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the client ID, callback URL or
    /// authorization endpoint is unusable.
    pub fn authorization_url(&self, state: &str) -> RelayResult<Url> {
        let callback_url = self.flow_callback_url()?;

        let scopes = self.config.scopes.join(",");
        Url::parse_with_params(
            &self.config.authorize_url,
            [
                ("client_id", self.config.client_id.as_str()),
                ("user_scope", scopes.as_str()),
                ("redirect_uri", callback_url),
                ("state", state),
            ],
        )
        .map_err(|e| RelayError::configuration(format!("invalid authorize URL: {e}")))
    }

    /// Begin a flow: store sanitized requester metadata and return the redirect target.
    ///
    /// Configuration is checked before anything is stored, so a misconfigured
    /// relay never mints state or redirects to an incomplete URL.
    ///
    /// # Errors
    ///
    /// Returns a configuration error or a state store failure.
    pub async fn start_flow(&self, params: &StartParams) -> RelayResult<Url> {
        if let Err(e) = self.flow_callback_url() {
            tracing::error!(error = %e, "Cannot start flow: relay is misconfigured");
            return Err(e);
        }

        let meta = RequesterMeta::sanitized(params.user_id.as_deref(), params.user_name.as_deref());
        let state = self.store.create(meta).await?;
        let url = match self.authorization_url(&state) {
            Ok(url) => url,
            Err(e) => {
                // Discard the state that will never be redeemed.
                self.store.consume(&state).await?;
                tracing::error!(error = %e, "Cannot build authorization URL");
                return Err(e);
            }
        };

        tracing::info!(state = state_prefix(&state), "Started authorization flow");
        Ok(url)
    }

    /// Redeem a provider callback.
    ///
    /// The state is consumed before the token exchange, so a failed exchange
    /// still invalidates it and the same code/state pair cannot be replayed.
    ///
    /// # Errors
    ///
    /// Returns the provider's denial, a malformed or unknown callback, or the
    /// exchange failure.
    pub async fn handle_callback(&self, params: &CallbackParams) -> RelayResult<Authorized> {
        if let Some(error) = present(params.error.as_deref()) {
            tracing::warn!(provider_error = error, "Provider reported authorization failure");
            return Err(RelayError::provider_denied(error));
        }

        let Some(code) = present(params.code.as_deref()) else {
            tracing::warn!("Callback without code");
            return Err(RelayError::MalformedCallback { missing: "code" });
        };
        let Some(state) = present(params.state.as_deref()) else {
            tracing::warn!("Callback without state");
            return Err(RelayError::MalformedCallback { missing: "state" });
        };

        let Some(requester) = self.store.consume(state).await? else {
            tracing::warn!(state = state_prefix(state), "Unknown, expired or replayed state");
            return Err(RelayError::InvalidState);
        };

        match self.exchanger.exchange(code).await {
            Ok(result) => {
                tracing::info!(
                    state = state_prefix(state),
                    owner_id = %result.owner_id,
                    "Callback redeemed"
                );
                Ok(Authorized { result, requester })
            }
            Err(e) => {
                tracing::warn!(
                    state = state_prefix(state),
                    diagnostic = %e.diagnostic(),
                    "Token exchange failed"
                );
                Err(RelayError::Exchange(e))
            }
        }
    }

    /// Report uptime and mode.
    ///
    /// # Errors
    ///
    /// Returns error if the state store cannot be queried.
    pub async fn health(&self) -> RelayResult<HealthStatus> {
        let pending_states = self.store.pending_count().await?;
        Ok(HealthStatus {
            status: "healthy",
            timestamp: Utc::now(),
            uptime: self.started_at.elapsed().as_secs_f64(),
            mode: self.config.mode,
            pending_states,
        })
    }

    /// Static metadata. Never includes the client secret.
    #[must_use]
    pub fn info(&self) -> RelayInfo {
        RelayInfo {
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            mode: self.config.mode,
            scopes: self.config.scopes.clone(),
            callback_url: self.config.callback_url().map(str::to_string),
            state_ttl_secs: self.config.state_ttl.as_secs(),
            endpoints: ENDPOINTS,
        }
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay").field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{ExchangeError, ExchangeResult};
    use crate::provider::AccessToken;

    /// Exchanger that counts calls and answers from a fixed outcome.
    struct FakeExchanger {
        calls: AtomicUsize,
        fail_with: Option<&'static str>,
    }

    impl FakeExchanger {
        fn ok() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail_with: None })
        }

        fn failing(code: &'static str) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail_with: Some(code) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl TokenExchanger for FakeExchanger {
        async fn exchange(&self, _code: &str) -> ExchangeResult<TokenExchangeResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(code) = self.fail_with {
                return Err(ExchangeError::provider(code));
            }
            Ok(TokenExchangeResult {
                access_token: AccessToken::new("xoxp-test"),
                owner_id: "U1".to_string(),
                owner_name: "Test".to_string(),
                team_name: "T".to_string(),
                granted_scopes: crate::provider::parse_scopes("a,b"),
            })
        }
    }

    fn relay_with(exchanger: Arc<FakeExchanger>) -> Relay {
        let config = Config::for_testing("http://slack.mock");
        let store = Arc::new(InMemoryStateStore::new(config.state_ttl));
        Relay::new(config, store, exchanger)
    }

    fn state_of(url: &Url) -> String {
        url.query_pairs().find(|(k, _)| k == "state").map(|(_, v)| v.into_owned()).unwrap()
    }

    fn callback(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_start_flow_builds_authorize_url() {
        let relay = relay_with(FakeExchanger::ok());
        let url = relay.start_flow(&StartParams::default()).await.unwrap();

        assert_eq!(url.path(), "/oauth/v2/authorize");
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "test-client-id");
        assert_eq!(pairs["redirect_uri"], "https://relay.example.com/auth/callback");
        assert!(pairs["user_scope"].contains("channels:read"));
        assert_eq!(pairs["state"].len(), crate::state::STATE_TOKEN_LEN);
    }

    #[tokio::test]
    async fn test_start_flow_without_requester_stores_empty_strings() {
        let relay = relay_with(FakeExchanger::ok());
        let url = relay.start_flow(&StartParams::default()).await.unwrap();

        let meta = relay.store.consume(&state_of(&url)).await.unwrap().unwrap();
        assert_eq!(meta, RequesterMeta::default());
    }

    #[tokio::test]
    async fn test_start_flow_misconfigured_mints_nothing() {
        let mut config = Config::for_testing("http://slack.mock");
        config.callback_url = None;
        let store = Arc::new(InMemoryStateStore::new(config.state_ttl));
        let relay = Relay::new(config, store, FakeExchanger::ok());

        let err = relay.start_flow(&StartParams::default()).await.unwrap_err();
        assert!(matches!(err, RelayError::Configuration(_)));
        assert!(err.to_string().contains("SLACK_REDIRECT_URI"));
        assert_eq!(relay.store.pending_count().await.unwrap(), 0);

        let mut config = Config::for_testing("http://slack.mock");
        config.client_id = String::new();
        let store = Arc::new(InMemoryStateStore::new(config.state_ttl));
        let relay = Relay::new(config, store, FakeExchanger::ok());

        let err = relay.start_flow(&StartParams::default()).await.unwrap_err();
        assert!(err.to_string().contains("SLACK_CLIENT_ID"));
        assert!(relay.authorization_url("s").is_err());
        assert_eq!(relay.store.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_skips_exchange() {
        let exchanger = FakeExchanger::ok();
        let relay = relay_with(exchanger.clone());

        let err = relay
            .handle_callback(&callback(Some("abc"), Some("s"), Some("access_denied")))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ProviderDenied { .. }));
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_code_or_state_is_malformed() {
        let relay = relay_with(FakeExchanger::ok());

        let err = relay.handle_callback(&callback(None, Some("s"), None)).await.unwrap_err();
        assert!(matches!(err, RelayError::MalformedCallback { missing: "code" }));

        let err = relay.handle_callback(&callback(Some("abc"), Some(" "), None)).await.unwrap_err();
        assert!(matches!(err, RelayError::MalformedCallback { missing: "state" }));
    }

    #[tokio::test]
    async fn test_unknown_state_skips_exchange() {
        let exchanger = FakeExchanger::ok();
        let relay = relay_with(exchanger.clone());

        let err = relay
            .handle_callback(&callback(Some("abc"), Some("deadbeef"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidState));
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_exchange_still_consumes_state() {
        let exchanger = FakeExchanger::failing("invalid_code");
        let relay = relay_with(exchanger.clone());
        let url = relay.start_flow(&StartParams::default()).await.unwrap();
        let state = state_of(&url);

        let err = relay.handle_callback(&callback(Some("abc"), Some(&state), None)).await.unwrap_err();
        assert!(matches!(err, RelayError::Exchange(_)));
        assert!(err.to_user_message().contains("invalid_code"));

        let err = relay.handle_callback(&callback(Some("abc"), Some(&state), None)).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidState));
        assert_eq!(exchanger.calls(), 1);
    }

    #[tokio::test]
    async fn test_successful_callback_returns_requester() {
        let relay = relay_with(FakeExchanger::ok());
        let params = StartParams { user_id: Some("u1".to_string()), user_name: None };
        let url = relay.start_flow(&params).await.unwrap();

        let authorized = relay
            .handle_callback(&callback(Some("abc"), Some(&state_of(&url)), None))
            .await
            .unwrap();
        assert_eq!(authorized.result.access_token.expose(), "xoxp-test");
        assert_eq!(authorized.requester.requester_id, "u1");
    }

    #[tokio::test]
    async fn test_health_and_info() {
        let relay = relay_with(FakeExchanger::ok());
        let health = relay.health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.mode, Mode::Server);

        let info = serde_json::to_value(relay.info()).unwrap();
        assert_eq!(info["service"], "slack-token-relay");
        assert!(!info.to_string().contains("test-client-secret"));
    }
}
