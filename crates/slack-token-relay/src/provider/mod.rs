//! Server-to-server token exchange with Slack.
//!
//! Authorization codes are single-use, so the exchange is attempted exactly
//! once with a bounded timeout and no retry middleware.

mod types;

use reqwest::Client;

use crate::config::Config;
use crate::error::{ExchangeError, ExchangeResult};

pub use types::{AccessToken, AuthedUser, OAuthAccessResponse, Team, TokenExchangeResult, parse_scopes};

/// Longest slice of an error body kept in an [`ExchangeError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Exchanges an authorization code for a user token.
#[async_trait::async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self, code: &str) -> ExchangeResult<TokenExchangeResult>;
}

/// Token endpoint client.
#[derive(Clone)]
pub struct SlackClient {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: Option<String>,
    request_timeout: std::time::Duration,
}

impl SlackClient {
    /// Create a client from the relay configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("slack-token-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.callback_url().map(str::to_string),
            request_timeout: config.request_timeout,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ExchangeError {
        if err.is_timeout() {
            ExchangeError::Timeout(self.request_timeout)
        } else {
            ExchangeError::Http(err.without_url())
        }
    }
}

#[async_trait::async_trait]
impl TokenExchanger for SlackClient {
    async fn exchange(&self, code: &str) -> ExchangeResult<TokenExchangeResult> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
        ];
        if let Some(ref redirect_uri) = self.redirect_uri {
            form.push(("redirect_uri", redirect_uri.as_str()));
        }

        tracing::debug!(endpoint = %self.token_url, "Exchanging authorization code");

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Token endpoint returned error status");
            let message: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(ExchangeError::status(status.as_u16(), message));
        }

        let parsed: OAuthAccessResponse = serde_json::from_str(&body)?;
        let result = parsed.into_result();
        match &result {
            Ok(exchanged) => tracing::info!(
                token_kind = exchanged.access_token.kind(),
                scopes = exchanged.granted_scopes.len(),
                "Token exchange succeeded"
            ),
            Err(e) => tracing::warn!(error = %e, "Provider rejected token exchange"),
        }
        result
    }
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish()
    }
}
