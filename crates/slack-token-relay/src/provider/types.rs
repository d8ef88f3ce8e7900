//! Slack `oauth.v2.access` wire types.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::{ExchangeError, ExchangeResult};

/// A user access token. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for rendering to the user who authorized it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Token family prefix such as `xoxp` or `xoxe.xoxp`, safe to log.
    ///
    /// Anything that is not a recognized Slack prefix reports `unknown`, so
    /// no part of an unexpected token format reaches the logs.
    #[must_use]
    pub fn kind(&self) -> &str {
        let Some((prefix, rest)) = self.0.split_once('-') else {
            return "unknown";
        };
        let family = prefix.strip_prefix("xoxe.").unwrap_or(prefix);
        if rest.is_empty() || !is_slack_family(family) {
            return "unknown";
        }
        prefix
    }
}

/// `xox` followed by one lowercase letter, e.g. `xoxp` or `xoxb`.
fn is_slack_family(prefix: &str) -> bool {
    prefix
        .strip_prefix("xox")
        .is_some_and(|tail| tail.len() == 1 && tail.bytes().all(|b| b.is_ascii_lowercase()))
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken({}-<redacted>)", self.kind())
    }
}

/// Outcome of a successful exchange. Lives only as long as the response.
#[derive(Debug, Clone)]
pub struct TokenExchangeResult {
    pub access_token: AccessToken,
    pub owner_id: String,
    pub owner_name: String,
    pub team_name: String,
    pub granted_scopes: BTreeSet<String>,
}

/// Response body of the token endpoint.
#[derive(Debug, Deserialize)]
pub struct OAuthAccessResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub authed_user: Option<AuthedUser>,
    #[serde(default)]
    pub team: Option<Team>,
}

/// The `authed_user` object carrying the user token.
#[derive(Deserialize)]
pub struct AuthedUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Debug for AuthedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthedUser")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Split a comma-separated scope string into a set.
#[must_use]
pub fn parse_scopes(scope: &str) -> BTreeSet<String> {
    scope.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

impl OAuthAccessResponse {
    /// Convert into an exchange result, honoring the `ok` flag.
    pub fn into_result(self) -> ExchangeResult<TokenExchangeResult> {
        if !self.ok {
            return Err(ExchangeError::provider(
                self.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        let user = self.authed_user.ok_or_else(|| ExchangeError::provider("missing_authed_user"))?;
        let token = user
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExchangeError::provider("missing_access_token"))?;

        Ok(TokenExchangeResult {
            access_token: AccessToken::new(token),
            owner_id: user.id.unwrap_or_default(),
            owner_name: user.name.unwrap_or_default(),
            team_name: self.team.and_then(|t| t.name).unwrap_or_default(),
            granted_scopes: user.scope.as_deref().map(parse_scopes).unwrap_or_default(),
        })
    }
}
