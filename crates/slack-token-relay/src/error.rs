//! Error types for the Slack token relay.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use std::time::Duration;

use axum::http::StatusCode;

/// Errors in startup configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A required setting is absent or blank
    #[error("Missing required setting {name}")]
    Missing {
        /// Environment variable / flag name
        name: &'static str,
    },

    /// A setting is present but unusable
    #[error("Invalid setting {name}: {message}")]
    Invalid {
        /// Environment variable / flag name
        name: &'static str,
        /// What is wrong with it
        message: String,
    },
}

impl ConfigError {
    /// Create a missing-setting error.
    #[must_use]
    pub const fn missing(name: &'static str) -> Self {
        Self::Missing { name }
    }

    /// Create an invalid-setting error.
    #[must_use]
    pub fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { name, message: message.into() }
    }
}

/// Errors from a state store backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Backend could not be reached or refused the operation
    #[error("State store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the server-to-server token exchange.
#[derive(thiserror::Error, Debug)]
pub enum ExchangeError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider did not answer in time
    #[error("Token exchange timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status from the token endpoint
    #[error("Token endpoint returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Provider answered `ok: false`
    #[error("Provider rejected the exchange: {code}")]
    Provider {
        /// Provider diagnostic string such as `invalid_code`
        code: String,
    },

    /// JSON parsing error
    #[error("Failed to parse token response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ExchangeError {
    /// Create a provider-reported failure.
    #[must_use]
    pub fn provider(code: impl Into<String>) -> Self {
        Self::Provider { code: code.into() }
    }

    /// Create a non-success status error.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status { status, message: message.into() }
    }

    /// Short diagnostic code suitable for showing to the user.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Provider { code } => code.clone(),
            Self::Status { status, .. } => format!("http_{status}"),
            Self::Timeout(_) => "timeout".to_string(),
            Self::Http(_) => "network_error".to_string(),
            Self::Parse(_) => "invalid_response".to_string(),
        }
    }
}

/// Errors while building an HTML page.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// Writing into the page buffer failed
    #[error("Failed to format page: {0}")]
    Format(#[from] std::fmt::Error),

    /// Embedding page data as JSON failed
    #[error("Failed to encode page data: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors surfaced to the user by relay operations.
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    /// Relay is missing settings needed for this operation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// User or provider declined the authorization
    #[error("Authorization denied by provider: {error}")]
    ProviderDenied {
        /// Provider `error` query parameter
        error: String,
    },

    /// Callback lacks `code` or `state`
    #[error("Malformed callback: missing {missing}")]
    MalformedCallback {
        /// Name of the first missing parameter
        missing: &'static str,
    },

    /// State is unknown, expired, or already used
    #[error("Invalid or expired state")]
    InvalidState,

    /// Token exchange failed
    #[error("Token exchange failed: {0}")]
    Exchange(#[from] ExchangeError),

    /// State store backend failed
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// Response page could not be built
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

impl RelayError {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a provider-denied error.
    #[must_use]
    pub fn provider_denied(error: impl Into<String>) -> Self {
        Self::ProviderDenied { error: error.into() }
    }

    /// HTTP status reported for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::ProviderDenied { .. } | Self::MalformedCallback { .. } | Self::InvalidState => {
                StatusCode::BAD_REQUEST
            }
            Self::Configuration(_) | Self::Exchange(_) | Self::Store(_) | Self::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::ProviderDenied { .. } => "provider_denied",
            Self::MalformedCallback { .. } => "malformed_callback",
            Self::InvalidState => "invalid_state",
            Self::Exchange(_) => "exchange_error",
            Self::Store(_) => "store_error",
            Self::Render(_) => "render_error",
        }
    }

    /// Page heading for this error.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "Relay is not configured",
            Self::ProviderDenied { .. } => "Authorization was not granted",
            Self::MalformedCallback { .. } => "Incomplete callback",
            Self::InvalidState => "Invalid or expired request",
            Self::Exchange(_) => "Token exchange failed",
            Self::Store(_) | Self::Render(_) => "Internal error",
        }
    }

    /// Convert to a user-friendly message for the error page.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        match self {
            Self::Configuration(message) => {
                format!("The relay is missing required configuration ({message}). Contact the operator.")
            }
            Self::ProviderDenied { error } => {
                format!("Slack reported \"{error}\". Start again if you want to authorize.")
            }
            Self::MalformedCallback { missing } => {
                format!("The callback is missing its \"{missing}\" parameter. Start the flow again.")
            }
            Self::InvalidState => {
                "This authorization request is unknown, expired, or was already used. Start the flow again."
                    .to_string()
            }
            Self::Exchange(err) => format!(
                "Slack did not issue a token (error: {}). Start the flow again.",
                err.diagnostic()
            ),
            Self::Store(_) | Self::Render(_) => {
                "Something went wrong on our side. Start the flow again.".to_string()
            }
        }
    }
}

/// Result type alias for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Result type alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
