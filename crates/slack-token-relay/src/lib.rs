//! Slack Token Relay
//!
//! A one-shot OAuth relay for Slack user tokens. It redirects a user to
//! Slack's authorization page, redeems the callback's authorization code
//! server-to-server, and shows the resulting token once without storing it.
//!
//! # Features
//!
//! - **Single-use state**: anti-forgery tokens are consumed before the exchange
//! - **Swappable store**: [`state::StateStore`] abstracts the pending-flow map
//! - **Two transports**: axum listener and line-delimited JSON invocations
//! - **No secrets in logs**: tokens are redacted in every `Debug` output
//!
//! # Example
//!
//! ```no_run
//! use slack_token_relay::{config::Config, relay::Relay, server::RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new("client-id", "client-secret", Some("https://relay.example.com/auth/callback".into()));
//!     config.validate()?;
//!     RelayServer::new(Relay::from_config(config)?).run_http().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod relay;
pub mod render;
pub mod sanitize;
pub mod server;
pub mod state;

pub use config::Config;
pub use error::{ExchangeError, RelayError};
pub use relay::Relay;
