//! Slack Token Relay - Entry Point
//!
//! Provides both an HTTP listener and a line-delimited invocation transport.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use slack_token_relay::config::{Config, Mode, defaults};
use slack_token_relay::relay::Relay;
use slack_token_relay::server::RelayServer;

#[derive(Parser, Debug)]
#[command(name = "slack-token-relay")]
#[command(about = "One-shot Slack OAuth relay that shows a user token once")]
#[command(version)]
struct Cli {
    /// Slack app client ID
    #[arg(long, env = "SLACK_CLIENT_ID", default_value = "")]
    client_id: String,

    /// Slack app client secret
    #[arg(long, env = "SLACK_CLIENT_SECRET", default_value = "", hide_env_values = true)]
    client_secret: String,

    /// Registered OAuth redirect URL (e.g., https://relay.example.com/auth/callback)
    #[arg(long, env = "SLACK_REDIRECT_URI")]
    callback_url: Option<String>,

    /// HTTP server port (only used with --transport http)
    #[arg(long, default_value_t = defaults::LISTEN_PORT, env = "PORT")]
    port: u16,

    /// Seconds a state token stays redeemable
    #[arg(long, default_value_t = defaults::STATE_TTL.as_secs(), env = "STATE_TTL_SECS")]
    state_ttl_secs: u64,

    /// Seconds between sweeps of expired state tokens
    #[arg(long, default_value_t = defaults::SWEEP_INTERVAL.as_secs(), env = "SWEEP_INTERVAL_SECS")]
    sweep_interval_secs: u64,

    /// Comma-separated user scopes (defaults to the read-only set)
    #[arg(long, env = "RELAY_SCOPES")]
    scopes: Option<String>,

    /// Override the Slack authorization endpoint
    #[arg(long, env = "SLACK_AUTHORIZE_URL")]
    authorize_url: Option<String>,

    /// Override the Slack token endpoint
    #[arg(long, env = "SLACK_TOKEN_URL")]
    token_url: Option<String>,

    /// Transport mode: http or invoke
    #[arg(long, default_value = "http")]
    transport: Transport,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum Transport {
    /// Long-running HTTP listener
    #[default]
    Http,
    /// JSON request events on stdin, responses on stdout
    Invoke,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::new(self.client_id, self.client_secret, self.callback_url);
        config.listen_port = self.port;
        config.state_ttl = Duration::from_secs(self.state_ttl_secs);
        config.sweep_interval = Duration::from_secs(self.sweep_interval_secs);
        config.mode = match self.transport {
            Transport::Http => Mode::Server,
            Transport::Invoke => Mode::Invocation,
        };
        if let Some(url) = self.authorize_url {
            config.authorize_url = url;
        }
        if let Some(url) = self.token_url {
            config.token_url = url;
        }
        match self.scopes {
            Some(list) => config.with_scopes(&list),
            None => config,
        }
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Logs go to stderr so stdout stays free for invocation responses.
    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let transport = cli.transport;
    let config = cli.into_config();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?transport,
        mode = %config.mode,
        "Starting Slack token relay"
    );

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Refusing to start with incomplete configuration");
        return Err(e).context("invalid relay configuration");
    }
    if config.callback_url().is_none() {
        tracing::warn!("SLACK_REDIRECT_URI is not set; /auth/start will report a configuration error");
    }

    let server = RelayServer::new(Relay::from_config(config)?);

    match transport {
        Transport::Http => server.run_http().await?,
        Transport::Invoke => server.run_invocations().await?,
    }

    Ok(())
}
