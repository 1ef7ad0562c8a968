use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use turnstile::prelude::*;

/// Turn-rotation server for one shared game.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
    /// Warning window before a turn starts, in seconds
    #[arg(long, default_value_t = 5)]
    prepare_secs: u64,
    /// Length of one turn, in seconds
    #[arg(long, default_value_t = 60)]
    round_secs: u64,
    /// Countdown update interval, in milliseconds
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,
    /// How long to wait for the game to report a final score, in seconds
    #[arg(long, default_value_t = 5)]
    report_timeout_secs: u64,
    /// Close connections that stay silent this long, in seconds
    #[arg(long)]
    idle_timeout_secs: Option<u64>,
}

impl Args {
    fn round_config(&self) -> RoundConfig {
        RoundConfig {
            prepare_duration: Duration::from_secs(self.prepare_secs),
            round_duration: Duration::from_secs(self.round_secs),
            tick_interval: Duration::from_millis(self.tick_ms),
            report_timeout: Duration::from_secs(self.report_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), TurnstileError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let mut builder = TurnstileServer::builder()
        .bind(&addr)
        .round_config(args.round_config());
    if let Some(secs) = args.idle_timeout_secs {
        builder = builder.idle_timeout(Duration::from_secs(secs));
    }

    let server = builder.build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");
    server.run().await
}
