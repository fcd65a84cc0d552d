use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, info};

use bombard::{Engine, EngineConfig, ParamUpdate, Parameters};

/// Bombard - live-tunable HTTP load generator
#[derive(Parser, Debug)]
#[command(name = "bombard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Target host
    #[arg(long, default_value = bombard::config::DEFAULT_HOST)]
    host: String,

    /// Target port
    #[arg(long, default_value_t = bombard::config::DEFAULT_PORT)]
    port: u16,

    /// Initial concurrency cap (in-flight requests)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Initial target rate in requests per second
    #[arg(long)]
    rate: Option<f64>,

    /// Payload radius
    #[arg(long)]
    radius: Option<f64>,

    /// Payload transparency in [0, 1]
    #[arg(long)]
    transparency: Option<f64>,

    /// Payload growth time in milliseconds
    #[arg(long = "growth-ms")]
    growth_ms: Option<u64>,

    /// Stop automatically after this many seconds (default: run until Ctrl-C)
    #[arg(long)]
    duration: Option<f64>,

    /// Debug logging instead of info
    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,
}

impl Cli {
    /// Fold CLI overrides into the initial parameters, clamped like any
    /// other parameter write.
    fn initial_parameters(&self) -> Parameters {
        let mut params = Parameters::default();
        if let Some(v) = self.concurrency {
            params.apply(ParamUpdate::Concurrency(v));
        }
        if let Some(v) = self.rate {
            params.apply(ParamUpdate::RateHz(v));
        }
        if let Some(v) = self.radius {
            params.apply(ParamUpdate::Radius(v));
        }
        if let Some(v) = self.transparency {
            params.apply(ParamUpdate::Transparency(v));
        }
        if let Some(v) = self.growth_ms {
            params.apply(ParamUpdate::GrowthMs(v));
        }
        params
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let mut config = EngineConfig::from_env();
    config.host = cli.host.clone();
    config.port = cli.port;
    config.initial = cli.initial_parameters();

    println!(
        "Bombarding http://{}:{} (concurrency={}, rate={} req/s)",
        config.host, config.port, config.initial.concurrency, config.initial.rate_hz
    );

    let engine = Arc::new(Engine::new(config)?);
    engine.start()?;

    // Periodic progress line until the run ends.
    let reporter = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                let stats = engine.stats();
                info!(
                    sent = stats.total_sent,
                    errors = stats.errors,
                    rate = format!("{:.1}", stats.current_rate),
                    "progress"
                );
            }
        })
    };

    match cli.duration {
        Some(secs) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupted, stopping"),
                _ = tokio::time::sleep(Duration::from_secs_f64(secs.max(0.0))) => {
                    info!("duration elapsed, stopping")
                }
            }
        }
        None => {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupted, stopping");
        }
    }

    reporter.abort();
    engine.stop().await;

    let stats = engine.stats();
    println!(
        "Done: sent={} errors={} avg_rate={:.1} req/s{}",
        stats.total_sent,
        stats.errors,
        stats.current_rate,
        stats
            .last_error
            .map(|e| format!(" last_error={e}"))
            .unwrap_or_default()
    );

    Ok(())
}
