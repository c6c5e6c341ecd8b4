mod display;

use std::io::Stdout;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use coinwatch_client::{PatternExtractor, ReqwestFetcher};
use coinwatch_core::delivery::{self, Consumer};
use coinwatch_core::{
    CycleOutcome, OverlapPolicy, PatternSet, Record, RecordList, WatchConfig, Watcher,
    fingerprint,
};

#[derive(Parser)]
#[command(name = "coinwatch", version, about = "Poll a market listing page and print its rows")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the listing on a fixed interval until interrupted
    Watch {
        #[command(flatten)]
        target: TargetArgs,

        /// Milliseconds between cycle triggers
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Drop a trigger while the previous cycle is still running
        #[arg(long, default_value_t = false)]
        skip_overlap: bool,

        /// Exit after this many deliveries
        #[arg(long)]
        cycles: Option<u64>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Fetch and extract the listing once
    Once {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Listing page URL
    #[arg(short, long)]
    url: Option<String>,

    /// User-Agent sent with every request
    #[arg(long)]
    user_agent: Option<String>,

    /// JSON file with `name`, `price`, and `market_cap` patterns
    #[arg(short, long, env = "COINWATCH_PATTERNS")]
    patterns: Option<PathBuf>,

    /// Abort a fetch after this many seconds
    #[arg(long, env = "COINWATCH_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

#[derive(Args)]
struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Maximum rows per table
    #[arg(short, long, default_value_t = 10)]
    rows: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("coinwatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            target,
            interval_ms,
            skip_overlap,
            cycles,
            output,
        } => {
            let mut config = build_config(&target)?;
            if let Some(ms) = interval_ms {
                config = config.with_interval(Duration::from_millis(ms));
            }
            if skip_overlap {
                config = config.with_overlap(OverlapPolicy::Skip);
            }
            config.validate()?;
            cmd_watch(config, &target, cycles, &output).await?;
        }
        Commands::Once { target, output } => {
            let config = build_config(&target)?;
            cmd_once(config, &target, &output).await?;
        }
    }

    Ok(())
}

/// Environment first, then command-line overrides.
fn build_config(target: &TargetArgs) -> Result<WatchConfig> {
    let mut config = WatchConfig::from_env().context("Invalid COINWATCH_* environment")?;

    if let Some(path) = &target.patterns {
        config = config.with_patterns(
            PatternSet::from_json_file(path)
                .with_context(|| format!("Failed to load patterns from {}", path.display()))?,
        );
    }
    if let Some(url) = &target.url {
        config = config.with_url(url.clone());
    }
    if let Some(user_agent) = &target.user_agent {
        config = config.with_user_agent(user_agent.clone());
    }

    config.validate()?;
    Ok(config)
}

fn build_watcher(
    config: WatchConfig,
    target: &TargetArgs,
) -> Result<Watcher<ReqwestFetcher, PatternExtractor>> {
    let mut fetcher = ReqwestFetcher::new().with_user_agent(config.user_agent.clone());
    if let Some(secs) = target.timeout_secs {
        fetcher = fetcher.with_timeout(Duration::from_secs(secs));
    }
    let extractor = PatternExtractor::new(&config.patterns).context("Invalid field patterns")?;

    Watcher::new(fetcher, extractor, config).context("Invalid watcher configuration")
}

async fn cmd_watch(
    config: WatchConfig,
    target: &TargetArgs,
    cycles: Option<u64>,
    output: &OutputArgs,
) -> Result<()> {
    let watcher = build_watcher(config, target)?;
    let (tx, mut rx) = delivery::channel();
    let handle = watcher.spawn(tx);
    let mut consumer = TerminalConsumer::new(output);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut delivered = 0u64;
    let limit_reached = loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(d) => {
                    delivery::route(d, &mut consumer);
                    delivered += 1;
                    if cycles.is_some_and(|limit| delivered >= limit) {
                        break true;
                    }
                }
                None => break false,
            },
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break false;
            }
        }
    };

    handle.stop().await;

    // Cycles that were in flight at shutdown have delivered by now.
    if !limit_reached {
        while let Some(d) = rx.try_recv() {
            delivery::route(d, &mut consumer);
        }
    }

    Ok(())
}

async fn cmd_once(config: WatchConfig, target: &TargetArgs, output: &OutputArgs) -> Result<()> {
    let watcher = build_watcher(config, target)?;
    let mut consumer = TerminalConsumer::new(output);

    match watcher.run_once().await {
        CycleOutcome::Data(records) => {
            consumer.on_data(1, records);
            Ok(())
        }
        CycleOutcome::Failed { message, .. } => Err(anyhow::anyhow!(message)),
    }
}

/// Prints each delivery to stdout and failures to stderr.
struct TerminalConsumer {
    format: OutputFormat,
    rows: usize,
    last_fingerprint: Option<String>,
    csv: csv::Writer<Stdout>,
}

#[derive(serde::Serialize)]
struct CsvRow<'a> {
    cycle: u64,
    name: &'a str,
    price: &'a str,
    market_cap: &'a str,
}

impl TerminalConsumer {
    fn new(output: &OutputArgs) -> Self {
        Self {
            format: output.format,
            rows: output.rows,
            last_fingerprint: None,
            csv: csv::Writer::from_writer(std::io::stdout()),
        }
    }

    fn write_csv(&mut self, cycle: u64, records: &[Record]) -> Result<()> {
        for record in records.iter().take(self.rows) {
            self.csv.serialize(CsvRow {
                cycle,
                name: &record.name,
                price: &record.price,
                market_cap: &record.market_cap,
            })?;
        }
        self.csv.flush()?;
        Ok(())
    }
}

impl Consumer for TerminalConsumer {
    fn on_data(&mut self, cycle: u64, records: RecordList) {
        let current = fingerprint(&records);
        if self.last_fingerprint.as_deref() == Some(current.as_str()) {
            tracing::info!(%cycle, "Data unchanged");
        }
        self.last_fingerprint = Some(current);

        match self.format {
            OutputFormat::Table => {
                println!("Cycle {cycle}: {} records", records.len());
                print!("{}", display::render_table(&records, self.rows));
            }
            OutputFormat::Json => {
                let shown = &records[..records.len().min(self.rows)];
                let line = serde_json::json!({ "cycle": cycle, "records": shown });
                println!("{line}");
            }
            OutputFormat::Csv => {
                if let Err(e) = self.write_csv(cycle, &records) {
                    tracing::error!(error = %e, "Failed to write CSV output");
                }
            }
        }
    }

    fn on_error(&mut self, cycle: u64, message: &str) {
        eprintln!("cycle {cycle}: {message}");
    }
}
