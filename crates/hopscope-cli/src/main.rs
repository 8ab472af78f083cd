//! Hopscope - DHT hop-count measurement harness
//!
//! Stores one key on a designated node, asks every node in the cluster for it
//! and reports the average number of routing hops the lookups took.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::io::IsTerminal;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use hopscope_core::{ExperimentConfig, ExperimentDriver, ExperimentReport};

#[derive(Parser)]
#[command(name = "hopscope")]
#[command(about = "Measure DHT lookup hop counts across a cluster of nodes")]
struct Args {
    /// Number of nodes to query (ports base-port .. base-port + N - 1)
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    node_count: u32,

    /// Host the nodes listen on
    #[arg(long, default_value = "localhost")]
    host: String,

    /// HTTP port of node 0
    #[arg(long, default_value_t = 8000)]
    base_port: u16,

    /// HTTP port of the node receiving the initial store
    #[arg(long, default_value_t = 8002)]
    store_port: u16,

    /// Key to store and look up
    #[arg(long, default_value = "123")]
    key: String,

    /// Value stored under the key
    #[arg(long, default_value = "Mustafa")]
    value: String,

    /// Timeout of the store request
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    store_timeout: Duration,

    /// Timeout of each query request
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration)]
    query_timeout: Duration,

    /// Bound on opening a connection [default: half the shorter request timeout]
    #[arg(long, value_parser = humantime::parse_duration)]
    connect_timeout: Option<Duration>,

    /// Pause between store and queries, for replication to settle
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    settle: Duration,

    /// Print the full report as JSON instead of the summary table
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

impl Args {
    fn experiment_config(&self) -> ExperimentConfig {
        ExperimentConfig {
            host: self.host.clone(),
            base_port: self.base_port,
            store_port: self.store_port,
            key: self.key.clone(),
            value: self.value.clone(),
            store_timeout: self.store_timeout,
            query_timeout: self.query_timeout,
            connect_timeout: self.connect_timeout,
            settle_duration: self.settle,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let node_count = args.node_count as usize;
    let driver = ExperimentDriver::http(args.experiment_config())
        .context("Failed to create HTTP client")?;

    let report = driver
        .run(node_count)
        .await
        .context("Experiment aborted")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

/// Parse arguments; invalid values also print the usage line
fn parse_args() -> Args {
    Args::try_parse().unwrap_or_else(|e| {
        if e.kind() == ErrorKind::ValueValidation {
            let _ = e.print();
            eprintln!("\n{}", Args::command().render_usage());
            std::process::exit(e.exit_code());
        }
        e.exit()
    })
}

fn print_report(report: &ExperimentReport) {
    println!();
    println!("{}", report.summary);
    for query in report.results.iter().filter(|q| !q.outcome.is_success()) {
        println!("  node {:>5}: {}", query.port, query.outcome);
    }
    println!("Completed in {}", humantime::format_duration(round_ms(report.elapsed)));
}

fn round_ms(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}
