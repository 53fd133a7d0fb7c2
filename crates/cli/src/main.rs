// Writepool load driver
//
// Design Decision: Use clap derive with env fallbacks so the same variables
// that configure a deployed pool also drive the load run.
// Design Decision: Support text/json/yaml output formats for scripting.

mod load;
mod output;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use writepool::WritePoolConfig;

use crate::load::{LoadProfile, LoadReport};
use crate::output::{print_field, OutputFormat};

#[derive(Parser)]
#[command(name = "writepool")]
#[command(about = "Drive a bounded write pool with synthetic telemetry batches")]
#[command(version)]
pub struct Cli {
    /// Pending record ceiling; zero or less disables admission control
    #[arg(long, env = "WRITE_POOL_MAX_PENDING_RECORDS", allow_negative_numbers = true)]
    pub max_pending_records: Option<i64>,

    /// Number of batches to submit
    #[arg(long, default_value = "1000")]
    pub batches: usize,

    /// Records per batch
    #[arg(long, default_value = "100")]
    pub batch_size: usize,

    /// Simulated write latency per batch in milliseconds
    #[arg(long, default_value = "10")]
    pub write_latency_ms: u64,

    /// Pause between submissions in milliseconds
    #[arg(long, default_value = "0")]
    pub submit_interval_ms: u64,

    /// Seed for the generated records
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,
}

fn init_logging() {
    // Logs go to stderr so structured output on stdout stays parseable
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("writepool=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_text(report: &LoadReport) {
    print_field("Max pending records", report.config.max_pending_records);
    print_field("Batches submitted", report.batches_submitted);
    print_field("Records submitted", report.records_submitted);
    print_field("Records accepted", report.records_accepted);
    print_field("Records discarded", report.records_discarded);
    print_field("Batches written", report.batches_written);
    print_field("Records written", report.records_written);
    print_field("Elapsed (ms)", report.elapsed_ms);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let output_format: OutputFormat = cli.output.parse().map_err(anyhow::Error::msg)?;

    let mut config = WritePoolConfig::from_env();
    if let Some(max) = cli.max_pending_records {
        config = config.with_max_pending_records(max);
    }

    let profile = LoadProfile {
        batches: cli.batches,
        batch_size: cli.batch_size,
        write_latency: Duration::from_millis(cli.write_latency_ms),
        submit_interval: Duration::from_millis(cli.submit_interval_ms),
        seed: cli.seed,
    };

    let report = load::run_load(config, &profile).await?;

    if output_format.is_text() {
        print_text(&report);
    } else if let Some(rendered) = output_format.render(&report)? {
        println!("{}", rendered);
    }

    Ok(())
}
