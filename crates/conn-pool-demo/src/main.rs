//! Demo: many worker threads sharing a handful of pooled connections.
//!
//! Each worker sends a few messages through a pooled fake connection while
//! the main thread samples pool statistics.
//!
//! Run with `cargo run -p conn-pool-demo -- --help`.

mod connection;
mod driver;
mod sink;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use conn_pool::PoolConfig;
use tracing_subscriber::EnvFilter;

use crate::driver::{DemoSettings, StatsFormat};
use crate::sink::{MessageSink, WriterSink};

#[derive(Parser)]
#[command(name = "conn-pool-demo", about = "Share a bounded connection pool between worker threads")]
struct Cli {
    /// Maximum number of connections
    #[arg(long, default_value_t = 5)]
    capacity: usize,

    /// Pool configuration string, e.g. "Max Pool Size=5;Pool Name=demo".
    /// Overrides --capacity.
    #[arg(long)]
    config: Option<String>,

    /// Number of worker threads
    #[arg(long, default_value_t = 12)]
    workers: usize,

    /// Messages sent by each worker
    #[arg(long, default_value_t = 5)]
    messages: usize,

    /// Number of statistics samples
    #[arg(long, default_value_t = 40)]
    samples: usize,

    /// Milliseconds between statistics samples
    #[arg(long, default_value_t = 3)]
    sample_interval_ms: u64,

    /// Milliseconds of simulated work per message
    #[arg(long, default_value_t = 10)]
    work_ms: u64,

    /// Statistics output format
    #[arg(long, value_enum, default_value_t = StatsFormat::Text)]
    format: StatsFormat,
}

impl Cli {
    fn into_settings(self) -> Result<DemoSettings> {
        let pool = match &self.config {
            Some(text) => text.parse()?,
            None => PoolConfig::new().capacity(self.capacity).name("demo"),
        };

        Ok(DemoSettings {
            pool,
            workers: self.workers,
            messages: self.messages,
            samples: self.samples,
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            work: Duration::from_millis(self.work_ms),
            format: self.format,
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Cli::parse().into_settings()?;
    let sink: Arc<dyn MessageSink> = Arc::new(WriterSink::new(std::io::stdout()));

    let report = driver::run(&settings, sink)?;
    tracing::info!(
        messages = report.messages_sent,
        samples = report.samples.len(),
        alive = report.final_status.alive,
        "demo finished"
    );
    Ok(())
}
