//! Worker threads and the stats monitor.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::ValueEnum;
use conn_pool::{Pool, PoolConfig, PoolStatus, ResourceId};

use crate::connection::FakeConnection;
use crate::sink::MessageSink;

const ORDINALS: [&str; 5] = ["First", "Second", "Third", "Fourth", "Fifth"];

/// How the monitor prints pool snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatsFormat {
    /// `Pool stats: connections in use X; connections alive Y; pool size Z`
    Text,
    /// One JSON object per sample.
    Json,
}

/// Knobs for one demo run.
#[derive(Debug, Clone)]
pub struct DemoSettings {
    /// Pool configuration.
    pub pool: PoolConfig,
    /// Number of worker threads.
    pub workers: usize,
    /// Messages each worker sends.
    pub messages: usize,
    /// Number of monitor samples.
    pub samples: usize,
    /// Pause between monitor samples.
    pub sample_interval: Duration,
    /// Time spent "computing" before each send, and inside each write.
    pub work: Duration,
    /// Monitor output format.
    pub format: StatsFormat,
}

/// What a run observed.
#[derive(Debug, Clone)]
pub struct DemoReport {
    /// Monitor snapshots, in order.
    pub samples: Vec<PoolStatus>,
    /// Messages written by all workers.
    pub messages_sent: usize,
    /// Pool state after every worker finished.
    pub final_status: PoolStatus,
}

/// Run the workers and the monitor to completion.
pub fn run(settings: &DemoSettings, sink: Arc<dyn MessageSink>) -> Result<DemoReport> {
    if settings.workers == 0 {
        bail!("at least one worker is required");
    }

    let factory_sink = Arc::clone(&sink);
    let latency = settings.work;
    let pool = Pool::from_fn(settings.pool.clone(), move |id: ResourceId| {
        FakeConnection::new(id, Arc::clone(&factory_sink), latency)
    })
    .context("failed to create pool")?;

    let sent = AtomicUsize::new(0);

    let samples = thread::scope(|s| -> Result<Vec<PoolStatus>> {
        let handles: Vec<_> = (0..settings.workers)
            .map(|worker| {
                let pool = &pool;
                let sent = &sent;
                s.spawn(move || send_messages(pool, worker, settings, sent))
            })
            .collect();

        let samples = monitor(&pool, settings, sink.as_ref());

        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow!("worker thread panicked"))??;
        }
        samples
    })?;

    let final_status = pool.status();
    tracing::info!(
        in_use = final_status.in_use,
        alive = final_status.alive,
        checkouts_waited = pool.metrics().checkouts_waited,
        "all workers finished"
    );

    Ok(DemoReport {
        samples,
        messages_sent: sent.load(Ordering::SeqCst),
        final_status,
    })
}

fn message_text(index: usize, worker: usize) -> String {
    match ORDINALS.get(index) {
        Some(ordinal) => format!("{ordinal} message from thread #{worker}"),
        None => format!("Message {} from thread #{worker}", index + 1),
    }
}

fn send_messages(
    pool: &Pool<FakeConnection>,
    worker: usize,
    settings: &DemoSettings,
    sent: &AtomicUsize,
) -> Result<()> {
    for index in 0..settings.messages {
        if !settings.work.is_zero() {
            thread::sleep(settings.work);
        }

        let conn = pool.acquire()?;
        conn.write_something(&message_text(index, worker))
            .with_context(|| format!("connection #{} failed to write", conn.id()))?;
        pool.release(conn)?;

        sent.fetch_add(1, Ordering::SeqCst);
    }
    Ok(())
}

fn monitor(
    pool: &Pool<FakeConnection>,
    settings: &DemoSettings,
    sink: &dyn MessageSink,
) -> Result<Vec<PoolStatus>> {
    // Wait until at least one connection exists.
    while settings.messages > 0 && pool.alive_count() == 0 {
        thread::yield_now();
    }

    let mut samples = Vec::with_capacity(settings.samples);
    for _ in 0..settings.samples {
        let status = pool.status();
        if status.in_use > status.alive || status.alive > status.capacity {
            bail!("pool invariant violated: {status:?}");
        }

        thread::sleep(settings.sample_interval);

        let line = match settings.format {
            StatsFormat::Text => format!(
                "Pool stats: connections in use {}; connections alive {}; pool size {}",
                status.in_use, status.alive, status.capacity
            ),
            StatsFormat::Json => serde_json::to_string(&status)?,
        };
        sink.write_line(&line)?;
        samples.push(status);
    }
    Ok(samples)
}
