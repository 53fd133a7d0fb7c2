// Synthetic telemetry load against a write pool
//
// Design Decision: Submit through a BatchSender like a real producer would,
// so discarded batches show up in the pool's own metrics rather than here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};
use writepool::{InMemoryBatchWriter, MetricsSnapshot, WritePoolConfig, WriteWorkerPool};

/// Interval between stats polls while waiting for workers to finish
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One synthetic span, the unit the pool counts
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    pub trace_id: u64,
    pub span_id: u64,
    pub name: String,
    pub duration_us: u64,
}

/// Shape of the generated load
#[derive(Debug, Clone)]
pub struct LoadProfile {
    pub batches: usize,
    pub batch_size: usize,
    pub write_latency: Duration,
    pub submit_interval: Duration,
    pub seed: u64,
}

/// Outcome of a load run
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub config: WritePoolConfig,
    pub batches_submitted: usize,
    pub records_submitted: u64,
    pub records_accepted: u64,
    pub records_discarded: u64,
    pub batches_written: usize,
    pub records_written: usize,
    pub elapsed_ms: u128,
    pub metrics: MetricsSnapshot,
}

const SPAN_NAMES: &[&str] = &["http.request", "db.query", "cache.get", "queue.publish"];

fn generate_batch(rng: &mut StdRng, size: usize) -> Vec<TelemetryRecord> {
    let trace_id = rng.gen();
    (0..size)
        .map(|_| TelemetryRecord {
            trace_id,
            span_id: rng.gen(),
            name: SPAN_NAMES[rng.gen_range(0..SPAN_NAMES.len())].to_string(),
            duration_us: rng.gen_range(50..50_000),
        })
        .collect()
}

/// Run the profile against a fresh pool, drain it and shut it down
pub async fn run_load(config: WritePoolConfig, profile: &LoadProfile) -> anyhow::Result<LoadReport> {
    let writer = Arc::new(
        InMemoryBatchWriter::<TelemetryRecord>::new().with_latency(profile.write_latency),
    );
    let pool = WriteWorkerPool::<TelemetryRecord>::start(config.clone(), writer.clone());
    let sender = pool.sender();
    let mut rng = StdRng::seed_from_u64(profile.seed);

    info!(
        batches = profile.batches,
        batch_size = profile.batch_size,
        max_pending_records = config.max_pending_records,
        "Starting load"
    );

    let started = Instant::now();
    for i in 0..profile.batches {
        sender
            .submit_batch(generate_batch(&mut rng, profile.batch_size))
            .with_context(|| format!("Failed to submit batch {}", i))?;

        if !profile.submit_interval.is_zero() {
            tokio::time::sleep(profile.submit_interval).await;
        }
    }

    loop {
        let stats = pool.stats().await.context("Pool stopped while draining")?;
        if stats.active_workers == 0 {
            break;
        }
        debug!(
            active_workers = stats.active_workers,
            pending_records = stats.pending_records,
            "Waiting for workers"
        );
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }

    let metrics = pool.metrics().clone();
    pool.shutdown().await.context("Pool shutdown failed")?;
    let elapsed = started.elapsed();

    let snapshot = metrics.snapshot();
    let records_submitted = (profile.batches * profile.batch_size) as u64;
    let report = LoadReport {
        config,
        batches_submitted: profile.batches,
        records_submitted,
        records_accepted: records_submitted.saturating_sub(snapshot.discarded_record_count),
        records_discarded: snapshot.discarded_record_count,
        batches_written: writer.written_batches(),
        records_written: writer.written_records(),
        elapsed_ms: elapsed.as_millis(),
        metrics: snapshot,
    };

    info!(
        records_accepted = report.records_accepted,
        records_discarded = report.records_discarded,
        elapsed_ms = report.elapsed_ms as u64,
        "Load complete"
    );

    Ok(report)
}
