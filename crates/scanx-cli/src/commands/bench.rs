//! Bench command implementation.

use anyhow::{bail, Result};
use scanx_core::index::{MemoryPrimaryIndex, PrimaryIndex, ScanConsistency};
use scanx_core::{
    Config, Context, IndexConnection, IndexEntry, PoolStats, Received, ScanError, ScanSettings,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Bench overrides taken from the command line.
#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub capacity: Option<i64>,
    pub entries: u64,
    pub producers: usize,
    pub scans: u32,
    pub consumer_delay_us: u64,
}

/// Request context that logs what producers report.
#[derive(Default)]
struct BenchContext {
    errors: AtomicU64,
    warnings: AtomicU64,
}

impl Context for BenchContext {
    fn fatal(&self, err: ScanError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!(error = %err, "Fatal scan error");
    }

    fn error(&self, err: ScanError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!(error = %err, "Scan error");
    }

    fn warning(&self, wrn: ScanError) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        warn!(warning = %wrn, "Scan warning");
    }
}

/// Outcome of one scan.
#[derive(Debug)]
struct ScanReport {
    received: u64,
    bytes: u64,
    stopped: bool,
}

/// Summary printed when the bench finishes.
#[derive(Debug, Serialize)]
struct BenchReport {
    capacity: usize,
    producers: usize,
    scans: u32,
    entries_received: u64,
    bytes_received: u64,
    elapsed_ms: u128,
    entries_per_sec: f64,
    errors: u64,
    warnings: u64,
    pool: PoolStats,
}

/// Run producers and a consumer over fresh connections and report throughput.
pub async fn run(config: Config, options: BenchOptions) -> Result<()> {
    if options.producers == 0 {
        bail!("Bench needs at least one producer");
    }

    let settings = Arc::new(ScanSettings::from_config(&config.scan));
    let context = Arc::new(BenchContext::default());

    info!(
        scan_cap = settings.scan_cap(),
        entries = options.entries,
        producers = options.producers,
        scans = options.scans,
        "Starting scan bench"
    );

    let started = Instant::now();
    let mut capacity = 0;
    let mut received = 0;
    let mut bytes = 0;

    for scan in 0..options.scans {
        let conn = Arc::new(connect(&settings, &context, options.capacity)?);
        capacity = conn.sender().capacity();

        let report = run_scan(conn, &options).await?;
        received += report.received;
        bytes += report.bytes;

        if report.stopped {
            warn!(scan, received = report.received, "Scan stopped");
            bail!("Benchmark interrupted after {} entries", received);
        }
    }

    let elapsed = started.elapsed();
    let report = BenchReport {
        capacity,
        producers: options.producers,
        scans: options.scans,
        entries_received: received,
        bytes_received: bytes,
        elapsed_ms: elapsed.as_millis(),
        entries_per_sec: received as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        errors: context.errors.load(Ordering::Relaxed),
        warnings: context.warnings.load(Ordering::Relaxed),
        pool: settings.pool().stats(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    info!(entries = received, elapsed_ms = report.elapsed_ms, "Scan bench finished");
    Ok(())
}

/// Strict sizing for an explicit capacity, the configured default otherwise.
fn connect(
    settings: &Arc<ScanSettings>,
    context: &Arc<BenchContext>,
    capacity: Option<i64>,
) -> Result<IndexConnection, ScanError> {
    let context: Arc<dyn Context> = context.clone();
    match capacity {
        Some(size) => IndexConnection::sized(size, settings, context),
        None => Ok(IndexConnection::new(settings, context)),
    }
}

/// One scan: producers fill the connection while a consumer drains it.
async fn run_scan(conn: Arc<IndexConnection>, options: &BenchOptions) -> Result<ScanReport> {
    let producers = spawn_producers(&conn, options);

    let consumer = {
        let conn = Arc::clone(&conn);
        let delay = Duration::from_micros(options.consumer_delay_us);
        tokio::task::spawn_blocking(move || consume(&conn, delay))
    };
    tokio::pin!(consumer);

    let report = tokio::select! {
        report = &mut consumer => report?,
        Ok(()) = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), stopping scan");
            conn.send_stop();
            consumer.await?
        }
    };

    for producer in producers {
        producer.await?;
    }
    Ok(report)
}

fn spawn_producers(
    conn: &Arc<IndexConnection>,
    options: &BenchOptions,
) -> Vec<tokio::task::JoinHandle<()>> {
    if options.producers == 1 {
        let conn = Arc::clone(conn);
        let index = MemoryPrimaryIndex::new("#primary", options.entries as usize);
        return vec![tokio::task::spawn_blocking(move || {
            index.scan_entries(0, ScanConsistency::Unbounded, &conn);
        })];
    }

    // the last producer to finish closes the sending side
    let remaining = Arc::new(AtomicUsize::new(options.producers));
    let stride = options.producers as u64;

    (0..stride)
        .map(|offset| {
            let conn = Arc::clone(conn);
            let remaining = Arc::clone(&remaining);
            let entries = options.entries;
            tokio::task::spawn_blocking(move || {
                let sender = conn.sender();
                let mut key = offset;
                while key < entries {
                    if !sender.send_entry(IndexEntry::new(key.to_string())) {
                        break;
                    }
                    key += stride;
                }
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    sender.close();
                }
            })
        })
        .collect()
}

/// Drain the connection, then dispose of it.
fn consume(conn: &IndexConnection, delay: Duration) -> ScanReport {
    let sender = conn.sender();
    let mut report = ScanReport {
        received: 0,
        bytes: 0,
        stopped: false,
    };

    loop {
        match sender.get_entry() {
            Received::Entry(entry) => {
                report.received += 1;
                report.bytes += entry.size_bytes() as u64;
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            Received::EndOfScan => break,
            Received::Stopped => {
                report.stopped = true;
                break;
            }
        }
    }

    conn.dispose();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(producers: usize) -> BenchOptions {
        BenchOptions {
            capacity: Some(8),
            entries: 1_000,
            producers,
            scans: 1,
            consumer_delay_us: 0,
        }
    }

    #[tokio::test]
    async fn test_single_producer_scan() {
        let settings = Arc::new(ScanSettings::new(8, 2));
        let context = Arc::new(BenchContext::default());
        let conn = Arc::new(connect(&settings, &context, Some(8)).unwrap());

        let report = run_scan(Arc::clone(&conn), &options(1)).await.unwrap();
        assert_eq!(report.received, 1_000);
        assert!(!report.stopped);
        assert_eq!(settings.pool().stats().returned, 1);
    }

    #[tokio::test]
    async fn test_multi_producer_scan() {
        let settings = Arc::new(ScanSettings::new(8, 2));
        let context = Arc::new(BenchContext::default());
        let conn = Arc::new(connect(&settings, &context, None).unwrap());

        let report = run_scan(conn, &options(3)).await.unwrap();
        assert_eq!(report.received, 1_000);
        assert!(!report.stopped);
    }

    #[test]
    fn test_connect_rejects_bad_capacity() {
        let settings = Arc::new(ScanSettings::new(8, 2));
        let context = Arc::new(BenchContext::default());
        let err = connect(&settings, &context, Some(0)).unwrap_err();
        assert_eq!(err, ScanError::InvalidScanSize(0));
    }

    #[tokio::test]
    async fn test_run_rejects_zero_producers() {
        let err = run(Config::default(), options(0)).await.unwrap_err();
        assert!(err.to_string().contains("producer"));
    }
}
