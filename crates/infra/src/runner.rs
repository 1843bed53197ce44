use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use riskwatch_core::SupplierId;
use riskwatch_events::EventBus;
use riskwatch_monitor::TrendEnvelope;

use crate::pipeline::SupplierPipeline;

/// Config for the periodic scoring runner.
#[derive(Debug, Clone)]
pub struct RiskMonitorRunner {
    pub interval: Duration,
    /// Upper bound on suppliers scored at the same time.
    pub max_concurrent_suppliers: usize,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RiskMonitorRunner {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_concurrent_suppliers: 8,
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
        }
    }
}

/// What one pass over the supplier set did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub scored: usize,
    /// Suppliers with no signal in any category yet.
    pub skipped: usize,
    pub failed: Vec<SupplierId>,
    pub alerts: usize,
    pub pruned_signals: usize,
    /// Queued alert transitions the sink accepted at the start of this pass.
    pub redelivered_alerts: usize,
    /// Alert transitions still waiting for the sink after this pass.
    pub pending_alerts: usize,
}

/// Handle for the running scoring runner (shutdown + trigger hook).
#[derive(Debug)]
pub struct RiskMonitorHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl RiskMonitorHandle {
    /// Request an early pass, e.g. after signals were ingested.
    ///
    /// Triggers are coalesced: if a pass is already pending this is a no-op.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Stop the runner thread and wait for the pass in flight to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl RiskMonitorRunner {
    /// Score every supplier once, at most `max_concurrent_suppliers` at a time.
    ///
    /// Workers pull the next supplier as soon as they finish one, so a slow
    /// source holds up only the worker that is waiting on it.
    pub fn run_once<B>(&self, pipeline: &SupplierPipeline<B>) -> PassSummary
    where
        B: EventBus<TrendEnvelope>,
    {
        let ids: Vec<SupplierId> = pipeline.suppliers().map(|s| s.id).collect();
        self.run_for(pipeline, &ids)
    }

    fn run_for<B>(&self, pipeline: &SupplierPipeline<B>, ids: &[SupplierId]) -> PassSummary
    where
        B: EventBus<TrendEnvelope>,
    {
        let now = Utc::now();
        let pruned_signals = pipeline.signal_log().prune(now).unwrap_or_else(|e| {
            warn!(error = %e, "signal retention pruning failed");
            0
        });
        let redelivered_alerts = pipeline.aggregator().redeliver_pending();
        let mut summary = PassSummary {
            pruned_signals,
            redelivered_alerts,
            ..PassSummary::default()
        };

        let queue: Mutex<VecDeque<_>> =
            Mutex::new(ids.iter().filter_map(|id| pipeline.supplier(*id)).collect());
        let workers = self.max_concurrent_suppliers.max(1).min(ids.len());
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    loop {
                        let next = queue.lock().ok().and_then(|mut q| q.pop_front());
                        let Some(supplier) = next else { break };
                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            pipeline.run_cycle(&supplier.location, now)
                        }));
                        if tx.send((supplier.id, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for (id, result) in rx {
                match result {
                    Ok(Ok(outcome)) => {
                        summary.scored += 1;
                        if outcome.record.alerted() {
                            summary.alerts += 1;
                        }
                    }
                    Ok(Err(e)) if e.is_insufficient_data() => {
                        tracing::debug!(supplier = %id, "no signals yet; scoring skipped");
                        summary.skipped += 1;
                    }
                    Ok(Err(e)) => {
                        warn!(supplier = %id, error = %e, "scoring cycle failed");
                        summary.failed.push(id);
                    }
                    Err(_) => {
                        warn!(supplier = %id, "scoring cycle panicked");
                        summary.failed.push(id);
                    }
                }
            }
        });

        summary.pending_alerts = pipeline.aggregator().pending_deliveries().len();
        summary
    }

    /// Spawn the runner thread.
    ///
    /// - Schedule: one pass over every supplier each `interval`, plus one at startup
    /// - Event-trigger: `handle.trigger()` requests an early pass
    /// - Failures: a supplier whose cycle failed is retried alone with bounded
    ///   exponential backoff; other suppliers keep their cadence
    pub fn spawn<B>(
        &self,
        name: &'static str,
        pipeline: Arc<SupplierPipeline<B>>,
    ) -> std::io::Result<RiskMonitorHandle>
    where
        B: EventBus<TrendEnvelope> + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let cfg = self.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || runner_loop(name, cfg, shutdown_rx, trigger_rx, pipeline))?;

        Ok(RiskMonitorHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
        })
    }
}

struct Retry {
    attempts: u32,
    until: Instant,
}

fn runner_loop<B>(
    name: &'static str,
    cfg: RiskMonitorRunner,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    pipeline: Arc<SupplierPipeline<B>>,
) where
    B: EventBus<TrendEnvelope>,
{
    let all: Vec<SupplierId> = pipeline.suppliers().map(|s| s.id).collect();
    info!(runner = name, suppliers = all.len(), "risk monitor runner started");

    let mut next_tick = Instant::now() + cfg.interval;
    let mut pending = true; // run once on startup
    let mut retries: HashMap<SupplierId, Retry> = HashMap::new();

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            // Keep a stable cadence even if we were delayed.
            while next_tick <= now {
                next_tick += cfg.interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        // Suppliers still backing off sit out scheduled passes too.
        let targets: Vec<SupplierId> = if pending {
            all.iter()
                .copied()
                .filter(|id| retries.get(id).is_none_or(|r| r.until <= now))
                .collect()
        } else {
            retries
                .iter()
                .filter(|(_, r)| r.until <= now)
                .map(|(id, _)| *id)
                .collect()
        };

        if targets.is_empty() {
            pending = false;
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(50));
            thread::sleep(sleep_for);
            continue;
        }
        pending = false;

        let summary = cfg.run_for(&pipeline, &targets);
        info!(
            runner = name,
            scored = summary.scored,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            alerts = summary.alerts,
            pruned = summary.pruned_signals,
            redelivered = summary.redelivered_alerts,
            pending_alerts = summary.pending_alerts,
            "scoring pass finished"
        );

        for id in &targets {
            if !summary.failed.contains(id) {
                retries.remove(id);
                continue;
            }
            let attempts = retries.get(id).map_or(0, |r| r.attempts) + 1;
            if attempts > cfg.max_retries {
                warn!(runner = name, supplier = %id, attempts, "giving up until next scheduled pass");
                retries.remove(id);
            } else {
                retries.insert(
                    *id,
                    Retry {
                        attempts,
                        until: Instant::now() + backoff(cfg.base_backoff, attempts),
                    },
                );
            }
        }
    }

    info!(runner = name, "risk monitor runner stopped");
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // base * 2^(attempt-1), capped at 10s
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}
