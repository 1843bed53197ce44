//! Aggregator: records scores on per-supplier trends, persists them, then
//! publishes the resulting events and alerts.
//!
//! ```text
//! RiskScore → RiskTrend::execute (on a copy) → TrendStore::save (retried)
//!           → commit in memory → EventBus::publish → AlertSink::deliver
//! ```
//!
//! Transitions the sink refuses go to an outbox and are handed over again by
//! [`RiskAggregator::redeliver_pending`]; an alert edge is never just logged.
//!
//! Each supplier has its own lock. The supplier map lock is only held long
//! enough to look up or insert a slot.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use riskwatch_core::{Aggregate, AggregateRoot, DomainError, EventId, RetryPolicy, SupplierId};
use riskwatch_events::{EventBus, EventEnvelope};
use riskwatch_scoring::RiskScore;

use crate::policy::AlertPolicy;
use crate::sink::AlertSink;
use crate::store::{TrendStore, TrendStoreError};
use crate::trend::{
    AlertTransition, DEFAULT_HISTORY_LIMIT, RecordScore, RiskTrend, STREAM_TYPE, TrendCommand,
    TrendEvent, TrendState,
};

pub type TrendEnvelope = EventEnvelope<TrendEvent>;

#[derive(Debug, Error)]
pub enum AggregatorError {
    /// The trend refused the score (wrong supplier, out of order).
    #[error("score rejected: {0}")]
    Rejected(#[from] DomainError),

    /// Saving the updated trend failed after every retry. The in-memory trend
    /// was left unchanged, so recording the same score again is safe.
    #[error("persisting trend for supplier {supplier_id} failed after {attempts} attempt(s): {source}")]
    Persistence {
        supplier_id: SupplierId,
        attempts: u32,
        #[source]
        source: TrendStoreError,
    },

    #[error("loading trend failed: {0}")]
    Store(#[from] TrendStoreError),

    #[error("trend lock poisoned for supplier {supplier_id}")]
    Poisoned { supplier_id: SupplierId },
}

/// Result of recording one score.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub supplier_id: SupplierId,
    pub state: TrendState,
    pub version: u64,
    pub transitions: Vec<AlertTransition>,
    /// Transitions the sink did not accept; they wait in the outbox.
    pub undelivered: Vec<AlertTransition>,
}

impl RecordOutcome {
    /// True when this score moved the trend into ALERT.
    pub fn alerted(&self) -> bool {
        self.transitions.iter().any(AlertTransition::is_alert)
    }

    pub fn fully_delivered(&self) -> bool {
        self.undelivered.is_empty()
    }
}

/// Oldest undelivered transitions are dropped past this many.
pub const DEFAULT_OUTBOX_LIMIT: usize = 1024;

pub struct RiskAggregator<B>
where
    B: EventBus<TrendEnvelope>,
{
    policy: AlertPolicy,
    history_limit: usize,
    retry: RetryPolicy,
    store: Arc<dyn TrendStore>,
    bus: B,
    sink: Arc<dyn AlertSink>,
    trends: Mutex<HashMap<SupplierId, Arc<Mutex<RiskTrend>>>>,
    outbox: Mutex<VecDeque<AlertTransition>>,
    outbox_limit: usize,
}

impl<B> RiskAggregator<B>
where
    B: EventBus<TrendEnvelope>,
{
    pub fn new(policy: AlertPolicy, store: Arc<dyn TrendStore>, bus: B, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            policy,
            history_limit: DEFAULT_HISTORY_LIMIT,
            retry: RetryPolicy::default(),
            store,
            bus,
            sink,
            trends: Mutex::new(HashMap::new()),
            outbox: Mutex::new(VecDeque::new()),
            outbox_limit: DEFAULT_OUTBOX_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit.max(1);
        self
    }

    pub fn with_outbox_limit(mut self, outbox_limit: usize) -> Self {
        self.outbox_limit = outbox_limit.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Record `score` on its supplier's trend.
    pub fn record(&self, score: RiskScore) -> Result<RecordOutcome, AggregatorError> {
        let supplier_id = score.supplier_id();
        let slot = self.slot(supplier_id)?;
        let mut trend = slot
            .lock()
            .map_err(|_| AggregatorError::Poisoned { supplier_id })?;

        let base_version = trend.version();
        let mut next = trend.clone();
        let events = next.execute(&TrendCommand::RecordScore(RecordScore {
            score,
            policy: self.policy,
        }))?;

        self.retry
            .run(
                |attempt| {
                    self.store.save(&next).inspect_err(|e| {
                        tracing::warn!(supplier = %supplier_id, attempt, error = %e, "trend save failed");
                    })
                },
                TrendStoreError::is_transient,
            )
            .map_err(|exhausted| AggregatorError::Persistence {
                supplier_id,
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            })?;

        *trend = next;

        let mut transitions = Vec::new();
        for (i, event) in events.into_iter().enumerate() {
            if let TrendEvent::StateChanged(t) = &event {
                transitions.push(t.clone());
            }
            let envelope = EventEnvelope::new(
                EventId::new(),
                supplier_id,
                STREAM_TYPE,
                base_version + i as u64 + 1,
                event,
            );
            if let Err(e) = self.bus.publish(envelope) {
                tracing::warn!(supplier = %supplier_id, error = ?e, "trend event publish failed");
            }
        }

        let mut outcome = RecordOutcome {
            supplier_id,
            state: trend.state(),
            version: trend.version(),
            transitions,
            undelivered: Vec::new(),
        };
        drop(trend);

        for t in &outcome.transitions {
            if t.is_alert() {
                tracing::warn!(supplier = %supplier_id, score = t.score, from = %t.previous_state, "supplier entered ALERT");
            } else {
                tracing::info!(supplier = %supplier_id, score = t.score, from = %t.previous_state, to = %t.new_state, "risk state changed");
            }
            if let Err(e) = self.sink.deliver(t) {
                tracing::error!(supplier = %supplier_id, error = %e, "alert delivery failed; queued for redelivery");
                outcome.undelivered.push(t.clone());
            }
        }
        self.enqueue(outcome.undelivered.iter().cloned());

        Ok(outcome)
    }

    /// Hand every queued transition to the sink again, oldest first.
    ///
    /// Stops at the first refusal so transitions reach the sink in order.
    /// Returns how many were delivered.
    pub fn redeliver_pending(&self) -> usize {
        let queued: Vec<AlertTransition> = match self.outbox.lock() {
            Ok(mut outbox) => outbox.drain(..).collect(),
            Err(_) => {
                tracing::error!("alert outbox lock poisoned");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut queued = queued.into_iter();
        let mut still_pending = Vec::new();
        for t in queued.by_ref() {
            if let Err(e) = self.sink.deliver(&t) {
                tracing::warn!(supplier = %t.supplier_id, to = %t.new_state, error = %e, "alert redelivery failed");
                still_pending.push(t);
                break;
            }
            delivered += 1;
        }
        still_pending.extend(queued);

        if let Ok(mut outbox) = self.outbox.lock() {
            // Anything queued meanwhile is newer than what was drained.
            for t in still_pending.into_iter().rev() {
                outbox.push_front(t);
            }
            self.trim_outbox(&mut outbox);
        }
        delivered
    }

    /// Transitions waiting for redelivery.
    pub fn pending_deliveries(&self) -> Vec<AlertTransition> {
        self.outbox
            .lock()
            .map(|o| o.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn enqueue(&self, transitions: impl IntoIterator<Item = AlertTransition>) {
        let Ok(mut outbox) = self.outbox.lock() else {
            tracing::error!("alert outbox lock poisoned; undelivered transitions lost");
            return;
        };
        outbox.extend(transitions);
        self.trim_outbox(&mut outbox);
    }

    fn trim_outbox(&self, outbox: &mut VecDeque<AlertTransition>) {
        while outbox.len() > self.outbox_limit {
            if let Some(dropped) = outbox.pop_front() {
                tracing::error!(
                    supplier = %dropped.supplier_id,
                    to = %dropped.new_state,
                    "alert outbox full; oldest undelivered transition dropped"
                );
            }
        }
    }

    /// Current trend for a supplier, if any score was ever recorded.
    pub fn trend(&self, supplier_id: SupplierId) -> Result<Option<RiskTrend>, AggregatorError> {
        let cached = {
            let map = self
                .trends
                .lock()
                .map_err(|_| AggregatorError::Poisoned { supplier_id })?;
            map.get(&supplier_id).cloned()
        };
        match cached {
            Some(slot) => {
                let trend = slot
                    .lock()
                    .map_err(|_| AggregatorError::Poisoned { supplier_id })?;
                Ok((!trend.is_empty()).then(|| trend.clone()))
            }
            None => Ok(self.store.load(supplier_id)?),
        }
    }

    /// Suppliers with a persisted trend.
    pub fn suppliers(&self) -> Result<Vec<SupplierId>, AggregatorError> {
        Ok(self.store.suppliers()?)
    }

    fn slot(&self, supplier_id: SupplierId) -> Result<Arc<Mutex<RiskTrend>>, AggregatorError> {
        {
            let map = self
                .trends
                .lock()
                .map_err(|_| AggregatorError::Poisoned { supplier_id })?;
            if let Some(slot) = map.get(&supplier_id) {
                return Ok(Arc::clone(slot));
            }
        }

        let loaded = self
            .store
            .load(supplier_id)?
            .unwrap_or_else(|| RiskTrend::new(supplier_id, self.history_limit));

        let mut map = self
            .trends
            .lock()
            .map_err(|_| AggregatorError::Poisoned { supplier_id })?;
        Ok(Arc::clone(
            map.entry(supplier_id)
                .or_insert_with(|| Arc::new(Mutex::new(loaded))),
        ))
    }
}
