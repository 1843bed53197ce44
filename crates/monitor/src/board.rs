//! Dashboard read model over trend events.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use riskwatch_core::SupplierId;
use riskwatch_events::{EventEnvelope, Projection};
use riskwatch_signals::SourceKind;

use crate::trend::{AlertTransition, RiskTrend, TrendEvent, TrendState};

/// Default number of transitions kept for the recent-alerts feed.
pub const DEFAULT_RECENT_TRANSITIONS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardRow {
    pub supplier_id: SupplierId,
    pub latest_score: Option<f64>,
    pub top_factor: Option<SourceKind>,
    pub state: TrendState,
    pub transitions: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl BoardRow {
    fn new(supplier_id: SupplierId) -> Self {
        Self {
            supplier_id,
            latest_score: None,
            top_factor: None,
            state: TrendState::Normal,
            transitions: 0,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskBoard {
    rows: HashMap<SupplierId, BoardRow>,
    recent: VecDeque<AlertTransition>,
    recent_limit: usize,
}

impl RiskBoard {
    pub fn new(recent_limit: usize) -> Self {
        Self {
            rows: HashMap::new(),
            recent: VecDeque::new(),
            recent_limit,
        }
    }

    pub fn row(&self, supplier_id: SupplierId) -> Option<&BoardRow> {
        self.rows.get(&supplier_id)
    }

    /// Highest score first; suppliers without a score last.
    pub fn rows(&self) -> Vec<BoardRow> {
        let mut rows: Vec<_> = self.rows.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.latest_score
                .unwrap_or(-1.0)
                .total_cmp(&a.latest_score.unwrap_or(-1.0))
                .then(a.supplier_id.cmp(&b.supplier_id))
        });
        rows
    }

    /// Newest first.
    pub fn recent_transitions(&self) -> Vec<AlertTransition> {
        self.recent.iter().rev().cloned().collect()
    }

    pub fn in_state(&self, state: TrendState) -> usize {
        self.rows.values().filter(|r| r.state == state).count()
    }

    /// Start a row from a persisted trend, e.g. after a restart.
    ///
    /// Later envelopes for the supplier overwrite the seeded values as usual.
    pub fn seed(&mut self, trend: &RiskTrend) {
        let Some(latest) = trend.latest() else {
            return;
        };
        self.rows.insert(
            trend.supplier_id(),
            BoardRow {
                supplier_id: trend.supplier_id(),
                latest_score: Some(latest.score()),
                top_factor: latest.top_factor(),
                state: trend.state(),
                transitions: trend.transition_count(),
                updated_at: Some(latest.timestamp()),
            },
        );
    }
}

impl Default for RiskBoard {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_TRANSITIONS)
    }
}

impl Projection for RiskBoard {
    type Ev = TrendEvent;

    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>) {
        let row = self
            .rows
            .entry(envelope.supplier_id())
            .or_insert_with(|| BoardRow::new(envelope.supplier_id()));

        match envelope.payload() {
            TrendEvent::ScoreRecorded(e) => {
                row.latest_score = Some(e.score.score());
                row.top_factor = e.score.top_factor();
                row.updated_at = Some(e.score.timestamp());
                row.state = e.state;
            }
            TrendEvent::StateChanged(t) => {
                row.state = t.new_state;
                row.transitions += 1;
                self.recent.push_back(t.clone());
                while self.recent.len() > self.recent_limit {
                    self.recent.pop_front();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{RiskAggregator, TrendEnvelope};
    use crate::policy::AlertPolicy;
    use crate::sink::InMemoryAlertSink;
    use crate::store::{InMemoryTrendStore, TrendStore};
    use chrono::Duration;
    use riskwatch_core::RetryPolicy;
    use riskwatch_events::{EventBus, InMemoryEventBus, ProjectionRunner};
    use riskwatch_scoring::RiskScore;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn score_at(supplier_id: SupplierId, minutes: i64, value: f64) -> RiskScore {
        let t0: DateTime<Utc> = "2026-10-01T00:00:00Z".parse().unwrap();
        RiskScore::from_parts(
            supplier_id,
            t0 + Duration::minutes(minutes),
            value,
            BTreeMap::from([
                (SourceKind::Weather, 0.1),
                (SourceKind::News, 0.7),
                (SourceKind::Economic, 0.2),
            ]),
        )
        .unwrap()
    }

    #[test]
    fn board_follows_aggregator_events() {
        let bus: Arc<InMemoryEventBus<TrendEnvelope>> = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let agg = RiskAggregator::new(
            AlertPolicy::new(0.5, 0.8, 2).unwrap(),
            Arc::new(InMemoryTrendStore::new()),
            bus.clone(),
            Arc::new(InMemoryAlertSink::new()),
        )
        .with_retry(RetryPolicy::no_retry());

        let hot = SupplierId::new();
        let calm = SupplierId::new();
        agg.record(score_at(hot, 0, 0.9)).unwrap();
        agg.record(score_at(hot, 1, 0.95)).unwrap();
        agg.record(score_at(calm, 0, 0.1)).unwrap();

        let mut runner = ProjectionRunner::new(RiskBoard::default());
        let envelopes = sub.drain();
        assert_eq!(runner.apply_all(&envelopes), envelopes.len());
        // redelivery is ignored
        assert_eq!(runner.apply_all(&envelopes), 0);

        let board = runner.projection();
        let rows = board.rows();
        assert_eq!(rows[0].supplier_id, hot);
        assert_eq!(rows[0].state, TrendState::Alert);
        assert_eq!(rows[0].top_factor, Some(SourceKind::News));
        assert_eq!(rows[0].transitions, 2);
        assert_eq!(rows[1].state, TrendState::Normal);
        assert_eq!(board.in_state(TrendState::Alert), 1);

        let recent = board.recent_transitions();
        assert_eq!(recent[0].new_state, TrendState::Alert);
        assert_eq!(recent[1].new_state, TrendState::Watch);
    }

    #[test]
    fn recent_feed_is_bounded() {
        let mut board = RiskBoard::new(1);
        let id = SupplierId::new();
        for (seq, state) in [(1, TrendState::Watch), (2, TrendState::Alert)] {
            let t = AlertTransition {
                supplier_id: id,
                previous_state: TrendState::Normal,
                new_state: state,
                score: 0.9,
                timestamp: Utc::now(),
            };
            board.apply(&EventEnvelope::new(
                riskwatch_core::EventId::new(),
                id,
                "risk.trend",
                seq,
                TrendEvent::StateChanged(t),
            ));
        }
        let recent = board.recent_transitions();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].new_state, TrendState::Alert);
    }

    #[test]
    fn board_built_after_restart_reports_persisted_alert_state() {
        let store: Arc<InMemoryTrendStore> = Arc::new(InMemoryTrendStore::new());
        let policy = AlertPolicy::new(0.5, 0.8, 2).unwrap();
        let id = SupplierId::new();
        {
            let before = RiskAggregator::new(
                policy,
                store.clone(),
                Arc::new(InMemoryEventBus::<TrendEnvelope>::new()),
                Arc::new(InMemoryAlertSink::new()),
            );
            before.record(score_at(id, 0, 0.9)).unwrap();
            before.record(score_at(id, 1, 0.9)).unwrap();
        }

        // Seeded from the store: ALERT before any new score arrives.
        let mut seeded = RiskBoard::default();
        for supplier in store.suppliers().unwrap() {
            seeded.seed(&store.load(supplier).unwrap().unwrap());
        }
        assert_eq!(seeded.row(id).unwrap().state, TrendState::Alert);
        assert_eq!(seeded.row(id).unwrap().transitions, 2);

        // Unseeded board: a score that causes no transition still carries the state.
        let bus: Arc<InMemoryEventBus<TrendEnvelope>> = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let after = RiskAggregator::new(policy, store, bus, Arc::new(InMemoryAlertSink::new()));
        let outcome = after.record(score_at(id, 2, 0.95)).unwrap();
        assert!(outcome.transitions.is_empty());

        let mut runner = ProjectionRunner::new(RiskBoard::default());
        runner.apply_all(&sub.drain());
        assert_eq!(runner.projection().row(id).unwrap().state, TrendState::Alert);
    }
}
