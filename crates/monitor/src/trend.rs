//! Per-supplier risk trend aggregate and its alert state machine.
//!
//! With `N = hysteresis_count`:
//!
//! | from   | to     | when                                   |
//! |--------|--------|----------------------------------------|
//! | NORMAL | ALERT  | N consecutive scores above alert       |
//! | NORMAL | WATCH  | score above watch                      |
//! | WATCH  | ALERT  | N consecutive scores above alert       |
//! | WATCH  | NORMAL | N consecutive scores at or below watch |
//! | ALERT  | NORMAL | N consecutive scores at or below watch |
//! | ALERT  | WATCH  | N consecutive scores at or below alert |

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use riskwatch_core::{Aggregate, AggregateRoot, DomainError, SupplierId};
use riskwatch_events::Event;
use riskwatch_scoring::RiskScore;

use crate::policy::AlertPolicy;

/// Default bound on retained score history per supplier.
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

pub const STREAM_TYPE: &str = "risk.trend";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendState {
    #[default]
    Normal,
    Watch,
    Alert,
}

impl TrendState {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendState::Normal => "NORMAL",
            TrendState::Watch => "WATCH",
            TrendState::Alert => "ALERT",
        }
    }
}

impl core::fmt::Display for TrendState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound record of a state change. This is the JSON alert consumers receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertTransition {
    pub supplier_id: SupplierId,
    pub previous_state: TrendState,
    pub new_state: TrendState,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

impl AlertTransition {
    /// Entering ALERT from NORMAL or WATCH.
    pub fn is_alert(&self) -> bool {
        self.new_state == TrendState::Alert && self.previous_state != TrendState::Alert
    }
}

/// Consecutive-score counters the state machine reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Streaks {
    pub above_alert: u32,
    pub at_or_below_watch: u32,
    pub at_or_below_alert: u32,
}

impl Streaks {
    fn after(self, score: f64, policy: &AlertPolicy) -> Self {
        let bump = |hit: bool, n: u32| if hit { n.saturating_add(1) } else { 0 };
        Self {
            above_alert: bump(score > policy.alert_threshold(), self.above_alert),
            at_or_below_watch: bump(score <= policy.watch_threshold(), self.at_or_below_watch),
            at_or_below_alert: bump(score <= policy.alert_threshold(), self.at_or_below_alert),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordScore {
    pub score: RiskScore,
    pub policy: AlertPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrendCommand {
    RecordScore(RecordScore),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecorded {
    pub score: RiskScore,
    /// Counters after this score; apply stays independent of the policy.
    pub streaks: Streaks,
    /// Alert state once this score is taken into account.
    pub state: TrendState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrendEvent {
    ScoreRecorded(ScoreRecorded),
    StateChanged(AlertTransition),
}

impl Event for TrendEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TrendEvent::ScoreRecorded(_) => "risk.trend.score_recorded",
            TrendEvent::StateChanged(_) => "risk.trend.state_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TrendEvent::ScoreRecorded(e) => e.score.timestamp(),
            TrendEvent::StateChanged(t) => t.timestamp,
        }
    }
}

/// Aggregate root: the ordered score history and alert state of one supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTrend {
    supplier_id: SupplierId,
    scores: VecDeque<RiskScore>,
    state: TrendState,
    streaks: Streaks,
    history_limit: usize,
    transitions: u64,
    version: u64,
}

impl RiskTrend {
    pub fn new(supplier_id: SupplierId, history_limit: usize) -> Self {
        Self {
            supplier_id,
            scores: VecDeque::new(),
            state: TrendState::Normal,
            streaks: Streaks::default(),
            history_limit: history_limit.max(1),
            transitions: 0,
            version: 0,
        }
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn state(&self) -> TrendState {
        self.state
    }

    pub fn streaks(&self) -> Streaks {
        self.streaks
    }

    pub fn latest(&self) -> Option<&RiskScore> {
        self.scores.back()
    }

    /// Oldest first.
    pub fn scores(&self) -> impl Iterator<Item = &RiskScore> {
        self.scores.iter()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    fn next_state(&self, streaks: Streaks, score: f64, policy: &AlertPolicy) -> TrendState {
        let n = policy.hysteresis_count();
        match self.state {
            TrendState::Normal if streaks.above_alert >= n => TrendState::Alert,
            TrendState::Normal if score > policy.watch_threshold() => TrendState::Watch,
            TrendState::Watch if streaks.above_alert >= n => TrendState::Alert,
            TrendState::Watch if streaks.at_or_below_watch >= n => TrendState::Normal,
            TrendState::Alert if streaks.at_or_below_watch >= n => TrendState::Normal,
            TrendState::Alert if streaks.at_or_below_alert >= n => TrendState::Watch,
            current => current,
        }
    }

    fn handle_record(&self, cmd: &RecordScore) -> Result<Vec<TrendEvent>, DomainError> {
        let score = &cmd.score;
        if score.supplier_id() != self.supplier_id {
            return Err(DomainError::invariant(format!(
                "score for supplier {} recorded on trend of supplier {}",
                score.supplier_id(),
                self.supplier_id
            )));
        }
        if let Some(latest) = self.latest() {
            if score.timestamp() < latest.timestamp() {
                return Err(DomainError::conflict(format!(
                    "score at {} is older than latest recorded score at {}",
                    score.timestamp(),
                    latest.timestamp()
                )));
            }
        }

        let streaks = self.streaks.after(score.score(), &cmd.policy);
        let next = self.next_state(streaks, score.score(), &cmd.policy);

        let mut events = vec![TrendEvent::ScoreRecorded(ScoreRecorded {
            score: score.clone(),
            streaks,
            state: next,
        })];
        if next != self.state {
            events.push(TrendEvent::StateChanged(AlertTransition {
                supplier_id: self.supplier_id,
                previous_state: self.state,
                new_state: next,
                score: score.score(),
                timestamp: score.timestamp(),
            }));
        }
        Ok(events)
    }
}

impl AggregateRoot for RiskTrend {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.supplier_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for RiskTrend {
    type Command = TrendCommand;
    type Event = TrendEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TrendEvent::ScoreRecorded(e) => {
                self.scores.push_back(e.score.clone());
                while self.scores.len() > self.history_limit {
                    self.scores.pop_front();
                }
                self.streaks = e.streaks;
            }
            TrendEvent::StateChanged(t) => {
                self.state = t.new_state;
                self.transitions += 1;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TrendCommand::RecordScore(cmd) => self.handle_record(cmd),
        }
    }
}
