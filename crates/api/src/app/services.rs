use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use riskwatch_core::{Supplier, SupplierId};
use riskwatch_events::{Event, ProjectionRunner};
use riskwatch_infra::{
    Pipeline, PipelineError, ProjectionWorker, RiskMonitorHandle, RiskwatchServices, WorkerHandle,
};
use riskwatch_monitor::{
    AggregatorError, AlertTransition, BoardRow, RiskBoard, RiskTrend, TrendEnvelope,
};
use riskwatch_scoring::RiskAssessment;
use riskwatch_signals::Signal;

use crate::app::errors;

/// Realtime message broadcast via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub supplier_id: SupplierId,
    pub topic: &'static str,
    pub payload: JsonValue,
}

/// Shared state behind every handler.
///
/// Owns the background threads: the scoring runner and the worker that keeps
/// the risk board current from the trend event bus.
pub struct AppServices {
    pipeline: Arc<Pipeline>,
    board: Arc<Mutex<ProjectionRunner<RiskBoard>>>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
    runner: Mutex<Option<RiskMonitorHandle>>,
    board_worker: Mutex<Option<WorkerHandle>>,
}

impl AppServices {
    /// Seed the board from persisted trends, subscribe it to the bus, then
    /// start the runner.
    ///
    /// The board subscribes first so the runner's startup pass is not missed.
    pub fn start(services: RiskwatchServices) -> std::io::Result<Self> {
        let board = Arc::new(Mutex::new(ProjectionRunner::new(seeded_board(&services.pipeline))));

        // Realtime channel (SSE): lossy broadcast.
        let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

        let board_worker = {
            let board = board.clone();
            let realtime_tx = realtime_tx.clone();
            ProjectionWorker::spawn("riskwatch.board", &services.bus, None, move |env: TrendEnvelope| -> Result<(), &'static str> {
                let applied = board
                    .lock()
                    .map_err(|_| "risk board lock poisoned")?
                    .apply_all(std::iter::once(&env));
                if applied == 0 {
                    // Redelivery of an envelope the board already has.
                    return Ok(());
                }

                let _ = realtime_tx.send(RealtimeMessage {
                    supplier_id: env.supplier_id(),
                    topic: env.payload().event_type(),
                    payload: serde_json::to_value(env.payload()).unwrap_or(JsonValue::Null),
                });
                Ok(())
            })?
        };

        let runner = services.runner.spawn("riskwatch.runner", services.pipeline.clone())?;

        Ok(Self {
            pipeline: services.pipeline,
            board,
            realtime_tx,
            runner: Mutex::new(Some(runner)),
            board_worker: Mutex::new(Some(board_worker)),
        })
    }

    /// Stop the runner, then the board worker. Idempotent.
    pub fn shutdown(&self) {
        if let Some(h) = self.runner.lock().ok().and_then(|mut r| r.take()) {
            h.shutdown();
        }
        if let Some(h) = self.board_worker.lock().ok().and_then(|mut w| w.take()) {
            h.shutdown();
        }
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    pub fn suppliers(&self) -> Vec<Supplier> {
        self.pipeline.suppliers().cloned().collect()
    }

    pub fn supplier(&self, id: SupplierId) -> Option<Supplier> {
        self.pipeline.supplier(id).cloned()
    }

    pub fn board_row(&self, id: SupplierId) -> Option<BoardRow> {
        let board = self.board.lock().ok()?;
        board.projection().row(id).cloned()
    }

    pub fn board_rows(&self) -> Vec<BoardRow> {
        self.board
            .lock()
            .map(|b| b.projection().rows())
            .unwrap_or_default()
    }

    pub fn recent_transitions(&self) -> Vec<AlertTransition> {
        self.board
            .lock()
            .map(|b| b.projection().recent_transitions())
            .unwrap_or_default()
    }

    pub fn latest_assessment(&self, id: SupplierId) -> Option<RiskAssessment> {
        self.pipeline.latest_assessment(id)
    }

    pub fn trend(&self, id: SupplierId) -> Result<Option<RiskTrend>, AggregatorError> {
        self.pipeline.aggregator().trend(id)
    }

    /// Append a pushed signal and ask the runner for an early pass.
    pub fn ingest(&self, signal: Signal) -> Result<bool, PipelineError> {
        let fresh = self.pipeline.ingest(signal)?;
        if fresh {
            self.trigger_scoring();
        }
        Ok(fresh)
    }

    pub fn trigger_scoring(&self) {
        if let Ok(runner) = self.runner.lock() {
            if let Some(r) = runner.as_ref() {
                r.trigger();
            }
        }
    }
}

/// Board rows for every supplier with a persisted trend.
///
/// Without this a supplier that was already in ALERT before a restart would
/// read as NORMAL until its next transition.
fn seeded_board(pipeline: &Pipeline) -> RiskBoard {
    let mut board = RiskBoard::default();
    let aggregator = pipeline.aggregator();
    let ids = match aggregator.suppliers() {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(error = %e, "could not list persisted trends; board starts empty");
            return board;
        }
    };
    for id in ids {
        match aggregator.trend(id) {
            Ok(Some(trend)) => board.seed(&trend),
            Ok(None) => {}
            Err(e) => tracing::warn!(supplier = %id, error = %e, "could not load persisted trend"),
        }
    }
    board
}

/// Run `f` on the blocking pool.
///
/// Trend reads may hit the file store and every accessor takes a std lock,
/// so handlers never call `AppServices` on an async worker directly.
pub async fn run_blocking<T, F>(services: &Arc<AppServices>, f: F) -> Result<T, axum::response::Response>
where
    F: FnOnce(&AppServices) -> T + Send + 'static,
    T: Send + 'static,
{
    let services = services.clone();
    tokio::task::spawn_blocking(move || f(&services))
        .await
        .map_err(|e| errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string()))
}

/// Server-sent events for every board update.
pub fn trend_sse_stream(
    services: Arc<AppServices>,
    supplier: Option<SupplierId>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if supplier.is_none_or(|s| s == m.supplier_id) => {
            let data = serde_json::to_string(&m).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
