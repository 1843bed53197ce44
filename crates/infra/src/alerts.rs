//! Outbound alert delivery.

use std::sync::Arc;
use std::time::Duration;

use riskwatch_core::RetryPolicy;
use riskwatch_monitor::{AlertDeliveryError, AlertSink, AlertTransition};

/// POSTs every transition as JSON to a fixed URL.
///
/// Transport failures and 5xx/429 answers are retried per the retry policy;
/// any other non-success status is a rejection and is not retried.
#[derive(Debug)]
pub struct WebhookAlertSink {
    url: String,
    http: reqwest::blocking::Client,
    retry: RetryPolicy,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self, AlertDeliveryError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlertDeliveryError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
            retry,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn post(&self, transition: &AlertTransition) -> Result<(), AlertDeliveryError> {
        let response = self
            .http
            .post(&self.url)
            .json(transition)
            .send()
            .map_err(|e| AlertDeliveryError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AlertDeliveryError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

impl AlertSink for WebhookAlertSink {
    fn deliver(&self, transition: &AlertTransition) -> Result<(), AlertDeliveryError> {
        self.retry
            .run(
                |attempt| {
                    self.post(transition).inspect_err(|e| {
                        tracing::debug!(
                            supplier = %transition.supplier_id,
                            attempt,
                            error = %e,
                            "webhook delivery attempt failed"
                        );
                    })
                },
                AlertDeliveryError::is_transient,
            )
            .map_err(|exhausted| exhausted.last_error)
    }
}

/// Writes transitions to the log. Alerts at `warn`, everything else at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn deliver(&self, t: &AlertTransition) -> Result<(), AlertDeliveryError> {
        if t.is_alert() {
            tracing::warn!(
                supplier = %t.supplier_id,
                from = %t.previous_state,
                to = %t.new_state,
                score = t.score,
                "supplier risk alert"
            );
        } else {
            tracing::info!(
                supplier = %t.supplier_id,
                from = %t.previous_state,
                to = %t.new_state,
                score = t.score,
                "supplier risk state changed"
            );
        }
        Ok(())
    }
}

/// Hands each transition to every inner sink.
///
/// All sinks are tried even when one fails; the first error is returned.
#[derive(Default)]
pub struct FanoutAlertSink {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl FanoutAlertSink {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AlertSink for FanoutAlertSink {
    fn deliver(&self, transition: &AlertTransition) -> Result<(), AlertDeliveryError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(transition) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
