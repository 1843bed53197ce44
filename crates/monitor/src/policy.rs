use riskwatch_core::{DomainError, DomainResult};

/// Thresholds and hysteresis of the NORMAL / WATCH / ALERT state machine.
///
/// Valid when `0 < watch_threshold <= alert_threshold <= 1` and
/// `hysteresis_count >= 1`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AlertPolicy {
    watch_threshold: f64,
    alert_threshold: f64,
    hysteresis_count: u32,
}

impl AlertPolicy {
    pub fn new(watch_threshold: f64, alert_threshold: f64, hysteresis_count: u32) -> DomainResult<Self> {
        if !watch_threshold.is_finite() || watch_threshold <= 0.0 || watch_threshold > 1.0 {
            return Err(DomainError::validation(format!(
                "watch_threshold must be in (0, 1], got {watch_threshold}"
            )));
        }
        if !alert_threshold.is_finite() || alert_threshold <= 0.0 || alert_threshold > 1.0 {
            return Err(DomainError::validation(format!(
                "alert_threshold must be in (0, 1], got {alert_threshold}"
            )));
        }
        if watch_threshold > alert_threshold {
            return Err(DomainError::validation(format!(
                "watch_threshold ({watch_threshold}) must not exceed alert_threshold ({alert_threshold})"
            )));
        }
        if hysteresis_count == 0 {
            return Err(DomainError::validation("hysteresis_count must be at least 1"));
        }

        Ok(Self {
            watch_threshold,
            alert_threshold,
            hysteresis_count,
        })
    }

    pub fn watch_threshold(&self) -> f64 {
        self.watch_threshold
    }

    pub fn alert_threshold(&self) -> f64 {
        self.alert_threshold
    }

    pub fn hysteresis_count(&self) -> u32 {
        self.hysteresis_count
    }
}

impl Default for AlertPolicy {
    /// Watch above 0.5, alert above 0.8, three consecutive scores to move.
    fn default() -> Self {
        Self {
            watch_threshold: 0.5,
            alert_threshold: 0.8,
            hysteresis_count: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_thresholds() {
        assert!(AlertPolicy::new(0.9, 0.8, 3).is_err());
        assert!(AlertPolicy::new(0.8, 0.8, 3).is_ok());
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        assert!(AlertPolicy::new(0.0, 0.8, 3).is_err());
        assert!(AlertPolicy::new(0.5, 1.5, 3).is_err());
        assert!(AlertPolicy::new(f64::NAN, 0.8, 3).is_err());
    }

    #[test]
    fn rejects_zero_hysteresis() {
        assert!(matches!(
            AlertPolicy::new(0.5, 0.8, 0),
            Err(DomainError::Validation(_))
        ));
    }
}
