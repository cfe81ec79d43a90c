use std::time::{Duration, Instant};

use crate::link::types::AngleReading;
use crate::threshold::Threshold;

/**
 * Minimum time (milliseconds) between two alerts.
 */
pub const ALERT_COOLDOWN: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// The reading exceeds the threshold and the cooldown has elapsed.
    Fire,
    /// The reading exceeds the threshold but an alert fired recently.
    Suppressed,
    Safe,
}

/// Decides whether a reading raises an alert. Qualifying readings inside the cooldown window
/// are dropped, not queued.
#[derive(Debug)]
pub struct AlertDebouncer {
    cooldown: Duration,
    last_alert: Option<Instant>,
}

impl AlertDebouncer {
    pub fn new(cooldown: Duration) -> Self {
        AlertDebouncer { cooldown, last_alert: None }
    }

    pub fn last_alert(&self) -> Option<Instant> {
        self.last_alert
    }

    pub fn evaluate(&mut self, reading: AngleReading, threshold: Threshold) -> AlertDecision {
        self.evaluate_at(reading, threshold, Instant::now())
    }

    pub fn evaluate_at(&mut self, reading: AngleReading, threshold: Threshold, now: Instant) -> AlertDecision {
        if reading.degrees().abs() <= f64::from(threshold.degrees()) {
            return AlertDecision::Safe;
        }

        let cooled_down = match self.last_alert {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
        };

        if cooled_down {
            self.last_alert = Some(now);
            AlertDecision::Fire
        } else {
            AlertDecision::Suppressed
        }
    }
}

impl Default for AlertDebouncer {
    fn default() -> Self {
        AlertDebouncer::new(Duration::from_millis(ALERT_COOLDOWN))
    }
}
