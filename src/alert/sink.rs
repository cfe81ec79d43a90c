use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use log::{info, warn};

use crate::link::types::AngleReading;
use crate::threshold::Threshold;

/// The user-facing alert surface: a high-priority notification plus an alert sound.
pub trait AlertSink: Send + Sync {
    /// Raise the danger notification and play the alert sound.
    fn trigger(&self, reading: AngleReading, threshold: Threshold);

    /// Stop the alert sound if it is playing.
    fn stop(&self);

    /// Release the sound resource. Must be safe to call more than once.
    fn release(&self);
}

/// Alert surface for a terminal: logs the notification and rings the terminal bell as the
/// alert sound.
#[derive(Debug, Default)]
pub struct TerminalAlert {
    // alarm active; cleared by stop/release
    playing: AtomicBool,
    released: AtomicBool,
    rings: AtomicUsize,
}

impl TerminalAlert {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// How many times the bell has rung.
    pub fn rings(&self) -> usize {
        self.rings.load(Ordering::Acquire)
    }

    fn ring_bell(&self) {
        self.rings.fetch_add(1, Ordering::AcqRel);
        let mut stderr = std::io::stderr();
        if let Err(err) = stderr.write_all(b"\x07").and_then(|_| stderr.flush()) {
            warn!("Failed to ring terminal bell: {}", err);
        }
    }
}

impl AlertSink for TerminalAlert {
    fn trigger(&self, reading: AngleReading, threshold: Threshold) {
        if self.released.load(Ordering::Acquire) {
            return;
        }

        warn!("DANGER: trailer tilt {} exceeds critical angle {}", reading, threshold);

        // the bell is a one-shot sound, so every fired alert rings it again
        self.playing.store(true, Ordering::Release);
        self.ring_bell();
    }

    fn stop(&self) {
        if self.playing.swap(false, Ordering::AcqRel) {
            info!("Alert sound stopped");
        }
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop();
        info!("Alert resources released");
    }
}
