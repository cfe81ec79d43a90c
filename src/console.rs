use futures::channel::mpsc::Receiver;
use futures::StreamExt;
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::link::types::{AngleReading, LinkEvent};
use crate::threshold::{Threshold, ThresholdStore};

pub fn format_angle(reading: AngleReading, threshold: Threshold) -> String {
    if reading.degrees().abs() > f64::from(threshold.degrees()) {
        format!("Tilt: {} (critical {}) DANGER", reading, threshold)
    }
    else {
        format!("Tilt: {} (critical {})", reading, threshold)
    }
}

/// Prints link events to stdout, the terminal counterpart of a status screen.
pub fn spawn_console_presenter(
    mut events: Receiver<LinkEvent>,
    cancel: CancellationToken,
    thresholds: ThresholdStore,
) -> JoinHandle<()> {
    spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                event = events.next() => match event {
                    Some(LinkEvent::StateChange(state)) => println!("Status: {}", state),
                    Some(LinkEvent::Angle(reading)) => println!("{}", format_angle(reading, thresholds.get())),
                    None => break 'mainloop,
                },
            }
        }
    })
}
