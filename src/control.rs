use std::str::FromStr;
use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ThresholdError;
use crate::link::publisher::StatusPublisher;
use crate::threshold::{Threshold, ThresholdStore};

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    SetCriticalAngle(Threshold),
    Status,
}

impl FromStr for ControlCommand {
    type Err = ThresholdError;

    // "status", "set <degrees>" or a bare number
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("status") {
            return Ok(ControlCommand::Status);
        }

        let value = s.strip_prefix("set ").unwrap_or(s);
        Ok(ControlCommand::SetCriticalAngle(value.parse()?))
    }
}

/// Executes one command and returns the reply for the user.
pub async fn handle_command(
    command: ControlCommand,
    thresholds: &ThresholdStore,
    publisher: &StatusPublisher,
) -> String {
    match command {
        ControlCommand::SetCriticalAngle(value) => match thresholds.set(value).await {
            Ok(()) => format!("Critical angle updated: {}", value),
            // the new value is already in effect, only saving it failed
            Err(err) => format!("Critical angle updated to {} but not saved: {}", value, err),
        },
        ControlCommand::Status => {
            let snapshot = publisher.snapshot();
            let state = snapshot.state.map(|state| state.to_string()).unwrap_or_else(|| "-".to_string());
            let angle = snapshot.angle.map(|angle| angle.to_string()).unwrap_or_else(|| "-".to_string());
            format!("Status: {} | Tilt: {} | Critical angle: {}", state, angle, thresholds.get())
        },
    }
}

/// Reads commands line by line from `input` until it ends or `cancel` fires. Replies are
/// printed to stdout.
pub fn spawn_control_input<R>(
    input: R,
    cancel: CancellationToken,
    thresholds: ThresholdStore,
    publisher: StatusPublisher,
) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    spawn(async move {
        let mut lines = input.lines();

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue 'mainloop;
                        }
                        match line.parse::<ControlCommand>() {
                            Ok(command) => println!("{}", handle_command(command, &thresholds, &publisher).await),
                            Err(err) => {
                                warn!("Rejected command {:?}: {}", line, err);
                                println!("Invalid value: {}", err);
                            },
                        }
                    },
                    Ok(None) => {
                        info!("Control input closed");
                        break 'mainloop;
                    },
                    Err(err) => {
                        warn!("Failed to read control input: {}", err);
                        break 'mainloop;
                    },
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::link::types::{AngleReading, ConnectionState};

    #[test]
    fn parses_commands() {
        assert_eq!("status".parse::<ControlCommand>().unwrap(), ControlCommand::Status);
        assert_eq!(
            "set 12.5".parse::<ControlCommand>().unwrap(),
            ControlCommand::SetCriticalAngle(Threshold::new(12.5).unwrap()),
        );
        assert_eq!(
            "8".parse::<ControlCommand>().unwrap(),
            ControlCommand::SetCriticalAngle(Threshold::new(8.0).unwrap()),
        );
    }

    #[test]
    fn rejects_invalid_angles_before_the_store() {
        assert_matches!("set abc".parse::<ControlCommand>(), Err(ThresholdError::NotANumber { .. }));
        assert_matches!("set -1".parse::<ControlCommand>(), Err(ThresholdError::NotPositive(_)));
        assert_matches!("hello".parse::<ControlCommand>(), Err(ThresholdError::NotANumber { .. }));
    }

    #[tokio::test]
    async fn status_reports_snapshot() {
        let thresholds = ThresholdStore::in_memory(Threshold::default());
        let publisher = StatusPublisher::new();
        publisher.publish_state(ConnectionState::Connected);
        publisher.publish_angle(AngleReading::new(4.0).unwrap());

        let reply = handle_command(ControlCommand::Status, &thresholds, &publisher).await;
        assert_eq!(reply, "Status: Connected | Tilt: 4.00° | Critical angle: 15°");
    }

    #[tokio::test]
    async fn input_lines_update_the_store() {
        let thresholds = ThresholdStore::in_memory(Threshold::default());
        let input: &'static [u8] = b"set 9.5\nnonsense\n-4\n\n";

        let handle = spawn_control_input(input, CancellationToken::new(), thresholds.clone(), StatusPublisher::new());
        handle.await.unwrap();

        assert_eq!(thresholds.get().degrees(), 9.5);
    }
}
