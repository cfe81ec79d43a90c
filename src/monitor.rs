use std::sync::Arc;
use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alert::sink::AlertSink;
use crate::link::connection::spawn_link;
use crate::link::publisher::{StatusPublisher, StatusSnapshot};
use crate::link::types::LinkConfig;
use crate::threshold::ThresholdStore;

/// A running telemetry link plus the alert surface it drives.
pub struct Monitor {
    // this token is cancelled upon shutdown
    cancel: CancellationToken,
    publisher: StatusPublisher,
    alert: Arc<dyn AlertSink>,
    link_handle: Option<JoinHandle<()>>,
    released: bool,
}

impl Monitor {
    /// Starts the link task. Subscribe to `publisher` before calling this to see the first
    /// `Connecting` status.
    pub fn start(
        config: LinkConfig,
        thresholds: ThresholdStore,
        publisher: StatusPublisher,
        alert: Arc<dyn AlertSink>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let link_handle = spawn_link(
            config,
            cancel.child_token(),
            thresholds,
            publisher.clone(),
            alert.clone(),
        );

        Monitor {
            cancel,
            publisher,
            alert,
            link_handle: Some(link_handle),
            released: false,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.publisher.snapshot()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.link_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the link (including a pending reconnect), closes the connection and releases the
    /// alert surface. Calling this again does nothing.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.link_handle.take() {
            info!("Waiting for telemetry link to stop");
            if let Err(err) = handle.await {
                error!("Telemetry link task failed: {}", err);
            }
        }

        if !self.released {
            self.released = true;
            self.alert.release();
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
