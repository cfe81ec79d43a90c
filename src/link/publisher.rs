use std::sync::{Arc, Mutex, MutexGuard};
use futures::channel::mpsc::{channel, Receiver, Sender};
use log::{debug, trace};

use crate::link::types::{AngleReading, ConnectionState, LinkEvent};

/// Last-known link status, for listeners that subscribe after the fact.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatusSnapshot {
    pub state: Option<ConnectionState>,
    pub angle: Option<AngleReading>,
}

#[derive(Default)]
struct PublisherInner {
    subscribers: Vec<Sender<LinkEvent>>,
    snapshot: StatusSnapshot,
}

/// Fans link events out to subscribers.
///
/// Each publish is delivered at most once to each current subscriber. A subscriber whose channel
/// is full misses the event; one whose receiver was dropped is removed. Nothing is replayed to
/// late subscribers, use [`StatusPublisher::snapshot`] instead.
#[derive(Clone, Default)]
pub struct StatusPublisher {
    inner: Arc<Mutex<PublisherInner>>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PublisherInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self, buffer: usize) -> Receiver<LinkEvent> {
        let (sender, receiver) = channel::<LinkEvent>(buffer);
        self.lock().subscribers.push(sender);
        receiver
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().snapshot
    }

    pub fn publish_state(&self, state: ConnectionState) {
        let mut inner = self.lock();
        inner.snapshot.state = Some(state);
        broadcast(&mut inner.subscribers, LinkEvent::StateChange(state));
    }

    pub fn publish_angle(&self, reading: AngleReading) {
        let mut inner = self.lock();
        inner.snapshot.angle = Some(reading);
        broadcast(&mut inner.subscribers, LinkEvent::Angle(reading));
    }
}

fn broadcast(subscribers: &mut Vec<Sender<LinkEvent>>, event: LinkEvent) {
    if subscribers.is_empty() {
        trace!("No subscribers, dropping {:?}", event);
        return;
    }

    subscribers.retain_mut(|sender| match sender.try_send(event.clone()) {
        Ok(()) => true,
        Err(err) if err.is_disconnected() => {
            debug!("Removing closed status subscriber");
            false
        },
        Err(_) => {
            debug!("Status subscriber is full, dropping {:?}", event);
            true
        },
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn reading(degrees: f64) -> AngleReading {
        AngleReading::new(degrees).unwrap()
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let publisher = StatusPublisher::new();
        publisher.publish_state(ConnectionState::Connecting);

        // late subscriber does not get a replay
        let mut receiver = publisher.subscribe(8);
        assert!(receiver.try_next().is_err());

        // but the snapshot reflects the last publish
        assert_eq!(publisher.snapshot().state, Some(ConnectionState::Connecting));
    }

    #[tokio::test]
    async fn every_subscriber_gets_each_event_once() {
        let publisher = StatusPublisher::new();
        let mut first = publisher.subscribe(8);
        let mut second = publisher.subscribe(8);

        publisher.publish_state(ConnectionState::Connected);
        publisher.publish_angle(reading(3.5));

        for receiver in [&mut first, &mut second] {
            assert_eq!(receiver.next().await, Some(LinkEvent::StateChange(ConnectionState::Connected)));
            assert_eq!(receiver.next().await, Some(LinkEvent::Angle(reading(3.5))));
            assert!(receiver.try_next().is_err());
        }
    }

    #[test]
    fn full_subscriber_misses_events_without_blocking() {
        let publisher = StatusPublisher::new();
        let mut receiver = publisher.subscribe(0);

        for i in 0..10 {
            publisher.publish_angle(reading(i as f64));
        }

        // a zero-buffer channel still holds one message per sender
        assert_eq!(receiver.try_next().unwrap(), Some(LinkEvent::Angle(reading(0.0))));
        assert!(receiver.try_next().is_err());
        assert_eq!(publisher.snapshot().angle, Some(reading(9.0)));
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let publisher = StatusPublisher::new();
        let receiver = publisher.subscribe(8);
        drop(receiver);

        publisher.publish_state(ConnectionState::AwaitingReconnect);
        assert!(publisher.lock().subscribers.is_empty());
    }
}
