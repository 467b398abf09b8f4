//! In-process fan-out of punch events to live listeners

use tokio::sync::broadcast;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tracing::{debug, warn};

use crate::models::PunchEvent;

/// Enough to absorb a burst of punches at shift change
const BROADCAST_CAPACITY: usize = 256;

/// Fire-and-forget publisher. Late subscribers get no replay and lagging ones
/// lose the events they missed.
#[derive(Clone)]
pub struct PunchBroadcaster {
    tx: broadcast::Sender<PunchEvent>,
}

impl Default for PunchBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl PunchBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Returns how many listeners received the event.
    pub fn publish(&self, event: PunchEvent) -> usize {
        match self.tx.send(event) {
            Ok(listeners) => listeners,
            Err(_) => {
                debug!("No punch listeners connected");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PunchEvent> {
        self.tx.subscribe()
    }

    /// Live events of one organization.
    pub fn stream_for(&self, organization_id: i64) -> impl Stream<Item = PunchEvent> + use<> {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |received| match received {
            Ok(event) if event.organization_id == organization_id => Some(event),
            Ok(_) => None,
            Err(lagged) => {
                warn!(organization_id, "Punch listener lagged: {}", lagged);
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PunchType;

    fn event(punch_id: i64, organization_id: i64) -> PunchEvent {
        PunchEvent {
            punch_id,
            employee_id: 1,
            employee_name: "Grace Hopper".to_string(),
            punch_type: PunchType::In,
            timestamp: "2025-03-10T08:00:00.000Z".to_string(),
            location_name: None,
            organization_id,
        }
    }

    #[test]
    fn test_publish_without_listeners() {
        let hub = PunchBroadcaster::new();
        assert_eq!(hub.publish(event(1, 1)), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let hub = PunchBroadcaster::new();
        let mut rx = hub.subscribe();

        assert_eq!(hub.publish(event(9, 1)), 1);
        assert_eq!(rx.recv().await.unwrap().punch_id, 9);
    }

    #[tokio::test]
    async fn test_stream_filters_by_organization() {
        let hub = PunchBroadcaster::new();
        let stream = hub.stream_for(2);
        tokio::pin!(stream);

        hub.publish(event(1, 1));
        hub.publish(event(2, 2));

        assert_eq!(stream.next().await.unwrap().punch_id, 2);
    }
}
