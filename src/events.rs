//! Fan-out of device changes to subscribers.
//!
//! Every subscriber owns a bounded queue. Publishing never waits: when a
//! subscriber's queue is full the new event is dropped for that subscriber
//! only and counted, so a stalled listener cannot hold up the registry or
//! other listeners.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::channel::mpsc;
use futures::{FutureExt, Stream, StreamExt};
use log::{debug, warn};
use uuid::Uuid;

use crate::device::{Bulb, Gateway};
use crate::errors::Error;
use crate::status::LightSensorReading;

/// A notification delivered to subscribers.
#[derive(Debug, Clone)]
pub enum Event {
    /// A gateway announced itself for the first time.
    GatewayDiscovered(Gateway),
    /// A bulb appeared, changed state, or changed visibility.
    BulbChanged(Bulb),
    /// A bulb reported an ambient light measurement.
    SensorReading(LightSensorReading),
    /// The receive socket failed; no further device updates will arrive.
    ReceiveFailed(Arc<Error>),
}

struct Subscriber {
    id: Uuid,
    sender: mpsc::Sender<Event>,
}

/// Ordered set of subscribers with per-subscriber bounded queues.
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    depth: usize,
    dropped: AtomicU64,
}

impl EventBus {
    pub const DEFAULT_DEPTH: usize = 64;

    /// Create a bus whose subscribers each buffer up to `depth` events.
    pub fn new(depth: usize) -> Self {
        EventBus {
            subscribers: Mutex::new(Vec::new()),
            depth: depth.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        // mpsc::channel(n) holds n + 1 items for a single sender
        let (sender, events) = mpsc::channel(self.depth - 1);
        let id = Uuid::new_v4();
        self.lock().push(Subscriber { id, sender });
        debug!("subscriber {id} registered");
        Subscription { id, events }
    }

    /// Remove a subscriber; its stream ends once drained.
    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|sub| sub.id != *id);
        subscribers.len() != before
    }

    /// Deliver `event` to every subscriber without waiting.
    pub fn publish(&self, event: Event) {
        let mut subscribers = self.lock();
        subscribers.retain_mut(|sub| match sub.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(err) if err.is_full() => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("subscriber {} is not keeping up; event dropped", sub.id);
                true
            }
            Err(_) => {
                debug!("subscriber {} went away", sub.id);
                false
            }
        });
    }

    /// Close every subscriber queue. Streams end after their buffered events.
    pub fn close(&self) {
        self.lock().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Events discarded because a subscriber's queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEPTH)
    }
}

/// Receiving end of a subscription.
///
/// Events arrive in publication order. The stream ends when the client shuts
/// down or the subscription is removed; dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    events: mpsc::Receiver<Event>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next event; `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.events.next().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.events.next().now_or_never().flatten()
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.events.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::LightSensorReading;
    use crate::types::DeviceAddress;

    fn reading(lux: f32) -> Event {
        Event::SensorReading(LightSensorReading {
            bulb: DeviceAddress::ZERO,
            lux,
        })
    }

    fn lux(event: Event) -> f32 {
        match event {
            Event::SensorReading(r) => r.lux,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_events_arrive_in_order() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        for i in 0..3 {
            bus.publish(reading(i as f32));
        }

        assert_eq!(lux(sub.try_recv().unwrap()), 0.0);
        assert_eq!(lux(sub.try_recv().unwrap()), 1.0);
        assert_eq!(lux(sub.try_recv().unwrap()), 2.0);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe();
        let mut fast = bus.subscribe();

        for i in 0..3 {
            bus.publish(reading(i as f32));
            // keep one subscriber drained
            fast.try_recv().unwrap();
        }

        assert_eq!(bus.dropped(), 1);
        assert_eq!(lux(slow.try_recv().unwrap()), 0.0);
        assert_eq!(lux(slow.try_recv().unwrap()), 1.0);
        assert!(slow.try_recv().is_none());
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        let _keep = bus.subscribe();
        drop(sub);

        bus.publish(reading(1.0));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_unsubscribe_and_close_end_stream() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert!(bus.unsubscribe(&first.id()));
        assert!(!bus.unsubscribe(&first.id()));
        bus.publish(reading(3.0));

        assert!(first.try_recv().is_none());
        assert_eq!(lux(second.try_recv().unwrap()), 3.0);

        bus.close();
        assert!(futures::executor::block_on(second.recv()).is_none());
    }
}
