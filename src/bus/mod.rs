//! Synchronous publish/subscribe event bus
//!
//! Keys ending in the namespace separator `:` subscribe to a whole
//! namespace: emitting `ns:event` delivers to exact `ns:event` subscribers
//! first (in subscription order), then to `ns:` subscribers with the
//! unqualified event name `event`. Delivery is synchronous and unbuffered;
//! a subscriber registered after an emit never sees that emit, so callers
//! that care must re-check current state after subscribing.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Separator between a namespace and the event name within a key
pub const NAMESPACE_SEPARATOR: char = ':';

/// Opaque event payload, shared across deliveries of one emit
#[derive(Clone)]
pub struct Payload(Arc<dyn Any + Send + Sync>);

impl Payload {
    /// Wrap a value as an event payload
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Payload for events that carry no data
    pub fn none() -> Self {
        Self::new(())
    }

    /// Borrow the payload as a concrete type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Payload(..)")
    }
}

/// A single delivery handed to a subscriber
#[derive(Debug, Clone)]
pub struct BusEvent {
    /// The full key as emitted
    pub key: String,
    /// Event name as seen by this subscriber: the full key for exact
    /// subscriptions, the unqualified remainder for namespace subscriptions
    pub event: String,
    /// Payload attached by the emitter
    pub payload: Payload,
}

/// Subscriber callback
pub type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

/// Identifier returned by `on`/`once`, usable with `off`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    once: bool,
    handler: Handler,
}

/// A delivery collected under a lock and invoked after release
pub(crate) struct Delivery {
    handler: Handler,
    event: BusEvent,
}

impl Delivery {
    pub(crate) fn invoke(self) {
        (self.handler)(&self.event);
    }
}

/// Publish/subscribe bus with per-key and per-namespace subscriptions
#[derive(Default)]
pub struct EventBus {
    channels: HashMap<String, Vec<Subscriber>>,
    next_id: u64,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a key; the handler fires on every matching emit
    pub fn on<F>(&mut self, key: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        self.subscribe(key.into(), Arc::new(handler), false)
    }

    /// Subscribe to a key for a single delivery
    ///
    /// The subscription is removed when it fires; it reliably fires for any
    /// emit of the key strictly after subscription, and never for earlier
    /// ones.
    pub fn once<F>(&mut self, key: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        self.subscribe(key.into(), Arc::new(handler), true)
    }

    fn subscribe(&mut self, key: String, handler: Handler, once: bool) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.channels
            .entry(key)
            .or_default()
            .push(Subscriber { id, once, handler });
        id
    }

    /// Remove a subscription; returns whether it was still present
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        for subscribers in self.channels.values_mut() {
            if let Some(position) = subscribers.iter().position(|sub| sub.id == id) {
                subscribers.remove(position);
                return true;
            }
        }
        false
    }

    /// Deliver synchronously to the current subscribers of `key`
    pub fn emit(&mut self, key: &str, payload: Payload) {
        for delivery in self.collect(key, payload) {
            delivery.invoke();
        }
    }

    /// Collect the deliveries an emit produces without invoking them,
    /// removing spent `once` subscriptions
    ///
    /// Lets the orchestrator fire handlers after releasing the lock that
    /// guards the bus, so handlers may call back into it freely.
    pub(crate) fn collect(&mut self, key: &str, payload: Payload) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        self.drain_channel(key, key, key, &payload, &mut deliveries);
        if let Some(position) = key.find(NAMESPACE_SEPARATOR) {
            let (namespace, event) = key.split_at(position + 1);
            if !event.is_empty() {
                self.drain_channel(namespace, key, event, &payload, &mut deliveries);
            }
        }
        deliveries
    }

    fn drain_channel(
        &mut self,
        channel: &str,
        key: &str,
        event: &str,
        payload: &Payload,
        out: &mut Vec<Delivery>,
    ) {
        let Some(subscribers) = self.channels.get_mut(channel) else {
            return;
        };
        let mut kept = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers.drain(..) {
            out.push(Delivery {
                handler: Arc::clone(&subscriber.handler),
                event: BusEvent {
                    key: key.to_string(),
                    event: event.to_string(),
                    payload: payload.clone(),
                },
            });
            if !subscriber.once {
                kept.push(subscriber);
            }
        }
        *subscribers = kept;
    }
}
