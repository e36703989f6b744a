//! Typed publish/subscribe hub holding one current value.
//!
//! Listeners are called synchronously, in subscription order, outside the
//! internal lock, so a listener may subscribe, unsubscribe or read the state
//! without deadlocking. A listener added while an emit is being delivered only
//! sees later emits.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::broadcast;
use tracing::debug;

const STREAM_CAPACITY: usize = 64;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slot<T> {
    id: u64,
    active: Arc<AtomicBool>,
    listener: Listener<T>,
}

struct Registry<T> {
    state: T,
    slots: Vec<Arc<Slot<T>>>,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T: Send> Detach for Mutex<Registry<T>> {
    fn detach(&self, id: u64) {
        let mut registry = self.lock().unwrap_or_else(PoisonError::into_inner);
        registry.slots.retain(|slot| slot.id != id);
    }
}

/// Handle returned by [`Broadcaster::subscribe`]. Dropping it does not
/// unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    /// Safe to call any number of times, including from inside a listener.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            if let Some(registry) = self.registry.upgrade() {
                registry.detach(self.id);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

pub struct Broadcaster<T> {
    registry: Arc<Mutex<Registry<T>>>,
    next_id: Arc<AtomicU64>,
    stream: broadcast::Sender<T>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            next_id: Arc::clone(&self.next_id),
            stream: self.stream.clone(),
        }
    }
}

impl<T> Broadcaster<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);

        Self {
            registry: Arc::new(Mutex::new(Registry {
                state: initial,
                slots: Vec::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
            stream,
        }
    }

    /// Last emitted value.
    pub fn get_state(&self) -> T {
        self.lock().state.clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));

        self.lock().slots.push(Arc::new(Slot {
            id,
            active: Arc::clone(&active),
            listener: Arc::new(listener),
        }));

        let registry: Arc<dyn Detach> = self.registry.clone();
        Subscription {
            id,
            active,
            registry: Arc::downgrade(&registry),
        }
    }

    /// Async view of the same transitions. A receiver that falls behind by
    /// more than the channel capacity skips the oldest values.
    pub fn subscribe_stream(&self) -> broadcast::Receiver<T> {
        self.stream.subscribe()
    }

    pub fn emit(&self, state: T) {
        let slots = {
            let mut registry = self.lock();
            registry.state = state.clone();
            registry.slots.clone()
        };

        for slot in slots {
            // Unsubscribed earlier in this same delivery round
            if slot.active.load(Ordering::Acquire) {
                (slot.listener)(&state);
            }
        }

        if self.stream.send(state).is_err() {
            debug!("No stream receivers for emitted state");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().slots.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for Broadcaster<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(&u32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: &u32| sink.lock().unwrap().push(*value))
    }

    #[test]
    fn test_get_state_returns_last_emit() {
        let hub = Broadcaster::new(0u32);
        assert_eq!(hub.get_state(), 0);

        hub.emit(7);
        hub.emit(9);
        assert_eq!(hub.get_state(), 9);
    }

    #[test]
    fn test_every_transition_delivered_in_order() {
        let hub = Broadcaster::new(0u32);
        let (seen, listener) = recorder();
        hub.subscribe(listener);

        for value in 1..=5 {
            hub.emit(value);
        }

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_listeners_called_in_subscription_order() {
        let hub = Broadcaster::new(0u32);
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            hub.subscribe(move |_| order.lock().unwrap().push(tag));
        }
        hub.emit(1);

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let hub = Broadcaster::new(0u32);
        let (seen, listener) = recorder();
        let subscription = hub.subscribe(listener);

        hub.emit(1);
        subscription.unsubscribe();
        subscription.unsubscribe();
        hub.emit(2);

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(hub.subscriber_count(), 0);
        assert!(!subscription.is_active());
    }

    #[test]
    fn test_unsubscribe_during_delivery_skips_later_listener() {
        let hub = Broadcaster::new(0u32);
        let victim_slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&victim_slot);
        hub.subscribe(move |_| {
            if let Some(subscription) = slot.lock().unwrap().as_ref() {
                subscription.unsubscribe();
            }
        });

        let (seen, listener) = recorder();
        let victim = hub.subscribe(listener);
        *victim_slot.lock().unwrap() = Some(victim);

        hub.emit(1);
        hub.emit(2);

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_subscribe_during_delivery_does_not_see_current_emit() {
        let hub = Broadcaster::new(0u32);
        let (late_seen, late_listener) = recorder();
        let late_listener = Arc::new(late_listener);
        let registered = Arc::new(AtomicBool::new(false));

        let inner_hub = hub.clone();
        let flag = Arc::clone(&registered);
        hub.subscribe(move |_| {
            if !flag.swap(true, Ordering::SeqCst) {
                let late = Arc::clone(&late_listener);
                inner_hub.subscribe(move |value| late(value));
            }
        });

        hub.emit(1);
        assert!(late_seen.lock().unwrap().is_empty());

        hub.emit(2);
        assert_eq!(*late_seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_listener_reads_new_state_during_delivery() {
        let hub = Broadcaster::new(0u32);
        let observed = Arc::new(Mutex::new(None));

        let reader = hub.clone();
        let sink = Arc::clone(&observed);
        hub.subscribe(move |_| *sink.lock().unwrap() = Some(reader.get_state()));
        hub.emit(4);

        assert_eq!(*observed.lock().unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_stream_receives_transitions() {
        let hub = Broadcaster::new(0u32);
        let mut stream = hub.subscribe_stream();

        hub.emit(1);
        hub.emit(2);

        assert_eq!(stream.recv().await.unwrap(), 1);
        assert_eq!(stream.recv().await.unwrap(), 2);
    }
}
