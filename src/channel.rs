//! # Event Channel
//!
//! Minimal synchronous publish/subscribe primitive.
//!
//! A [`Channel`] is owned by whoever produces events (the manager, a gamepad
//! record, an input source). Consumers only ever get a [`Receiver`], which can
//! subscribe and unsubscribe but cannot emit or close.
//!
//! Delivery is synchronous and in subscription order. Emission iterates over a
//! snapshot of the handler list, so a handler may subscribe or unsubscribe
//! (itself included) while an event is being delivered. A handler added during
//! an emission first sees the next event. A handler removed during an emission
//! is not called again, and closing the channel from a handler stops delivery
//! of the current event to everyone left.
//!
//! ## Usage
//!
//! ```
//! use gamepad_events::channel::Channel;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let channel = Channel::<u32>::new();
//! let total = Rc::new(Cell::new(0));
//!
//! let sink = Rc::clone(&total);
//! channel.receiver().subscribe(move |value| sink.set(sink.get() + value));
//!
//! channel.emit(&2);
//! channel.emit(&3);
//! assert_eq!(total.get(), 5);
//!
//! channel.close();
//! channel.emit(&10);
//! assert_eq!(total.get(), 5);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handle returned by [`Receiver::subscribe`], used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler<E> = Rc<dyn Fn(&E)>;

/// Owner side of an event channel.
pub struct Channel<E> {
    handlers: RefCell<Vec<(SubscriptionId, Handler<E>)>>,
    next_id: Cell<u64>,
    closed: Cell<bool>,
}

impl<E> Channel<E> {
    /// Creates an open channel with no subscribers.
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            closed: Cell::new(false),
        }
    }

    /// Consumer-facing view of this channel.
    pub fn receiver(&self) -> Receiver<'_, E> {
        Receiver { channel: self }
    }

    /// Delivers `event` to every current subscriber.
    ///
    /// Returns the number of handlers invoked. Emitting on a closed channel
    /// is a no-op and returns 0.
    ///
    /// Handlers unsubscribed by an earlier handler are skipped, and nothing
    /// more is delivered once a handler closes the channel.
    pub fn emit(&self, event: &E) -> usize {
        if self.closed.get() {
            return 0;
        }

        let snapshot: Vec<(SubscriptionId, Handler<E>)> = self
            .handlers
            .borrow()
            .iter()
            .map(|(id, handler)| (*id, Rc::clone(handler)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in &snapshot {
            // An earlier handler may have closed the channel or removed this one
            if self.closed.get() {
                break;
            }
            if !self.is_subscribed(*id) {
                continue;
            }
            handler(event);
            delivered += 1;
        }

        delivered
    }

    /// Drops every handler and makes all further emission inert.
    ///
    /// Closing twice is harmless.
    pub fn close(&self) {
        self.closed.set(true);
        // Take the list out first so handler drops can't observe a live borrow
        let handlers = std::mem::take(&mut *self.handlers.borrow_mut());
        drop(handlers);
    }

    /// Whether [`Channel::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn subscribe(&self, handler: Handler<E>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        if !self.closed.get() {
            self.handlers.borrow_mut().push((id, handler));
        }

        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut handlers = self.handlers.borrow_mut();
            handlers
                .iter()
                .position(|(candidate, _)| *candidate == id)
                .map(|position| handlers.remove(position))
        };
        removed.is_some()
    }

    fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.handlers
            .borrow()
            .iter()
            .any(|(candidate, _)| *candidate == id)
    }

    fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl<E> Default for Channel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Channel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.closed.get())
            .finish()
    }
}

/// Subscribe-only view of a [`Channel`].
pub struct Receiver<'a, E> {
    channel: &'a Channel<E>,
}

impl<'a, E> Receiver<'a, E> {
    /// Registers `handler` for every future event on the channel.
    ///
    /// Subscribing to a closed channel returns an id but the handler is
    /// dropped immediately and never called.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + 'static,
    {
        self.channel.subscribe(Rc::new(handler))
    }

    /// Removes a handler. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.channel.unsubscribe(id)
    }

    /// Whether the owning channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    /// Number of handlers currently registered.
    pub fn subscriber_count(&self) -> usize {
        self.channel.subscriber_count()
    }
}

impl<E> Clone for Receiver<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Receiver<'_, E> {}

impl<E> fmt::Debug for Receiver<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Receiver").field(self.channel).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(channel: &Channel<u32>) -> Rc<RefCell<Vec<u32>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        channel
            .receiver()
            .subscribe(move |value| sink.borrow_mut().push(*value));
        seen
    }

    #[test]
    fn test_emit_reaches_all_subscribers_in_order() {
        let channel = Channel::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            channel
                .receiver()
                .subscribe(move |_: &u32| order.borrow_mut().push(tag));
        }

        assert_eq!(channel.emit(&1), 3);
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let channel = Channel::<u32>::new();
        assert_eq!(channel.emit(&7), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let channel = Channel::new();
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let id = channel.receiver().subscribe(move |_: &u32| sink.set(sink.get() + 1));

        channel.emit(&1);
        assert!(channel.receiver().unsubscribe(id));
        channel.emit(&1);

        assert_eq!(seen.get(), 1);
        assert!(!channel.receiver().unsubscribe(id), "Second unsubscribe should report false");
    }

    #[test]
    fn test_close_drops_handlers_and_silences_emit() {
        let channel = Channel::new();
        let seen = recorder(&channel);

        channel.emit(&1);
        channel.close();
        assert_eq!(channel.emit(&2), 0);

        assert_eq!(*seen.borrow(), vec![1]);
        assert!(channel.is_closed());
        assert_eq!(channel.receiver().subscriber_count(), 0);
    }

    #[test]
    fn test_close_releases_captured_state() {
        let channel = Channel::new();
        let token = Rc::new(());
        let captured = Rc::clone(&token);
        channel.receiver().subscribe(move |_: &u32| {
            let _ = Rc::strong_count(&captured);
        });

        assert_eq!(Rc::strong_count(&token), 2);
        channel.close();
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn test_subscribe_after_close_is_inert() {
        let channel = Channel::new();
        channel.close();

        let seen = recorder(&channel);
        channel.emit(&3);

        assert!(seen.borrow().is_empty());
        assert_eq!(channel.receiver().subscriber_count(), 0);
    }

    #[test]
    fn test_close_twice() {
        let channel = Channel::<u32>::new();
        channel.close();
        channel.close();
        assert!(channel.receiver().is_closed());
    }

    #[test]
    fn test_handler_can_unsubscribe_itself_during_emit() {
        let channel = Rc::new(Channel::new());
        let calls = Rc::new(Cell::new(0));
        let own_id = Rc::new(Cell::new(None));

        let weak = Rc::downgrade(&channel);
        let counter = Rc::clone(&calls);
        let slot = Rc::clone(&own_id);
        let id = channel.receiver().subscribe(move |_: &u32| {
            counter.set(counter.get() + 1);
            if let (Some(channel), Some(id)) = (weak.upgrade(), slot.get()) {
                channel.receiver().unsubscribe(id);
            }
        });
        own_id.set(Some(id));

        channel.emit(&1);
        channel.emit(&2);

        assert_eq!(calls.get(), 1);
        assert_eq!(channel.receiver().subscriber_count(), 0);
    }

    #[test]
    fn test_handler_subscribed_during_emit_waits_for_next_event() {
        let channel = Rc::new(Channel::new());
        let late = Rc::new(RefCell::new(Vec::new()));

        let weak = Rc::downgrade(&channel);
        let sink = Rc::clone(&late);
        channel.receiver().subscribe(move |value: &u32| {
            if *value == 1 {
                if let Some(channel) = weak.upgrade() {
                    let sink = Rc::clone(&sink);
                    channel
                        .receiver()
                        .subscribe(move |value: &u32| sink.borrow_mut().push(*value));
                }
            }
        });

        channel.emit(&1);
        channel.emit(&2);

        assert_eq!(*late.borrow(), vec![2]);
    }

    #[test]
    fn test_handler_unsubscribed_by_earlier_handler_is_skipped() {
        let channel = Rc::new(Channel::new());
        let victim = Rc::new(Cell::new(None));

        let weak = Rc::downgrade(&channel);
        let target = Rc::clone(&victim);
        channel.receiver().subscribe(move |_: &u32| {
            if let (Some(channel), Some(id)) = (weak.upgrade(), target.get()) {
                channel.receiver().unsubscribe(id);
            }
        });
        let seen = recorder(&channel);
        let id = channel.receiver().subscribe(|_: &u32| {});
        victim.set(Some(id));

        // The recorder sits between the two and still hears the event
        assert_eq!(channel.emit(&1), 2);
        assert_eq!(*seen.borrow(), vec![1]);
        assert_eq!(channel.receiver().subscriber_count(), 2);
    }

    #[test]
    fn test_close_during_emit_stops_delivery() {
        let channel = Rc::new(Channel::new());

        let weak = Rc::downgrade(&channel);
        channel.receiver().subscribe(move |_: &u32| {
            if let Some(channel) = weak.upgrade() {
                channel.close();
            }
        });
        let seen = recorder(&channel);

        assert_eq!(channel.emit(&1), 1);
        assert!(seen.borrow().is_empty());
        assert!(channel.is_closed());
    }

    #[test]
    fn test_final_event_emitted_before_close_is_last() {
        let channel = Rc::new(Channel::new());

        // First handler publishes a final event and closes, like a teardown would
        let weak = Rc::downgrade(&channel);
        channel.receiver().subscribe(move |value: &u32| {
            if *value == 1 {
                if let Some(channel) = weak.upgrade() {
                    channel.emit(&99);
                    channel.close();
                }
            }
        });
        let seen = recorder(&channel);

        channel.emit(&1);
        assert_eq!(*seen.borrow(), vec![99]);
    }

    #[test]
    fn test_channels_are_independent() {
        let a = Channel::new();
        let b = Channel::new();
        let seen_a = recorder(&a);
        let seen_b = recorder(&b);

        a.emit(&1);
        b.close();
        a.emit(&2);

        assert_eq!(*seen_a.borrow(), vec![1, 2]);
        assert!(seen_b.borrow().is_empty());
        assert!(!a.is_closed());
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let channel = Channel::<u32>::new();
        let first = channel.receiver().subscribe(|_| {});
        let second = channel.receiver().subscribe(|_| {});
        assert_ne!(first, second);
    }
}
