//! Broadcast of dispatched actions and the filtered streams built on it.

use crate::event::{Action, Event};
use crate::signal::{Listeners, Subscription};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Sink that every successfully reduced action is published to, in dispatch
/// order.
#[derive(Clone)]
pub(crate) struct EventChannel {
    listeners: Rc<Listeners<Action>>,
    closed: Rc<Cell<bool>>,
}

impl EventChannel {
    pub(crate) fn new() -> Self {
        EventChannel {
            listeners: Listeners::new(),
            closed: Rc::new(Cell::new(false)),
        }
    }

    pub(crate) fn publish(&self, action: &Action) {
        if !self.closed.get() {
            self.listeners.notify(action);
        }
    }

    pub(crate) fn subscribe(&self, listener: impl Fn(&Action) + 'static) -> Subscription {
        if self.closed.get() {
            return Subscription::new(|| {});
        }
        self.listeners.add(Rc::new(listener))
    }

    /// Drop every listener and refuse new ones.
    pub(crate) fn close(&self) {
        self.closed.set(true);
        self.listeners.clear();
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

type EventFilter = Rc<dyn Fn(&Event) -> bool>;

/// A lazy, unbounded sequence of the dispatched events of one type.
///
/// Nothing is observed until [`subscribe`](EventStream::subscribe) or
/// [`receiver`](EventStream::receiver) is called. Each call starts an
/// independent subscription that sees events dispatched after it, in
/// dispatch order.
#[derive(Clone)]
pub struct EventStream {
    channel: EventChannel,
    event_type: String,
    filters: Vec<EventFilter>,
}

impl EventStream {
    pub(crate) fn new(channel: EventChannel, event_type: &str) -> Self {
        EventStream {
            channel,
            event_type: event_type.to_string(),
            filters: Vec::new(),
        }
    }

    /// The event type this stream selects.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Narrow the stream to events matching `predicate`.
    pub fn filter(mut self, predicate: impl Fn(&Event) -> bool + 'static) -> Self {
        self.filters.push(Rc::new(predicate));
        self
    }

    /// Invoke `callback` for each matching event until the subscription is
    /// dropped.
    ///
    /// The callback runs after the event's state transition is published, so
    /// it observes the new state and may dispatch follow-up events.
    pub fn subscribe(&self, callback: impl Fn(&Event) + 'static) -> Subscription {
        let event_type = self.event_type.clone();
        let filters = self.filters.clone();
        self.channel.subscribe(move |action| {
            let Some(event) = action.as_event() else {
                return;
            };
            if event.event_type == event_type && filters.iter().all(|keep| keep(event)) {
                callback(event);
            }
        })
    }

    /// Buffer matching events for pull-style consumption.
    pub fn receiver(&self) -> EventReceiver {
        let queue: Rc<RefCell<VecDeque<Event>>> = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&queue);
        let subscription = self.subscribe(move |event| sink.borrow_mut().push_back(event.clone()));
        EventReceiver {
            queue,
            _subscription: subscription,
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("event_type", &self.event_type)
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// Pull buffer over an [`EventStream`].
///
/// Iterating yields the events buffered so far and stops when the buffer is
/// empty; events dispatched later show up on the next iteration.
#[derive(Debug)]
pub struct EventReceiver {
    queue: Rc<RefCell<VecDeque<Event>>>,
    _subscription: Subscription,
}

impl EventReceiver {
    /// Pop the oldest buffered event.
    pub fn try_recv(&self) -> Option<Event> {
        self.queue.borrow_mut().pop_front()
    }

    /// Take every buffered event, oldest first.
    pub fn drain(&self) -> Vec<Event> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Whether no event is buffered.
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl Iterator for EventReceiver {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        self.try_recv()
    }
}
