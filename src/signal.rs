//! Reactive cells the engine is built on.
//!
//! Values live in `futures-signals` [`Mutable`]s. A [`Signal`] wraps one and
//! adds synchronous change callbacks, a [`Computed`] caches a value derived
//! from a `Mutable`'s change stream, and a [`Subscription`] releases a
//! callback when dropped. Change streams are polled in place with a no-op
//! waker, so nothing here needs an executor.

use futures_signals::signal::{Mutable, Signal as ChangeSource, SignalExt};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

/// Handle to a registered listener.
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) removes the
/// listener. Keep it alive for as long as the listener should fire.
#[must_use = "dropping a Subscription immediately removes its listener"]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(teardown: impl FnOnce() + 'static) -> Self {
        Subscription {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}

type Listener<T> = Rc<dyn Fn(&T)>;

/// Ordered listener registry shared by signal watchers and the event channel.
pub(crate) struct Listeners<T: ?Sized> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, Listener<T>)>>,
}

impl<T: ?Sized + 'static> Listeners<T> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Listeners {
            next_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
        })
    }

    pub(crate) fn add(self: &Rc<Self>, listener: Listener<T>) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, listener));

        let registry: Weak<Self> = Rc::downgrade(self);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.entries.borrow_mut().retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Call every listener registered at the time of the call, in order.
    ///
    /// The registry is not borrowed while listeners run, so a listener may
    /// subscribe, unsubscribe, or trigger another notification.
    pub(crate) fn notify(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(value);
        }
    }

    pub(crate) fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

type Changes<T> = Pin<Box<dyn ChangeSource<Item = T>>>;

/// Drain a change stream and return the newest value it reported, if any.
///
/// A stream reports its current value on the first poll and afterwards only
/// when its source was written, so `None` means "unchanged since last time".
fn poll_latest<T>(changes: &mut Changes<T>) -> Option<T> {
    let mut cx = Context::from_waker(Waker::noop());
    let mut latest = None;
    while let Poll::Ready(Some(value)) = changes.as_mut().poll_change(&mut cx) {
        latest = Some(value);
    }
    latest
}

/// A mutable reactive cell.
///
/// # Examples
///
/// ```
/// use sigfold::Signal;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = Signal::new(1);
/// let doubled = count.derive(|n| n * 2);
///
/// let seen = Rc::new(Cell::new(0));
/// let sink = Rc::clone(&seen);
/// let _sub = count.on_change(move |n| sink.set(*n));
///
/// count.write(5);
/// assert_eq!(doubled.read(), 10);
/// assert_eq!(seen.get(), 5);
/// ```
pub struct Signal<T> {
    value: Mutable<T>,
    watchers: Rc<Listeners<()>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Signal {
            value: self.value.clone(),
            watchers: Rc::clone(&self.watchers),
        }
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Create a cell holding `value`.
    pub fn new(value: T) -> Self {
        Signal {
            value: Mutable::new(value),
            watchers: Listeners::new(),
        }
    }

    /// Return a copy of the current value.
    pub fn read(&self) -> T {
        self.value.get_cloned()
    }

    /// Borrow the current value without cloning it.
    ///
    /// `f` must not write to this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.lock_ref())
    }

    /// Replace the value and notify listeners.
    pub fn write(&self, value: T) {
        self.value.set(value);
        self.watchers.notify(&());
    }

    /// Replace the value without running change callbacks.
    ///
    /// Derived cells still see the new value on their next read, and the
    /// next [`write`](Signal::write) reports the latest value to callbacks.
    pub(crate) fn write_quietly(&self, value: T) {
        self.value.set(value);
    }

    /// Compute the next value from the current one and notify listeners.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = self.with(f);
        self.write(next);
    }

    /// Run `callback` after every write until the subscription is dropped.
    ///
    /// When writes nest (a callback writing the same signal), each callback
    /// sees the newest value once rather than every intermediate one.
    pub fn on_change(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let mut changes: Changes<T> = self.value.signal_cloned().boxed_local();
        // The first poll reports the value at subscription time.
        let _ = poll_latest(&mut changes);
        let changes = RefCell::new(changes);
        self.watchers.add(Rc::new(move |_: &()| {
            let latest = poll_latest(&mut changes.borrow_mut());
            if let Some(value) = latest {
                callback(&value);
            }
        }))
    }

    /// A cached read-only cell derived from this signal.
    ///
    /// `f` reruns on the first read after a write, not on every read.
    pub fn derive<U: Clone + 'static>(&self, f: impl Fn(&T) -> U + 'static) -> Computed<U> {
        let initial = self.with(&f);
        let source = self.value.clone();
        let f = Rc::new(f);
        Computed::from_changes(initial, move || {
            let f = Rc::clone(&f);
            source.signal_ref(move |value| f(value)).boxed_local()
        })
    }

    /// This signal as a read-only cell.
    pub fn as_computed(&self) -> Computed<T> {
        self.derive(T::clone)
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.watchers.len()
    }

    pub(crate) fn clear_listeners(&self) {
        self.watchers.clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signal").field(&*self.value.lock_ref()).finish()
    }
}

struct Cached<T> {
    changes: RefCell<Changes<T>>,
    value: RefCell<T>,
}

/// A read-only reactive cell derived from a [`Signal`].
///
/// The derived value is cached and recomputed lazily: a read after the
/// source was written reruns the derivation once, other reads return the
/// cached value.
pub struct Computed<T> {
    source: Rc<dyn Fn() -> Changes<T>>,
    cached: Rc<Cached<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Computed {
            source: Rc::clone(&self.source),
            cached: Rc::clone(&self.cached),
        }
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Build a cell from its current value and a factory of change streams.
    ///
    /// Every stream from `source` must report `initial` on its first poll.
    fn from_changes(initial: T, source: impl Fn() -> Changes<T> + 'static) -> Self {
        let mut changes = source();
        let _ = poll_latest(&mut changes);
        Computed {
            source: Rc::new(source),
            cached: Rc::new(Cached {
                changes: RefCell::new(changes),
                value: RefCell::new(initial),
            }),
        }
    }

    /// The current derived value.
    pub fn read(&self) -> T {
        let latest = poll_latest(&mut self.cached.changes.borrow_mut());
        if let Some(value) = latest {
            *self.cached.value.borrow_mut() = value;
        }
        self.cached.value.borrow().clone()
    }

    /// A cell derived from this one, with its own cache.
    pub fn map<U: Clone + 'static>(&self, f: impl Fn(T) -> U + 'static) -> Computed<U> {
        let initial = f(self.read());
        let upstream = Rc::clone(&self.source);
        let f = Rc::new(f);
        Computed::from_changes(initial, move || {
            let f = Rc::clone(&f);
            upstream().map(move |value| f(value)).boxed_local()
        })
    }
}

impl<T> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Computed(..)")
    }
}
