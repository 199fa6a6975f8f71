//! Event-addressed remote channel and owned subscriptions.
//!
//! # Delivery model
//!
//! The channel runs on a single logical thread. Inbound signals are handed to
//! [`LocalChannel::deliver`] by whatever transport feeds it (the viewer's
//! websocket bridge, or a test). Delivery is synchronous and in order; the
//! channel holds no borrow while a listener runs, so a listener may release
//! its own subscription or register new ones.
//!
//! Outbound signals from [`RemoteChannel::emit`] go to an optional sink that
//! the transport drains.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::signal::RemoteSignal;

/// Callback invoked for each delivery of a subscribed event.
pub type Listener = Box<dyn FnMut(&RemoteSignal)>;

/// A persistent, bidirectional, event-addressed connection to a remote controller.
pub trait RemoteChannel {
    /// Register a listener for one event name. The listener stays registered
    /// until the returned [`Subscription`] is released or dropped.
    fn subscribe(&self, event: &str, listener: Listener) -> Subscription;

    /// Send a signal to the remote side.
    fn emit(&self, signal: RemoteSignal);
}

/// Owned handle to a registered listener.
///
/// Releasing is idempotent and also happens on drop.
pub struct Subscription {
    event: String,
    id: u64,
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(event: impl Into<String>, id: u64, release: impl FnOnce() + 'static) -> Self {
        Self {
            event: event.into(),
            id,
            release: Some(Box::new(release)),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Unregister the listener. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            trace!(event = %self.event, id = self.id, "Releasing subscription");
            release();
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
            .field("event", &self.event)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

struct Entry {
    id: u64,
    event: String,
    listener: Rc<RefCell<Listener>>,
}

#[derive(Default)]
struct ChannelInner {
    entries: RefCell<Vec<Entry>>,
    next_id: Cell<u64>,
    outbound: RefCell<Option<mpsc::UnboundedSender<RemoteSignal>>>,
}

impl ChannelInner {
    fn remove(&self, id: u64) {
        self.entries.borrow_mut().retain(|e| e.id != id);
    }

    fn contains(&self, id: u64) -> bool {
        self.entries.borrow().iter().any(|e| e.id == id)
    }
}

/// Single-threaded channel endpoint.
///
/// Cloning yields another handle to the same listener table.
#[derive(Clone, Default)]
pub struct LocalChannel {
    inner: Rc<ChannelInner>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose emitted signals are forwarded to `sink`.
    pub fn with_outbound(sink: mpsc::UnboundedSender<RemoteSignal>) -> Self {
        let channel = Self::new();
        channel.set_outbound(sink);
        channel
    }

    pub fn set_outbound(&self, sink: mpsc::UnboundedSender<RemoteSignal>) {
        *self.inner.outbound.borrow_mut() = Some(sink);
    }

    /// Deliver an inbound signal to every listener registered for its name.
    ///
    /// Returns the number of listeners invoked. A listener released by an
    /// earlier listener in the same delivery is skipped.
    pub fn deliver(&self, signal: &RemoteSignal) -> usize {
        let targets: Vec<(u64, Rc<RefCell<Listener>>)> = self
            .inner
            .entries
            .borrow()
            .iter()
            .filter(|e| e.event == signal.event)
            .map(|e| (e.id, Rc::clone(&e.listener)))
            .collect();

        if targets.is_empty() {
            debug!(event = %signal.event, "No listener for signal");
            return 0;
        }

        let mut invoked = 0;
        for (id, listener) in targets {
            if !self.inner.contains(id) {
                continue;
            }
            match listener.try_borrow_mut() {
                Ok(mut callback) => {
                    let callback = &mut *callback;
                    callback(signal);
                    invoked += 1;
                }
                Err(_) => {
                    warn!(event = %signal.event, id, "Listener re-entered during its own delivery; skipped");
                }
            }
        }
        invoked
    }

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .entries
            .borrow()
            .iter()
            .filter(|e| e.event == event)
            .count()
    }
}

impl RemoteChannel for LocalChannel {
    fn subscribe(&self, event: &str, listener: Listener) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.entries.borrow_mut().push(Entry {
            id,
            event: event.to_string(),
            listener: Rc::new(RefCell::new(listener)),
        });
        trace!(event, id, "Registered listener");

        let weak: Weak<ChannelInner> = Rc::downgrade(&self.inner);
        Subscription::new(event, id, move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove(id);
            }
        })
    }

    fn emit(&self, signal: RemoteSignal) {
        match self.inner.outbound.borrow().as_ref() {
            Some(sink) => {
                if sink.send(signal).is_err() {
                    warn!("Outbound sink closed; signal dropped");
                }
            }
            None => debug!(event = %signal.event, "No outbound sink; signal dropped"),
        }
    }
}

impl fmt::Debug for LocalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalChannel")
            .field("listeners", &self.inner.entries.borrow().len())
            .field("outbound", &self.inner.outbound.borrow().is_some())
            .finish()
    }
}
