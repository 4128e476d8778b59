//! Push-based value streams.
//!
//! A stream delivers [`Notification`]s to exactly one sink. Delivery is
//! synchronous and ordered; a notification raised while the sink is still
//! running (a sink whose side effects feed back into its own stream) is
//! queued and delivered right after the current call returns.

use crate::engine::error::ChainError;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification<T> {
    Next(T),
    /// Terminal: nothing follows a failure.
    Failed(ChainError),
}

pub type Sink<T> = Box<dyn FnMut(Notification<T>)>;

/// Handle that tears a live observation down.
pub trait Disposable {
    /// Unregister everything. Idempotent.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

pub(crate) struct Emitter<T> {
    sink: RefCell<Option<Sink<T>>>,
    pending: RefCell<VecDeque<Notification<T>>>,
    /// A terminal notification is queued; nothing new is accepted.
    finishing: Cell<bool>,
    closed: Cell<bool>,
}

impl<T> Emitter<T> {
    pub(crate) fn new(sink: Sink<T>) -> Self {
        Self {
            sink: RefCell::new(Some(sink)),
            pending: RefCell::new(VecDeque::new()),
            finishing: Cell::new(false),
            closed: Cell::new(false),
        }
    }

    pub(crate) fn emit(&self, notification: Notification<T>) {
        if self.finishing.get() || self.closed.get() {
            return;
        }
        self.enqueue(notification);
    }

    /// Queue a last notification behind whatever is pending, deliver all of
    /// it, then drop the sink.
    pub(crate) fn finish(&self, terminal: Notification<T>) {
        if self.finishing.get() || self.closed.get() {
            return;
        }
        self.finishing.set(true);
        self.enqueue(terminal);
    }

    /// Stop delivering and discard the queue. The sink is dropped now, or as
    /// soon as the current delivery returns.
    pub(crate) fn close(&self) {
        self.closed.set(true);
        if let Ok(mut sink) = self.sink.try_borrow_mut() {
            sink.take();
        }
        if let Ok(mut pending) = self.pending.try_borrow_mut() {
            pending.clear();
        }
    }

    fn enqueue(&self, notification: Notification<T>) {
        self.pending.borrow_mut().push_back(notification);

        // Already delivering further up the stack: that call drains the queue.
        let Ok(mut sink) = self.sink.try_borrow_mut() else {
            return;
        };
        loop {
            if self.closed.get() {
                self.pending.borrow_mut().clear();
                break;
            }
            let next = self.pending.borrow_mut().pop_front();
            match (next, sink.as_mut()) {
                (Some(n), Some(deliver)) => deliver(n),
                _ => break,
            }
        }
        if self.finishing.get() || self.closed.get() {
            sink.take();
        }
    }
}
