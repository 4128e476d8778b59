//! Record: a dynamic, named-field object implementing [`ChangeSource`].
//!
//! # Design
//!
//! Fields live in a `RefCell<BTreeMap>`; handlers live in a separate
//! reference-counted list so that a [`Subscription`] can unregister itself
//! through a `Weak` without keeping the record alive. A write that changes a
//! field (by `PartialEq`) notifies every handler registered at the start of
//! the notification, in registration order, skipping any that were removed
//! by an earlier handler in the same cycle.
//!
//! # Failure Modes
//!
//! - **Re-entrant writes** from a handler are allowed: no borrow is held while
//!   handlers run.
//! - **Equal writes** are no-ops and notify nobody.

use crate::engine::value::{ChangeHandler, ChangeSource, Object, Observed, Subscription, Value};

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Default)]
struct HandlerList {
    next_id: u64,
    entries: Vec<(u64, ChangeHandler)>,
}

impl HandlerList {
    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(i, _)| *i == id)
    }
}

pub struct Record {
    type_name: String,
    fields: RefCell<BTreeMap<String, Value>>,
    handlers: Rc<RefCell<HandlerList>>,
}

impl Record {
    #[must_use]
    pub fn new(type_name: &str) -> Rc<Self> {
        Rc::new(Self {
            type_name: type_name.to_string(),
            fields: RefCell::new(BTreeMap::new()),
            handlers: Rc::new(RefCell::new(HandlerList::default())),
        })
    }

    /// Create a record with initial fields. No notifications are sent.
    #[must_use]
    pub fn with_fields<I, K, V>(type_name: &str, fields: I) -> Rc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let rec = Self::new(type_name);
        rec.fields
            .borrow_mut()
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        rec
    }

    /// Current value of `name`; missing fields read as `Null`.
    pub fn get(&self, name: &str) -> Value {
        self.fields.borrow().get(name).cloned().unwrap_or_default()
    }

    /// Write `name`, notifying handlers if the value changed.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        {
            let mut fields = self.fields.borrow_mut();
            if fields.get(name).unwrap_or(&Value::Null) == &value {
                return;
            }
            fields.insert(name.to_string(), value);
        }
        self.notify(name);
    }

    /// Number of live handler registrations.
    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().entries.len()
    }

    fn notify(&self, name: &str) {
        // Snapshot first so handlers can (un)subscribe while we iterate.
        let snapshot: Vec<(u64, ChangeHandler)> = self.handlers.borrow().entries.clone();
        for (id, handler) in snapshot {
            if !self.handlers.borrow().contains(id) {
                continue;
            }
            handler(name);
        }
    }

    /// This record as a generic object handle.
    pub fn object(self: &Rc<Self>) -> Object {
        self.clone()
    }
}

impl ChangeSource for Record {
    fn subscribe_changes(&self, handler: ChangeHandler) -> Subscription {
        let id = {
            let mut list = self.handlers.borrow_mut();
            let id = list.next_id;
            list.next_id += 1;
            list.entries.push((id, handler));
            id
        };
        let weak: Weak<RefCell<HandlerList>> = Rc::downgrade(&self.handlers);
        Subscription::new(move || {
            if let Some(list) = weak.upgrade() {
                list.borrow_mut().entries.retain(|(i, _)| *i != id);
            }
        })
    }
}

impl Observed for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.borrow())
            .field("handler_count", &self.handler_count())
            .finish()
    }
}

impl From<Rc<Record>> for Value {
    fn from(v: Rc<Record>) -> Self {
        Value::Object(v)
    }
}
