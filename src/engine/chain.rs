//! Chain subscription: a live, self-resubscribing observer of one path.
//!
//! # State
//!
//! One slot per link. Slot `i` holds the object link `i` is read from, the
//! handler registered on it, and an epoch number identifying that attachment.
//!
//! ```text
//! root --child--> Child --value--> i32
//! slot 0: root  (watching "child")
//! slot 1: Child (watching "value") -> emits
//! ```
//!
//! # Algorithm
//!
//! - `attach(i, v)`: tear down slots `i..`; if `v` is null stop (sticky
//!   break); otherwise register a handler filtered to link `i`'s member and
//!   read link `i` immediately (replay), propagating the result to `i + 1`
//!   or emitting it at the leaf.
//! - A matching notification on slot `i` re-reads link `i` and propagates,
//!   which replaces everything below `i` (switch-to-latest).
//!
//! # Invariants
//!
//! 1. At most one registration per slot.
//! 2. Slot `i` is attached to the object most recently produced by slot
//!    `i - 1` (or the root).
//! 3. A handler whose attachment has been replaced never propagates, even if
//!    the source had already snapshotted it for the current notification.
//! 4. No `RefCell` borrow is held while getters or the sink run.
//!
//! # Failure Modes
//!
//! A getter error, or a non-object value feeding an intermediate link, is
//! delivered once as [`Notification::Failed`] and tears the chain down. A null
//! link is never a failure.

use crate::engine::accessor::{Accessor, AccessorRegistry};
use crate::engine::error::{AccessError, ChainError};
use crate::engine::stream::{Disposable, Emitter, Notification};
use crate::engine::value::{Object, Subscription, Value};
use crate::spec::PathSpec;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// A cold stream: nothing is registered until [`PathStream::subscribe`].
pub struct PathStream {
    root: Value,
    path: Arc<PathSpec>,
    accessors: Result<Vec<Rc<Accessor>>, AccessError>,
}

/// Observe `path` from `root` using the thread's shared accessor registry.
pub fn observe(root: impl Into<Value>, path: Arc<PathSpec>) -> PathStream {
    observe_with(&AccessorRegistry::shared(), root, path)
}

/// Observe `path` from `root`, resolving accessors from `registry`.
pub fn observe_with(
    registry: &AccessorRegistry,
    root: impl Into<Value>,
    path: Arc<PathSpec>,
) -> PathStream {
    let accessors = registry.resolve_path(&path);
    PathStream {
        root: root.into(),
        path,
        accessors,
    }
}

impl PathStream {
    pub fn path(&self) -> &Arc<PathSpec> {
        &self.path
    }

    /// Start observing. The current value (if the chain is complete) is
    /// delivered before this returns.
    pub fn subscribe(
        self,
        sink: impl FnMut(Notification<Value>) + 'static,
    ) -> ChainSubscription {
        let emitter = Emitter::new(Box::new(sink));
        let accessors = match self.accessors {
            Ok(a) => a,
            Err(err) => {
                tracing::warn!(path = %self.path.text, error = %err, "chain cannot resolve accessors");
                emitter.finish(Notification::Failed(err.into()));
                return ChainSubscription { state: None };
            }
        };

        let depth = accessors.len();
        let state = Rc::new(ChainState {
            path: self.path,
            accessors,
            slots: RefCell::new((0..depth).map(|_| None).collect()),
            next_epoch: Cell::new(0),
            disposed: Cell::new(false),
            emitter,
        });

        if let Err(err) = state.attach(0, self.root) {
            state.fail(err);
        }

        ChainSubscription { state: Some(state) }
    }
}

impl fmt::Debug for PathStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathStream")
            .field("path", &self.path.text)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

struct Slot {
    object: Object,
    epoch: u64,
    _registration: Subscription,
}

struct ChainState {
    path: Arc<PathSpec>,
    accessors: Vec<Rc<Accessor>>,
    slots: RefCell<Vec<Option<Slot>>>,
    next_epoch: Cell<u64>,
    disposed: Cell<bool>,
    emitter: Emitter<Value>,
}

impl ChainState {
    fn attach(self: &Rc<Self>, depth: usize, value: Value) -> Result<(), ChainError> {
        self.detach_from(depth);
        if self.disposed.get() {
            return Ok(());
        }

        let object = match value {
            Value::Null => {
                tracing::debug!(path = %self.path.text, depth, "link is null; chain quiescent");
                return Ok(());
            }
            Value::Object(o) => o,
            other => {
                let member = self.path.links[depth].name.clone();
                return Err(ChainError::NotAnObject {
                    path: self.path.text.clone(),
                    member,
                    found: other.kind(),
                });
            }
        };

        let epoch = self.next_epoch.get();
        self.next_epoch.set(epoch + 1);

        let member = self.path.links[depth].name.clone();
        let weak = Rc::downgrade(self);
        let registration = object.subscribe_changes(Rc::new(move |changed: &str| {
            if changed != member {
                return;
            }
            if let Some(state) = weak.upgrade() {
                state.on_change(depth, epoch);
            }
        }));

        tracing::trace!(path = %self.path.text, depth, epoch, "attached");
        self.slots.borrow_mut()[depth] = Some(Slot {
            object: Rc::clone(&object),
            epoch,
            _registration: registration,
        });

        self.propagate(depth, &object)
    }

    /// Read link `depth` on `object` and push the result one level down.
    fn propagate(self: &Rc<Self>, depth: usize, object: &Object) -> Result<(), ChainError> {
        let value = self.accessors[depth].get(&**object)?;
        if self.disposed.get() {
            return Ok(());
        }
        if depth + 1 == self.accessors.len() {
            self.emitter.emit(Notification::Next(value));
            Ok(())
        } else {
            self.attach(depth + 1, value)
        }
    }

    fn on_change(self: &Rc<Self>, depth: usize, epoch: u64) {
        if self.disposed.get() {
            return;
        }
        let object = {
            let slots = self.slots.borrow();
            match &slots[depth] {
                Some(slot) if slot.epoch == epoch => Rc::clone(&slot.object),
                _ => return,
            }
        };
        tracing::debug!(path = %self.path.text, depth, "link changed");
        if let Err(err) = self.propagate(depth, &object) {
            self.fail(err);
        }
    }

    /// Release slots `depth..` deepest first.
    fn detach_from(&self, depth: usize) {
        let released: Vec<Slot> = {
            let mut slots = self.slots.borrow_mut();
            let len = slots.len();
            (depth..len).rev().filter_map(|i| slots[i].take()).collect()
        };
        if !released.is_empty() {
            tracing::trace!(path = %self.path.text, from = depth, count = released.len(), "detached");
        }
        // Registrations are dropped here, outside the borrow.
        drop(released);
    }

    fn fail(&self, err: ChainError) {
        if self.disposed.get() {
            return;
        }
        tracing::warn!(path = %self.path.text, error = %err, "chain failed");
        self.teardown();
        self.emitter.finish(Notification::Failed(err));
    }

    fn teardown(&self) {
        self.disposed.set(true);
        self.detach_from(0);
    }

    fn attached_depth(&self) -> usize {
        self.slots.borrow().iter().take_while(|s| s.is_some()).count()
    }
}

/// Live observation of one path. Dropping it disposes it.
#[must_use = "dropping a ChainSubscription stops the observation"]
pub struct ChainSubscription {
    state: Option<Rc<ChainState>>,
}

impl ChainSubscription {
    /// Number of levels currently holding a handler registration.
    pub fn attached_depth(&self) -> usize {
        self.state.as_ref().map(|s| s.attached_depth()).unwrap_or(0)
    }

    pub fn path(&self) -> Option<&Arc<PathSpec>> {
        self.state.as_ref().map(|s| &s.path)
    }
}

impl Disposable for ChainSubscription {
    fn dispose(&mut self) {
        if let Some(state) = self.state.take() {
            state.teardown();
            state.emitter.close();
        }
    }

    fn is_disposed(&self) -> bool {
        self.state
            .as_ref()
            .map(|s| s.disposed.get())
            .unwrap_or(true)
    }
}

impl Drop for ChainSubscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ChainSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainSubscription")
            .field("path", &self.path().map(|p| p.text.as_str()))
            .field("attached_depth", &self.attached_depth())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::accessor::MemberKey;
    use crate::engine::record::Record;
    use crate::spec::path::fixtures::path;

    fn collect() -> (
        Rc<RefCell<Vec<Notification<Value>>>>,
        impl FnMut(Notification<Value>) + 'static,
    ) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = Rc::clone(&log);
        (log, move |n| log_clone.borrow_mut().push(n))
    }

    fn host_child_value() -> Arc<PathSpec> {
        Arc::new(path(
            "|x| x.child.value",
            &[("child", "Host", "Child"), ("value", "Child", "i32")],
        ))
    }

    #[test]
    fn replays_current_value_on_subscribe() {
        let host = Record::with_fields("Host", [("value", 1)]);
        let p = Arc::new(path("|x| x.value", &[("value", "Host", "i32")]));
        let (log, sink) = collect();
        let sub = observe_with(&AccessorRegistry::new(), host.clone(), p).subscribe(sink);

        host.set("value", 2);
        assert_eq!(
            *log.borrow(),
            vec![
                Notification::Next(Value::Int(1)),
                Notification::Next(Value::Int(2))
            ]
        );
        assert_eq!(sub.attached_depth(), 1);
    }

    #[test]
    fn ignores_other_members() {
        let host = Record::with_fields("Host", [("value", 1)]);
        let p = Arc::new(path("|x| x.value", &[("value", "Host", "i32")]));
        let (log, sink) = collect();
        let _sub = observe_with(&AccessorRegistry::new(), host.clone(), p).subscribe(sink);

        host.set("other", 5);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn null_root_emits_nothing() {
        let (log, sink) = collect();
        let sub = observe_with(&AccessorRegistry::new(), Value::Null, host_child_value())
            .subscribe(sink);
        assert!(log.borrow().is_empty());
        assert_eq!(sub.attached_depth(), 0);
        assert!(!sub.is_disposed());
    }

    #[test]
    fn dispose_unregisters_every_level_once() {
        let child = Record::with_fields("Child", [("value", 1)]);
        let host = Record::with_fields("Host", [("child", child.clone())]);
        let (_log, sink) = collect();
        let mut sub =
            observe_with(&AccessorRegistry::new(), host.clone(), host_child_value()).subscribe(sink);
        assert_eq!(host.handler_count(), 1);
        assert_eq!(child.handler_count(), 1);
        assert_eq!(sub.attached_depth(), 2);

        sub.dispose();
        sub.dispose();
        assert!(sub.is_disposed());
        assert_eq!(host.handler_count(), 0);
        assert_eq!(child.handler_count(), 0);
    }

    #[test]
    fn getter_failure_is_terminal() {
        let reg = AccessorRegistry::new();
        let key = MemberKey::new("Host", "value");
        let fail_key = key.clone();
        reg.register(Accessor::new(
            key,
            Rc::new(move |_obj: &dyn crate::engine::value::Observed| {
                Err::<Value, _>(AccessError::failed(&fail_key, "boom"))
            }),
            None,
        ));
        let host = Record::new("Host");
        let p = Arc::new(path("|x| x.value", &[("value", "Host", "i32")]));
        let (log, sink) = collect();
        let sub = observe_with(&reg, host.clone(), p).subscribe(sink);

        assert_eq!(log.borrow().len(), 1);
        assert!(matches!(log.borrow()[0], Notification::Failed(_)));
        assert!(sub.is_disposed());
        assert_eq!(host.handler_count(), 0);
    }

    #[test]
    fn non_object_intermediate_is_terminal() {
        let host = Record::with_fields("Host", [("child", 7)]);
        let (log, sink) = collect();
        let sub =
            observe_with(&AccessorRegistry::new(), host.clone(), host_child_value()).subscribe(sink);
        assert!(matches!(
            log.borrow()[0],
            Notification::Failed(ChainError::NotAnObject { .. })
        ));
        assert!(sub.is_disposed());
        assert_eq!(host.handler_count(), 0);
    }

    #[test]
    fn missing_accessor_fails_on_subscribe() {
        let host = Record::new("Host");
        let (log, sink) = collect();
        let sub = observe_with(&AccessorRegistry::empty(), host.clone(), host_child_value())
            .subscribe(sink);
        assert!(matches!(
            log.borrow()[0],
            Notification::Failed(ChainError::Access(AccessError::NoAccessor(_)))
        ));
        assert!(sub.is_disposed());
    }
}
