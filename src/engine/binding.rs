//! One-way and two-way property synchronization on top of chains.
//!
//! A binding pushes every value its source emits into the member at the end
//! of a target path. Targets are validated when the binding is built: a path
//! that does not end in a settable member is refused up front.
//!
//! Two-way bindings subscribe host->target first, so the host's current value
//! wins, then target->host ignoring whatever the target replays while it is
//! being subscribed. While one direction is writing, emissions on the other
//! direction are ignored, which keeps a write from echoing back.

use crate::engine::accessor::{Accessor, AccessorRegistry};
use crate::engine::chain::{PathStream, observe_with};
use crate::engine::combine::CombinedStream;
use crate::engine::error::{BindingError, ChainError};
use crate::engine::stream::{Disposable, Notification, Sink};
use crate::engine::value::Value;
use crate::spec::PathSpec;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

pub type Converter = Rc<dyn Fn(Value) -> Value>;

/// Anything a binding can read from.
pub trait ValueSource {
    /// The path being read, when there is a single one.
    fn source_path(&self) -> Option<&PathSpec>;

    fn subscribe_values(self, sink: Sink<Value>) -> Box<dyn Disposable>;
}

impl ValueSource for PathStream {
    fn source_path(&self) -> Option<&PathSpec> {
        Some(self.path())
    }

    fn subscribe_values(self, sink: Sink<Value>) -> Box<dyn Disposable> {
        Box::new(self.subscribe(sink))
    }
}

impl ValueSource for CombinedStream<Value> {
    fn source_path(&self) -> Option<&PathSpec> {
        None
    }

    fn subscribe_values(self, sink: Sink<Value>) -> Box<dyn Disposable> {
        Box::new(self.subscribe(sink))
    }
}

fn not_settable(path: &PathSpec) -> BindingError {
    BindingError::NotSettable {
        path: path.text.clone(),
        member: path.leaf().name.clone(),
    }
}

/// Writes the leaf member of a path, walking it from the root on each write.
pub struct PathWriter {
    root: Value,
    path: Arc<PathSpec>,
    accessors: Vec<Rc<Accessor>>,
}

impl PathWriter {
    pub fn new(
        registry: &AccessorRegistry,
        root: impl Into<Value>,
        path: Arc<PathSpec>,
    ) -> Result<Self, BindingError> {
        if !path.is_settable() {
            return Err(not_settable(&path));
        }
        let accessors = registry.resolve_path(&path)?;
        if !accessors.last().is_some_and(|a| a.can_set()) {
            return Err(not_settable(&path));
        }
        Ok(Self {
            root: root.into(),
            path,
            accessors,
        })
    }

    pub fn path(&self) -> &Arc<PathSpec> {
        &self.path
    }

    /// Write `value` to the leaf. Returns `Ok(false)` when a link on the way
    /// is null and nothing was written.
    pub fn write(&self, value: Value) -> Result<bool, ChainError> {
        let (leaf, prefix) = match self.accessors.split_last() {
            Some(split) => split,
            None => return Ok(false),
        };
        let mut current = self.root.clone();
        for (i, accessor) in prefix.iter().enumerate() {
            let object = match &current {
                Value::Null => return Ok(false),
                Value::Object(o) => Rc::clone(o),
                other => {
                    return Err(ChainError::NotAnObject {
                        path: self.path.text.clone(),
                        member: self.path.links[i].name.clone(),
                        found: other.kind(),
                    });
                }
            };
            current = accessor.get(&*object)?;
        }
        let owner = match current {
            Value::Null => return Ok(false),
            Value::Object(o) => o,
            other => {
                return Err(ChainError::NotAnObject {
                    path: self.path.text.clone(),
                    member: self.path.leaf().name.clone(),
                    found: other.kind(),
                });
            }
        };
        leaf.set(&*owner, value)?;
        Ok(true)
    }
}

impl fmt::Debug for PathWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathWriter")
            .field("path", &self.path.text)
            .finish_non_exhaustive()
    }
}

fn start<S: ValueSource>(
    source: S,
    writer: PathWriter,
    mut skip: usize,
    convert: Option<Converter>,
    busy: Rc<Cell<bool>>,
) -> Box<dyn Disposable> {
    source.subscribe_values(Box::new(move |n: Notification<Value>| match n {
        Notification::Next(value) => {
            if skip > 0 {
                skip -= 1;
                return;
            }
            if busy.get() {
                return;
            }
            let value = match &convert {
                Some(convert) => convert(value),
                None => value,
            };
            busy.set(true);
            match writer.write(value) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(path = %writer.path.text, "target chain broken; write skipped");
                }
                Err(err) => {
                    tracing::warn!(path = %writer.path.text, error = %err, "binding write failed");
                }
            }
            busy.set(false);
        }
        Notification::Failed(err) => {
            tracing::warn!(path = %writer.path.text, error = %err, "binding source failed");
        }
    }))
}

/// Live one-way binding. Dropping it stops synchronization.
#[must_use = "dropping a binding stops synchronization"]
pub struct OneWayBinding {
    source: Box<dyn Disposable>,
}

impl Disposable for OneWayBinding {
    fn dispose(&mut self) {
        self.source.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.source.is_disposed()
    }
}

impl fmt::Debug for OneWayBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneWayBinding")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Bind `source` into `target_path` on `target` using the shared registry.
pub fn bind_one_way<S: ValueSource>(
    source: S,
    target: impl Into<Value>,
    target_path: Arc<PathSpec>,
) -> Result<OneWayBinding, BindingError> {
    OneWayBuilder::new(source, target, target_path).bind()
}

pub struct OneWayBuilder<S> {
    source: S,
    target: Value,
    target_path: Arc<PathSpec>,
    registry: Rc<AccessorRegistry>,
    skip: usize,
    convert: Option<Converter>,
}

impl<S: ValueSource> OneWayBuilder<S> {
    pub fn new(source: S, target: impl Into<Value>, target_path: Arc<PathSpec>) -> Self {
        Self {
            source,
            target: target.into(),
            target_path,
            registry: AccessorRegistry::shared(),
            skip: 0,
            convert: None,
        }
    }

    /// Registry used to resolve the target's accessors.
    pub fn registry(mut self, registry: Rc<AccessorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Ignore the first `n` source values.
    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    pub fn convert(mut self, convert: impl Fn(Value) -> Value + 'static) -> Self {
        self.convert = Some(Rc::new(convert));
        self
    }

    pub fn bind(self) -> Result<OneWayBinding, BindingError> {
        if let Some(path) = self.source.source_path()
            && !path.is_settable()
        {
            return Err(not_settable(path));
        }
        let writer = PathWriter::new(&self.registry, self.target, self.target_path)?;
        let source = start(
            self.source,
            writer,
            self.skip,
            self.convert,
            Rc::new(Cell::new(false)),
        );
        Ok(OneWayBinding { source })
    }
}

/// Live two-way binding.
#[must_use = "dropping a binding stops synchronization"]
pub struct TwoWayBinding {
    host_to_target: Box<dyn Disposable>,
    target_to_host: Box<dyn Disposable>,
}

impl Disposable for TwoWayBinding {
    fn dispose(&mut self) {
        self.target_to_host.dispose();
        self.host_to_target.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.host_to_target.is_disposed() && self.target_to_host.is_disposed()
    }
}

impl fmt::Debug for TwoWayBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwoWayBinding")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Keep `host_path` on `host` and `target_path` on `target` in sync, starting
/// from the host's value.
pub fn bind_two_way(
    host: impl Into<Value>,
    host_path: Arc<PathSpec>,
    target: impl Into<Value>,
    target_path: Arc<PathSpec>,
) -> Result<TwoWayBinding, BindingError> {
    TwoWayBuilder::new(host, host_path, target, target_path).bind()
}

pub struct TwoWayBuilder {
    host: Value,
    host_path: Arc<PathSpec>,
    target: Value,
    target_path: Arc<PathSpec>,
    registry: Rc<AccessorRegistry>,
    to_target: Option<Converter>,
    to_host: Option<Converter>,
}

impl TwoWayBuilder {
    pub fn new(
        host: impl Into<Value>,
        host_path: Arc<PathSpec>,
        target: impl Into<Value>,
        target_path: Arc<PathSpec>,
    ) -> Self {
        Self {
            host: host.into(),
            host_path,
            target: target.into(),
            target_path,
            registry: AccessorRegistry::shared(),
            to_target: None,
            to_host: None,
        }
    }

    pub fn registry(mut self, registry: Rc<AccessorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn convert_to_target(mut self, convert: impl Fn(Value) -> Value + 'static) -> Self {
        self.to_target = Some(Rc::new(convert));
        self
    }

    pub fn convert_to_host(mut self, convert: impl Fn(Value) -> Value + 'static) -> Self {
        self.to_host = Some(Rc::new(convert));
        self
    }

    pub fn bind(self) -> Result<TwoWayBinding, BindingError> {
        // Validate both directions before anything is subscribed.
        let target_writer =
            PathWriter::new(&self.registry, self.target.clone(), self.target_path.clone())?;
        let host_writer =
            PathWriter::new(&self.registry, self.host.clone(), self.host_path.clone())?;

        let busy = Rc::new(Cell::new(false));

        let host_stream = observe_with(&self.registry, self.host, self.host_path);
        let host_to_target = start(
            host_stream,
            target_writer,
            0,
            self.to_target,
            Rc::clone(&busy),
        );

        // Ignore the target's replay of the value just written. A broken
        // target replays nothing, so its later heal is synced to the host.
        let target_stream = observe_with(&self.registry, self.target, self.target_path);
        busy.set(true);
        let target_to_host = start(target_stream, host_writer, 0, self.to_host, Rc::clone(&busy));
        busy.set(false);

        Ok(TwoWayBinding {
            host_to_target,
            target_to_host,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::combine::combine2;
    use crate::engine::record::Record;
    use crate::engine::value::ChangeSource;
    use crate::spec::path::fixtures::path;

    fn value_path() -> Arc<PathSpec> {
        Arc::new(path("|x| x.value", &[("value", "Host", "String")]))
    }

    fn child_value_path() -> Arc<PathSpec> {
        Arc::new(path(
            "|x| x.child.value",
            &[("child", "Host", "Child"), ("value", "Child", "String")],
        ))
    }

    fn registry() -> Rc<AccessorRegistry> {
        Rc::new(AccessorRegistry::new())
    }

    #[test]
    fn one_way_pushes_replay_and_updates() {
        let reg = registry();
        let host = Record::with_fields("Host", [("value", "a")]);
        let child = Record::new("Child");
        let target = Record::with_fields("Host", [("child", child.clone())]);

        let source = observe_with(&reg, host.clone(), value_path());
        let _binding = OneWayBuilder::new(source, target.clone(), child_value_path())
            .registry(Rc::clone(&reg))
            .bind()
            .unwrap();
        assert_eq!(child.get("value"), Value::from("a"));

        host.set("value", "b");
        assert_eq!(child.get("value"), Value::from("b"));
    }

    #[test]
    fn broken_target_skips_write_until_healed() {
        let reg = registry();
        let host = Record::with_fields("Host", [("value", "a")]);
        let target = Record::new("Host");

        let source = observe_with(&reg, host.clone(), value_path());
        let _binding = OneWayBuilder::new(source, target.clone(), child_value_path())
            .registry(Rc::clone(&reg))
            .bind()
            .unwrap();

        host.set("value", "b");
        let child = Record::new("Child");
        target.set("child", child.clone());
        assert_eq!(child.get("value"), Value::Null);

        host.set("value", "c");
        assert_eq!(child.get("value"), Value::from("c"));
    }

    #[test]
    fn skip_and_convert() {
        let reg = registry();
        let host = Record::with_fields("Host", [("value", 1)]);
        let target = Record::new("Host");

        let source = observe_with(&reg, host.clone(), value_path());
        let _binding = OneWayBuilder::new(source, target.clone(), value_path())
            .registry(Rc::clone(&reg))
            .skip(1)
            .convert(|v| Value::from(v.as_int().map(|i| i * 10)))
            .bind()
            .unwrap();
        assert_eq!(target.get("value"), Value::Null);

        host.set("value", 2);
        assert_eq!(target.get("value"), Value::Int(20));
    }

    #[test]
    fn read_only_target_is_refused() {
        let reg = registry();
        let mut p = path("|x| x.value", &[("value", "Host", "String")]);
        p.links[0].settable = false;

        let host = Record::new("Host");
        let source = observe_with(&reg, host.clone(), value_path());
        let err = OneWayBuilder::new(source, Record::new("Host"), Arc::new(p))
            .registry(Rc::clone(&reg))
            .bind()
            .unwrap_err();
        assert_eq!(
            err,
            BindingError::NotSettable {
                path: "|x| x.value".to_string(),
                member: "value".to_string(),
            }
        );
        assert_eq!(host.handler_count(), 0);
    }

    #[test]
    fn combined_source_has_no_path_to_validate() {
        let reg = registry();
        let first = Record::with_fields("Host", [("value", "a")]);
        let last = Record::with_fields("Host", [("value", "b")]);
        let target = Record::new("Host");

        let source = combine2(
            observe_with(&reg, first.clone(), value_path()),
            observe_with(&reg, last.clone(), value_path()),
            |a, b| Value::from(format!("{} {}", a.as_str().unwrap_or(""), b.as_str().unwrap_or(""))),
        );
        let _binding = OneWayBuilder::new(source, target.clone(), value_path())
            .registry(Rc::clone(&reg))
            .bind()
            .unwrap();
        assert_eq!(target.get("value"), Value::from("a b"));

        last.set("value", "c");
        assert_eq!(target.get("value"), Value::from("a c"));
    }

    #[test]
    fn two_way_host_wins_without_echo() {
        let reg = registry();
        let host = Record::with_fields("Host", [("value", "A")]);
        let target = Record::with_fields("Host", [("value", "B")]);

        let writes = Rc::new(Cell::new(0));
        let writes_clone = Rc::clone(&writes);
        let _spy = host.subscribe_changes(Rc::new(move |_: &str| {
            writes_clone.set(writes_clone.get() + 1)
        }));

        let _binding = TwoWayBuilder::new(host.clone(), value_path(), target.clone(), value_path())
            .registry(Rc::clone(&reg))
            .bind()
            .unwrap();
        assert_eq!(target.get("value"), Value::from("A"));
        assert_eq!(host.get("value"), Value::from("A"));
        assert_eq!(writes.get(), 0);

        target.set("value", "C");
        assert_eq!(host.get("value"), Value::from("C"));
        host.set("value", "D");
        assert_eq!(target.get("value"), Value::from("D"));
    }

    #[test]
    fn two_way_target_broken_at_bind_syncs_when_healed() {
        let reg = registry();
        let host = Record::with_fields("Host", [("value", "A")]);
        let target = Record::new("Host");

        let _binding =
            TwoWayBuilder::new(host.clone(), value_path(), target.clone(), child_value_path())
                .registry(Rc::clone(&reg))
                .bind()
                .unwrap();
        assert_eq!(host.get("value"), Value::from("A"));

        let child = Record::with_fields("Child", [("value", "X")]);
        target.set("child", child.clone());
        assert_eq!(host.get("value"), Value::from("X"));
        assert_eq!(child.get("value"), Value::from("X"));

        host.set("value", "Y");
        assert_eq!(child.get("value"), Value::from("Y"));
    }

    #[test]
    fn dropping_two_way_stops_sync() {
        let reg = registry();
        let host = Record::with_fields("Host", [("value", "A")]);
        let target = Record::new("Host");

        let binding = TwoWayBuilder::new(host.clone(), value_path(), target.clone(), value_path())
            .registry(Rc::clone(&reg))
            .bind()
            .unwrap();
        drop(binding);
        assert_eq!(host.handler_count(), 0);
        assert_eq!(target.handler_count(), 0);

        host.set("value", "Z");
        assert_eq!(target.get("value"), Value::from("A"));
    }
}
