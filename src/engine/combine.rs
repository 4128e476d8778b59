//! N-path combinator: join several chains through a conversion function.
//!
//! The combined stream stays silent until every input has produced a value.
//! After that, each input emission re-runs the conversion with the latest
//! value of every input.

use crate::engine::chain::{ChainSubscription, PathStream};
use crate::engine::error::ChainError;
use crate::engine::stream::{Disposable, Emitter, Notification};
use crate::engine::value::Value;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Convert<R> = Rc<dyn Fn(&[Value]) -> R>;

/// A cold combination of path streams.
pub struct CombinedStream<R> {
    inputs: Vec<PathStream>,
    convert: Convert<R>,
}

/// Combine `inputs` with `convert`, which receives the latest value of every
/// input in input order.
pub fn combine<R: 'static>(
    inputs: Vec<PathStream>,
    convert: impl Fn(&[Value]) -> R + 'static,
) -> CombinedStream<R> {
    CombinedStream {
        inputs,
        convert: Rc::new(convert),
    }
}

/// Two-input form of [`combine`].
pub fn combine2<R: 'static>(
    first: PathStream,
    second: PathStream,
    convert: impl Fn(&Value, &Value) -> R + 'static,
) -> CombinedStream<R> {
    combine(vec![first, second], move |values: &[Value]| {
        convert(&values[0], &values[1])
    })
}

impl<R: 'static> CombinedStream<R> {
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Subscribe to every input, in order.
    pub fn subscribe(self, sink: impl FnMut(Notification<R>) + 'static) -> CombinedObservation {
        let state = Rc::new(CombineState {
            latest: RefCell::new(vec![None; self.inputs.len()]),
            convert: self.convert,
            emitter: Emitter::new(Box::new(sink)),
            inputs: RefCell::new(Vec::with_capacity(self.inputs.len())),
            done: Cell::new(false),
        });

        for (index, stream) in self.inputs.into_iter().enumerate() {
            if state.done.get() {
                break;
            }
            let weak: Weak<CombineState<R>> = Rc::downgrade(&state);
            let sub = stream.subscribe(move |n| {
                if let Some(state) = weak.upgrade() {
                    match n {
                        Notification::Next(v) => state.on_next(index, v),
                        Notification::Failed(err) => state.on_failed(err),
                    }
                }
            });
            state.inputs.borrow_mut().push(sub);
        }

        // An input that failed during its initial replay ended the combination
        // before later inputs existed.
        if state.done.get() {
            state.teardown();
        }

        CombinedObservation {
            state: Some(state),
        }
    }
}

impl<R> fmt::Debug for CombinedStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedStream")
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

struct CombineState<R> {
    latest: RefCell<Vec<Option<Value>>>,
    convert: Convert<R>,
    emitter: Emitter<R>,
    inputs: RefCell<Vec<ChainSubscription>>,
    done: Cell<bool>,
}

impl<R> CombineState<R> {
    fn on_next(&self, index: usize, value: Value) {
        if self.done.get() {
            return;
        }
        let ready: Option<Vec<Value>> = {
            let mut latest = self.latest.borrow_mut();
            latest[index] = Some(value);
            latest.iter().cloned().collect()
        };
        // Cold-start barrier: every input must have produced a value.
        let Some(values) = ready else {
            return;
        };
        let out = (self.convert)(&values);
        self.emitter.emit(Notification::Next(out));
    }

    fn on_failed(&self, err: ChainError) {
        if self.done.get() {
            return;
        }
        tracing::warn!(error = %err, "combined input failed");
        self.release_inputs();
        self.emitter.finish(Notification::Failed(err));
    }
}

/// Type-erased teardown so the observation handle is not generic.
trait Teardown {
    fn teardown(&self);
    fn is_done(&self) -> bool;
    fn attached_depths(&self) -> Vec<usize>;
}

impl<R> CombineState<R> {
    fn release_inputs(&self) {
        self.done.set(true);
        // Take the inputs out first: disposing runs unregister actions that
        // must not observe our borrow.
        let inputs: Vec<ChainSubscription> = match self.inputs.try_borrow_mut() {
            Ok(mut v) => v.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for mut sub in inputs.into_iter().rev() {
            sub.dispose();
        }
    }
}

impl<R> Teardown for CombineState<R> {
    fn teardown(&self) {
        self.release_inputs();
        self.emitter.close();
    }

    fn is_done(&self) -> bool {
        self.done.get()
    }

    fn attached_depths(&self) -> Vec<usize> {
        self.inputs
            .borrow()
            .iter()
            .map(ChainSubscription::attached_depth)
            .collect()
    }
}

/// Live combination. Dropping it disposes every input chain.
#[must_use = "dropping a CombinedObservation stops the observation"]
pub struct CombinedObservation {
    state: Option<Rc<dyn Teardown>>,
}

impl CombinedObservation {
    /// Attached depth of each live input chain.
    pub fn attached_depths(&self) -> Vec<usize> {
        self.state
            .as_ref()
            .map(|s| s.attached_depths())
            .unwrap_or_default()
    }
}

impl Disposable for CombinedObservation {
    fn dispose(&mut self) {
        if let Some(state) = self.state.take() {
            state.teardown();
        }
    }

    fn is_disposed(&self) -> bool {
        self.state.as_ref().map(|s| s.is_done()).unwrap_or(true)
    }
}

impl Drop for CombinedObservation {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for CombinedObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinedObservation")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
