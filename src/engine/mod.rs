//! Runtime engine: observe member chains on live objects.
//!
//! - value: dynamic values, the observed-object traits, RAII subscriptions
//! - record: a ready-made observable object with named fields
//! - accessor: memoized getter/setter resolution per (type, member)
//! - chain: one path, re-subscribed as intermediate links change
//! - combine: several paths joined through a conversion
//! - binding: push chain values into settable members

pub mod accessor;
pub mod binding;
pub mod chain;
pub mod combine;
pub mod error;
pub mod record;
pub mod stream;
pub mod value;

pub use accessor::{Accessor, AccessorRegistry, MemberKey};
pub use binding::{
    OneWayBinding, OneWayBuilder, PathWriter, TwoWayBinding, TwoWayBuilder, ValueSource,
    bind_one_way, bind_two_way,
};
pub use chain::{ChainSubscription, PathStream, observe, observe_with};
pub use combine::{CombinedObservation, CombinedStream, combine, combine2};
pub use error::{AccessError, BindingError, ChainError};
pub use record::Record;
pub use stream::{Disposable, Notification, Sink};
pub use value::{ChangeHandler, ChangeSource, Object, Observed, Subscription, Value};
