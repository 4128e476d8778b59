//! chainwatch: validate member-path specifications against a type catalog,
//! and observe those paths on live object graphs.

pub mod diagnostics;
pub mod engine;
pub mod extract;
pub mod model;
pub mod render;
pub mod source;
pub mod spec;
pub mod visibility;

pub type Result<T> = anyhow::Result<T>;
