//! Path extraction: parse a closure-shaped path specification and validate
//! it into a PathSpec.

pub mod syntax;
pub mod validate;

pub use validate::{RawPath, Verdict, extract};
