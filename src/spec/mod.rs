//! Spec layer: JSON schemas + validated in-memory structures.
//!
//! This module is intentionally separate from extraction and the runtime
//! engine. It owns:
//! - TypeRef (type identity)
//! - Type catalog (types.json, the object model paths resolve against)
//! - Path model (Link, PathSpec)

pub mod catalog;
pub mod path;
pub mod types;

pub use catalog::{CatalogSpec, MemberDef, MemberKind, TypeCatalog, TypeDef};
pub use path::{Link, PathSpec};
pub use types::TypeRef;
