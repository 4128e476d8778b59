//! Path model: an immutable chain of typed member accesses.
//!
//! `|h| h.child.value` on root `Host` becomes
//!   [ child: Host -> Child, value: Child -> i32 ]
//!
//! A PathSpec is only ever built by the extractor, which guarantees the chain
//! invariants below. Consumers share it read-only through `Arc`.

use crate::spec::TypeRef;
use crate::spec::catalog::MemberKind;
use crate::visibility::Visibility;

use serde::Serialize;

/// One hop of field/property access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub name: String,
    pub input_type: TypeRef,
    pub output_type: TypeRef,
    pub kind: MemberKind,
    pub visibility: Visibility,
    pub settable: bool,
}

/// A validated access path.
///
/// Invariants:
/// 1. `links` is non-empty.
/// 2. `links[0].input_type == root_type`.
/// 3. `links[i].output_type == links[i + 1].input_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathSpec {
    /// Literal textual form, the dedup and lookup key.
    pub text: String,
    pub parameter: String,
    pub root_type: TypeRef,
    pub links: Vec<Link>,
}

impl PathSpec {
    pub(crate) fn new(text: String, parameter: String, root_type: TypeRef, links: Vec<Link>) -> Self {
        debug_assert!(!links.is_empty(), "path must have at least one link");
        debug_assert_eq!(links[0].input_type, root_type);
        debug_assert!(
            links.windows(2).all(|w| w[0].output_type == w[1].input_type),
            "links must chain types"
        );
        Self {
            text,
            parameter,
            root_type,
            links,
        }
    }

    pub fn leaf(&self) -> &Link {
        // links is never empty
        &self.links[self.links.len() - 1]
    }

    pub fn leaf_type(&self) -> &TypeRef {
        &self.leaf().output_type
    }

    pub fn depth(&self) -> usize {
        self.links.len()
    }

    /// Member names from root to leaf, e.g. `child.value`.
    pub fn dotted(&self) -> String {
        self.links
            .iter()
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// True when the final member can be written.
    pub fn is_settable(&self) -> bool {
        self.leaf().settable
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Build a path by hand: `links` are (member, input, output) triples.
    pub fn path(text: &str, links: &[(&str, &str, &str)]) -> PathSpec {
        let links: Vec<Link> = links
            .iter()
            .map(|(name, input, output)| Link {
                name: name.to_string(),
                input_type: TypeRef::new(input),
                output_type: TypeRef::new(output),
                kind: MemberKind::Property,
                visibility: Visibility::Public,
                settable: true,
            })
            .collect();
        let root = links[0].input_type.clone();
        PathSpec::new(text.to_string(), "x".to_string(), root, links)
    }
}
