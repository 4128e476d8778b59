//! Visibility classification and dispatch placement.
//!
//! A path can be served from the universally reachable dispatch surface only
//! if every type and member along it is at least `Internal`. Anything tighter
//! must be placed inside a scope that can see it, and that scope must at least
//! be able to name the root type.

use crate::diagnostics::{Location, Reason, Rejection};
use crate::spec::{PathSpec, TypeCatalog, TypeRef};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reachability level, ordered from most to least restrictive.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Protected,
    Internal,
    #[default]
    Public,
}

impl Visibility {
    /// Most restrictive of the two.
    pub fn combine(self, other: Visibility) -> Visibility {
        self.min(other)
    }

    pub fn is_universal(self) -> bool {
        self >= Visibility::Internal
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Visibility::Private => "private",
            Visibility::Protected => "protected",
            Visibility::Internal => "internal",
            Visibility::Public => "public",
        };
        f.write_str(s)
    }
}

/// Where a path's dispatch entry can live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Placement {
    Universal,
    Restricted { scope: TypeRef },
}

impl Placement {
    pub fn is_universal(&self) -> bool {
        matches!(self, Placement::Universal)
    }
}

/// Most restrictive level among the root type, every member, and every type
/// the path passes through.
pub fn classify(path: &PathSpec, catalog: &TypeCatalog) -> Visibility {
    path.links.iter().fold(
        catalog.type_visibility(&path.root_type),
        |acc, link| {
            acc.combine(link.visibility)
                .combine(catalog.type_visibility(&link.output_type))
        },
    )
}

/// Decide placement for `path` declared in `scope` (`None` = global).
pub fn place(
    path: &PathSpec,
    catalog: &TypeCatalog,
    scope: Option<&TypeRef>,
    location: Location,
) -> Result<(Visibility, Placement), Rejection> {
    if !root_reachable(&path.root_type, catalog, scope) {
        return Err(Rejection::new(
            Reason::UnreachableRoot,
            location,
            format!(
                "{} ({}) is not visible from {}",
                path.root_type,
                catalog.type_visibility(&path.root_type),
                scope.map(TypeRef::as_str).unwrap_or("the global scope")
            ),
        ));
    }

    let level = classify(path, catalog);
    if level.is_universal() {
        return Ok((level, Placement::Universal));
    }

    match scope {
        Some(scope) => Ok((
            level,
            Placement::Restricted {
                scope: scope.clone(),
            },
        )),
        None => Err(Rejection::new(
            Reason::InaccessibleMember,
            location,
            format!("{} is {} and needs a declaring scope", path.text, level),
        )),
    }
}

fn root_reachable(root: &TypeRef, catalog: &TypeCatalog, scope: Option<&TypeRef>) -> bool {
    if catalog.type_visibility(root).is_universal() {
        return true;
    }
    match scope {
        Some(scope) => catalog.is_within(root, scope),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::CatalogSpec;

    fn catalog() -> TypeCatalog {
        let spec: CatalogSpec = serde_json::from_str(
            r#"{"types":[
                {"name":"Host","members":[
                    {"name":"child","type":"Child"},
                    {"name":"secret","type":"i32","visibility":"private"}
                ]},
                {"name":"Child","visibility":"internal","members":[{"name":"value","type":"i32"}]},
                {"name":"Hidden","visibility":"private","nested_in":"Host","members":[{"name":"value","type":"i32"}]}
            ]}"#,
        )
        .unwrap();
        spec.validate_and_build().unwrap()
    }

    fn extract(text: &str, root: &str, cat: &TypeCatalog) -> PathSpec {
        let raw = crate::extract::RawPath::new(root, text);
        crate::extract::extract(&raw, cat).into_result().unwrap()
    }

    #[test]
    fn ordering_is_most_restrictive_first() {
        assert!(Visibility::Private < Visibility::Protected);
        assert!(Visibility::Protected < Visibility::Internal);
        assert!(Visibility::Internal < Visibility::Public);
        assert_eq!(
            Visibility::Public.combine(Visibility::Protected),
            Visibility::Protected
        );
    }

    #[test]
    fn classify_takes_minimum_over_types_and_members() {
        let cat = catalog();
        let p = extract("|h| h.child.value", "Host", &cat);
        assert_eq!(classify(&p, &cat), Visibility::Internal);

        let p = extract("|h| h.secret", "Host", &cat);
        assert_eq!(classify(&p, &cat), Visibility::Private);
    }

    #[test]
    fn universal_path_needs_no_scope() {
        let cat = catalog();
        let p = extract("|h| h.child.value", "Host", &cat);
        let (_, placement) = place(&p, &cat, None, Location::default()).unwrap();
        assert_eq!(placement, Placement::Universal);
    }

    #[test]
    fn restricted_path_uses_scope() {
        let cat = catalog();
        let p = extract("|h| h.secret", "Host", &cat);
        let host = TypeRef::new("Host");
        let (level, placement) = place(&p, &cat, Some(&host), Location::default()).unwrap();
        assert_eq!(level, Visibility::Private);
        assert_eq!(placement, Placement::Restricted { scope: host });

        let err = place(&p, &cat, None, Location::default()).unwrap_err();
        assert_eq!(err.reason, Reason::InaccessibleMember);
    }

    #[test]
    fn private_root_outside_scope_is_unreachable() {
        let cat = catalog();
        let p = extract("|x| x.value", "Hidden", &cat);

        let err = place(&p, &cat, None, Location::new(3, 1)).unwrap_err();
        assert_eq!(err.reason, Reason::UnreachableRoot);
        assert_eq!(err.location, Location::new(3, 1));

        let child = TypeRef::new("Child");
        let err = place(&p, &cat, Some(&child), Location::default()).unwrap_err();
        assert_eq!(err.reason, Reason::UnreachableRoot);

        let host = TypeRef::new("Host");
        assert!(place(&p, &cat, Some(&host), Location::default()).is_ok());
    }
}
