//! Type catalog (types.json): the static object model paths are resolved against.
//!
//! JSON shape:
//! {
//!   "types": [
//!     {
//!       "name": "Host",
//!       "visibility": "public",      // optional, defaults to public
//!       "nested_in": null,           // optional enclosing type
//!       "members": [
//!         {
//!           "name": "child",
//!           "type": "Child",
//!           "kind": "property",      // field | property | method | indexer
//!           "visibility": "public",
//!           "settable": true
//!         }
//!       ]
//!     }
//!   ]
//! }
//!
//! Member types must name a declared type or one of the builtin primitives.
//! Primitives are always public and have no members.

use crate::Result;
use crate::spec::TypeRef;
use crate::visibility::Visibility;

use anyhow::{Context, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;

/// Names accepted as member types without a catalog entry.
pub const PRIMITIVES: &[&str] = &[
    "bool", "char", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64",
    "u128", "usize", "f32", "f64", "str", "String",
];

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSpec {
    #[serde(default)]
    pub types: Vec<RawType>,
}

/// Raw type shape as it appears in types.json.
#[derive(Debug, Clone, Deserialize)]
pub struct RawType {
    pub name: String,

    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default)]
    pub nested_in: Option<String>,

    #[serde(default)]
    pub members: Vec<RawMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMember {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: String,

    #[serde(default)]
    pub kind: MemberKind,

    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default)]
    pub settable: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Field,
    #[default]
    Property,
    Method,
    Indexer,
}

impl MemberKind {
    /// Whether reading this member is a plain field/property access.
    pub fn is_readable_link(self) -> bool {
        matches!(self, MemberKind::Field | MemberKind::Property)
    }
}

/// Validated member ready for path resolution.
#[derive(Debug, Clone)]
pub struct MemberDef {
    pub name: String,
    pub ty: TypeRef,
    pub kind: MemberKind,
    pub visibility: Visibility,
    pub settable: bool,
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: TypeRef,
    pub visibility: Visibility,
    pub nested_in: Option<TypeRef>,
    pub members: BTreeMap<String, MemberDef>,
}

/// Validated catalog, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: BTreeMap<TypeRef, TypeDef>,
}

impl CatalogSpec {
    /// Validate a CatalogSpec and build a TypeCatalog:
    /// - unique type names, not shadowing primitives
    /// - unique member names per type
    /// - member types reference declared types or primitives
    /// - `nested_in` references a declared type and nesting is acyclic
    pub fn validate_and_build(&self) -> Result<TypeCatalog> {
        // 1) Unique types.
        let mut types = BTreeMap::<TypeRef, TypeDef>::new();
        for raw in &self.types {
            if is_primitive(&raw.name) {
                bail!("type {} shadows a builtin primitive", raw.name);
            }
            let name = TypeRef::new(&raw.name);
            if types.contains_key(&name) {
                bail!("duplicate type name in types.json: {}", raw.name);
            }

            let mut members = BTreeMap::new();
            for m in &raw.members {
                if members.contains_key(&m.name) {
                    bail!("duplicate member {}.{}", raw.name, m.name);
                }
                members.insert(
                    m.name.clone(),
                    MemberDef {
                        name: m.name.clone(),
                        ty: TypeRef::new(&m.ty),
                        kind: m.kind,
                        visibility: m.visibility,
                        settable: m.settable,
                    },
                );
            }

            types.insert(
                name.clone(),
                TypeDef {
                    name,
                    visibility: raw.visibility,
                    nested_in: raw.nested_in.as_deref().map(TypeRef::new),
                    members,
                },
            );
        }

        // 2) Member types resolve.
        for def in types.values() {
            for m in def.members.values() {
                if !is_primitive(m.ty.as_str()) && !types.contains_key(&m.ty) {
                    bail!(
                        "member {}.{} references unknown type {}",
                        def.name,
                        m.name,
                        m.ty
                    );
                }
            }
        }

        // 3) Nesting parents exist and never loop back.
        for def in types.values() {
            let mut seen = vec![def.name.clone()];
            let mut cur = def.nested_in.clone();
            while let Some(parent) = cur {
                let Some(parent_def) = types.get(&parent) else {
                    bail!("type {} is nested in unknown type {}", def.name, parent);
                };
                if seen.contains(&parent) {
                    seen.push(parent);
                    let chain: Vec<&str> = seen.iter().map(TypeRef::as_str).collect();
                    bail!("nesting cycle in types.json: {}", chain.join(" -> "));
                }
                seen.push(parent);
                cur = parent_def.nested_in.clone();
            }
        }

        Ok(TypeCatalog { types })
    }
}

impl TypeCatalog {
    /// Read and validate a catalog file.
    pub fn load(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("read catalog file {}", path))?;
        let spec: CatalogSpec =
            serde_json::from_str(&text).with_context(|| format!("parse catalog file {}", path))?;
        spec.validate_and_build()
            .with_context(|| format!("invalid catalog {}", path))
    }

    pub fn get(&self, name: &TypeRef) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Whether `name` is a declared type or a primitive.
    pub fn knows(&self, name: &TypeRef) -> bool {
        is_primitive(name.as_str()) || self.types.contains_key(name)
    }

    pub fn member(&self, owner: &TypeRef, member: &str) -> Option<&MemberDef> {
        self.types.get(owner).and_then(|t| t.members.get(member))
    }

    /// Own visibility of a type; primitives are public.
    pub fn type_visibility(&self, name: &TypeRef) -> Visibility {
        self.types
            .get(name)
            .map(|t| t.visibility)
            .unwrap_or(Visibility::Public)
    }

    /// True when `inner` is `outer` or transitively nested inside it.
    pub fn is_within(&self, inner: &TypeRef, outer: &TypeRef) -> bool {
        let mut cur = Some(inner.clone());
        while let Some(t) = cur {
            if &t == outer {
                return true;
            }
            cur = self.types.get(&t).and_then(|d| d.nested_in.clone());
        }
        false
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains(&name)
}
