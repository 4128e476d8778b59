//! Grouping model: index validated paths by (root type, leaf type).
//!
//! Dedup is by textual key only. Two paths with identical text are one entry;
//! two paths with different text stay distinct even when every type along
//! them matches, because they may still traverse different members.

pub mod report;

pub use report::{ReportData, build_report_data};

use crate::diagnostics::Rejection;
use crate::extract::{self, RawPath, Verdict};
use crate::spec::{PathSpec, TypeCatalog, TypeRef};
use crate::visibility::{self, Placement, Visibility};

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A valid path with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupEntry {
    pub path: Arc<PathSpec>,
    pub visibility: Visibility,
    pub placement: Placement,
}

/// (root type, leaf type)
pub type GroupKey = (TypeRef, TypeRef);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathGroup {
    pub root_type: TypeRef,
    pub leaf_type: TypeRef,
    /// Keyed by the path's textual form.
    pub entries: BTreeMap<String, GroupEntry>,
}

impl PathGroup {
    pub fn new(root_type: TypeRef, leaf_type: TypeRef) -> Self {
        Self {
            root_type,
            leaf_type,
            entries: BTreeMap::new(),
        }
    }

    /// Insert unless an entry with the same text exists. Returns whether the
    /// entry was added.
    pub fn insert(&mut self, entry: GroupEntry) -> bool {
        debug_assert_eq!(entry.path.root_type, self.root_type);
        debug_assert_eq!(entry.path.leaf_type(), &self.leaf_type);
        if self.entries.contains_key(&entry.path.text) {
            return false;
        }
        self.entries.insert(entry.path.text.clone(), entry);
        true
    }

    pub fn get(&self, text: &str) -> Option<&GroupEntry> {
        self.entries.get(text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries servable from the universally reachable dispatch surface.
    pub fn universal(&self) -> impl Iterator<Item = &GroupEntry> {
        self.entries.values().filter(|e| e.placement.is_universal())
    }

    /// Entries that must be placed inside their declaring scope.
    pub fn restricted(&self) -> impl Iterator<Item = &GroupEntry> {
        self.entries.values().filter(|e| !e.placement.is_universal())
    }
}

/// Group classified paths by (root, leaf).
pub fn group(entries: impl IntoIterator<Item = GroupEntry>) -> BTreeMap<GroupKey, PathGroup> {
    let mut groups: BTreeMap<GroupKey, PathGroup> = BTreeMap::new();
    for entry in entries {
        let key = (entry.path.root_type.clone(), entry.path.leaf_type().clone());
        let group = groups
            .entry(key)
            .or_insert_with_key(|(root, leaf)| PathGroup::new(root.clone(), leaf.clone()));
        if !group.insert(entry) {
            tracing::debug!(group = %group.root_type, "duplicate path text collapsed");
        }
    }
    groups
}

/// Outcome of one raw path in a batch.
#[derive(Debug, Clone)]
pub struct PathOutcome {
    pub raw: RawPath,
    pub result: Result<GroupEntry, Rejection>,
}

/// Result of analysing a batch of paths.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub outcomes: Vec<PathOutcome>,
    pub groups: BTreeMap<GroupKey, PathGroup>,
}

impl Analysis {
    pub fn rejections(&self) -> impl Iterator<Item = (&RawPath, &Rejection)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|r| (&o.raw, r)))
    }

    pub fn valid_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}

/// Extract, classify, and place one raw path.
pub fn classify_raw(raw: &RawPath, catalog: &TypeCatalog) -> Result<GroupEntry, Rejection> {
    let path = match extract::extract(raw, catalog) {
        Verdict::Valid(p) => p,
        Verdict::Rejected(r) => return Err(r),
    };
    let scope = raw.scope.as_deref().map(TypeRef::new);
    let (visibility, placement) =
        visibility::place(&path, catalog, scope.as_ref(), raw.location)?;
    Ok(GroupEntry {
        path: Arc::new(path),
        visibility,
        placement,
    })
}

/// Analyse a batch. A rejected path never stops its siblings.
pub fn analyze(raws: &[RawPath], catalog: &TypeCatalog) -> Analysis {
    let outcomes: Vec<PathOutcome> = raws
        .iter()
        .map(|raw| {
            let result = classify_raw(raw, catalog);
            if let Err(rejection) = &result {
                tracing::warn!(path = %raw.text, %rejection, "path rejected");
            }
            PathOutcome {
                raw: raw.clone(),
                result,
            }
        })
        .collect();

    let groups = group(
        outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().cloned()),
    );

    Analysis { outcomes, groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Reason;
    use crate::spec::CatalogSpec;
    use pretty_assertions::assert_eq;

    fn catalog() -> TypeCatalog {
        let spec: CatalogSpec = serde_json::from_str(
            r#"{"types":[
                {"name":"Host","members":[
                    {"name":"child","type":"Child"},
                    {"name":"other","type":"Child"},
                    {"name":"value","type":"i32"},
                    {"name":"secret","type":"i32","visibility":"private"}
                ]},
                {"name":"Child","members":[{"name":"value","type":"i32"}]}
            ]}"#,
        )
        .unwrap();
        spec.validate_and_build().unwrap()
    }

    #[test]
    fn dedups_by_text_not_by_type() {
        let cat = catalog();
        let raws = vec![
            RawPath::new("Host", "|a| a.value"),
            RawPath::new("Host", "|a| a.child.value"),
            RawPath::new("Host", "|a| a.other.value"),
            RawPath::new("Host", "|a|   a.child.value"),
        ];
        let analysis = analyze(&raws, &cat);
        assert_eq!(analysis.valid_count(), 4);
        assert_eq!(analysis.groups.len(), 1);

        let g = &analysis.groups[&(TypeRef::new("Host"), TypeRef::new("i32"))];
        let keys: Vec<&str> = g.entries.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["|a| a.child.value", "|a| a.other.value", "|a| a.value"]
        );
    }

    #[test]
    fn distinct_pairs_get_distinct_groups() {
        let cat = catalog();
        let raws = vec![
            RawPath::new("Host", "|a| a.child"),
            RawPath::new("Host", "|a| a.value"),
            RawPath::new("Child", "|c| c.value"),
        ];
        let analysis = analyze(&raws, &cat);
        let keys: Vec<(String, String)> = analysis
            .groups
            .keys()
            .map(|(r, l)| (r.to_string(), l.to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Child".to_string(), "i32".to_string()),
                ("Host".to_string(), "Child".to_string()),
                ("Host".to_string(), "i32".to_string()),
            ]
        );
    }

    #[test]
    fn partitions_universal_and_restricted() {
        let cat = catalog();
        let raws = vec![
            RawPath::new("Host", "|a| a.value"),
            RawPath::new("Host", "|a| a.secret").with_scope("Host"),
        ];
        let analysis = analyze(&raws, &cat);
        let g = &analysis.groups[&(TypeRef::new("Host"), TypeRef::new("i32"))];
        let universal: Vec<&str> = g.universal().map(|e| e.path.text.as_str()).collect();
        let restricted: Vec<&str> = g.restricted().map(|e| e.path.text.as_str()).collect();
        assert_eq!(universal, vec!["|a| a.value"]);
        assert_eq!(restricted, vec!["|a| a.secret"]);
    }

    #[test]
    fn rejections_do_not_stop_the_batch() {
        let cat = catalog();
        let raws = vec![
            RawPath::new("Host", "selector"),
            RawPath::new("Host", "|a| a.value"),
            RawPath::new("Host", "|a| a.secret"),
        ];
        let analysis = analyze(&raws, &cat);
        let reasons: Vec<Reason> = analysis.rejections().map(|(_, r)| r.reason).collect();
        assert_eq!(reasons, vec![Reason::NotInline, Reason::InaccessibleMember]);
        assert_eq!(analysis.valid_count(), 1);
    }
}
