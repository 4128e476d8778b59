//! Report view model: flat, serializable rows built from an [`Analysis`].

use crate::diagnostics::{Location, Reason};
use crate::model::{Analysis, GroupEntry};
use crate::spec::TypeRef;
use crate::visibility::{Placement, Visibility};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub valid: usize,
    pub rejected: usize,
    pub groups: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticView {
    pub code: &'static str,
    pub reason: Reason,
    pub location: Location,
    pub root_type: String,
    pub text: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    pub text: String,
    /// Member chain without the closure, e.g. `child.value`.
    pub members: String,
    pub visibility: Visibility,
    /// Declaring scope for restricted entries.
    pub scope: Option<TypeRef>,
    pub settable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub root_type: TypeRef,
    pub leaf_type: TypeRef,
    pub universal: Vec<EntryView>,
    pub restricted: Vec<EntryView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportData {
    pub summary: Summary,
    pub diagnostics: Vec<DiagnosticView>,
    pub groups: Vec<GroupView>,
}

impl ReportData {
    pub fn has_rejections(&self) -> bool {
        self.summary.rejected > 0
    }
}

fn entry_view(entry: &GroupEntry) -> EntryView {
    let scope = match &entry.placement {
        Placement::Universal => None,
        Placement::Restricted { scope } => Some(scope.clone()),
    };
    EntryView {
        text: entry.path.text.clone(),
        members: entry.path.dotted(),
        visibility: entry.visibility,
        scope,
        settable: entry.path.is_settable(),
    }
}

/// Flatten an analysis into report rows. Diagnostics keep input order;
/// groups are ordered by (root, leaf).
pub fn build_report_data(analysis: &Analysis) -> ReportData {
    let diagnostics: Vec<DiagnosticView> = analysis
        .rejections()
        .map(|(raw, rejection)| DiagnosticView {
            code: rejection.reason.code(),
            reason: rejection.reason,
            location: rejection.location,
            root_type: raw.root_type.clone(),
            text: raw.text.clone(),
            detail: rejection.detail.clone(),
        })
        .collect();

    let groups: Vec<GroupView> = analysis
        .groups
        .values()
        .map(|g| GroupView {
            root_type: g.root_type.clone(),
            leaf_type: g.leaf_type.clone(),
            universal: g.universal().map(entry_view).collect(),
            restricted: g.restricted().map(entry_view).collect(),
        })
        .collect();

    ReportData {
        summary: Summary {
            total: analysis.outcomes.len(),
            valid: analysis.valid_count(),
            rejected: diagnostics.len(),
            groups: groups.len(),
        },
        diagnostics,
        groups,
    }
}
