use crate::Result;
use crate::model::ReportData;
use crate::model::report::EntryView;

use std::fmt::Write;

/// Plain-text report: summary line, rejections, then one block per group.
pub fn render_text_report(data: &ReportData) -> Result<String> {
    let mut out = String::new();
    let s = &data.summary;
    writeln!(
        out,
        "paths: {} total, {} valid, {} rejected; {} groups",
        s.total, s.valid, s.rejected, s.groups
    )?;

    if !data.diagnostics.is_empty() {
        out.push_str("\nrejected:\n");
        for d in &data.diagnostics {
            writeln!(
                out,
                "  {}  {} {}  {}  {}  ({})",
                d.location, d.code, d.reason, d.root_type, d.text, d.detail
            )?;
        }
    }

    for g in &data.groups {
        writeln!(out, "\ngroup {} -> {}", g.root_type, g.leaf_type)?;
        if !g.universal.is_empty() {
            out.push_str("  universal:\n");
            for e in &g.universal {
                write_entry(&mut out, e)?;
            }
        }
        if !g.restricted.is_empty() {
            out.push_str("  restricted:\n");
            for e in &g.restricted {
                write_entry(&mut out, e)?;
            }
        }
    }
    Ok(out)
}

fn write_entry(out: &mut String, e: &EntryView) -> Result<()> {
    let mut notes = vec![e.visibility.to_string()];
    if let Some(scope) = &e.scope {
        notes.push(format!("scope {}", scope));
    }
    if e.settable {
        notes.push("settable".to_string());
    }
    writeln!(out, "    {}  [{}]", e.text, notes.join(", "))?;
    Ok(())
}
