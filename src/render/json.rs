use crate::model::ReportData;

/// Pretty-printed JSON report, newline-terminated.
pub fn render_json_report(data: &ReportData) -> anyhow::Result<String> {
    let mut out = serde_json::to_string_pretty(data)?;
    out.push('\n');
    Ok(out)
}
