use crate::Result;
use crate::diagnostics::Location;
use crate::extract::RawPath;

use anyhow::{Context, bail};
use regex::Regex;
use std::fs;

/// Parse a path listing file into raw path specifications.
///
/// Expected columns (whitespace-separated):
/// root_type  scope  expression...
///
/// `scope` is `-` for the global dispatch scope. Example:
/// Host   -      |h| h.child.value
/// Host   Host   |h| h.secret
pub fn parse_paths_file(path: &str) -> Result<Vec<RawPath>> {
    let text = fs::read_to_string(path).with_context(|| format!("read paths file {}", path))?;
    parse_paths(&text, path)
}

/// Parse listing text; `origin` names the source in error messages.
pub fn parse_paths(text: &str, origin: &str) -> Result<Vec<RawPath>> {
    // Capture:
    // 1) root type
    // 2) scope type or `-`
    // 3) expression: rest of line
    const PATH_LINE_RE: &str = r#"^(\s*([A-Za-z_]\w*)\s+([A-Za-z_]\w*|-)\s+)(\S.*?)\s*$"#;
    let re = Regex::new(PATH_LINE_RE)?;
    let header = Regex::new(r#"^\s*root_type\s+scope\s+expression\s*$"#)?;

    let mut out = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let lno = lineno + 1;
        let line = line.trim_end();

        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        // Skip header line if present.
        if header.is_match(line) {
            continue;
        }

        let Some(caps) = re.captures(line) else {
            bail!(
                "paths parse error at {}:{}: cannot parse line: {:?}",
                origin,
                lno,
                line
            );
        };

        let (Some(prefix), Some(root), Some(scope), Some(expr)) =
            (caps.get(1), caps.get(2), caps.get(3), caps.get(4))
        else {
            bail!("paths parse error at {}:{}: missing column", origin, lno);
        };

        let column = prefix.as_str().chars().count() + 1;
        let mut raw = RawPath::new(root.as_str(), expr.as_str()).at(Location::new(lno, column));
        if scope.as_str() != "-" {
            raw = raw.with_scope(scope.as_str());
        }
        out.push(raw);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_columns_and_locations() {
        let text = "\
root_type scope expression
# comment

Host  -     |h| h.child.value
Host  Host  |h| h.secret   
";
        let paths = parse_paths(text, "inline").unwrap();
        assert_eq!(
            paths,
            vec![
                RawPath::new("Host", "|h| h.child.value").at(Location::new(4, 13)),
                RawPath::new("Host", "|h| h.secret")
                    .with_scope("Host")
                    .at(Location::new(5, 13)),
            ]
        );
    }

    #[test]
    fn header_words_inside_a_path_are_kept() {
        let text = "  root_type   scope expression\nScope - |s| s.root_type.scope.expression\n";
        let paths = parse_paths(text, "inline").unwrap();
        assert_eq!(
            paths,
            vec![
                RawPath::new("Scope", "|s| s.root_type.scope.expression")
                    .at(Location::new(2, 9)),
            ]
        );
    }

    #[test]
    fn bad_line_reports_position() {
        let err = parse_paths("Host\n", "listing.paths").unwrap_err();
        assert!(err.to_string().contains("listing.paths:1"));
    }
}
