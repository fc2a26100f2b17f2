//! Output normalization - one presentation layer for heterogeneous tool output
//!
//! Tools return whatever their upstream API returns: scalar strings, JSON
//! objects and arrays, CSV text. This module converts all of it into one of
//! three presentation forms (a padded text table, a pretty-printed JSON
//! block, or plain text) with a single detection algorithm shared by every
//! call site.
//!
//! Normalization sits on the hot path of every tool response, so it never
//! fails: any input that defeats detection or rendering falls back to its
//! string representation.

use serde_json::{Map, Value};

/// Container keys commonly used by REST APIs to wrap their row payloads.
/// Checked before the generic value scan so `{"results": [...], "meta": ...}`
/// resolves to the rows rather than whatever `meta` holds.
const WELL_KNOWN_KEYS: [&str; 6] = ["data", "results", "records", "rows", "items", "response"];

/// Maximum depth for the recursive tabular search. Bounds termination on
/// pathological nesting.
pub const MAX_TABLE_DEPTH: usize = 6;

/// Message-type tag for client notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    ToolStarted,
    ToolFailed,
}

/// Wrap a notification string in the fixed markup envelope the client UI
/// expects.
///
/// # Example
/// ```
/// use rankmate::normalize::{notice_envelope, Notice};
///
/// let n = notice_envelope(Notice::ToolStarted, "Using tool: http_request");
/// assert_eq!(n, r#"<notice type="tool">Using tool: http_request</notice>"#);
/// ```
pub fn notice_envelope(kind: Notice, text: &str) -> String {
    match kind {
        Notice::ToolStarted => format!(r#"<notice type="tool">{}</notice>"#, text),
        Notice::ToolFailed => format!(r#"<notice type="tool-error">{}</notice>"#, text),
    }
}

/// Normalize a structured value for presentation.
///
/// Tabular data renders as a padded text table, other objects/arrays as a
/// pretty-printed JSON block, scalars as plain text.
pub fn present(value: &Value) -> String {
    if let Some(rows) = find_rows(value, 0) {
        return render_rows(&rows);
    }
    match value {
        Value::String(s) => present_text(s),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => json_block(other),
    }
}

/// Normalize a text value for presentation.
///
/// Attempts a JSON parse first (embedded payloads are common in scraped
/// responses), then the CSV heuristic, then passes the text through.
pub fn present_text(text: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(text) {
        if parsed.is_object() || parsed.is_array() {
            return present(&parsed);
        }
        // A bare JSON scalar ("42", "true") reads better as the original text
        return text.to_string();
    }
    if looks_like_csv(text) {
        if let Some(rendered) = render_csv(text) {
            return rendered;
        }
    }
    text.to_string()
}

/// Check whether a value contains tabular data the renderer would pick up.
///
/// # Example
/// ```
/// use rankmate::normalize::is_tabular;
/// use serde_json::json;
///
/// assert!(is_tabular(&json!([{"a": 1, "b": 2}, {"a": 3, "c": 4}])));
/// assert!(is_tabular(&json!({"results": [{"keyword": "crm"}]})));
/// assert!(!is_tabular(&json!("just a sentence")));
/// ```
pub fn is_tabular(value: &Value) -> bool {
    match value {
        Value::String(s) => {
            if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                find_rows(&parsed, 0).is_some()
            } else {
                looks_like_csv(s)
            }
        }
        other => find_rows(other, 0).is_some(),
    }
}

/// Recursive tabular search, depth-bounded by [`MAX_TABLE_DEPTH`].
///
/// A list qualifies when every element is a mapping and at least one key is
/// shared across all elements. Mappings are searched through well-known
/// container keys first, then through every value.
fn find_rows(value: &Value, depth: usize) -> Option<Vec<&Map<String, Value>>> {
    if depth > MAX_TABLE_DEPTH {
        return None;
    }
    match value {
        Value::Array(list) => rows_from_list(list),
        Value::Object(map) => {
            for key in WELL_KNOWN_KEYS {
                if let Some(candidate) = map.get(key) {
                    if candidate.is_array() {
                        if let Some(rows) = find_rows(candidate, depth + 1) {
                            return Some(rows);
                        }
                    }
                }
            }
            for candidate in map.values() {
                if let Some(rows) = find_rows(candidate, depth + 1) {
                    return Some(rows);
                }
            }
            None
        }
        _ => None,
    }
}

fn rows_from_list(list: &[Value]) -> Option<Vec<&Map<String, Value>>> {
    if list.is_empty() {
        return None;
    }
    let rows: Vec<&Map<String, Value>> = list
        .iter()
        .map(|v| v.as_object())
        .collect::<Option<Vec<_>>>()?;

    // At least one key must be shared across ALL rows
    let first = rows.first()?;
    let shared = first
        .keys()
        .any(|k| rows.iter().all(|row| row.contains_key(k)));
    if shared {
        Some(rows)
    } else {
        None
    }
}

/// Column set is the union of keys across all rows, in first-seen order, so
/// heterogeneous rows don't silently drop data.
fn column_union(rows: &[&Map<String, Value>]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn render_rows(rows: &[&Map<String, Value>]) -> String {
    let columns = column_union(rows);
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| row.get(col).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();
    render_table(&columns, &cells)
}

/// Render one cell: strings as-is, everything else as single-line JSON.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a padded text table: header row, dash separator sized per column,
/// one row per record, every column left-justified to its widest cell.
fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .map(|row| row.get(i).map(|c| c.chars().count()).unwrap_or(0))
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render_line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(widths.iter().copied())
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(render_line(columns));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join(" | "),
    );
    for row in rows {
        lines.push(render_line(row));
    }
    lines.join("\n")
}

/// CSV heuristic: comma plus newline present, no JSON structure characters.
fn looks_like_csv(text: &str) -> bool {
    text.contains(',') && text.contains('\n') && !text.contains('{') && !text.contains('[')
}

fn render_csv(text: &str) -> Option<String> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<String> = lines.next()?.split(',').map(|f| f.trim().to_string()).collect();
    if header.len() < 2 {
        return None;
    }
    let rows: Vec<Vec<String>> = lines
        .map(|line| {
            let mut cells: Vec<String> = line.split(',').map(|f| f.trim().to_string()).collect();
            cells.resize(header.len(), String::new());
            cells.truncate(header.len());
            cells
        })
        .collect();
    Some(render_table(&header, &rows))
}

fn json_block(value: &Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```json\n{}\n```", pretty)
}
