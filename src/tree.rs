use crate::window::LoadedRecord;
use serde_json::Value;

/// Indentation per nesting level in the expanded view.
const INDENT: &str = "  ";

/// Display payload for one record: a one-line collapsed preview plus a
/// lazily rendered expanded tree.
///
/// Built once per loaded record by the window's row-builder callback.
/// The expanded rendering is deferred until the first expand, since
/// most records scroll past collapsed.
pub struct JsonTree {
    preview: String,
    expandable: bool,
    expanded: bool,
    rendered: Option<Vec<String>>,
}

impl JsonTree {
    pub fn build(rec: &LoadedRecord, preview_keys: &[String]) -> Self {
        Self {
            preview: preview_line(&rec.value, preview_keys),
            expandable: matches!(rec.value, Value::Object(_) | Value::Array(_)),
            expanded: false,
            rendered: None,
        }
    }

    /// Collapsed one-line summary of the record.
    pub fn preview(&self) -> &str {
        &self.preview
    }

    /// Only objects and arrays have anything to unfold.
    pub fn is_expandable(&self) -> bool {
        self.expandable
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Expand or collapse, rendering the tree on first expand. `value`
    /// must be the record this payload was built from.
    pub fn set_expanded(&mut self, expanded: bool, value: &Value) {
        if expanded && self.expandable && self.rendered.is_none() {
            self.rendered = Some(render_tree(value));
        }
        self.expanded = expanded && self.expandable;
    }

    pub fn toggle(&mut self, value: &Value) {
        self.set_expanded(!self.expanded, value);
    }

    /// Lines of the expanded rendering (empty until first expanded).
    pub fn lines(&self) -> &[String] {
        self.rendered.as_deref().unwrap_or(&[])
    }
}

/// Collapsed preview in the shape `{ key: value, ... }`, picking out
/// whichever of the preview keys the record carries; `[ ... ]` for
/// arrays; the scalar itself otherwise.
fn preview_line(value: &Value, preview_keys: &[String]) -> String {
    match value {
        Value::Object(map) => {
            let mut text = String::from("{ ");
            for key in preview_keys {
                if let Some(v) = map.get(key) {
                    text.push_str(&format!("{}: {}, ", key, scalar_text(v)));
                }
            }
            text.push_str("... }");
            text
        }
        Value::Array(_) => "[ ... ]".to_string(),
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", s),
        // Containers nested inside a preview collapse to their shape.
        Value::Object(_) => "{ ... }".to_string(),
        Value::Array(_) => "[ ... ]".to_string(),
    }
}

fn render_tree(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    render_value(value, None, 0, &mut out);
    out
}

fn render_value(value: &Value, key: Option<&str>, depth: usize, out: &mut Vec<String>) {
    let pad = INDENT.repeat(depth);
    let label = |text: &str| match key {
        Some(k) => format!("{}{}: {}", pad, k, text),
        None => format!("{}{}", pad, text),
    };
    match value {
        Value::Object(map) => {
            out.push(label("{"));
            for (k, v) in map {
                render_value(v, Some(k), depth + 1, out);
            }
            out.push(format!("{}}}", pad));
        }
        Value::Array(items) => {
            out.push(label("["));
            for v in items {
                render_value(v, None, depth + 1, out);
            }
            out.push(format!("{}]", pad));
        }
        scalar => out.push(format!("{},", label(&scalar_text(scalar)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{Checkpoint, CursorBias};
    use serde_json::json;

    fn loaded(value: Value) -> LoadedRecord {
        LoadedRecord {
            line: 0,
            value,
            checkpoint: Checkpoint::new(1, 10),
            bias: CursorBias::JustAdvanced,
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_preview_picks_configured_keys() {
        let rec = loaded(json!({
            "severity": "warn",
            "event_name": "disk_full",
            "payload": { "x": 1 }
        }));
        let tree = JsonTree::build(&rec, &keys(&["_t", "severity", "event_name"]));
        assert_eq!(tree.preview(), "{ severity: \"warn\", event_name: \"disk_full\", ... }");
    }

    #[test]
    fn test_preview_without_matching_keys() {
        let rec = loaded(json!({ "other": 1 }));
        let tree = JsonTree::build(&rec, &keys(&["severity"]));
        assert_eq!(tree.preview(), "{ ... }");
    }

    #[test]
    fn test_preview_array_and_scalars() {
        assert_eq!(
            JsonTree::build(&loaded(json!([1, 2, 3])), &[]).preview(),
            "[ ... ]"
        );
        assert_eq!(
            JsonTree::build(&loaded(json!("plain")), &[]).preview(),
            "\"plain\""
        );
        assert_eq!(JsonTree::build(&loaded(json!(null)), &[]).preview(), "null");
        assert_eq!(JsonTree::build(&loaded(json!(42)), &[]).preview(), "42");
    }

    #[test]
    fn test_scalars_are_not_expandable() {
        let rec = loaded(json!("just a string"));
        let mut tree = JsonTree::build(&rec, &[]);
        assert!(!tree.is_expandable());
        tree.toggle(&rec.value);
        assert!(!tree.is_expanded());
    }

    #[test]
    fn test_expanded_tree_rendering() {
        let rec = loaded(json!({
            "b": [1, 2],
            "a": "x",
            "c": { "inner": null }
        }));
        let mut tree = JsonTree::build(&rec, &[]);
        tree.set_expanded(true, &rec.value);

        // Object keys come out sorted.
        let expected: Vec<String> = [
            "{",
            "  a: \"x\",",
            "  b: [",
            "    1,",
            "    2,",
            "  ]",
            "  c: {",
            "    inner: null,",
            "  }",
            "}",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(tree.lines(), expected.as_slice());
    }

    #[test]
    fn test_expand_renders_once_and_collapse_keeps_it() {
        let rec = loaded(json!({ "a": 1 }));
        let mut tree = JsonTree::build(&rec, &[]);
        assert!(tree.lines().is_empty());

        tree.toggle(&rec.value);
        assert!(tree.is_expanded());
        let first = tree.lines().to_vec();

        tree.toggle(&rec.value);
        assert!(!tree.is_expanded());
        // The rendering is kept for the next expand.
        assert_eq!(tree.lines(), first.as_slice());
    }
}
