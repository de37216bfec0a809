//! # Document Codec
//!
//! Converts between on-disk YAML text, generic JSON trees and [`Node`].
//!
//! # Rendering Rules
//! - Mapping keys are written in lexicographic order
//! - Null values, empty strings and containers that end up empty are omitted
//! - Multi-line strings use literal block style
//! - Raw scalars are written plain; everything else is double quoted, with a
//!   core tag for numbers, floats and booleans

use doc_core::{Mapping, Node, Scalar, ScalarKind};
use errors::DocumentError;

/// Parse a YAML document.
///
/// An empty document parses to [`Node::Null`].
pub fn parse(text: &str) -> Result<Node, DocumentError> {
    if text.trim().is_empty() {
        return Ok(Node::Null);
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| DocumentError::Parse {
            reason: e.to_string(),
        })?;

    Ok(from_yaml(value))
}

/// Parse a YAML document from raw bytes.
pub fn parse_bytes(bytes: &[u8]) -> Result<Node, DocumentError> {
    let text = std::str::from_utf8(bytes).map_err(|e| DocumentError::Parse {
        reason: format!("document is not valid UTF-8: {e}"),
    })?;
    parse(text)
}

/// Convert a parsed YAML value into a document tree.
pub fn from_yaml(value: serde_yaml::Value) -> Node {
    use serde_yaml::Value;

    match value {
        Value::Null => Node::Null,
        Value::Bool(b) => Node::boolean(b),
        Value::Number(n) => number_node(n.is_f64(), n.to_string()),
        Value::String(s) => Node::string(s),
        Value::Sequence(items) => Node::Sequence(items.into_iter().map(from_yaml).collect()),
        Value::Mapping(entries) => Node::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (yaml_key(k), from_yaml(v)))
                .collect(),
        ),
        Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let name = tag.trim_start_matches('!');
            let name = name.rsplit(':').next().unwrap_or(name);
            let node = from_yaml(tagged.value);
            match (name, node) {
                ("int", Node::Scalar(s)) => Node::Scalar(Scalar::new(s.value, ScalarKind::Number)),
                ("float", Node::Scalar(s)) => Node::Scalar(Scalar::new(s.value, ScalarKind::Float)),
                ("bool", Node::Scalar(s)) => {
                    Node::Scalar(Scalar::new(s.value, ScalarKind::Boolean))
                }
                ("str", Node::Scalar(s)) => Node::string(s.value),
                (_, node) => node,
            }
        }
    }
}

/// Convert a format-agnostic JSON tree into a document tree.
pub fn from_json(value: &serde_json::Value) -> Node {
    use serde_json::Value;

    match value {
        Value::Null => Node::Null,
        Value::Bool(b) => Node::boolean(*b),
        Value::Number(n) => number_node(!(n.is_i64() || n.is_u64()), n.to_string()),
        Value::String(s) => Node::string(s.clone()),
        Value::Array(items) => Node::Sequence(items.iter().map(from_json).collect()),
        Value::Object(entries) => Node::Mapping(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

fn number_node(is_float: bool, text: String) -> Node {
    let kind = if is_float {
        ScalarKind::Float
    } else {
        ScalarKind::Number
    };
    Node::Scalar(Scalar::new(text, kind).raw())
}

fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value;

    match key {
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Render a document tree as YAML text.
///
/// Returns `None` when nothing is left to write once empty branches are
/// dropped.
///
/// ## Usage
/// ```rust
/// use doc_core::Node;
/// use merge::codec::render;
///
/// let doc = Node::mapping([
///     ("b", Node::string("007")),
///     ("a", Node::number(1)),
///     ("c", Node::mapping([("gone", Node::Null)])),
/// ]);
/// assert_eq!(render(&doc).as_deref(), Some("a: 1\nb: \"007\"\n"));
/// ```
pub fn render(node: &Node) -> Option<String> {
    let pruned = prune(node)?;
    let mut out = String::new();

    match &pruned {
        Node::Mapping(entries) => emit_mapping(&mut out, entries, 0, false),
        Node::Sequence(items) => emit_sequence(&mut out, items, 0, false),
        Node::Scalar(scalar) => write_scalar(&mut out, scalar, 2),
        Node::Null => return None,
    }

    Some(out)
}

/// Drop empty branches and sort mapping keys.
fn prune(node: &Node) -> Option<Node> {
    match node {
        Node::Null => None,
        Node::Scalar(scalar) if scalar.is_empty() => None,
        Node::Scalar(_) => Some(node.clone()),
        Node::Mapping(entries) => {
            let mut kept: Vec<(String, Node)> = entries
                .iter()
                .filter_map(|(k, v)| prune(v).map(|v| (k.clone(), v)))
                .collect();
            if kept.is_empty() {
                return None;
            }
            kept.sort_by(|(a, _), (b, _)| a.cmp(b));
            Some(Node::Mapping(kept.into_iter().collect()))
        }
        Node::Sequence(items) => {
            let kept: Vec<Node> = items.iter().filter_map(prune).collect();
            if kept.is_empty() {
                return None;
            }
            Some(Node::Sequence(kept))
        }
    }
}

fn push_indent(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat_n(' ', indent));
}

fn emit_mapping(out: &mut String, entries: &Mapping, indent: usize, inline_first: bool) {
    for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 || !inline_first {
            push_indent(out, indent);
        }
        write_key(out, key);
        out.push(':');

        match value {
            Node::Scalar(scalar) => {
                out.push(' ');
                write_scalar(out, scalar, indent + 2);
            }
            Node::Mapping(nested) => {
                out.push('\n');
                emit_mapping(out, nested, indent + 2, false);
            }
            Node::Sequence(items) => {
                out.push('\n');
                emit_sequence(out, items, indent + 2, false);
            }
            Node::Null => out.push('\n'),
        }
    }
}

fn emit_sequence(out: &mut String, items: &[Node], indent: usize, inline_first: bool) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 || !inline_first {
            push_indent(out, indent);
        }
        out.push_str("- ");

        match item {
            Node::Scalar(scalar) => write_scalar(out, scalar, indent + 2),
            Node::Mapping(nested) => emit_mapping(out, nested, indent + 2, true),
            Node::Sequence(nested) => emit_sequence(out, nested, indent + 2, true),
            Node::Null => out.push_str("null\n"),
        }
    }
}

fn write_key(out: &mut String, key: &str) {
    if is_plain_key(key) {
        out.push_str(key);
    } else {
        out.push_str(&quote(key));
    }
}

fn is_plain_key(key: &str) -> bool {
    const RESERVED: [&str; 10] = [
        "true", "false", "null", "yes", "no", "on", "off", "y", "n", "~",
    ];

    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !RESERVED.contains(&key.to_ascii_lowercase().as_str())
}

/// Write a scalar after `key: ` or `- `, including the trailing newline.
/// `content_indent` is used for the lines of a literal block.
fn write_scalar(out: &mut String, scalar: &Scalar, content_indent: usize) {
    let multiline = scalar.kind == ScalarKind::MultilineString || scalar.value.contains('\n');

    if multiline && fits_literal_block(&scalar.value) {
        write_literal(out, &scalar.value, content_indent);
        return;
    }

    if scalar.raw && !multiline && !scalar.value.contains(is_unicode_break) {
        out.push_str(&scalar.value);
    } else {
        if let Some(tag) = core_tag(scalar.kind) {
            out.push_str(tag);
            out.push(' ');
        }
        out.push_str(&quote(&scalar.value));
    }
    out.push('\n');
}

fn core_tag(kind: ScalarKind) -> Option<&'static str> {
    match kind {
        ScalarKind::Number => Some("!!int"),
        ScalarKind::Float => Some("!!float"),
        ScalarKind::Boolean => Some("!!bool"),
        ScalarKind::String | ScalarKind::MultilineString => None,
    }
}

/// Line breaks YAML recognises beyond `\n` and `\r`.
fn is_unicode_break(c: char) -> bool {
    matches!(c, '\u{85}' | '\u{2028}' | '\u{2029}')
}

fn fits_literal_block(value: &str) -> bool {
    if value
        .chars()
        .any(|c| (c.is_control() && c != '\n' && c != '\t') || is_unicode_break(c))
    {
        return false;
    }
    match value.lines().find(|line| !line.is_empty()) {
        Some(first) => !first.starts_with(' '),
        None => false,
    }
}

fn write_literal(out: &mut String, value: &str, content_indent: usize) {
    let content = value.strip_suffix('\n');
    let chomping = match content {
        None => "-",
        Some(rest) if rest.ends_with('\n') => "+",
        Some(_) => "",
    };

    out.push('|');
    out.push_str(chomping);
    out.push('\n');

    for line in content.unwrap_or(value).split('\n') {
        if !line.is_empty() {
            push_indent(out, content_indent);
            out.push_str(line);
        }
        out.push('\n');
    }
}

/// Double-quoted YAML scalar. JSON string escapes are valid YAML escapes;
/// the Unicode line breaks JSON leaves alone get YAML's own escapes.
fn quote(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    if !quoted.contains(is_unicode_break) {
        return quoted;
    }
    let mut escaped = String::with_capacity(quoted.len() + 4);
    for c in quoted.chars() {
        match c {
            '\u{85}' => escaped.push_str("\\N"),
            '\u{2028}' => escaped.push_str("\\L"),
            '\u{2029}' => escaped.push_str("\\P"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_document_is_null() {
        assert_eq!(parse("").unwrap(), Node::Null);
        assert_eq!(parse("  \n\n").unwrap(), Node::Null);
    }

    #[test]
    fn test_parse_scalar_kinds() {
        let doc = parse(
            "name: build\ncount: 3\nratio: 0.5\nenabled: true\nnote: |\n  line one\n  line two\n",
        )
        .unwrap();

        let kind = |key: &str| doc.get(key).and_then(Node::as_scalar).map(|s| s.kind);
        assert_eq!(kind("name"), Some(ScalarKind::String));
        assert_eq!(kind("count"), Some(ScalarKind::Number));
        assert_eq!(kind("ratio"), Some(ScalarKind::Float));
        assert_eq!(kind("enabled"), Some(ScalarKind::Boolean));
        assert_eq!(kind("note"), Some(ScalarKind::MultilineString));
        assert_eq!(doc.get("note").and_then(Node::as_str), Some("line one\nline two\n"));
        assert!(doc.get("count").and_then(Node::as_scalar).unwrap().raw);
        assert!(!doc.get("name").and_then(Node::as_scalar).unwrap().raw);
    }

    #[test]
    fn test_parse_tagged_number() {
        let doc = parse("port: !!int \"8080\"\n").unwrap();
        let scalar = doc.get("port").and_then(Node::as_scalar).unwrap();
        assert_eq!(scalar.kind, ScalarKind::Number);
        assert_eq!(scalar.value, "8080");
    }

    #[test]
    fn test_parse_non_string_keys() {
        let doc = parse("1: one\ntrue: yes\n").unwrap();
        assert_eq!(doc.get("1").and_then(Node::as_str), Some("one"));
        assert!(doc.get("true").is_some());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = parse("key: [unclosed").unwrap_err();
        assert!(matches!(err, DocumentError::Parse { .. }));
    }

    #[test]
    fn test_parse_bytes_rejects_invalid_utf8() {
        let err = parse_bytes(&[0xff, 0xfe]).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_from_json() {
        let value = serde_json::json!({
            "jenkins": {"numExecutors": 2, "ratio": 1.5, "secure": true, "msg": "a\nb"},
            "list": ["x", null],
            "gone": null
        });
        let node = from_json(&value);
        let jenkins = node.get("jenkins").unwrap();
        assert_eq!(jenkins.get("numExecutors"), Some(&Node::number(2)));
        assert_eq!(
            jenkins.get("ratio").and_then(Node::as_scalar).map(|s| s.kind),
            Some(ScalarKind::Float)
        );
        assert_eq!(jenkins.get("secure"), Some(&Node::boolean(true)));
        assert_eq!(
            jenkins.get("msg").and_then(Node::as_scalar).map(|s| s.kind),
            Some(ScalarKind::MultilineString)
        );
        assert_eq!(
            node.get("list"),
            Some(&Node::sequence([Node::string("x"), Node::Null]))
        );
        assert_eq!(node.get("gone"), Some(&Node::Null));
    }

    #[test]
    fn test_render_sorts_keys_and_quotes_strings() {
        let doc = Node::mapping([
            ("zeta", Node::string("last")),
            ("alpha", Node::string("123")),
            ("mid", Node::boolean(false)),
        ]);
        assert_eq!(
            render(&doc).unwrap(),
            "alpha: \"123\"\nmid: false\nzeta: \"last\"\n"
        );
    }

    #[test]
    fn test_render_nested_structures() {
        let doc = Node::mapping([
            (
                "jenkins",
                Node::mapping([
                    ("numExecutors", Node::number(2)),
                    (
                        "nodes",
                        Node::sequence([
                            Node::mapping([
                                ("name", Node::string("agent")),
                                ("labels", Node::sequence([Node::string("linux")])),
                            ]),
                            Node::string("plain"),
                        ]),
                    ),
                ]),
            ),
            ("matrix", Node::sequence([Node::sequence([Node::number(1), Node::number(2)])])),
        ]);

        let expected = "\
jenkins:
  nodes:
    - labels:
        - \"linux\"
      name: \"agent\"
    - \"plain\"
  numExecutors: 2
matrix:
  - - 1
    - 2
";
        assert_eq!(render(&doc).unwrap(), expected);
    }

    #[test]
    fn test_render_drops_empty_branches() {
        let doc = Node::mapping([
            ("empty", Node::mapping([("inner", Node::mapping([("x", Node::Null)]))])),
            ("blank", Node::string("")),
            ("list", Node::sequence([Node::Null])),
            ("kept", Node::string("v")),
        ]);
        assert_eq!(render(&doc).unwrap(), "kept: \"v\"\n");

        assert_eq!(render(&Node::mapping([("a", Node::Null)])), None);
        assert_eq!(render(&Node::Null), None);
        assert_eq!(render(&Node::sequence([])), None);
    }

    #[test]
    fn test_render_multiline_literal() {
        let doc = Node::mapping([
            ("clip", Node::string("one\ntwo\n")),
            ("strip", Node::string("one\ntwo")),
            ("keep", Node::string("one\n\n")),
        ]);
        let expected = "\
clip: |
  one
  two
keep: |+
  one

strip: |-
  one
  two
";
        let rendered = render(&doc).unwrap();
        assert_eq!(rendered, expected);
        assert_eq!(parse(&rendered).unwrap(), doc);
    }

    #[test]
    fn test_render_multiline_with_leading_space_falls_back_to_quotes() {
        let doc = Node::mapping([("msg", Node::string("  indented\nline"))]);
        let rendered = render(&doc).unwrap();
        assert_eq!(rendered, "msg: \"  indented\\nline\"\n");
        assert_eq!(parse(&rendered).unwrap(), doc);
    }

    #[test]
    fn test_render_escapes_unicode_line_breaks() {
        let doc = Node::mapping([
            ("nel", Node::string("a\u{85}b")),
            ("ls", Node::string("a\u{2028}b")),
            ("ps", Node::string("a\u{2029}b")),
            ("multi", Node::string("a\nb\u{2028}c")),
        ]);
        let rendered = render(&doc).unwrap();
        assert_eq!(
            rendered,
            "ls: \"a\\Lb\"\nmulti: \"a\\nb\\Lc\"\nnel: \"a\\Nb\"\nps: \"a\\Pb\"\n"
        );
        assert_eq!(parse(&rendered).unwrap(), doc);
    }

    #[test]
    fn test_render_non_raw_number_is_tagged() {
        let doc = Node::mapping([(
            "port",
            Node::Scalar(Scalar::new("8080", ScalarKind::Number)),
        )]);
        assert_eq!(render(&doc).unwrap(), "port: !!int \"8080\"\n");
    }

    #[test]
    fn test_render_raw_string_is_plain() {
        let doc = Node::mapping([("expr", Node::Scalar(Scalar::string("${VAR}").raw()))]);
        assert_eq!(render(&doc).unwrap(), "expr: ${VAR}\n");
    }

    #[test]
    fn test_render_quotes_unsafe_keys() {
        let doc = Node::mapping([
            ("with space", Node::string("a")),
            ("yes", Node::string("b")),
            ("9lives", Node::string("c")),
        ]);
        assert_eq!(
            render(&doc).unwrap(),
            "\"9lives\": \"c\"\n\"with space\": \"a\"\n\"yes\": \"b\"\n"
        );
    }

    #[test]
    fn test_render_top_level_scalar_and_sequence() {
        assert_eq!(render(&Node::string("x")).unwrap(), "\"x\"\n");
        assert_eq!(
            render(&Node::sequence([Node::number(1), Node::string("b")])).unwrap(),
            "- 1\n- \"b\"\n"
        );
    }

    #[test]
    fn test_numeric_looking_string_survives_reload() {
        let doc = Node::mapping([("version", Node::string("1.10"))]);
        let reloaded = parse(&render(&doc).unwrap()).unwrap();
        assert_eq!(reloaded, doc);
    }
}
