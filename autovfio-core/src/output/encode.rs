//! Machine-readable encoders for query results.

use crate::error::{AutoVfioError, Result};
use serde_json::{Map, Value};
use std::fmt::Write as _;

/// Turns a list of query result nodes into text.
pub trait Encoder {
    /// Format name used in error messages.
    fn name(&self) -> &'static str;

    fn encode(&self, nodes: &[Value]) -> Result<String>;
}

fn encode_error(format: &str, reason: impl ToString) -> AutoVfioError {
    AutoVfioError::Encode { format: format.to_string(), reason: reason.to_string() }
}

/// Scalars render bare; containers are not scalars.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Flatten nested containers into `(path segments, leaf)` pairs.
fn flatten<'v>(value: &'v Value, prefix: &mut Vec<String>, out: &mut Vec<(Vec<String>, &'v Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                prefix.push(key.clone());
                flatten(child, prefix, out);
                prefix.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                prefix.push(index.to_string());
                flatten(child, prefix, out);
                prefix.pop();
            }
        }
        leaf => out.push((prefix.clone(), leaf)),
    }
}

pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, nodes: &[Value]) -> Result<String> {
        let mut out = String::new();
        for node in nodes {
            let text = serde_json::to_string_pretty(node).map_err(|e| encode_error(self.name(), e))?;
            out.push_str(&text);
            out.push('\n');
        }
        Ok(out)
    }
}

pub struct YamlEncoder;

impl Encoder for YamlEncoder {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn encode(&self, nodes: &[Value]) -> Result<String> {
        let mut out = String::new();
        for (index, node) in nodes.iter().enumerate() {
            if index > 0 {
                out.push_str("---\n");
            }
            match node {
                Value::String(s) => {
                    out.push_str(s);
                    out.push('\n');
                }
                other => {
                    let text = serde_yaml::to_string(other).map_err(|e| encode_error(self.name(), e))?;
                    out.push_str(&text);
                }
            }
        }
        Ok(out)
    }
}

pub struct TomlEncoder;

impl TomlEncoder {
    fn to_toml(&self, value: &Value) -> Result<toml::Value> {
        Ok(match value {
            Value::Null => return Err(encode_error(self.name(), "null values cannot be encoded")),
            Value::Bool(b) => toml::Value::Boolean(*b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => toml::Value::Integer(i),
                (None, Some(f)) => toml::Value::Float(f),
                _ => return Err(encode_error(self.name(), format!("number {} out of range", n))),
            },
            Value::String(s) => toml::Value::String(s.clone()),
            Value::Array(items) => {
                toml::Value::Array(items.iter().map(|v| self.to_toml(v)).collect::<Result<_>>()?)
            }
            Value::Object(map) => toml::Value::Table(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.to_toml(v)?)))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

impl Encoder for TomlEncoder {
    fn name(&self) -> &'static str {
        "toml"
    }

    fn encode(&self, nodes: &[Value]) -> Result<String> {
        let mut out = String::new();
        for node in nodes {
            let table = match self.to_toml(node)? {
                toml::Value::Table(table) => table,
                _ => return Err(encode_error(self.name(), "only objects can be encoded as a document")),
            };
            let text = toml::to_string(&table).map_err(|e| encode_error(self.name(), e))?;
            out.push_str(&text);
        }
        Ok(out)
    }
}

pub struct XmlEncoder;

impl XmlEncoder {
    fn escape(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&apos;"),
                c => out.push(c),
            }
        }
        out
    }

    /// Element names may not start with a digit, so numeric group ids get a prefix.
    fn element_name(key: &str) -> String {
        let mut name: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
            .collect();
        if !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
            name.insert(0, '_');
        }
        name
    }

    fn write_element(out: &mut String, name: &str, value: &Value, depth: usize) {
        let indent = "  ".repeat(depth);
        match value {
            Value::Array(items) => {
                for item in items {
                    Self::write_element(out, name, item, depth);
                }
            }
            Value::Object(map) => {
                let _ = writeln!(out, "{}<{}>", indent, name);
                Self::write_children(out, map, depth + 1);
                let _ = writeln!(out, "{}</{}>", indent, name);
            }
            leaf => {
                let text = scalar_text(leaf).unwrap_or_default();
                let _ = writeln!(out, "{}<{}>{}</{}>", indent, name, Self::escape(&text), name);
            }
        }
    }

    fn write_children(out: &mut String, map: &Map<String, Value>, depth: usize) {
        for (key, child) in map {
            Self::write_element(out, &Self::element_name(key), child, depth);
        }
    }
}

impl Encoder for XmlEncoder {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn encode(&self, nodes: &[Value]) -> Result<String> {
        let mut out = String::new();
        for node in nodes {
            match node {
                Value::Object(map) => Self::write_children(&mut out, map, 0),
                other => Self::write_element(&mut out, "item", other, 0),
            }
        }
        Ok(out)
    }
}

pub struct PropsEncoder;

impl Encoder for PropsEncoder {
    fn name(&self) -> &'static str {
        "props"
    }

    fn encode(&self, nodes: &[Value]) -> Result<String> {
        let mut out = String::new();
        for node in nodes {
            let mut leaves = Vec::new();
            flatten(node, &mut Vec::new(), &mut leaves);
            for (path, leaf) in leaves {
                let text = scalar_text(leaf).unwrap_or_default();
                if path.is_empty() {
                    let _ = writeln!(out, "{}", text);
                } else {
                    let _ = writeln!(out, "{} = {}", path.join("."), text);
                }
            }
        }
        Ok(out)
    }
}

pub struct ShellEncoder;

impl ShellEncoder {
    fn variable_name(path: &[String]) -> String {
        let mut name: String = path
            .join("_")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            name.insert(0, '_');
        }
        name
    }

    fn quote(text: &str) -> String {
        format!("'{}'", text.replace('\'', r"'\''"))
    }
}

impl Encoder for ShellEncoder {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn encode(&self, nodes: &[Value]) -> Result<String> {
        let mut out = String::new();
        for node in nodes {
            let mut leaves = Vec::new();
            flatten(node, &mut Vec::new(), &mut leaves);
            for (path, leaf) in leaves {
                let text = scalar_text(leaf).unwrap_or_default();
                let _ = writeln!(out, "{}={}", Self::variable_name(&path), Self::quote(&text));
            }
        }
        Ok(out)
    }
}

/// CSV or TSV depending on the delimiter.
pub struct CsvEncoder {
    pub delimiter: char,
}

impl CsvEncoder {
    fn field(&self, text: &str) -> String {
        if text.contains(self.delimiter) || text.contains(['"', '\n', '\r']) {
            format!("\"{}\"", text.replace('"', "\"\""))
        } else {
            text.to_string()
        }
    }

    fn row<'t>(&self, cells: impl Iterator<Item = &'t str>) -> String {
        let cells: Vec<String> = cells.map(|c| self.field(c)).collect();
        cells.join(&self.delimiter.to_string())
    }

    fn cell(&self, value: &Value) -> Result<String> {
        scalar_text(value).ok_or_else(|| encode_error(self.name(), "nested values cannot be placed in a cell"))
    }
}

impl Encoder for CsvEncoder {
    fn name(&self) -> &'static str {
        if self.delimiter == '\t' {
            "tsv"
        } else {
            "csv"
        }
    }

    fn encode(&self, nodes: &[Value]) -> Result<String> {
        // A single array node is the usual case: one row per element.
        let rows: Vec<&Value> = match nodes {
            [Value::Array(items)] => items.iter().collect(),
            _ => nodes.iter().collect(),
        };

        let mut out = String::new();
        let headers: Option<Vec<String>> = match rows.first() {
            Some(Value::Object(map)) => Some(map.keys().cloned().collect()),
            _ => None,
        };
        if let Some(headers) = &headers {
            out.push_str(&self.row(headers.iter().map(String::as_str)));
            out.push('\n');
        }

        for row in rows {
            let cells = match (row, &headers) {
                (Value::Object(map), Some(headers)) => headers
                    .iter()
                    .map(|h| self.cell(map.get(h).unwrap_or(&Value::Null)))
                    .collect::<Result<Vec<_>>>()?,
                (Value::Array(items), _) => {
                    items.iter().map(|v| self.cell(v)).collect::<Result<Vec<_>>>()?
                }
                (Value::Object(_), None) => {
                    return Err(encode_error(self.name(), "mixed objects and scalars"))
                }
                (scalar, _) => vec![self.cell(scalar)?],
            };
            out.push_str(&self.row(cells.iter().map(String::as_str)));
            out.push('\n');
        }
        Ok(out)
    }
}
