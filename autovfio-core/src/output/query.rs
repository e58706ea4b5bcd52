//! A small yq/jq-style query language over JSON values.
//!
//! Supported expressions:
//!
//! | Expression                 | Meaning                                  |
//! |----------------------------|------------------------------------------|
//! | `.`                        | identity                                 |
//! | `.name`, `."1"`            | field access (`null` when missing)       |
//! | `.[0]`, `.[-1]`            | array index                              |
//! | `.[]`, `.name[]`           | iterate array elements / object values   |
//! | `a \| b`                   | feed every result of `a` into `b`        |
//! | `keys`, `length`           | object keys / size                       |
//! | `select(.x == "v")`, `!=`  | keep inputs where the comparison holds   |
//!
//! Evaluation yields a list of nodes, like yq: `.[]` over an array of
//! three elements produces three results.

use crate::error::{AutoVfioError, Result};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(i64),
    Iterate,
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Path(Vec<Segment>),
    Keys,
    Length,
    Select { path: Vec<Segment>, negate: bool, literal: Value },
}

/// A parsed query, reusable across inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    expression: String,
    filters: Vec<Filter>,
}

impl Query {
    /// Parse an expression; empty input means identity.
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let source = if trimmed.is_empty() { "." } else { trimmed };
        let filters = Parser::new(source).parse_pipeline().map_err(|reason| {
            AutoVfioError::Query { expression: expression.to_string(), reason }
        })?;
        Ok(Self { expression: expression.to_string(), filters })
    }

    /// Run the query against `input`.
    pub fn evaluate(&self, input: &Value) -> Result<Vec<Value>> {
        let mut nodes = vec![input.clone()];
        for filter in &self.filters {
            let mut next = Vec::new();
            for node in &nodes {
                next.extend(apply(filter, node).map_err(|reason| AutoVfioError::Query {
                    expression: self.expression.clone(),
                    reason,
                })?);
            }
            nodes = next;
        }
        Ok(nodes)
    }
}

/// Parse and run `expression` against `input`.
pub fn evaluate(expression: &str, input: &Value) -> Result<Vec<Value>> {
    Query::parse(expression)?.evaluate(input)
}

type EvalResult<T> = std::result::Result<T, String>;

fn apply(filter: &Filter, node: &Value) -> EvalResult<Vec<Value>> {
    match filter {
        Filter::Path(segments) => walk_path(segments, node),
        Filter::Keys => match node {
            Value::Object(map) => {
                Ok(vec![Value::Array(map.keys().cloned().map(Value::String).collect())])
            }
            Value::Array(items) => Ok(vec![Value::Array((0..items.len()).map(Value::from).collect())]),
            other => Err(format!("{} has no keys", type_name(other))),
        },
        Filter::Length => {
            let len = match node {
                Value::Null => 0,
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => return Err(format!("{} has no length", type_name(other))),
            };
            Ok(vec![Value::from(len)])
        }
        Filter::Select { path, negate, literal } => {
            let matched = walk_path(path, node)?.iter().any(|v| values_equal(v, literal));
            Ok(if matched != *negate { vec![node.clone()] } else { Vec::new() })
        }
    }
}

fn walk_path(segments: &[Segment], node: &Value) -> EvalResult<Vec<Value>> {
    let mut current = vec![node.clone()];
    for segment in segments {
        let mut next = Vec::new();
        for value in &current {
            match (segment, value) {
                (Segment::Field(name), Value::Object(map)) => {
                    next.push(map.get(name).cloned().unwrap_or(Value::Null))
                }
                (Segment::Field(_) | Segment::Index(_), Value::Null) => next.push(Value::Null),
                (Segment::Field(name), other) => {
                    return Err(format!("cannot index {} with {:?}", type_name(other), name))
                }
                (Segment::Index(i), Value::Array(items)) => {
                    let idx = if *i < 0 { items.len() as i64 + i } else { *i };
                    let item = usize::try_from(idx).ok().and_then(|idx| items.get(idx));
                    next.push(item.cloned().unwrap_or(Value::Null));
                }
                (Segment::Index(i), other) => {
                    return Err(format!("cannot index {} with {}", type_name(other), i))
                }
                (Segment::Iterate, Value::Array(items)) => next.extend(items.iter().cloned()),
                (Segment::Iterate, Value::Object(map)) => next.extend(map.values().cloned()),
                (Segment::Iterate, other) => {
                    return Err(format!("cannot iterate over {}", type_name(other)))
                }
            }
        }
        current = next;
    }
    Ok(current)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> EvalResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(format!("expected {:?} at offset {}", token, self.pos))
        }
    }

    fn parse_pipeline(&mut self) -> EvalResult<Vec<Filter>> {
        let mut filters = Vec::new();
        loop {
            self.skip_ws();
            filters.push(self.parse_filter()?);
            self.skip_ws();
            if self.peek().is_none() {
                return Ok(filters);
            }
            self.expect("|")?;
        }
    }

    fn parse_filter(&mut self) -> EvalResult<Filter> {
        if self.peek() == Some('.') {
            return Ok(Filter::Path(self.parse_path()?));
        }
        if self.eat("select") {
            self.skip_ws();
            self.expect("(")?;
            self.skip_ws();
            let path = self.parse_path()?;
            self.skip_ws();
            let negate = if self.eat("==") {
                false
            } else if self.eat("!=") {
                true
            } else {
                return Err(format!("expected == or != at offset {}", self.pos));
            };
            self.skip_ws();
            let literal = self.parse_literal()?;
            self.skip_ws();
            self.expect(")")?;
            return Ok(Filter::Select { path, negate, literal });
        }
        let word = self.parse_ident();
        match word.as_str() {
            "keys" => Ok(Filter::Keys),
            "length" => Ok(Filter::Length),
            "" => Err(format!("unexpected input at offset {}", self.pos)),
            other => Err(format!("unknown function {:?}", other)),
        }
    }

    fn parse_path(&mut self) -> EvalResult<Vec<Segment>> {
        self.expect(".")?;
        let mut segments = Vec::new();

        // `.` alone, `.name`, `."quoted"` or `.[...]`
        match self.peek() {
            Some('"') => segments.push(Segment::Field(self.parse_string()?)),
            Some('[') => segments.push(self.parse_bracket()?),
            Some(c) if is_ident_start(c) => segments.push(Segment::Field(self.parse_ident())),
            _ => return Ok(segments),
        }

        loop {
            match self.peek() {
                Some('[') => segments.push(self.parse_bracket()?),
                Some('.') => {
                    self.bump();
                    match self.peek() {
                        Some('"') => segments.push(Segment::Field(self.parse_string()?)),
                        Some('[') => segments.push(self.parse_bracket()?),
                        Some(c) if is_ident_start(c) => {
                            segments.push(Segment::Field(self.parse_ident()))
                        }
                        _ => return Err(format!("expected field name at offset {}", self.pos)),
                    }
                }
                _ => return Ok(segments),
            }
        }
    }

    fn parse_bracket(&mut self) -> EvalResult<Segment> {
        self.expect("[")?;
        self.skip_ws();
        if self.eat("]") {
            return Ok(Segment::Iterate);
        }
        let segment = if self.peek() == Some('"') {
            Segment::Field(self.parse_string()?)
        } else {
            let start = self.pos;
            if self.peek() == Some('-') {
                self.bump();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            let digits = &self.src[start..self.pos];
            Segment::Index(digits.parse().map_err(|_| format!("invalid index {:?}", digits))?)
        };
        self.skip_ws();
        self.expect("]")?;
        Ok(segment)
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn parse_string(&mut self) -> EvalResult<String> {
        self.expect("\"")?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => break,
                },
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err("unterminated string".to_string())
    }

    fn parse_literal(&mut self) -> EvalResult<Value> {
        match self.peek() {
            Some('"') => Ok(Value::String(self.parse_string()?)),
            Some(c) if c == '-' || c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c == '-' || c == '.' || c.is_ascii_digit()) {
                    self.bump();
                }
                let text = &self.src[start..self.pos];
                serde_json::from_str::<serde_json::Number>(text)
                    .map(Value::Number)
                    .map_err(|_| format!("invalid number {:?}", text))
            }
            _ => match self.parse_ident().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                other => Err(format!("invalid literal {:?}", other)),
            },
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
