//! Template resolution.
//!
//! Step prompts and output declarations use `{{ ... }}` placeholders:
//!
//! - `{{ document }}` / `{{ document.content }}`: scalar substitution and
//!   dotted attribute access into nested structures,
//! - `{{ meters.search(series_name="PM5000") }}`: invocation of a
//!   registered data-source capability with literal or variable arguments,
//! - structured values (lists, maps) serialize to a JSON fragment embedded
//!   in the surrounding string.
//!
//! Rendering is single-pass and side-effect free. [`scan_references`]
//! extracts the same expressions without evaluating them so the workflow
//! validator can check the reference closure up front.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::schema::registry::{CallArg, CapabilityRegistry};

/// Variables visible to a template, in insertion order.
pub type VarMap = serde_json::Map<String, Value>;

/// A parsed `{{ ... }}` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Dotted path lookup, e.g. `document.content`.
    Path(Vec<String>),
    /// Capability call, e.g. `meters.get_by_series("PM5000")`.
    Call {
        source: String,
        op: String,
        args: Vec<ArgExpr>,
    },
}

/// One call argument before evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgExpr {
    /// Named arguments use `column=value` syntax.
    pub name: Option<String>,
    pub value: ValueExpr,
}

/// A literal or a context path used as a call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Literal(Value),
    Path(Vec<String>),
}

/// Render a template against a variable map and optional data sources.
///
/// Fails with [`Error::UnresolvedReference`] naming the first missing
/// variable or operation, [`Error::TemplateSyntax`] for malformed syntax.
pub fn render(
    template: &str,
    vars: &VarMap,
    registry: Option<&CapabilityRegistry>,
) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    for piece in split_template(template)? {
        match piece {
            Piece::Text(text) => output.push_str(text),
            Piece::Placeholder(expr_text) => {
                let expr = parse_expr(expr_text)?;
                let value = eval_expr(&expr, vars, registry)?;
                output.push_str(&format_value(&value));
            }
        }
    }
    Ok(output)
}

/// Extract every expression from a template without evaluating anything.
pub fn scan_references(template: &str) -> Result<Vec<Expr>> {
    let mut refs = Vec::new();
    for piece in split_template(template)? {
        if let Piece::Placeholder(expr_text) = piece {
            refs.push(parse_expr(expr_text)?);
        }
    }
    Ok(refs)
}

enum Piece<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn split_template(template: &str) -> Result<Vec<Piece<'_>>> {
    let mut pieces = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            pieces.push(Piece::Text(&rest[..open]));
        }
        let after_open = &rest[open + 2..];
        let close = after_open.find("}}").ok_or_else(|| {
            Error::TemplateSyntax(format!(
                "unclosed placeholder near: {{{{{}",
                after_open.chars().take(30).collect::<String>()
            ))
        })?;
        pieces.push(Piece::Placeholder(after_open[..close].trim()));
        rest = &after_open[close + 2..];
    }

    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    Ok(pieces)
}

// --- expression parsing ---------------------------------------------------

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    src: &'a str,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            src,
        }
    }

    fn error(&self, msg: &str) -> Error {
        Error::TemplateSyntax(format!("{} in `{{{{ {} }}}}`", msg, self.src))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Result<String> {
        let start = self.pos;
        if !matches!(self.peek(), Some(c) if c.is_ascii_alphabetic() || c == '_') {
            return Err(self.error("expected an identifier"));
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn path(&mut self) -> Result<Vec<String>> {
        let mut segments = vec![self.ident()?];
        while self.peek() == Some('.') {
            self.pos += 1;
            segments.push(self.ident()?);
        }
        Ok(segments)
    }

    fn string_literal(&mut self, quote: char) -> Result<Value> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c) => value.push(c),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) if c == quote => return Ok(Value::String(value)),
                Some(c) => value.push(c),
            }
        }
    }

    fn number_literal(&mut self) -> Result<Value> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        serde_json::from_str(&text).map_err(|_| self.error("malformed number"))
    }

    fn value_expr(&mut self) -> Result<ValueExpr> {
        self.skip_ws();
        match self.peek() {
            Some('"') | Some('\'') => {
                let quote = self.bump().expect("peeked");
                Ok(ValueExpr::Literal(self.string_literal(quote)?))
            }
            Some(c) if c.is_ascii_digit() || c == '-' => {
                Ok(ValueExpr::Literal(self.number_literal()?))
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let path = self.path()?;
                match path[0].as_str() {
                    "true" if path.len() == 1 => Ok(ValueExpr::Literal(Value::Bool(true))),
                    "false" if path.len() == 1 => Ok(ValueExpr::Literal(Value::Bool(false))),
                    "null" if path.len() == 1 => Ok(ValueExpr::Literal(Value::Null)),
                    _ => Ok(ValueExpr::Path(path)),
                }
            }
            _ => Err(self.error("expected a literal or variable argument")),
        }
    }

    fn args(&mut self) -> Result<Vec<ArgExpr>> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            self.skip_ws();
            let value = self.value_expr()?;
            self.skip_ws();

            // `ident=value` marks a named argument; the parsed value must
            // then have been a bare single-segment path.
            let arg = if self.eat('=') {
                let name = match value {
                    ValueExpr::Path(ref segments) if segments.len() == 1 => segments[0].clone(),
                    _ => return Err(self.error("argument name must be a plain identifier")),
                };
                let named_value = self.value_expr()?;
                ArgExpr {
                    name: Some(name),
                    value: named_value,
                }
            } else {
                ArgExpr { name: None, value }
            };
            args.push(arg);

            self.skip_ws();
            if self.eat(')') {
                return Ok(args);
            }
            if !self.eat(',') {
                return Err(self.error("expected `,` or `)` in argument list"));
            }
        }
    }
}

/// Parse the inside of one `{{ ... }}` placeholder.
pub fn parse_expr(src: &str) -> Result<Expr> {
    let mut parser = Parser::new(src);
    parser.skip_ws();
    let path = parser.path()?;
    parser.skip_ws();

    let expr = if parser.eat('(') {
        if path.len() != 2 {
            return Err(parser.error("capability calls take the form source.operation(...)"));
        }
        let args = parser.args()?;
        Expr::Call {
            source: path[0].clone(),
            op: path[1].clone(),
            args,
        }
    } else {
        Expr::Path(path)
    };

    parser.skip_ws();
    if parser.peek().is_some() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(expr)
}

// --- evaluation -----------------------------------------------------------

fn eval_expr(
    expr: &Expr,
    vars: &VarMap,
    registry: Option<&CapabilityRegistry>,
) -> Result<Value> {
    match expr {
        Expr::Path(path) => lookup_path(path, vars),
        Expr::Call { source, op, args } => {
            let registry = registry.ok_or_else(|| {
                Error::UnresolvedReference(format!(
                    "no data sources available for '{}.{}'",
                    source, op
                ))
            })?;

            let mut resolved = Vec::with_capacity(args.len());
            for arg in args {
                let value = match &arg.value {
                    ValueExpr::Literal(v) => v.clone(),
                    ValueExpr::Path(path) => lookup_path(path, vars)?,
                };
                resolved.push(match &arg.name {
                    Some(name) => CallArg::Named(name.clone(), value),
                    None => CallArg::Positional(value),
                });
            }

            let rows = registry.invoke(source, op, &resolved)?;
            Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
        }
    }
}

fn lookup_path(path: &[String], vars: &VarMap) -> Result<Value> {
    let mut current = vars.get(&path[0]).ok_or_else(|| {
        Error::UnresolvedReference(path[0].clone())
    })?;

    for (depth, segment) in path.iter().enumerate().skip(1) {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| {
            Error::UnresolvedReference(path[..=depth].join("."))
        })?;
    }
    Ok(current.clone())
}

/// Convert a resolved value to its textual form.
///
/// Strings embed verbatim; structured values embed as pretty-printed JSON
/// so prompts stay readable for the generation service.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

/// Render every template string inside a nested structure.
///
/// Used for output `data` declarations, where maps and lists may carry
/// template-string leaves.
pub fn render_value(
    value: &Value,
    vars: &VarMap,
    registry: Option<&CapabilityRegistry>,
) -> Result<Value> {
    match value {
        Value::String(s) if s.contains("{{") => {
            // A leaf that is exactly one placeholder keeps its structure
            // instead of flattening to a string.
            let refs = split_template(s)?;
            if let [Piece::Placeholder(expr_text)] = refs.as_slice() {
                let expr = parse_expr(expr_text)?;
                return eval_expr(&expr, vars, registry);
            }
            Ok(Value::String(render(s, vars, registry)?))
        }
        Value::Array(items) => {
            let rendered = items
                .iter()
                .map(|item| render_value(item, vars, registry))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(rendered))
        }
        Value::Object(map) => {
            let mut rendered = serde_json::Map::new();
            for (key, item) in map {
                rendered.insert(key.clone(), render_value(item, vars, registry)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}
