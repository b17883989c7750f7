//! Parsing of `google.api.http` path templates and their translation into
//! the axum (`matchit`) route syntax.
//!
//! A template is a URL path whose segments may contain `{field}`
//! placeholders, where `field` is a dotted path into the request message and
//! may carry a segment pattern (`{name=shelves/*}`). axum keeps the brace
//! syntax, so `{field}` passes through unchanged; `**` patterns become the
//! trailing catch-all `{*field}`; every other pattern is beyond what the
//! router can match and degrades to a single segment.

use std::fmt::Write as _;

use crate::diag::Diagnostics;

/// One `{field}` placeholder of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// The dotted field path between the braces.
    pub field_path: String,
    /// The segment pattern after `=`, when present.
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Variable(Variable),
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    pieces: Vec<Piece>,
}

impl PathTemplate {
    /// Parse `template`, recording malformed placeholders as warnings.
    pub fn parse(template: &str, diag: &mut Diagnostics) -> Self {
        if template.len() > 1 && template.ends_with('/') {
            diag.warn(format!("path {template} should not end with \"/\""));
        }

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '{' {
                literal.push(ch);
                continue;
            }

            // '{{' is a literal brace.
            if chars.peek() == Some(&'{') {
                chars.next();
                literal.push('{');
                continue;
            }

            let mut inner = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                inner.push(ch);
            }

            if !closed {
                diag.warn(format!("path {template} has an unterminated '{{' placeholder"));
                literal.push('{');
                literal.push_str(&inner);
                continue;
            }

            let (name, pattern) = match inner.split_once('=') {
                Some((name, pattern)) => (name.trim(), Some(pattern.to_owned())),
                None => (inner.trim(), None),
            };

            if name.is_empty() {
                diag.warn(format!("path {template} has a placeholder with an empty field name"));
                continue;
            }

            let variable = Variable {
                field_path: name.to_owned(),
                pattern,
            };

            if pieces
                .iter()
                .any(|piece| matches!(piece, Piece::Variable(existing) if existing.field_path == variable.field_path))
            {
                diag.warn(format!(
                    "path {template} binds the field '{}' more than once",
                    variable.field_path
                ));
            }

            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Variable(variable));
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Self {
            raw: template.to_owned(),
            pieces,
        }
    }

    /// The template as written in the annotation.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The placeholders in template order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.pieces.iter().filter_map(|piece| match piece {
            Piece::Variable(variable) => Some(variable),
            Piece::Literal(_) => None,
        })
    }

    /// Render the axum route pattern for this template.
    pub fn axum_path(&self, diag: &mut Diagnostics) -> String {
        let mut path = String::new();

        for (idx, piece) in self.pieces.iter().enumerate() {
            match piece {
                Piece::Literal(literal) => path.push_str(literal),
                Piece::Variable(variable) => match variable.pattern.as_deref() {
                    None | Some("*") => {
                        let _ = write!(path, "{{{}}}", variable.field_path);
                    }
                    Some(pattern) if pattern.contains("**") => {
                        if idx + 1 == self.pieces.len() && pattern == "**" {
                            let _ = write!(path, "{{*{}}}", variable.field_path);
                        } else {
                            diag.warn(format!(
                                "path {}: the '**' pattern for '{}' is only supported as the final segment; \
                                 matching a single segment instead",
                                self.raw, variable.field_path
                            ));
                            let _ = write!(path, "{{{}}}", variable.field_path);
                        }
                    }
                    Some(pattern) => {
                        diag.warn(format!(
                            "path {}: the router cannot match the pattern '{}' for '{}'; \
                             matching a single segment instead",
                            self.raw, pattern, variable.field_path
                        ));
                        let _ = write!(path, "{{{}}}", variable.field_path);
                    }
                },
            }
        }

        path
    }

    /// Render a `format!` template for the client side, with `{}` in place
    /// of every variable and literal braces escaped.
    pub fn format_string(&self) -> String {
        let mut format = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(literal) => {
                    for ch in literal.chars() {
                        match ch {
                            '{' => format.push_str("{{"),
                            '}' => format.push_str("}}"),
                            _ => format.push(ch),
                        }
                    }
                }
                Piece::Variable(_) => format.push_str("{}"),
            }
        }
        format
    }
}
