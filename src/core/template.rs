//! `$key` template formatter
//!
//! Placeholders are `$identifier` (ASCII letters, digits, `_`) or `${any key}`.
//! Each is replaced by the value found for that key across the context layers,
//! last layer winning. `$$` renders a literal `$`. Placeholders whose key no
//! layer defines are left in the output untouched.

use super::context::{lookup, Context};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { key: String, raw: String },
}

/// A template parsed once and rendered many times
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(pos) = rest.find('$') {
            literal.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(stripped) = after.strip_prefix('$') {
                literal.push('$');
                rest = stripped;
                continue;
            }

            let placeholder = match after.strip_prefix('{') {
                Some(braced) => braced.find('}').map(|end| {
                    let key = &braced[..end];
                    (key, format!("${{{}}}", key), &braced[end + 1..])
                }),
                None => {
                    let len = identifier_len(after);
                    (len > 0).then(|| {
                        let key = &after[..len];
                        (key, format!("${}", key), &after[len..])
                    })
                }
            };

            match placeholder {
                Some((key, raw, remainder)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder {
                        key: key.to_string(),
                        raw,
                    });
                    rest = remainder;
                }
                None => {
                    literal.push('$');
                    rest = after;
                }
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Keys referenced by this template, in order of appearance
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder { key, .. } => Some(key.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, layers: &[&Context]) -> String {
        let mut out = String::with_capacity(self.source.len() + 64);
        self.render_into(&mut out, layers);
        out
    }

    pub fn render_into(&self, out: &mut String, layers: &[&Context]) {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { key, raw } => match lookup(layers, key) {
                    // Writing into a String cannot fail
                    Some(value) => {
                        let _ = write!(out, "{}", value);
                    }
                    None => out.push_str(raw),
                },
            }
        }
    }
}

fn identifier_len(s: &str) -> usize {
    s.char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(s.len(), |(idx, _)| idx)
}

/// Expand `template` against `layers`
pub fn format(template: &str, layers: &[&Context]) -> String {
    Template::parse(template).render(layers)
}
