/// The templates module computes an item's destination path inside a collection from a
/// configured path template.
///
/// Templates are literal text with `$field` / `${field}` placeholders (`$$` escapes a dollar
/// sign). Placeholders resolve against the item's fields and flexible attributes; unknown
/// fields resolve to the empty string, and path components that end up empty are dropped.
/// Every generated component is sanitized for the filesystem.
use std::fmt;
use std::path::PathBuf;

use crate::common::{sanitize_dirname, sanitize_filename};
use crate::errors::RepriseExpectedError;
use crate::query::{parse_query_string, Query, Queryable};

/// Template applied when the configuration does not provide one.
pub const DEFAULT_PATH_TEMPLATE: &str = "$artist/$album/$title";

#[derive(Debug, Clone, thiserror::Error)]
pub struct InvalidPathTemplateError {
    template: String,
    message: String,
}

impl fmt::Display for InvalidPathTemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid path template '{}': {}", self.template, self.message)
    }
}

impl From<InvalidPathTemplateError> for RepriseExpectedError {
    fn from(err: InvalidPathTemplateError) -> Self {
        RepriseExpectedError::Generic(err.to_string())
    }
}

#[derive(Debug, Clone)]
enum Piece {
    Literal(String),
    Field(String),
}

/// Path components are split at the template level, so a `/` inside a rendered field value can
/// never create a directory; it is sanitized away instead.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: String,
    components: Vec<Vec<Piece>>,
}

fn is_field_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_component(raw: &str, component: &str) -> Result<Vec<Piece>, InvalidPathTemplateError> {
    let err = |message: &str| InvalidPathTemplateError {
        template: raw.to_string(),
        message: message.to_string(),
    };

    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = component.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            literal.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                literal.push('$');
            }
            Some('{') => {
                chars.next();
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) if is_field_char(c) => field.push(c),
                        _ => return Err(err("unterminated ${...} placeholder")),
                    }
                }
                if field.is_empty() {
                    return Err(err("empty ${} placeholder"));
                }
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(Piece::Field(field));
            }
            Some(c) if is_field_char(*c) => {
                let mut field = String::new();
                while let Some(c) = chars.peek() {
                    if is_field_char(*c) {
                        field.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(Piece::Field(field));
            }
            _ => return Err(err("'$' must be followed by a field name, '{', or '$'")),
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    Ok(pieces)
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Result<PathTemplate, InvalidPathTemplateError> {
        if raw.trim().is_empty() {
            return Err(InvalidPathTemplateError {
                template: raw.to_string(),
                message: "template is empty".to_string(),
            });
        }

        let mut components = Vec::new();
        for component in raw.split('/') {
            components.push(parse_component(raw, component)?);
        }
        Ok(PathTemplate { raw: raw.to_string(), components })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Render the template against `entity` into a relative path. Components that render
    /// empty are dropped. The result carries no file extension; the caller appends one.
    pub fn evaluate<Q: Queryable>(&self, entity: &Q) -> PathBuf {
        let mut rendered: Vec<String> = Vec::with_capacity(self.components.len());
        for pieces in &self.components {
            let mut component = String::new();
            for piece in pieces {
                match piece {
                    Piece::Literal(s) => component.push_str(s),
                    Piece::Field(f) => component.push_str(&entity.get_field(f).unwrap_or_default()),
                }
            }
            if !component.trim().is_empty() {
                rendered.push(component);
            }
        }

        let mut path = PathBuf::new();
        for (i, component) in rendered.iter().enumerate() {
            let sanitized = if i + 1 == rendered.len() {
                sanitize_filename(component, true)
            } else {
                sanitize_dirname(component, true)
            };
            path.push(sanitized);
        }
        path
    }
}

/// The per-collection template table: ordered (query, template) pairs consulted first-to-last,
/// with a default applied when nothing matches.
#[derive(Debug, Clone)]
pub struct PathTemplateConfig {
    pairs: Vec<(Query, PathTemplate)>,
    default: PathTemplate,
}

impl PathTemplateConfig {
    /// Build from raw `(query, template)` configuration pairs. The `default` key, when
    /// present, becomes the fallback template rather than a queried pair.
    pub fn parse(pairs: &[(String, String)]) -> Result<PathTemplateConfig, RepriseExpectedError> {
        let mut compiled = Vec::new();
        let mut default = None;
        for (query, template) in pairs {
            let template = PathTemplate::parse(template)?;
            if query == "default" {
                default = Some(template);
            } else {
                let (query, _) = parse_query_string(query)?;
                compiled.push((query, template));
            }
        }
        let default = match default {
            Some(t) => t,
            None => PathTemplate::parse(DEFAULT_PATH_TEMPLATE).map_err(RepriseExpectedError::from)?,
        };
        Ok(PathTemplateConfig { pairs: compiled, default })
    }

    pub fn with_default() -> PathTemplateConfig {
        PathTemplateConfig {
            pairs: Vec::new(),
            // The built-in default template always parses.
            default: PathTemplate::parse(DEFAULT_PATH_TEMPLATE).unwrap(),
        }
    }

    pub fn template_for<Q: Queryable>(&self, entity: &Q) -> &PathTemplate {
        for (query, template) in &self.pairs {
            if query.matches(entity) {
                return template;
            }
        }
        &self.default
    }

    /// Destination relative path for `entity`: first matching template, rendered.
    pub fn destination<Q: Queryable>(&self, entity: &Q) -> PathBuf {
        self.template_for(entity).evaluate(entity)
    }
}
