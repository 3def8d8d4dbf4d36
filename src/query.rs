/// The query module compiles the membership DSL into executable predicates and orderings over
/// library entities.
///
/// A query string is a whitespace-separated list of terms, all of which must match:
///
///   - `field:value`: case-insensitive substring match on one field
///   - `field::regex`: regular-expression match on one field
///   - `value`: case-insensitive substring match across the default fields
///   - `field+` / `field-`: not a predicate, an ascending/descending sort key
///
/// The empty string compiles to a match-everything predicate with the identity ordering.
use std::cmp::Ordering;
use std::fmt;

use regex::Regex;

use crate::errors::RepriseExpectedError;

/// Fields a bare term is tested against.
const DEFAULT_MATCH_FIELDS: &[&str] = &["title", "artist", "album"];

#[derive(Debug, Clone, thiserror::Error)]
pub struct QuerySyntaxError {
    query: String,
    index: usize,
    feedback: String,
}

impl fmt::Display for QuerySyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to parse query, invalid syntax:\n\n    {}\n    {}^\n    {}{}",
            self.query,
            " ".repeat(self.index),
            " ".repeat(self.index),
            self.feedback
        )
    }
}

impl From<QuerySyntaxError> for RepriseExpectedError {
    fn from(err: QuerySyntaxError) -> Self {
        RepriseExpectedError::Generic(err.to_string())
    }
}

/// Anything a query can be evaluated against. Implementors expose their fixed fields and
/// flexible attributes through one string-keyed lookup.
pub trait Queryable {
    fn get_field(&self, field: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
pub enum Term {
    Substring { field: String, needle: String },
    Regex { field: String, pattern: Regex },
    Any { needle: String },
}

impl Term {
    fn matches<Q: Queryable>(&self, entity: &Q) -> bool {
        match self {
            Term::Substring { field, needle } => match entity.get_field(field) {
                Some(value) => value.to_lowercase().contains(&needle.to_lowercase()),
                None => false,
            },
            Term::Regex { field, pattern } => match entity.get_field(field) {
                Some(value) => pattern.is_match(&value),
                None => false,
            },
            Term::Any { needle } => {
                let needle = needle.to_lowercase();
                DEFAULT_MATCH_FIELDS
                    .iter()
                    .any(|f| entity.get_field(f).is_some_and(|v| v.to_lowercase().contains(&needle)))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Query {
    /// Matches every entity. The compilation of the empty query string.
    True,
    /// Conjunction of terms from a single query string.
    And(Vec<Term>),
    /// Disjunction of independently compiled sub-queries.
    Or(Vec<Query>),
}

impl Query {
    pub fn matches<Q: Queryable>(&self, entity: &Q) -> bool {
        match self {
            Query::True => true,
            Query::And(terms) => terms.iter().all(|t| t.matches(entity)),
            Query::Or(queries) => queries.iter().any(|q| q.matches(entity)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub ascending: bool,
}

/// A multi-key ordering. An empty key list is the identity sort: it leaves input order alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    pub keys: Vec<SortKey>,
}

impl Sort {
    pub fn is_identity(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn sort<Q: Queryable>(&self, entities: &mut [Q]) {
        if self.is_identity() {
            return;
        }
        entities.sort_by(|a, b| self.compare(a, b));
    }

    fn compare<Q: Queryable>(&self, a: &Q, b: &Q) -> Ordering {
        for key in &self.keys {
            let va = a.get_field(&key.field).unwrap_or_default().to_lowercase();
            let vb = b.get_field(&key.field).unwrap_or_default().to_lowercase();
            let ord = if key.ascending { va.cmp(&vb) } else { vb.cmp(&va) };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn is_field_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Compile one raw query string into a predicate and its (possibly identity) ordering.
pub fn parse_query_string(raw: &str) -> Result<(Query, Sort), QuerySyntaxError> {
    let mut terms = Vec::new();
    let mut keys = Vec::new();

    let mut offset = 0;
    for token in raw.split_whitespace() {
        // Track the byte offset of each token for error feedback.
        let index = raw[offset..].find(token).map(|i| offset + i).unwrap_or(offset);
        offset = index + token.len();

        if let Some((field, pattern)) = token.split_once("::") {
            if !is_field_name(field) {
                return Err(QuerySyntaxError {
                    query: raw.to_string(),
                    index,
                    feedback: "Expected a field name before '::'.".to_string(),
                });
            }
            let pattern = Regex::new(pattern).map_err(|e| QuerySyntaxError {
                query: raw.to_string(),
                index: index + field.len() + 2,
                feedback: format!("Invalid regular expression: {e}"),
            })?;
            terms.push(Term::Regex { field: field.to_string(), pattern });
        } else if let Some((field, needle)) = token.split_once(':') {
            if !is_field_name(field) {
                return Err(QuerySyntaxError {
                    query: raw.to_string(),
                    index,
                    feedback: "Expected a field name before ':'.".to_string(),
                });
            }
            terms.push(Term::Substring {
                field: field.to_string(),
                needle: needle.to_string(),
            });
        } else if let Some(field) = token.strip_suffix('+') {
            if !is_field_name(field) {
                return Err(QuerySyntaxError {
                    query: raw.to_string(),
                    index,
                    feedback: "Expected a field name before the '+' sort suffix.".to_string(),
                });
            }
            keys.push(SortKey { field: field.to_string(), ascending: true });
        } else if let Some(field) = token.strip_suffix('-') {
            if !is_field_name(field) {
                return Err(QuerySyntaxError {
                    query: raw.to_string(),
                    index,
                    feedback: "Expected a field name before the '-' sort suffix.".to_string(),
                });
            }
            keys.push(SortKey { field: field.to_string(), ascending: false });
        } else {
            terms.push(Term::Any { needle: token.to_string() });
        }
    }

    let query = if terms.is_empty() { Query::True } else { Query::And(terms) };
    Ok((query, Sort { keys }))
}

/// Compile one or more raw query strings into a single predicate and ordering.
///
/// Multiple strings compile independently and then combine: predicates with logical OR, sorts
/// by concatenating each sub-query's keys in first-to-last precedence. Sub-queries without a
/// sort contribute nothing; if none define one, the combined sort is the identity.
pub fn compile(queries: &[String]) -> Result<(Query, Sort), QuerySyntaxError> {
    match queries {
        [] => Ok((Query::True, Sort::default())),
        [single] => parse_query_string(single),
        _ => {
            let mut subqueries = Vec::with_capacity(queries.len());
            let mut keys = Vec::new();
            for raw in queries {
                let (query, sort) = parse_query_string(raw)?;
                subqueries.push(query);
                keys.extend(sort.keys);
            }
            Ok((Query::Or(subqueries), Sort { keys }))
        }
    }
}
