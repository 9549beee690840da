// ABOUTME: The filter predicate language — parse and evaluate against JSON payloads
// ABOUTME: A tagged enum dispatches over the value kind instead of a class hierarchy

//! A tiny predicate DSL: `field<op>value`, evaluated against a JSON
//! payload.

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Comparison operators supported by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    fn apply<T: PartialOrd>(self, lhs: &T, rhs: &T) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }

    const fn parse(token: &str) -> Option<Self> {
        match token.as_bytes() {
            b"=" => Some(Self::Eq),
            b"<" => Some(Self::Lt),
            b"<=" => Some(Self::Le),
            b">" => Some(Self::Gt),
            b">=" => Some(Self::Ge),
            _ => None,
        }
    }
}

/// The parsed right-hand side of a filter, tagged by kind. A tagged
/// enum stands in for a `StringFilter`/`DateFilter` class split while
/// keeping the same evaluation semantics.
#[derive(Debug, Clone)]
enum FilterValue {
    String(String),
    Integer(i64),
    Date(NaiveDate),
}

/// A single parsed predicate. Construct with [`parse_filter`].
#[derive(Debug, Clone)]
pub struct Filter {
    field_path: String,
    operator: Operator,
    value: FilterValue,
    source: String,
}

/// A filter failed to parse.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid filter '{0}'")]
pub struct InvalidFilter(pub String);

fn filter_re() -> &'static Regex {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"^([a-z.\-]+)(=|>=|<=|<|>)(.*)$").ok())
        .as_ref()
        .expect("filter pattern is a compile-time constant")
}

fn parse_value(raw: &str) -> Result<FilterValue, InvalidFilter> {
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Ok(FilterValue::String(raw[1..raw.len() - 1].to_owned()));
    }
    if let Ok(date) = crate::date::parse_iso_date(raw) {
        return Ok(FilterValue::Date(date));
    }
    raw.parse::<i64>()
        .map(FilterValue::Integer)
        .map_err(|_| InvalidFilter(raw.to_owned()))
}

/// Parse a filter source string into a [`Filter`].
///
/// # Errors
///
/// Returns [`InvalidFilter`] if `source` doesn't match the grammar, or
/// its value can't be parsed as a quoted string, ISO date, or integer.
pub fn parse_filter(source: &str) -> Result<Filter, InvalidFilter> {
    let caps = filter_re()
        .captures(source)
        .ok_or_else(|| InvalidFilter(source.to_owned()))?;

    let field_path = caps[1].replace('.', "/");
    let operator =
        Operator::parse(&caps[2]).ok_or_else(|| InvalidFilter(source.to_owned()))?;
    let value = parse_value(&caps[3])?;

    Ok(Filter {
        field_path,
        operator,
        value,
        source: source.to_owned(),
    })
}

impl Filter {
    /// Evaluate this filter against a JSON payload.
    ///
    /// Never fails: a missing path or a type mismatch between the
    /// filter and the field simply evaluates to `false`, per spec §4.1.
    #[must_use]
    pub fn evaluates(&self, payload: &Value) -> bool {
        let Some(field) = pointer_get(payload, &self.field_path) else {
            return false;
        };
        match &self.value {
            FilterValue::String(expected) => field
                .as_str()
                .is_some_and(|actual| self.operator.apply(&actual.to_owned(), expected)),
            FilterValue::Integer(expected) => field
                .as_i64()
                .is_some_and(|actual| self.operator.apply(&actual, expected)),
            FilterValue::Date(expected) => field
                .as_str()
                .and_then(|s| crate::date::parse_iso_date(s).ok())
                .is_some_and(|actual| self.operator.apply(&actual, expected)),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Resolve a slash-separated JSON pointer against a value, tolerating
/// any shape mismatch by returning `None` rather than erroring.
fn pointer_get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let pointer = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };
    value.pointer(&pointer)
}

/// Evaluate every filter in `filters` against `payload`; `true` iff all
/// pass (vacuously true for an empty filter list).
#[must_use]
pub fn all_match(filters: &[Filter], payload: &Value) -> bool {
    filters.iter().all(|f| f.evaluates(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn idempotent_display() {
        for s in ["foo.bar<='ABC'", "foo.bar<=10", "foo=2016-03-24", "x>5"] {
            let f = parse_filter(s).unwrap();
            assert_eq!(f.to_string(), s);
        }
    }

    #[test]
    fn string_filter_missing_field_is_false() {
        let f = parse_filter("foo.bar<='ABC'").unwrap();
        assert!(!f.evaluates(&json!({"foo": {}})));
    }

    #[test]
    fn nested_int_filter() {
        let f = parse_filter("foo.bar<=10").unwrap();
        assert!(f.evaluates(&json!({"foo": {"bar": 10}})));
        assert!(!f.evaluates(&json!({"foo": {"bar": 11}})));
    }

    #[test]
    fn date_equality() {
        let f = parse_filter("foo=2016-03-24").unwrap();
        assert!(f.evaluates(&json!({"foo": "2016-03-24"})));
        assert!(!f.evaluates(&json!({"foo": "2000-01-01"})));
    }

    #[test]
    fn type_mismatch_is_false_not_error() {
        let f = parse_filter("foo=10").unwrap();
        assert!(!f.evaluates(&json!({"foo": "not a number"})));
        let f = parse_filter("foo='bar'").unwrap();
        assert!(!f.evaluates(&json!({"foo": 5})));
    }

    #[test]
    fn parse_rejects_invalid_forms() {
        assert!(parse_filter("INVALID").is_err());
        assert!(parse_filter("foo='bar").is_err());
        assert!(parse_filter("foo=2000-12-32").is_err());
    }

    #[test]
    fn dotted_field_becomes_json_pointer() {
        let f = parse_filter("a.b.c=1").unwrap();
        assert!(f.evaluates(&json!({"a": {"b": {"c": 1}}})));
    }

    #[test]
    fn all_match_is_vacuously_true_for_no_filters() {
        assert!(all_match(&[], &json!({})));
    }
}
