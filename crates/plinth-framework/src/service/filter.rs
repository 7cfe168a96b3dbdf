//! Service property filters.
//!
//! A [`ServiceFilter`] is a predicate over a registration's [`Properties`].
//! Filters are either composed in code or parsed from the LDAP-style
//! syntax used by bundle frameworks:
//!
//! ```text
//! (&(objectclass=codec)(format=png)(!(service.ranking<=0)))
//! ```
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `(k=v)` | equal; `*` in `v` is a wildcard |
//! | `(k=*)` | property present |
//! | `(k~=v)` | equal ignoring case and whitespace |
//! | `(k>=v)`, `(k<=v)` | ordered comparison, numeric when both sides are numbers |
//! | `(&...)`, `(\|...)`, `(!f)` | and, or, not |
//!
//! Keys match case-insensitively. An array property matches when any of its
//! elements does. `\` escapes the next character in a value.
//!
//! # Example
//!
//! ```rust,ignore
//! let filter: ServiceFilter = "(&(format=png)(quality>=80))".parse()?;
//! let also = ServiceFilter::all_of([
//!     ServiceFilter::equals("format", "png"),
//!     ServiceFilter::greater_or_equal("quality", "80"),
//! ]);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use plinth_core::{FrameworkError, Properties};

/// A predicate over service properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceFilter {
    And(Vec<ServiceFilter>),
    Or(Vec<ServiceFilter>),
    Not(Box<ServiceFilter>),
    Present(String),
    Equals { key: String, value: String },
    /// `value` split on its wildcards; `["", "png"]` is `*png`.
    Substring { key: String, parts: Vec<String> },
    Approx { key: String, value: String },
    GreaterOrEqual { key: String, value: String },
    LessOrEqual { key: String, value: String },
}

impl ServiceFilter {
    pub fn present(key: impl Into<String>) -> Self {
        Self::Present(key.into())
    }

    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn approx(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Approx {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn greater_or_equal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::GreaterOrEqual {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn less_or_equal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::LessOrEqual {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn all_of(filters: impl IntoIterator<Item = ServiceFilter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    pub fn any_of(filters: impl IntoIterator<Item = ServiceFilter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    pub fn negate(filter: ServiceFilter) -> Self {
        Self::Not(Box::new(filter))
    }

    /// Evaluates the filter against `properties`.
    pub fn matches(&self, properties: &Properties) -> bool {
        match self {
            Self::And(all) => all.iter().all(|f| f.matches(properties)),
            Self::Or(any) => any.iter().any(|f| f.matches(properties)),
            Self::Not(inner) => !inner.matches(properties),
            Self::Present(key) => lookup(properties, key).is_some(),
            Self::Equals { key, value } => {
                test(properties, key, |v| compare(v, value) == Some(Ordering::Equal))
            }
            Self::Substring { key, parts } => {
                test(properties, key, |v| scalar_text(v).is_some_and(|s| glob(&s, parts)))
            }
            Self::Approx { key, value } => test(properties, key, |v| {
                scalar_text(v).is_some_and(|s| squash(&s) == squash(value))
            }),
            Self::GreaterOrEqual { key, value } => test(properties, key, |v| {
                matches!(compare(v, value), Some(Ordering::Greater | Ordering::Equal))
            }),
            Self::LessOrEqual { key, value } => test(properties, key, |v| {
                matches!(compare(v, value), Some(Ordering::Less | Ordering::Equal))
            }),
        }
    }
}

// ─── Evaluation ───────────────────────────────────────────────────────────────

fn lookup<'a>(properties: &'a Properties, key: &str) -> Option<&'a Value> {
    properties
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

fn test(properties: &Properties, key: &str, pred: impl Fn(&Value) -> bool) -> bool {
    match lookup(properties, key) {
        Some(Value::Array(items)) => items.iter().any(&pred),
        Some(v) => pred(v),
        None => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare(value: &Value, literal: &str) -> Option<Ordering> {
    match value {
        Value::Number(n) => {
            let lhs = n.as_f64()?;
            let rhs: f64 = literal.trim().parse().ok()?;
            lhs.partial_cmp(&rhs)
        }
        Value::Bool(b) => literal
            .trim()
            .eq_ignore_ascii_case(if *b { "true" } else { "false" })
            .then_some(Ordering::Equal),
        Value::String(s) => Some(s.as_str().cmp(literal)),
        _ => None,
    }
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn glob(text: &str, parts: &[String]) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return true;
    };
    let Some(mut remaining) = text.strip_prefix(first.as_str()) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };
    for part in middle {
        match remaining.find(part.as_str()) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last.as_str())
}

// ─── Parsing ──────────────────────────────────────────────────────────────────

impl FromStr for ServiceFilter {
    type Err = FrameworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser {
            src: s,
            chars: s.chars().collect(),
            pos: 0,
        };
        parser.skip_ws();
        let filter = parser.filter()?;
        parser.skip_ws();
        if parser.pos != parser.chars.len() {
            return Err(parser.error("trailing characters after filter"));
        }
        Ok(filter)
    }
}

struct Parser<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> FrameworkError {
        FrameworkError::invalid_filter(self.src, format!("{reason} at offset {}", self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, want: char) -> Result<(), FrameworkError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            _ => Err(self.error(&format!("expected '{want}'"))),
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn filter(&mut self) -> Result<ServiceFilter, FrameworkError> {
        self.expect('(')?;
        self.skip_ws();
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                ServiceFilter::And(self.list()?)
            }
            Some('|') => {
                self.pos += 1;
                ServiceFilter::Or(self.list()?)
            }
            Some('!') => {
                self.pos += 1;
                self.skip_ws();
                ServiceFilter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.skip_ws();
        self.expect(')')?;
        Ok(filter)
    }

    fn list(&mut self) -> Result<Vec<ServiceFilter>, FrameworkError> {
        let mut filters = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() != Some('(') {
                break;
            }
            filters.push(self.filter()?);
        }
        if filters.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(filters)
    }

    fn item(&mut self) -> Result<ServiceFilter, FrameworkError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let key: String = self.chars[start..self.pos].iter().collect();
        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(self.error("missing attribute name"));
        }

        let op = match self.bump() {
            Some('=') => '=',
            Some(c @ ('~' | '<' | '>')) => {
                self.expect('=')?;
                c
            }
            _ => return Err(self.error("expected operator")),
        };

        let (parts, wildcard) = self.value()?;
        let joined = parts.concat();
        Ok(match op {
            '=' if wildcard && parts.iter().all(String::is_empty) && parts.len() == 2 => {
                ServiceFilter::Present(key)
            }
            '=' if wildcard => ServiceFilter::Substring { key, parts },
            '=' => ServiceFilter::Equals { key, value: joined },
            '~' => ServiceFilter::Approx { key, value: joined },
            '>' => ServiceFilter::GreaterOrEqual { key, value: joined },
            _ => ServiceFilter::LessOrEqual { key, value: joined },
        })
    }

    /// Reads a value up to the closing parenthesis, split on unescaped `*`.
    fn value(&mut self) -> Result<(Vec<String>, bool), FrameworkError> {
        let mut parts = vec![String::new()];
        let mut wildcard = false;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated value")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped '(' in value")),
                Some('\\') => {
                    self.pos += 1;
                    let c = self
                        .bump()
                        .ok_or_else(|| self.error("dangling escape"))?;
                    if let Some(last) = parts.last_mut() {
                        last.push(c);
                    }
                }
                Some('*') => {
                    self.pos += 1;
                    wildcard = true;
                    parts.push(String::new());
                }
                Some(c) => {
                    self.pos += 1;
                    if let Some(last) = parts.last_mut() {
                        last.push(c);
                    }
                }
            }
        }
        Ok((parts, wildcard))
    }
}

// ─── Display ──────────────────────────────────────────────────────────────────

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '*' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for ServiceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(all) => {
                f.write_str("(&")?;
                for inner in all {
                    write!(f, "{inner}")?;
                }
                f.write_str(")")
            }
            Self::Or(any) => {
                f.write_str("(|")?;
                for inner in any {
                    write!(f, "{inner}")?;
                }
                f.write_str(")")
            }
            Self::Not(inner) => write!(f, "(!{inner})"),
            Self::Present(key) => write!(f, "({key}=*)"),
            Self::Equals { key, value } => write!(f, "({key}={})", escape(value)),
            Self::Substring { key, parts } => {
                let parts: Vec<String> = parts.iter().map(|p| escape(p)).collect();
                write!(f, "({key}={})", parts.join("*"))
            }
            Self::Approx { key, value } => write!(f, "({key}~={})", escape(value)),
            Self::GreaterOrEqual { key, value } => write!(f, "({key}>={})", escape(value)),
            Self::LessOrEqual { key, value } => write!(f, "({key}<={})", escape(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(pairs: &[(&str, Value)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn parse(s: &str) -> ServiceFilter {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_compound_filter() {
        let filter = parse("(&(k=v)(k2=*) (!(k3>=5)))");
        assert_eq!(
            filter,
            ServiceFilter::all_of([
                ServiceFilter::equals("k", "v"),
                ServiceFilter::present("k2"),
                ServiceFilter::negate(ServiceFilter::greater_or_equal("k3", "5")),
            ])
        );
    }

    #[test]
    fn test_equality_and_presence() {
        let p = props(&[("Format", json!("png")), ("lossless", json!(true))]);
        assert!(parse("(format=png)").matches(&p));
        assert!(!parse("(format=jpeg)").matches(&p));
        assert!(parse("(lossless=TRUE)").matches(&p));
        assert!(parse("(lossless=*)").matches(&p));
        assert!(!parse("(missing=*)").matches(&p));
    }

    #[test]
    fn test_numeric_comparison() {
        let p = props(&[("quality", json!(80))]);
        assert!(parse("(quality>=80)").matches(&p));
        assert!(parse("(quality<=80.5)").matches(&p));
        assert!(!parse("(quality>=81)").matches(&p));
        assert!(parse("(quality=80)").matches(&p));
        assert!(!parse("(quality>=high)").matches(&p));
    }

    #[test]
    fn test_wildcards_and_escapes() {
        let p = props(&[("name", json!("image/png")), ("odd", json!("a*b"))]);
        assert!(parse("(name=image/*)").matches(&p));
        assert!(parse("(name=*png)").matches(&p));
        assert!(parse("(name=im*/*g)").matches(&p));
        assert!(!parse("(name=*jpeg)").matches(&p));
        assert!(parse(r"(odd=a\*b)").matches(&p));
    }

    #[test]
    fn test_array_matches_any_element() {
        let p = props(&[("objectclass", json!(["reader", "writer"]))]);
        assert!(parse("(objectclass=writer)").matches(&p));
        assert!(!parse("(objectclass=deleter)").matches(&p));
    }

    #[test]
    fn test_approx_ignores_case_and_whitespace() {
        let p = props(&[("vendor", json!("Acme  Corp"))]);
        assert!(parse("(vendor~=acmecorp)").matches(&p));
    }

    #[test]
    fn test_or_and_not() {
        let p = props(&[("a", json!(1))]);
        assert!(parse("(|(a=2)(a=1))").matches(&p));
        assert!(!parse("(!(a=1))").matches(&p));
    }

    #[test]
    fn test_invalid_filters() {
        for bad in ["", "k=v", "(k=v", "(=v)", "(&)", "(k=v))", "(k v)", "(k=a(b)"] {
            let err = bad.parse::<ServiceFilter>().unwrap_err();
            assert!(
                matches!(err, FrameworkError::InvalidFilter { .. }),
                "{bad:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_display_parses_back() {
        let src = r"(&(name=im*/*g)(!(odd=a\*b))(q>=3))";
        let filter = parse(src);
        assert_eq!(parse(&filter.to_string()), filter);
    }
}
