//! Filter predicate language.
//!
//! A filter is a comma-separated conjunction of `key<op>value` terms:
//!
//! ```text
//! name=~get*,static=false,params>=1
//! ```
//!
//! | key | operators | value |
//! |-----|-----------|-------|
//! | `name` | `=` exact, `!=`, `=~` glob, `~=` regex | text |
//! | `kind` | `=`, `!=` | element kind or CST node kind |
//! | `visibility` | `=`, `!=` | `public`, `private`, ... |
//! | `public`, `private`, `protected` | `=` | `true` / `false` |
//! | `static` | `=` | `true` / `false` |
//! | `params` | `=`, `!=`, `<`, `<=`, `>`, `>=` | count |
//! | `tag` | `=`, `!=` | tag name |
//!
//! Predicates run in declaration order and stop at the first failure.

use std::fmt;

use globset::{Glob, GlobMatcher};
use regex::Regex;
use thiserror::Error;

use crate::elements::{CodeElement, Visibility};

use super::QueryResult;

/// A filter string that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("empty filter term")]
    EmptyTerm,
    #[error("filter term {0:?} has no operator")]
    MissingOperator(String),
    #[error("unknown filter key {0:?}")]
    UnknownKey(String),
    #[error("operator {op:?} is not supported for {key:?}")]
    UnsupportedOperator { key: String, op: String },
    #[error("invalid value {value:?} for {key:?}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Numeric comparison for `params`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    fn compare(self, left: usize, right: usize) -> bool {
        match self {
            Comparator::Eq => left == right,
            Comparator::Ne => left != right,
            Comparator::Lt => left < right,
            Comparator::Le => left <= right,
            Comparator::Gt => left > right,
            Comparator::Ge => left >= right,
        }
    }
}

/// What a predicate checks.
#[derive(Debug, Clone)]
pub enum Test {
    NameExact(String),
    NameGlob(GlobMatcher),
    NameRegex(Regex),
    Kind(String),
    Visibility(Visibility),
    Static,
    Params(Comparator, usize),
    Tag(String),
}

/// One `key<op>value` term.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub test: Test,
    /// Inverts the test (`!=`, `=false`).
    pub negate: bool,
}

/// The fields a predicate can look at.
///
/// Query results carry their own name and node kind; everything else comes
/// from the owning element, and a test that needs an element fails without one.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub name: Option<&'a str>,
    pub kind: Option<&'a str>,
    pub element: Option<&'a CodeElement>,
}

impl<'a> Target<'a> {
    pub fn element(element: &'a CodeElement) -> Self {
        Self {
            name: Some(&element.name),
            kind: Some(&element.kind),
            element: Some(element),
        }
    }

    pub fn result(result: &'a QueryResult, owner: Option<&'a CodeElement>) -> Self {
        Self {
            name: result.name.as_deref().or(owner.map(|e| e.name.as_str())),
            kind: Some(&result.node_kind),
            element: owner,
        }
    }
}

impl Predicate {
    pub fn matches(&self, target: &Target<'_>) -> bool {
        let outcome = match &self.test {
            Test::NameExact(expected) => target.name.map(|n| n == expected),
            Test::NameGlob(glob) => target.name.map(|n| glob.is_match(n)),
            Test::NameRegex(re) => target.name.map(|n| re.is_match(n)),
            Test::Kind(kind) => {
                let own = target.kind.is_some_and(|k| k == kind);
                let element = target.element.is_some_and(|e| &e.kind == kind);
                Some(own || element)
            }
            Test::Visibility(v) => target.element.map(|e| e.visibility == *v),
            Test::Static => target.element.map(CodeElement::is_static),
            Test::Params(cmp, n) => target.element.map(|e| cmp.compare(e.parameters.len(), *n)),
            Test::Tag(tag) => target.element.map(|e| e.has_tag(tag)),
        };
        // Missing data fails the predicate whether or not it is negated
        match outcome {
            Some(hit) => hit != self.negate,
            None => false,
        }
    }
}

const OPERATORS: &[&str] = &["=~", "~=", "!=", "<=", ">=", "=", "<", ">"];

fn parse_bool(key: &str, value: &str) -> Result<bool, FilterError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(FilterError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

/// Split on commas that sit outside `{}`, `[]` and `()`, so regex
/// repetition counts, character classes and glob alternations stay whole.
/// A backslash escapes the next character.
fn split_terms(text: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                terms.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&text[start..]);
    terms
}

fn parse_term(term: &str) -> Result<Predicate, FilterError> {
    let start = term
        .find(['=', '!', '<', '>', '~'])
        .ok_or_else(|| FilterError::MissingOperator(term.to_string()))?;
    let key = term[..start].trim().to_ascii_lowercase();
    let rest = &term[start..];
    let op = OPERATORS
        .iter()
        .find(|op| rest.starts_with(**op))
        .copied()
        .ok_or_else(|| FilterError::MissingOperator(term.to_string()))?;
    let value = rest[op.len()..].trim();

    let unsupported = || FilterError::UnsupportedOperator {
        key: key.clone(),
        op: op.to_string(),
    };
    let invalid = |reason: String| FilterError::InvalidValue {
        key: key.clone(),
        value: value.to_string(),
        reason,
    };
    let equality = |op: &str| match op {
        "=" => Ok(false),
        "!=" => Ok(true),
        _ => Err(unsupported()),
    };

    let predicate = match key.as_str() {
        "name" => match op {
            "=" | "!=" => Predicate {
                test: Test::NameExact(value.to_string()),
                negate: op == "!=",
            },
            "=~" => {
                let glob = Glob::new(value).map_err(|e| invalid(e.to_string()))?;
                Predicate {
                    test: Test::NameGlob(glob.compile_matcher()),
                    negate: false,
                }
            }
            "~=" => {
                let re = Regex::new(value).map_err(|e| invalid(e.to_string()))?;
                Predicate {
                    test: Test::NameRegex(re),
                    negate: false,
                }
            }
            _ => return Err(unsupported()),
        },
        "kind" => Predicate {
            test: Test::Kind(value.to_string()),
            negate: equality(op)?,
        },
        "visibility" => {
            let v = Visibility::parse(value).ok_or_else(|| invalid("unknown visibility".to_string()))?;
            Predicate {
                test: Test::Visibility(v),
                negate: equality(op)?,
            }
        }
        "public" | "private" | "protected" => {
            if op != "=" {
                return Err(unsupported());
            }
            let v = Visibility::parse(&key).ok_or_else(|| invalid("unknown visibility".to_string()))?;
            Predicate {
                test: Test::Visibility(v),
                negate: !parse_bool(&key, value)?,
            }
        }
        "static" => {
            if op != "=" {
                return Err(unsupported());
            }
            Predicate {
                test: Test::Static,
                negate: !parse_bool(&key, value)?,
            }
        }
        "params" => {
            let n: usize = value.parse().map_err(|_| invalid("expected a count".to_string()))?;
            let cmp = match op {
                "=" => Comparator::Eq,
                "!=" => Comparator::Ne,
                "<" => Comparator::Lt,
                "<=" => Comparator::Le,
                ">" => Comparator::Gt,
                ">=" => Comparator::Ge,
                _ => return Err(unsupported()),
            };
            Predicate {
                test: Test::Params(cmp, n),
                negate: false,
            }
        }
        "tag" => Predicate {
            test: Test::Tag(value.to_string()),
            negate: equality(op)?,
        },
        _ => return Err(FilterError::UnknownKey(key)),
    };
    Ok(predicate)
}

/// A parsed filter: predicates joined by AND.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    source: String,
    predicates: Vec<Predicate>,
}

impl FilterChain {
    /// The filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse filter text. Blank text is the empty filter.
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::all());
        }
        let predicates = split_terms(text)
            .into_iter()
            .map(|term| {
                let term = term.trim();
                if term.is_empty() {
                    Err(FilterError::EmptyTerm)
                } else {
                    parse_term(term)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: text.to_string(),
            predicates,
        })
    }

    /// Conjunction of two filters, `self` first.
    pub fn and(mut self, other: FilterChain) -> Self {
        self.source = match (self.source.is_empty(), other.source.is_empty()) {
            (true, _) => other.source,
            (_, true) => self.source,
            _ => format!("{},{}", self.source, other.source),
        };
        self.predicates.extend(other.predicates);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// The text this filter was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, target: &Target<'_>) -> bool {
        self.predicates.iter().all(|p| p.matches(target))
    }

    pub fn matches_element(&self, element: &CodeElement) -> bool {
        self.matches(&Target::element(element))
    }

    pub fn matches_result(&self, result: &QueryResult, owner: Option<&CodeElement>) -> bool {
        self.matches(&Target::result(result, owner))
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for FilterChain {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::elements::{tags, ElementCategory, Span};

    fn element(name: &str, visibility: Visibility, params: usize, is_static: bool) -> CodeElement {
        let mut tag_set = BTreeSet::new();
        if is_static {
            tag_set.insert(tags::STATIC.to_string());
        }
        CodeElement {
            category: ElementCategory::Function,
            name: name.to_string(),
            kind: "method".to_string(),
            signature: String::new(),
            parameters: (0..params).map(|i| format!("p{}", i)).collect(),
            return_type: None,
            parent: None,
            span: Span {
                start_byte: 0,
                end_byte: 1,
                start_line: 1,
                end_line: 1,
            },
            visibility,
            raw_text: "x".to_string(),
            doc: None,
            complexity: Some(1),
            tags: tag_set,
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = FilterChain::parse("  ").unwrap();
        assert!(filter.is_empty());
        assert!(filter.matches_element(&element("a", Visibility::Private, 0, false)));
    }

    #[test]
    fn test_name_operators() {
        let getter = element("get_value", Visibility::Public, 0, false);
        let setter = element("set_value", Visibility::Public, 1, false);

        let exact = FilterChain::parse("name=get_value").unwrap();
        assert!(exact.matches_element(&getter));
        assert!(!exact.matches_element(&setter));

        let glob = FilterChain::parse("name=~get*").unwrap();
        assert!(glob.matches_element(&getter));
        assert!(!glob.matches_element(&setter));

        let regex = FilterChain::parse("name~=^(get|set)_").unwrap();
        assert!(regex.matches_element(&getter));
        assert!(regex.matches_element(&setter));

        let not = FilterChain::parse("name!=get_value").unwrap();
        assert!(!not.matches_element(&getter));
    }

    #[test]
    fn test_commas_inside_patterns() {
        let short = element("aa", Visibility::Public, 1, false);
        let long = element("aaaa", Visibility::Public, 1, false);

        let counted = FilterChain::parse("name~=^a{1,3}$,params=1").unwrap();
        assert_eq!(counted.len(), 2);
        assert!(counted.matches_element(&short));
        assert!(!counted.matches_element(&long));

        let class = FilterChain::parse("name~=^[a,b]+$").unwrap();
        assert!(class.matches_element(&short));

        let alternation = FilterChain::parse("name=~{aa,bb}").unwrap();
        assert!(alternation.matches_element(&short));
        assert!(!alternation.matches_element(&long));

        let escaped = FilterChain::parse(r"name~=^x\,y$").unwrap();
        assert_eq!(escaped.len(), 1);
        assert!(escaped.matches_element(&element("x,y", Visibility::Public, 0, false)));
    }

    #[test]
    fn test_visibility_and_static() {
        let public_static = element("a", Visibility::Public, 0, true);
        let private = element("b", Visibility::Private, 0, false);

        let f = FilterChain::parse("public=true,static=true").unwrap();
        assert!(f.matches_element(&public_static));
        assert!(!f.matches_element(&private));

        let f = FilterChain::parse("private=true").unwrap();
        assert!(f.matches_element(&private));

        let f = FilterChain::parse("static=false").unwrap();
        assert!(f.matches_element(&private));
        assert!(!f.matches_element(&public_static));

        let f = FilterChain::parse("visibility=private").unwrap();
        assert!(f.matches_element(&private));
    }

    #[test]
    fn test_params_comparators() {
        let two = element("f", Visibility::Public, 2, false);
        for (text, expected) in [
            ("params=2", true),
            ("params!=2", false),
            ("params<2", false),
            ("params<=2", true),
            ("params>1", true),
            ("params>=3", false),
        ] {
            let f = FilterChain::parse(text).unwrap();
            assert_eq!(f.matches_element(&two), expected, "{}", text);
        }
    }

    #[test]
    fn test_chain_is_intersection() {
        let a = element("get_a", Visibility::Public, 1, false);
        let b = element("get_b", Visibility::Private, 1, false);
        let c = element("set_c", Visibility::Public, 1, false);
        let items = [a, b, c];

        let first = FilterChain::parse("name=~get*").unwrap();
        let second = FilterChain::parse("public=true").unwrap();
        let both = first.clone().and(second.clone());
        assert_eq!(both.source(), "name=~get*,public=true");

        let chained: Vec<&str> = items
            .iter()
            .filter(|e| both.matches_element(e))
            .map(|e| e.name.as_str())
            .collect();
        let intersection: Vec<&str> = items
            .iter()
            .filter(|e| first.matches_element(e) && second.matches_element(e))
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(chained, vec!["get_a"]);
        assert_eq!(chained, intersection);
    }

    #[test]
    fn test_element_predicates_fail_without_owner() {
        let result = QueryResult {
            capture: "call".to_string(),
            node_kind: "call".to_string(),
            text: "print(x)".to_string(),
            name: Some("print".to_string()),
            span: Span {
                start_byte: 0,
                end_byte: 8,
                start_line: 1,
                end_line: 1,
            },
            element: None,
        };
        assert!(FilterChain::parse("name=print").unwrap().matches_result(&result, None));
        assert!(FilterChain::parse("kind=call").unwrap().matches_result(&result, None));
        assert!(!FilterChain::parse("static=false").unwrap().matches_result(&result, None));
        assert!(!FilterChain::parse("params>=0").unwrap().matches_result(&result, None));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(FilterChain::parse("name"), Err(FilterError::MissingOperator(_))));
        assert!(matches!(FilterChain::parse("color=red"), Err(FilterError::UnknownKey(_))));
        assert!(matches!(
            FilterChain::parse("static>true"),
            Err(FilterError::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            FilterChain::parse("params>=many"),
            Err(FilterError::InvalidValue { .. })
        ));
        assert!(matches!(FilterChain::parse("name=a,,kind=b"), Err(FilterError::EmptyTerm)));
        assert!(FilterChain::parse("name~=(").is_err());
    }
}
