//! Clause evaluation against stored JSON documents.
//!
//! # Invariants
//! - Field paths are dotted; arrays met along a path are flattened.
//! - `regexp` patterns match the whole value, like the engine they stand in for.
//! - Full-text matching is case-insensitive and scores by matched query tokens.

use super::{EngineError, EngineResult};
use crate::query::{BoolClause, Clause, RangeBound, SortKey};
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

/// A clause tree with its patterns compiled once per search.
pub(crate) enum Matcher {
    All,
    Term {
        path: String,
        value: Value,
    },
    Terms {
        path: String,
        values: Vec<Value>,
    },
    Range {
        path: String,
        bounds: Vec<(RangeBound, Value)>,
    },
    Prefix {
        path: String,
        prefix: String,
    },
    Regexp {
        path: String,
        regex: Regex,
    },
    Exists {
        path: String,
    },
    Text {
        paths: Vec<String>,
        tokens: Vec<String>,
    },
    Bool {
        must: Vec<Matcher>,
        filter: Vec<Matcher>,
        should: Vec<Matcher>,
        must_not: Vec<Matcher>,
    },
}

impl Matcher {
    pub(crate) fn compile(clause: &Clause) -> EngineResult<Self> {
        Ok(match clause {
            Clause::MatchAll => Self::All,
            Clause::Term { field, value } => Self::Term {
                path: field.clone(),
                value: value.clone(),
            },
            Clause::Terms { field, values } => Self::Terms {
                path: field.clone(),
                values: values.clone(),
            },
            Clause::Range { field, bounds } => Self::Range {
                path: field.clone(),
                bounds: bounds.clone(),
            },
            Clause::Prefix { field, value } => Self::Prefix {
                path: field.clone(),
                prefix: expect_text(field, "prefix", value)?,
            },
            Clause::Regexp { field, value } => {
                let pattern = expect_text(field, "regexp", value)?;
                let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
                    EngineError::InvalidQuery(format!("regexp on `{field}`: {err}"))
                })?;
                Self::Regexp {
                    path: field.clone(),
                    regex,
                }
            }
            Clause::Exists { field } => Self::Exists {
                path: field.clone(),
            },
            Clause::Match { field, query } => Self::Text {
                paths: vec![field.clone()],
                tokens: tokenize(query),
            },
            Clause::MultiMatch { fields, query } => Self::Text {
                paths: fields.clone(),
                tokens: tokenize(query),
            },
            Clause::Bool(BoolClause {
                must,
                filter,
                should,
                must_not,
            }) => Self::Bool {
                must: compile_all(must)?,
                filter: compile_all(filter)?,
                should: compile_all(should)?,
                must_not: compile_all(must_not)?,
            },
        })
    }

    /// Score of `doc`, or `None` when it does not match.
    pub(crate) fn score(&self, doc: &Value) -> Option<f64> {
        match self {
            Self::All => Some(1.0),
            Self::Term { path, value } => {
                matched(values_at(doc, path).into_iter().any(|found| loose_eq(found, value)))
            }
            Self::Terms { path, values } => matched(
                values_at(doc, path)
                    .into_iter()
                    .any(|found| values.iter().any(|value| loose_eq(found, value))),
            ),
            Self::Range { path, bounds } => matched(values_at(doc, path).into_iter().any(|found| {
                bounds.iter().all(|(bound, limit)| {
                    match compare(found, limit) {
                        Some(ordering) => match bound {
                            RangeBound::Gt => ordering == Ordering::Greater,
                            RangeBound::Gte => ordering != Ordering::Less,
                            RangeBound::Lt => ordering == Ordering::Less,
                            RangeBound::Lte => ordering != Ordering::Greater,
                        },
                        None => false,
                    }
                })
            })),
            Self::Prefix { path, prefix } => matched(
                values_at(doc, path)
                    .into_iter()
                    .filter_map(Value::as_str)
                    .any(|text| text.starts_with(prefix.as_str())),
            ),
            Self::Regexp { path, regex } => matched(
                values_at(doc, path)
                    .into_iter()
                    .filter_map(Value::as_str)
                    .any(|text| regex.is_match(text)),
            ),
            Self::Exists { path } => matched(
                values_at(doc, path)
                    .into_iter()
                    .any(|value| !value.is_null()),
            ),
            Self::Text { paths, tokens } => {
                let best = paths
                    .iter()
                    .map(|path| text_score(doc, path, tokens))
                    .fold(0.0_f64, f64::max);
                (best > 0.0).then_some(best)
            }
            Self::Bool {
                must,
                filter,
                should,
                must_not,
            } => {
                let mut total = 0.0;
                for clause in must {
                    total += clause.score(doc)?;
                }
                for clause in filter {
                    clause.score(doc)?;
                }
                if must_not.iter().any(|clause| clause.score(doc).is_some()) {
                    return None;
                }
                let should_scores = should
                    .iter()
                    .filter_map(|clause| clause.score(doc))
                    .collect::<Vec<_>>();
                if must.is_empty() && filter.is_empty() && !should.is_empty() && should_scores.is_empty() {
                    return None;
                }
                total += should_scores.iter().sum::<f64>();
                Some(total)
            }
        }
    }
}

fn compile_all(clauses: &[Clause]) -> EngineResult<Vec<Matcher>> {
    clauses.iter().map(Matcher::compile).collect()
}

fn expect_text(field: &str, kind: &str, value: &Value) -> EngineResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| EngineError::InvalidQuery(format!("{kind} on `{field}` needs a string")))
}

fn matched(hit: bool) -> Option<f64> {
    hit.then_some(0.0)
}

/// Values found at a dotted `path`, flattening arrays at every hop.
pub(crate) fn values_at<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for hop in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            collect_hop(value, hop, &mut next);
        }
        current = next;
    }
    current.into_iter().flat_map(flatten).collect()
}

fn collect_hop<'a>(value: &'a Value, hop: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(hop) {
                out.push(found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_hop(item, hop, out);
            }
        }
        _ => {}
    }
}

fn flatten(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(flatten).collect(),
        other => vec![other],
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::Number(b)) | (Value::Number(b), Value::String(a)) => {
            a.parse::<f64>().ok() == b.as_f64()
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// A multi-field such as `name.text` is stored under its parent `name`.
fn text_values<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let values = values_at(doc, path);
    match path.rsplit_once('.') {
        Some((parent, _)) if values.is_empty() => values_at(doc, parent),
        _ => values,
    }
}

fn text_score(doc: &Value, path: &str, tokens: &[String]) -> f64 {
    let haystack = text_values(doc, path)
        .into_iter()
        .filter_map(|value| match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .flat_map(|text| tokenize(&text))
        .collect::<Vec<_>>();
    tokens
        .iter()
        .filter(|token| haystack.contains(token))
        .count() as f64
}

/// Orders `(id, score, source)` triples by sort keys, or by score when none
/// are given; ties fall back to ascending id.
pub(crate) fn sort_hits(hits: &mut [(String, f64, Value)], sort: &[SortKey]) {
    hits.sort_by(|left, right| {
        let primary = if sort.is_empty() {
            right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal)
        } else {
            sort.iter()
                .map(|key| compare_sort_key(&left.2, &right.2, key))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        };
        primary.then_with(|| compare_ids(&left.0, &right.0))
    });
}

fn compare_sort_key(left: &Value, right: &Value, key: &SortKey) -> Ordering {
    let left = values_at(left, &key.field).into_iter().find(|value| !value.is_null());
    let right = values_at(right, &key.field).into_iter().find(|value| !value.is_null());
    match (left, right) {
        (Some(a), Some(b)) => {
            let ordering = compare(a, b).unwrap_or(Ordering::Equal);
            if key.descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
        // Missing values sort last in both directions.
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_ids(left: &str, right: &str) -> Ordering {
    match (left.parse::<i64>(), right.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => left.cmp(right),
    }
}

#[cfg(test)]
mod tests {
    use super::{sort_hits, values_at, Matcher};
    use crate::query::{Clause, SortKey};
    use serde_json::{json, Value};

    fn account() -> Value {
        json!({
            "id": 4,
            "name": "Acme Trading",
            "created": "2017-03-01T10:00:00",
            "phone_numbers": [{"number": "+31 20 123"}, {"number": "+31 10 456"}],
            "assigned_to": {"id": 9, "full_name": "Ann Smith"},
            "status": null
        })
    }

    fn score(clause: Clause) -> Option<f64> {
        Matcher::compile(&clause).expect("compile").score(&account())
    }

    #[test]
    fn dotted_paths_flatten_arrays() {
        let doc = account();
        let numbers = values_at(&doc, "phone_numbers.number");
        assert_eq!(numbers, vec![&json!("+31 20 123"), &json!("+31 10 456")]);
        assert!(values_at(&doc, "missing.path").is_empty());
    }

    #[test]
    fn structural_clauses_match_without_scoring() {
        let term = Clause::Term {
            field: "assigned_to.id".to_string(),
            value: json!(9),
        };
        assert_eq!(score(term), Some(0.0));

        let regexp = Clause::Regexp {
            field: "name".to_string(),
            value: json!("Acme"),
        };
        assert_eq!(score(regexp), None);

        let exists = Clause::Exists {
            field: "status".to_string(),
        };
        assert_eq!(score(exists.clone()), None);
        assert_eq!(score(exists.negate()), Some(0.0));
    }

    #[test]
    fn full_text_scores_matched_tokens() {
        assert_eq!(score(Clause::matching("name", "acme trading")), Some(2.0));
        assert_eq!(score(Clause::matching("name", "globex")), None);
        assert_eq!(score(Clause::matching("name.text", "trading")), Some(1.0));
        assert_eq!(
            score(Clause::multi_match(["name", "assigned_to.full_name"], "ann")),
            Some(1.0)
        );
    }

    #[test]
    fn invalid_regexp_is_rejected_at_compile() {
        let clause = Clause::Regexp {
            field: "name".to_string(),
            value: json!("("),
        };
        assert!(Matcher::compile(&clause).is_err());
    }

    #[test]
    fn hits_sort_by_key_then_id() {
        let mut hits = vec![
            ("10".to_string(), 1.0, json!({"name": "b"})),
            ("2".to_string(), 1.0, json!({"name": "b"})),
            ("3".to_string(), 5.0, json!({"name": "a"})),
            ("4".to_string(), 1.0, json!({})),
        ];
        sort_hits(&mut hits, &[SortKey::parse("-name").unwrap()]);
        let ids = hits.iter().map(|hit| hit.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["2", "10", "3", "4"]);

        sort_hits(&mut hits, &[]);
        let ids = hits.iter().map(|hit| hit.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["3", "2", "4", "10"]);
    }
}
