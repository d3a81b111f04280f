//! Search-engine clause tree.
//!
//! `to_dict` renders the exact JSON body the engine receives; tests compare
//! against these shapes verbatim.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RangeBound {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeBound {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolClause {
    pub must: Vec<Clause>,
    pub filter: Vec<Clause>,
    pub should: Vec<Clause>,
    pub must_not: Vec<Clause>,
}

impl BoolClause {
    fn to_dict(&self) -> Value {
        let mut body = Map::new();
        for (key, clauses) in [
            ("must", &self.must),
            ("filter", &self.filter),
            ("should", &self.should),
            ("must_not", &self.must_not),
        ] {
            if !clauses.is_empty() {
                body.insert(
                    key.to_string(),
                    Value::Array(clauses.iter().map(Clause::to_dict).collect()),
                );
            }
        }
        json!({ "bool": body })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    MatchAll,
    Term { field: String, value: Value },
    Terms { field: String, values: Vec<Value> },
    Range {
        field: String,
        bounds: Vec<(RangeBound, Value)>,
    },
    Prefix { field: String, value: Value },
    Regexp { field: String, value: Value },
    Exists { field: String },
    /// Full-text match on one field.
    Match { field: String, query: String },
    /// Full-text match across several fields.
    MultiMatch { fields: Vec<String>, query: String },
    Bool(BoolClause),
}

impl Clause {
    pub fn range(
        field: impl Into<String>,
        bounds: impl IntoIterator<Item = (RangeBound, Value)>,
    ) -> Self {
        Self::Range {
            field: field.into(),
            bounds: bounds.into_iter().collect(),
        }
    }

    pub fn matching(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Match {
            field: field.into(),
            query: query.into(),
        }
    }

    pub fn multi_match<I, S>(fields: I, query: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MultiMatch {
            fields: fields.into_iter().map(Into::into).collect(),
            query: query.into(),
        }
    }

    /// `{"bool": {"must_not": [self]}}`, unwrapping a lone negation instead
    /// of nesting a second one.
    pub fn negate(self) -> Self {
        match self {
            Self::Bool(BoolClause {
                must,
                filter,
                should,
                mut must_not,
            }) if must.is_empty() && filter.is_empty() && should.is_empty() && must_not.len() == 1 => {
                must_not.remove(0)
            }
            other => Self::Bool(BoolClause {
                must_not: vec![other],
                ..BoolClause::default()
            }),
        }
    }

    /// True when this clause, or any clause below it, scores free text.
    pub fn is_full_text(&self) -> bool {
        match self {
            Self::Match { .. } | Self::MultiMatch { .. } => true,
            Self::Bool(inner) => [&inner.must, &inner.filter, &inner.should, &inner.must_not]
                .into_iter()
                .flatten()
                .any(Clause::is_full_text),
            _ => false,
        }
    }

    pub fn to_dict(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            Self::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),
            Self::Range { field, bounds } => {
                let bounds = bounds
                    .iter()
                    .map(|(bound, value)| (bound.as_str().to_string(), value.clone()))
                    .collect::<Map<_, _>>();
                json!({ "range": { field.as_str(): bounds } })
            }
            Self::Prefix { field, value } => json!({ "prefix": { field.as_str(): value } }),
            Self::Regexp { field, value } => json!({ "regexp": { field.as_str(): value } }),
            Self::Exists { field } => json!({ "exists": { "field": field } }),
            Self::Match { field, query } => json!({ "match": { field.as_str(): query } }),
            Self::MultiMatch { fields, query } => {
                json!({ "multi_match": { "query": query, "fields": fields } })
            }
            Self::Bool(inner) => inner.to_dict(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BoolClause, Clause, RangeBound};
    use serde_json::json;

    #[test]
    fn leaf_shapes_match_engine_bodies() {
        assert_eq!(
            Clause::range("id", [(RangeBound::Gte, json!(1337))]).to_dict(),
            json!({"range": {"id": {"gte": 1337}}})
        );
        assert_eq!(
            Clause::Terms {
                field: "id".to_string(),
                values: vec![json!(1337), json!(9001)],
            }
            .to_dict(),
            json!({"terms": {"id": [1337, 9001]}})
        );
        assert_eq!(
            Clause::matching("foo", "bar").to_dict(),
            json!({"match": {"foo": "bar"}})
        );
        assert_eq!(
            Clause::multi_match(["foo", "bar"], "test").to_dict(),
            json!({"multi_match": {"query": "test", "fields": ["foo", "bar"]}})
        );
    }

    #[test]
    fn negating_twice_restores_the_clause() {
        let term = Clause::Term {
            field: "id".to_string(),
            value: json!(1),
        };
        let negated = term.clone().negate();
        assert_eq!(
            negated.to_dict(),
            json!({"bool": {"must_not": [{"term": {"id": 1}}]}})
        );
        assert_eq!(negated.negate(), term);
    }

    #[test]
    fn full_text_is_detected_inside_bool() {
        let nested = Clause::Bool(BoolClause {
            should: vec![Clause::matching("name", "acme")],
            ..BoolClause::default()
        });
        assert!(nested.is_full_text());
        assert!(!Clause::Exists {
            field: "name".to_string()
        }
        .is_full_text());
    }
}
