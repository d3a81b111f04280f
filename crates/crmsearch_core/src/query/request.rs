//! Pagination windows, sort keys and the engine request body.

use super::clause::{BoolClause, Clause};
use crate::error::{CoreError, CoreResult};
use serde_json::{json, Map, Value};

/// Largest `from + size` window the search engine serves.
pub const MAX_RESULT_WINDOW: usize = 10_000;

/// Pagination: skip `from` records, return at most `size`.
///
/// `size: None` is an open tail (`[from:]`). The relational store serves it
/// unbounded; the search engine caps it at [`MAX_RESULT_WINDOW`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub from: usize,
    pub size: Option<usize>,
}

impl Window {
    pub fn new(from: usize, size: usize) -> Self {
        Self {
            from,
            size: Some(size),
        }
    }

    /// Everything from `from` onwards.
    pub fn tail(from: usize) -> Self {
        Self { from, size: None }
    }

    /// Exclusive end offset; `None` for an open tail.
    pub fn stop(&self) -> Option<usize> {
        self.size.map(|size| self.from.saturating_add(size))
    }

    /// Hit count the search engine is asked for.
    pub fn result_size(&self) -> usize {
        self.size.unwrap_or(MAX_RESULT_WINDOW)
    }

    /// The same window with an open tail closed at the engine's limit.
    pub fn bounded(&self) -> Window {
        Window::new(self.from, self.result_size())
    }

    /// Applies a `[start, stop)` slice relative to this window.
    ///
    /// An open `stop` keeps what remains of `parent`, or stays open.
    pub fn compose(parent: Option<Window>, start: usize, stop: Option<usize>) -> Window {
        let base = parent.map_or(0, |window| window.from);
        let parent_stop = parent.and_then(|window| window.stop());
        let from = base.saturating_add(start);

        let requested_stop = stop.map(|stop| base.saturating_add(stop));
        let size = match (requested_stop, parent_stop) {
            (Some(stop), Some(limit)) => Some(stop.min(limit).saturating_sub(from)),
            (Some(stop), None) => Some(stop.saturating_sub(from)),
            (None, Some(limit)) => Some(limit.saturating_sub(from)),
            (None, None) => None,
        };
        Window { from, size }
    }
}

/// One `order_by` key; a leading `-` sorts descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let (field, descending) = match raw.strip_prefix('-') {
            Some(field) => (field, true),
            None => (raw, false),
        };
        if field.trim().is_empty() {
            return Err(CoreError::InvalidLookupValue {
                field: raw.to_string(),
                lookup: "order_by".to_string(),
                message: "sort field must not be empty".to_string(),
            });
        }
        Ok(Self {
            field: field.replace("__", "."),
            descending,
        })
    }

    pub fn to_dict(&self) -> Value {
        if self.descending {
            json!({ self.field.as_str(): { "order": "desc" } })
        } else {
            Value::String(self.field.clone())
        }
    }
}

/// Request body sent to the search engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    /// Scoring clauses (full text).
    pub must: Vec<Clause>,
    /// Structural, non-scoring clauses.
    pub filter: Vec<Clause>,
    pub sort: Vec<SortKey>,
    pub window: Option<Window>,
}

impl SearchRequest {
    /// The request as one clause tree.
    pub fn query(&self) -> Clause {
        if self.must.is_empty() && self.filter.is_empty() {
            return Clause::MatchAll;
        }
        Clause::Bool(BoolClause {
            must: self.must.clone(),
            filter: self.filter.clone(),
            ..BoolClause::default()
        })
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    pub fn to_dict(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query().to_dict());
        if let Some(window) = self.window {
            body.insert("from".to_string(), json!(window.from));
            body.insert("size".to_string(), json!(window.result_size()));
        }
        if !self.sort.is_empty() {
            body.insert(
                "sort".to_string(),
                Value::Array(self.sort.iter().map(SortKey::to_dict).collect()),
            );
        }
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::{SearchRequest, SortKey, Window, MAX_RESULT_WINDOW};
    use crate::query::clause::Clause;
    use serde_json::json;

    #[test]
    fn slices_compose_into_windows() {
        assert_eq!(Window::compose(None, 10, Some(15)), Window::new(10, 5));
        assert_eq!(Window::compose(None, 0, Some(1337)), Window::new(0, 1337));
        assert_eq!(Window::compose(None, 50, None), Window::tail(50));
        assert_eq!(Window::compose(Some(Window::tail(50)), 10, None), Window::tail(60));
        assert_eq!(
            Window::compose(Some(Window::tail(50)), 10, Some(20)),
            Window::new(60, 10)
        );

        let parent = Window::new(10, 20);
        assert_eq!(Window::compose(Some(parent), 5, Some(8)), Window::new(15, 3));
        assert_eq!(Window::compose(Some(parent), 5, None), Window::new(15, 15));
        assert_eq!(Window::compose(Some(parent), 5, Some(100)), Window::new(15, 15));
        assert_eq!(Window::compose(Some(parent), 40, None), Window::new(50, 0));
    }

    #[test]
    fn open_tails_are_capped_only_for_the_engine() {
        let tail = Window::tail(50);
        assert_eq!(tail.stop(), None);
        assert_eq!(tail.bounded(), Window::new(50, MAX_RESULT_WINDOW));

        let request = SearchRequest::default().with_window(tail);
        assert_eq!(
            request.to_dict(),
            json!({"query": {"match_all": {}}, "from": 50, "size": MAX_RESULT_WINDOW})
        );
    }

    #[test]
    fn sort_keys_render_like_the_engine_expects() {
        let key = SortKey::parse("-created").unwrap();
        assert!(key.descending);
        assert_eq!(key.to_dict(), json!({"created": {"order": "desc"}}));
        assert_eq!(SortKey::parse("name").unwrap().to_dict(), json!("name"));
        assert!(SortKey::parse("-").is_err());
    }

    #[test]
    fn empty_request_matches_everything() {
        let request = SearchRequest::default();
        assert_eq!(request.to_dict(), json!({"query": {"match_all": {}}}));

        let request = SearchRequest {
            must: vec![Clause::matching("name", "acme")],
            ..SearchRequest::default()
        }
        .with_window(Window::new(0, 1));
        assert_eq!(
            request.to_dict(),
            json!({"query": {"bool": {"must": [{"match": {"name": "acme"}}]}}, "from": 0, "size": 1})
        );
    }
}
