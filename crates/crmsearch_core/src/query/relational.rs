//! Backend-neutral description of a relational read.

use super::lookup::Lookup;
use super::request::{SortKey, Window};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Lookup(Lookup),
    /// Negated conjunction of lookups (one `exclude` call).
    Not(Vec<Lookup>),
}

/// What the relational store should count or fetch.
///
/// An empty `ordering` means primary-key order.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationalQuery {
    pub entity: String,
    pub predicates: Vec<Predicate>,
    pub ordering: Vec<SortKey>,
    pub window: Option<Window>,
}

impl RelationalQuery {
    /// Every row of `entity`.
    pub fn all(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            predicates: Vec::new(),
            ordering: Vec::new(),
            window: None,
        }
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }
}
