//! Attribute protocol between domain objects and the document layer.
//!
//! # Responsibility
//! - Let field extraction read named attributes from any domain object.
//! - Distinguish "attribute does not exist" from "attribute is absent".
//!
//! # Invariants
//! - `Attributes::attr` returns `None` only for names the object does not
//!   define; a defined-but-empty attribute is `Some(AttrValue::Null)` or an
//!   empty `AttrValue::List`.
//! - `AttrValue::Computed` is evaluated with no arguments, at most once per
//!   resolution hop.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Shared handle to a hydrated domain object.
pub type Entity = Arc<dyn Attributes>;

/// A domain object that exposes named attributes.
pub trait Attributes: Send + Sync {
    /// Short type name used in error messages (`account`, `user`, ...).
    fn entity_name(&self) -> &str;

    /// Reads one attribute; `None` means the object has no such attribute.
    fn attr(&self, name: &str) -> Option<AttrValue>;
}

/// Value of one attribute.
#[derive(Clone)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Object(Entity),
    List(Vec<AttrValue>),
    /// Zero-argument accessor, e.g. a derived display name.
    Computed(Arc<dyn Fn() -> AttrValue + Send + Sync>),
}

impl AttrValue {
    pub fn object(value: impl Attributes + 'static) -> Self {
        Self::Object(Arc::new(value))
    }

    pub fn computed(f: impl Fn() -> AttrValue + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(f))
    }

    /// Evaluates computed values until a plain value remains.
    pub fn resolve(self) -> Self {
        let mut value = self;
        while let Self::Computed(f) = value {
            value = f();
        }
        value
    }

    /// Absent values short-circuit attribute paths.
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Null => true,
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Object(_) => "object",
            Self::List(_) => "list",
            Self::Computed(_) => "computed",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl Debug for AttrValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(value) => write!(f, "Bool({value})"),
            Self::Int(value) => write!(f, "Int({value})"),
            Self::Float(value) => write!(f, "Float({value})"),
            Self::Text(value) => write!(f, "Text({value:?})"),
            Self::Object(object) => write!(f, "Object({})", object.entity_name()),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Computed(_) => write!(f, "Computed(..)"),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

/// Map-backed object for ad-hoc records and tests.
#[derive(Clone, Debug, Default)]
pub struct DynamicObject {
    name: String,
    attrs: BTreeMap<String, AttrValue>,
}

impl DynamicObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with(mut self, attr: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(attr.into(), value.into());
        self
    }
}

impl Attributes for DynamicObject {
    fn entity_name(&self) -> &str {
        &self.name
    }

    fn attr(&self, name: &str) -> Option<AttrValue> {
        self.attrs.get(name).cloned()
    }
}

impl From<DynamicObject> for AttrValue {
    fn from(value: DynamicObject) -> Self {
        Self::object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{AttrValue, Attributes, DynamicObject};

    #[test]
    fn computed_values_resolve_to_plain_values() {
        let value = AttrValue::computed(|| AttrValue::computed(|| AttrValue::Int(7)));
        assert_eq!(value.resolve().as_int(), Some(7));
    }

    #[test]
    fn empty_lists_and_null_are_absent() {
        assert!(AttrValue::Null.is_absent());
        assert!(AttrValue::List(Vec::new()).is_absent());
        assert!(!AttrValue::Int(0).is_absent());
        assert!(!AttrValue::Text(String::new()).is_absent());
    }

    #[test]
    fn dynamic_object_distinguishes_missing_from_null() {
        let object = DynamicObject::new("probe").with("present", Option::<i64>::None);
        assert!(matches!(object.attr("present"), Some(AttrValue::Null)));
        assert!(object.attr("missing").is_none());
    }
}
