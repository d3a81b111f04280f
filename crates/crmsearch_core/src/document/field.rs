//! Field declarations: one recursive tree for mapping and extraction.
//!
//! # Responsibility
//! - Resolve dotted attribute paths against domain objects.
//! - Render index-mapping descriptors (`to_dict`).
//!
//! # Invariants
//! - A missing attribute is a `NameResolution` error; an absent intermediate
//!   value (null or empty relation) resolves the whole path to null.
//! - `Object` and `Nested` only differ in their mapping `type` tag.
//! - `List` reports and extracts exactly like its inner field.

use crate::error::{CoreError, CoreResult};
use crate::model::value::{AttrValue, Attributes};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Ordered attribute hops parsed from a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrPath {
    hops: Vec<String>,
}

impl AttrPath {
    /// Parses `a.b.c`; empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        Self {
            hops: path
                .split('.')
                .map(str::trim)
                .filter(|hop| !hop.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn hops(&self) -> &[String] {
        &self.hops
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Resolves the path against `object`, evaluating computed values.
    pub fn resolve(&self, object: &dyn Attributes) -> CoreResult<AttrValue> {
        let Some((first, rest)) = self.hops.split_first() else {
            return Ok(AttrValue::Null);
        };
        let value = self.read(object, first)?;
        self.walk(value, rest)
    }

    fn read(&self, object: &dyn Attributes, hop: &str) -> CoreResult<AttrValue> {
        object
            .attr(hop)
            .map(AttrValue::resolve)
            .ok_or_else(|| CoreError::NameResolution {
                entity: object.entity_name().to_string(),
                attr: hop.to_string(),
                path: self.to_string(),
            })
    }

    fn walk(&self, value: AttrValue, hops: &[String]) -> CoreResult<AttrValue> {
        let Some((hop, rest)) = hops.split_first() else {
            return Ok(value);
        };
        if value.is_absent() {
            return Ok(AttrValue::Null);
        }

        match value {
            AttrValue::Object(object) => {
                let next = self.read(object.as_ref(), hop)?;
                self.walk(next, rest)
            }
            // A hop across a collection maps the remaining path over each item.
            AttrValue::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match self.walk(item.resolve(), hops)? {
                        AttrValue::List(inner) => values.extend(inner),
                        other => values.push(other),
                    }
                }
                Ok(AttrValue::List(values))
            }
            other => Err(CoreError::NameResolution {
                entity: other.kind_name().to_string(),
                attr: hop.clone(),
                path: self.to_string(),
            }),
        }
    }
}

impl Display for AttrPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hops.join("."))
    }
}

/// Scalar mapping types understood by the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Text,
    Keyword,
    Integer,
    Long,
    Short,
    Byte,
    Double,
    Float,
    Boolean,
    Date,
    Ip,
    GeoPoint,
    GeoShape,
    Completion,
    Attachment,
}

impl ScalarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Keyword => "keyword",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Short => "short",
            Self::Byte => "byte",
            Self::Double => "double",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Ip => "ip",
            Self::GeoPoint => "geo_point",
            Self::GeoShape => "geo_shape",
            Self::Completion => "completion",
            Self::Attachment => "attachment",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar {
        kind: ScalarKind,
        params: Map<String, Value>,
    },
    Object {
        properties: BTreeMap<String, Field>,
    },
    Nested {
        properties: BTreeMap<String, Field>,
    },
    List {
        inner: Box<Field>,
    },
}

/// One node of a document schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    attr: Option<AttrPath>,
    kind: FieldKind,
}

impl Field {
    pub fn scalar(kind: ScalarKind) -> Self {
        Self {
            attr: None,
            kind: FieldKind::Scalar {
                kind,
                params: Map::new(),
            },
        }
    }

    pub fn text() -> Self {
        Self::scalar(ScalarKind::Text)
    }

    pub fn keyword() -> Self {
        Self::scalar(ScalarKind::Keyword)
    }

    pub fn integer() -> Self {
        Self::scalar(ScalarKind::Integer)
    }

    pub fn long() -> Self {
        Self::scalar(ScalarKind::Long)
    }

    pub fn boolean() -> Self {
        Self::scalar(ScalarKind::Boolean)
    }

    pub fn date() -> Self {
        Self::scalar(ScalarKind::Date)
    }

    pub fn object<K: Into<String>>(properties: impl IntoIterator<Item = (K, Field)>) -> Self {
        Self {
            attr: None,
            kind: FieldKind::Object {
                properties: collect_properties(properties),
            },
        }
    }

    pub fn nested<K: Into<String>>(properties: impl IntoIterator<Item = (K, Field)>) -> Self {
        Self {
            attr: None,
            kind: FieldKind::Nested {
                properties: collect_properties(properties),
            },
        }
    }

    pub fn list(inner: Field) -> Self {
        Self {
            attr: None,
            kind: FieldKind::List {
                inner: Box::new(inner),
            },
        }
    }

    /// Reads the value from `path` instead of the property name.
    pub fn attr(mut self, path: &str) -> Self {
        let path = AttrPath::parse(path);
        match &mut self.kind {
            FieldKind::List { inner } => {
                inner.attr = Some(path);
            }
            _ => self.attr = Some(path),
        }
        self
    }

    /// Adds a mapping parameter (e.g. `analyzer`). Ignored by non-scalars.
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        match &mut self.kind {
            FieldKind::Scalar { params, .. } => {
                params.insert(key.to_string(), value.into());
            }
            FieldKind::List { inner } => {
                let updated = (**inner).clone().param(key, value);
                **inner = updated;
            }
            FieldKind::Object { .. } | FieldKind::Nested { .. } => {}
        }
        self
    }

    /// Adds a multi-field rendered under `fields`.
    pub fn subfield(self, name: &str, field: Field) -> Self {
        let FieldKind::Scalar { params, .. } = &self.kind else {
            return self;
        };
        let mut fields = params
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        fields.insert(name.to_string(), field.to_dict());
        self.param("fields", Value::Object(fields))
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn attr_path(&self) -> Option<&AttrPath> {
        self.attr.as_ref()
    }

    /// Renders the mapping descriptor for this field.
    pub fn to_dict(&self) -> Value {
        match &self.kind {
            FieldKind::Scalar { kind, params } => {
                let mut descriptor = params.clone();
                descriptor.insert("type".to_string(), json!(kind.as_str()));
                Value::Object(descriptor)
            }
            FieldKind::Object { properties } => container_dict("object", properties),
            FieldKind::Nested { properties } => container_dict("nested", properties),
            FieldKind::List { inner } => inner.to_dict(),
        }
    }

    /// Extracts the indexable value of this field, declared as `name`, from
    /// `object`.
    pub fn extract(&self, object: &dyn Attributes, name: &str) -> CoreResult<Value> {
        if let FieldKind::List { inner } = &self.kind {
            return inner.extract(object, name);
        }

        let value = match &self.attr {
            Some(path) if !path.is_empty() => path.resolve(object)?,
            _ => AttrPath::parse(name).resolve(object)?,
        };
        self.convert(value, name)
    }

    fn convert(&self, value: AttrValue, name: &str) -> CoreResult<Value> {
        match &self.kind {
            FieldKind::Scalar { .. } => scalar_value(value, name),
            FieldKind::Object { properties } | FieldKind::Nested { properties } => {
                container_value(properties, value, name)
            }
            FieldKind::List { inner } => inner.convert(value, name),
        }
    }
}

fn collect_properties<K: Into<String>>(
    properties: impl IntoIterator<Item = (K, Field)>,
) -> BTreeMap<String, Field> {
    properties
        .into_iter()
        .map(|(name, field)| (name.into(), field))
        .collect()
}

fn container_dict(type_tag: &str, properties: &BTreeMap<String, Field>) -> Value {
    let rendered = properties
        .iter()
        .map(|(name, field)| (name.clone(), field.to_dict()))
        .collect::<Map<_, _>>();
    json!({ "type": type_tag, "properties": rendered })
}

fn container_value(
    properties: &BTreeMap<String, Field>,
    value: AttrValue,
    name: &str,
) -> CoreResult<Value> {
    match value.resolve() {
        AttrValue::Null => Ok(Value::Object(Map::new())),
        AttrValue::Object(object) => {
            let mut rendered = Map::new();
            for (child_name, child) in properties {
                rendered.insert(child_name.clone(), child.extract(object.as_ref(), child_name)?);
            }
            Ok(Value::Object(rendered))
        }
        AttrValue::List(items) => items
            .into_iter()
            .map(|item| container_value(properties, item, name))
            .collect::<CoreResult<Vec<_>>>()
            .map(Value::Array),
        other => Err(CoreError::InvalidFieldValue {
            field: name.to_string(),
            found: other.kind_name(),
        }),
    }
}

fn scalar_value(value: AttrValue, name: &str) -> CoreResult<Value> {
    match value.resolve() {
        AttrValue::Null => Ok(Value::Null),
        AttrValue::Bool(value) => Ok(Value::Bool(value)),
        AttrValue::Int(value) => Ok(json!(value)),
        AttrValue::Float(value) => Ok(serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)),
        AttrValue::Text(value) => Ok(Value::String(value)),
        AttrValue::List(items) => items
            .into_iter()
            .map(|item| scalar_value(item, name))
            .collect::<CoreResult<Vec<_>>>()
            .map(Value::Array),
        other => Err(CoreError::InvalidFieldValue {
            field: name.to_string(),
            found: other.kind_name(),
        }),
    }
}
