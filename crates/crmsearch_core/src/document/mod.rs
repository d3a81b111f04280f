//! Document schemas and preparation.
//!
//! # Responsibility
//! - Declare per-entity field sets and their optional override functions.
//! - Turn one domain object into one indexable [`Document`].
//!
//! # Invariants
//! - Override functions are looked up in a table built once, at schema
//!   construction; every override names a declared field.
//! - Preparation reads only the given object and returns either a complete
//!   document or an error.

pub mod field;

use crate::error::{CoreError, CoreResult};
use crate::model::value::{AttrValue, Attributes};
use crate::query::RelationalQuery;
use field::{AttrPath, Field};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Derives one field's value from the whole object.
pub type PrepareFn = fn(&dyn Attributes) -> CoreResult<Value>;

/// Flattened, indexable form of one domain object.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub source: Map<String, Value>,
}

/// Schema of one entity type in the search engine.
#[derive(Debug, Clone)]
pub struct DocumentType {
    name: &'static str,
    entity: &'static str,
    group: &'static str,
    index: String,
    fields: BTreeMap<String, Field>,
    overrides: BTreeMap<String, PrepareFn>,
}

impl DocumentType {
    /// Starts a schema for `entity` (e.g. `account`) in entity group `group`
    /// stored under the logical index `index`.
    pub fn builder(
        name: &'static str,
        entity: &'static str,
        group: &'static str,
        index: impl Into<String>,
    ) -> DocumentTypeBuilder {
        DocumentTypeBuilder {
            doc: DocumentType {
                name,
                entity,
                group,
                index: index.into(),
                fields: BTreeMap::new(),
                overrides: BTreeMap::new(),
            },
            errors: Vec::new(),
        }
    }

    /// Display name, e.g. `Account`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn group(&self) -> &'static str {
        self.group
    }

    /// Logical index this document type is stored under.
    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn fields(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }

    pub fn has_override(&self, field: &str) -> bool {
        self.overrides.contains_key(field)
    }

    /// `{"properties": {...}}` for this document type.
    pub fn mapping(&self) -> Value {
        let properties = self
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), field.to_dict()))
            .collect::<Map<_, _>>();
        json!({ "properties": properties })
    }

    /// The authoritative relational collection used for full reindexing.
    pub fn source_query(&self) -> RelationalQuery {
        RelationalQuery::all(self.entity)
    }

    /// Prepares the search document for `object`.
    pub fn prepare(&self, object: &dyn Attributes) -> CoreResult<Document> {
        let mut source = Map::new();
        for (name, field) in &self.fields {
            let value = match self.overrides.get(name) {
                Some(prepare) => prepare(object)?,
                None => field.extract(object, name)?,
            };
            source.insert(name.clone(), value);
        }

        Ok(Document {
            id: document_id(object)?,
            source,
        })
    }
}

pub struct DocumentTypeBuilder {
    doc: DocumentType,
    errors: Vec<String>,
}

impl DocumentTypeBuilder {
    pub fn field(mut self, name: &str, field: Field) -> Self {
        if name.trim().is_empty() {
            self.errors.push("field names must not be empty".to_string());
        } else if self.doc.fields.insert(name.to_string(), field).is_some() {
            self.errors.push(format!("field `{name}` declared twice"));
        }
        self
    }

    /// Registers the override that prepares `name` instead of plain extraction.
    pub fn prepare_with(mut self, name: &str, prepare: PrepareFn) -> Self {
        if self.doc.overrides.insert(name.to_string(), prepare).is_some() {
            self.errors.push(format!("override for `{name}` registered twice"));
        }
        self
    }

    pub fn build(mut self) -> CoreResult<DocumentType> {
        for name in self.doc.overrides.keys() {
            if !self.doc.fields.contains_key(name) {
                self.errors
                    .push(format!("override `{name}` has no matching field"));
            }
        }
        if self.doc.index.trim().is_empty() {
            self.errors.push("index name must not be empty".to_string());
        }

        if self.errors.is_empty() {
            Ok(self.doc)
        } else {
            Err(CoreError::Schema(format!(
                "{}: {}",
                self.doc.name,
                self.errors.join("; ")
            )))
        }
    }
}

/// Reads the primary key used as the document id.
pub fn document_id(object: &dyn Attributes) -> CoreResult<String> {
    match AttrPath::parse("id").resolve(object)? {
        AttrValue::Int(id) => Ok(id.to_string()),
        AttrValue::Text(id) if !id.is_empty() => Ok(id),
        other => Err(CoreError::InvalidFieldValue {
            field: "id".to_string(),
            found: other.kind_name(),
        }),
    }
}

/// Resolves `path` for an override and renders it as a scalar value.
///
/// `assigned_to.id` yields the id or null.
pub fn related_value(object: &dyn Attributes, path: &str) -> CoreResult<Value> {
    Field::keyword().attr(path).extract(object, path)
}

/// Like [`related_value`] but always yields an array; absent relations give `[]`.
pub fn related_values(object: &dyn Attributes, path: &str) -> CoreResult<Value> {
    Ok(match related_value(object, path)? {
        Value::Null => Value::Array(Vec::new()),
        Value::Array(items) => Value::Array(items),
        single => Value::Array(vec![single]),
    })
}
