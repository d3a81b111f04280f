//! Read-only registry of document types and their logical indices.
//!
//! # Responsibility
//! - Map entity names to document types.
//! - Group document types by logical index and render index bodies.
//! - Resolve lifecycle scope names (`group` or `group.entity`).
//!
//! # Invariants
//! - Entity names are unique.
//! - Document types sharing a logical index agree on every shared field.
//! - The registry is built once and never mutated.

use crate::document::DocumentType;
use crate::error::{CoreError, CoreResult};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct Registry {
    documents: Vec<Arc<DocumentType>>,
}

impl Registry {
    pub fn new(documents: impl IntoIterator<Item = DocumentType>) -> CoreResult<Self> {
        let mut registered: Vec<Arc<DocumentType>> = Vec::new();
        for document in documents {
            if registered
                .iter()
                .any(|existing| existing.entity() == document.entity())
            {
                return Err(CoreError::Schema(format!(
                    "entity `{}` registered twice",
                    document.entity()
                )));
            }
            registered.push(Arc::new(document));
        }

        let registry = Self {
            documents: registered,
        };
        for index in registry.indices() {
            registry.merged_properties(&index)?;
        }
        Ok(registry)
    }

    pub fn documents(&self) -> &[Arc<DocumentType>] {
        &self.documents
    }

    pub fn document(&self, entity: &str) -> CoreResult<Arc<DocumentType>> {
        self.documents
            .iter()
            .find(|document| document.entity() == entity)
            .cloned()
            .ok_or_else(|| CoreError::UnknownEntity(entity.to_string()))
    }

    /// Logical index names, sorted.
    pub fn indices(&self) -> Vec<String> {
        self.documents
            .iter()
            .map(|document| document.index().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// `{"mappings": {"properties": ...}}` for a logical index.
    pub fn index_body(&self, index: &str) -> CoreResult<Value> {
        let properties = self.merged_properties(index)?;
        Ok(json!({ "mappings": { "properties": properties } }))
    }

    /// Document types named by `scopes`; an empty scope list selects all.
    ///
    /// Scope names are matched case-insensitively against entity groups
    /// (`accounts`) and `group.entity` pairs (`accounts.account`).
    pub fn select<S: AsRef<str>>(&self, scopes: &[S]) -> CoreResult<Selection> {
        if scopes.is_empty() {
            return Ok(Selection {
                documents: self.documents.clone(),
            });
        }

        let mut selected: Vec<Arc<DocumentType>> = Vec::new();
        for scope in scopes {
            let scope = scope.as_ref().trim().to_lowercase();
            let mut matched = false;
            for document in &self.documents {
                let group = document.group().to_lowercase();
                let qualified = format!("{group}.{}", document.entity().to_lowercase());
                if scope == group || scope == qualified {
                    matched = true;
                    if !selected
                        .iter()
                        .any(|existing| existing.entity() == document.entity())
                    {
                        selected.push(Arc::clone(document));
                    }
                }
            }
            if !matched {
                return Err(CoreError::UnknownScope(scope));
            }
        }

        // Registration order keeps lifecycle output stable.
        selected.sort_by_key(|document| {
            self.documents
                .iter()
                .position(|registered| registered.entity() == document.entity())
        });
        Ok(Selection {
            documents: selected,
        })
    }

    fn merged_properties(&self, index: &str) -> CoreResult<Map<String, Value>> {
        let mut merged = Map::new();
        for document in self.documents.iter().filter(|doc| doc.index() == index) {
            for (name, field) in document.fields() {
                let descriptor = field.to_dict();
                match merged.get(name) {
                    Some(existing) if *existing != descriptor => {
                        return Err(CoreError::Schema(format!(
                            "field `{name}` of index `{index}` has conflicting mappings"
                        )));
                    }
                    Some(_) => {}
                    None => {
                        merged.insert(name.clone(), descriptor);
                    }
                }
            }
        }
        Ok(merged)
    }
}

/// Document types picked for one lifecycle run.
#[derive(Clone)]
pub struct Selection {
    documents: Vec<Arc<DocumentType>>,
}

impl Selection {
    pub fn documents(&self) -> &[Arc<DocumentType>] {
        &self.documents
    }

    /// Logical indices of the selected document types, in first-seen order.
    pub fn indices(&self) -> Vec<String> {
        let mut indices: Vec<String> = Vec::new();
        for document in &self.documents {
            if !indices.iter().any(|index| index == document.index()) {
                indices.push(document.index().to_string());
            }
        }
        indices
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::document::field::Field;
    use crate::document::DocumentType;
    use crate::error::CoreError;
    use serde_json::json;

    fn doc(name: &'static str, entity: &'static str, group: &'static str, index: &str) -> DocumentType {
        DocumentType::builder(name, entity, group, index)
            .field("id", Field::integer())
            .build()
            .expect("valid document")
    }

    fn registry() -> Registry {
        Registry::new([
            doc("Account", "account", "accounts", "account"),
            doc("User", "user", "users", "user"),
        ])
        .expect("registry")
    }

    #[test]
    fn scopes_match_groups_and_qualified_entities() {
        let registry = registry();
        assert_eq!(registry.select::<&str>(&[]).unwrap().documents().len(), 2);
        assert_eq!(
            registry.select(&["USERS"]).unwrap().indices(),
            vec!["user".to_string()]
        );
        assert_eq!(
            registry.select(&["accounts.account", "accounts"]).unwrap().documents().len(),
            1
        );
    }

    #[test]
    fn unknown_scope_fails_whole_selection() {
        let err = registry().select(&["accounts", "cases"]).err().unwrap();
        assert!(matches!(err, CoreError::UnknownScope(ref name) if name == "cases"));
        assert_eq!(err.to_string(), "No model or app named cases");
    }

    #[test]
    fn shared_indices_merge_and_reject_conflicts() {
        let left = DocumentType::builder("Left", "left", "shared", "shared")
            .field("name", Field::text())
            .build()
            .unwrap();
        let right = DocumentType::builder("Right", "right", "shared", "shared")
            .field("name", Field::keyword())
            .build()
            .unwrap();
        assert!(matches!(
            Registry::new([left, right]),
            Err(CoreError::Schema(_))
        ));

        let registry = registry();
        assert_eq!(
            registry.index_body("user").unwrap(),
            json!({"mappings": {"properties": {"id": {"type": "integer"}}}})
        );
    }
}
