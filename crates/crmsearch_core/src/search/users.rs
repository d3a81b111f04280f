//! User search document.

use crate::document::field::Field;
use crate::document::{related_values, DocumentType};
use crate::error::CoreResult;
use crate::model::value::Attributes;
use serde_json::Value;

pub const USER_INDEX: &str = "user";

pub fn user_document() -> CoreResult<DocumentType> {
    DocumentType::builder("User", "user", "users", USER_INDEX)
        .field("first_name", Field::keyword())
        .field("last_name", Field::keyword())
        .field("full_name", Field::text())
        .field("position", Field::text())
        .field("is_active", Field::boolean())
        .field("email", Field::text())
        .field("phone_number", Field::text())
        .field("internal_number", Field::keyword())
        .field("teams", Field::integer())
        .field("tenant_id", Field::integer())
        .prepare_with("teams", prepare_teams)
        .build()
}

fn prepare_teams(user: &dyn Attributes) -> CoreResult<Value> {
    related_values(user, "teams.id")
}
