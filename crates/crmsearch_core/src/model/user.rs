//! User domain model.
//!
//! # Invariants
//! - `id` is the relational primary key and the search document id.
//! - `full_name` is derived, never stored.

use super::value::{AttrValue, Attributes};
use serde::{Deserialize, Serialize};

pub type UserId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

/// CRM user as loaded from the relational store, teams included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub position: Option<String>,
    pub is_active: bool,
    pub email: String,
    pub phone_number: Option<String>,
    pub internal_number: Option<String>,
    pub teams: Vec<Team>,
}

impl User {
    pub fn new(id: UserId, tenant_id: i64, email: impl Into<String>) -> Self {
        Self {
            id,
            tenant_id,
            first_name: String::new(),
            last_name: String::new(),
            position: None,
            is_active: true,
            email: email.into(),
            phone_number: None,
            internal_number: None,
            teams: Vec::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl Attributes for Team {
    fn entity_name(&self) -> &str {
        "team"
    }

    fn attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.clone().into()),
            _ => None,
        }
    }
}

impl Attributes for User {
    fn entity_name(&self) -> &str {
        "user"
    }

    fn attr(&self, name: &str) -> Option<AttrValue> {
        let value = match name {
            "id" => self.id.into(),
            "tenant_id" => self.tenant_id.into(),
            "first_name" => self.first_name.clone().into(),
            "last_name" => self.last_name.clone().into(),
            "full_name" => {
                let full_name = self.full_name();
                AttrValue::computed(move || full_name.clone().into())
            }
            "position" => self.position.clone().into(),
            "is_active" => self.is_active.into(),
            "email" => self.email.clone().into(),
            "phone_number" => self.phone_number.clone().into(),
            "internal_number" => self.internal_number.clone().into(),
            "teams" => AttrValue::List(
                self.teams
                    .iter()
                    .map(|team| AttrValue::object(team.clone()))
                    .collect(),
            ),
            _ => return None,
        };
        Some(value)
    }
}
