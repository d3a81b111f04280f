//! Account domain model and its owned relations.
//!
//! # Responsibility
//! - Carry one account with every relation the search document reads.
//! - Expose attributes by name for field extraction.
//!
//! # Invariants
//! - Relations are loaded eagerly; an account without phone numbers has an
//!   empty list, never a missing attribute.
//! - `assigned_to` is `None` when the account is unassigned.

use super::user::User;
use super::value::{AttrValue, Attributes};
use serde::{Deserialize, Serialize};

pub type AccountId = i64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub street: String,
    pub street_number: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

impl Address {
    /// Single-line postal form, skipping empty parts.
    pub fn full(&self) -> String {
        let street = join_non_empty(&[&self.street, &self.street_number], " ");
        let place = join_non_empty(&[&self.postal_code, &self.city], " ");
        join_non_empty(&[&street, &place, &self.country], ", ")
    }
}

fn join_non_empty(parts: &[&str], separator: &str) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub id: i64,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub id: i64,
    pub email_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    pub id: i64,
    pub website: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialMedia {
    pub id: i64,
    pub name: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Canonical account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub tenant_id: i64,
    pub customer_id: Option<i64>,
    pub name: String,
    pub flatname: Option<String>,
    pub description: Option<String>,
    pub legalentity: Option<String>,
    pub taxnumber: Option<String>,
    pub bankaccountnumber: Option<String>,
    pub bic: Option<String>,
    pub iban: Option<String>,
    pub cocnumber: Option<String>,
    pub status_id: Option<i64>,
    pub assigned_to: Option<User>,
    pub is_deleted: bool,
    /// RFC 3339 timestamp.
    pub created: String,
    /// RFC 3339 timestamp.
    pub modified: String,
    pub addresses: Vec<Address>,
    pub phone_numbers: Vec<PhoneNumber>,
    pub email_addresses: Vec<EmailAddress>,
    pub websites: Vec<Website>,
    pub social_media: Vec<SocialMedia>,
    pub tags: Vec<Tag>,
    /// Ids of contacts linked to this account; contacts live outside this crate.
    pub contacts: Vec<i64>,
}

impl Account {
    pub fn new(id: AccountId, tenant_id: i64, name: impl Into<String>, created: &str) -> Self {
        Self {
            id,
            tenant_id,
            customer_id: None,
            name: name.into(),
            flatname: None,
            description: None,
            legalentity: None,
            taxnumber: None,
            bankaccountnumber: None,
            bic: None,
            iban: None,
            cocnumber: None,
            status_id: None,
            assigned_to: None,
            is_deleted: false,
            created: created.to_string(),
            modified: created.to_string(),
            addresses: Vec::new(),
            phone_numbers: Vec::new(),
            email_addresses: Vec::new(),
            websites: Vec::new(),
            social_media: Vec::new(),
            tags: Vec::new(),
            contacts: Vec::new(),
        }
    }
}

fn related<T: Attributes + Clone + 'static>(items: &[T]) -> AttrValue {
    AttrValue::List(
        items
            .iter()
            .map(|item| AttrValue::object(item.clone()))
            .collect(),
    )
}

impl Attributes for Account {
    fn entity_name(&self) -> &str {
        "account"
    }

    fn attr(&self, name: &str) -> Option<AttrValue> {
        let value = match name {
            "id" => self.id.into(),
            "tenant_id" => self.tenant_id.into(),
            "customer_id" => self.customer_id.into(),
            "name" => self.name.clone().into(),
            "flatname" => self.flatname.clone().into(),
            "description" => self.description.clone().into(),
            "legalentity" => self.legalentity.clone().into(),
            "taxnumber" => self.taxnumber.clone().into(),
            "bankaccountnumber" => self.bankaccountnumber.clone().into(),
            "bic" => self.bic.clone().into(),
            "iban" => self.iban.clone().into(),
            "cocnumber" => self.cocnumber.clone().into(),
            "status_id" => self.status_id.into(),
            "assigned_to" => self
                .assigned_to
                .clone()
                .map_or(AttrValue::Null, AttrValue::object),
            "is_deleted" => self.is_deleted.into(),
            "created" => self.created.clone().into(),
            "modified" => self.modified.clone().into(),
            "addresses" => related(&self.addresses),
            "phone_numbers" => related(&self.phone_numbers),
            "email_addresses" => related(&self.email_addresses),
            "websites" => related(&self.websites),
            "social_media" => related(&self.social_media),
            "tags" => related(&self.tags),
            "contacts" => AttrValue::List(
                self.contacts
                    .iter()
                    .map(|id| AttrValue::object(ContactRef { id: *id }))
                    .collect(),
            ),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Copy)]
struct ContactRef {
    id: i64,
}

impl Attributes for ContactRef {
    fn entity_name(&self) -> &str {
        "contact"
    }

    fn attr(&self, name: &str) -> Option<AttrValue> {
        (name == "id").then(|| self.id.into())
    }
}

impl Attributes for Address {
    fn entity_name(&self) -> &str {
        "address"
    }

    fn attr(&self, name: &str) -> Option<AttrValue> {
        let value = match name {
            "id" => self.id.into(),
            "street" => self.street.clone().into(),
            "street_number" => self.street_number.clone().into(),
            "postal_code" => self.postal_code.clone().into(),
            "city" => self.city.clone().into(),
            "country" => self.country.clone().into(),
            "full" => {
                let full = self.full();
                AttrValue::computed(move || full.clone().into())
            }
            _ => return None,
        };
        Some(value)
    }
}

impl Attributes for PhoneNumber {
    fn entity_name(&self) -> &str {
        "phone_number"
    }

    fn attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            "id" => Some(self.id.into()),
            "number" => Some(self.number.clone().into()),
            _ => None,
        }
    }
}

impl Attributes for EmailAddress {
    fn entity_name(&self) -> &str {
        "email_address"
    }

    fn attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            "id" => Some(self.id.into()),
            "email_address" => Some(self.email_address.clone().into()),
            _ => None,
        }
    }
}

impl Attributes for Website {
    fn entity_name(&self) -> &str {
        "website"
    }

    fn attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            "id" => Some(self.id.into()),
            "website" => Some(self.website.clone().into()),
            _ => None,
        }
    }
}

impl Attributes for SocialMedia {
    fn entity_name(&self) -> &str {
        "social_media"
    }

    fn attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.clone().into()),
            "username" => Some(self.username.clone().into()),
            _ => None,
        }
    }
}

impl Attributes for Tag {
    fn entity_name(&self) -> &str {
        "tag"
    }

    fn attr(&self, name: &str) -> Option<AttrValue> {
        match name {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.clone().into()),
            _ => None,
        }
    }
}
