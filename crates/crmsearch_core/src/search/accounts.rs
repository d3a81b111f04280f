//! Account search document.

use crate::document::field::Field;
use crate::document::{related_value, related_values, DocumentType};
use crate::error::CoreResult;
use crate::model::value::Attributes;
use serde_json::Value;

pub const ACCOUNT_INDEX: &str = "account";

pub fn account_document() -> CoreResult<DocumentType> {
    DocumentType::builder("Account", "account", "accounts", ACCOUNT_INDEX)
        .field("addresses", Field::keyword())
        .field("assigned_to", Field::integer())
        .field("assigned_to_full_name", Field::text())
        .field("bankaccountnumber", Field::keyword())
        .field("bic", Field::keyword())
        .field("cocnumber", Field::keyword())
        .field("contacts", Field::integer())
        .field("created", Field::date())
        .field("customer_id", Field::integer())
        .field(
            "description",
            Field::keyword().subfield("text", Field::text()),
        )
        .field("domains", Field::keyword())
        .field("email_addresses", Field::integer())
        .field("email_addresses_addresses", Field::text())
        .field("flatname", Field::keyword())
        .field("iban", Field::keyword())
        .field("legalentity", Field::keyword())
        .field("id", Field::integer())
        .field("is_deleted", Field::boolean())
        .field("modified", Field::date())
        .field("name", Field::keyword().subfield("text", Field::text()))
        .field("phone_numbers", Field::integer())
        .field("phone_numbers_numbers", Field::text())
        .field("social_media", Field::integer())
        .field("status", Field::integer())
        .field("tags", Field::text())
        .field("taxnumber", Field::keyword())
        .field("tenant_id", Field::integer())
        .field("websites", Field::keyword())
        .prepare_with("addresses", prepare_addresses)
        .prepare_with("assigned_to", prepare_assigned_to)
        .prepare_with("assigned_to_full_name", prepare_assigned_to_full_name)
        .prepare_with("contacts", prepare_contacts)
        .prepare_with("domains", prepare_domains)
        .prepare_with("email_addresses", prepare_email_addresses)
        .prepare_with("email_addresses_addresses", prepare_email_addresses_addresses)
        .prepare_with("phone_numbers", prepare_phone_numbers)
        .prepare_with("phone_numbers_numbers", prepare_phone_numbers_numbers)
        .prepare_with("social_media", prepare_social_media)
        .prepare_with("status", prepare_status)
        .prepare_with("tags", prepare_tags)
        .prepare_with("websites", prepare_websites)
        .build()
}

fn prepare_addresses(account: &dyn Attributes) -> CoreResult<Value> {
    related_values(account, "addresses.full")
}

fn prepare_assigned_to(account: &dyn Attributes) -> CoreResult<Value> {
    related_value(account, "assigned_to.id")
}

fn prepare_assigned_to_full_name(account: &dyn Attributes) -> CoreResult<Value> {
    related_value(account, "assigned_to.full_name")
}

fn prepare_contacts(account: &dyn Attributes) -> CoreResult<Value> {
    related_values(account, "contacts.id")
}

fn prepare_domains(account: &dyn Attributes) -> CoreResult<Value> {
    related_values(account, "websites.website")
}

fn prepare_email_addresses(account: &dyn Attributes) -> CoreResult<Value> {
    related_values(account, "email_addresses.id")
}

fn prepare_email_addresses_addresses(account: &dyn Attributes) -> CoreResult<Value> {
    related_values(account, "email_addresses.email_address")
}

fn prepare_phone_numbers(account: &dyn Attributes) -> CoreResult<Value> {
    related_values(account, "phone_numbers.id")
}

fn prepare_phone_numbers_numbers(account: &dyn Attributes) -> CoreResult<Value> {
    related_values(account, "phone_numbers.number")
}

fn prepare_social_media(account: &dyn Attributes) -> CoreResult<Value> {
    related_values(account, "social_media.id")
}

fn prepare_status(account: &dyn Attributes) -> CoreResult<Value> {
    related_value(account, "status_id")
}

fn prepare_tags(account: &dyn Attributes) -> CoreResult<Value> {
    related_values(account, "tags.name")
}

// Website ids; the urls themselves are indexed as `domains`.
fn prepare_websites(account: &dyn Attributes) -> CoreResult<Value> {
    related_values(account, "websites.id")
}
