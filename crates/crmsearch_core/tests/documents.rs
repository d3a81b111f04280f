use crmsearch_core::model::account::{
    Account, Address, EmailAddress, PhoneNumber, SocialMedia, Tag, Website,
};
use crmsearch_core::model::user::{Team, User};
use crmsearch_core::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use crmsearch_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use crmsearch_core::search::accounts::account_document;
use crmsearch_core::search::users::user_document;
use crmsearch_core::{default_registry, RelationalStore, SqliteStore};
use serde_json::{json, Value};

fn ann() -> User {
    let mut user = User::new(9, 1, "ann@example.com");
    user.first_name = "Ann".to_string();
    user.last_name = "Smith".to_string();
    user.teams = vec![Team {
        id: 1,
        name: "Sales".to_string(),
    }];
    user
}

fn acme() -> Account {
    let mut account = Account::new(7, 1, "Acme", "2017-01-01T00:00:00");
    account.customer_id = Some(42);
    account.flatname = Some("acme".to_string());
    account.description = Some("Trading".to_string());
    account.status_id = Some(3);
    account.assigned_to = Some(ann());
    account.addresses = vec![Address {
        id: 1,
        street: "Main Street".to_string(),
        street_number: "12".to_string(),
        postal_code: String::new(),
        city: "Utrecht".to_string(),
        country: "NL".to_string(),
    }];
    account.phone_numbers = vec![
        PhoneNumber {
            id: 1,
            number: "+31 20 123".to_string(),
        },
        PhoneNumber {
            id: 2,
            number: "+31 10 456".to_string(),
        },
    ];
    account.email_addresses = vec![EmailAddress {
        id: 5,
        email_address: "info@acme.com".to_string(),
    }];
    account.websites = vec![Website {
        id: 8,
        website: "acme.com".to_string(),
    }];
    account.social_media = vec![SocialMedia {
        id: 4,
        name: "twitter".to_string(),
        username: "acme".to_string(),
    }];
    account.tags = vec![Tag {
        id: 6,
        name: "vip".to_string(),
    }];
    account.contacts = vec![11, 12];
    account
}

fn acme_source() -> Value {
    json!({
        "addresses": ["Main Street 12, Utrecht, NL"],
        "assigned_to": 9,
        "assigned_to_full_name": "Ann Smith",
        "bankaccountnumber": null,
        "bic": null,
        "cocnumber": null,
        "contacts": [11, 12],
        "created": "2017-01-01T00:00:00",
        "customer_id": 42,
        "description": "Trading",
        "domains": ["acme.com"],
        "email_addresses": [5],
        "email_addresses_addresses": ["info@acme.com"],
        "flatname": "acme",
        "iban": null,
        "id": 7,
        "is_deleted": false,
        "legalentity": null,
        "modified": "2017-01-01T00:00:00",
        "name": "Acme",
        "phone_numbers": [1, 2],
        "phone_numbers_numbers": ["+31 20 123", "+31 10 456"],
        "social_media": [4],
        "status": 3,
        "tags": ["vip"],
        "taxnumber": null,
        "tenant_id": 1,
        "websites": [8]
    })
}

#[test]
fn account_document_flattens_every_relation() {
    let document = account_document().unwrap().prepare(&acme()).unwrap();

    assert_eq!(document.id, "7");
    assert_eq!(Value::Object(document.source), acme_source());
}

#[test]
fn unassigned_account_without_relations_yields_nulls_and_empty_lists() {
    let account = Account::new(8, 1, "Initech", "2017-05-01T00:00:00");
    let source = account_document().unwrap().prepare(&account).unwrap().source;

    assert_eq!(source["assigned_to"], Value::Null);
    assert_eq!(source["assigned_to_full_name"], Value::Null);
    assert_eq!(source["status"], Value::Null);
    for field in [
        "addresses",
        "contacts",
        "domains",
        "email_addresses",
        "phone_numbers_numbers",
        "tags",
        "websites",
    ] {
        assert_eq!(source[field], json!([]), "field {field}");
    }
}

#[test]
fn user_document_reads_derived_name_and_team_ids() {
    let document = user_document().unwrap().prepare(&ann()).unwrap();

    assert_eq!(document.id, "9");
    assert_eq!(
        Value::Object(document.source),
        json!({
            "email": "ann@example.com",
            "first_name": "Ann",
            "full_name": "Ann Smith",
            "internal_number": null,
            "is_active": true,
            "last_name": "Smith",
            "phone_number": null,
            "position": null,
            "teams": [1],
            "tenant_id": 1
        })
    );
}

#[test]
fn hydrated_accounts_prepare_like_in_memory_ones() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .with_connection(|conn| {
            let users = SqliteUserRepository::new(conn);
            users.create_team(&Team {
                id: 1,
                name: "Sales".to_string(),
            })?;
            users.create_user(&ann())?;
            SqliteAccountRepository::new(conn).create_account(&acme())
        })
        .unwrap();

    let loaded = store.get_by_ids("account", &[7]).unwrap();
    assert_eq!(loaded.len(), 1);
    let document = account_document().unwrap().prepare(loaded[0].as_ref()).unwrap();
    assert_eq!(Value::Object(document.source), acme_source());
}

#[test]
fn index_bodies_carry_multi_fields() {
    let registry = default_registry().unwrap();
    let body = registry.index_body("account").unwrap();
    let properties = &body["mappings"]["properties"];

    assert_eq!(
        properties["name"],
        json!({"type": "keyword", "fields": {"text": {"type": "text"}}})
    );
    assert_eq!(properties["created"], json!({"type": "date"}));
    assert_eq!(properties["phone_numbers"], json!({"type": "integer"}));

    let users = registry.index_body("user").unwrap();
    assert_eq!(users["mappings"]["properties"]["full_name"], json!({"type": "text"}));
}
