//! Account repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist accounts together with their owned relations.
//! - Load accounts in batches with every relation hydrated.
//!
//! # Invariants
//! - `create_account` writes the account and its relations in one transaction.
//! - Relation rows are returned in id order.

use super::user_repo::{SqliteUserRepository, UserRepository};
use super::{
    bool_to_int, id_values, int_to_bool, placeholders, RepoError, RepoResult, LOAD_CHUNK_SIZE,
};
use crate::model::account::{
    Account, AccountId, Address, EmailAddress, PhoneNumber, SocialMedia, Tag, Website,
};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::{BTreeMap, BTreeSet};

const ACCOUNT_SELECT_SQL: &str = "SELECT
    id,
    tenant_id,
    customer_id,
    name,
    flatname,
    description,
    legalentity,
    taxnumber,
    bankaccountnumber,
    bic,
    iban,
    cocnumber,
    status_id,
    assigned_to_id,
    is_deleted,
    created,
    modified
FROM accounts";

pub trait AccountRepository {
    /// Inserts the account and all owned relations.
    fn create_account(&self, account: &Account) -> RepoResult<AccountId>;
    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>>;
    /// Loads accounts with relations, ordered by id. Unknown ids are skipped.
    fn load_accounts(&self, ids: &[AccountId]) -> RepoResult<Vec<Account>>;
    fn delete_account(&self, id: AccountId) -> RepoResult<()>;
}

pub struct SqliteAccountRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccountRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_chunk(&self, ids: &[AccountId]) -> RepoResult<Vec<Account>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ACCOUNT_SELECT_SQL} WHERE id IN ({}) ORDER BY id ASC;",
            placeholders(ids.len())
        ))?;
        let mut rows = stmt.query(params_from_iter(id_values(ids)))?;
        let mut accounts = Vec::new();
        let mut assignees = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let account = parse_account_row(row)?;
            if let Some(user_id) = row.get::<_, Option<i64>>("assigned_to_id")? {
                assignees.insert(account.id, user_id);
            }
            accounts.push(account);
        }

        let user_ids = assignees.values().copied().collect::<BTreeSet<_>>();
        let users = SqliteUserRepository::new(self.conn)
            .load_users(&user_ids.into_iter().collect::<Vec<_>>())?
            .into_iter()
            .map(|user| (user.id, user))
            .collect::<BTreeMap<_, _>>();

        let mut addresses = self.load_relation(ids, "account_addresses", "street, street_number, postal_code, city, country", |row| {
            Ok(Address {
                id: row.get(1)?,
                street: row.get(2)?,
                street_number: row.get(3)?,
                postal_code: row.get(4)?,
                city: row.get(5)?,
                country: row.get(6)?,
            })
        })?;
        let mut phone_numbers = self.load_relation(ids, "account_phone_numbers", "number", |row| {
            Ok(PhoneNumber {
                id: row.get(1)?,
                number: row.get(2)?,
            })
        })?;
        let mut email_addresses =
            self.load_relation(ids, "account_email_addresses", "email_address", |row| {
                Ok(EmailAddress {
                    id: row.get(1)?,
                    email_address: row.get(2)?,
                })
            })?;
        let mut websites = self.load_relation(ids, "account_websites", "website", |row| {
            Ok(Website {
                id: row.get(1)?,
                website: row.get(2)?,
            })
        })?;
        let mut social_media =
            self.load_relation(ids, "account_social_media", "name, username", |row| {
                Ok(SocialMedia {
                    id: row.get(1)?,
                    name: row.get(2)?,
                    username: row.get(3)?,
                })
            })?;
        let mut tags = self.load_relation(ids, "account_tags", "name", |row| {
            Ok(Tag {
                id: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        let mut contacts = self.load_contacts(ids)?;

        for account in &mut accounts {
            let id = account.id;
            account.assigned_to = assignees
                .get(&id)
                .and_then(|user_id| users.get(user_id))
                .cloned();
            account.addresses = addresses.remove(&id).unwrap_or_default();
            account.phone_numbers = phone_numbers.remove(&id).unwrap_or_default();
            account.email_addresses = email_addresses.remove(&id).unwrap_or_default();
            account.websites = websites.remove(&id).unwrap_or_default();
            account.social_media = social_media.remove(&id).unwrap_or_default();
            account.tags = tags.remove(&id).unwrap_or_default();
            account.contacts = contacts.remove(&id).unwrap_or_default();
        }

        Ok(accounts)
    }

    /// Loads one owned relation table; `columns` follow `account_id, id`.
    fn load_relation<T>(
        &self,
        ids: &[AccountId],
        table: &str,
        columns: &str,
        parse: impl Fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> RepoResult<BTreeMap<AccountId, Vec<T>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT account_id, id, {columns} FROM {table}
             WHERE account_id IN ({})
             ORDER BY id ASC;",
            placeholders(ids.len())
        ))?;
        let mut rows = stmt.query(params_from_iter(id_values(ids)))?;
        let mut grouped: BTreeMap<AccountId, Vec<T>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            grouped.entry(row.get(0)?).or_default().push(parse(row)?);
        }
        Ok(grouped)
    }

    fn load_contacts(&self, ids: &[AccountId]) -> RepoResult<BTreeMap<AccountId, Vec<i64>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT account_id, contact_id FROM account_contacts
             WHERE account_id IN ({})
             ORDER BY contact_id ASC;",
            placeholders(ids.len())
        ))?;
        let mut rows = stmt.query(params_from_iter(id_values(ids)))?;
        let mut grouped: BTreeMap<AccountId, Vec<i64>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            grouped.entry(row.get(0)?).or_default().push(row.get(1)?);
        }
        Ok(grouped)
    }
}

impl AccountRepository for SqliteAccountRepository<'_> {
    fn create_account(&self, account: &Account) -> RepoResult<AccountId> {
        if account.name.trim().is_empty() {
            return Err(RepoError::InvalidData {
                entity: "account",
                message: format!("account {} has an empty name", account.id),
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO accounts (
                id,
                tenant_id,
                customer_id,
                name,
                flatname,
                description,
                legalentity,
                taxnumber,
                bankaccountnumber,
                bic,
                iban,
                cocnumber,
                status_id,
                assigned_to_id,
                is_deleted,
                created,
                modified
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);",
            params![
                account.id,
                account.tenant_id,
                account.customer_id,
                account.name.as_str(),
                account.flatname.as_deref(),
                account.description.as_deref(),
                account.legalentity.as_deref(),
                account.taxnumber.as_deref(),
                account.bankaccountnumber.as_deref(),
                account.bic.as_deref(),
                account.iban.as_deref(),
                account.cocnumber.as_deref(),
                account.status_id,
                account.assigned_to.as_ref().map(|user| user.id),
                bool_to_int(account.is_deleted),
                account.created.as_str(),
                account.modified.as_str(),
            ],
        )?;

        for address in &account.addresses {
            tx.execute(
                "INSERT INTO account_addresses (id, account_id, street, street_number, postal_code, city, country)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    address.id,
                    account.id,
                    address.street.as_str(),
                    address.street_number.as_str(),
                    address.postal_code.as_str(),
                    address.city.as_str(),
                    address.country.as_str(),
                ],
            )?;
        }
        for phone in &account.phone_numbers {
            tx.execute(
                "INSERT INTO account_phone_numbers (id, account_id, number) VALUES (?1, ?2, ?3);",
                params![phone.id, account.id, phone.number.as_str()],
            )?;
        }
        for email in &account.email_addresses {
            tx.execute(
                "INSERT INTO account_email_addresses (id, account_id, email_address) VALUES (?1, ?2, ?3);",
                params![email.id, account.id, email.email_address.as_str()],
            )?;
        }
        for website in &account.websites {
            tx.execute(
                "INSERT INTO account_websites (id, account_id, website) VALUES (?1, ?2, ?3);",
                params![website.id, account.id, website.website.as_str()],
            )?;
        }
        for profile in &account.social_media {
            tx.execute(
                "INSERT INTO account_social_media (id, account_id, name, username) VALUES (?1, ?2, ?3, ?4);",
                params![
                    profile.id,
                    account.id,
                    profile.name.as_str(),
                    profile.username.as_str()
                ],
            )?;
        }
        for tag in &account.tags {
            tx.execute(
                "INSERT INTO account_tags (id, account_id, name) VALUES (?1, ?2, ?3);",
                params![tag.id, account.id, tag.name.as_str()],
            )?;
        }
        for contact_id in &account.contacts {
            tx.execute(
                "INSERT INTO account_contacts (account_id, contact_id) VALUES (?1, ?2);",
                params![account.id, contact_id],
            )?;
        }
        tx.commit()?;

        Ok(account.id)
    }

    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>> {
        Ok(self.load_accounts(&[id])?.into_iter().next())
    }

    fn load_accounts(&self, ids: &[AccountId]) -> RepoResult<Vec<Account>> {
        let mut accounts = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(LOAD_CHUNK_SIZE) {
            accounts.extend(self.load_chunk(chunk)?);
        }
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }

    fn delete_account(&self, id: AccountId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM accounts WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "account",
                id,
            });
        }
        Ok(())
    }
}

fn parse_account_row(row: &Row<'_>) -> RepoResult<Account> {
    let is_deleted = int_to_bool("account", "accounts.is_deleted", row.get("is_deleted")?)?;

    Ok(Account {
        id: row.get("id")?,
        tenant_id: row.get("tenant_id")?,
        customer_id: row.get("customer_id")?,
        name: row.get("name")?,
        flatname: row.get("flatname")?,
        description: row.get("description")?,
        legalentity: row.get("legalentity")?,
        taxnumber: row.get("taxnumber")?,
        bankaccountnumber: row.get("bankaccountnumber")?,
        bic: row.get("bic")?,
        iban: row.get("iban")?,
        cocnumber: row.get("cocnumber")?,
        status_id: row.get("status_id")?,
        assigned_to: None,
        is_deleted,
        created: row.get("created")?,
        modified: row.get("modified")?,
        addresses: Vec::new(),
        phone_numbers: Vec::new(),
        email_addresses: Vec::new(),
        websites: Vec::new(),
        social_media: Vec::new(),
        tags: Vec::new(),
        contacts: Vec::new(),
    })
}
