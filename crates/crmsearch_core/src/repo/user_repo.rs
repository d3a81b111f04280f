//! User repository contracts and SQLite implementation.

use super::{
    bool_to_int, id_values, int_to_bool, placeholders, RepoError, RepoResult, LOAD_CHUNK_SIZE,
};
use crate::model::user::{Team, User, UserId};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeMap;

const USER_SELECT_SQL: &str = "SELECT
    id,
    tenant_id,
    first_name,
    last_name,
    position,
    is_active,
    email,
    phone_number,
    internal_number
FROM users";

pub trait UserRepository {
    fn create_team(&self, team: &Team) -> RepoResult<i64>;
    /// Inserts the user and links it to `user.teams` (teams must exist).
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Loads users with teams, ordered by id. Unknown ids are skipped.
    fn load_users(&self, ids: &[UserId]) -> RepoResult<Vec<User>>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_chunk(&self, ids: &[UserId]) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL} WHERE id IN ({}) ORDER BY id ASC;",
            placeholders(ids.len())
        ))?;
        let mut rows = stmt.query(params_from_iter(id_values(ids)))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }

        let mut teams = self.load_teams(ids)?;
        for user in &mut users {
            user.teams = teams.remove(&user.id).unwrap_or_default();
        }
        Ok(users)
    }

    fn load_teams(&self, ids: &[UserId]) -> RepoResult<BTreeMap<UserId, Vec<Team>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT user_teams.user_id, teams.id, teams.name
             FROM user_teams
             JOIN teams ON teams.id = user_teams.team_id
             WHERE user_teams.user_id IN ({})
             ORDER BY teams.id ASC;",
            placeholders(ids.len())
        ))?;
        let mut rows = stmt.query(params_from_iter(id_values(ids)))?;
        let mut teams: BTreeMap<UserId, Vec<Team>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            teams.entry(row.get(0)?).or_default().push(Team {
                id: row.get(1)?,
                name: row.get(2)?,
            });
        }
        Ok(teams)
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_team(&self, team: &Team) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO teams (id, name) VALUES (?1, ?2);",
            params![team.id, team.name.as_str()],
        )?;
        Ok(team.id)
    }

    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO users (
                id,
                tenant_id,
                first_name,
                last_name,
                position,
                is_active,
                email,
                phone_number,
                internal_number
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                user.id,
                user.tenant_id,
                user.first_name.as_str(),
                user.last_name.as_str(),
                user.position.as_deref(),
                bool_to_int(user.is_active),
                user.email.as_str(),
                user.phone_number.as_deref(),
                user.internal_number.as_deref(),
            ],
        )?;
        for team in &user.teams {
            tx.execute(
                "INSERT INTO user_teams (user_id, team_id) VALUES (?1, ?2);",
                params![user.id, team.id],
            )?;
        }
        tx.commit()?;
        Ok(user.id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(self.load_users(&[id])?.into_iter().next())
    }

    fn load_users(&self, ids: &[UserId]) -> RepoResult<Vec<User>> {
        let mut users = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(LOAD_CHUNK_SIZE) {
            users.extend(self.load_chunk(chunk)?);
        }
        users.sort_by_key(|user| user.id);
        Ok(users)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let is_active = int_to_bool("user", "users.is_active", row.get("is_active")?)?;
    let email: String = row.get("email")?;
    if email.trim().is_empty() {
        let id: i64 = row.get("id")?;
        return Err(RepoError::InvalidData {
            entity: "user",
            message: format!("user {id} has an empty email"),
        });
    }

    Ok(User {
        id: row.get("id")?,
        tenant_id: row.get("tenant_id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        position: row.get("position")?,
        is_active,
        email,
        phone_number: row.get("phone_number")?,
        internal_number: row.get("internal_number")?,
        teams: Vec::new(),
    })
}
