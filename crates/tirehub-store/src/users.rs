//! CRUD operations for [`User`] records.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::convert::{ts_from_db, ts_to_db, uuid_from_db};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;
use crate::table::Table;

const COLUMNS: &str = "id, email, first_name, last_name, role, created_at";

impl Database {
    /// Insert a new user.
    pub fn create_user(&self, user: &User) -> Result<()> {
        User::insert(self.conn(), user)
    }

    /// Fetch a single user by UUID.
    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List all users, oldest account first.
    pub fn list_users(&self) -> Result<Vec<User>> {
        User::select_all(self.conn())
    }
}

impl Table for User {
    const NAME: &'static str = "users";

    fn id(&self) -> Uuid {
        self.id
    }

    fn select_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    fn insert(conn: &Connection, user: &Self) -> Result<()> {
        conn.execute(
            &format!("INSERT INTO users ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                user.id.to_string(),
                user.email,
                user.first_name,
                user.last_name,
                user.role,
                ts_to_db(&user.created_at),
            ],
        )?;
        Ok(())
    }

    fn upsert(conn: &Connection, user: &Self) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO users ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    email = excluded.email,
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    role = excluded.role,
                    created_at = excluded.created_at"
            ),
            params![
                user.id.to_string(),
                user.email,
                user.first_name,
                user.last_name,
                user.role,
                ts_to_db(&user.created_at),
            ],
        )?;
        Ok(())
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("email must not be empty".into());
        }
        Ok(())
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(5)?;

    Ok(User {
        id: uuid_from_db(0, &id_str)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        role: row.get(4)?,
        created_at: ts_from_db(5, &created_str)?,
    })
}
