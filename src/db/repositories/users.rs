use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Value, ErrorCode, Row};
use thiserror::Error;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_optional_datetime, storage_precision},
    models::{NewUser, User},
};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, created_at, last_login, is_active, consent_webcam";

/// A new account collides with an existing one on a unique column.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserConflict {
    #[error("username already exists")]
    Username,

    #[error("email already registered")]
    Email,
}

fn user_conflict(err: &rusqlite::Error) -> Option<UserConflict> {
    match err {
        rusqlite::Error::SqliteFailure(failure, Some(message))
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            if message.contains("users.username") {
                Some(UserConflict::Username)
            } else if message.contains("users.email") {
                Some(UserConflict::Email)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn row_to_user(row: &Row) -> Result<User> {
    let created_at: String = row.get("created_at")?;
    let last_login: Option<String> = row.get("last_login")?;

    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        last_login: parse_optional_datetime(last_login, "last_login")?,
        is_active: row.get("is_active")?,
        consent_webcam: row.get("consent_webcam")?,
    })
}

impl Database {
    /// Fails with a [`UserConflict`] at the root when the username or email
    /// is already in use.
    pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
        self.execute(move |conn| {
            let now = storage_precision(Utc::now());
            let inserted = conn.execute(
                "INSERT INTO users (username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    new_user.username,
                    new_user.email,
                    new_user.password_hash,
                    format_datetime(&now),
                ],
            );
            if let Err(err) = inserted {
                return Err(match user_conflict(&err) {
                    Some(conflict) => conflict.into(),
                    None => anyhow::Error::new(err)
                        .context(format!("failed to create user {}", new_user.username)),
                });
            }

            let user_id = conn.last_insert_rowid();
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![user_id])?;
            let user = match rows.next()? {
                Some(row) => row_to_user(row)?,
                None => return Err(anyhow!("User not found after insert")),
            };

            Ok(user)
        })
        .await
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>> {
        self.find_user("id = ?1", Value::Integer(user_id)).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_user("username = ?1", Value::Text(username.to_string())).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_user("email = ?1", Value::Text(email.to_string())).await
    }

    async fn find_user(&self, predicate: &'static str, value: Value) -> Result<Option<User>> {
        self.execute(move |conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![value])?;
            let user = match rows.next()? {
                Some(row) => Some(row_to_user(row)?),
                None => None,
            };

            Ok(user)
        })
        .await
    }

    pub async fn update_user_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "UPDATE users SET last_login = ?1 WHERE id = ?2",
                params![format_datetime(&at), user_id],
            )
            .with_context(|| "failed to update last login")?;
            Ok(())
        })
        .await
    }

    pub async fn update_user_consent(&self, user_id: i64, consent: bool) -> Result<()> {
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE users SET consent_webcam = ?1 WHERE id = ?2",
                params![consent, user_id],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("User {user_id} not found"));
            }
            Ok(())
        })
        .await
    }
}
