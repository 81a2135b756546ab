//! User storage backed by SQLite
//!
//! All writes to a user row go through a version check, so two callers
//! racing on the same record cannot silently overwrite each other: the
//! loser gets [`Error::EditConflict`] and has to re-read.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::types::{NewUser, User};

/// Upper bound on any single database operation.
const DB_OP_TIMEOUT: Duration = Duration::from_secs(3);

/// Storage interface for user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new, unactivated user. The store assigns `id`,
    /// `created_at` and the initial `version`.
    async fn insert(&self, new_user: NewUser) -> Result<User>;

    /// Fetch a user by email address.
    async fn get_by_email(&self, email: &str) -> Result<User>;

    /// Fetch a user by id.
    async fn get_by_id(&self, user_id: i64) -> Result<User>;

    /// Persist changed fields of `user`, conditioned on the version the
    /// caller read. On success the bumped version is written back into
    /// `user`; a stale version yields [`Error::EditConflict`].
    async fn update(&self, user: &mut User) -> Result<()>;
}

/// SQLite-backed user store
#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Open (creating if necessary) the users database at `database_url`.
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, 5).await
    }

    /// Open the users database with an explicit pool size.
    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                activated INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn insert(&self, new_user: NewUser) -> Result<User> {
        let query = sqlx::query_as::<_, (i64, DateTime<Utc>, i64)>(
            r#"
            INSERT INTO users (created_at, name, email, activated)
            VALUES (?, ?, ?, ?)
            RETURNING id, created_at, version
            "#,
        )
        .bind(Utc::now())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(false)
        .fetch_one(&self.pool);

        let (id, created_at, version) = timeout(DB_OP_TIMEOUT, query)
            .await
            .map_err(|_| Error::DatabaseTimeout)?
            .map_err(into_store_error)?;

        Ok(User {
            id,
            created_at,
            name: new_user.name,
            email: new_user.email,
            activated: false,
            version,
        })
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        let query = sqlx::query_as::<_, User>(
            r#"
            SELECT id, created_at, name, email, activated, version
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool);

        timeout(DB_OP_TIMEOUT, query)
            .await
            .map_err(|_| Error::DatabaseTimeout)??
            .ok_or(Error::RecordNotFound)
    }

    async fn get_by_id(&self, user_id: i64) -> Result<User> {
        let query = sqlx::query_as::<_, User>(
            r#"
            SELECT id, created_at, name, email, activated, version
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool);

        timeout(DB_OP_TIMEOUT, query)
            .await
            .map_err(|_| Error::DatabaseTimeout)??
            .ok_or(Error::RecordNotFound)
    }

    async fn update(&self, user: &mut User) -> Result<()> {
        let query = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET name = ?, email = ?, activated = ?, version = version + 1
            WHERE id = ? AND version = ?
            RETURNING version
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.activated)
        .bind(user.id)
        .bind(user.version)
        .fetch_optional(&self.pool);

        let new_version = timeout(DB_OP_TIMEOUT, query)
            .await
            .map_err(|_| Error::DatabaseTimeout)?
            .map_err(into_store_error)?
            .ok_or(Error::EditConflict)?;

        user.version = new_version;
        Ok(())
    }
}

/// A unique-index violation can only come from the email column, so it
/// surfaces as the duplicate-email error rather than a generic one.
fn into_store_error(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Error::DuplicateEmail,
        _ => Error::Database(err),
    }
}
