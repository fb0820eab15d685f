//! PostgreSQL store backed by `sqlx`.
//!
//! Array columns hold the member and checked-in sets. Set-union writes use
//! `array_append` guarded by `NOT (... = ANY(...))`, and the check-in count is
//! recomputed from the array inside the same `UPDATE`, so concurrent scans can
//! neither duplicate a member nor lose an increment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgPool, Row, postgres::PgRow};
use tracing::{Instrument, debug, info_span};

use super::{CheckInRecord, Classes, DeviceBindings, Sessions, Store, StoreError, Users};
use crate::attendance::model::{Caller, ClassRecord, DeviceBinding, NewClass, UserProfile};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const CLASS_COLUMNS: &str = "id, name, owner_id, owner_email, member_ids, \
    cardinality(member_ids)::BIGINT AS member_count, checked_in_ids, \
    checked_in_count, created_at, updated_at, last_checked_in_at";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema, one statement at a time.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        for statement in split_sql_statements(SCHEMA_SQL) {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        debug!("schema applied");
        Ok(())
    }
}

/// Splits a schema file into statements ending with `;`, dropping `--` comment lines.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

fn class_from_row(row: &PgRow) -> Result<ClassRecord, sqlx::Error> {
    Ok(ClassRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        owner_id: row.try_get("owner_id")?,
        owner_email: row.try_get("owner_email")?,
        member_ids: row.try_get("member_ids")?,
        member_count: row.try_get("member_count")?,
        checked_in_ids: row.try_get("checked_in_ids")?,
        checked_in_count: row.try_get("checked_in_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_checked_in_at: row.try_get("last_checked_in_at")?,
    })
}

fn binding_from_row(row: &PgRow) -> Result<DeviceBinding, sqlx::Error> {
    Ok(DeviceBinding {
        fingerprint: row.try_get("fingerprint")?,
        email: row.try_get("email")?,
    })
}

fn caller_from_row(row: &PgRow) -> Result<Caller, sqlx::Error> {
    Ok(Caller {
        user_id: row.try_get("user_id")?,
        email: row.try_get("email")?,
    })
}

#[async_trait]
impl DeviceBindings for PgStore {
    async fn get_binding(&self, fingerprint: &str) -> Result<Option<DeviceBinding>, StoreError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.table = "device_ids"
        );
        let row = sqlx::query("SELECT fingerprint, email FROM device_ids WHERE fingerprint = $1")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.as_ref().map(binding_from_row).transpose()?)
    }

    async fn bind_device(&self, fingerprint: &str, email: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO device_ids (fingerprint, email)
            VALUES ($1, $2)
            ON CONFLICT (fingerprint) DO NOTHING
            ",
        )
        .bind(fingerprint)
        .bind(email)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl Classes for PgStore {
    async fn create_class(&self, class: NewClass) -> Result<ClassRecord, StoreError> {
        let query = format!(
            r"
            INSERT INTO classes (id, name, owner_id, owner_email, member_ids, created_at, updated_at)
            VALUES ($1, $2, $3, $4, ARRAY[$3]::TEXT[], $5, $5)
            RETURNING {CLASS_COLUMNS}
            "
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.table = "classes"
        );
        let row = sqlx::query(&query)
            .bind(&class.id)
            .bind(&class.name)
            .bind(&class.owner_id)
            .bind(&class.owner_email)
            .bind(class.created_at)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;

        Ok(class_from_row(&row)?)
    }

    async fn get_class(&self, class_id: &str) -> Result<Option<ClassRecord>, StoreError> {
        let query = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(class_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(class_from_row).transpose()?)
    }

    async fn classes_for_user(&self, user_id: &str) -> Result<Vec<ClassRecord>, StoreError> {
        let query = format!(
            r"
            SELECT {CLASS_COLUMNS}
            FROM classes
            WHERE owner_id = $1 OR $1 = ANY(member_ids)
            ORDER BY created_at DESC
            "
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(class_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn record_check_in(
        &self,
        class_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<CheckInRecord, StoreError> {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.table = "classes"
        );
        // Right-hand references to `checked_in_ids` see the pre-update row, and a
        // concurrent writer makes Postgres re-check the WHERE clause on the new row.
        let updated = sqlx::query(
            r"
            UPDATE classes
            SET checked_in_ids = array_append(checked_in_ids, $2),
                checked_in_count = cardinality(checked_in_ids) + 1,
                last_checked_in_at = $3,
                updated_at = $3
            WHERE id = $1 AND NOT ($2 = ANY(checked_in_ids))
            RETURNING checked_in_count
            ",
        )
        .bind(class_id)
        .bind(user_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .instrument(span)
        .await?;

        if let Some(row) = updated {
            return Ok(CheckInRecord::CheckedIn {
                checked_in_count: row.try_get("checked_in_count")?,
            });
        }

        let exists = sqlx::query("SELECT 1 FROM classes WHERE id = $1")
            .bind(class_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        Ok(if exists {
            CheckInRecord::AlreadyCheckedIn
        } else {
            CheckInRecord::ClassNotFound
        })
    }
}

#[async_trait]
impl Users for PgStore {
    async fn user_exists(&self, user_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO users (id, email, display_name, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(&profile.id)
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl Sessions for PgStore {
    async fn insert_session(
        &self,
        token_hash: &[u8],
        caller: &Caller,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let purged = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?
            .rows_affected();
        if purged > 0 {
            debug!(purged, "expired sessions removed");
        }

        sqlx::query(
            r"
            INSERT INTO user_sessions (session_hash, user_id, email, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(token_hash)
        .bind(&caller.user_id)
        .bind(&caller.email)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<Caller>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT user_id, email
            FROM user_sessions
            WHERE session_hash = $1 AND expires_at > NOW()
            ",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(caller_from_row).transpose()?)
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM user_sessions WHERE session_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgresql"
    }
}
