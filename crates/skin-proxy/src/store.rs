//! Postgres-backed username → uuid records

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mojang_textures::{StoreError, UuidRecord, UuidStore};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::info;

use crate::error::Result;

/// How long a lookup answer, positive or negative, stays valid
const RECORD_LIFETIME: TimeDelta = TimeDelta::days(30);

#[derive(Debug, Clone, FromRow)]
struct StoredUuid {
    username: String,
    uuid: Option<String>,
    stored_at: DateTime<Utc>,
}

impl StoredUuid {
    /// `None` once the record has outlived [`RECORD_LIFETIME`]
    fn into_fresh_record(self, now: DateTime<Utc>) -> Option<UuidRecord> {
        if now - self.stored_at >= RECORD_LIFETIME {
            return None;
        }

        Some(UuidRecord {
            username: self.username,
            uuid: self.uuid,
        })
    }
}

pub struct PgUuidStore {
    pool: PgPool,
}

impl PgUuidStore {
    /// Connect and make sure the table exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        info!("Database connection established");

        let store = Self { pool };
        store.ensure_schema().await?;

        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mojang_uuids (
                username_key TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                uuid TEXT,
                stored_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl UuidStore for PgUuidStore {
    async fn get_uuid_for_username(
        &self,
        username: &str,
    ) -> std::result::Result<Option<UuidRecord>, StoreError> {
        let row = sqlx::query_as::<_, StoredUuid>(
            "SELECT username, uuid, stored_at FROM mojang_uuids WHERE username_key = $1",
        )
        .bind(username.to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::new)?;

        Ok(row.and_then(|row| row.into_fresh_record(Utc::now())))
    }

    async fn store_uuid(
        &self,
        username: &str,
        uuid: Option<&str>,
    ) -> std::result::Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO mojang_uuids (username_key, username, uuid, stored_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (username_key) DO UPDATE SET
                username = EXCLUDED.username,
                uuid = EXCLUDED.uuid,
                stored_at = EXCLUDED.stored_at
            "#,
        )
        .bind(username.to_lowercase())
        .bind(username)
        .bind(uuid)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(StoreError::new)?;
        Ok(())
    }
}
