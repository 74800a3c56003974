use crate::config::DatabaseConfig;
use crate::relay::types::{MessageHistoryEntry, Service, Tenant, TenantRecord};
use anyhow::{anyhow, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::log::debug;

const SCHEMA_SQL: &str = include_str!("schemas/sqlite.sql");

pub struct RelayDatabase {
    pool: SqlitePool,
}
impl RelayDatabase {
    pub async fn connect(config: DatabaseConfig) -> Result<Self> {
        let connection_options = SqliteConnectOptions::new()
            .filename(&config.database_url)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(20)
            .min_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .test_before_acquire(true)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA temp_store = memory")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_with(connection_options)
            .await
            .map_err(|e| anyhow!(e))?;

        let db = Self { pool };
        db.init_tables().await?;
        Ok(db)
    }

    /// Single-connection pool, since every connection gets its own in-memory database.
    #[cfg(test)]
    pub(crate) async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().in_memory(true))
            .await
            .map_err(|e| anyhow!(e))?;

        let db = Self { pool };
        db.init_tables().await?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_tables(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;

        debug!("RelayDatabase tables initialized successfully!");
        Ok(())
    }

    /// Maps the receiving business number to a tenant. Zero rows is a plain
    /// miss, not an error: the platform delivers for unconfigured numbers too.
    pub async fn resolve_tenant(&self, routing_key: &str) -> Result<Option<i64>> {
        sqlx::query_scalar(
            "SELECT tenant_id FROM phone_mappings WHERE display_phone_number = ?",
        )
        .bind(routing_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))
    }

    /// Fetches the tenant together with its ordered services in one call, so
    /// the quota gate and the prompt never read two different snapshots.
    pub async fn get_tenant_record(&self, tenant_id: i64) -> Result<Option<TenantRecord>> {
        let tenant_row = sqlx::query(
            "SELECT tenant_id, business_name, working_hours, contact_phone, address, message_count, message_limit, last_message_at FROM tenants WHERE tenant_id = ?"
        )
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;

        let tenant_row = match tenant_row {
            Some(row) => row,
            None => return Ok(None),
        };

        let tenant = Tenant {
            tenant_id: tenant_row.get("tenant_id"),
            business_name: tenant_row.get("business_name"),
            working_hours: tenant_row.get("working_hours"),
            contact_phone: tenant_row.get("contact_phone"),
            address: tenant_row.get("address"),
            message_count: tenant_row.get("message_count"),
            message_limit: tenant_row.get("message_limit"),
            last_message_at: tenant_row.get("last_message_at"),
        };

        let services = sqlx::query(
            "SELECT name, price, duration FROM services WHERE tenant_id = ? ORDER BY position, service_id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?
        .into_iter()
        .map(|row| Service {
            name: row.get("name"),
            price: row.get("price"),
            duration: row.get("duration"),
        })
        .collect();

        Ok(Some(TenantRecord { tenant, services }))
    }

    /// Sets the counter to the caller-computed value and refreshes the
    /// activity timestamp. Last writer wins; see the pipeline race test.
    pub async fn update_message_count(&self, tenant_id: i64, new_count: i64) -> Result<()> {
        sqlx::query(
            "UPDATE tenants SET message_count = ?, last_message_at = unixepoch() WHERE tenant_id = ?",
        )
        .bind(new_count)
        .bind(tenant_id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok(())
    }

    pub async fn insert_history(&self, entry: &MessageHistoryEntry) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO message_history (tenant_id, sender_phone, user_message, bot_response) VALUES (?, ?, ?, ?)"
        )
            .bind(entry.tenant_id)
            .bind(&entry.sender_phone)
            .bind(&entry.user_message)
            .bind(&entry.bot_response)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;

        Ok(result.last_insert_rowid())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub async fn seed_tenant(db: &RelayDatabase, message_count: i64, message_limit: i64) -> i64 {
        let result = sqlx::query(
            "INSERT INTO tenants (business_name, working_hours, contact_phone, address, message_count, message_limit) VALUES (?, ?, ?, ?, ?, ?)"
        )
            .bind("Studio Bella Sobrancelhas")
            .bind("Seg a Sáb, 9h às 19h")
            .bind("+5511988887777")
            .bind("Rua das Flores, 123 - São Paulo")
            .bind(message_count)
            .bind(message_limit)
            .execute(db.pool())
            .await
            .expect("Tenant seed should insert");

        result.last_insert_rowid()
    }

    pub async fn seed_service(db: &RelayDatabase, tenant_id: i64, position: i64, name: &str) {
        sqlx::query(
            "INSERT INTO services (tenant_id, name, price, duration, position) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(tenant_id)
        .bind(name)
        .bind("R$ 50,00")
        .bind("40 min")
        .bind(position)
        .execute(db.pool())
        .await
        .expect("Service seed should insert");
    }

    pub async fn seed_mapping(db: &RelayDatabase, routing_key: &str, tenant_id: i64) {
        sqlx::query("INSERT INTO phone_mappings (display_phone_number, tenant_id) VALUES (?, ?)")
            .bind(routing_key)
            .bind(tenant_id)
            .execute(db.pool())
            .await
            .expect("Mapping seed should insert");
    }
}
