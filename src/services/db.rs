// src/services/db.rs
use crate::models::{CacheKey, CachedEntry, CalculationOperation, GoalPlan};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        StoreError {
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::new(format!("database error: {}", e))
    }
}

/// Append-only record of calculation results keyed by (amount, horizon).
/// Entries are never updated or evicted.
#[async_trait]
pub trait CalculationStore: Send + Sync {
    /// All entries for the key in append order, oldest first.
    async fn find_entries(&self, key: &CacheKey) -> Result<Vec<CachedEntry>, StoreError>;

    async fn append_entry(
        &self,
        key: CacheKey,
        operation: CalculationOperation,
        payload: String,
    ) -> Result<CachedEntry, StoreError>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn save_plan(&self, plan: &GoalPlan) -> Result<(), StoreError>;

    async fn get_plan(&self, id: Uuid) -> Result<Option<GoalPlan>, StoreError>;
}

/// Process-local store backing both traits. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<Vec<CachedEntry>>,
    plans: RwLock<HashMap<Uuid, GoalPlan>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn plan_count(&self) -> usize {
        self.plans.read().map(|plans| plans.len()).unwrap_or(0)
    }
}

fn poisoned(table: &str) -> StoreError {
    StoreError::new(format!("{} table lock poisoned", table))
}

#[async_trait]
impl CalculationStore for MemoryStore {
    async fn find_entries(&self, key: &CacheKey) -> Result<Vec<CachedEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned("calculation"))?;
        // The Vec is only ever pushed to, so its order is the append order.
        Ok(entries.iter().filter(|entry| entry.key == *key).cloned().collect())
    }

    async fn append_entry(
        &self,
        key: CacheKey,
        operation: CalculationOperation,
        payload: String,
    ) -> Result<CachedEntry, StoreError> {
        let entry = CachedEntry {
            id: Uuid::new_v4(),
            key,
            operation,
            payload,
            created_at: Utc::now(),
        };
        self.entries
            .write()
            .map_err(|_| poisoned("calculation"))?
            .push(entry.clone());
        Ok(entry)
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn save_plan(&self, plan: &GoalPlan) -> Result<(), StoreError> {
        self.plans
            .write()
            .map_err(|_| poisoned("plan"))?
            .insert(plan.id, plan.clone());
        Ok(())
    }

    async fn get_plan(&self, id: Uuid) -> Result<Option<GoalPlan>, StoreError> {
        let plans = self.plans.read().map_err(|_| poisoned("plan"))?;
        Ok(plans.get(&id).cloned())
    }
}

/// SQLite-backed store. Calculation rows carry an autoincrement `seq`, which
/// fixes the earliest-first order independently of the wall clock.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `url`, e.g.
    /// `sqlite://data/planner.db`, and ensures the schema exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(10));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = SqliteStore { pool };
        store.initialize().await?;
        info!("Connected to plan database at {}", url);
        Ok(store)
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS calculation_cache (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                amount TEXT NOT NULL,
                horizon_years INTEGER NOT NULL,
                operation TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_calculation_cache_key
                ON calculation_cache (amount, horizon_years, seq);",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS goal_plans (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// 50000 and 50000.00 are the same key.
fn amount_column(amount: Decimal) -> String {
    amount.normalize().to_string()
}

fn entry_from_row(row: &SqliteRow) -> Result<CachedEntry, StoreError> {
    let id: String = row.try_get("id")?;
    let amount: String = row.try_get("amount")?;
    let horizon_years: i64 = row.try_get("horizon_years")?;
    let operation: String = row.try_get("operation")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(CachedEntry {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::new(format!("bad entry id {}: {}", id, e)))?,
        key: CacheKey {
            amount: Decimal::from_str(&amount)
                .map_err(|e| StoreError::new(format!("bad amount {} in entry {}: {}", amount, id, e)))?,
            horizon_years: u8::try_from(horizon_years)
                .map_err(|_| StoreError::new(format!("bad horizon {} in entry {}", horizon_years, id)))?,
        },
        operation: CalculationOperation::from_wire_name(&operation)
            .ok_or_else(|| StoreError::new(format!("unknown operation {} in entry {}", operation, id)))?,
        payload: row.try_get("payload")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| StoreError::new(format!("bad timestamp {} in entry {}: {}", created_at, id, e)))?
            .with_timezone(&Utc),
    })
}

#[async_trait]
impl CalculationStore for SqliteStore {
    async fn find_entries(&self, key: &CacheKey) -> Result<Vec<CachedEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, amount, horizon_years, operation, payload, created_at
             FROM calculation_cache
             WHERE amount = ? AND horizon_years = ?
             ORDER BY seq ASC",
        )
        .bind(amount_column(key.amount))
        .bind(i64::from(key.horizon_years))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn append_entry(
        &self,
        key: CacheKey,
        operation: CalculationOperation,
        payload: String,
    ) -> Result<CachedEntry, StoreError> {
        let entry = CachedEntry {
            id: Uuid::new_v4(),
            key,
            operation,
            payload,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO calculation_cache (id, amount, horizon_years, operation, payload, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(amount_column(key.amount))
        .bind(i64::from(key.horizon_years))
        .bind(operation.wire_name())
        .bind(entry.payload.clone())
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(entry)
    }
}

#[async_trait]
impl PlanStore for SqliteStore {
    async fn save_plan(&self, plan: &GoalPlan) -> Result<(), StoreError> {
        let payload = serde_json::to_string(plan)
            .map_err(|e| StoreError::new(format!("failed to serialize plan {}: {}", plan.id, e)))?;
        sqlx::query("INSERT OR REPLACE INTO goal_plans (id, payload, created_at) VALUES (?, ?, ?)")
            .bind(plan.id.to_string())
            .bind(payload)
            .bind(plan.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_plan(&self, id: Uuid) -> Result<Option<GoalPlan>, StoreError> {
        let row = sqlx::query("SELECT payload FROM goal_plans WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                serde_json::from_str(&payload)
                    .map(Some)
                    .map_err(|e| StoreError::new(format!("stored plan {} is unreadable: {}", id, e)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    fn key(amount: Decimal, horizon_years: u8) -> CacheKey {
        CacheKey { amount, horizon_years }
    }

    fn temp_db_url() -> (String, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("sip_goal_planner_{}.db", Uuid::new_v4()));
        (format!("sqlite://{}", path.display()), path)
    }

    #[tokio::test]
    async fn entries_come_back_oldest_first_for_matching_key_only() {
        let store = MemoryStore::new();
        let first = store
            .append_entry(key(dec!(50000), 3), CalculationOperation::SipFromFutureValue, "first".to_string())
            .await
            .unwrap();
        store
            .append_entry(key(dec!(50000), 4), CalculationOperation::SipFromFutureValue, "other".to_string())
            .await
            .unwrap();
        store
            .append_entry(key(dec!(50000), 3), CalculationOperation::FutureValueFromSip, "second".to_string())
            .await
            .unwrap();

        let found = store.find_entries(&key(dec!(50000), 3)).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, first.id);
        assert_eq!(found[1].payload, "second");
        assert_eq!(store.entry_count(), 3);
    }

    #[tokio::test]
    async fn append_order_wins_over_timestamps() {
        let store = MemoryStore::new();
        store
            .append_entry(key(dec!(50000), 3), CalculationOperation::SipFromFutureValue, "first".to_string())
            .await
            .unwrap();
        // Clock stepped backwards before the second append.
        store.entries.write().unwrap().push(CachedEntry {
            id: Uuid::new_v4(),
            key: key(dec!(50000), 3),
            operation: CalculationOperation::SipFromFutureValue,
            payload: "second".to_string(),
            created_at: Utc::now() - ChronoDuration::hours(1),
        });

        let found = store.find_entries(&key(dec!(50000), 3)).await.unwrap();
        assert_eq!(found[0].payload, "first");
    }

    #[tokio::test]
    async fn amount_scale_does_not_split_keys() {
        let store = MemoryStore::new();
        store
            .append_entry(key(dec!(50000), 3), CalculationOperation::SipFromFutureValue, "{}".to_string())
            .await
            .unwrap();
        assert_eq!(store.find_entries(&key(dec!(50000.00), 3)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_plan_is_none() {
        let store = MemoryStore::new();
        assert!(store.get_plan(Uuid::new_v4()).await.unwrap().is_none());
        assert_eq!(store.plan_count(), 0);
    }

    #[tokio::test]
    async fn sqlite_entries_keep_append_order_and_survive_reconnect() {
        let (url, path) = temp_db_url();
        let store = SqliteStore::connect(&url).await.unwrap();
        let first = store
            .append_entry(key(dec!(50000), 3), CalculationOperation::SipFromFutureValue, "first".to_string())
            .await
            .unwrap();
        // A later row stamped earlier than the first one.
        sqlx::query(
            "INSERT INTO calculation_cache (id, amount, horizon_years, operation, payload, created_at)
             VALUES (?, '50000', 3, 'calculate_fv_from_sip', 'second', ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind((Utc::now() - ChronoDuration::hours(1)).to_rfc3339())
        .execute(store.pool())
        .await
        .unwrap();
        store
            .append_entry(key(dec!(50000), 4), CalculationOperation::SipFromFutureValue, "other".to_string())
            .await
            .unwrap();
        drop(store);

        let reopened = SqliteStore::connect(&url).await.unwrap();
        let found = reopened.find_entries(&key(dec!(50000.00), 3)).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, first.id);
        assert_eq!(found[0].operation, CalculationOperation::SipFromFutureValue);
        assert_eq!(found[1].payload, "second");
        assert_eq!(found[1].operation, CalculationOperation::FutureValueFromSip);

        drop(reopened);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn sqlite_missing_plan_is_none() {
        let (url, path) = temp_db_url();
        let store = SqliteStore::connect(&url).await.unwrap();
        assert!(store.get_plan(Uuid::new_v4()).await.unwrap().is_none());
        drop(store);
        let _ = std::fs::remove_file(path);
    }
}
