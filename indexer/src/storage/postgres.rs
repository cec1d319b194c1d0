//! Postgres store backed by sqlx.
//!
//! Queries are checked at runtime; the schema lives in `migrations/`.

use async_trait::async_trait;
use chainbook_sdk::{Order, PerpetualMarket};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::WriteSet;
use super::{Store, StoreError};

const MARKET_COLUMNS: &str = "id, clob_pair_id, ticker, market_id, status, \
    quantum_conversion_exponent, atomic_resolution, subticks_per_tick, \
    step_base_quantums, liquidity_tier, market_type";

const ORDER_COLUMNS: &str = "id, subaccount_id, client_id, clob_pair_id, side, size, \
    total_filled, price, type, status, time_in_force, reduce_only, order_flags, \
    good_til_block, good_til_block_time, created_at_height, client_metadata, \
    trigger_price, updated_at, updated_at_height";

/// Store over a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects a pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!("Connected to database with {} max connections", max_connections);
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

fn to_i64(value: u64, column: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn to_u32(value: i64, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn to_u64(value: i64, column: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn parse_column<T: std::str::FromStr>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: T::Err| StoreError::Corrupt(format!("{column}: {e}")))
}

fn market_from_row(row: &PgRow) -> Result<PerpetualMarket, StoreError> {
    let step: Decimal = row.try_get("step_base_quantums")?;
    Ok(PerpetualMarket {
        id: to_u32(row.try_get("id")?, "id")?,
        clob_pair_id: to_u32(row.try_get("clob_pair_id")?, "clob_pair_id")?,
        ticker: row.try_get("ticker")?,
        market_id: to_u32(row.try_get("market_id")?, "market_id")?,
        status: parse_column(row, "status")?,
        quantum_conversion_exponent: row.try_get("quantum_conversion_exponent")?,
        atomic_resolution: row.try_get("atomic_resolution")?,
        subticks_per_tick: to_u32(row.try_get("subticks_per_tick")?, "subticks_per_tick")?,
        step_base_quantums: u64::try_from(step)
            .map_err(|e| StoreError::Corrupt(format!("step_base_quantums: {e}")))?,
        liquidity_tier: to_u32(row.try_get("liquidity_tier")?, "liquidity_tier")?,
        market_type: parse_column(row, "market_type")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let good_til_block: Option<i64> = row.try_get("good_til_block")?;
    let created_at_height: Option<i64> = row.try_get("created_at_height")?;
    let updated_at_height: Option<i64> = row.try_get("updated_at_height")?;
    Ok(Order {
        id: row.try_get("id")?,
        subaccount_id: row.try_get("subaccount_id")?,
        client_id: to_u32(row.try_get("client_id")?, "client_id")?,
        clob_pair_id: to_u32(row.try_get("clob_pair_id")?, "clob_pair_id")?,
        side: parse_column(row, "side")?,
        size: row.try_get("size")?,
        total_filled: row.try_get("total_filled")?,
        price: row.try_get("price")?,
        order_type: parse_column(row, "type")?,
        status: parse_column(row, "status")?,
        time_in_force: parse_column(row, "time_in_force")?,
        reduce_only: row.try_get("reduce_only")?,
        order_flags: to_u32(row.try_get("order_flags")?, "order_flags")?,
        good_til_block: good_til_block
            .map(|v| to_u32(v, "good_til_block"))
            .transpose()?,
        good_til_block_time: row.try_get("good_til_block_time")?,
        created_at_height: created_at_height
            .map(|v| to_u64(v, "created_at_height"))
            .transpose()?,
        client_metadata: to_u32(row.try_get("client_metadata")?, "client_metadata")?,
        trigger_price: row.try_get("trigger_price")?,
        updated_at: row.try_get("updated_at")?,
        updated_at_height: updated_at_height
            .map(|v| to_u64(v, "updated_at_height"))
            .transpose()?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn load_markets(&self) -> Result<Vec<PerpetualMarket>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MARKET_COLUMNS} FROM perpetual_markets ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(market_from_row).collect()
    }

    async fn find_market(&self, id: u32) -> Result<Option<PerpetualMarket>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {MARKET_COLUMNS} FROM perpetual_markets WHERE id = $1"
        ))
        .bind(i64::from(id))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(market_from_row).transpose()
    }

    async fn find_market_by_clob_pair(
        &self,
        clob_pair_id: u32,
    ) -> Result<Option<PerpetualMarket>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {MARKET_COLUMNS} FROM perpetual_markets WHERE clob_pair_id = $1"
        ))
        .bind(i64::from(clob_pair_id))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(market_from_row).transpose()
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn latest_block_height(&self) -> Result<Option<u64>, StoreError> {
        let row = sqlx::query("SELECT MAX(block_height) AS height FROM blocks")
            .fetch_one(&self.pool)
            .await?;
        let height: Option<i64> = row.try_get("height")?;
        height.map(|h| to_u64(h, "block_height")).transpose()
    }

    async fn commit(&self, writes: WriteSet) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        if let Some(block) = &writes.block {
            sqlx::query("INSERT INTO blocks (block_height, time) VALUES ($1, $2)")
                .bind(to_i64(block.height, "block_height")?)
                .bind(block.time)
                .execute(&mut *tx)
                .await?;
        }

        for record in &writes.transactions {
            sqlx::query(
                "INSERT INTO transactions (block_height, transaction_index, transaction_hash) \
                 VALUES ($1, $2, $3)",
            )
            .bind(to_i64(record.block_height, "block_height")?)
            .bind(i64::from(record.transaction_index))
            .bind(record.transaction_hash.as_str())
            .execute(&mut *tx)
            .await?;
        }

        for record in &writes.events {
            sqlx::query(
                "INSERT INTO tendermint_events (id, block_height, transaction_index, event_index) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(record.id.as_slice())
            .bind(to_i64(record.block_height, "block_height")?)
            .bind(record.transaction_index)
            .bind(i64::from(record.event_index))
            .execute(&mut *tx)
            .await?;
        }

        for market in writes.markets.values() {
            sqlx::query(&format!(
                "INSERT INTO perpetual_markets ({MARKET_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
                 ON CONFLICT (id) DO UPDATE SET \
                 clob_pair_id = EXCLUDED.clob_pair_id, ticker = EXCLUDED.ticker, \
                 market_id = EXCLUDED.market_id, status = EXCLUDED.status, \
                 quantum_conversion_exponent = EXCLUDED.quantum_conversion_exponent, \
                 atomic_resolution = EXCLUDED.atomic_resolution, \
                 subticks_per_tick = EXCLUDED.subticks_per_tick, \
                 step_base_quantums = EXCLUDED.step_base_quantums, \
                 liquidity_tier = EXCLUDED.liquidity_tier, market_type = EXCLUDED.market_type"
            ))
            .bind(i64::from(market.id))
            .bind(i64::from(market.clob_pair_id))
            .bind(market.ticker.as_str())
            .bind(i64::from(market.market_id))
            .bind(market.status.as_str())
            .bind(market.quantum_conversion_exponent)
            .bind(market.atomic_resolution)
            .bind(i64::from(market.subticks_per_tick))
            .bind(Decimal::from(market.step_base_quantums))
            .bind(i64::from(market.liquidity_tier))
            .bind(market.market_type.as_str())
            .execute(&mut *tx)
            .await?;
        }

        for order in writes.orders.values() {
            sqlx::query(&format!(
                "INSERT INTO orders ({ORDER_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
                 $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) \
                 ON CONFLICT (id) DO UPDATE SET \
                 side = EXCLUDED.side, size = EXCLUDED.size, \
                 total_filled = EXCLUDED.total_filled, price = EXCLUDED.price, \
                 type = EXCLUDED.type, status = EXCLUDED.status, \
                 time_in_force = EXCLUDED.time_in_force, reduce_only = EXCLUDED.reduce_only, \
                 good_til_block = EXCLUDED.good_til_block, \
                 good_til_block_time = EXCLUDED.good_til_block_time, \
                 created_at_height = EXCLUDED.created_at_height, \
                 client_metadata = EXCLUDED.client_metadata, \
                 trigger_price = EXCLUDED.trigger_price, updated_at = EXCLUDED.updated_at, \
                 updated_at_height = EXCLUDED.updated_at_height"
            ))
            .bind(order.id)
            .bind(order.subaccount_id)
            .bind(i64::from(order.client_id))
            .bind(i64::from(order.clob_pair_id))
            .bind(order.side.as_str())
            .bind(order.size)
            .bind(order.total_filled)
            .bind(order.price)
            .bind(order.order_type.as_str())
            .bind(order.status.as_str())
            .bind(order.time_in_force.as_str())
            .bind(order.reduce_only)
            .bind(i64::from(order.order_flags))
            .bind(order.good_til_block.map(i64::from))
            .bind(order.good_til_block_time)
            .bind(
                order
                    .created_at_height
                    .map(|h| to_i64(h, "created_at_height"))
                    .transpose()?,
            )
            .bind(i64::from(order.client_metadata))
            .bind(order.trigger_price)
            .bind(order.updated_at)
            .bind(
                order
                    .updated_at_height
                    .map(|h| to_i64(h, "updated_at_height"))
                    .transpose()?,
            )
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            "Committed {} markets and {} orders",
            writes.markets.len(),
            writes.orders.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_conversions() {
        assert_eq!(to_u32(7, "id").expect("in range"), 7);
        assert!(matches!(to_u32(-1, "id"), Err(StoreError::Corrupt(_))));
        assert!(matches!(to_u32(i64::from(u32::MAX) + 1, "id"), Err(StoreError::Corrupt(_))));
        assert!(matches!(to_i64(u64::MAX, "height"), Err(StoreError::Corrupt(_))));
        assert_eq!(to_u64(42, "height").expect("in range"), 42);
    }

    #[test]
    fn test_column_lists_match_placeholders() {
        assert_eq!(MARKET_COLUMNS.split(',').count(), 11);
        assert_eq!(ORDER_COLUMNS.split(',').count(), 20);
    }
}
