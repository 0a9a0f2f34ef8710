use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartFilter, LedgerError, ProductId, Result, TransactionId, UserId,
    model::{CartLine, CouponBalance, HistoryEntry, LineState, StockRecord},
    store::{Accrual, CartStore, CouponLedger, DecrementOutcome, HistoryLedger, StockLedger},
    table::{Record, Table},
};

const CART_COLUMNS: &str = "user_id, product_id, quantity, is_checked_out, is_confirmed, created_at";
const HISTORY_COLUMNS: &str = "entry_id, transaction_id, product_id, user_id, quantity, is_checked_out, is_confirmed, created_at";

/// PostgreSQL-backed implementation of all four ledgers.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("ledger migrations applied");
        Ok(())
    }

    /// Sets the available stock for a product, creating the record if needed.
    ///
    /// Stock is owned by the product catalogue; this exists for seeding.
    pub async fn insert_stock(&self, product_id: ProductId, available_stock: u32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock (product_id, available_stock, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (product_id) DO UPDATE SET
                available_stock = EXCLUDED.available_stock,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(to_db_quantity(available_stock)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Empties every ledger table.
    pub async fn truncate_all(&self) -> Result<()> {
        let tables: Vec<&str> = Table::ALL.iter().map(Table::name).collect();
        let sql = format!("TRUNCATE TABLE {}, coupon_accruals", tables.join(", "));
        sqlx::raw_sql(&sql).execute(&self.pool).await?;
        Ok(())
    }

    fn row_to_stock(row: PgRow) -> Result<StockRecord> {
        let available: i32 = row.try_get("available_stock")?;
        Ok(StockRecord {
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            available_stock: from_db_quantity(StockRecord::TABLE, available)?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_line(row: PgRow) -> Result<CartLine> {
        let is_checked_out: bool = row.try_get("is_checked_out")?;
        let is_confirmed: bool = row.try_get("is_confirmed")?;
        let state = LineState::from_flags(is_checked_out, is_confirmed).ok_or_else(|| {
            LedgerError::Corrupt {
                table: CartLine::TABLE,
                reason: "line confirmed without checkout".to_string(),
            }
        })?;

        Ok(CartLine::at(
            UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            from_db_quantity(CartLine::TABLE, row.try_get("quantity")?)?,
            state,
            row.try_get("created_at")?,
        ))
    }

    fn row_to_balance(row: PgRow) -> Result<CouponBalance> {
        let amount: i64 = row.try_get("amount")?;
        Ok(CouponBalance {
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            amount: u64::try_from(amount).map_err(|_| LedgerError::Corrupt {
                table: CouponBalance::TABLE,
                reason: format!("negative amount {amount}"),
            })?,
            created_at: row.try_get("created_at")?,
            last_updated: row.try_get("last_updated")?,
        })
    }

    fn row_to_entry(row: PgRow) -> Result<HistoryEntry> {
        Ok(HistoryEntry {
            entry_id: row.try_get::<Uuid, _>("entry_id")?.into(),
            transaction_id: row.try_get::<Uuid, _>("transaction_id")?.into(),
            product_id: row.try_get::<Uuid, _>("product_id")?.into(),
            user_id: row.try_get::<Uuid, _>("user_id")?.into(),
            quantity: from_db_quantity(HistoryEntry::TABLE, row.try_get("quantity")?)?,
            is_checked_out: row.try_get("is_checked_out")?,
            is_confirmed: row.try_get("is_confirmed")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Builds the WHERE clause for a cart filter. Parameters start at `$1`
    /// and must be bound with [`bind_filter`].
    fn filter_clause(filter: &CartFilter) -> String {
        let mut sql = String::from(" WHERE user_id = $1");
        let mut param_count = 1;
        if filter.checked_out.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND is_checked_out = ${param_count}"));
        }
        if filter.confirmed.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND is_confirmed = ${param_count}"));
        }
        sql
    }
}

fn bind_filter<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    filter: &CartFilter,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query = query.bind(filter.user_id.as_uuid());
    if let Some(checked_out) = filter.checked_out {
        query = query.bind(checked_out);
    }
    if let Some(confirmed) = filter.confirmed {
        query = query.bind(confirmed);
    }
    query
}

fn to_db_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity)
        .map_err(|_| LedgerError::OutOfRange(format!("quantity {quantity}")))
}

fn from_db_quantity(table: Table, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| LedgerError::Corrupt {
        table,
        reason: format!("negative quantity {value}"),
    })
}

#[async_trait]
impl StockLedger for PostgresLedger {
    async fn get_stock(&self, product_id: ProductId) -> Result<Option<StockRecord>> {
        let row = sqlx::query(
            "SELECT product_id, available_stock, updated_at FROM stock WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_stock).transpose()
    }

    async fn decrement_if_sufficient(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<DecrementOutcome> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE stock
            SET available_stock = available_stock - $2, updated_at = NOW()
            WHERE product_id = $1 AND available_stock >= $2
            RETURNING available_stock
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(to_db_quantity(quantity)?)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(DecrementOutcome::Applied {
                remaining: from_db_quantity(StockRecord::TABLE, remaining)?,
            });
        }

        let available: Option<i32> =
            sqlx::query_scalar("SELECT available_stock FROM stock WHERE product_id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match available {
            Some(available) => Ok(DecrementOutcome::Insufficient {
                available: from_db_quantity(StockRecord::TABLE, available)?,
            }),
            None => Ok(DecrementOutcome::Missing),
        }
    }
}

#[async_trait]
impl CartStore for PostgresLedger {
    async fn get_line(&self, user_id: UserId, product_id: ProductId) -> Result<Option<CartLine>> {
        let sql =
            format!("SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1 AND product_id = $2");
        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_line).transpose()
    }

    async fn upsert_line(&self, line: CartLine) -> Result<CartLine> {
        let sql = format!(
            r#"
            INSERT INTO carts ({CART_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, product_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                is_checked_out = EXCLUDED.is_checked_out,
                is_confirmed = EXCLUDED.is_confirmed,
                created_at = EXCLUDED.created_at
            RETURNING {CART_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(line.user_id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(to_db_quantity(line.quantity)?)
            .bind(line.is_checked_out())
            .bind(line.is_confirmed())
            .bind(line.created_at)
            .fetch_one(&self.pool)
            .await?;

        Self::row_to_line(row)
    }

    async fn delete_line(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM carts WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_lines(&self, filter: CartFilter) -> Result<Vec<CartLine>> {
        let sql = format!(
            "SELECT {CART_COLUMNS} FROM carts{} ORDER BY created_at ASC, product_id ASC",
            Self::filter_clause(&filter)
        );
        let rows = bind_filter(sqlx::query(&sql), &filter)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_line).collect()
    }

    async fn delete_lines(&self, filter: CartFilter) -> Result<u64> {
        let sql = format!("DELETE FROM carts{}", Self::filter_clause(&filter));
        let result = bind_filter(sqlx::query(&sql), &filter)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CouponLedger for PostgresLedger {
    async fn get_balance(&self, user_id: UserId) -> Result<Option<CouponBalance>> {
        let row = sqlx::query(
            "SELECT user_id, amount, created_at, last_updated FROM coupons WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_balance).transpose()
    }

    async fn accrue(
        &self,
        user_id: UserId,
        amount: u64,
        idempotency_key: Option<&str>,
    ) -> Result<Accrual> {
        let amount = i64::try_from(amount)
            .map_err(|_| LedgerError::OutOfRange(format!("coupon amount {amount}")))?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        if let Some(key) = idempotency_key {
            let claimed = sqlx::query(
                r#"
                INSERT INTO coupon_accruals (user_id, idempotency_key, applied_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, idempotency_key) DO NOTHING
                "#,
            )
            .bind(user_id.as_uuid())
            .bind(key)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if claimed.rows_affected() == 0 {
                tracing::debug!(%user_id, key, "accrual already applied, skipping");
                let row = sqlx::query(
                    "SELECT user_id, amount, created_at, last_updated FROM coupons WHERE user_id = $1",
                )
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
                tx.commit().await?;

                let balance = match row {
                    Some(row) => Self::row_to_balance(row)?,
                    None => CouponBalance::opened(user_id, 0, now),
                };
                return Ok(Accrual {
                    balance,
                    applied: false,
                });
            }
        }

        let row = sqlx::query(
            r#"
            INSERT INTO coupons (user_id, amount, created_at, last_updated)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                amount = coupons.amount + EXCLUDED.amount,
                last_updated = EXCLUDED.last_updated
            RETURNING user_id, amount, created_at, last_updated
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(amount)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Accrual {
            balance: Self::row_to_balance(row)?,
            applied: true,
        })
    }
}

#[async_trait]
impl HistoryLedger for PostgresLedger {
    async fn append_batch(&self, entries: Vec<HistoryEntry>) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO history ({HISTORY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        );
        for entry in &entries {
            sqlx::query(&sql)
                .bind(entry.entry_id.as_uuid())
                .bind(entry.transaction_id.as_uuid())
                .bind(entry.product_id.as_uuid())
                .bind(entry.user_id.as_uuid())
                .bind(to_db_quantity(entry.quantity)?)
                .bind(entry.is_checked_out)
                .bind(entry.is_confirmed)
                .bind(entry.created_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e
                        && db_err.constraint() == Some("unique_transaction_product")
                    {
                        tracing::warn!(
                            transaction_id = %entry.transaction_id,
                            product_id = %entry.product_id,
                            "duplicate history entry rejected"
                        );
                        return LedgerError::DuplicateEntry {
                            transaction_id: entry.transaction_id,
                            product_id: entry.product_id,
                        };
                    }
                    LedgerError::Database(e)
                })?;
        }

        tx.commit().await?;
        Ok(entries.len())
    }

    async fn entries_for_user(&self, user_id: UserId) -> Result<Vec<HistoryEntry>> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM history WHERE user_id = $1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn entries_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<HistoryEntry>> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM history WHERE transaction_id = $1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(transaction_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }
}
