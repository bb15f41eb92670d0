//! Order persistence inside the run's transaction.
//!
//! The store is a trait so the orchestrator can be exercised against an
//! in-memory implementation; [`PgOrderStore`] is the production one. A
//! `PgOrderStore` wraps a single transaction for the whole run - dropping
//! it without [`PgOrderStore::commit`] rolls everything back.
//!
//! The `orders` table is owned by the console side; this crate only writes
//! to it. The column set used here (`order_id`, `asin`, `sku`, supplier
//! costs, derived metrics) is the console's, and new orders are guarded by
//! the orchestrator's [`OrderStore::find`] pre-check rather than a unique
//! index the console does not maintain.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};

use orderdeck_core::{FinancialInputs, FinancialMetrics, FulfillmentChannel, OrderStatus};

use crate::db::StoreError;
use crate::enrich::PricedItem;

/// The slice of a stored order the pipeline needs for update decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOrder {
    pub order_status: OrderStatus,
    /// Fee on the first line of the order; zero means the fee estimate
    /// failed at insert time and should be backfilled.
    pub amazon_fee: Decimal,
}

/// One order line ready to insert.
#[derive(Debug, Clone)]
pub struct NewOrderRow {
    pub order_id: String,
    pub purchase_date: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub fulfillment_channel: FulfillmentChannel,
    pub latest_ship_date: Option<DateTime<Utc>>,
    pub item: PricedItem,
}

impl NewOrderRow {
    /// Build a row, zeroing the revenue figures when the incoming status
    /// produces no revenue (canceled/refunded).
    #[must_use]
    pub fn new(
        order_id: String,
        purchase_date: DateTime<Utc>,
        order_status: OrderStatus,
        fulfillment_channel: FulfillmentChannel,
        latest_ship_date: Option<DateTime<Utc>>,
        mut item: PricedItem,
    ) -> Self {
        if order_status.is_zero_revenue() {
            item.amazon_price = Decimal::ZERO;
            item.amazon_fee = Decimal::ZERO;
        }
        Self {
            order_id,
            purchase_date,
            order_status,
            fulfillment_channel,
            latest_ship_date,
            item,
        }
    }

    /// Derived metrics for this row. Zero-revenue statuses bypass the
    /// calculator entirely.
    #[must_use]
    pub fn metrics(&self) -> FinancialMetrics {
        if self.order_status.is_zero_revenue() {
            return FinancialMetrics::ZERO;
        }
        FinancialInputs {
            amazon_price: self.item.amazon_price,
            amazon_fee: self.item.amazon_fee,
            customer_shipping: self.item.customer_shipping,
            quantity: self.item.quantity,
            ..FinancialInputs::default()
        }
        .metrics()
    }
}

/// Persistence operations the orchestrator depends on.
pub trait OrderStore {
    /// Look up an order by its marketplace ID.
    fn find(
        &mut self,
        order_id: &str,
    ) -> impl Future<Output = Result<Option<StoredOrder>, StoreError>>;

    /// Insert order lines for an order that [`OrderStore::find`] reported
    /// absent. Returns the number of rows inserted.
    fn insert_rows(&mut self, rows: &[NewOrderRow]) -> impl Future<Output = Result<u64, StoreError>>;

    /// Apply a status transition. `zero_revenue` additionally zeroes the
    /// revenue figures and derived metrics on every line of the order.
    fn apply_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
        latest_ship_date: Option<DateTime<Utc>>,
        zero_revenue: bool,
    ) -> impl Future<Output = Result<(), StoreError>>;

    /// Write a late-arriving fee and shipping cost onto one line and
    /// recompute its derived metrics from the stored supplier costs.
    fn backfill_fees(
        &mut self,
        order_id: &str,
        asin: &str,
        fee: Decimal,
        shipping: Decimal,
    ) -> impl Future<Output = Result<(), StoreError>>;
}

const FIND_ORDER_SQL: &str =
    "SELECT order_status, amazon_fee FROM orders WHERE order_id = $1 LIMIT 1";

const INSERT_LINE_SQL: &str = "INSERT INTO orders ( \
         order_id, asin, sku, title, \
         purchase_date, latest_ship_date, \
         order_status, fulfillment_channel, quantity_sold, \
         amazon_price, amazon_fee, customer_shipping, \
         profit, margin, roi \
     ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)";

const APPLY_STATUS_ZERO_REVENUE_SQL: &str = "UPDATE orders SET order_status = $1, \
         latest_ship_date = COALESCE($2, latest_ship_date), \
         amazon_price = 0, amazon_fee = 0, \
         profit = 0, margin = 0, roi = 0 \
     WHERE order_id = $3";

const APPLY_STATUS_SQL: &str = "UPDATE orders SET order_status = $1, \
         latest_ship_date = COALESCE($2, latest_ship_date) \
     WHERE order_id = $3";

const BACKFILL_SELECT_SQL: &str = "SELECT amazon_price, supplier_price, supplier_tax, \
         supplier_shipping, quantity_sold \
     FROM orders WHERE order_id = $1 AND asin = $2";

const BACKFILL_UPDATE_SQL: &str = "UPDATE orders SET amazon_fee = $3, customer_shipping = $4, \
         profit = $5, margin = $6, roi = $7 \
     WHERE order_id = $1 AND asin = $2";

/// Postgres-backed store holding the run's transaction.
#[derive(Debug)]
pub struct PgOrderStore {
    tx: Transaction<'static, Postgres>,
}

impl PgOrderStore {
    /// Open the transaction for one sync run.
    ///
    /// # Errors
    ///
    /// `StoreError::Database` when no connection can be acquired.
    pub async fn begin(pool: &PgPool) -> Result<Self, StoreError> {
        Ok(Self {
            tx: pool.begin().await?,
        })
    }

    /// Commit the run. Dropping the store without calling this rolls the
    /// whole run back.
    ///
    /// # Errors
    ///
    /// `StoreError::Database` when the commit fails.
    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(StoreError::from)
    }
}

impl OrderStore for PgOrderStore {
    async fn find(&mut self, order_id: &str) -> Result<Option<StoredOrder>, StoreError> {
        let row = sqlx::query(FIND_ORDER_SQL)
            .bind(order_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(StoreError::from_query)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw_status: String = row.try_get("order_status")?;
        let order_status = raw_status
            .parse::<OrderStatus>()
            .map_err(StoreError::CorruptRow)?;
        let amazon_fee: Option<Decimal> = row.try_get("amazon_fee")?;

        Ok(Some(StoredOrder {
            order_status,
            amazon_fee: amazon_fee.unwrap_or(Decimal::ZERO),
        }))
    }

    async fn insert_rows(&mut self, rows: &[NewOrderRow]) -> Result<u64, StoreError> {
        let mut inserted = 0;
        for row in rows {
            let metrics = row.metrics();
            let result = sqlx::query(INSERT_LINE_SQL)
                .bind(&row.order_id)
                .bind(&row.item.asin)
                .bind(&row.item.seller_sku)
                .bind(&row.item.title)
                .bind(row.purchase_date)
                .bind(row.latest_ship_date)
                .bind(row.order_status.as_str())
                .bind(row.fulfillment_channel.as_feed_code())
                .bind(row.item.quantity)
                .bind(row.item.amazon_price)
                .bind(row.item.amazon_fee)
                .bind(row.item.customer_shipping)
                .bind(metrics.profit)
                .bind(metrics.margin)
                .bind(metrics.roi)
                .execute(&mut *self.tx)
                .await
                .map_err(StoreError::from_query)?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn apply_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
        latest_ship_date: Option<DateTime<Utc>>,
        zero_revenue: bool,
    ) -> Result<(), StoreError> {
        let query = if zero_revenue {
            APPLY_STATUS_ZERO_REVENUE_SQL
        } else {
            APPLY_STATUS_SQL
        };

        sqlx::query(query)
            .bind(status.as_str())
            .bind(latest_ship_date)
            .bind(order_id)
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::from_query)?;
        Ok(())
    }

    async fn backfill_fees(
        &mut self,
        order_id: &str,
        asin: &str,
        fee: Decimal,
        shipping: Decimal,
    ) -> Result<(), StoreError> {
        let row = sqlx::query(BACKFILL_SELECT_SQL)
            .bind(order_id)
            .bind(asin)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(StoreError::from_query)?;

        // The line may not exist if the feed and the table disagree.
        let Some(row) = row else {
            return Ok(());
        };

        let amazon_price: Option<Decimal> = row.try_get("amazon_price")?;
        let supplier_price: Option<Decimal> = row.try_get("supplier_price")?;
        let supplier_tax: Option<Decimal> = row.try_get("supplier_tax")?;
        let supplier_shipping: Option<Decimal> = row.try_get("supplier_shipping")?;
        let quantity_sold: Option<i32> = row.try_get("quantity_sold")?;

        let metrics = FinancialInputs {
            amazon_price: amazon_price.unwrap_or(Decimal::ZERO),
            amazon_fee: fee,
            supplier_price: supplier_price.unwrap_or(Decimal::ZERO),
            supplier_tax: supplier_tax.unwrap_or(Decimal::ZERO),
            supplier_shipping: supplier_shipping.unwrap_or(Decimal::ZERO),
            customer_shipping: shipping,
            quantity: quantity_sold.unwrap_or(1),
        }
        .metrics();

        sqlx::query(BACKFILL_UPDATE_SQL)
            .bind(order_id)
            .bind(asin)
            .bind(fee)
            .bind(shipping)
            .bind(metrics.profit)
            .bind(metrics.margin)
            .bind(metrics.roi)
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::from_query)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("decimal literal")
    }

    fn item(price: &str, fee: &str, shipping: &str, quantity: i32) -> PricedItem {
        PricedItem {
            asin: "B000TEST01".to_string(),
            seller_sku: "SKU-1".to_string(),
            title: "Widget".to_string(),
            amazon_price: dec(price),
            quantity,
            amazon_fee: dec(fee),
            customer_shipping: dec(shipping),
        }
    }

    #[test]
    fn test_new_row_zeroes_revenue_for_canceled() {
        let row = NewOrderRow::new(
            "111-0000000-0000000".to_string(),
            Utc::now(),
            OrderStatus::Canceled,
            FulfillmentChannel::Merchant,
            None,
            item("49.99", "7.48", "4.95", 1),
        );
        assert_eq!(row.item.amazon_price, Decimal::ZERO);
        assert_eq!(row.item.amazon_fee, Decimal::ZERO);
        assert_eq!(row.metrics(), FinancialMetrics::ZERO);
    }

    #[test]
    fn test_statements_use_console_table_columns() {
        // The orders table belongs to the console; its column names are
        // order_id and sku, and inserts rely on the find() pre-check
        // instead of a unique index the console does not maintain.
        let statements = [
            FIND_ORDER_SQL,
            INSERT_LINE_SQL,
            APPLY_STATUS_ZERO_REVENUE_SQL,
            APPLY_STATUS_SQL,
            BACKFILL_SELECT_SQL,
            BACKFILL_UPDATE_SQL,
        ];
        for sql in statements {
            assert!(!sql.contains("amazon_order_id"), "wrong id column: {sql}");
            assert!(!sql.contains("seller_sku"), "wrong sku column: {sql}");
        }
        assert!(FIND_ORDER_SQL.contains("order_id = $1"));
        assert!(INSERT_LINE_SQL.contains(" order_id, asin, sku, title,"));
        assert!(!INSERT_LINE_SQL.contains("ON CONFLICT"));
    }

    #[test]
    fn test_new_row_keeps_revenue_for_live_statuses() {
        let row = NewOrderRow::new(
            "111-0000000-0000001".to_string(),
            Utc::now(),
            OrderStatus::Unshipped,
            FulfillmentChannel::Merchant,
            None,
            item("100", "10", "5", 1),
        );
        assert_eq!(row.item.amazon_price, dec("100"));
        // revenue 90, cost 5
        assert_eq!(row.metrics().profit, dec("85"));
    }
}
