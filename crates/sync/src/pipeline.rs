//! Order synchronization run: fetch, enrich, decide, persist.
//!
//! One run walks the order feed page by page over a lookback window,
//! inserting new merchant-fulfilled orders and applying status updates to
//! known ones. Each order is an error boundary - a failed order is logged
//! and skipped - but every database write of a run shares one transaction,
//! so a fatal error rolls the whole run back.

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use orderdeck_core::{FulfillmentChannel, OrderStatus, policy};

use crate::db::{NewOrderRow, OrderStore, StoreError, StoredOrder};
use crate::enrich::Enricher;
use crate::error::SyncError;
use crate::marketplace::{FeedOrder, MarketplaceApi, OrderListQuery};
use crate::shipping::ShippingApi;

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTotals {
    pub pages: u32,
    /// Order lines inserted.
    pub inserted: u64,
    /// Orders that received at least one update.
    pub updated: u64,
    /// Orders examined but left untouched (wrong channel, no applicable
    /// transition, or a skippable failure).
    pub skipped: u64,
}

enum Outcome {
    Inserted(u64),
    Updated,
    Skipped,
}

/// Drives one synchronization run against a marketplace and a store.
#[derive(Debug)]
pub struct OrderSync<M, S> {
    marketplace: M,
    shipping: S,
    lookback_days: i64,
    page_size: u32,
    cancel: CancellationToken,
}

/// Start of the order window: `lookback_days` before `now`, truncated to
/// midnight UTC so consecutive runs over the same day see a stable window.
fn window_start(now: DateTime<Utc>, lookback_days: i64) -> DateTime<Utc> {
    (now - chrono::Duration::days(lookback_days))
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

impl<M: MarketplaceApi, S: ShippingApi> OrderSync<M, S> {
    #[must_use]
    pub const fn new(
        marketplace: M,
        shipping: S,
        lookback_days: i64,
        page_size: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            marketplace,
            shipping,
            lookback_days,
            page_size,
            cancel,
        }
    }

    /// Run one synchronization pass.
    ///
    /// The caller owns the transaction: commit on `Ok`, drop (roll back)
    /// on `Err`.
    ///
    /// # Errors
    ///
    /// `SyncError::Canceled` when the cancellation token fires between
    /// orders; `Marketplace` when the feed itself cannot be read; `Store`
    /// when the database fails.
    pub async fn run<St: OrderStore>(&self, store: &mut St) -> Result<SyncTotals, SyncError> {
        let created_after = window_start(Utc::now(), self.lookback_days);
        info!(%created_after, "starting order sync run");

        let enricher = Enricher::new(&self.marketplace, &self.shipping);
        let mut totals = SyncTotals::default();
        let mut next_token: Option<String> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Canceled);
            }

            let query = OrderListQuery {
                created_after: next_token.is_none().then_some(created_after),
                next_token: next_token.take(),
                page_size: self.page_size,
            };
            let page = self.marketplace.list_orders(&query).await?;
            totals.pages += 1;
            debug!(page = totals.pages, orders = page.orders.len(), "page fetched");

            for order in &page.orders {
                if self.cancel.is_cancelled() {
                    return Err(SyncError::Canceled);
                }
                match self.process_order(order, &enricher, store).await {
                    Ok(Outcome::Inserted(lines)) => totals.inserted += lines,
                    Ok(Outcome::Updated) => totals.updated += 1,
                    Ok(Outcome::Skipped) => totals.skipped += 1,
                    Err(err) if is_fatal(&err) => return Err(err),
                    Err(err) => {
                        warn!(
                            order_id = %order.amazon_order_id,
                            error = %err,
                            "order failed, skipping"
                        );
                        totals.skipped += 1;
                    }
                }
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        info!(
            pages = totals.pages,
            inserted = totals.inserted,
            updated = totals.updated,
            skipped = totals.skipped,
            "sync run complete"
        );
        Ok(totals)
    }

    async fn process_order<St: OrderStore>(
        &self,
        order: &FeedOrder,
        enricher: &Enricher<'_, M, S>,
        store: &mut St,
    ) -> Result<Outcome, SyncError> {
        match store.find(&order.amazon_order_id).await? {
            Some(stored) => self.update_existing(order, &stored, enricher, store).await,
            None => self.insert_new(order, enricher, store).await,
        }
    }

    async fn insert_new<St: OrderStore>(
        &self,
        order: &FeedOrder,
        enricher: &Enricher<'_, M, S>,
        store: &mut St,
    ) -> Result<Outcome, SyncError> {
        let channel = FulfillmentChannel::from_feed(&order.fulfillment_channel);
        if channel != FulfillmentChannel::Merchant {
            debug!(
                order_id = %order.amazon_order_id,
                channel = %order.fulfillment_channel,
                "not merchant-fulfilled, skipping"
            );
            return Ok(Outcome::Skipped);
        }

        let Some(status) = OrderStatus::from_marketplace(&order.order_status) else {
            warn!(
                order_id = %order.amazon_order_id,
                status = %order.order_status,
                "unrecognized order status, skipping"
            );
            return Ok(Outcome::Skipped);
        };

        let items = enricher.enrich_order(&order.amazon_order_id).await?;
        if items.is_empty() {
            warn!(order_id = %order.amazon_order_id, "order has no items, skipping");
            return Ok(Outcome::Skipped);
        }

        let rows: Vec<NewOrderRow> = items
            .into_iter()
            .map(|item| {
                NewOrderRow::new(
                    order.amazon_order_id.clone(),
                    order.purchase_date,
                    status,
                    channel,
                    order.latest_ship_date,
                    item,
                )
            })
            .collect();

        let inserted = store.insert_rows(&rows).await?;
        info!(
            order_id = %order.amazon_order_id,
            status = %status,
            lines = inserted,
            "inserted new order"
        );
        Ok(Outcome::Inserted(inserted))
    }

    async fn update_existing<St: OrderStore>(
        &self,
        order: &FeedOrder,
        stored: &StoredOrder,
        enricher: &Enricher<'_, M, S>,
        store: &mut St,
    ) -> Result<Outcome, SyncError> {
        let Some(incoming) = OrderStatus::from_marketplace(&order.order_status) else {
            warn!(
                order_id = %order.amazon_order_id,
                status = %order.order_status,
                "unrecognized order status, skipping"
            );
            return Ok(Outcome::Skipped);
        };

        let mut touched = false;

        let decision = policy::decide(stored.order_status, incoming);
        if decision.apply {
            store
                .apply_status(
                    &order.amazon_order_id,
                    incoming,
                    order.latest_ship_date,
                    decision.zero_revenue,
                )
                .await?;
            info!(
                order_id = %order.amazon_order_id,
                from = %stored.order_status,
                to = %incoming,
                zero_revenue = decision.zero_revenue,
                "applied status transition"
            );
            touched = true;
        } else {
            debug!(
                order_id = %order.amazon_order_id,
                from = %stored.order_status,
                to = %incoming,
                "transition not applicable"
            );
        }

        // A zero stored fee means the estimate failed at insert time; retry
        // it now unless the order is headed to a zero-revenue status anyway.
        if stored.amazon_fee == Decimal::ZERO && !incoming.is_zero_revenue() {
            let items = enricher.enrich_order(&order.amazon_order_id).await?;
            for item in &items {
                if item.amazon_fee == Decimal::ZERO {
                    continue;
                }
                store
                    .backfill_fees(
                        &order.amazon_order_id,
                        &item.asin,
                        item.amazon_fee,
                        item.customer_shipping,
                    )
                    .await?;
                info!(
                    order_id = %order.amazon_order_id,
                    asin = %item.asin,
                    fee = %item.amazon_fee,
                    "backfilled fee estimate"
                );
                touched = true;
            }
        }

        Ok(if touched {
            Outcome::Updated
        } else {
            Outcome::Skipped
        })
    }
}

const fn is_fatal(err: &SyncError) -> bool {
    match err {
        SyncError::Store(store) => store.is_fatal(),
        SyncError::Canceled => true,
        SyncError::Credential(_) | SyncError::Marketplace(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::TimeZone;

    use crate::marketplace::types::Money;
    use crate::marketplace::{FeedItem, MarketplaceError, OrderPage};

    fn dec(s: &str) -> Decimal {
        s.parse().expect("decimal literal")
    }

    fn feed_order(id: &str, status: &str, channel: &str) -> FeedOrder {
        FeedOrder {
            amazon_order_id: id.to_string(),
            order_status: status.to_string(),
            fulfillment_channel: channel.to_string(),
            purchase_date: Utc.with_ymd_and_hms(2026, 8, 27, 14, 30, 0).single()
                .expect("valid timestamp"),
            latest_ship_date: None,
        }
    }

    fn feed_item(asin: &str, price: &str, quantity: i32) -> FeedItem {
        FeedItem {
            asin: asin.to_string(),
            seller_sku: format!("SKU-{asin}"),
            title: "Widget".to_string(),
            item_price: Some(Money::usd(dec(price))),
            quantity_ordered: quantity,
        }
    }

    /// In-memory marketplace: pages indexed by continuation token.
    struct FakeMarketplace {
        pages: Vec<OrderPage>,
        items: HashMap<String, Vec<FeedItem>>,
        fee: Decimal,
    }

    impl FakeMarketplace {
        fn single_page(orders: Vec<FeedOrder>) -> Self {
            Self {
                pages: vec![OrderPage {
                    orders,
                    next_token: None,
                }],
                items: HashMap::new(),
                fee: dec("7.50"),
            }
        }

        fn with_items(mut self, order_id: &str, items: Vec<FeedItem>) -> Self {
            self.items.insert(order_id.to_string(), items);
            self
        }
    }

    impl MarketplaceApi for FakeMarketplace {
        async fn list_orders(&self, query: &OrderListQuery) -> Result<OrderPage, MarketplaceError> {
            let index: usize = query
                .next_token
                .as_deref()
                .map_or(0, |t| t.parse().expect("numeric test token"));
            self.pages
                .get(index)
                .cloned()
                .ok_or_else(|| MarketplaceError::Shape("page out of range".to_string()))
        }

        async fn order_items(&self, order_id: &str) -> Result<Vec<FeedItem>, MarketplaceError> {
            Ok(self.items.get(order_id).cloned().unwrap_or_default())
        }

        async fn fee_estimate(&self, _: &str, _: Decimal) -> Result<Decimal, MarketplaceError> {
            Ok(self.fee)
        }
    }

    struct FlatShipping(Decimal);

    impl ShippingApi for FlatShipping {
        async fn customer_shipping(&self, _: &str) -> Decimal {
            self.0
        }
    }

    /// In-memory store mirroring the Postgres semantics the orchestrator
    /// relies on: first-line lookup, plain insert (the orchestrator's
    /// find() pre-check guards against duplicates), zeroing updates.
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<NewOrderRow>>,
        fail_inserts: bool,
    }

    impl MemoryStore {
        fn row_count(&self) -> usize {
            self.rows.lock().expect("store lock").len()
        }

        fn first_row(&self, order_id: &str) -> NewOrderRow {
            self.rows
                .lock()
                .expect("store lock")
                .iter()
                .find(|r| r.order_id == order_id)
                .cloned()
                .expect("row present")
        }
    }

    impl OrderStore for MemoryStore {
        async fn find(&mut self, order_id: &str) -> Result<Option<StoredOrder>, StoreError> {
            Ok(self
                .rows
                .lock()
                .expect("store lock")
                .iter()
                .find(|r| r.order_id == order_id)
                .map(|r| StoredOrder {
                    order_status: r.order_status,
                    amazon_fee: r.item.amazon_fee,
                }))
        }

        async fn insert_rows(&mut self, rows: &[NewOrderRow]) -> Result<u64, StoreError> {
            if self.fail_inserts {
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            let mut stored = self.rows.lock().expect("store lock");
            stored.extend(rows.iter().cloned());
            Ok(rows.len() as u64)
        }

        async fn apply_status(
            &mut self,
            order_id: &str,
            status: OrderStatus,
            latest_ship_date: Option<DateTime<Utc>>,
            zero_revenue: bool,
        ) -> Result<(), StoreError> {
            for row in self
                .rows
                .lock()
                .expect("store lock")
                .iter_mut()
                .filter(|r| r.order_id == order_id)
            {
                row.order_status = status;
                if latest_ship_date.is_some() {
                    row.latest_ship_date = latest_ship_date;
                }
                if zero_revenue {
                    row.item.amazon_price = Decimal::ZERO;
                    row.item.amazon_fee = Decimal::ZERO;
                }
            }
            Ok(())
        }

        async fn backfill_fees(
            &mut self,
            order_id: &str,
            asin: &str,
            fee: Decimal,
            shipping: Decimal,
        ) -> Result<(), StoreError> {
            for row in self
                .rows
                .lock()
                .expect("store lock")
                .iter_mut()
                .filter(|r| r.order_id == order_id && r.item.asin == asin)
            {
                row.item.amazon_fee = fee;
                row.item.customer_shipping = shipping;
            }
            Ok(())
        }
    }

    fn sync<M: MarketplaceApi, S: ShippingApi>(marketplace: M, shipping: S) -> OrderSync<M, S> {
        OrderSync::new(marketplace, shipping, 2, 100, CancellationToken::new())
    }

    #[test]
    fn test_window_start_truncates_to_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 15, 45, 30).single()
            .expect("valid timestamp");
        let start = window_start(now, 2);
        let expected = Utc.with_ymd_and_hms(2026, 8, 27, 0, 0, 0).single()
            .expect("valid timestamp");
        assert_eq!(start, expected);
    }

    #[tokio::test]
    async fn test_inserts_new_merchant_order() {
        let marketplace =
            FakeMarketplace::single_page(vec![feed_order("111-1", "Unshipped", "MFN")])
                .with_items("111-1", vec![feed_item("B000A", "49.99", 1)]);
        let sync = sync(marketplace, FlatShipping(dec("4.95")));
        let mut store = MemoryStore::default();

        let totals = sync.run(&mut store).await.expect("run succeeds");

        assert_eq!(totals.inserted, 1);
        assert_eq!(totals.updated, 0);
        let row = store.first_row("111-1");
        assert_eq!(row.order_status, OrderStatus::Unshipped);
        assert_eq!(row.item.amazon_price, dec("49.99"));
        assert_eq!(row.item.amazon_fee, dec("7.50"));
        assert_eq!(row.item.customer_shipping, dec("4.95"));
    }

    #[tokio::test]
    async fn test_skips_non_merchant_orders() {
        let marketplace =
            FakeMarketplace::single_page(vec![feed_order("111-2", "Unshipped", "AFN")]);
        let sync = sync(marketplace, FlatShipping(Decimal::ZERO));
        let mut store = MemoryStore::default();

        let totals = sync.run(&mut store).await.expect("run succeeds");

        assert_eq!(totals.inserted, 0);
        assert_eq!(totals.skipped, 1);
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let orders = vec![feed_order("111-3", "Unshipped", "MFN")];
        let items = vec![feed_item("B000B", "25.00", 2)];

        let mut store = MemoryStore::default();
        {
            let marketplace = FakeMarketplace::single_page(orders.clone())
                .with_items("111-3", items.clone());
            let sync = sync(marketplace, FlatShipping(Decimal::ZERO));
            sync.run(&mut store).await.expect("first run succeeds");
        }
        assert_eq!(store.row_count(), 1);

        let marketplace = FakeMarketplace::single_page(orders).with_items("111-3", items);
        let sync = sync(marketplace, FlatShipping(Decimal::ZERO));
        let totals = sync.run(&mut store).await.expect("second run succeeds");

        // Same status and a non-zero fee: nothing to insert or update.
        assert_eq!(totals.inserted, 0);
        assert_eq!(totals.updated, 0);
        assert_eq!(totals.skipped, 1);
        assert_eq!(store.row_count(), 1);
    }

    #[tokio::test]
    async fn test_pending_to_canceled_zeroes_revenue() {
        let mut store = MemoryStore::default();
        {
            let marketplace =
                FakeMarketplace::single_page(vec![feed_order("111-4", "Pending", "MFN")])
                    .with_items("111-4", vec![feed_item("B000C", "80.00", 1)]);
            let sync = sync(marketplace, FlatShipping(Decimal::ZERO));
            sync.run(&mut store).await.expect("insert run succeeds");
        }
        assert_eq!(store.first_row("111-4").item.amazon_price, dec("80.00"));

        let marketplace =
            FakeMarketplace::single_page(vec![feed_order("111-4", "Canceled", "MFN")]);
        let sync = sync(marketplace, FlatShipping(Decimal::ZERO));
        let totals = sync.run(&mut store).await.expect("update run succeeds");

        assert_eq!(totals.updated, 1);
        let row = store.first_row("111-4");
        assert_eq!(row.order_status, OrderStatus::Canceled);
        assert_eq!(row.item.amazon_price, Decimal::ZERO);
        assert_eq!(row.item.amazon_fee, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_shipped_feed_status_never_regresses_unshipped() {
        let mut store = MemoryStore::default();
        {
            let marketplace =
                FakeMarketplace::single_page(vec![feed_order("111-5", "Unshipped", "MFN")])
                    .with_items("111-5", vec![feed_item("B000D", "30.00", 1)]);
            let sync = sync(marketplace, FlatShipping(Decimal::ZERO));
            sync.run(&mut store).await.expect("insert run succeeds");
        }

        let marketplace =
            FakeMarketplace::single_page(vec![feed_order("111-5", "Shipped", "MFN")]);
        let sync = sync(marketplace, FlatShipping(Decimal::ZERO));
        let totals = sync.run(&mut store).await.expect("update run succeeds");

        // Shipping is recorded manually, not from the feed.
        assert_eq!(totals.updated, 0);
        assert_eq!(store.first_row("111-5").order_status, OrderStatus::Unshipped);
    }

    #[tokio::test]
    async fn test_zero_fee_gets_backfilled() {
        let mut store = MemoryStore::default();
        {
            // First run: fee estimation came back zero.
            let mut marketplace =
                FakeMarketplace::single_page(vec![feed_order("111-6", "Unshipped", "MFN")])
                    .with_items("111-6", vec![feed_item("B000E", "60.00", 1)]);
            marketplace.fee = Decimal::ZERO;
            let sync = sync(marketplace, FlatShipping(Decimal::ZERO));
            sync.run(&mut store).await.expect("insert run succeeds");
        }
        assert_eq!(store.first_row("111-6").item.amazon_fee, Decimal::ZERO);

        let marketplace =
            FakeMarketplace::single_page(vec![feed_order("111-6", "Unshipped", "MFN")])
                .with_items("111-6", vec![feed_item("B000E", "60.00", 1)]);
        let sync = sync(marketplace, FlatShipping(dec("3.00")));
        let totals = sync.run(&mut store).await.expect("backfill run succeeds");

        assert_eq!(totals.updated, 1);
        let row = store.first_row("111-6");
        assert_eq!(row.item.amazon_fee, dec("7.50"));
        assert_eq!(row.item.customer_shipping, dec("3.00"));
    }

    #[tokio::test]
    async fn test_follows_continuation_tokens() {
        let marketplace = FakeMarketplace {
            pages: vec![
                OrderPage {
                    orders: vec![feed_order("111-7", "Unshipped", "MFN")],
                    next_token: Some("1".to_string()),
                },
                OrderPage {
                    orders: vec![feed_order("111-8", "Unshipped", "MFN")],
                    next_token: None,
                },
            ],
            items: HashMap::from([
                ("111-7".to_string(), vec![feed_item("B000F", "10.00", 1)]),
                ("111-8".to_string(), vec![feed_item("B000G", "20.00", 1)]),
            ]),
            fee: dec("1.50"),
        };
        let sync = sync(marketplace, FlatShipping(Decimal::ZERO));
        let mut store = MemoryStore::default();

        let totals = sync.run(&mut store).await.expect("run succeeds");

        assert_eq!(totals.pages, 2);
        assert_eq!(totals.inserted, 2);
        assert_eq!(store.row_count(), 2);
    }

    #[tokio::test]
    async fn test_database_failure_aborts_run() {
        let marketplace =
            FakeMarketplace::single_page(vec![feed_order("111-9", "Unshipped", "MFN")])
                .with_items("111-9", vec![feed_item("B000H", "15.00", 1)]);
        let sync = sync(marketplace, FlatShipping(Decimal::ZERO));
        let mut store = MemoryStore {
            fail_inserts: true,
            ..MemoryStore::default()
        };

        let result = sync.run(&mut store).await;

        assert!(matches!(result, Err(SyncError::Store(_))));
        assert_eq!(store.row_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_run() {
        let marketplace =
            FakeMarketplace::single_page(vec![feed_order("111-10", "Unshipped", "MFN")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sync = OrderSync::new(marketplace, FlatShipping(Decimal::ZERO), 2, 100, cancel);
        let mut store = MemoryStore::default();

        let result = sync.run(&mut store).await;

        assert!(matches!(result, Err(SyncError::Canceled)));
    }

    #[tokio::test]
    async fn test_unrecognized_status_is_skipped() {
        let marketplace =
            FakeMarketplace::single_page(vec![feed_order("111-11", "InvoiceUnconfirmed", "MFN")]);
        let sync = sync(marketplace, FlatShipping(Decimal::ZERO));
        let mut store = MemoryStore::default();

        let totals = sync.run(&mut store).await.expect("run succeeds");

        assert_eq!(totals.skipped, 1);
        assert_eq!(store.row_count(), 0);
    }
}
