//! Stock reservation with revision-guarded decrements.
//!
//! Every reservation follows the same cycle:
//!
//! 1. read the product's current revision and the target row(s)
//! 2. check the requested quantity against the stock in that snapshot
//! 3. send a `dec` patch guarded by `ifRevisionID`
//! 4. on a revision conflict, start over, up to [`MAX_ATTEMPTS`] times
//!
//! The service holds no locks and no state between calls. Concurrent
//! requests are serialised by the store: at most one writer per revision
//! wins, the others re-read and re-check.

use std::collections::HashMap;

use pexpress_core::{
    OrderLine, Product, ProductId, Quantity, RowKey, Stock, coalesce_lines,
};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use super::store::DocumentStore;
use crate::sanity::{SanityError, StockPatch};

/// Total attempts (first try plus retries) before reporting a conflict.
pub const MAX_ATTEMPTS: u32 = 3;

/// Errors returned by the reservation service.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// Request was malformed.
    #[error("{0}")]
    InvalidInput(String),

    /// The product or the row does not exist.
    #[error("Product or flavor not found: {product_id}/{row_key}")]
    NotFound {
        product_id: ProductId,
        row_key: RowKey,
    },

    /// Not enough units in the snapshot that was read.
    #[error("Insufficient stock. Available: {available}, requested: {requested}")]
    InsufficientStock {
        product_id: ProductId,
        row_key: RowKey,
        available: Stock,
        requested: Quantity,
    },

    /// Every attempt lost the race against another writer.
    #[error(
        "Could not register the order. Updated stock: {current_stock} unit(s) available."
    )]
    Conflict { current_stock: Stock },

    /// The store failed for a reason other than a revision conflict.
    #[error(transparent)]
    Upstream(#[from] SanityError),
}

impl ReservationError {
    /// Stock hint to return alongside the error, where one applies.
    #[must_use]
    pub const fn current_stock(&self) -> Option<Stock> {
        match self {
            Self::InsufficientStock { available, .. } => Some(*available),
            Self::Conflict { current_stock } => Some(*current_stock),
            _ => None,
        }
    }
}

/// Outcome of a single-row reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// Stock left, computed from the snapshot the write was guarded on.
    pub new_stock: Stock,
}

/// Outcome for one line of a batch reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineReservation {
    pub product_id: ProductId,
    pub row_key: RowKey,
    pub new_stock: Stock,
}

/// Reserves stock against a [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct StockReservationService<S> {
    store: S,
    max_attempts: u32,
}

impl<S: DocumentStore> StockReservationService<S> {
    /// Create a service with the default attempt budget.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Override the attempt budget (at least one attempt is always made).
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Take `quantity` units out of one row.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the product or row is missing
    /// - `InsufficientStock` if the row holds fewer than `quantity` units
    /// - `Conflict` if every attempt hit a revision conflict
    /// - `Upstream` for any other store failure
    #[instrument(
        skip(self),
        fields(product_id = %product_id, row_key = %row_key, quantity = %quantity)
    )]
    pub async fn reserve(
        &self,
        product_id: &ProductId,
        row_key: &RowKey,
        quantity: Quantity,
    ) -> Result<Reservation, ReservationError> {
        let not_found = || ReservationError::NotFound {
            product_id: product_id.clone(),
            row_key: row_key.clone(),
        };
        let mut last_seen = Stock::ZERO;

        for attempt in 1..=self.max_attempts {
            let snapshot = self
                .store
                .fetch_row(product_id, row_key)
                .await?
                .ok_or_else(not_found)?;
            let row = snapshot.row.ok_or_else(not_found)?;
            last_seen = row.stock;

            let Some(new_stock) = row.stock.checked_take(quantity) else {
                return Err(ReservationError::InsufficientStock {
                    product_id: product_id.clone(),
                    row_key: row_key.clone(),
                    available: row.stock,
                    requested: quantity,
                });
            };

            let patch = StockPatch::new(product_id.clone(), snapshot.rev)
                .decrement(row_key.clone(), quantity);

            match self.store.commit(&[patch]).await {
                Ok(()) => {
                    tracing::info!(
                        product = %snapshot.product_name,
                        flavor = %row.flavor,
                        previous = %row.stock,
                        new_stock = %new_stock,
                        attempt,
                        "Stock reserved"
                    );
                    return Ok(Reservation { new_stock });
                }
                Err(err) if err.is_revision_conflict() => {
                    tracing::warn!(attempt, error = %err, "Revision conflict while reserving stock");
                }
                Err(err) => return Err(err.into()),
            }
        }

        let current_stock = self
            .latest_row_stock(product_id, row_key)
            .await
            .unwrap_or(last_seen);
        Err(ReservationError::Conflict { current_stock })
    }

    /// Reserve several lines in one all-or-nothing transaction.
    ///
    /// Lines for the same row are merged first. Each product gets one patch
    /// guarded by the revision it was read at; if any product changed, the
    /// whole batch is re-read and re-checked.
    ///
    /// # Errors
    ///
    /// As for [`StockReservationService::reserve`], plus `InvalidInput` for
    /// an empty batch. Checks run in line order and the first failing line
    /// is reported.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn reserve_lines(
        &self,
        lines: Vec<OrderLine>,
    ) -> Result<Vec<LineReservation>, ReservationError> {
        if lines.is_empty() {
            return Err(ReservationError::InvalidInput("no items".to_string()));
        }
        let lines =
            coalesce_lines(lines).map_err(|e| ReservationError::InvalidInput(e.to_string()))?;
        let ids = distinct_products(&lines);
        let mut last_seen = Stock::ZERO;

        for attempt in 1..=self.max_attempts {
            let products = self.store.fetch_products(&ids).await?;
            let plan = plan_batch(&lines, &products)?;
            last_seen = plan.first_stock;

            match self.store.commit(&plan.patches).await {
                Ok(()) => {
                    tracing::info!(
                        lines = plan.outcomes.len(),
                        products = plan.patches.len(),
                        attempt,
                        "Batch stock reserved"
                    );
                    return Ok(plan.outcomes);
                }
                Err(err) if err.is_revision_conflict() => {
                    tracing::warn!(attempt, error = %err, "Revision conflict while reserving batch");
                }
                Err(err) => return Err(err.into()),
            }
        }

        let current_stock = self.latest_batch_stock(&lines, &ids).await.unwrap_or(last_seen);
        Err(ReservationError::Conflict { current_stock })
    }

    /// Best-effort re-read after the attempts ran out.
    async fn latest_row_stock(&self, product_id: &ProductId, row_key: &RowKey) -> Option<Stock> {
        match self.store.fetch_row(product_id, row_key).await {
            Ok(snapshot) => snapshot.and_then(|s| s.row).map(|row| row.stock),
            Err(err) => {
                tracing::warn!(error = %err, "Could not re-read stock after conflict");
                None
            }
        }
    }

    /// Freshest stock for the first line that would now fail, else the
    /// first line.
    async fn latest_batch_stock(&self, lines: &[OrderLine], ids: &[ProductId]) -> Option<Stock> {
        let products = match self.store.fetch_products(ids).await {
            Ok(products) => products,
            Err(err) => {
                tracing::warn!(error = %err, "Could not re-read stock after conflict");
                return None;
            }
        };
        let by_id: HashMap<&ProductId, &Product> = products.iter().map(|p| (&p.id, p)).collect();
        let stock_of = |line: &OrderLine| {
            by_id
                .get(&line.product_id)
                .and_then(|p| p.row(&line.row_key))
                .map(|row| row.stock)
        };

        lines
            .iter()
            .find_map(|line| stock_of(line).filter(|stock| !stock.covers(line.quantity)))
            .or_else(|| lines.first().and_then(stock_of))
    }
}

/// Patches and expected outcomes for one batch attempt.
struct BatchPlan {
    patches: Vec<StockPatch>,
    outcomes: Vec<LineReservation>,
    first_stock: Stock,
}

fn plan_batch(lines: &[OrderLine], products: &[Product]) -> Result<BatchPlan, ReservationError> {
    let by_id: HashMap<&ProductId, &Product> = products.iter().map(|p| (&p.id, p)).collect();
    let mut patches: Vec<StockPatch> = Vec::new();
    let mut outcomes = Vec::with_capacity(lines.len());
    let mut first_stock = None;

    for line in lines {
        let not_found = || ReservationError::NotFound {
            product_id: line.product_id.clone(),
            row_key: line.row_key.clone(),
        };
        let product = by_id.get(&line.product_id).ok_or_else(not_found)?;
        let row = product.row(&line.row_key).ok_or_else(not_found)?;
        first_stock.get_or_insert(row.stock);

        let new_stock = row.stock.checked_take(line.quantity).ok_or_else(|| {
            ReservationError::InsufficientStock {
                product_id: line.product_id.clone(),
                row_key: line.row_key.clone(),
                available: row.stock,
                requested: line.quantity,
            }
        })?;

        let rev = product.rev.clone().ok_or_else(|| {
            SanityError::Parse(format!("product {} returned without _rev", product.id))
        })?;

        if let Some(patch) = patches.iter_mut().find(|p| p.product_id == line.product_id) {
            patch.push(line.row_key.clone(), line.quantity);
        } else {
            patches.push(
                StockPatch::new(line.product_id.clone(), rev)
                    .decrement(line.row_key.clone(), line.quantity),
            );
        }

        outcomes.push(LineReservation {
            product_id: line.product_id.clone(),
            row_key: line.row_key.clone(),
            new_stock,
        });
    }

    Ok(BatchPlan {
        patches,
        outcomes,
        first_stock: first_stock.unwrap_or_default(),
    })
}

fn distinct_products(lines: &[OrderLine]) -> Vec<ProductId> {
    let mut ids: Vec<ProductId> = Vec::new();
    for line in lines {
        if !ids.contains(&line.product_id) {
            ids.push(line.product_id.clone());
        }
    }
    ids
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::services::memory::MemoryStore;

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    fn p(id: &str) -> ProductId {
        ProductId::new(id)
    }

    fn k(key: &str) -> RowKey {
        RowKey::new(key)
    }

    fn line(product: &str, row: &str, n: u32) -> OrderLine {
        OrderLine {
            product_id: p(product),
            row_key: k(row),
            quantity: qty(n),
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_product("P1", "Pote 500ml", &[("R1", "Morango", json!(10)), ("R2", "Uva", json!(2))])
            .with_product("P2", "Picolé", &[("R1", "Limão", json!(5))])
    }

    #[tokio::test]
    async fn test_reserve_sequence_from_example() {
        let service = StockReservationService::new(store());

        let first = service.reserve(&p("P1"), &k("R1"), qty(4)).await.unwrap();
        assert_eq!(first.new_stock, Stock::new(6));

        let err = service.reserve(&p("P1"), &k("R1"), qty(7)).await.unwrap_err();
        assert!(matches!(
            err,
            ReservationError::InsufficientStock { available, .. } if available == Stock::new(6)
        ));
        assert_eq!(err.current_stock(), Some(Stock::new(6)));

        let last = service.reserve(&p("P1"), &k("R1"), qty(6)).await.unwrap();
        assert_eq!(last.new_stock, Stock::ZERO);
        assert_eq!(service.store().stock("P1", "R1"), Some(json!(0)));
    }

    #[tokio::test]
    async fn test_successful_reserve_decrements_once() {
        let service = StockReservationService::new(store());
        service.reserve(&p("P1"), &k("R2"), qty(2)).await.unwrap();

        assert_eq!(service.store().stock("P1", "R2"), Some(json!(0)));
        assert_eq!(service.store().commits(), 1);
        // Sibling row untouched.
        assert_eq!(service.store().stock("P1", "R1"), Some(json!(10)));
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_store_untouched() {
        let service = StockReservationService::new(store());
        let err = service.reserve(&p("P2"), &k("R1"), qty(6)).await.unwrap_err();

        assert!(matches!(err, ReservationError::InsufficientStock { .. }));
        assert_eq!(
            err.to_string(),
            "Insufficient stock. Available: 5, requested: 6"
        );
        assert_eq!(service.store().stock("P2", "R1"), Some(json!(5)));
        assert_eq!(service.store().commits(), 0);
    }

    #[tokio::test]
    async fn test_missing_product_or_row() {
        let service = StockReservationService::new(store());

        let err = service.reserve(&p("nope"), &k("R1"), qty(1)).await.unwrap_err();
        assert!(matches!(err, ReservationError::NotFound { .. }));

        let err = service.reserve(&p("P1"), &k("nope"), qty(1)).await.unwrap_err();
        assert!(matches!(err, ReservationError::NotFound { .. }));
        assert_eq!(service.store().commits(), 0);
    }

    #[tokio::test]
    async fn test_absent_or_junk_stock_reads_as_zero() {
        let store = MemoryStore::new().with_product(
            "P9",
            "Sem estoque",
            &[("blank", "Coco", serde_json::Value::Null), ("text", "Açaí", json!("12"))],
        );
        let service = StockReservationService::new(store);

        for key in ["blank", "text"] {
            let err = service.reserve(&p("P9"), &k(key), qty(1)).await.unwrap_err();
            assert_eq!(err.current_stock(), Some(Stock::ZERO), "row {key}");
        }
    }

    #[tokio::test]
    async fn test_retry_after_conflict_uses_fresh_snapshot() {
        let store = store();
        // Another clerk takes 3 units between our read and our write.
        store.queue_concurrent_write("P1", "R1", 3);
        let service = StockReservationService::new(store);

        let result = service.reserve(&p("P1"), &k("R1"), qty(4)).await.unwrap();

        assert_eq!(result.new_stock, Stock::new(3));
        assert_eq!(service.store().stock("P1", "R1"), Some(json!(3)));
        assert_eq!(service.store().reads(), 2);
    }

    #[tokio::test]
    async fn test_retry_rechecks_stock() {
        let store = store();
        store.queue_concurrent_write("P1", "R2", 2);
        let service = StockReservationService::new(store);

        let err = service.reserve(&p("P1"), &k("R2"), qty(1)).await.unwrap_err();
        assert!(matches!(
            err,
            ReservationError::InsufficientStock { available, .. } if available == Stock::ZERO
        ));
    }

    #[tokio::test]
    async fn test_conflict_after_three_attempts() {
        let store = store();
        for _ in 0..3 {
            store.queue_concurrent_write("P1", "R1", 1);
        }
        let service = StockReservationService::new(store);

        let err = service.reserve(&p("P1"), &k("R1"), qty(2)).await.unwrap_err();

        assert!(matches!(err, ReservationError::Conflict { .. }));
        // Three concurrent writers took one unit each; the re-read sees 7.
        assert_eq!(err.current_stock(), Some(Stock::new(7)));
        assert_eq!(service.store().commits(), 3);
        // Three attempts plus the best-effort re-read.
        assert_eq!(service.store().reads(), 4);
    }

    #[tokio::test]
    async fn test_conflict_falls_back_to_last_snapshot_when_reread_fails() {
        let store = store();
        for _ in 0..3 {
            store.queue_concurrent_write("P1", "R1", 1);
        }
        store.fail_reads_after(3);
        let service = StockReservationService::new(store);

        let err = service.reserve(&p("P1"), &k("R1"), qty(2)).await.unwrap_err();

        // Last successful read happened after two concurrent writes.
        assert_eq!(err.current_stock(), Some(Stock::new(8)));
    }

    #[tokio::test]
    async fn test_custom_attempt_budget() {
        let store = store();
        store.queue_concurrent_write("P1", "R1", 0);
        let service = StockReservationService::new(store).with_max_attempts(1);

        let err = service.reserve(&p("P1"), &k("R1"), qty(1)).await.unwrap_err();
        assert!(matches!(err, ReservationError::Conflict { .. }));
        assert_eq!(service.store().commits(), 1);
    }

    #[tokio::test]
    async fn test_upstream_errors_are_not_retried() {
        let store = store();
        store.fail_reads_after(0);
        let service = StockReservationService::new(store);

        let err = service.reserve(&p("P1"), &k("R1"), qty(1)).await.unwrap_err();
        assert!(matches!(err, ReservationError::Upstream(_)));
        assert_eq!(service.store().reads(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_is_not_retried() {
        let store = store();
        store.fail_commits();
        let service = StockReservationService::new(store);

        let err = service.reserve(&p("P1"), &k("R1"), qty(1)).await.unwrap_err();
        assert!(matches!(err, ReservationError::Upstream(SanityError::Api { status: 503, .. })));
        assert_eq!(service.store().commits(), 1);
        assert_eq!(service.store().stock("P1", "R1"), Some(json!(10)));
    }

    #[tokio::test]
    async fn test_failed_batch_commit_is_not_retried() {
        let store = store();
        store.fail_commits();
        let service = StockReservationService::new(store);

        let err = service
            .reserve_lines(vec![line("P1", "R1", 2), line("P2", "R1", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::Upstream(SanityError::Api { status: 503, .. })));
        assert_eq!(service.store().commits(), 1);
        assert_eq!(service.store().stock("P2", "R1"), Some(json!(5)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_never_oversell() {
        let service = Arc::new(StockReservationService::new(store()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.reserve(&p("P1"), &k("R1"), qty(3)).await })
            })
            .collect();

        let mut reserved = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                reserved += 3;
            }
        }

        assert!(reserved <= 10);
        let left = service.store().stock("P1", "R1").unwrap().as_i64().unwrap();
        assert_eq!(left, 10 - reserved);
        assert!(left >= 0);
    }

    #[tokio::test]
    async fn test_batch_merges_lines_and_patches_per_product() {
        let service = StockReservationService::new(store());

        let result = service
            .reserve_lines(vec![
                line("P1", "R1", 2),
                line("P2", "R1", 1),
                line("P1", "R1", 3),
                line("P1", "R2", 1),
            ])
            .await
            .unwrap();

        let summary: Vec<(&str, &str, u64)> = result
            .iter()
            .map(|r| (r.product_id.as_str(), r.row_key.as_str(), r.new_stock.get()))
            .collect();
        assert_eq!(summary, vec![("P1", "R1", 5), ("P2", "R1", 4), ("P1", "R2", 1)]);

        assert_eq!(service.store().commits(), 1);
        assert_eq!(service.store().last_commit_patches(), 2);
        assert_eq!(service.store().stock("P1", "R1"), Some(json!(5)));
        assert_eq!(service.store().stock("P1", "R2"), Some(json!(1)));
        assert_eq!(service.store().stock("P2", "R1"), Some(json!(4)));
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let service = StockReservationService::new(store());

        let err = service
            .reserve_lines(vec![line("P1", "R1", 1), line("P2", "R1", 6)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReservationError::InsufficientStock { ref product_id, .. } if product_id.as_str() == "P2"
        ));
        assert_eq!(service.store().stock("P1", "R1"), Some(json!(10)));
        assert_eq!(service.store().commits(), 0);
    }

    #[tokio::test]
    async fn test_batch_merged_quantity_checked_against_stock() {
        let service = StockReservationService::new(store());

        let err = service
            .reserve_lines(vec![line("P1", "R2", 1), line("P1", "R2", 2)])
            .await
            .unwrap_err();
        assert_eq!(err.current_stock(), Some(Stock::new(2)));
    }

    #[tokio::test]
    async fn test_batch_rejects_empty_and_unknown() {
        let service = StockReservationService::new(store());

        let err = service.reserve_lines(vec![]).await.unwrap_err();
        assert!(matches!(err, ReservationError::InvalidInput(_)));

        let err = service
            .reserve_lines(vec![line("P1", "R1", 1), line("P3", "R1", 1)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReservationError::NotFound { ref product_id, .. } if product_id.as_str() == "P3"
        ));
    }

    #[tokio::test]
    async fn test_batch_retries_then_reports_conflict() {
        let store = store();
        // P2/R1 goes 5 -> 4 -> 3 -> 0 behind our back, one write per attempt.
        store.queue_concurrent_write("P2", "R1", 1);
        store.queue_concurrent_write("P2", "R1", 1);
        store.queue_concurrent_write("P2", "R1", 3);
        let service = StockReservationService::new(store);

        let err = service
            .reserve_lines(vec![line("P1", "R1", 1), line("P2", "R1", 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::Conflict { .. }));
        // The line that can no longer be served is the one reported.
        assert_eq!(err.current_stock(), Some(Stock::ZERO));
        assert_eq!(service.store().stock("P1", "R1"), Some(json!(10)));
        assert_eq!(service.store().commits(), 3);
    }
}
