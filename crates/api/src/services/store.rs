//! Document store seam used by the reservation service.

use std::future::Future;

use pexpress_core::{Product, ProductId, RowKey, RowSnapshot};

use crate::sanity::{SanityClient, SanityError, StockPatch};

/// The operations the service needs from the remote document store.
///
/// Implemented by [`SanityClient`]; tests substitute an in-memory store.
pub trait DocumentStore: Send + Sync {
    /// Read a product's revision and one row. `None` if the product is
    /// missing.
    fn fetch_row(
        &self,
        product_id: &ProductId,
        row_key: &RowKey,
    ) -> impl Future<Output = Result<Option<RowSnapshot>, SanityError>> + Send;

    /// Read several products with revisions. Missing IDs are omitted.
    fn fetch_products(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, SanityError>> + Send;

    /// Read every product ordered by name.
    fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, SanityError>> + Send;

    /// Apply all patches atomically, or none if any revision guard fails.
    fn commit(&self, patches: &[StockPatch])
    -> impl Future<Output = Result<(), SanityError>> + Send;
}

impl DocumentStore for SanityClient {
    async fn fetch_row(
        &self,
        product_id: &ProductId,
        row_key: &RowKey,
    ) -> Result<Option<RowSnapshot>, SanityError> {
        Self::fetch_row(self, product_id, row_key).await
    }

    async fn fetch_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, SanityError> {
        Self::fetch_products(self, ids).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, SanityError> {
        Self::list_products(self).await
    }

    async fn commit(&self, patches: &[StockPatch]) -> Result<(), SanityError> {
        Self::commit(self, patches).await.map(|_| ())
    }
}
