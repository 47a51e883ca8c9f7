//! In-memory [`DocumentStore`] for service tests.
//!
//! Mirrors the store semantics the service depends on: revisions change on
//! every write, `ifRevisionID` guards reject stale writes, and a transaction
//! applies all of its patches or none.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use pexpress_core::{Product, ProductId, Revision, Row, RowKey, RowSnapshot, Stock};
use serde_json::{Value, json};

use super::store::DocumentStore;
use crate::sanity::{SanityError, StockPatch};

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    products: BTreeMap<ProductId, StoredProduct>,
    next_rev: u64,
    /// Writes applied by "another clerk" right before our next commit.
    concurrent_writes: VecDeque<(ProductId, RowKey, i64)>,
    fail_reads_after: Option<usize>,
    fail_commits: bool,
    reads: usize,
    commits: usize,
    last_commit_patches: usize,
}

struct StoredProduct {
    name: String,
    rev: Revision,
    rows: Vec<(RowKey, String, Value)>,
}

impl State {
    fn bump(&mut self) -> Revision {
        self.next_rev += 1;
        Revision::new(format!("rev-{}", self.next_rev))
    }

    fn read(&mut self) -> Result<(), SanityError> {
        self.reads += 1;
        match self.fail_reads_after {
            Some(limit) if self.reads > limit => Err(SanityError::Api {
                status: 503,
                message: "dataset unavailable".to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn apply_dec(&mut self, id: &ProductId, key: &RowKey, units: i64) {
        let rev = self.bump();
        if let Some(product) = self.products.get_mut(id) {
            product.rev = rev;
            if let Some(row) = product.rows.iter_mut().find(|(k, _, _)| k == key) {
                let current = row.2.as_i64().unwrap_or(0);
                row.2 = json!(current - units);
            }
        }
    }

    fn to_product(id: &ProductId, stored: &StoredProduct) -> Product {
        Product {
            id: id.clone(),
            name: stored.name.clone(),
            rev: Some(stored.rev.clone()),
            rows: stored
                .rows
                .iter()
                .map(|(key, flavor, stock)| Row {
                    key: key.clone(),
                    flavor: flavor.clone(),
                    stock: Stock::from_stored(Some(stock)),
                })
                .collect(),
        }
    }
}

#[allow(clippy::unwrap_used)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(self, id: &str, name: &str, rows: &[(&str, &str, Value)]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let rev = state.bump();
            state.products.insert(
                ProductId::new(id),
                StoredProduct {
                    name: name.to_string(),
                    rev,
                    rows: rows
                        .iter()
                        .map(|(k, f, s)| (RowKey::new(*k), (*f).to_string(), s.clone()))
                        .collect(),
                },
            );
        }
        self
    }

    /// Raw stored stock value of a row.
    pub fn stock(&self, id: &str, key: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        let product = state.products.get(&ProductId::new(id))?;
        product
            .rows
            .iter()
            .find(|(k, _, _)| k.as_str() == key)
            .map(|(_, _, stock)| stock.clone())
    }

    /// Have another writer take `units` from a row just before our next
    /// commit, which then fails its revision guard.
    pub fn queue_concurrent_write(&self, id: &str, key: &str, units: i64) {
        self.state.lock().unwrap().concurrent_writes.push_back((
            ProductId::new(id),
            RowKey::new(key),
            units,
        ));
    }

    /// Let the first `n` reads succeed and fail every read after that.
    pub fn fail_reads_after(&self, n: usize) {
        self.state.lock().unwrap().fail_reads_after = Some(n);
    }

    /// Reject every commit with a non-conflict store error.
    pub fn fail_commits(&self) {
        self.state.lock().unwrap().fail_commits = true;
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn last_commit_patches(&self) -> usize {
        self.state.lock().unwrap().last_commit_patches
    }
}

#[allow(clippy::unwrap_used)]
impl DocumentStore for MemoryStore {
    async fn fetch_row(
        &self,
        product_id: &ProductId,
        row_key: &RowKey,
    ) -> Result<Option<RowSnapshot>, SanityError> {
        let mut state = self.state.lock().unwrap();
        state.read()?;
        Ok(state.products.get(product_id).map(|stored| {
            let product = State::to_product(product_id, stored);
            RowSnapshot {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                rev: stored.rev.clone(),
                row: product.row(row_key).cloned(),
            }
        }))
    }

    async fn fetch_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, SanityError> {
        let mut state = self.state.lock().unwrap();
        state.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).map(|p| State::to_product(id, p)))
            .collect())
    }

    async fn list_products(&self) -> Result<Vec<Product>, SanityError> {
        let mut state = self.state.lock().unwrap();
        state.read()?;
        let mut products: Vec<Product> = state
            .products
            .iter()
            .map(|(id, p)| State::to_product(id, p))
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn commit(&self, patches: &[StockPatch]) -> Result<(), SanityError> {
        let mut state = self.state.lock().unwrap();
        state.commits += 1;
        state.last_commit_patches = patches.len();

        if state.fail_commits {
            return Err(SanityError::Api {
                status: 503,
                message: "dataset unavailable".to_string(),
            });
        }

        if let Some((id, key, units)) = state.concurrent_writes.pop_front() {
            state.apply_dec(&id, &key, units);
        }

        for patch in patches {
            match state.products.get(&patch.product_id) {
                None => {
                    return Err(SanityError::Api {
                        status: 404,
                        message: format!("Document {} not found", patch.product_id),
                    });
                }
                Some(stored) if stored.rev != patch.if_revision => {
                    return Err(SanityError::RevisionMismatch {
                        status: 409,
                        message: format!(
                            "Document {} has unexpected revision ID",
                            patch.product_id
                        ),
                    });
                }
                Some(_) => {}
            }
        }

        for patch in patches {
            for (key, quantity) in &patch.decrements {
                state.apply_dec(&patch.product_id, key, i64::from(quantity.get()));
            }
        }
        Ok(())
    }
}
