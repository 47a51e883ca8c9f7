//! HTTP client for the Sanity query and mutate endpoints.

use std::sync::Arc;

use pexpress_core::{Product, ProductId, RowKey, RowSnapshot};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use super::types::{
    ErrorBody, MutateResponse, QueryResponse, SanityProduct, SanityRowSnapshot,
};
use super::{SanityError, StockPatch, queries};
use crate::config::SanityConfig;

/// Sanity Content Lake client.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct SanityClient {
    inner: Arc<SanityClientInner>,
}

struct SanityClientInner {
    client: reqwest::Client,
    query_url: Url,
    mutate_url: Url,
}

/// Acknowledgement of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReceipt {
    /// Transaction ID assigned by Sanity, if it returned one.
    pub transaction_id: Option<String>,
}

impl SanityClient {
    /// Create a new client for the configured project and dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value, the
    /// endpoint URLs cannot be built, or the HTTP client fails to build.
    pub fn new(config: &SanityConfig) -> Result<Self, SanityError> {
        let mut headers = HeaderMap::new();

        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", config.token.expose_secret()))
                .map_err(|e| SanityError::Parse(format!("Invalid token format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let base = api_base(&config.api_host, &config.api_version)?;
        let query_url = base.join(&format!("data/query/{}", config.dataset))?;
        let mutate_url = base.join(&format!("data/mutate/{}", config.dataset))?;

        Ok(Self {
            inner: Arc::new(SanityClientInner {
                client,
                query_url,
                mutate_url,
            }),
        })
    }

    // =========================================================================
    // Raw Endpoints
    // =========================================================================

    /// Run a GROQ query and decode its `result`.
    ///
    /// # Errors
    ///
    /// Returns `SanityError::Http` on network failures, `SanityError::Api`
    /// on error responses, and `SanityError::Parse` if the result does not
    /// match `T`.
    #[instrument(skip(self, query, params))]
    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        params: Value,
    ) -> Result<T, SanityError> {
        let body = json!({ "query": query, "params": params });

        let response = self
            .inner
            .client
            .post(self.inner.query_url.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(SanityError::from_status(
                status.as_u16(),
                error_message(&text, "Failed to query products"),
            ));
        }

        let decoded: QueryResponse<T> =
            serde_json::from_str(&text).map_err(|e| SanityError::Parse(e.to_string()))?;
        Ok(decoded.result)
    }

    /// Submit mutations as a single all-or-nothing transaction.
    ///
    /// # Errors
    ///
    /// Returns `SanityError::RevisionMismatch` when an `ifRevisionID` guard
    /// fails, and the other variants as for [`SanityClient::query`].
    #[instrument(skip(self, mutations), fields(count = mutations.len()))]
    pub async fn mutate(&self, mutations: Vec<Value>) -> Result<MutationReceipt, SanityError> {
        let body = json!({ "mutations": mutations });

        let response = self
            .inner
            .client
            .post(self.inner.mutate_url.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(SanityError::from_status(
                status.as_u16(),
                error_message(&text, "Failed to update stock"),
            ));
        }

        // Body is informational only; the status already confirmed the commit.
        let decoded: MutateResponse = serde_json::from_str(&text).unwrap_or_default();
        Ok(MutationReceipt {
            transaction_id: decoded.transaction_id,
        })
    }

    // =========================================================================
    // Product Documents
    // =========================================================================

    /// Read one product's revision together with one of its rows.
    ///
    /// Returns `Ok(None)` when no product has this ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    #[instrument(skip(self), fields(product_id = %product_id, row_key = %row_key))]
    pub async fn fetch_row(
        &self,
        product_id: &ProductId,
        row_key: &RowKey,
    ) -> Result<Option<RowSnapshot>, SanityError> {
        let params = json!({ "productId": product_id, "rowKey": row_key });
        let result: Option<SanityRowSnapshot> = self.query(queries::ROW_SNAPSHOT, params).await?;
        Ok(result.map(RowSnapshot::from))
    }

    /// Read several products with their revisions and all rows.
    ///
    /// Unknown IDs are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    #[instrument(skip(self), fields(count = ids.len()))]
    pub async fn fetch_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, SanityError> {
        let params = json!({ "ids": ids });
        let result: Option<Vec<SanityProduct>> =
            self.query(queries::PRODUCTS_BY_ID, params).await?;
        Ok(result
            .unwrap_or_default()
            .into_iter()
            .map(Product::from)
            .collect())
    }

    /// Read the whole catalog ordered by product name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, SanityError> {
        let result: Option<Vec<SanityProduct>> =
            self.query(queries::CATALOG, json!({})).await?;
        Ok(result
            .unwrap_or_default()
            .into_iter()
            .map(Product::from)
            .collect())
    }

    /// Commit stock patches in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `SanityError::RevisionMismatch` if any product changed since
    /// its revision was read.
    #[instrument(skip(self, patches), fields(patches = patches.len()))]
    pub async fn commit(&self, patches: &[StockPatch]) -> Result<MutationReceipt, SanityError> {
        let mutations = patches.iter().map(StockPatch::to_mutation).collect();
        let receipt = self.mutate(mutations).await?;
        tracing::debug!(transaction_id = ?receipt.transaction_id, "Stock patch committed");
        Ok(receipt)
    }
}

/// `<host>/v<version>/`, keeping any path prefix on the host URL.
fn api_base(host: &Url, api_version: &str) -> Result<Url, SanityError> {
    let mut base = host.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(&format!("v{api_version}/"))?)
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| fallback.to_string())
}
