//! Raw response shapes returned by the Sanity query and mutate endpoints.

use serde::Deserialize;
use serde_json::Value;

/// Envelope of a query response.
#[derive(Debug, Deserialize)]
pub struct QueryResponse<T> {
    pub result: T,
}

/// Envelope of a mutate response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateResponse {
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// A row as projected by the queries.
#[derive(Debug, Clone, Deserialize)]
pub struct SanityRow {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(default)]
    pub flavor: Option<String>,
    /// Kept untyped: stock is hand-edited and may hold anything.
    #[serde(default)]
    pub stock: Option<Value>,
}

/// Result of [`super::queries::ROW_SNAPSHOT`].
#[derive(Debug, Clone, Deserialize)]
pub struct SanityRowSnapshot {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub row: Option<SanityRow>,
}

/// Result item of [`super::queries::PRODUCTS_BY_ID`] and
/// [`super::queries::CATALOG`].
#[derive(Debug, Clone, Deserialize)]
pub struct SanityProduct {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rows: Option<Vec<SanityRow>>,
}

/// Error body shapes. Sanity uses `{error: {description}}` for most
/// failures and `{message}` for some gateway errors.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Extract the most descriptive message available.
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        let detail = self.error.unwrap_or_default();
        detail
            .description
            .or(detail.message)
            .or(self.message)
            .filter(|m| !m.is_empty())
    }
}
