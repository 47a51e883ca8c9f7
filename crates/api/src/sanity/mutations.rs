//! Mutation bodies sent to the `data/mutate` endpoint.

use pexpress_core::{ProductId, Quantity, Revision, RowKey};
use serde_json::{Map, Value, json};

/// A revision-guarded stock decrement on one product document.
///
/// Rows are addressed by `_key`, never by array index, so editors reordering
/// rows in the studio cannot redirect the decrement to another flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockPatch {
    pub product_id: ProductId,
    pub if_revision: Revision,
    pub decrements: Vec<(RowKey, Quantity)>,
}

impl StockPatch {
    /// Start a patch guarded by the revision the caller read.
    #[must_use]
    pub const fn new(product_id: ProductId, if_revision: Revision) -> Self {
        Self {
            product_id,
            if_revision,
            decrements: Vec::new(),
        }
    }

    /// Add a row decrement.
    #[must_use]
    pub fn decrement(mut self, row_key: RowKey, quantity: Quantity) -> Self {
        self.push(row_key, quantity);
        self
    }

    /// Add a row decrement in place.
    pub fn push(&mut self, row_key: RowKey, quantity: Quantity) {
        self.decrements.push((row_key, quantity));
    }

    /// Render the `{ "patch": { ... } }` mutation object.
    #[must_use]
    pub fn to_mutation(&self) -> Value {
        let dec: Map<String, Value> = self
            .decrements
            .iter()
            .map(|(key, quantity)| (stock_path(key), json!(quantity.get())))
            .collect();

        json!({
            "patch": {
                "id": self.product_id.as_str(),
                "ifRevisionID": self.if_revision.as_str(),
                "dec": dec,
            }
        })
    }
}

/// Field path of a row's stock, e.g. `rows[_key=="abc"].stock`.
#[must_use]
pub fn stock_path(key: &RowKey) -> String {
    format!("rows[_key==\"{}\"].stock", escape_key(key.as_str()))
}

/// Escape a key for use inside a double-quoted GROQ string literal.
fn escape_key(key: &str) -> String {
    key.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Inverse of [`stock_path`]. Returns `None` for any other path.
#[must_use]
pub fn parse_stock_path(path: &str) -> Option<RowKey> {
    let inner = path.strip_prefix("rows[_key==\"")?.strip_suffix("\"].stock")?;

    let mut key = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            key.push(chars.next()?);
        } else if c == '"' {
            return None;
        } else {
            key.push(c);
        }
    }
    Some(RowKey::from(key))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn test_patch_body() {
        let patch = StockPatch::new(ProductId::new("p1"), Revision::new("rev-1"))
            .decrement(RowKey::new("a1"), qty(4));

        assert_eq!(
            patch.to_mutation(),
            json!({
                "patch": {
                    "id": "p1",
                    "ifRevisionID": "rev-1",
                    "dec": { "rows[_key==\"a1\"].stock": 4 }
                }
            })
        );
    }

    #[test]
    fn test_multiple_rows_share_one_guard() {
        let patch = StockPatch::new(ProductId::new("p1"), Revision::new("r"))
            .decrement(RowKey::new("a"), qty(1))
            .decrement(RowKey::new("b"), qty(2));
        let body = patch.to_mutation();

        let dec = body.pointer("/patch/dec").and_then(Value::as_object).unwrap();
        assert_eq!(dec.len(), 2);
        assert_eq!(dec.get("rows[_key==\"b\"].stock"), Some(&json!(2)));
    }

    #[test]
    fn test_key_escaping() {
        let key = RowKey::new(r#"we"ird\key"#);
        let path = stock_path(&key);
        assert_eq!(path, r#"rows[_key=="we\"ird\\key"].stock"#);
        assert_eq!(parse_stock_path(&path), Some(key));
    }

    #[test]
    fn test_parse_rejects_other_paths() {
        assert_eq!(parse_stock_path("rows[0].stock"), None);
        assert_eq!(parse_stock_path("name"), None);
        assert_eq!(parse_stock_path(r#"rows[_key=="a"b"].stock"#), None);
    }
}
