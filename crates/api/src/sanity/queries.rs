//! GROQ queries used by the service.
//!
//! Parameters are always passed through `params` (`$productId`, `$rowKey`,
//! `$ids`), never interpolated into the query text.

/// One product with its revision and a single row selected by key.
///
/// Params: `productId`, `rowKey`.
pub const ROW_SNAPSHOT: &str = r#"*[_type=="product" && _id==$productId][0]{
  _id,
  _rev,
  name,
  'row': rows[_key==$rowKey][0]{
    _key,
    flavor,
    stock
  }
}"#;

/// Several products with their revisions and all rows.
///
/// Params: `ids`.
pub const PRODUCTS_BY_ID: &str = r#"*[_type=="product" && _id in $ids]{
  _id,
  _rev,
  name,
  rows[]{ _key, flavor, stock }
}"#;

/// The whole catalog, alphabetically.
pub const CATALOG: &str = r#"*[_type=="product"]{
  _id,
  _rev,
  name,
  rows[]{ _key, flavor, stock }
} | order(name asc)"#;
