//! Newtype IDs for type-safe document references.
//!
//! Sanity identifies documents, array members, and revisions with opaque
//! strings. Use the `define_string_id!` macro to create wrappers that prevent
//! accidentally passing a row key where a product ID is expected.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Into<String>` implementations
///
/// # Example
///
/// ```rust
/// # use pexpress_core::define_string_id;
/// define_string_id!(DocumentId);
/// define_string_id!(ArrayKey);
///
/// let doc = DocumentId::new("product-1");
/// let key = ArrayKey::new("a1b2");
///
/// // These are different types, so this won't compile:
/// // let _: DocumentId = key;
/// assert_eq!(doc.as_str(), "product-1");
/// ```
#[macro_export]
macro_rules! define_string_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(ProductId);
define_string_id!(RowKey);
define_string_id!(Revision);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_raw_value() {
        let id = ProductId::new("drafts.abc");
        assert_eq!(id.to_string(), "drafts.abc");
    }

    #[test]
    fn test_serde_transparent() {
        let key = RowKey::from("k1");
        let json = serde_json::to_string(&key).ok();
        assert_eq!(json.as_deref(), Some("\"k1\""));

        let back: Result<RowKey, _> = serde_json::from_str("\"k1\"");
        assert_eq!(back.ok(), Some(key));
    }

    #[test]
    fn test_into_string() {
        let rev: String = Revision::new("r-9").into();
        assert_eq!(rev, "r-9");
    }
}
