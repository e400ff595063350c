//! Document collection abstraction.
//!
//! The rules store only needs point operations keyed by `_id` plus a couple
//! of counting filters, so the surface stays small enough for an in-memory
//! implementation to honor the same semantics as MongoDB.

use async_trait::async_trait;
use mongodb::bson::Document;

use super::error::Result;

/// A collection of BSON documents.
///
/// Filters are plain documents: top-level field equality, or an operator
/// document using `$eq`, `$ne` and `$exists`.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// First document matching `filter`.
    async fn find_one(&self, filter: Document) -> Result<Option<Document>>;

    /// Every document in the collection.
    async fn find_all(&self) -> Result<Vec<Document>>;

    /// Insert a new document. Fails if its `_id` is already taken.
    async fn insert_one(&self, doc: Document) -> Result<()>;

    /// Merge `fields` into the first document matching `filter` (`$set`).
    /// Returns whether a document matched.
    async fn update(&self, filter: Document, fields: Document) -> Result<bool>;

    /// Delete the first document matching `filter`.
    /// Returns whether a document was removed.
    async fn delete_one(&self, filter: Document) -> Result<bool>;

    /// Number of documents matching `filter`.
    async fn count(&self, filter: Document) -> Result<u64>;
}
