pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use thiserror::Error;

pub use mongo::MongoStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key on {0}")]
    DuplicateKey(String),
    #[error("store driver error: {0}")]
    Driver(#[from] mongodb::error::Error),
    #[error("document mapping error: {0}")]
    Mapping(String),
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(value: mongodb::bson::ser::Error) -> Self {
        StoreError::Mapping(value.to_string())
    }
}

impl From<mongodb::bson::de::Error> for StoreError {
    fn from(value: mongodb::bson::de::Error) -> Self {
        StoreError::Mapping(value.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collection {
    Contacts,
    Companies,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Contacts => "contacts",
            Collection::Companies => "companies",
        }
    }
}

/// Typed access to the two document collections.
///
/// Documents cross this boundary with a hex-string `id` field; the adapter
/// owns the mapping to the store's native `_id` key. Any id that is not a
/// syntactically valid store key is treated as "not found" without touching
/// the store.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn insert(&self, collection: Collection, doc: Document) -> StoreResult<Document>;

    async fn find_by_id(&self, collection: Collection, id: &str) -> StoreResult<Option<Document>>;

    async fn find_one(
        &self,
        collection: Collection,
        filter: Document,
    ) -> StoreResult<Option<Document>>;

    /// Returns one page of matches plus the total matching count.
    async fn query(
        &self,
        collection: Collection,
        filter: Document,
        sort: Document,
        skip: u64,
        limit: i64,
    ) -> StoreResult<(Vec<Document>, u64)>;

    /// Full-document replace. The stored `_id` and the caller-visible `id`
    /// are pinned to the path id regardless of what `doc` carries.
    async fn replace(
        &self,
        collection: Collection,
        id: &str,
        doc: Document,
    ) -> StoreResult<Option<Document>>;

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool>;

    /// Set-add keyed on `element[key_field]`: pushes only when no entry in
    /// `array_field` carries the same key, otherwise leaves the document
    /// unchanged. Returns the resulting document either way.
    async fn add_to_set(
        &self,
        collection: Collection,
        id: &str,
        array_field: &str,
        key_field: &str,
        element: Document,
    ) -> StoreResult<Option<Document>>;

    /// Removes every entry of `array_field` matching `predicate`. Removing
    /// nothing is a no-op that still returns the document.
    async fn pull_where(
        &self,
        collection: Collection,
        id: &str,
        array_field: &str,
        predicate: Document,
    ) -> StoreResult<Option<Document>>;
}

pub fn parse_store_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

/// Rewrites the caller-visible `id` into the store's `_id` key.
pub fn to_store_document(mut doc: Document, id: ObjectId) -> Document {
    doc.remove("id");
    doc.insert("_id", id);
    doc
}

/// Rewrites the store's `_id` back into the caller-visible `id` field.
pub fn from_store_document(mut doc: Document) -> Document {
    if let Some(raw) = doc.remove("_id") {
        let id = match raw {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => other.to_string(),
        };
        doc.insert("id", id);
    }
    doc
}
