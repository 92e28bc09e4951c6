use fieldstock_core::{DocumentId, FieldValue, Record};

use crate::error::StorageError;

/// A document as stored: its internal id plus its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub doc_id: DocumentId,
    pub fields: Record,
}

/// Result of an integer increment on an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    pub doc_id: DocumentId,
    pub previous: i64,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted { doc_id: DocumentId, value: i64 },
    Updated(Increment),
}

/// A document store of named collections holding flat records.
///
/// Filters are exact matches: a document matches when it carries every
/// field of the filter with an equal value. When several documents match,
/// single-document operations act on the oldest.
pub trait Storage {
    /// Declare that `field_key` is unique within `collection`. Idempotent.
    fn ensure_unique_index(&mut self, collection: &str, field_key: &str)
    -> Result<(), StorageError>;

    /// Insert a document. Fails with [`StorageError::DuplicateKey`] when a
    /// unique field collides with an existing document.
    fn insert_one(&mut self, collection: &str, document: &Record)
    -> Result<DocumentId, StorageError>;

    fn find_one(
        &self,
        collection: &str,
        filter: &Record,
    ) -> Result<Option<StoredDocument>, StorageError>;

    fn find(&self, collection: &str, filter: &Record) -> Result<Vec<StoredDocument>, StorageError>;

    fn distinct(&self, collection: &str, field_key: &str) -> Result<Vec<FieldValue>, StorageError>;

    /// Overwrite one field of the first matching document. Returns whether a
    /// document matched.
    fn set_field_one(
        &mut self,
        collection: &str,
        filter: &Record,
        field_key: &str,
        value: &FieldValue,
    ) -> Result<bool, StorageError>;

    /// Atomically add `delta` to an integer field of the first matching
    /// document, clamping the result at `floor`.
    fn increment_one(
        &mut self,
        collection: &str,
        filter: &Record,
        field_key: &str,
        delta: i64,
        floor: i64,
    ) -> Result<Option<Increment>, StorageError>;

    /// Like [`Storage::increment_one`], but when nothing matches, insert the
    /// filter as a new document with `field_key` set to `max(floor, delta)`.
    /// Lookup and write happen in one transaction.
    fn upsert_increment(
        &mut self,
        collection: &str,
        filter: &Record,
        field_key: &str,
        delta: i64,
        floor: i64,
    ) -> Result<Upsert, StorageError>;
}
