use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use tracing::debug;

use fieldstock_core::{DocumentId, FieldValue, Record};

use crate::config::StoreConfig;
use crate::error::StorageError;
use crate::schema::{check_name, init_schema, unique_index_sql};
use crate::traits::{Increment, Storage, StoredDocument, Upsert};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

fn encode(value: &FieldValue) -> Result<Vec<u8>, StorageError> {
    value
        .to_msgpack()
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<FieldValue, StorageError> {
    FieldValue::from_msgpack(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// SQLite-backed document store. One connection per handle; several handles
/// may share a database file.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_config(&StoreConfig::at(path.as_ref()))
    }

    pub fn open_with_config(config: &StoreConfig) -> Result<Self, StorageError> {
        let conn = Connection::open(&config.path)?;
        init_schema(&conn, config)?;
        debug!(path = %config.path.display(), "opened inventory database");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn, &StoreConfig::default())?;
        Ok(Self { conn })
    }
}

/// Ids of documents in `collection` carrying every filter field, oldest first.
fn matching_ids(
    conn: &Connection,
    collection: &str,
    filter: &Record,
    limit: Option<usize>,
) -> Result<Vec<DocumentId>, StorageError> {
    let mut sql = String::from("SELECT d.doc_id FROM documents d WHERE d.collection = ?1");
    let mut values = vec![Value::Text(collection.to_string())];
    for (key, value) in filter.iter() {
        let key_param = values.len() + 1;
        sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM fields f WHERE f.doc_id = d.doc_id \
             AND f.field_key = ?{key_param} AND f.value = ?{})",
            key_param + 1
        ));
        values.push(Value::Text(key.to_string()));
        values.push(Value::Blob(encode(value)?));
    }
    sql.push_str(" ORDER BY d.rowid");
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
        row.get::<_, Vec<u8>>(0)
    })?;

    let mut result = Vec::new();
    for row in rows {
        result.push(DocumentId::from_bytes(to_array::<16>(row?, "doc_id")?));
    }
    Ok(result)
}

fn load_fields(conn: &Connection, doc_id: DocumentId) -> Result<Record, StorageError> {
    let mut stmt = conn.prepare("SELECT field_key, value FROM fields WHERE doc_id = ?1")?;
    let rows = stmt.query_map(params![doc_id.as_bytes().as_slice()], |row| {
        let key: String = row.get(0)?;
        let val_bytes: Vec<u8> = row.get(1)?;
        Ok((key, val_bytes))
    })?;

    let mut record = Record::new();
    for row in rows {
        let (key, val_bytes) = row?;
        record.insert(&key, decode(&val_bytes)?);
    }
    Ok(record)
}

fn unique_fields(conn: &Connection, collection: &str) -> Result<Vec<String>, StorageError> {
    let mut stmt = conn.prepare("SELECT field_key FROM unique_indexes WHERE collection = ?1")?;
    let fields = stmt
        .query_map(params![collection], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(fields)
}

/// A write refused by one of the per-field unique indexes.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Report a unique-index collision on `field_key` as `DuplicateKey`; any other
/// failure passes through unchanged.
fn unique_collision(err: StorageError, collection: &str, field_key: &str) -> StorageError {
    match err {
        StorageError::Sqlite(ref e) if is_unique_violation(e) => StorageError::DuplicateKey {
            collection: collection.to_string(),
            field_key: field_key.to_string(),
        },
        other => other,
    }
}

fn write_field(
    conn: &Connection,
    collection: &str,
    doc_id: DocumentId,
    field_key: &str,
    value: &FieldValue,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO fields (doc_id, collection, field_key, value) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(doc_id, field_key) DO UPDATE SET value = excluded.value",
        params![doc_id.as_bytes().as_slice(), collection, field_key, encode(value)?],
    )?;
    Ok(())
}

/// Insert a document, reporting unique-field collisions as `DuplicateKey`.
fn insert_document(
    conn: &Connection,
    collection: &str,
    document: &Record,
) -> Result<DocumentId, StorageError> {
    let unique = unique_fields(conn, collection)?;
    for field_key in &unique {
        if let Some(value) = document.get(field_key) {
            let key_filter: Record = [(field_key.as_str(), value.clone())].into_iter().collect();
            if !matching_ids(conn, collection, &key_filter, Some(1))?.is_empty() {
                return Err(StorageError::DuplicateKey {
                    collection: collection.to_string(),
                    field_key: field_key.clone(),
                });
            }
        }
    }

    let doc_id = DocumentId::new();
    conn.execute(
        "INSERT INTO documents (doc_id, collection) VALUES (?1, ?2)",
        params![doc_id.as_bytes().as_slice(), collection],
    )?;
    for (key, value) in document.iter() {
        write_field(conn, collection, doc_id, key, value)
            .map_err(|e| unique_collision(e, collection, key))?;
    }
    Ok(doc_id)
}

fn read_integer(
    conn: &Connection,
    collection: &str,
    doc_id: DocumentId,
    field_key: &str,
) -> Result<i64, StorageError> {
    let bytes: Option<Vec<u8>> = conn
        .query_row(
            "SELECT value FROM fields WHERE doc_id = ?1 AND field_key = ?2",
            params![doc_id.as_bytes().as_slice(), field_key],
            |row| row.get(0),
        )
        .optional()?;
    bytes
        .map(|b| decode(&b))
        .transpose()?
        .and_then(|v| v.as_integer())
        .ok_or_else(|| StorageError::TypeMismatch {
            collection: collection.to_string(),
            field_key: field_key.to_string(),
        })
}

fn increment(
    conn: &Connection,
    collection: &str,
    doc_id: DocumentId,
    field_key: &str,
    delta: i64,
    floor: i64,
) -> Result<Increment, StorageError> {
    let previous = read_integer(conn, collection, doc_id, field_key)?;
    let value = previous.saturating_add(delta).max(floor);
    write_field(conn, collection, doc_id, field_key, &FieldValue::Integer(value))?;
    Ok(Increment {
        doc_id,
        previous,
        value,
    })
}

impl Storage for SqliteStorage {
    fn ensure_unique_index(
        &mut self,
        collection: &str,
        field_key: &str,
    ) -> Result<(), StorageError> {
        check_name(collection)?;
        check_name(field_key)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(&unique_index_sql(collection, field_key))
            .map_err(|e| unique_collision(e.into(), collection, field_key))?;
        tx.execute(
            "INSERT OR IGNORE INTO unique_indexes (collection, field_key) VALUES (?1, ?2)",
            params![collection, field_key],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn insert_one(
        &mut self,
        collection: &str,
        document: &Record,
    ) -> Result<DocumentId, StorageError> {
        check_name(collection)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let doc_id = insert_document(&tx, collection, document)?;
        tx.commit()?;
        debug!(collection, %doc_id, "inserted document");
        Ok(doc_id)
    }

    fn find_one(
        &self,
        collection: &str,
        filter: &Record,
    ) -> Result<Option<StoredDocument>, StorageError> {
        match matching_ids(&self.conn, collection, filter, Some(1))?.first() {
            Some(&doc_id) => Ok(Some(StoredDocument {
                doc_id,
                fields: load_fields(&self.conn, doc_id)?,
            })),
            None => Ok(None),
        }
    }

    fn find(&self, collection: &str, filter: &Record) -> Result<Vec<StoredDocument>, StorageError> {
        let mut result = Vec::new();
        for doc_id in matching_ids(&self.conn, collection, filter, None)? {
            result.push(StoredDocument {
                doc_id,
                fields: load_fields(&self.conn, doc_id)?,
            });
        }
        Ok(result)
    }

    fn distinct(&self, collection: &str, field_key: &str) -> Result<Vec<FieldValue>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT value FROM fields WHERE collection = ?1 AND field_key = ?2")?;
        let rows = stmt.query_map(params![collection, field_key], |row| {
            row.get::<_, Vec<u8>>(0)
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(decode(&row?)?);
        }
        Ok(result)
    }

    fn set_field_one(
        &mut self,
        collection: &str,
        filter: &Record,
        field_key: &str,
        value: &FieldValue,
    ) -> Result<bool, StorageError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(&doc_id) = matching_ids(&tx, collection, filter, Some(1))?.first() else {
            return Ok(false);
        };
        write_field(&tx, collection, doc_id, field_key, value)?;
        tx.commit()?;
        debug!(collection, field_key, %doc_id, "set field");
        Ok(true)
    }

    fn increment_one(
        &mut self,
        collection: &str,
        filter: &Record,
        field_key: &str,
        delta: i64,
        floor: i64,
    ) -> Result<Option<Increment>, StorageError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(&doc_id) = matching_ids(&tx, collection, filter, Some(1))?.first() else {
            return Ok(None);
        };
        let inc = increment(&tx, collection, doc_id, field_key, delta, floor)?;
        tx.commit()?;
        debug!(
            collection,
            field_key,
            previous = inc.previous,
            value = inc.value,
            "incremented field"
        );
        Ok(Some(inc))
    }

    fn upsert_increment(
        &mut self,
        collection: &str,
        filter: &Record,
        field_key: &str,
        delta: i64,
        floor: i64,
    ) -> Result<Upsert, StorageError> {
        check_name(collection)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = match matching_ids(&tx, collection, filter, Some(1))?.first() {
            Some(&doc_id) => {
                Upsert::Updated(increment(&tx, collection, doc_id, field_key, delta, floor)?)
            }
            None => {
                let value = delta.max(floor);
                let mut document = filter.clone();
                document.insert(field_key, value);
                let doc_id = insert_document(&tx, collection, &document)?;
                Upsert::Inserted { doc_id, value }
            }
        };
        tx.commit()?;
        debug!(collection, field_key, ?outcome, "upserted document");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldstock_core::record;

    fn storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    #[test]
    fn insert_then_find_by_subset_filter() {
        let mut storage = storage();
        let doc = record! { "brand" => "BRADY", "item" => "ROLL", "quantity" => 3 };
        let doc_id = storage.insert_one("misc", &doc).unwrap();

        let found = storage
            .find_one("misc", &record! { "brand" => "BRADY" })
            .unwrap()
            .unwrap();
        assert_eq!(found.doc_id, doc_id);
        assert_eq!(found.fields, doc);
    }

    #[test]
    fn filters_require_equal_values_and_types() {
        let mut storage = storage();
        storage
            .insert_one("misc", &record! { "item" => "ROLL", "quantity" => 3 })
            .unwrap();

        assert!(storage.find_one("misc", &record! { "item" => "TAPE" }).unwrap().is_none());
        assert!(storage.find_one("misc", &record! { "quantity" => "3" }).unwrap().is_none());
        assert!(storage.find_one("misc", &record! { "color" => "RED" }).unwrap().is_none());
        assert!(storage.find_one("optics", &record! { "item" => "ROLL" }).unwrap().is_none());
    }

    #[test]
    fn find_returns_all_matches_oldest_first() {
        let mut storage = storage();
        let first = storage
            .insert_one("misc", &record! { "site_cili" => "A", "item" => "ROLL" })
            .unwrap();
        storage
            .insert_one("misc", &record! { "site_cili" => "B", "item" => "ROLL" })
            .unwrap();
        let third = storage
            .insert_one("misc", &record! { "site_cili" => "A", "item" => "TAPE" })
            .unwrap();

        let docs = storage.find("misc", &record! { "site_cili" => "A" }).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![first, third]);
    }

    #[test]
    fn unique_index_rejects_duplicates() {
        let mut storage = storage();
        storage.ensure_unique_index("sites", "cili").unwrap();
        storage.ensure_unique_index("sites", "cili").unwrap();

        storage
            .insert_one("sites", &record! { "cili" => "TOROONXN", "city" => "TORONTO" })
            .unwrap();
        let err = storage
            .insert_one("sites", &record! { "cili" => "TOROONXN", "city" => "OTTAWA" })
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::DuplicateKey { ref collection, ref field_key }
                if collection == "sites" && field_key == "cili"
        ));
        assert_eq!(storage.find("sites", &Record::new()).unwrap().len(), 1);
    }

    #[test]
    fn collision_caught_by_the_index_is_a_duplicate_key() {
        let mut storage = storage();
        storage.ensure_unique_index("sites", "cili").unwrap();
        storage.insert_one("sites", &record! { "cili" => "X" }).unwrap();
        // Leave only the index itself guarding the field.
        storage.conn.execute("DELETE FROM unique_indexes", []).unwrap();

        let err = storage.insert_one("sites", &record! { "cili" => "X" }).unwrap_err();
        assert!(matches!(
            err,
            StorageError::DuplicateKey { ref field_key, .. } if field_key == "cili"
        ));
        assert_eq!(storage.find("sites", &Record::new()).unwrap().len(), 1);
    }

    #[test]
    fn other_constraint_failures_are_not_duplicate_keys() {
        let storage = storage();
        let orphan = DocumentId::new();
        let err = write_field(&storage.conn, "misc", orphan, "item", &FieldValue::from("ROLL"))
            .map_err(|e| unique_collision(e, "misc", "item"))
            .unwrap_err();
        assert!(matches!(err, StorageError::Sqlite(_)));
    }

    #[test]
    fn handles_on_one_file_declare_the_same_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.db");
        let mut a = SqliteStorage::open(&path).unwrap();
        let mut b = SqliteStorage::open(&path).unwrap();

        let tx = a.conn.transaction_with_behavior(TransactionBehavior::Immediate).unwrap();
        let waiting =
            std::thread::spawn(move || b.ensure_unique_index("sites", "cili").map(|()| b));
        std::thread::sleep(std::time::Duration::from_millis(50));
        tx.commit().unwrap();

        let mut b = waiting.join().unwrap().unwrap();
        a.ensure_unique_index("sites", "cili").unwrap();
        b.insert_one("sites", &record! { "cili" => "X" }).unwrap();
        assert!(matches!(
            a.insert_one("sites", &record! { "cili" => "X" }),
            Err(StorageError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn unique_index_does_not_leak_into_other_collections() {
        let mut storage = storage();
        storage.ensure_unique_index("sites", "cili").unwrap();
        storage.insert_one("misc", &record! { "cili" => "X" }).unwrap();
        storage.insert_one("misc", &record! { "cili" => "X" }).unwrap();
        assert_eq!(storage.find("misc", &Record::new()).unwrap().len(), 2);
    }

    #[test]
    fn unique_index_refuses_existing_duplicates() {
        let mut storage = storage();
        storage.insert_one("sites", &record! { "cili" => "X" }).unwrap();
        storage.insert_one("sites", &record! { "cili" => "X" }).unwrap();
        assert!(matches!(
            storage.ensure_unique_index("sites", "cili"),
            Err(StorageError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn invalid_collection_names_are_refused() {
        let mut storage = storage();
        assert!(matches!(
            storage.ensure_unique_index("sites; --", "cili"),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn distinct_collapses_repeated_values() {
        let mut storage = storage();
        for cili in ["A", "B", "A"] {
            storage.insert_one("misc", &record! { "site_cili" => cili }).unwrap();
        }
        let mut values = storage.distinct("misc", "site_cili").unwrap();
        values.sort_by_key(ToString::to_string);
        assert_eq!(values, vec![FieldValue::from("A"), FieldValue::from("B")]);
    }

    #[test]
    fn set_field_one_reports_matches() {
        let mut storage = storage();
        storage
            .insert_one("misc", &record! { "item" => "ROLL", "quantity" => 3 })
            .unwrap();
        let filter = record! { "item" => "ROLL" };
        assert!(storage
            .set_field_one("misc", &filter, "quantity", &FieldValue::from(9))
            .unwrap());
        assert!(!storage
            .set_field_one("misc", &record! { "item" => "TAPE" }, "quantity", &FieldValue::from(9))
            .unwrap());
        let doc = storage.find_one("misc", &filter).unwrap().unwrap();
        assert_eq!(doc.fields.quantity(), Some(9));
    }

    #[test]
    fn increment_clamps_at_floor() {
        let mut storage = storage();
        storage
            .insert_one("misc", &record! { "item" => "ROLL", "quantity" => 3 })
            .unwrap();
        let filter = record! { "item" => "ROLL" };

        let inc = storage.increment_one("misc", &filter, "quantity", -10, 0).unwrap().unwrap();
        assert_eq!((inc.previous, inc.value), (3, 0));

        let inc = storage.increment_one("misc", &filter, "quantity", 4, 0).unwrap().unwrap();
        assert_eq!((inc.previous, inc.value), (0, 4));

        assert!(storage
            .increment_one("misc", &record! { "item" => "TAPE" }, "quantity", 1, 0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn increment_of_text_field_is_a_type_mismatch() {
        let mut storage = storage();
        storage.insert_one("misc", &record! { "item" => "ROLL" }).unwrap();
        let err = storage
            .increment_one("misc", &record! { "item" => "ROLL" }, "item", 1, 0)
            .unwrap_err();
        assert!(matches!(err, StorageError::TypeMismatch { .. }));
    }

    #[test]
    fn upsert_inserts_then_updates_the_same_document() {
        let mut storage = storage();
        let filter = record! { "brand" => "BRADY", "item" => "ROLL" };

        let Upsert::Inserted { doc_id, value } =
            storage.upsert_increment("misc", &filter, "quantity", 3, 0).unwrap()
        else {
            panic!("expected insert");
        };
        assert_eq!(value, 3);

        let Upsert::Updated(inc) =
            storage.upsert_increment("misc", &filter, "quantity", 2, 0).unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(inc.doc_id, doc_id);
        assert_eq!((inc.previous, inc.value), (3, 5));
        assert_eq!(storage.find("misc", &filter).unwrap().len(), 1);
    }

    #[test]
    fn upsert_with_negative_delta_inserts_at_floor() {
        let mut storage = storage();
        let filter = record! { "item" => "ROLL" };
        let outcome = storage.upsert_increment("misc", &filter, "quantity", -4, 0).unwrap();
        assert!(matches!(outcome, Upsert::Inserted { value: 0, .. }));
    }

    #[test]
    fn separate_handles_share_a_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.db");
        let mut a = SqliteStorage::open(&path).unwrap();
        let b = SqliteStorage::open(&path).unwrap();

        a.insert_one("misc", &record! { "item" => "ROLL", "quantity" => 1 }).unwrap();
        let found = b.find_one("misc", &record! { "item" => "ROLL" }).unwrap();
        assert_eq!(found.unwrap().fields.quantity(), Some(1));
    }
}
