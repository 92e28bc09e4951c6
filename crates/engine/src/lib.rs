pub mod error;
pub mod logging;
pub mod outcome;

pub use error::EngineError;
pub use outcome::{Adjustment, InsertOutcome, SiteInventory, StockOutcome};

use std::collections::BTreeSet;

use fieldstock_core::{
    Category, CategoryRecord, FieldValue, Record, Site, StockLine, ValidationError, apply_delta,
    connectors::canonicalize,
    record::{QUANTITY, SITE_CILI},
    schema::{registry, schema_for, validate},
};
use fieldstock_storage::{SqliteStorage, Storage, StorageError, StoreConfig, Upsert};
use tracing::{info, warn};

/// The inventory data-access layer. Construct one per process and pass it to
/// whatever front end drives it; it owns the only connection it uses.
pub struct InventoryStore {
    storage: SqliteStorage,
}

impl InventoryStore {
    /// Wrap an open storage handle and declare the unique keys every schema asks for.
    pub fn new(mut storage: SqliteStorage) -> Result<Self, EngineError> {
        for schema in registry() {
            if let Some(field_key) = schema.unique_key {
                storage.ensure_unique_index(schema.collection, field_key)?;
            }
        }
        Ok(Self { storage })
    }

    pub fn open(config: &StoreConfig) -> Result<Self, EngineError> {
        Self::new(SqliteStorage::open_with_config(config)?)
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        Self::new(SqliteStorage::open_in_memory()?)
    }

    /// The exact-match filter for a line: identity fields only, in canonical
    /// form. Refused unless it names every identity field of the category.
    fn identity_filter(category: Category, identity: &Record) -> Result<Record, ValidationError> {
        let mut filter = identity.identity();
        canonicalize(category, &mut filter);
        schema_for(category).validate_identity(&filter)?;
        Ok(filter)
    }

    fn require_stock(category: Category) -> Result<(), EngineError> {
        if category.is_stock() {
            Ok(())
        } else {
            Err(EngineError::NotStock(category))
        }
    }

    /// Current quantity of the line whose identity matches, or `None` when
    /// there is no such line.
    pub fn find_existing_quantity(
        &self,
        category: Category,
        identity: &Record,
    ) -> Result<Option<i64>, EngineError> {
        let filter = match Self::identity_filter(category, identity) {
            Ok(filter) => filter,
            Err(err) => {
                warn!(%category, %err, "lookup with incomplete identity");
                return Ok(None);
            }
        };
        let Some(doc) = self.storage.find_one(category.collection(), &filter)? else {
            return Ok(None);
        };
        let quantity = doc.fields.quantity();
        if quantity.is_none() && schema_for(category).has_quantity() {
            warn!(%category, doc_id = %doc.doc_id, "stored line has no integer quantity");
        }
        Ok(quantity)
    }

    /// Validate and store a record. Fiber connectors are put in canonical
    /// order first. Stock lines are not checked for an existing identity.
    pub fn insert(
        &mut self,
        category: Category,
        mut record: Record,
    ) -> Result<InsertOutcome, EngineError> {
        canonicalize(category, &mut record);
        if let Err(err) = validate(category, &record) {
            warn!(%category, %err, "refused insert");
            return Ok(InsertOutcome::Invalid(err));
        }
        match self.storage.insert_one(category.collection(), &record) {
            Ok(_) => {
                info!(%category, quantity = ?record.quantity(), "inserted record");
                Ok(InsertOutcome::Inserted)
            }
            Err(StorageError::DuplicateKey { field_key, .. }) => {
                info!(%category, %field_key, "record already exists");
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write `max(0, current + delta)` to the line matching `identity`.
    /// Returns the stored quantity, or `None` when no line matched.
    pub fn update_quantity(
        &mut self,
        category: Category,
        current: i64,
        delta: i64,
        identity: &Record,
    ) -> Result<Option<i64>, EngineError> {
        Self::require_stock(category)?;
        let filter = match Self::identity_filter(category, identity) {
            Ok(filter) => filter,
            Err(err) => {
                warn!(%category, %err, "quantity update with incomplete identity");
                return Ok(None);
            }
        };
        let quantity = apply_delta(current, delta);
        let matched = self.storage.set_field_one(
            category.collection(),
            &filter,
            QUANTITY,
            &FieldValue::Integer(quantity),
        )?;
        if !matched {
            warn!(%category, "quantity update matched no line");
            return Ok(None);
        }
        info!(%category, current, delta, quantity, "updated quantity");
        Ok(Some(quantity))
    }

    /// Add `delta` to the matching line's quantity in one store-side
    /// transaction, clamping at zero.
    pub fn adjust_quantity(
        &mut self,
        category: Category,
        identity: &Record,
        delta: i64,
    ) -> Result<Option<Adjustment>, EngineError> {
        Self::require_stock(category)?;
        let filter = match Self::identity_filter(category, identity) {
            Ok(filter) => filter,
            Err(err) => {
                warn!(%category, %err, "adjustment with incomplete identity");
                return Ok(None);
            }
        };
        let adjusted = self
            .storage
            .increment_one(category.collection(), &filter, QUANTITY, delta, 0)?
            .map(|inc| Adjustment {
                previous: inc.previous,
                quantity: inc.value,
            });
        if let Some(adj) = adjusted {
            info!(
                %category,
                delta,
                previous = adj.previous,
                quantity = adj.quantity,
                "adjusted quantity"
            );
        }
        Ok(adjusted)
    }

    /// Build the full line for an add/remove request and check it against the schema.
    fn stock_line(
        category: Category,
        identity: &Record,
        quantity: i64,
    ) -> Result<Result<Record, StockOutcome>, EngineError> {
        Self::require_stock(category)?;
        let mut line = identity.identity().with_quantity(quantity);
        canonicalize(category, &mut line);
        match validate(category, &line) {
            Ok(()) => Ok(Ok(line)),
            Err(err) => {
                warn!(%category, %err, "refused stock change");
                Ok(Err(StockOutcome::Invalid(err)))
            }
        }
    }

    /// Add `quantity` units: merge into the existing line with this identity,
    /// or create it. Lookup and write are a single atomic store operation.
    pub fn add_stock(
        &mut self,
        category: Category,
        identity: &Record,
        quantity: i64,
    ) -> Result<StockOutcome, EngineError> {
        let line = match Self::stock_line(category, identity, quantity)? {
            Ok(line) => line,
            Err(outcome) => return Ok(outcome),
        };
        let upsert = self.storage.upsert_increment(
            category.collection(),
            &line.identity(),
            QUANTITY,
            quantity,
            0,
        )?;
        let outcome = match upsert {
            Upsert::Inserted { value, .. } => StockOutcome::Inserted { quantity: value },
            Upsert::Updated(inc) => StockOutcome::Adjusted {
                previous: inc.previous,
                quantity: inc.value,
            },
        };
        info!(%category, added = quantity, ?outcome, "added stock");
        Ok(outcome)
    }

    /// Remove `quantity` units from an existing line, never going below zero.
    /// A line that does not exist is reported, not created.
    pub fn remove_stock(
        &mut self,
        category: Category,
        identity: &Record,
        quantity: i64,
    ) -> Result<StockOutcome, EngineError> {
        let line = match Self::stock_line(category, identity, quantity)? {
            Ok(line) => line,
            Err(outcome) => return Ok(outcome),
        };
        let outcome = match self.adjust_quantity(category, &line, -quantity)? {
            Some(adj) => StockOutcome::Adjusted {
                previous: adj.previous,
                quantity: adj.quantity,
            },
            None => {
                info!(%category, "item does not exist");
                StockOutcome::NotFound
            }
        };
        Ok(outcome)
    }

    pub fn add_line<T: StockLine>(&mut self, line: &T) -> Result<StockOutcome, EngineError> {
        self.add_stock(T::CATEGORY, &line.identity(), line.quantity())
    }

    pub fn remove_line<T: StockLine>(&mut self, line: &T) -> Result<StockOutcome, EngineError> {
        self.remove_stock(T::CATEGORY, &line.identity(), line.quantity())
    }

    pub fn register_site(&mut self, site: &Site) -> Result<InsertOutcome, EngineError> {
        self.insert(Category::Site, site.to_record())
    }

    /// Every registered site identifier.
    pub fn list_sites(&self) -> Result<BTreeSet<String>, EngineError> {
        let values = self.storage.distinct(Category::Site.collection(), "cili")?;
        Ok(values
            .into_iter()
            .filter_map(|v| v.as_text().map(str::to_string))
            .collect())
    }

    pub fn site_exists(&self, cili: &str) -> Result<bool, EngineError> {
        Ok(self.find_site(cili)?.is_some())
    }

    pub fn find_site(&self, cili: &str) -> Result<Option<Site>, EngineError> {
        let filter: Record = [("cili", FieldValue::from(cili))].into_iter().collect();
        match self.storage.find_one(Category::Site.collection(), &filter)? {
            Some(doc) => Ok(Some(Site::from_record(&doc.fields)?)),
            None => Ok(None),
        }
    }

    fn lines_at(&self, category: Category, cili: &str) -> Result<Vec<Record>, EngineError> {
        let filter: Record = [(SITE_CILI, FieldValue::from(cili))].into_iter().collect();
        Ok(self
            .storage
            .find(category.collection(), &filter)?
            .into_iter()
            .map(|doc| doc.fields.without(SITE_CILI))
            .collect())
    }

    /// Fiber, optic and misc lines held at `cili`.
    pub fn inventory_for_site(&self, cili: &str) -> Result<SiteInventory, EngineError> {
        Ok(SiteInventory {
            fiber: self.lines_at(Category::Fiber, cili)?,
            optic: self.lines_at(Category::Optic, cili)?,
            misc: self.lines_at(Category::Misc, cili)?,
        })
    }
}
