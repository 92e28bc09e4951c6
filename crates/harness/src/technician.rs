use fieldstock_core::{
    Category, CoreError, FieldValue, Record,
    record::{QUANTITY, SITE_CILI},
    schema::schema_for,
};
use fieldstock_engine::{InsertOutcome, InventoryStore, StockOutcome};

/// One user of the inventory, driving the store the way the entry forms do:
/// values are typed in positionally, upper-cased, and routed through the
/// lookup-then-write workflow.
pub struct TestTechnician {
    pub store: InventoryStore,
    site: String,
}

impl TestTechnician {
    pub fn new(store: InventoryStore, site: &str) -> Self {
        Self {
            store,
            site: site.to_uppercase(),
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn select_site(&mut self, cili: &str) {
        self.site = cili.to_uppercase();
    }

    /// Register a site from its seven form values, skipping the write when the
    /// `cili` is already known.
    pub fn enter_site(
        &mut self,
        values: [&str; 7],
    ) -> Result<InsertOutcome, Box<dyn std::error::Error>> {
        let record = Record::from_positional(
            Category::Site,
            values.iter().map(|v| FieldValue::from(*v)).collect(),
        )?
        .normalized();
        let cili = record.text("cili").unwrap_or_default().to_string();
        if self.store.site_exists(&cili)? {
            return Ok(InsertOutcome::AlreadyExists);
        }
        Ok(self.store.insert(Category::Site, record)?)
    }

    /// Identity of a stock line from the form's text values, in declared
    /// field order, scoped to the selected site.
    pub fn form(&self, category: Category, values: &[&str]) -> Result<Record, CoreError> {
        let schema = schema_for(category);
        let names: Vec<_> = schema
            .identity_fields()
            .map(|f| f.name)
            .filter(|name| *name != SITE_CILI)
            .collect();
        if names.len() != values.len() {
            return Err(CoreError::Arity {
                category: category.as_str(),
                expected: names.len(),
                found: values.len(),
            });
        }
        let mut record: Record = names
            .into_iter()
            .zip(values.iter().map(|v| FieldValue::from(*v)))
            .collect();
        record.insert(SITE_CILI, self.site.as_str());
        Ok(record.normalized())
    }

    /// Add stock with a separate lookup and write, as the forms always did.
    pub fn check_then_add(
        &mut self,
        category: Category,
        identity: &Record,
        quantity: i64,
    ) -> Result<StockOutcome, Box<dyn std::error::Error>> {
        match self.store.find_existing_quantity(category, identity)? {
            Some(current) => {
                match self.store.update_quantity(category, current, quantity, identity)? {
                    Some(stored) => Ok(StockOutcome::Adjusted {
                        previous: current,
                        quantity: stored,
                    }),
                    None => Ok(StockOutcome::NotFound),
                }
            }
            None => {
                let line = identity.identity().with_quantity(quantity);
                match self.store.insert(category, line)? {
                    InsertOutcome::Inserted => Ok(StockOutcome::Inserted { quantity }),
                    InsertOutcome::Invalid(err) => Ok(StockOutcome::Invalid(err)),
                    InsertOutcome::AlreadyExists => {
                        Err(format!("{category} line collided with a unique key").into())
                    }
                }
            }
        }
    }

    /// Remove stock with a separate lookup and write.
    pub fn check_then_remove(
        &mut self,
        category: Category,
        identity: &Record,
        quantity: i64,
    ) -> Result<StockOutcome, Box<dyn std::error::Error>> {
        let Some(current) = self.store.find_existing_quantity(category, identity)? else {
            return Ok(StockOutcome::NotFound);
        };
        match self.store.update_quantity(category, current, -quantity, identity)? {
            Some(stored) => Ok(StockOutcome::Adjusted {
                previous: current,
                quantity: stored,
            }),
            None => Ok(StockOutcome::NotFound),
        }
    }

    pub fn quantity_of(
        &self,
        category: Category,
        identity: &Record,
    ) -> Result<Option<i64>, Box<dyn std::error::Error>> {
        Ok(self.store.find_existing_quantity(category, identity)?)
    }

    /// Lines of `category` at the selected site, quantity included.
    pub fn view(&self, category: Category) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
        let inventory = self.store.inventory_for_site(&self.site)?;
        Ok(inventory.lines(category).to_vec())
    }

    pub fn total_units(&self, category: Category) -> Result<i64, Box<dyn std::error::Error>> {
        Ok(self
            .view(category)?
            .iter()
            .filter_map(|line| line.integer(QUANTITY))
            .sum())
    }
}
