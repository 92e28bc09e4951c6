use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::CoreError;
use crate::field_value::FieldValue;
use crate::schema::schema_for;

pub const QUANTITY: &str = "quantity";
pub const SITE_CILI: &str = "site_cili";

/// A flat field-name to value mapping, the document shape of every category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a record from values listed in the category's declared field order.
    pub fn from_positional(
        category: Category,
        values: Vec<FieldValue>,
    ) -> Result<Self, CoreError> {
        let schema = schema_for(category);
        if values.len() != schema.fields.len() {
            return Err(CoreError::Arity {
                category: category.as_str(),
                expected: schema.fields.len(),
                found: values.len(),
            });
        }
        Ok(schema.field_names().zip(values).collect())
    }

    pub fn insert(&mut self, key: &str, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.0.insert(key.to_string(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FieldValue::as_integer)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn quantity(&self) -> Option<i64> {
        self.integer(QUANTITY)
    }

    /// All fields except `quantity`: two records with equal identities are the same stock line.
    pub fn identity(&self) -> Record {
        self.clone().without(QUANTITY)
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.insert(QUANTITY, quantity);
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.0.remove(key);
        self
    }

    /// Upper-case and trim every text value, the way the entry forms record
    /// what a technician types.
    pub fn normalized(self) -> Self {
        self.0
            .into_iter()
            .map(|(k, v)| match v {
                FieldValue::Text(s) => (k, FieldValue::Text(s.trim().to_uppercase())),
                other => (k, other),
            })
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Build a [`Record`] from `key => value` pairs.
#[macro_export]
macro_rules! record {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut record = $crate::record::Record::new();
        $( record.insert($key, $value); )*
        record
    }};
}

/// `max(0, current + delta)`, saturating instead of overflowing.
pub fn apply_delta(current: i64, delta: i64) -> i64 {
    current.saturating_add(delta).max(0)
}
