//! The schema registry: field names and primitive types per category.
//!
//! Lookups go through a static table indexed by [`Category`]; each entry
//! carries its own validator so categories with extra rules (stock lines
//! must not carry a negative quantity) need no special-casing at call sites.

use std::fmt;

use thiserror::Error;

use crate::category::Category;
use crate::record::{QUANTITY, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Integer,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        ty: FieldType::Text,
    }
}

const fn integer(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        ty: FieldType::Integer,
    }
}

pub type Validator = fn(&SchemaDescriptor, &Record) -> Vec<SchemaViolation>;

pub struct SchemaDescriptor {
    pub category: Category,
    pub collection: &'static str,
    /// Declared field order; positional construction follows it.
    pub fields: &'static [FieldSpec],
    /// Field carrying a uniqueness constraint in the store, if any.
    pub unique_key: Option<&'static str>,
    validator: Validator,
}

impl SchemaDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Fields that make up a record's identity (everything except `quantity`).
    pub fn identity_fields(&self) -> impl Iterator<Item = &'static FieldSpec> + Clone {
        self.fields.iter().filter(|f| f.name != QUANTITY)
    }

    pub fn has_quantity(&self) -> bool {
        self.field(QUANTITY).is_some()
    }

    pub fn validate(&self, record: &Record) -> Result<(), ValidationError> {
        self.report((self.validator)(self, record))
    }

    /// Check that `identity` names exactly the identity fields, each with its
    /// declared type. A partial identity would match unrelated lines.
    pub fn validate_identity(&self, identity: &Record) -> Result<(), ValidationError> {
        self.report(check_fields(self.identity_fields(), identity))
    }

    fn report(&self, violations: Vec<SchemaViolation>) -> Result<(), ValidationError> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                category: self.category,
                violations,
            })
        }
    }
}

impl fmt::Debug for SchemaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDescriptor")
            .field("category", &self.category)
            .field("collection", &self.collection)
            .field("fields", &self.fields)
            .field("unique_key", &self.unique_key)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("unexpected field `{0}`")]
    UnexpectedField(String),

    #[error("field `{field}` expects {expected}, found {found}")]
    WrongType {
        field: &'static str,
        expected: FieldType,
        found: FieldType,
    },

    #[error("quantity must not be negative, found {0}")]
    NegativeQuantity(i64),
}

/// A record that does not match its category's schema. Returned as a value
/// so callers can refuse the write and tell the user what to fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {category} record: {}", describe(.violations))]
pub struct ValidationError {
    pub category: Category,
    pub violations: Vec<SchemaViolation>,
}

fn describe(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_fields(
    specs: impl Iterator<Item = &'static FieldSpec> + Clone,
    record: &Record,
) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();
    for spec in specs.clone() {
        match record.get(spec.name) {
            None => violations.push(SchemaViolation::MissingField(spec.name)),
            Some(value) if value.field_type() != spec.ty => {
                violations.push(SchemaViolation::WrongType {
                    field: spec.name,
                    expected: spec.ty,
                    found: value.field_type(),
                })
            }
            Some(_) => {}
        }
    }
    for key in record.keys() {
        if !specs.clone().any(|spec| spec.name == key) {
            violations.push(SchemaViolation::UnexpectedField(key.to_string()));
        }
    }
    violations
}

fn check_shape(schema: &SchemaDescriptor, record: &Record) -> Vec<SchemaViolation> {
    check_fields(schema.fields.iter(), record)
}

fn check_stock_line(schema: &SchemaDescriptor, record: &Record) -> Vec<SchemaViolation> {
    let mut violations = check_shape(schema, record);
    if let Some(quantity) = record.quantity() {
        if quantity < 0 {
            violations.push(SchemaViolation::NegativeQuantity(quantity));
        }
    }
    violations
}

static SCHEMAS: [SchemaDescriptor; 4] = [
    SchemaDescriptor {
        category: Category::Site,
        collection: "sites",
        fields: &[
            text("cili"),
            text("address"),
            text("city"),
            text("state"),
            text("country"),
            text("zip_code"),
            text("site_id"),
        ],
        unique_key: Some("cili"),
        validator: check_shape,
    },
    SchemaDescriptor {
        category: Category::Fiber,
        collection: "fibers",
        fields: &[
            text("cordage"),
            text("type"),
            text("conn1"),
            text("conn2"),
            text("length"),
            integer(QUANTITY),
            text("site_cili"),
        ],
        unique_key: None,
        validator: check_stock_line,
    },
    SchemaDescriptor {
        category: Category::Optic,
        collection: "optics",
        fields: &[
            text("make"),
            text("broadband"),
            text("wavelength"),
            text("distance"),
            text("type"),
            text("part_number"),
            integer(QUANTITY),
            text("site_cili"),
        ],
        unique_key: None,
        validator: check_stock_line,
    },
    SchemaDescriptor {
        category: Category::Misc,
        collection: "misc",
        fields: &[
            text("brand"),
            text("item"),
            integer(QUANTITY),
            text("site_cili"),
        ],
        unique_key: None,
        validator: check_stock_line,
    },
];

pub fn schema_for(category: Category) -> &'static SchemaDescriptor {
    let index = match category {
        Category::Site => 0,
        Category::Fiber => 1,
        Category::Optic => 2,
        Category::Misc => 3,
    };
    &SCHEMAS[index]
}

pub fn registry() -> &'static [SchemaDescriptor] {
    &SCHEMAS
}

pub fn validate(category: Category, record: &Record) -> Result<(), ValidationError> {
    schema_for(category).validate(record)
}
