//! Strongly typed views of the four record kinds.

use crate::category::Category;
use crate::field_value::FieldValue;
use crate::record::{QUANTITY, Record, SITE_CILI};
use crate::schema::{ValidationError, schema_for};

pub trait CategoryRecord: Sized {
    const CATEGORY: Category;

    fn to_record(&self) -> Record;

    /// Decode a record that must already satisfy the category's schema.
    fn from_record(record: &Record) -> Result<Self, ValidationError>;
}

/// Stock lines carry a quantity and belong to a site.
pub trait StockLine: CategoryRecord {
    fn quantity(&self) -> i64;

    fn site_cili(&self) -> &str;

    fn identity(&self) -> Record {
        self.to_record().identity()
    }
}

fn text(record: &Record, key: &str) -> String {
    record.text(key).unwrap_or_default().to_string()
}

macro_rules! category_record {
    ($ty:ident, $category:expr, text: [$($field:ident),*] $(, quantity: $qty:ident)?) => {
        impl CategoryRecord for $ty {
            const CATEGORY: Category = $category;

            fn to_record(&self) -> Record {
                let mut record = Record::new();
                $( record.insert(stringify!($field), FieldValue::Text(self.$field.clone())); )*
                $( record.insert(QUANTITY, FieldValue::Integer(self.$qty)); )?
                record
            }

            fn from_record(record: &Record) -> Result<Self, ValidationError> {
                schema_for(Self::CATEGORY).validate(record)?;
                Ok(Self {
                    $( $field: text(record, stringify!($field)), )*
                    $( $qty: record.quantity().unwrap_or_default(), )?
                })
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub cili: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
    pub site_id: String,
}

category_record!(
    Site,
    Category::Site,
    text: [cili, address, city, state, country, zip_code, site_id]
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fiber {
    pub cordage: String,
    pub r#type: String,
    pub conn1: String,
    pub conn2: String,
    pub length: String,
    pub quantity: i64,
    pub site_cili: String,
}

// `type` is a keyword, so Fiber and Optic spell out their conversions.
impl CategoryRecord for Fiber {
    const CATEGORY: Category = Category::Fiber;

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("cordage", self.cordage.as_str());
        record.insert("type", self.r#type.as_str());
        record.insert("conn1", self.conn1.as_str());
        record.insert("conn2", self.conn2.as_str());
        record.insert("length", self.length.as_str());
        record.insert(QUANTITY, self.quantity);
        record.insert(SITE_CILI, self.site_cili.as_str());
        record
    }

    fn from_record(record: &Record) -> Result<Self, ValidationError> {
        schema_for(Self::CATEGORY).validate(record)?;
        Ok(Self {
            cordage: text(record, "cordage"),
            r#type: text(record, "type"),
            conn1: text(record, "conn1"),
            conn2: text(record, "conn2"),
            length: text(record, "length"),
            quantity: record.quantity().unwrap_or_default(),
            site_cili: text(record, SITE_CILI),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optic {
    pub make: String,
    pub broadband: String,
    pub wavelength: String,
    pub distance: String,
    pub r#type: String,
    pub part_number: String,
    pub quantity: i64,
    pub site_cili: String,
}

impl CategoryRecord for Optic {
    const CATEGORY: Category = Category::Optic;

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("make", self.make.as_str());
        record.insert("broadband", self.broadband.as_str());
        record.insert("wavelength", self.wavelength.as_str());
        record.insert("distance", self.distance.as_str());
        record.insert("type", self.r#type.as_str());
        record.insert("part_number", self.part_number.as_str());
        record.insert(QUANTITY, self.quantity);
        record.insert(SITE_CILI, self.site_cili.as_str());
        record
    }

    fn from_record(record: &Record) -> Result<Self, ValidationError> {
        schema_for(Self::CATEGORY).validate(record)?;
        Ok(Self {
            make: text(record, "make"),
            broadband: text(record, "broadband"),
            wavelength: text(record, "wavelength"),
            distance: text(record, "distance"),
            r#type: text(record, "type"),
            part_number: text(record, "part_number"),
            quantity: record.quantity().unwrap_or_default(),
            site_cili: text(record, SITE_CILI),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Misc {
    pub brand: String,
    pub item: String,
    pub quantity: i64,
    pub site_cili: String,
}

category_record!(Misc, Category::Misc, text: [brand, item, site_cili], quantity: quantity);

macro_rules! stock_line {
    ($($ty:ident),*) => {
        $(
            impl StockLine for $ty {
                fn quantity(&self) -> i64 {
                    self.quantity
                }

                fn site_cili(&self) -> &str {
                    &self.site_cili
                }
            }
        )*
    };
}

stock_line!(Fiber, Optic, Misc);
