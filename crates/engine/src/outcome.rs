use fieldstock_core::{Category, Record, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A site with the same `cili` is already registered. Nothing was written.
    AlreadyExists,
    /// The record does not match its schema. Nothing was written.
    Invalid(ValidationError),
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockOutcome {
    /// A new stock line was created.
    Inserted { quantity: i64 },
    /// An existing stock line's quantity changed (possibly clamped at zero).
    Adjusted { previous: i64, quantity: i64 },
    /// Removal was requested for a line that does not exist. Nothing was written.
    NotFound,
    Invalid(ValidationError),
}

impl StockOutcome {
    /// Quantity stored after the operation, if a line exists.
    pub fn quantity(&self) -> Option<i64> {
        match self {
            Self::Inserted { quantity } | Self::Adjusted { quantity, .. } => Some(*quantity),
            Self::NotFound | Self::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub previous: i64,
    pub quantity: i64,
}

/// Stock lines held at one site, with internal ids and `site_cili` removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteInventory {
    pub fiber: Vec<Record>,
    pub optic: Vec<Record>,
    pub misc: Vec<Record>,
}

impl SiteInventory {
    pub fn lines(&self, category: Category) -> &[Record] {
        match category {
            Category::Fiber => &self.fiber,
            Category::Optic => &self.optic,
            Category::Misc => &self.misc,
            Category::Site => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fiber.is_empty() && self.optic.is_empty() && self.misc.is_empty()
    }
}
