use std::fmt;

use crate::error::CoreError;

/// Selects which schema and collection an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Site,
    Fiber,
    Optic,
    Misc,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Site,
        Category::Fiber,
        Category::Optic,
        Category::Misc,
    ];

    /// Categories that describe stock lines carrying a `quantity`.
    pub const STOCK: [Category; 3] = [Category::Fiber, Category::Optic, Category::Misc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::Fiber => "fiber",
            Self::Optic => "optic",
            Self::Misc => "misc",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "site" => Ok(Self::Site),
            "fiber" => Ok(Self::Fiber),
            "optic" => Ok(Self::Optic),
            "misc" => Ok(Self::Misc),
            _ => Err(CoreError::UnknownCategory(s.to_string())),
        }
    }

    pub fn collection(&self) -> &'static str {
        crate::schema::schema_for(*self).collection
    }

    pub fn is_stock(&self) -> bool {
        !matches!(self, Self::Site)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()).unwrap(), category);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(matches!(
            Category::parse("cable"),
            Err(CoreError::UnknownCategory(tag)) if tag == "cable"
        ));
    }

    #[test]
    fn collections_are_distinct() {
        let names: std::collections::BTreeSet<_> =
            Category::ALL.iter().map(|c| c.collection()).collect();
        assert_eq!(names.len(), 4);
        assert_eq!(Category::Fiber.collection(), "fibers");
    }
}
