pub mod category;
pub mod connectors;
pub mod error;
pub mod field_value;
pub mod ids;
pub mod kinds;
pub mod record;
pub mod schema;

pub use category::Category;
pub use error::CoreError;
pub use field_value::FieldValue;
pub use ids::DocumentId;
pub use kinds::{CategoryRecord, Fiber, Misc, Optic, Site, StockLine};
pub use record::{Record, apply_delta};
pub use schema::{SchemaViolation, ValidationError};
