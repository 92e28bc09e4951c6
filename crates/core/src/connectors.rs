use crate::category::Category;
use crate::field_value::FieldValue;
use crate::record::Record;

/// The connector type that always occupies `conn1` when a cord has one.
pub const PREFERRED_CONNECTOR: &str = "LC";

pub const CONN1: &str = "conn1";
pub const CONN2: &str = "conn2";

/// Put the preferred connector first. A pair where neither or both ends are
/// the preferred type is returned in the order given.
pub fn canonicalize_connectors(conn1: String, conn2: String) -> (String, String) {
    if conn1 != PREFERRED_CONNECTOR && conn2 == PREFERRED_CONNECTOR {
        (conn2, conn1)
    } else {
        (conn1, conn2)
    }
}

/// Apply category-specific canonical ordering in place. Only fiber records
/// are affected, and only when both connector fields are text.
pub fn canonicalize(category: Category, record: &mut Record) {
    if category != Category::Fiber {
        return;
    }
    let (Some(conn1), Some(conn2)) = (record.text(CONN1), record.text(CONN2)) else {
        return;
    };
    let (conn1, conn2) = canonicalize_connectors(conn1.to_string(), conn2.to_string());
    record.insert(CONN1, FieldValue::Text(conn1));
    record.insert(CONN2, FieldValue::Text(conn2));
}
