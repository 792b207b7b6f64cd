use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub mod attendee;
pub mod conference;
pub mod session;
pub mod speaker;

/// Pointer to another entity inside a request body (`{"id": 3}`); any other
/// fields sent alongside the id are ignored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq, Hash)]
#[ts(export)]
pub struct EntityRef {
    pub id: i64,
}

/// Id-only equality. An entity without an id is not equal even to itself,
/// so the models must not implement `Eq` or `Hash`.
pub(crate) fn same_identity(a: Option<i64>, b: Option<i64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}
