//! Domain operations. Each one takes the explicit [`Caller`](crate::auth::Caller)
//! and checks the permission gate before touching the database.

use crate::permissions::Action;

pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod staff;

/// PUT or PATCH semantics for an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Every writable field is taken from the request.
    Replace,
    /// Only the fields sent change.
    Partial,
}

impl UpdateMode {
    pub fn action(self) -> Action {
        match self {
            UpdateMode::Replace => Action::Replace,
            UpdateMode::Partial => Action::Modify,
        }
    }
}
