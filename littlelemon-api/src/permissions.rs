//! Permission gate.
//!
//! Every service operation calls [`require`] before touching the database,
//! so a denied request never has partial effects.

use crate::auth::Caller;
use crate::error::ApiError;
use crate::roles::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Catalog,
    StaffMembership,
    Cart,
    Orders,
}

/// HTTP-shaped operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// GET
    Read,
    /// POST
    Create,
    /// PUT
    Replace,
    /// PATCH
    Modify,
    /// DELETE
    Delete,
}

pub fn allow(role: Role, action: Action, resource: Resource) -> bool {
    match (resource, action) {
        (Resource::Catalog, Action::Read) => true,
        (Resource::Catalog, _) => role.is_manager_or_above(),
        (Resource::StaffMembership, _) => role.is_manager_or_above(),
        (Resource::Cart, _) => role == Role::Customer,
        (Resource::Orders, Action::Read) => true,
        (Resource::Orders, Action::Create) => role == Role::Customer,
        (Resource::Orders, Action::Replace | Action::Delete) => role.is_manager_or_above(),
        (Resource::Orders, Action::Modify) => {
            role.is_manager_or_above() || role == Role::DeliveryCrew
        }
    }
}

pub fn require(caller: &Caller, action: Action, resource: Resource) -> Result<(), ApiError> {
    if allow(caller.role, action, resource) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = caller.user.id,
            role = ?caller.role,
            ?action,
            ?resource,
            "permission denied"
        );
        Err(ApiError::forbidden())
    }
}

/// Operations that also serve requests without a bearer token.
pub fn allow_anonymous(action: Action, resource: Resource) -> bool {
    matches!((resource, action), (Resource::Catalog, Action::Read))
}

/// [`require`] for endpoints where the caller may be anonymous.
pub fn require_optional(
    caller: Option<&Caller>,
    action: Action,
    resource: Resource,
) -> Result<(), ApiError> {
    match caller {
        Some(caller) => require(caller, action, resource),
        None if allow_anonymous(action, resource) => Ok(()),
        None => Err(ApiError::AuthenticationFailed),
    }
}
