//! Role resolution.
//!
//! Every permission and visibility decision in the service goes through a
//! single [`Role`] derived from the superuser flag and the user's group
//! memberships.

use diesel::prelude::*;

use crate::models::User;
use crate::schema::{groups, user_groups};

/// The two staff groups a user can be promoted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleGroup {
    Manager,
    DeliveryCrew,
}

impl RoleGroup {
    /// Group name as stored in the `groups` table.
    pub fn name(self) -> &'static str {
        match self {
            RoleGroup::Manager => "Manager",
            RoleGroup::DeliveryCrew => "Delivery Crew",
        }
    }

    /// Path segment used under `/groups/{slug}/users`.
    pub fn slug(self) -> &'static str {
        match self {
            RoleGroup::Manager => "manager",
            RoleGroup::DeliveryCrew => "delivery-crew",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "manager" => Some(RoleGroup::Manager),
            "delivery-crew" => Some(RoleGroup::DeliveryCrew),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Administrator,
    Manager,
    DeliveryCrew,
    Customer,
}

/// Which orders a caller is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    All,
    AssignedTo(i32),
    PlacedBy(i32),
}

impl Role {
    /// First matching rule wins: superuser, then Manager, then Delivery Crew.
    /// Anything else, including membership in unrelated groups, is a customer.
    pub fn resolve<S: AsRef<str>>(is_superuser: bool, group_names: &[S]) -> Role {
        if is_superuser {
            return Role::Administrator;
        }
        let has = |group: RoleGroup| group_names.iter().any(|g| g.as_ref() == group.name());
        if has(RoleGroup::Manager) {
            Role::Manager
        } else if has(RoleGroup::DeliveryCrew) {
            Role::DeliveryCrew
        } else {
            Role::Customer
        }
    }

    pub fn is_manager_or_above(self) -> bool {
        matches!(self, Role::Administrator | Role::Manager)
    }

    pub fn order_scope(self, user_id: i32) -> OrderScope {
        match self {
            Role::Administrator | Role::Manager => OrderScope::All,
            Role::DeliveryCrew => OrderScope::AssignedTo(user_id),
            Role::Customer => OrderScope::PlacedBy(user_id),
        }
    }

    /// Staff views expose the customer identity and the assigned crew id.
    pub fn sees_staff_order_view(self) -> bool {
        !matches!(self, Role::Customer)
    }
}

pub fn group_names(conn: &mut PgConnection, user_id: i32) -> QueryResult<Vec<String>> {
    user_groups::table
        .inner_join(groups::table)
        .filter(user_groups::user_id.eq(user_id))
        .select(groups::name)
        .order(groups::name.asc())
        .load(conn)
}

pub fn load_role(conn: &mut PgConnection, user: &User) -> QueryResult<Role> {
    let names = group_names(conn, user.id)?;
    Ok(Role::resolve(user.is_superuser, &names))
}

pub fn is_member(conn: &mut PgConnection, user_id: i32, group: RoleGroup) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        user_groups::table
            .inner_join(groups::table)
            .filter(user_groups::user_id.eq(user_id))
            .filter(groups::name.eq(group.name())),
    ))
    .get_result(conn)
}

pub fn group_id(conn: &mut PgConnection, group: RoleGroup) -> QueryResult<i32> {
    groups::table
        .filter(groups::name.eq(group.name()))
        .select(groups::id)
        .first(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_GROUPS: [&str; 0] = [];

    #[test]
    fn superuser_wins_over_any_group() {
        assert_eq!(Role::resolve(true, &NO_GROUPS), Role::Administrator);
        assert_eq!(
            Role::resolve(true, &["Delivery Crew", "Manager"]),
            Role::Administrator
        );
    }

    #[test]
    fn manager_is_checked_before_delivery_crew() {
        assert_eq!(
            Role::resolve(false, &["Delivery Crew", "Manager"]),
            Role::Manager
        );
        assert_eq!(Role::resolve(false, &["Delivery Crew"]), Role::DeliveryCrew);
    }

    #[test]
    fn no_known_group_means_customer() {
        assert_eq!(Role::resolve(false, &NO_GROUPS), Role::Customer);
        assert_eq!(Role::resolve(false, &["Kitchen"]), Role::Customer);
    }

    #[test]
    fn order_scope_follows_role() {
        assert_eq!(Role::Administrator.order_scope(3), OrderScope::All);
        assert_eq!(Role::Manager.order_scope(3), OrderScope::All);
        assert_eq!(Role::DeliveryCrew.order_scope(3), OrderScope::AssignedTo(3));
        assert_eq!(Role::Customer.order_scope(3), OrderScope::PlacedBy(3));
    }

    #[test]
    fn group_slugs_round_trip() {
        for group in [RoleGroup::Manager, RoleGroup::DeliveryCrew] {
            assert_eq!(RoleGroup::from_slug(group.slug()), Some(group));
        }
        assert_eq!(RoleGroup::from_slug("Manager"), None);
        assert_eq!(RoleGroup::from_slug("kitchen"), None);
    }
}
