//! Manager and Delivery Crew group membership.

use diesel::{delete, insert_into, prelude::*};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::models::{User, UserGroup};
use crate::permissions::{Action, Resource, require};
use crate::roles::{self, RoleGroup};
use crate::schema::{groups, user_groups, users};
use crate::serializer::{DetailView, UserView};
use crate::services::accounts::{user_view, user_views};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MembershipInput {
    pub user_id: Option<i32>,
}

/// Locks the target user so concurrent membership changes serialise.
fn lock_user(conn: &mut PgConnection, user_id: i32) -> Result<User, ApiError> {
    users::table
        .find(user_id)
        .select(User::as_select())
        .for_update()
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))
}

pub fn members(
    conn: &mut PgConnection,
    caller: &Caller,
    group: RoleGroup,
) -> Result<Vec<UserView>, ApiError> {
    require(caller, Action::Read, Resource::StaffMembership)?;

    let members = user_groups::table
        .inner_join(groups::table)
        .inner_join(users::table)
        .filter(groups::name.eq(group.name()))
        .select(User::as_select())
        .order(users::id.asc())
        .load::<User>(conn)?;
    Ok(user_views(conn, members)?)
}

pub fn promote(
    conn: &mut PgConnection,
    caller: &Caller,
    group: RoleGroup,
    input: MembershipInput,
) -> Result<UserView, ApiError> {
    require(caller, Action::Create, Resource::StaffMembership)?;
    let user_id = input
        .user_id
        .ok_or_else(|| ApiError::field("user_id", "No user_id field provided in body"))?;

    conn.transaction::<_, ApiError, _>(|conn| {
        let user = lock_user(conn, user_id)?;
        if roles::is_member(conn, user.id, group)? {
            return Err(ApiError::Conflict(format!(
                "User {} is already in the {} group.",
                user.username,
                group.name()
            )));
        }

        insert_into(user_groups::table)
            .values(&UserGroup {
                user_id: user.id,
                group_id: roles::group_id(conn, group)?,
            })
            .execute(conn)?;

        tracing::info!(user_id = user.id, group = group.name(), by = caller.user.id, "user promoted");
        Ok(user_view(conn, user)?)
    })
}

pub fn demote(
    conn: &mut PgConnection,
    caller: &Caller,
    group: RoleGroup,
    user_id: i32,
) -> Result<DetailView, ApiError> {
    require(caller, Action::Delete, Resource::StaffMembership)?;

    conn.transaction::<_, ApiError, _>(|conn| {
        let user = lock_user(conn, user_id)?;
        let group_id = roles::group_id(conn, group)?;

        let removed = delete(
            user_groups::table
                .filter(user_groups::user_id.eq(user.id))
                .filter(user_groups::group_id.eq(group_id)),
        )
        .execute(conn)?;
        if removed == 0 {
            return Err(ApiError::Conflict(format!(
                "User {} is not in the {} group.",
                user.username,
                group.name()
            )));
        }

        tracing::info!(user_id = user.id, group = group.name(), by = caller.user.id, "user demoted");
        Ok(DetailView::new(format!(
            "User {} removed from {} group.",
            user.username,
            group.name()
        )))
    })
}
