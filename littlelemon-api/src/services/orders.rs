//! Order placement and management.
//!
//! An order is only ever created from the caller's cart. Header, lines and
//! cart removal happen in one transaction that starts by locking the
//! customer's row, so concurrent checkouts by the same customer serialise
//! and a failure leaves neither a partial order nor a half-cleared cart.

use std::collections::{BTreeMap, HashMap};

use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::{delete, insert_into, prelude::*, update};
use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::models::{CartLine, Category, MenuItem, NewOrder, NewOrderLine, Order, OrderLine, User};
use crate::permissions::{Action, Resource, require};
use crate::roles::{self, OrderScope, Role, RoleGroup};
use crate::schema::{cart_lines, categories, menu_items, order_lines, orders, users};
use crate::serializer::{OrderLineView, OrderView, fits_money_column, money};
use crate::services::UpdateMode;

/// Lines and total computed from a cart snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutPlan {
    pub total: BigDecimal,
    pub lines: Vec<PlannedLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLine {
    pub menu_item_id: i32,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

impl PlannedLine {
    fn for_order(&self, order_id: i32) -> NewOrderLine {
        NewOrderLine {
            order_id,
            menu_item_id: self.menu_item_id,
            quantity: self.quantity,
            unit_price: self.unit_price.clone(),
        }
    }
}

pub fn plan_checkout(cart: &[CartLine]) -> Result<CheckoutPlan, ApiError> {
    if cart.is_empty() {
        return Err(ApiError::invalid("No items in cart to order"));
    }
    let lines: Vec<PlannedLine> = cart
        .iter()
        .map(|line| PlannedLine {
            menu_item_id: line.menu_item_id,
            quantity: line.quantity,
            unit_price: line.unit_price.clone(),
        })
        .collect();
    let total = lines
        .iter()
        .map(|l| l.unit_price.clone() * BigDecimal::from(l.quantity))
        .sum::<BigDecimal>();
    if !fits_money_column(&total) {
        return Err(ApiError::invalid(
            "Order total must stay below 1000000; split the cart into smaller orders",
        ));
    }

    Ok(CheckoutPlan {
        total: money(&total),
        lines,
    })
}

pub fn place_order(conn: &mut PgConnection, caller: &Caller) -> Result<Order, ApiError> {
    require(caller, Action::Create, Resource::Orders)?;
    let customer_id = caller.user.id;

    conn.transaction::<_, ApiError, _>(|conn| {
        users::table
            .find(customer_id)
            .select(users::id)
            .for_update()
            .first::<i32>(conn)?;

        let cart = cart_lines::table
            .filter(cart_lines::user_id.eq(customer_id))
            .select(CartLine::as_select())
            .order(cart_lines::id.asc())
            .load::<CartLine>(conn)?;
        let plan = plan_checkout(&cart)?;

        let order = insert_into(orders::table)
            .values(&NewOrder {
                user_id: customer_id,
                delivery_crew_id: None,
                status: false,
                total: plan.total.clone(),
                date: Utc::now().date_naive(),
            })
            .returning(Order::as_returning())
            .get_result(conn)?;

        let lines: Vec<NewOrderLine> = plan.lines.iter().map(|l| l.for_order(order.id)).collect();
        insert_into(order_lines::table)
            .values(&lines)
            .execute(conn)?;

        delete(cart_lines::table.filter(cart_lines::user_id.eq(customer_id))).execute(conn)?;

        tracing::info!(
            order_id = order.id,
            user_id = customer_id,
            lines = lines.len(),
            total = %order.total,
            "order placed"
        );
        Ok(order)
    })
}

/// `Some(None)` clears the assignment; `None` leaves it untouched.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderUpdate {
    pub status: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub delivery_crew_id: Option<Option<i32>>,
}

/// Orders only move from pending to delivered.
pub fn next_status(current: bool, requested: bool) -> Result<bool, ApiError> {
    if current && !requested {
        Err(ApiError::Conflict(
            "A delivered order cannot be marked as pending again.".to_string(),
        ))
    } else {
        Ok(requested)
    }
}

/// Resolves the requested changes against the caller's role and the stored
/// order, returning the new (status, delivery_crew_id) pair. PUT requires
/// `status` and treats an absent crew id as unassigned.
fn resolve_changes(
    role: Role,
    order: &Order,
    changes: &OrderUpdate,
    mode: UpdateMode,
) -> Result<(bool, Option<i32>), ApiError> {
    if role == Role::DeliveryCrew && changes.delivery_crew_id.is_some() {
        return Err(ApiError::Forbidden(
            "Delivery crew may only update the order status.".to_string(),
        ));
    }

    let status = match (mode, changes.status) {
        (_, Some(requested)) => next_status(order.status, requested)?,
        (UpdateMode::Partial, None) => order.status,
        (UpdateMode::Replace, None) => {
            return Err(ApiError::field("status", "This field is required."));
        }
    };
    let delivery_crew_id = match (mode, changes.delivery_crew_id) {
        (_, Some(requested)) => requested,
        (UpdateMode::Partial, None) => order.delivery_crew_id,
        (UpdateMode::Replace, None) => None,
    };
    Ok((status, delivery_crew_id))
}

fn in_scope(scope: OrderScope, order: &Order) -> bool {
    match scope {
        OrderScope::All => true,
        OrderScope::AssignedTo(crew_id) => order.delivery_crew_id == Some(crew_id),
        OrderScope::PlacedBy(user_id) => order.user_id == user_id,
    }
}

/// Orders outside the caller's scope are reported as missing.
fn scoped_order(
    conn: &mut PgConnection,
    scope: OrderScope,
    id: i32,
    lock: bool,
) -> Result<Order, ApiError> {
    let query = orders::table.find(id).select(Order::as_select());
    let order = if lock {
        query.for_update().first::<Order>(conn).optional()?
    } else {
        query.first::<Order>(conn).optional()?
    };
    order
        .filter(|order| in_scope(scope, order))
        .ok_or_else(|| ApiError::NotFound("Order not found.".to_string()))
}

/// Loads lines and customer names for a batch of orders and shapes them for
/// the caller's role.
fn render(
    conn: &mut PgConnection,
    role: Role,
    orders: Vec<Order>,
) -> Result<Vec<OrderView>, ApiError> {
    let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let customer_ids: Vec<i32> = orders.iter().map(|o| o.user_id).collect();

    let mut lines_by_order: BTreeMap<i32, Vec<OrderLineView>> = BTreeMap::new();
    for (line, item, category) in order_lines::table
        .inner_join(menu_items::table.inner_join(categories::table))
        .filter(order_lines::order_id.eq_any(order_ids))
        .select((
            OrderLine::as_select(),
            MenuItem::as_select(),
            Category::as_select(),
        ))
        .order(order_lines::id.asc())
        .load::<(OrderLine, MenuItem, Category)>(conn)?
    {
        lines_by_order
            .entry(line.order_id)
            .or_default()
            .push(OrderLineView::new(line, item, category));
    }

    let usernames: HashMap<i32, String> = users::table
        .filter(users::id.eq_any(customer_ids))
        .select((users::id, users::username))
        .load::<(i32, String)>(conn)?
        .into_iter()
        .collect();

    Ok(orders
        .into_iter()
        .map(|order| {
            let items = lines_by_order.remove(&order.id).unwrap_or_default();
            let username = usernames.get(&order.user_id).cloned().unwrap_or_default();
            OrderView::for_role(role, order, username, items)
        })
        .collect())
}

fn render_one(conn: &mut PgConnection, role: Role, order: Order) -> Result<OrderView, ApiError> {
    render(conn, role, vec![order])?
        .pop()
        .ok_or_else(|| ApiError::InternalError("order vanished while rendering".to_string()))
}

pub fn list_orders(conn: &mut PgConnection, caller: &Caller) -> Result<Vec<OrderView>, ApiError> {
    require(caller, Action::Read, Resource::Orders)?;

    let mut query = orders::table.select(Order::as_select()).into_boxed();
    query = match caller.role.order_scope(caller.user.id) {
        OrderScope::All => query,
        OrderScope::AssignedTo(crew_id) => query.filter(orders::delivery_crew_id.eq(crew_id)),
        OrderScope::PlacedBy(user_id) => query.filter(orders::user_id.eq(user_id)),
    };
    let orders = query.order(orders::id.asc()).load::<Order>(conn)?;
    render(conn, caller.role, orders)
}

pub fn get_order(conn: &mut PgConnection, caller: &Caller, id: i32) -> Result<OrderView, ApiError> {
    require(caller, Action::Read, Resource::Orders)?;
    let order = scoped_order(conn, caller.role.order_scope(caller.user.id), id, false)?;
    render_one(conn, caller.role, order)
}

/// The target of an assignment must exist and belong to the Delivery Crew
/// group, whatever the client sent.
fn check_delivery_crew(conn: &mut PgConnection, crew_id: i32) -> Result<(), ApiError> {
    let user = users::table
        .find(crew_id)
        .select(User::as_select())
        .first(conn)
        .optional()?;
    match user {
        None => Err(ApiError::field(
            "delivery_crew_id",
            format!("Invalid pk \"{crew_id}\" - object does not exist."),
        )),
        Some(user) if !roles::is_member(conn, user.id, RoleGroup::DeliveryCrew)? => {
            Err(ApiError::field(
                "delivery_crew_id",
                "Selected user is not in the Delivery Crew group.",
            ))
        }
        Some(_) => Ok(()),
    }
}

pub fn update_order(
    conn: &mut PgConnection,
    caller: &Caller,
    id: i32,
    changes: OrderUpdate,
    mode: UpdateMode,
) -> Result<OrderView, ApiError> {
    require(caller, mode.action(), Resource::Orders)?;
    let scope = caller.role.order_scope(caller.user.id);

    let order = conn.transaction::<_, ApiError, _>(|conn| {
        let current = scoped_order(conn, scope, id, true)?;
        let (status, delivery_crew_id) = resolve_changes(caller.role, &current, &changes, mode)?;
        if let Some(crew_id) = delivery_crew_id {
            if current.delivery_crew_id != Some(crew_id) {
                check_delivery_crew(conn, crew_id)?;
            }
        }

        let order = update(orders::table.find(id))
            .set((
                orders::status.eq(status),
                orders::delivery_crew_id.eq(delivery_crew_id),
            ))
            .returning(Order::as_returning())
            .get_result::<Order>(conn)?;
        tracing::info!(
            order_id = order.id,
            status = order.status,
            delivery_crew_id = ?order.delivery_crew_id,
            by = caller.user.id,
            "order updated"
        );
        Ok(order)
    })?;

    render_one(conn, caller.role, order)
}

pub fn delete_order(conn: &mut PgConnection, caller: &Caller, id: i32) -> Result<(), ApiError> {
    require(caller, Action::Delete, Resource::Orders)?;
    match delete(orders::table.find(id)).execute(conn)? {
        0 => Err(ApiError::NotFound("Order not found.".to_string())),
        _ => {
            tracing::info!(order_id = id, by = caller.user.id, "order deleted");
            Ok(())
        }
    }
}
