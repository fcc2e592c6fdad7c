//! JSON views of the stored entities.
//!
//! Which order view a caller gets depends on their role: customers never see
//! who placed the order or the crew id field staff use for assignment.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{CartLine, Category, MenuItem, Order, OrderLine, User};
use crate::roles::Role;

/// Normalises a money amount to two fractional digits.
pub fn money(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale(2)
}

/// Money columns are `NUMERIC(8, 2)`; amounts must stay below this.
const MONEY_LIMIT: i64 = 1_000_000;

pub fn fits_money_column(amount: &BigDecimal) -> bool {
    amount.abs() < BigDecimal::from(MONEY_LIMIT)
}

pub fn line_price(unit_price: &BigDecimal, quantity: i32) -> BigDecimal {
    money(&(unit_price.clone() * BigDecimal::from(quantity)))
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct CategoryView {
    pub id: i32,
    pub title: String,
}

impl From<Category> for CategoryView {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            title: category.title,
        }
    }
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct MenuItemView {
    pub id: i32,
    pub title: String,
    /// Decimal amount with two fractional digits
    #[schema(value_type = String, example = "12.50")]
    pub price: BigDecimal,
    pub featured: bool,
    pub category: CategoryView,
}

impl MenuItemView {
    pub fn new(item: MenuItem, category: Category) -> Self {
        Self {
            id: item.id,
            title: item.title,
            price: money(&item.price),
            featured: item.featured,
            category: category.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct CartLineView {
    pub menuitem: MenuItemView,
    pub quantity: i32,
    #[schema(value_type = String, example = "12.50")]
    pub unit_price: BigDecimal,
    #[schema(value_type = String, example = "25.00")]
    pub price: BigDecimal,
}

impl CartLineView {
    pub fn new(line: CartLine, item: MenuItem, category: Category) -> Self {
        Self {
            menuitem: MenuItemView::new(item, category),
            quantity: line.quantity,
            unit_price: money(&line.unit_price),
            price: money(&line.price),
        }
    }
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct OrderLineView {
    pub menuitem: MenuItemView,
    pub quantity: i32,
    #[schema(value_type = String, example = "12.50")]
    pub unit_price: BigDecimal,
    #[schema(value_type = String, example = "25.00")]
    pub price: BigDecimal,
}

impl OrderLineView {
    pub fn new(line: OrderLine, item: MenuItem, category: Category) -> Self {
        Self {
            price: line_price(&line.unit_price, line.quantity),
            unit_price: money(&line.unit_price),
            quantity: line.quantity,
            menuitem: MenuItemView::new(item, category),
        }
    }
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct CustomerOrderView {
    pub id: i32,
    pub delivery_crew: Option<i32>,
    pub status: bool,
    #[schema(value_type = String, example = "30.00")]
    pub total: BigDecimal,
    pub date: NaiveDate,
    pub items: Vec<OrderLineView>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct StaffOrderView {
    pub id: i32,
    pub user_id: i32,
    /// Username of the customer who placed the order
    pub user: String,
    pub delivery_crew_id: Option<i32>,
    pub status: bool,
    #[schema(value_type = String, example = "30.00")]
    pub total: BigDecimal,
    pub date: NaiveDate,
    pub items: Vec<OrderLineView>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
#[serde(untagged)]
pub enum OrderView {
    Staff(StaffOrderView),
    Customer(CustomerOrderView),
}

impl OrderView {
    pub fn for_role(
        role: Role,
        order: Order,
        customer_username: String,
        items: Vec<OrderLineView>,
    ) -> Self {
        if role.sees_staff_order_view() {
            OrderView::Staff(StaffOrderView {
                id: order.id,
                user_id: order.user_id,
                user: customer_username,
                delivery_crew_id: order.delivery_crew_id,
                status: order.status,
                total: money(&order.total),
                date: order.date,
                items,
            })
        } else {
            OrderView::Customer(CustomerOrderView {
                id: order.id,
                delivery_crew: order.delivery_crew_id,
                status: order.status,
                total: money(&order.total),
                date: order.date,
                items,
            })
        }
    }
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct UserView {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub groups: Vec<String>,
}

impl UserView {
    pub fn new(user: User, groups: Vec<String>) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            groups,
        }
    }
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct DetailView {
    pub detail: String,
}

impl DetailView {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct OrderPlacedView {
    pub detail: String,
    pub order_id: i32,
}
