use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use crate::schema::{
    cart_lines, categories, groups, menu_items, order_lines, orders, user_groups, users,
};

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = groups)]
pub struct Group {
    pub id: i32,
    pub name: String,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Debug, PartialEq)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Group))]
#[diesel(table_name = user_groups, primary_key(user_id, group_id))]
pub struct UserGroup {
    pub user_id: i32,
    pub group_id: i32,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = categories)]
pub struct Category {
    pub id: i32,
    pub title: String,
}

#[derive(Insertable, AsChangeset, Debug)]
#[diesel(table_name = categories)]
pub struct NewCategory {
    pub title: String,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone, PartialEq)]
#[diesel(belongs_to(Category))]
#[diesel(table_name = menu_items)]
pub struct MenuItem {
    pub id: i32,
    pub title: String,
    pub price: BigDecimal,
    pub featured: bool,
    pub category_id: i32,
}

/// Fully validated menu item fields, used for both inserts and updates.
#[derive(Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = menu_items)]
pub struct NewMenuItem {
    pub title: String,
    pub price: BigDecimal,
    pub featured: bool,
    pub category_id: i32,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone, PartialEq)]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(MenuItem))]
#[diesel(table_name = cart_lines)]
pub struct CartLine {
    pub id: i32,
    pub user_id: i32,
    pub menu_item_id: i32,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub price: BigDecimal,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = cart_lines)]
pub struct NewCartLine {
    pub user_id: i32,
    pub menu_item_id: i32,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub price: BigDecimal,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone, PartialEq)]
#[diesel(belongs_to(User))]
#[diesel(table_name = orders)]
pub struct Order {
    pub id: i32,
    pub user_id: i32,
    pub delivery_crew_id: Option<i32>,
    pub status: bool,
    pub total: BigDecimal,
    pub date: NaiveDate,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = orders)]
pub struct NewOrder {
    pub user_id: i32,
    pub delivery_crew_id: Option<i32>,
    pub status: bool,
    pub total: BigDecimal,
    pub date: NaiveDate,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug, Clone, PartialEq)]
#[diesel(belongs_to(Order))]
#[diesel(belongs_to(MenuItem))]
#[diesel(table_name = order_lines)]
pub struct OrderLine {
    pub id: i32,
    pub order_id: i32,
    pub menu_item_id: i32,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = order_lines)]
pub struct NewOrderLine {
    pub order_id: i32,
    pub menu_item_id: i32,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}
