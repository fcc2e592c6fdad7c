use diesel::{delete, insert_into, prelude::*};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::Caller;
use crate::error::{ApiError, FieldErrors, push_field};
use crate::models::{CartLine, Category, MenuItem, NewCartLine};
use crate::permissions::{Action, Resource, require};
use crate::schema::{cart_lines, categories, menu_items};
use crate::serializer::{CartLineView, fits_money_column, line_price, money};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CartLineInput {
    pub menuitem_id: Option<i32>,
    pub quantity: Option<i32>,
}

impl CartLineInput {
    fn validate(&self) -> Result<(i32, i32), ApiError> {
        let mut fields = FieldErrors::new();
        if self.menuitem_id.is_none() {
            push_field(&mut fields, "menuitem_id", "This field is required.");
        }
        match self.quantity {
            None => push_field(&mut fields, "quantity", "This field is required."),
            Some(q) if q < 1 => push_field(
                &mut fields,
                "quantity",
                "Ensure this value is greater than or equal to 1.",
            ),
            Some(_) => {}
        }
        ApiError::from_fields(fields)?;
        match (self.menuitem_id, self.quantity) {
            (Some(menuitem_id), Some(quantity)) => Ok((menuitem_id, quantity)),
            _ => Err(ApiError::invalid("This field is required.")),
        }
    }
}

/// Builds the cart row, freezing the item's current price.
pub fn new_cart_line(user_id: i32, item: &MenuItem, quantity: i32) -> Result<NewCartLine, ApiError> {
    let price = line_price(&item.price, quantity);
    if !fits_money_column(&price) {
        return Err(ApiError::field(
            "quantity",
            "Ensure the line price (unit price times quantity) stays below 1000000.",
        ));
    }
    Ok(NewCartLine {
        user_id,
        menu_item_id: item.id,
        quantity,
        unit_price: money(&item.price),
        price,
    })
}

pub fn list(conn: &mut PgConnection, caller: &Caller) -> Result<Vec<CartLineView>, ApiError> {
    require(caller, Action::Read, Resource::Cart)?;

    Ok(cart_lines::table
        .inner_join(menu_items::table.inner_join(categories::table))
        .filter(cart_lines::user_id.eq(caller.user.id))
        .select((
            CartLine::as_select(),
            MenuItem::as_select(),
            Category::as_select(),
        ))
        .order(cart_lines::id.asc())
        .load::<(CartLine, MenuItem, Category)>(conn)?
        .into_iter()
        .map(|(line, item, category)| CartLineView::new(line, item, category))
        .collect())
}

pub fn add_item(
    conn: &mut PgConnection,
    caller: &Caller,
    input: CartLineInput,
) -> Result<CartLineView, ApiError> {
    require(caller, Action::Create, Resource::Cart)?;
    let (menuitem_id, quantity) = input.validate()?;

    conn.transaction::<_, ApiError, _>(|conn| {
        let (item, category) = menu_items::table
            .inner_join(categories::table)
            .filter(menu_items::id.eq(menuitem_id))
            .select((MenuItem::as_select(), Category::as_select()))
            .first::<(MenuItem, Category)>(conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("Menu item not found.".to_string()))?;

        let new_line = new_cart_line(caller.user.id, &item, quantity)?;
        let line = insert_into(cart_lines::table)
            .values(&new_line)
            .returning(CartLine::as_returning())
            .get_result(conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => ApiError::Conflict("This menu item is already in your cart".to_string()),
                other => other.into(),
            })?;

        tracing::debug!(user_id = caller.user.id, menu_item_id = item.id, "cart line added");
        Ok(CartLineView::new(line, item, category))
    })
}

/// Empties the caller's cart. Clearing an empty cart succeeds.
pub fn clear(conn: &mut PgConnection, caller: &Caller) -> Result<usize, ApiError> {
    require(caller, Action::Delete, Resource::Cart)?;
    Ok(delete(cart_lines::table.filter(cart_lines::user_id.eq(caller.user.id))).execute(conn)?)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;

    use super::*;

    fn item(price: &str) -> MenuItem {
        MenuItem {
            id: 5,
            title: "Grilled Fish".into(),
            price: BigDecimal::from_str(price).unwrap(),
            featured: false,
            category_id: 1,
        }
    }

    #[test]
    fn cart_line_snapshots_price_and_total() {
        let line = new_cart_line(3, &item("12.5"), 2).unwrap();

        assert_eq!(line.user_id, 3);
        assert_eq!(line.menu_item_id, 5);
        assert_eq!(line.unit_price.to_string(), "12.50");
        assert_eq!(line.price.to_string(), "25.00");
    }

    #[test]
    fn line_price_must_fit_the_money_column() {
        match new_cart_line(3, &item("9999.99"), 101) {
            Err(ApiError::Validation { fields, .. }) => assert!(fields.contains_key("quantity")),
            other => panic!("unexpected {other:?}"),
        }
        let line = new_cart_line(3, &item("9999.99"), 100).unwrap();
        assert_eq!(line.price.to_string(), "999999.00");
    }

    #[test]
    fn quantity_must_be_positive() {
        let input = CartLineInput {
            menuitem_id: Some(5),
            quantity: Some(0),
        };
        match input.validate() {
            Err(ApiError::Validation { fields, .. }) => assert!(fields.contains_key("quantity")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_fields_are_named() {
        match CartLineInput::default().validate() {
            Err(ApiError::Validation { fields, .. }) => {
                assert!(fields.contains_key("menuitem_id"));
                assert!(fields.contains_key("quantity"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            CartLineInput {
                menuitem_id: Some(5),
                quantity: Some(3)
            }
            .validate()
            .unwrap(),
            (5, 3)
        );
    }
}
