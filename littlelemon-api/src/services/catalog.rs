use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use diesel::{delete, insert_into, prelude::*, update};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::Caller;
use crate::error::{ApiError, FieldErrors, push_field};
use crate::models::{Category, MenuItem, NewCategory, NewMenuItem};
use crate::permissions::{Action, Resource, require, require_optional};
use crate::schema::{categories, menu_items, order_lines};
use crate::serializer::{CategoryView, MenuItemView};
use crate::services::UpdateMode;

const MAX_TITLE_LEN: usize = 255;
const DUPLICATE_TITLE: &str = "This category already has an item with that title.";
const REQUIRED: &str = "This field is required.";

/// Menu item fields as received; absent fields are `None`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MenuItemInput {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "decimal_from_text")]
    #[schema(value_type = Option<String>, example = "12.50")]
    pub price: Option<BigDecimal>,
    pub featured: Option<bool>,
    pub category_id: Option<i32>,
}

/// Reads a price from a JSON string or number. Numbers go through their
/// shortest decimal text, so `5.99` stays `5.99` instead of the nearest
/// binary float.
fn decimal_from_text<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    struct DecimalVisitor;

    impl<'de> Visitor<'de> for DecimalVisitor {
        type Value = Option<BigDecimal>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a decimal number or a numeric string")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2: Deserializer<'de>>(self, d: D2) -> Result<Self::Value, D2::Error> {
            d.deserialize_any(self)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(BigDecimal::from(v)))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(BigDecimal::from(v)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            self.visit_str(&v.to_string())
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            BigDecimal::from_str(v.trim())
                .map(Some)
                .map_err(|_| E::custom("A valid number is required."))
        }
    }

    deserializer.deserialize_option(DecimalVisitor)
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CategoryInput {
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MenuItemFilter {
    /// Case-insensitive title substring, an exact price, or `true`/`false`
    /// for featured items
    pub search: Option<String>,
    /// Category id
    pub category: Option<i32>,
    pub featured: Option<bool>,
    /// `price` or `-price`
    pub ordering: Option<String>,
}

impl MenuItemInput {
    /// Builds a complete row from the input. With `base` set, missing fields
    /// keep their current value (PATCH); without it they are required.
    pub fn into_new(self, base: Option<&MenuItem>) -> Result<NewMenuItem, ApiError> {
        let mut fields = FieldErrors::new();

        let title = match (self.title, base) {
            (Some(title), _) => Some(title.trim().to_string()),
            (None, Some(base)) => Some(base.title.clone()),
            (None, None) => {
                push_field(&mut fields, "title", REQUIRED);
                None
            }
        };
        if let Some(title) = &title {
            if title.is_empty() {
                push_field(&mut fields, "title", "This field may not be blank.");
            } else if title.chars().count() > MAX_TITLE_LEN {
                push_field(
                    &mut fields,
                    "title",
                    format!("Ensure this field has no more than {MAX_TITLE_LEN} characters."),
                );
            }
        }

        let price = match (self.price, base) {
            (Some(price), _) => Some(price),
            (None, Some(base)) => Some(base.price.clone()),
            (None, None) => {
                push_field(&mut fields, "price", REQUIRED);
                None
            }
        };
        if let Some(price) = &price {
            for message in price_problems(price) {
                push_field(&mut fields, "price", message);
            }
        }

        let category_id = match (self.category_id, base) {
            (Some(id), _) => Some(id),
            (None, Some(base)) => Some(base.category_id),
            (None, None) => {
                push_field(&mut fields, "category_id", REQUIRED);
                None
            }
        };

        ApiError::from_fields(fields)?;
        match (title, price, category_id) {
            (Some(title), Some(price), Some(category_id)) => Ok(NewMenuItem {
                title,
                price: price.with_scale(2),
                featured: self
                    .featured
                    .or(base.map(|b| b.featured))
                    .unwrap_or(false),
                category_id,
            }),
            _ => Err(ApiError::invalid(REQUIRED)),
        }
    }
}

fn price_problems(price: &BigDecimal) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if *price < BigDecimal::from(0) {
        problems.push("Ensure this value is greater than or equal to 0.");
    }
    if price.with_scale(2) != *price {
        problems.push("Ensure that there are no more than 2 decimal places.");
    }
    if *price >= BigDecimal::from(10_000) {
        problems.push("Ensure that there are no more than 6 digits in total.");
    }
    problems
}

impl CategoryInput {
    /// With `base` set a missing title keeps the current one (PATCH).
    pub fn into_new(self, base: Option<&Category>) -> Result<NewCategory, ApiError> {
        let title = match (self.title, base) {
            (Some(title), _) => title.trim().to_string(),
            (None, Some(base)) => base.title.clone(),
            (None, None) => return Err(ApiError::field("title", REQUIRED)),
        };
        if title.is_empty() {
            return Err(ApiError::field("title", "This field may not be blank."));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ApiError::field(
                "title",
                format!("Ensure this field has no more than {MAX_TITLE_LEN} characters."),
            ));
        }
        Ok(NewCategory { title })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PriceOrdering {
    Ascending,
    Descending,
}

impl FromStr for PriceOrdering {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(PriceOrdering::Ascending),
            "-price" => Ok(PriceOrdering::Descending),
            other => Err(ApiError::field(
                "ordering",
                format!("Unsupported ordering \"{other}\"; use price or -price."),
            )),
        }
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// A search term matches a title substring, an exact price, or the featured
/// flag when it reads as `true`/`false`.
#[derive(Debug, PartialEq)]
struct SearchTerms {
    title_pattern: String,
    price: Option<BigDecimal>,
    featured: Option<bool>,
}

impl SearchTerms {
    fn parse(raw: &str) -> Option<Self> {
        let term = raw.trim();
        if term.is_empty() {
            return None;
        }
        Some(Self {
            title_pattern: format!("%{}%", escape_like(term)),
            price: BigDecimal::from_str(term).ok(),
            featured: match term.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        })
    }
}

pub fn list_menu_items(
    conn: &mut PgConnection,
    caller: Option<&Caller>,
    filter: MenuItemFilter,
) -> Result<Vec<MenuItemView>, ApiError> {
    require_optional(caller, Action::Read, Resource::Catalog)?;

    let mut query = menu_items::table
        .inner_join(categories::table)
        .select((MenuItem::as_select(), Category::as_select()))
        .into_boxed();

    if let Some(terms) = filter.search.as_deref().and_then(SearchTerms::parse) {
        query = query.filter(
            menu_items::title
                .ilike(terms.title_pattern)
                .or(menu_items::price.nullable().eq(terms.price))
                .or(menu_items::featured.nullable().eq(terms.featured)),
        );
    }
    if let Some(category_id) = filter.category {
        query = query.filter(menu_items::category_id.eq(category_id));
    }
    if let Some(featured) = filter.featured {
        query = query.filter(menu_items::featured.eq(featured));
    }
    query = match filter.ordering.as_deref().map(PriceOrdering::from_str).transpose()? {
        Some(PriceOrdering::Ascending) => query.order((menu_items::price.asc(), menu_items::id.asc())),
        Some(PriceOrdering::Descending) => {
            query.order((menu_items::price.desc(), menu_items::id.asc()))
        }
        None => query.order(menu_items::id.asc()),
    };

    Ok(query
        .load::<(MenuItem, Category)>(conn)?
        .into_iter()
        .map(|(item, category)| MenuItemView::new(item, category))
        .collect())
}

fn find_menu_item(conn: &mut PgConnection, id: i32) -> Result<(MenuItem, Category), ApiError> {
    menu_items::table
        .inner_join(categories::table)
        .filter(menu_items::id.eq(id))
        .select((MenuItem::as_select(), Category::as_select()))
        .first(conn)
        .optional()?
        .ok_or_else(ApiError::not_found)
}

pub fn get_menu_item(
    conn: &mut PgConnection,
    caller: Option<&Caller>,
    id: i32,
) -> Result<MenuItemView, ApiError> {
    require_optional(caller, Action::Read, Resource::Catalog)?;
    let (item, category) = find_menu_item(conn, id)?;
    Ok(MenuItemView::new(item, category))
}

/// Checks that the category exists and that no other item in it carries the
/// same title.
fn check_menu_item_refs(
    conn: &mut PgConnection,
    item: &NewMenuItem,
    exclude_id: Option<i32>,
) -> Result<(), ApiError> {
    let category_exists: bool = diesel::select(diesel::dsl::exists(
        categories::table.filter(categories::id.eq(item.category_id)),
    ))
    .get_result(conn)?;
    if !category_exists {
        return Err(ApiError::field(
            "category_id",
            format!("Invalid pk \"{}\" - object does not exist.", item.category_id),
        ));
    }

    let mut duplicates = menu_items::table
        .filter(menu_items::title.eq(&item.title))
        .filter(menu_items::category_id.eq(item.category_id))
        .select(menu_items::id)
        .into_boxed();
    if let Some(id) = exclude_id {
        duplicates = duplicates.filter(menu_items::id.ne(id));
    }
    if duplicates.first::<i32>(conn).optional()?.is_some() {
        return Err(duplicate_title());
    }
    Ok(())
}

fn duplicate_title() -> ApiError {
    let mut fields = FieldErrors::new();
    push_field(&mut fields, "title", DUPLICATE_TITLE);
    push_field(&mut fields, "category_id", DUPLICATE_TITLE);
    ApiError::Validation {
        message: DUPLICATE_TITLE.to_string(),
        fields,
    }
}

/// Unique violations racing past the pre-check still surface as the
/// validation error callers expect.
fn map_duplicate(err: diesel::result::Error) -> ApiError {
    match err {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => duplicate_title(),
        other => other.into(),
    }
}

pub fn create_menu_item(
    conn: &mut PgConnection,
    caller: &Caller,
    input: MenuItemInput,
) -> Result<MenuItemView, ApiError> {
    require(caller, Action::Create, Resource::Catalog)?;
    let new_item = input.into_new(None)?;

    conn.transaction::<_, ApiError, _>(|conn| {
        check_menu_item_refs(conn, &new_item, None)?;
        let item = insert_into(menu_items::table)
            .values(&new_item)
            .returning(MenuItem::as_returning())
            .get_result(conn)
            .map_err(map_duplicate)?;
        let category = categories::table
            .find(item.category_id)
            .select(Category::as_select())
            .first(conn)?;
        tracing::info!(menu_item_id = item.id, "menu item created");
        Ok(MenuItemView::new(item, category))
    })
}

/// PUT replaces every field; PATCH keeps the ones not sent.
pub fn update_menu_item(
    conn: &mut PgConnection,
    caller: &Caller,
    id: i32,
    input: MenuItemInput,
    mode: UpdateMode,
) -> Result<MenuItemView, ApiError> {
    require(caller, mode.action(), Resource::Catalog)?;

    conn.transaction::<_, ApiError, _>(|conn| {
        let current = menu_items::table
            .find(id)
            .select(MenuItem::as_select())
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(ApiError::not_found)?;
        let changes = input.into_new((mode == UpdateMode::Partial).then_some(&current))?;
        check_menu_item_refs(conn, &changes, Some(id))?;

        let item = update(menu_items::table.find(id))
            .set(&changes)
            .returning(MenuItem::as_returning())
            .get_result(conn)
            .map_err(map_duplicate)?;
        let category = categories::table
            .find(item.category_id)
            .select(Category::as_select())
            .first(conn)?;
        Ok(MenuItemView::new(item, category))
    })
}

/// Cart lines holding the item go with it; items already ordered stay.
pub fn delete_menu_item(conn: &mut PgConnection, caller: &Caller, id: i32) -> Result<(), ApiError> {
    require(caller, Action::Delete, Resource::Catalog)?;

    conn.transaction::<_, ApiError, _>(|conn| {
        let ordered: bool = diesel::select(diesel::dsl::exists(
            order_lines::table.filter(order_lines::menu_item_id.eq(id)),
        ))
        .get_result(conn)?;
        if ordered {
            return Err(ApiError::Conflict(
                "This menu item appears in existing orders and cannot be deleted.".to_string(),
            ));
        }
        match delete(menu_items::table.find(id)).execute(conn)? {
            0 => Err(ApiError::not_found()),
            _ => {
                tracing::info!(menu_item_id = id, "menu item deleted");
                Ok(())
            }
        }
    })
}

pub fn list_categories(
    conn: &mut PgConnection,
    caller: Option<&Caller>,
) -> Result<Vec<CategoryView>, ApiError> {
    require_optional(caller, Action::Read, Resource::Catalog)?;
    Ok(categories::table
        .select(Category::as_select())
        .order(categories::id.asc())
        .load(conn)?
        .into_iter()
        .map(CategoryView::from)
        .collect())
}

pub fn get_category(
    conn: &mut PgConnection,
    caller: Option<&Caller>,
    id: i32,
) -> Result<CategoryView, ApiError> {
    require_optional(caller, Action::Read, Resource::Catalog)?;
    categories::table
        .find(id)
        .select(Category::as_select())
        .first(conn)
        .optional()?
        .map(CategoryView::from)
        .ok_or_else(ApiError::not_found)
}

fn duplicate_category(err: diesel::result::Error) -> ApiError {
    match err {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => ApiError::Conflict("A category with that title already exists.".to_string()),
        other => other.into(),
    }
}

pub fn create_category(
    conn: &mut PgConnection,
    caller: &Caller,
    input: CategoryInput,
) -> Result<CategoryView, ApiError> {
    require(caller, Action::Create, Resource::Catalog)?;
    let new_category = input.into_new(None)?;

    let category = insert_into(categories::table)
        .values(&new_category)
        .returning(Category::as_returning())
        .get_result(conn)
        .map_err(duplicate_category)?;
    Ok(category.into())
}

pub fn update_category(
    conn: &mut PgConnection,
    caller: &Caller,
    id: i32,
    input: CategoryInput,
    mode: UpdateMode,
) -> Result<CategoryView, ApiError> {
    require(caller, mode.action(), Resource::Catalog)?;

    conn.transaction::<_, ApiError, _>(|conn| {
        let current = categories::table
            .find(id)
            .select(Category::as_select())
            .for_update()
            .first(conn)
            .optional()?
            .ok_or_else(ApiError::not_found)?;
        let changes = input.into_new((mode == UpdateMode::Partial).then_some(&current))?;

        let category = update(categories::table.find(id))
            .set(&changes)
            .returning(Category::as_returning())
            .get_result(conn)
            .map_err(duplicate_category)?;
        Ok(category.into())
    })
}

pub fn delete_category(conn: &mut PgConnection, caller: &Caller, id: i32) -> Result<(), ApiError> {
    require(caller, Action::Delete, Resource::Catalog)?;

    conn.transaction::<_, ApiError, _>(|conn| {
        let in_use: bool = diesel::select(diesel::dsl::exists(
            menu_items::table.filter(menu_items::category_id.eq(id)),
        ))
        .get_result(conn)?;
        if in_use {
            return Err(ApiError::Conflict(
                "This category still has menu items.".to_string(),
            ));
        }
        match delete(categories::table.find(id)).execute(conn)? {
            0 => Err(ApiError::not_found()),
            _ => Ok(()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn field_names(err: ApiError) -> Vec<String> {
        match err {
            ApiError::Validation { fields, .. } => fields.into_keys().collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn existing() -> MenuItem {
        MenuItem {
            id: 1,
            title: "Bruschetta".into(),
            price: dec("7.50"),
            featured: true,
            category_id: 2,
        }
    }

    #[test]
    fn create_requires_title_price_and_category() {
        let err = MenuItemInput::default().into_new(None).unwrap_err();
        assert_eq!(field_names(err), vec!["category_id", "price", "title"]);
    }

    #[test]
    fn negative_prices_are_rejected() {
        let input = MenuItemInput {
            title: Some("Lemon Dessert".into()),
            price: Some(dec("-0.01")),
            featured: None,
            category_id: Some(1),
        };
        assert_eq!(field_names(input.into_new(None).unwrap_err()), vec!["price"]);
    }

    #[test]
    fn prices_keep_at_most_two_decimals() {
        let input = MenuItemInput {
            title: Some("Lemon Dessert".into()),
            price: Some(dec("4.999")),
            featured: None,
            category_id: Some(1),
        };
        assert!(input.into_new(None).is_err());

        let input = MenuItemInput {
            title: Some("Lemon Dessert".into()),
            price: Some(dec("4.5")),
            featured: None,
            category_id: Some(1),
        };
        let item = input.into_new(None).unwrap();
        assert_eq!(item.price.to_string(), "4.50");
        assert!(!item.featured);
    }

    #[test]
    fn json_number_prices_keep_their_decimal_value() {
        let input: MenuItemInput = serde_json::from_str(
            r#"{"title": "Greek Salad", "price": 5.99, "category_id": 1}"#,
        )
        .unwrap();
        assert_eq!(input.price, Some(dec("5.99")));
        assert_eq!(input.into_new(None).unwrap().price.to_string(), "5.99");

        let input: MenuItemInput =
            serde_json::from_str(r#"{"price": "12.5", "category_id": 1}"#).unwrap();
        assert_eq!(input.price, Some(dec("12.5")));

        let input: MenuItemInput = serde_json::from_str(r#"{"price": 8}"#).unwrap();
        assert_eq!(input.price, Some(dec("8")));

        let input: MenuItemInput = serde_json::from_str(r#"{"price": null}"#).unwrap();
        assert_eq!(input.price, None);

        assert!(serde_json::from_str::<MenuItemInput>(r#"{"price": "cheap"}"#).is_err());
    }

    #[test]
    fn zero_price_is_allowed() {
        assert!(price_problems(&dec("0")).is_empty());
        assert!(!price_problems(&dec("10000")).is_empty());
    }

    #[test]
    fn patch_keeps_fields_that_were_not_sent() {
        let input = MenuItemInput {
            price: Some(dec("8")),
            ..Default::default()
        };
        let item = input.into_new(Some(&existing())).unwrap();

        assert_eq!(item.title, "Bruschetta");
        assert_eq!(item.price, dec("8.00"));
        assert!(item.featured);
        assert_eq!(item.category_id, 2);
    }

    #[test]
    fn blank_titles_are_rejected() {
        let input = MenuItemInput {
            title: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(
            field_names(input.into_new(Some(&existing())).unwrap_err()),
            vec!["title"]
        );
        assert!(CategoryInput { title: Some(String::new()) }.into_new(None).is_err());
        assert!(CategoryInput { title: None }.into_new(None).is_err());
    }

    #[test]
    fn category_patch_without_title_keeps_it() {
        let current = Category {
            id: 2,
            title: "Starters".into(),
        };

        let changes = CategoryInput { title: None }.into_new(Some(&current)).unwrap();
        assert_eq!(changes.title, "Starters");

        let changes = CategoryInput {
            title: Some(" Mains ".into()),
        }
        .into_new(Some(&current))
        .unwrap();
        assert_eq!(changes.title, "Mains");
    }

    #[test]
    fn ordering_accepts_only_price() {
        assert_eq!(PriceOrdering::from_str("price").unwrap(), PriceOrdering::Ascending);
        assert_eq!(PriceOrdering::from_str("-price").unwrap(), PriceOrdering::Descending);
        assert!(PriceOrdering::from_str("title").is_err());
    }

    #[test]
    fn search_terms_cover_title_price_and_featured() {
        assert_eq!(SearchTerms::parse("   "), None);

        let terms = SearchTerms::parse(" 6.50 ").unwrap();
        assert_eq!(terms.title_pattern, "%6.50%");
        assert_eq!(terms.price, Some(dec("6.5")));
        assert_eq!(terms.featured, None);

        let terms = SearchTerms::parse("True").unwrap();
        assert_eq!(terms.price, None);
        assert_eq!(terms.featured, Some(true));

        let terms = SearchTerms::parse("salad").unwrap();
        assert_eq!((terms.price, terms.featured), (None, None));
    }

    #[test]
    fn search_terms_escape_like_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
