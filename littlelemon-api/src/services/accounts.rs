//! User registration, token issuance and profiles.

use std::collections::HashMap;

use chrono::Utc;
use diesel::{insert_into, prelude::*};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::{Caller, IssuedToken, TokenIssuer, hash_password, verify_password};
use crate::error::{ApiError, FieldErrors, push_field};
use crate::models::{NewUser, User};
use crate::schema::{groups, user_groups, users};
use crate::serializer::UserView;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 150;

pub fn user_view(conn: &mut PgConnection, user: User) -> QueryResult<UserView> {
    let groups = crate::roles::group_names(conn, user.id)?;
    Ok(UserView::new(user, groups))
}

/// Like [`user_view`] but loads group names for the whole batch at once.
pub fn user_views(conn: &mut PgConnection, users: Vec<User>) -> QueryResult<Vec<UserView>> {
    let ids: Vec<i32> = users.iter().map(|u| u.id).collect();
    let mut groups_by_user: HashMap<i32, Vec<String>> = HashMap::new();
    for (user_id, name) in user_groups::table
        .inner_join(groups::table)
        .filter(user_groups::user_id.eq_any(ids))
        .select((user_groups::user_id, groups::name))
        .order(groups::name.asc())
        .load::<(i32, String)>(conn)?
    {
        groups_by_user.entry(user_id).or_default().push(name);
    }

    Ok(users
        .into_iter()
        .map(|user| {
            let groups = groups_by_user.remove(&user.id).unwrap_or_default();
            UserView::new(user, groups)
        })
        .collect())
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RegisterInput {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

fn username_problem(username: &str) -> Option<&'static str> {
    if username.is_empty() {
        Some("This field may not be blank.")
    } else if username.chars().count() > MAX_USERNAME_LEN {
        Some("Ensure this field has no more than 150 characters.")
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        Some("Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.")
    } else {
        None
    }
}

fn password_problem(password: &str) -> Option<&'static str> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        Some("This password is too short. It must contain at least 8 characters.")
    } else {
        None
    }
}

impl RegisterInput {
    fn validate(&self) -> Result<(&str, &str), ApiError> {
        let mut fields = FieldErrors::new();
        match self.username.as_deref().map(str::trim) {
            None => push_field(&mut fields, "username", "This field is required."),
            Some(username) => {
                if let Some(problem) = username_problem(username) {
                    push_field(&mut fields, "username", problem);
                }
            }
        }
        match self.password.as_deref() {
            None => push_field(&mut fields, "password", "This field is required."),
            Some(password) => {
                if let Some(problem) = password_problem(password) {
                    push_field(&mut fields, "password", problem);
                }
            }
        }
        ApiError::from_fields(fields)?;

        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) => Ok((username.trim(), password)),
            _ => Err(ApiError::invalid("This field is required.")),
        }
    }
}

fn username_taken() -> ApiError {
    ApiError::Conflict("A user with that username already exists.".to_string())
}

fn insert_user(conn: &mut PgConnection, new_user: &NewUser<'_>) -> Result<User, ApiError> {
    let taken: bool = diesel::select(diesel::dsl::exists(
        users::table.filter(users::username.eq(new_user.username)),
    ))
    .get_result(conn)?;
    if taken {
        return Err(username_taken());
    }

    insert_into(users::table)
        .values(new_user)
        .returning(User::as_returning())
        .get_result(conn)
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => username_taken(),
            other => other.into(),
        })
}

/// Creates a customer account. No caller is required.
pub fn register(conn: &mut PgConnection, input: RegisterInput) -> Result<UserView, ApiError> {
    let (username, password) = input.validate()?;
    let password_hash = hash_password(password)?;

    let user = insert_user(
        conn,
        &NewUser {
            username,
            email: input.email.as_deref().unwrap_or_default(),
            first_name: input.first_name.as_deref().unwrap_or_default(),
            last_name: input.last_name.as_deref().unwrap_or_default(),
            password_hash: &password_hash,
            is_superuser: false,
            date_joined: Utc::now(),
        },
    )?;
    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    Ok(UserView::new(user, Vec::new()))
}

/// OAuth2 password-grant form.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: Option<String>,
    pub username: String,
    pub password: String,
}

pub fn authenticate(
    conn: &mut PgConnection,
    tokens: &TokenIssuer,
    request: TokenRequest,
) -> Result<IssuedToken, ApiError> {
    if request.grant_type.as_deref().is_some_and(|g| g != "password") {
        return Err(ApiError::InvalidCredentials);
    }

    let user = users::table
        .filter(users::username.eq(&request.username))
        .select(User::as_select())
        .first::<User>(conn)
        .optional()?
        .filter(|user| verify_password(&request.password, &user.password_hash))
        .ok_or_else(|| {
            tracing::debug!(username = %request.username, "rejected credentials");
            ApiError::InvalidCredentials
        })?;

    tokens.issue(user.id)
}

pub fn profile(conn: &mut PgConnection, caller: &Caller) -> Result<UserView, ApiError> {
    Ok(user_view(conn, caller.user.clone())?)
}

/// Bootstraps an administrator account from the command line.
pub fn create_superuser(
    conn: &mut PgConnection,
    username: &str,
    password: &str,
    email: &str,
) -> Result<User, ApiError> {
    let mut fields = FieldErrors::new();
    if let Some(problem) = username_problem(username) {
        push_field(&mut fields, "username", problem);
    }
    if let Some(problem) = password_problem(password) {
        push_field(&mut fields, "password", problem);
    }
    ApiError::from_fields(fields)?;

    let password_hash = hash_password(password)?;
    let user = insert_user(
        conn,
        &NewUser {
            username,
            email,
            first_name: "",
            last_name: "",
            password_hash: &password_hash,
            is_superuser: true,
            date_joined: Utc::now(),
        },
    )?;
    tracing::info!(user_id = user.id, username = %user.username, "superuser created");
    Ok(user)
}
