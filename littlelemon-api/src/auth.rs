//! Password hashing, bearer tokens and the authenticated caller context.

use argon2::password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::header,
    http::request::Parts,
};
use chrono::{TimeDelta, Utc};
use diesel::prelude::*;
use jsonwebtoken::{DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::User;
use crate::roles::{self, Role};
use crate::schema::users;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    exp: usize,
    iat: usize,
    sub: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct IssuedToken {
    pub token_type: String,
    pub access_token: String,
    /// Seconds until the token expires
    pub expires_in: i64,
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires: TimeDelta,
}

impl TokenIssuer {
    pub fn new(secret_key: &str, access_token_expires: TimeDelta) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret_key.as_ref()),
            decoding_key: DecodingKey::from_secret(secret_key.as_ref()),
            access_token_expires,
        }
    }

    pub fn issue(&self, user_id: i32) -> Result<IssuedToken, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            exp: (now + self.access_token_expires).timestamp() as usize,
            iat: now.timestamp() as usize,
            sub: user_id.to_string(),
        };
        let access_token =
            jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &self.encoding_key)
                .map_err(|e| ApiError::InternalError(format!("cannot issue token: {e}")))?;

        Ok(IssuedToken {
            token_type: "bearer".to_string(),
            access_token,
            expires_in: self.access_token_expires.num_seconds(),
        })
    }

    /// Returns the user id carried by a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Result<i32, ApiError> {
        let token = jsonwebtoken::decode::<Claims>(
            token,
            &self.decoding_key,
            &jsonwebtoken::Validation::default(),
        )
        .map_err(|_| ApiError::InvalidToken)?;

        token
            .claims
            .sub
            .parse()
            .map_err(|_| ApiError::InvalidToken)
    }
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::InternalError(format!("cannot hash password: {e}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|hash| {
            Argon2::default()
                .verify_password(password.as_bytes(), &hash)
                .is_ok()
        })
        .unwrap_or(false)
}

/// The authenticated user and their resolved role, passed explicitly into
/// every service operation.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
    pub role: Role,
}

impl Caller {
    pub fn load(conn: &mut PgConnection, user_id: i32) -> Result<Self, ApiError> {
        let user = users::table
            .select(User::as_select())
            .find(user_id)
            .first::<User>(conn)
            .optional()?
            .ok_or(ApiError::InvalidToken)?;
        let role = roles::load_role(conn, &user)?;
        Ok(Self { user, role })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::AuthenticationFailed)?
        .to_str()
        .map_err(|_| ApiError::InvalidToken)?;

    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .ok_or(ApiError::InvalidToken)
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = state.tokens.verify(bearer_token(parts)?)?;
        let conn = &mut state.db()?;
        Caller::load(conn, user_id)
    }
}

/// Requests without an `Authorization` header extract as `None`; a header
/// carrying a bad token is still rejected.
impl OptionalFromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(header::AUTHORIZATION) {
            return Ok(None);
        }
        <Caller as FromRequestParts<AppState>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}
