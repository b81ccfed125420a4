//! User accounts - signup, login, listing and startup provisioning.

use crate::{
    auth::{password::CredentialHasher, token::TokenService},
    config::settings::SeedUser,
    core::scope::Scope,
    entities::{Role, User, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

/// Signup request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Signup {
    /// Display name
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Login email
    #[validate(email)]
    pub email: String,
    /// Plain-text password, hashed before storage
    #[validate(length(min = 8))]
    pub password: String,
    /// Requested role; accountant when absent
    #[serde(default)]
    pub role: Option<Role>,
}

/// A successful signup or login: a token and the user it was issued for.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Bearer token
    pub token: String,
    /// The authenticated user; the hash is never serialized
    pub user: user::Model,
}

async fn find_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn insert_user(
    db: &DatabaseConnection,
    hasher: &dyn CredentialHasher,
    input: Signup,
) -> Result<user::Model> {
    input.validate()?;
    let email = input.email.trim().to_lowercase();
    if find_by_email(db, &email).await?.is_some() {
        return Err(Error::Conflict {
            message: "User already exists".to_string(),
        });
    }

    let password_hash = hasher.hash(&input.password)?;
    let user = user::ActiveModel {
        name: Set(input.name.trim().to_string()),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(input.role.unwrap_or(Role::Accountant)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(user_id = user.id, role = ?user.role, "User registered");
    Ok(user)
}

/// Registers a user and signs them in.
///
/// # Errors
/// [`Error::Validation`] for a malformed name, email or password,
/// [`Error::Conflict`] when the email is already registered.
pub async fn signup(
    db: &DatabaseConnection,
    hasher: &dyn CredentialHasher,
    tokens: &TokenService,
    input: Signup,
) -> Result<Session> {
    let user = insert_user(db, hasher, input).await?;
    let token = tokens.issue(&user)?;
    Ok(Session { token, user })
}

/// Signs a user in.
///
/// # Errors
/// [`Error::InvalidCredentials`] for an unknown email or a wrong password; the two are
/// indistinguishable to the caller.
pub async fn login(
    db: &DatabaseConnection,
    hasher: &dyn CredentialHasher,
    tokens: &TokenService,
    email: &str,
    password: &str,
) -> Result<Session> {
    let email = email.trim().to_lowercase();
    let Some(user) = find_by_email(db, &email).await? else {
        warn!("Login attempt for unknown email");
        return Err(Error::InvalidCredentials);
    };

    if !hasher.verify(password, &user.password_hash)? {
        warn!(user_id = user.id, "Login attempt with wrong password");
        return Err(Error::InvalidCredentials);
    }

    let token = tokens.issue(&user)?;
    info!(user_id = user.id, "User logged in");
    Ok(Session { token, user })
}

/// Every registered user. Admin only.
pub async fn list_users(db: &DatabaseConnection, scope: &Scope) -> Result<Vec<user::Model>> {
    scope.ensure_admin()?;
    User::find()
        .order_by_asc(user::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates each configured user whose email is not registered yet.
///
/// Returns how many were created.
pub async fn seed_users(
    db: &DatabaseConnection,
    hasher: &dyn CredentialHasher,
    seeds: &[SeedUser],
) -> Result<usize> {
    let mut created = 0;
    for seed in seeds {
        if find_by_email(db, &seed.email.trim().to_lowercase())
            .await?
            .is_some()
        {
            continue;
        }
        insert_user(
            db,
            hasher,
            Signup {
                name: seed.name.clone(),
                email: seed.email.clone(),
                password: seed.password.clone(),
                role: Some(seed.role),
            },
        )
        .await?;
        created += 1;
    }
    Ok(created)
}
