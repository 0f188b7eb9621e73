use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::domain::Role;
use crate::entities::{prelude::*, users};

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_blocked: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role.parse().unwrap_or(Role::User),
            is_active: model.is_active,
            is_blocked: model.is_blocked,
            last_login_at: model.last_login_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: String,
    pub role: Role,
}

pub struct UserRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> UserRepository<'a, C> {
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = Users::find_by_id(id)
            .one(self.db)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(self.db)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let count = Users::find()
            .filter(users::Column::Username.eq(username))
            .count(self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count = Users::find()
            .filter(users::Column::Email.eq(email))
            .count(self.db)
            .await?;
        Ok(count > 0)
    }

    /// Verify credentials. The identifier may be a username or an email.
    /// Returns the user when the password matches.
    ///
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_credentials(&self, identifier: &str, password: &str) -> Result<Option<User>> {
        let user = Users::find()
            .filter(
                Condition::any()
                    .add(users::Column::Username.eq(identifier))
                    .add(users::Column::Email.eq(identifier.to_lowercase())),
            )
            .one(self.db)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let is_valid = verify_password(&user.password_hash, password).await?;

        Ok(is_valid.then(|| User::from(user)))
    }

    /// Verify the password of a known user.
    pub async fn verify_password_for(&self, user_id: i32, password: &str) -> Result<bool> {
        let user = Users::find_by_id(user_id)
            .one(self.db)
            .await
            .context("Failed to query user for password verification")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {user_id}"))?;

        verify_password(&user.password_hash, password).await
    }

    pub async fn create(&self, new_user: NewUser<'_>) -> Result<User> {
        let now = Utc::now();

        let active = users::ActiveModel {
            username: Set(new_user.username.to_string()),
            email: Set(new_user.email.to_lowercase()),
            password_hash: Set(new_user.password_hash),
            role: Set(new_user.role.as_str().to_string()),
            is_active: Set(true),
            is_blocked: Set(false),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(self.db)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    /// Replace the stored password hash.
    pub async fn update_password_hash(&self, user_id: i32, password_hash: String) -> Result<()> {
        let user = Users::find_by_id(user_id)
            .one(self.db)
            .await
            .context("Failed to query user for password update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {user_id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(Utc::now());
        active.update(self.db).await?;

        Ok(())
    }

    pub async fn touch_last_login(&self, user_id: i32) -> Result<()> {
        Users::update_many()
            .col_expr(
                users::Column::LastLoginAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(users::Column::Id.eq(user_id))
            .exec(self.db)
            .await?;
        Ok(())
    }

    /// Applies `change` to the stored row. Returns false when the user does not exist.
    pub async fn update_flags(&self, user_id: i32, change: UserFlagChange) -> Result<bool> {
        let Some(user) = Users::find_by_id(user_id).one(self.db).await? else {
            return Ok(false);
        };

        let mut active: users::ActiveModel = user.into();
        match change {
            UserFlagChange::Active(value) => active.is_active = Set(value),
            UserFlagChange::Blocked(value) => active.is_blocked = Set(value),
            UserFlagChange::Role(role) => active.role = Set(role.as_str().to_string()),
        }
        active.updated_at = Set(Utc::now());
        active.update(self.db).await?;

        Ok(true)
    }

    pub async fn delete(&self, user_id: i32) -> Result<bool> {
        let result = Users::delete_by_id(user_id).exec(self.db).await?;
        Ok(result.rows_affected > 0)
    }

    /// Page through users ordered by id. `page` is 1-based.
    pub async fn list(
        &self,
        page: u64,
        page_size: u64,
        search: Option<&str>,
    ) -> Result<(Vec<User>, u64)> {
        let mut query = Users::find().order_by_asc(users::Column::Id);

        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(users::Column::Username.contains(term))
                    .add(users::Column::Email.contains(term)),
            );
        }

        let paginator = query.paginate(self.db, page_size);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items.into_iter().map(User::from).collect(), total))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum UserFlagChange {
    Active(bool),
    Blocked(bool),
    Role(Role),
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses default params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Hash off the async runtime.
pub async fn hash_password_blocking(password: &str, config: &SecurityConfig) -> Result<String> {
    let password = password.to_string();
    let config = config.clone();
    task::spawn_blocking(move || hash_password(&password, Some(&config)))
        .await
        .context("Password hashing task panicked")?
}

async fn verify_password(password_hash: &str, password: &str) -> Result<bool> {
    let password_hash = password_hash.to_string();
    let password = password.to_string();

    task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

        // Params are read from the PHC string, so hashes made with any config verify.
        Ok::<bool, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task panicked")?
}
