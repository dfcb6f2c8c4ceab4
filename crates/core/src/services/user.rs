//! User service.

use std::collections::HashMap;
use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use gifted_common::{AppError, AppResult, IdGenerator};
use gifted_db::{
    entities::user,
    repositories::{FollowRepository, UserRepository},
};
use regex::Regex;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

static USERNAME_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9@.+_-]+$"));

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    follow_repo: FollowRepository,
    id_gen: IdGenerator,
}

/// Input for creating a new account.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 150))]
    pub username: String,

    #[validate(length(min = 1, max = 150))]
    pub first_name: String,

    #[validate(length(min = 1, max = 150))]
    pub last_name: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Partial update of the current user.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 150))]
    pub username: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 150))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 150))]
    pub last_name: Option<String>,

    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,

    #[validate(length(max = 500))]
    pub bio: Option<String>,
}

/// Public view of a user, embedded in posts, comments and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfileView {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub is_phone_verified: bool,
    pub followers_count: u64,
    pub following_count: u64,
    /// Whether the viewer follows this user.
    pub is_following: bool,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository, follow_repo: FollowRepository) -> Self {
        Self {
            user_repo,
            follow_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a new account. The returned user already carries a token.
    pub async fn register(&self, input: RegisterInput) -> AppResult<user::Model> {
        input.validate()?;
        validate_username(&input.username)?;

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let password_hash = hash_password(&input.password)?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username.clone()),
            username_lower: Set(input.username.to_lowercase()),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            email: Set(String::new()),
            password_hash: Set(password_hash),
            token: Set(Some(self.id_gen.generate_token())),
            is_phone_verified: Set(false),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        Ok(user)
    }

    /// Authenticate a user by token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Authenticate a user by username and password.
    ///
    /// Users without a live token (after sign-out) get a fresh one.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        if user.token.is_some() {
            return Ok(user);
        }

        self.regenerate_token(user).await
    }

    /// Replace the user's token, invalidating the old one.
    pub async fn regenerate_token(&self, user: user::Model) -> AppResult<user::Model> {
        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(self.id_gen.generate_token()));
        active.updated_at = Set(Some(Utc::now().into()));
        self.user_repo.update(active).await
    }

    /// Apply a partial profile update.
    pub async fn update(&self, user: user::Model, input: UpdateUserInput) -> AppResult<user::Model> {
        input.validate()?;

        let mut active: user::ActiveModel = user.clone().into();

        if let Some(username) = input.username {
            validate_username(&username)?;
            let lower = username.to_lowercase();
            if lower != user.username_lower
                && self.user_repo.find_by_username(&username).await?.is_some()
            {
                return Err(AppError::Conflict("Username already taken".to_string()));
            }
            active.username = Set(username);
            active.username_lower = Set(lower);
        }
        if let Some(email) = input.email {
            active.email = Set(email);
        }
        if let Some(first_name) = input.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = input.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(password) = input.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(bio) = input.bio {
            active.bio = Set(Some(bio));
        }

        active.updated_at = Set(Some(Utc::now().into()));
        self.user_repo.update(active).await
    }

    /// Point the user's profile picture at an already stored image.
    pub async fn set_profile_picture(
        &self,
        user: user::Model,
        url: String,
    ) -> AppResult<user::Model> {
        let mut active: user::ActiveModel = user.into();
        active.profile_picture = Set(Some(url));
        active.updated_at = Set(Some(Utc::now().into()));
        self.user_repo.update(active).await
    }

    /// Profile view of a single user as seen by `viewer_id`.
    pub async fn profile_view(
        &self,
        viewer_id: &str,
        user: &user::Model,
    ) -> AppResult<UserProfileView> {
        let mut views = self.profile_views(viewer_id, std::slice::from_ref(user)).await?;
        views
            .pop()
            .ok_or_else(|| AppError::Internal("Profile view missing".to_string()))
    }

    /// Profile views for many users, in input order.
    ///
    /// Uses one grouped query per aggregate regardless of how many users are
    /// passed in.
    pub async fn profile_views(
        &self,
        viewer_id: &str,
        users: &[user::Model],
    ) -> AppResult<Vec<UserProfileView>> {
        let ids: Vec<String> = users.iter().map(|u| u.id.clone()).collect();

        let followers = self.follow_repo.count_followers_by_users(&ids).await?;
        let following = self.follow_repo.count_following_by_users(&ids).await?;
        let followed = self.follow_repo.followed_among(viewer_id, &ids).await?;

        Ok(users
            .iter()
            .map(|u| UserProfileView {
                id: u.id.clone(),
                username: u.username.clone(),
                first_name: u.first_name.clone(),
                last_name: u.last_name.clone(),
                profile_picture: u.profile_picture.clone(),
                is_phone_verified: u.is_phone_verified,
                followers_count: followers.get(&u.id).copied().unwrap_or(0),
                following_count: following.get(&u.id).copied().unwrap_or(0),
                is_following: followed.contains(&u.id),
            })
            .collect())
    }

    /// Profile views keyed by user ID, for the given IDs.
    pub async fn profile_views_by_id(
        &self,
        viewer_id: &str,
        ids: &[String],
    ) -> AppResult<HashMap<String, UserProfileView>> {
        let users = self.user_repo.find_by_ids(ids).await?;
        Ok(self
            .profile_views(viewer_id, &users)
            .await?
            .into_iter()
            .map(|v| (v.id.clone(), v))
            .collect())
    }
}

fn validate_username(username: &str) -> AppResult<()> {
    let re = USERNAME_RE
        .as_ref()
        .map_err(|e| AppError::Internal(format!("Invalid username pattern: {e}")))?;

    if re.is_match(username) {
        Ok(())
    } else {
        Err(AppError::Validation(
            "Username may only contain letters, digits and @/./+/-/_".to_string(),
        ))
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
