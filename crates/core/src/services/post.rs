//! Post service.

use chrono::Utc;
use gifted_common::{AppError, AppResult, IdGenerator};
use gifted_db::{
    entities::post::{self, PostStatus},
    repositories::PostRepository,
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

/// Input for announcing a gift.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 255))]
    pub what: String,

    #[validate(length(min = 1, max = 255))]
    pub who: String,

    #[validate(length(max = 1000))]
    pub note: Option<String>,

    #[serde(default)]
    pub status: PostStatus,
}

/// Partial update of a post.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePostInput {
    #[validate(length(min = 1, max = 255))]
    pub what: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub who: Option<String>,

    #[validate(length(max = 1000))]
    pub note: Option<String>,

    pub status: Option<PostStatus>,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(post_repo: PostRepository) -> Self {
        Self {
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get a post the user is allowed to change.
    pub async fn get_owned(&self, id: &str, user_id: &str) -> AppResult<post::Model> {
        let post = self.post_repo.get_by_id(id).await?;
        if post.author_id != user_id {
            return Err(AppError::Forbidden(
                "You can only edit your own posts".to_string(),
            ));
        }
        Ok(post)
    }

    /// Create a new post.
    pub async fn create(&self, author_id: &str, input: CreatePostInput) -> AppResult<post::Model> {
        input.validate()?;

        let now = Utc::now();
        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            author_id: Set(author_id.to_string()),
            what: Set(input.what),
            who: Set(input.who),
            note: Set(input.note.filter(|n| !n.is_empty())),
            gift_image: Set(None),
            status: Set(input.status),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let post = self.post_repo.create(model).await?;
        tracing::info!(post_id = %post.id, author_id = %author_id, "Post created");

        Ok(post)
    }

    /// Apply a partial update. Author only.
    pub async fn update(
        &self,
        id: &str,
        user_id: &str,
        input: UpdatePostInput,
    ) -> AppResult<post::Model> {
        input.validate()?;
        let post = self.get_owned(id, user_id).await?;

        let mut active: post::ActiveModel = post.into();
        if let Some(what) = input.what {
            active.what = Set(what);
        }
        if let Some(who) = input.who {
            active.who = Set(who);
        }
        if let Some(note) = input.note {
            active.note = Set(Some(note).filter(|n| !n.is_empty()));
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now().into());

        self.post_repo.update(active).await
    }

    /// Replace the gift image of a post already checked with [`Self::get_owned`].
    pub async fn set_image(&self, post: post::Model, url: String) -> AppResult<post::Model> {
        let mut active: post::ActiveModel = post.into();
        active.gift_image = Set(Some(url));
        active.updated_at = Set(Utc::now().into());
        self.post_repo.update(active).await
    }

    /// Delete a post. Author only.
    ///
    /// Returns the deleted row so callers can clean up its image.
    pub async fn delete(&self, id: &str, user_id: &str) -> AppResult<post::Model> {
        let post = self.post_repo.get_by_id(id).await?;
        if post.author_id != user_id {
            return Err(AppError::Forbidden(
                "You are not the author of this post".to_string(),
            ));
        }

        self.post_repo.delete(&post.id).await?;
        tracing::info!(post_id = %id, "Post deleted");
        Ok(post)
    }
}
