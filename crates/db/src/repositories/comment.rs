//! Comment repository.

use std::sync::Arc;

use crate::entities::{Comment, comment, notification};
use crate::repositories::map_db_err;
use gifted_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Find a comment by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<comment::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::CommentNotFound(id.to_string()))
    }

    /// Insert a comment and the notification for the post author in one
    /// transaction.
    pub async fn create(
        &self,
        model: comment::ActiveModel,
        notification: Option<notification::ActiveModel>,
    ) -> AppResult<comment::Model> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let created = model.insert(&txn).await.map_err(map_db_err)?;
        if let Some(n) = notification {
            n.insert(&txn).await.map_err(map_db_err)?;
        }

        txn.commit().await.map_err(map_db_err)?;
        Ok(created)
    }

    /// Update a comment.
    pub async fn update(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model.update(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// Delete a comment. Its likes and notifications go with it.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Comment::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    /// Comments on many posts, newest first.
    pub async fn find_by_posts(&self, post_ids: &[String]) -> AppResult<Vec<comment::Model>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        Comment::find()
            .filter(comment::Column::PostId.is_in(post_ids.to_vec()))
            .order_by_desc(comment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, Set};

    fn create_test_comment(id: &str, post_id: &str) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            author_id: "user1".to_string(),
            post_id: post_id.to_string(),
            text: "Lovely".to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment::Model>::new()])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::CommentNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_without_notification() {
        let comment = create_test_comment("c1", "p1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[comment]])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let active = comment::ActiveModel {
            id: Set("c1".to_string()),
            author_id: Set("user1".to_string()),
            post_id: Set("p1".to_string()),
            text: Set("Lovely".to_string()),
            ..Default::default()
        };

        let created = repo.create(active, None).await.unwrap();
        assert_eq!(created.text, "Lovely");
    }

    #[tokio::test]
    async fn test_find_by_posts() {
        let c1 = create_test_comment("c2", "p1");
        let c2 = create_test_comment("c1", "p2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[c1, c2]])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let result = repo
            .find_by_posts(&["p1".to_string(), "p2".to_string()])
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
    }
}
