//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, post};
use crate::repositories::map_db_err;
use gifted_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Find posts by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<post::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Post::find()
            .filter(post::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model.insert(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// Update a post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model.update(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// Delete a post. Comments, likes and notifications go with it.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Post::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    /// Newest posts first, optionally restricted to a set of authors.
    ///
    /// Ids are ULIDs, so id order is creation order and `until_id` pages
    /// along the same key the page is sorted by.
    ///
    /// `Some(&[])` yields an empty page without touching the database.
    pub async fn find_recent(
        &self,
        author_ids: Option<&[String]>,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<post::Model>> {
        let mut query = Post::find();

        if let Some(ids) = author_ids {
            if ids.is_empty() {
                return Ok(vec![]);
            }
            query = query.filter(post::Column::AuthorId.is_in(ids.to_vec()));
        }

        if let Some(id) = until_id {
            query = query.filter(post::Column::Id.lt(id));
        }

        query
            .order_by_desc(post::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Posts by one author, newest first.
    pub async fn find_by_author(
        &self,
        author_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<post::Model>> {
        let mut query = Post::find().filter(post::Column::AuthorId.eq(author_id));

        if let Some(id) = until_id {
            query = query.filter(post::Column::Id.lt(id));
        }

        query
            .order_by_desc(post::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Count posts by an author.
    pub async fn count_by_author(&self, author_id: &str) -> AppResult<u64> {
        Post::find()
            .filter(post::Column::AuthorId.eq(author_id))
            .count(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::logged_transactions;
    use chrono::Utc;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_post(id: &str, author_id: &str) -> post::Model {
        post::Model {
            id: id.to_string(),
            author_id: author_id.to_string(),
            what: "Scarf".to_string(),
            who: "Grandma".to_string(),
            note: None,
            gift_image: None,
            status: post::PostStatus::NotStarted,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_found() {
        let post = create_test_post("p1", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.get_by_id("p1").await.unwrap();

        assert_eq!(result.what, "Scarf");
        assert_eq!(result.status, post::PostStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_find_recent_with_no_authors_is_empty() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = PostRepository::new(db);
        let result = repo.find_recent(Some(&[]), 20, None).await.unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_find_recent_all() {
        let p1 = create_test_post("p2", "user1");
        let p2 = create_test_post("p1", "user2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[p1, p2]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.find_recent(None, 20, None).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "p2");
    }

    #[tokio::test]
    async fn test_find_recent_pages_by_id() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post("p1", "user1")]])
                .append_query_results([[create_test_post("p1", "user1")]])
                .into_connection(),
        );

        let repo = PostRepository::new(Arc::clone(&db));
        repo.find_recent(None, 20, Some("p2")).await.unwrap();
        repo.find_by_author("user1", 20, Some("p2")).await.unwrap();
        drop(repo);

        let log = logged_transactions(db);
        assert_eq!(log.len(), 2);
        for stmts in &log {
            let select = &stmts[0];
            assert!(select.contains("post.id < $"), "{select}");
            assert!(select.contains("ORDER BY post.id DESC LIMIT"), "{select}");
            assert!(!select.contains("ORDER BY post.created_at"), "{select}");
        }
    }

    #[tokio::test]
    async fn test_count_by_author() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(3)),
                }]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        assert_eq!(repo.count_by_author("user1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        assert!(repo.delete("p1").await.is_ok());
    }
}
