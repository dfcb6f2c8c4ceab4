//! Follow repository.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entities::{Follow, Notification, follow, notification};
use crate::repositories::{GroupCount, into_count_map, map_db_err};
use gifted_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};

/// Follow repository for database operations.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow edge by follower and followed user.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FollowingId.eq(following_id))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Check if a user is following another user.
    pub async fn is_following(&self, follower_id: &str, following_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(follower_id, following_id).await?.is_some())
    }

    /// Insert a follow edge and its notification in one transaction.
    ///
    /// A concurrent duplicate insert surfaces as `AppError::Conflict` and
    /// nothing is written.
    pub async fn follow(
        &self,
        edge: follow::ActiveModel,
        notification: Option<notification::ActiveModel>,
    ) -> AppResult<follow::Model> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let created = edge.insert(&txn).await.map_err(map_db_err)?;
        if let Some(n) = notification {
            n.insert(&txn).await.map_err(map_db_err)?;
        }

        txn.commit().await.map_err(map_db_err)?;
        Ok(created)
    }

    /// Delete a follow edge and the follow notification it produced, in one
    /// transaction.
    ///
    /// Returns whether an edge was actually removed.
    pub async fn unfollow(&self, follower_id: &str, following_id: &str) -> AppResult<bool> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let deleted = Follow::delete_many()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FollowingId.eq(following_id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        Notification::delete_many()
            .filter(notification::Column::RecipientId.eq(following_id))
            .filter(notification::Column::SenderId.eq(follower_id))
            .filter(
                notification::Column::NotificationType
                    .eq(notification::NotificationType::Follow),
            )
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;
        Ok(deleted.rows_affected > 0)
    }

    /// Edges pointing at a user (paginated, newest first).
    pub async fn find_followers(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        let mut query = Follow::find()
            .filter(follow::Column::FollowingId.eq(user_id))
            .order_by_desc(follow::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(follow::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Edges leaving a user (paginated, newest first).
    pub async fn find_following(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        let mut query = Follow::find()
            .filter(follow::Column::FollowerId.eq(user_id))
            .order_by_desc(follow::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(follow::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// IDs of every user a user follows.
    pub async fn following_ids(&self, follower_id: &str) -> AppResult<Vec<String>> {
        Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .select_only()
            .column(follow::Column::FollowingId)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Subset of `user_ids` that `follower_id` follows.
    pub async fn followed_among(
        &self,
        follower_id: &str,
        user_ids: &[String],
    ) -> AppResult<HashSet<String>> {
        if user_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids = Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FollowingId.is_in(user_ids.to_vec()))
            .select_only()
            .column(follow::Column::FollowingId)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(ids.into_iter().collect())
    }

    /// Count followers of a user.
    pub async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        Follow::find()
            .filter(follow::Column::FollowingId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Count users a user follows.
    pub async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        Follow::find()
            .filter(follow::Column::FollowerId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Follower counts for many users in one grouped query.
    ///
    /// Users without followers are absent from the map.
    pub async fn count_followers_by_users(
        &self,
        user_ids: &[String],
    ) -> AppResult<HashMap<String, u64>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Follow::find()
            .filter(follow::Column::FollowingId.is_in(user_ids.to_vec()))
            .select_only()
            .column_as(follow::Column::FollowingId, "key")
            .column_as(follow::Column::Id.count(), "count")
            .group_by(follow::Column::FollowingId)
            .into_model::<GroupCount>()
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(into_count_map(rows))
    }

    /// Following counts for many users in one grouped query.
    pub async fn count_following_by_users(
        &self,
        user_ids: &[String],
    ) -> AppResult<HashMap<String, u64>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Follow::find()
            .filter(follow::Column::FollowerId.is_in(user_ids.to_vec()))
            .select_only()
            .column_as(follow::Column::FollowerId, "key")
            .column_as(follow::Column::Id.count(), "count")
            .group_by(follow::Column::FollowerId)
            .into_model::<GroupCount>()
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(into_count_map(rows))
    }
}
