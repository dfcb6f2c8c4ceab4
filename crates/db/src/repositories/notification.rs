//! Notification repository.

use std::sync::Arc;

use crate::entities::{Notification, notification};
use crate::repositories::map_db_err;
use gifted_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a notification by ID, only if it belongs to `recipient_id`.
    pub async fn find_for_recipient(
        &self,
        id: &str,
        recipient_id: &str,
    ) -> AppResult<Option<notification::Model>> {
        Notification::find_by_id(id)
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Create a new notification.
    pub async fn create(&self, model: notification::ActiveModel) -> AppResult<notification::Model> {
        model.insert(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// Delete a notification.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Notification::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    /// Get notifications for a recipient (paginated, newest first by id).
    pub async fn find_by_recipient(
        &self,
        recipient_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<notification::Model>> {
        let mut query = Notification::find()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .order_by_desc(notification::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(notification::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Mark a notification as read.
    pub async fn mark_as_read(&self, model: notification::Model) -> AppResult<notification::Model> {
        if model.is_read {
            return Ok(model);
        }

        let mut active: notification::ActiveModel = model.into();
        active.is_read = Set(true);
        active.update(self.db.as_ref()).await.map_err(map_db_err)
    }

    /// Mark all notifications as read for a recipient.
    pub async fn mark_all_as_read(&self, recipient_id: &str) -> AppResult<u64> {
        let result = Notification::update_many()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::IsRead.eq(false))
            .col_expr(notification::Column::IsRead, true.into())
            .exec(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(result.rows_affected)
    }

    /// Count unread notifications for a recipient.
    pub async fn count_unread(&self, recipient_id: &str) -> AppResult<u64> {
        Notification::find()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::IsRead.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }
}
