//! Database repositories.

pub mod comment;
pub mod comment_like;
pub mod follow;
pub mod notification;
pub mod post;
pub mod post_like;
pub mod user;

pub use comment::CommentRepository;
pub use comment_like::CommentLikeRepository;
pub use follow::FollowRepository;
pub use notification::NotificationRepository;
pub use post::PostRepository;
pub use post_like::PostLikeRepository;
pub use user::UserRepository;

use std::collections::HashMap;

use gifted_common::AppError;
use sea_orm::{DbErr, FromQueryResult, SqlErr};

/// Convert a `DbErr` into an `AppError`.
///
/// Unique constraint violations become `Conflict` so callers can tell a lost
/// race on an edge insert apart from a broken store.
pub fn map_db_err(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            tracing::debug!(detail = %detail, "Unique constraint violation");
            AppError::Conflict("Resource already exists".to_string())
        }
        _ => AppError::Database(err.to_string()),
    }
}

/// One row of a `GROUP BY key` count query.
#[derive(Debug, FromQueryResult)]
pub(crate) struct GroupCount {
    pub key: String,
    pub count: i64,
}

pub(crate) fn into_count_map(rows: Vec<GroupCount>) -> HashMap<String, u64> {
    rows.into_iter()
        .map(|r| (r.key, u64::try_from(r.count).unwrap_or(0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_db_err_generic() {
        let err = map_db_err(DbErr::Custom("boom".to_string()));
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn test_into_count_map() {
        let map = into_count_map(vec![
            GroupCount {
                key: "p1".to_string(),
                count: 3,
            },
            GroupCount {
                key: "p2".to_string(),
                count: 1,
            },
        ]);

        assert_eq!(map.get("p1"), Some(&3));
        assert_eq!(map.get("p2"), Some(&1));
        assert_eq!(map.get("p3"), None);
    }
}
