//! Feed assembly: posts joined with their authors, comments, counts and the
//! viewer's like state.

use std::collections::{HashMap, HashSet};

use gifted_common::{AppError, AppResult};
use gifted_db::{
    entities::{
        comment,
        post::{self, PostStatus},
    },
    repositories::{
        CommentLikeRepository, CommentRepository, FollowRepository, PostLikeRepository,
        PostRepository, UserRepository,
    },
};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};

use crate::services::user::{UserProfileView, UserService};

/// Which posts the home feed shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFilter {
    #[default]
    All,
    Following,
}

/// A comment as shown inside a post.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub author: UserProfileView,
    pub post: String,
    pub text: String,
    pub like_count: u64,
    pub is_liked: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

/// A post as shown in feeds and on profiles.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: String,
    pub author: UserProfileView,
    pub what: String,
    pub who: String,
    pub note: Option<String>,
    pub gift_image: Option<String>,
    pub status: PostStatus,
    pub like_count: u64,
    pub comments: Vec<CommentView>,
    pub comment_count: u64,
    pub is_liked: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

/// A user's profile page.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub profile_picture: Option<String>,
    pub is_following: bool,
    pub follower_count: u64,
    pub following_count: u64,
    pub post_count: u64,
    pub is_own_profile: bool,
    pub posts: Vec<PostView>,
}

/// Read-only service assembling post views.
#[derive(Clone)]
pub struct FeedService {
    post_repo: PostRepository,
    comment_repo: CommentRepository,
    post_like_repo: PostLikeRepository,
    comment_like_repo: CommentLikeRepository,
    follow_repo: FollowRepository,
    user_repo: UserRepository,
    users: UserService,
}

impl FeedService {
    /// Create a new feed service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        comment_repo: CommentRepository,
        post_like_repo: PostLikeRepository,
        comment_like_repo: CommentLikeRepository,
        follow_repo: FollowRepository,
        user_repo: UserRepository,
        users: UserService,
    ) -> Self {
        Self {
            post_repo,
            comment_repo,
            post_like_repo,
            comment_like_repo,
            follow_repo,
            user_repo,
            users,
        }
    }

    /// Newest posts, either from everyone or only from followed users.
    pub async fn home_feed(
        &self,
        viewer_id: &str,
        filter: FeedFilter,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<PostView>> {
        let posts = match filter {
            FeedFilter::All => self.post_repo.find_recent(None, limit, until_id).await?,
            FeedFilter::Following => {
                let author_ids = self.follow_repo.following_ids(viewer_id).await?;
                self.post_repo
                    .find_recent(Some(&author_ids), limit, until_id)
                    .await?
            }
        };

        self.assemble(viewer_id, posts).await
    }

    /// View of a single post.
    pub async fn post_view(&self, viewer_id: &str, post: post::Model) -> AppResult<PostView> {
        self.assemble(viewer_id, vec![post])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Post view missing".to_string()))
    }

    /// View of a single comment.
    pub async fn comment_view(
        &self,
        viewer_id: &str,
        comment: comment::Model,
    ) -> AppResult<CommentView> {
        let ids = [comment.id.clone()];
        let like_counts = self.comment_like_repo.count_by_comments(&ids).await?;
        let liked = self.comment_like_repo.liked_among(viewer_id, &ids).await?;
        let authors = self
            .users
            .profile_views_by_id(viewer_id, std::slice::from_ref(&comment.author_id))
            .await?;

        comment_view(comment, &authors, &like_counts, &liked)
            .ok_or_else(|| AppError::Internal("Comment author missing".to_string()))
    }

    /// Profile page of `username`: stats plus their newest posts.
    pub async fn profile(
        &self,
        viewer_id: &str,
        username: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<ProfileView> {
        let user = self.user_repo.get_by_username(username).await?;

        let is_following = self.follow_repo.is_following(viewer_id, &user.id).await?;
        let follower_count = self.follow_repo.count_followers(&user.id).await?;
        let following_count = self.follow_repo.count_following(&user.id).await?;
        let post_count = self.post_repo.count_by_author(&user.id).await?;

        let posts = self
            .post_repo
            .find_by_author(&user.id, limit, until_id)
            .await?;
        let posts = self.assemble(viewer_id, posts).await?;

        Ok(ProfileView {
            is_own_profile: user.id == viewer_id,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            profile_picture: user.profile_picture,
            is_following,
            follower_count,
            following_count,
            post_count,
            posts,
        })
    }

    /// Join a page of posts with everything a [`PostView`] shows.
    ///
    /// Issues a fixed number of queries for the whole page: one per aggregate,
    /// never one per post or comment. Post order is preserved.
    pub async fn assemble(
        &self,
        viewer_id: &str,
        posts: Vec<post::Model>,
    ) -> AppResult<Vec<PostView>> {
        if posts.is_empty() {
            return Ok(vec![]);
        }

        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();

        let comments = self.comment_repo.find_by_posts(&post_ids).await?;
        let comment_ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();

        let post_likes = self.post_like_repo.count_by_posts(&post_ids).await?;
        let liked_posts = self.post_like_repo.liked_among(viewer_id, &post_ids).await?;
        let comment_likes = self
            .comment_like_repo
            .count_by_comments(&comment_ids)
            .await?;
        let liked_comments = self
            .comment_like_repo
            .liked_among(viewer_id, &comment_ids)
            .await?;

        let author_ids: Vec<String> = posts
            .iter()
            .map(|p| p.author_id.clone())
            .chain(comments.iter().map(|c| c.author_id.clone()))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let authors = self.users.profile_views_by_id(viewer_id, &author_ids).await?;

        let mut comments_by_post: HashMap<String, Vec<CommentView>> = HashMap::new();
        for c in comments {
            let Some(view) = comment_view(c, &authors, &comment_likes, &liked_comments) else {
                continue;
            };
            comments_by_post
                .entry(view.post.clone())
                .or_default()
                .push(view);
        }

        Ok(posts
            .into_iter()
            .filter_map(|p| {
                let Some(author) = authors.get(&p.author_id).cloned() else {
                    tracing::warn!(post_id = %p.id, "Post author missing");
                    return None;
                };
                let comments = comments_by_post.remove(&p.id).unwrap_or_default();

                Some(PostView {
                    like_count: post_likes.get(&p.id).copied().unwrap_or(0),
                    comment_count: comments.len() as u64,
                    is_liked: liked_posts.contains(&p.id),
                    comments,
                    author,
                    id: p.id,
                    what: p.what,
                    who: p.who,
                    note: p.note,
                    gift_image: p.gift_image,
                    status: p.status,
                    created_at: p.created_at,
                    updated_at: p.updated_at,
                })
            })
            .collect())
    }
}

fn comment_view(
    c: comment::Model,
    authors: &HashMap<String, UserProfileView>,
    like_counts: &HashMap<String, u64>,
    liked: &HashSet<String>,
) -> Option<CommentView> {
    let author = authors.get(&c.author_id).cloned()?;

    Some(CommentView {
        like_count: like_counts.get(&c.id).copied().unwrap_or(0),
        is_liked: liked.contains(&c.id),
        author,
        id: c.id,
        post: c.post_id,
        text: c.text,
        created_at: c.created_at,
        updated_at: c.updated_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::post::tests::create_test_post;
    use crate::services::user::tests::create_test_user;
    use chrono::Utc;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn service(db: DatabaseConnection) -> FeedService {
        let db = Arc::new(db);
        FeedService::new(
            PostRepository::new(Arc::clone(&db)),
            CommentRepository::new(Arc::clone(&db)),
            PostLikeRepository::new(Arc::clone(&db)),
            CommentLikeRepository::new(Arc::clone(&db)),
            FollowRepository::new(Arc::clone(&db)),
            UserRepository::new(Arc::clone(&db)),
            UserService::new(
                UserRepository::new(Arc::clone(&db)),
                FollowRepository::new(db),
            ),
        )
    }

    fn no_rows() -> Vec<BTreeMap<&'static str, Value>> {
        Vec::new()
    }

    #[tokio::test]
    async fn test_following_feed_without_follows_is_empty() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([no_rows()])
                .into_connection(),
        );

        let feed = svc
            .home_feed("alice", FeedFilter::Following, 20, None)
            .await
            .unwrap();

        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn test_assemble_empty_page_runs_no_queries() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        assert!(svc.assemble("alice", vec![]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_assemble_post_with_counts_and_comments() {
        let post = create_test_post("p1", "bob");
        let comment = comment::Model {
            id: "c1".to_string(),
            author_id: "alice".to_string(),
            post_id: "p1".to_string(),
            text: "Great gift".to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };

        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                // comments of the page
                .append_query_results([[comment]])
                // post like counts
                .append_query_results([[btreemap! {
                    "key" => Value::from("p1"),
                    "count" => Value::BigInt(Some(2)),
                }]])
                // posts liked by the viewer
                .append_query_results([[btreemap! {
                    "post_id" => Value::from("p1"),
                }]])
                // comment like counts
                .append_query_results([[btreemap! {
                    "key" => Value::from("c1"),
                    "count" => Value::BigInt(Some(1)),
                }]])
                // comments liked by the viewer
                .append_query_results([no_rows()])
                // authors
                .append_query_results([[
                    create_test_user("alice", "alice"),
                    create_test_user("bob", "bob"),
                ]])
                .append_query_results([no_rows()])
                .append_query_results([no_rows()])
                .append_query_results([[btreemap! {
                    "following_id" => Value::from("bob"),
                }]])
                .into_connection(),
        );

        let views = svc.assemble("alice", vec![post]).await.unwrap();

        assert_eq!(views.len(), 1);
        let view = &views[0];
        assert_eq!(view.author.username, "bob");
        assert!(view.author.is_following);
        assert_eq!(view.like_count, 2);
        assert!(view.is_liked);
        assert_eq!(view.comment_count, 1);
        assert_eq!(view.comments[0].author.username, "alice");
        assert_eq!(view.comments[0].like_count, 1);
        assert!(!view.comments[0].is_liked);
        assert_eq!(view.comments[0].post, "p1");
    }
}
