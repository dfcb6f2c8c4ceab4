//! Business logic services.

#![allow(missing_docs)]

pub mod comment;
pub mod feed;
pub mod following;
pub mod like;
pub mod media;
pub mod notification;
pub mod post;
pub mod sms;
pub mod storage;
pub mod user;
pub mod verification;

pub use comment::{CommentService, CreateCommentInput, UpdateCommentInput};
pub use feed::{CommentView, FeedFilter, FeedService, PostView, ProfileView};
pub use following::{FollowToggle, FollowingService};
pub use like::{LikeService, LikeTarget, LikeToggle};
pub use media::{MediaService, ProcessedImage};
pub use notification::{NotificationPage, NotificationService, NotificationView, PostPreview};
pub use post::{CreatePostInput, PostService, UpdatePostInput};
pub use sms::{LogSmsSender, SmsSender, SmsService, TwilioSmsSender};
pub use storage::{LocalStorage, NoOpStorage, StorageBackend, StorageService};
pub use user::{RegisterInput, UpdateUserInput, UserProfileView, UserService};
pub use verification::{ConfirmCodeInput, PhoneVerificationService, SendCodeInput};

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: u64 = 20;

/// Largest page size a caller may ask for.
pub const MAX_LIMIT: u64 = 100;

/// Clamp a caller supplied page size into `1..=MAX_LIMIT`.
#[must_use]
pub fn clamp_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}
