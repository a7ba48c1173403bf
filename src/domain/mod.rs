pub mod feed;
pub mod news;
pub mod post;
pub mod reward;

pub use feed::{FeedSort, PostFeed};
pub use news::NewsItem;
pub use post::{Comment, CommentId, Post, PostDraft, PostId, Tag, User};
pub use reward::{split_reward, RewardSplit};
