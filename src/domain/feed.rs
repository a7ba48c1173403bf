use std::sync::Arc;

use serde::Deserialize;

use crate::domain::post::{Comment, CommentId, Post, PostId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSort {
    #[default]
    Newest,
    MostLiked,
    LargestReward,
}

/// Cached copy of the backend's post list.
///
/// Every mutation swaps in a new `Arc<Vec<Post>>`; snapshots already handed out
/// keep observing the list they were taken from.
#[derive(Debug, Clone, Default)]
pub struct PostFeed {
    posts: Arc<Vec<Post>>,
}

impl PostFeed {
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            posts: Arc::new(posts),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Post>> {
        Arc::clone(&self.posts)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn get(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|p| &p.id == id)
    }

    /// Replace wholesale after a fetch.
    pub fn replace(&mut self, posts: Vec<Post>) {
        self.posts = Arc::new(posts);
    }

    pub fn prepend_post(&mut self, post: Post) {
        let mut next = Vec::with_capacity(self.posts.len() + 1);
        next.push(post);
        next.extend(self.posts.iter().cloned());
        self.posts = Arc::new(next);
    }

    /// Returns false when the owning post is not in the feed.
    pub fn prepend_comment(&mut self, comment: Comment) -> bool {
        let id = comment.post_id.clone();
        self.patch(&id, move |post| {
            post.comments.insert(0, comment);
        })
    }

    pub fn set_post_likes(&mut self, id: &PostId, like_count: u64) -> bool {
        self.patch(id, |post| post.like_count = like_count)
    }

    pub fn set_comment_likes(&mut self, id: &CommentId, like_count: u64) -> bool {
        let Some(owner) = self
            .posts
            .iter()
            .find(|p| p.comments.iter().any(|c| &c.id == id))
            .map(|p| p.id.clone())
        else {
            return false;
        };

        self.patch(&owner, |post| {
            if let Some(c) = post.comments.iter_mut().find(|c| &c.id == id) {
                c.like_count = like_count;
            }
        })
    }

    fn patch(&mut self, id: &PostId, f: impl FnOnce(&mut Post)) -> bool {
        let Some(idx) = self.posts.iter().position(|p| &p.id == id) else {
            return false;
        };
        let mut next: Vec<Post> = self.posts.as_ref().clone();
        f(&mut next[idx]);
        self.posts = Arc::new(next);
        true
    }

    /// Filter by a case-insensitive substring of title, description or tag name, then sort.
    pub fn query(&self, search: Option<&str>, sort: FeedSort) -> Vec<Post> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut out: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| match &needle {
                Some(n) => {
                    p.title.to_lowercase().contains(n)
                        || p.description.to_lowercase().contains(n)
                        || p.has_tag(n)
                }
                None => true,
            })
            .cloned()
            .collect();

        match sort {
            FeedSort::Newest => out.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            FeedSort::MostLiked => out.sort_by(|a, b| b.like_count.cmp(&a.like_count)),
            FeedSort::LargestReward => out.sort_by(|a, b| b.total_reward().cmp(&a.total_reward())),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::post::fixtures::{comment, post};
    use crate::domain::post::Tag;

    #[test]
    fn prepend_post_leaves_old_snapshot_untouched() {
        let mut feed = PostFeed::new(vec![post("a", 35.0, 139.0)]);
        let before = feed.snapshot();

        feed.prepend_post(post("b", 35.1, 139.1));

        assert_eq!(before.len(), 1);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.snapshot()[0].id.as_str(), "b");
    }

    #[test]
    fn prepend_comment_goes_to_front_of_owning_post() {
        let mut p = post("a", 35.0, 139.0);
        p.comments.push(comment("c1", "a"));
        let mut feed = PostFeed::new(vec![p]);
        let before = feed.snapshot();

        assert!(feed.prepend_comment(comment("c2", "a")));

        let ids: Vec<_> = feed
            .get(&PostId::new("a"))
            .unwrap()
            .comments
            .iter()
            .map(|c| c.id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["c2", "c1"]);
        assert_eq!(before[0].comments.len(), 1);
    }

    #[test]
    fn replace_swaps_whole_list() {
        let mut feed = PostFeed::new(vec![post("a", 35.0, 139.0)]);
        let before = feed.snapshot();

        feed.replace(vec![post("b", 35.0, 139.0), post("c", 35.0, 139.0)]);

        assert_eq!(before[0].id.as_str(), "a");
        assert_eq!(feed.len(), 2);
        assert!(feed.get(&PostId::new("a")).is_none());
    }

    #[test]
    fn prepend_comment_to_unknown_post_is_rejected() {
        let mut feed = PostFeed::new(vec![post("a", 35.0, 139.0)]);
        assert!(!feed.prepend_comment(comment("c1", "zzz")));
    }

    #[test]
    fn like_counts_are_patched() {
        let mut p = post("a", 35.0, 139.0);
        p.comments.push(comment("c1", "a"));
        let mut feed = PostFeed::new(vec![p]);

        assert!(feed.set_post_likes(&PostId::new("a"), 16));
        assert!(feed.set_comment_likes(&CommentId::new("c1"), 3));
        assert!(!feed.set_comment_likes(&CommentId::new("nope"), 3));

        let p = feed.get(&PostId::new("a")).unwrap();
        assert_eq!(p.like_count, 16);
        assert_eq!(p.comments[0].like_count, 3);
    }

    #[test]
    fn query_filters_and_sorts() {
        let mut a = post("a", 35.0, 139.0);
        a.title = "Park cleanup".into();
        a.like_count = 2;
        let mut b = post("b", 35.0, 139.0);
        b.title = "Bridge repaint".into();
        b.tags = vec![Tag::main("Parks")];
        b.like_count = 9;
        let mut c = post("c", 35.0, 139.0);
        c.title = "Library".into();
        c.description = "books".into();
        c.tags.clear();

        let feed = PostFeed::new(vec![a, b, c]);

        let hits = feed.query(Some("PARK"), FeedSort::MostLiked);
        let ids: Vec<_> = hits.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        assert_eq!(feed.query(Some("  "), FeedSort::Newest).len(), 3);
    }
}
