use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::api::{self, Comment, CommentPayload, NewPost, Post};

pub trait PostService: Send + Sync {
    fn list(&self) -> Result<Vec<Post>>;
    fn create(&self, post: NewPost) -> Result<Post>;
    fn bulk_create(&self, posts: Vec<NewPost>) -> Result<Vec<Post>>;
    fn update(&self, post: Post) -> Result<Post>;
    fn delete(&self, id: i64) -> Result<()>;
}

pub trait CommentService: Send + Sync {
    fn add(&self, post_id: i64, payload: CommentPayload) -> Result<Post>;
    fn update(&self, post_id: i64, comment_id: i64, content: &str) -> Result<Comment>;
    fn delete(&self, post_id: i64, comment_id: i64) -> Result<()>;
}

pub trait EngagementService: Send + Sync {
    fn like(&self, post_id: i64) -> Result<Post>;
    fn share(&self, post_id: i64) -> Result<Post>;
    fn like_comment(&self, post_id: i64, comment_id: i64) -> Result<i64>;
}

pub struct RemotePostService {
    client: Arc<api::Client>,
}

impl RemotePostService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl PostService for RemotePostService {
    fn list(&self) -> Result<Vec<Post>> {
        self.client.list_posts().context("fetch posts")
    }

    fn create(&self, post: NewPost) -> Result<Post> {
        self.client.create_post(&post)
    }

    fn bulk_create(&self, posts: Vec<NewPost>) -> Result<Vec<Post>> {
        self.client.bulk_create_posts(&posts)
    }

    fn update(&self, post: Post) -> Result<Post> {
        self.client.update_post(&post)
    }

    fn delete(&self, id: i64) -> Result<()> {
        self.client.delete_post(id)
    }
}

pub struct RemoteCommentService {
    client: Arc<api::Client>,
}

impl RemoteCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for RemoteCommentService {
    fn add(&self, post_id: i64, payload: CommentPayload) -> Result<Post> {
        self.client.add_comment(post_id, &payload)
    }

    fn update(&self, post_id: i64, comment_id: i64, content: &str) -> Result<Comment> {
        self.client.update_comment(post_id, comment_id, content)
    }

    fn delete(&self, post_id: i64, comment_id: i64) -> Result<()> {
        self.client.delete_comment(post_id, comment_id)
    }
}

pub struct RemoteEngagementService {
    client: Arc<api::Client>,
}

impl RemoteEngagementService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl EngagementService for RemoteEngagementService {
    fn like(&self, post_id: i64) -> Result<Post> {
        self.client.like_post(post_id)
    }

    fn share(&self, post_id: i64) -> Result<Post> {
        self.client.share_post(post_id)
    }

    fn like_comment(&self, post_id: i64, comment_id: i64) -> Result<i64> {
        Ok(self.client.like_comment(post_id, comment_id)?.like_count)
    }
}

#[derive(Default)]
pub struct MockPostService;

impl PostService for MockPostService {
    fn list(&self) -> Result<Vec<Post>> {
        Ok(vec![
            canned_post(1, "Welcome to Feedr"),
            canned_post(2, "Sample post"),
        ])
    }

    fn create(&self, post: NewPost) -> Result<Post> {
        Ok(promote(101, post))
    }

    fn bulk_create(&self, posts: Vec<NewPost>) -> Result<Vec<Post>> {
        Ok(posts
            .into_iter()
            .enumerate()
            .map(|(offset, post)| promote(101 + offset as i64, post))
            .collect())
    }

    fn update(&self, post: Post) -> Result<Post> {
        Ok(post)
    }

    fn delete(&self, _id: i64) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockCommentService;

impl CommentService for MockCommentService {
    fn add(&self, post_id: i64, payload: CommentPayload) -> Result<Post> {
        let mut post = canned_post(post_id, "Sample post");
        post.comments.push(Comment {
            id: 1,
            username: payload.username,
            user_image_url: payload.user_image_url,
            content: payload.content,
            like_count: 0,
        });
        Ok(post)
    }

    fn update(&self, _post_id: i64, comment_id: i64, content: &str) -> Result<Comment> {
        Ok(Comment {
            id: comment_id,
            username: "feedr".into(),
            user_image_url: String::new(),
            content: content.to_string(),
            like_count: 0,
        })
    }

    fn delete(&self, _post_id: i64, _comment_id: i64) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockEngagementService;

impl EngagementService for MockEngagementService {
    fn like(&self, post_id: i64) -> Result<Post> {
        let mut post = canned_post(post_id, "Sample post");
        post.like_count = 1;
        Ok(post)
    }

    fn share(&self, post_id: i64) -> Result<Post> {
        let mut post = canned_post(post_id, "Sample post");
        post.share_count = 1;
        Ok(post)
    }

    fn like_comment(&self, _post_id: i64, _comment_id: i64) -> Result<i64> {
        Ok(1)
    }
}

/// Every call fails. Create carries a server-style message so the
/// verbatim-surface path can be exercised offline.
#[derive(Default)]
pub struct FailingPostService;

impl PostService for FailingPostService {
    fn list(&self) -> Result<Vec<Post>> {
        bail!("connection refused")
    }

    fn create(&self, _post: NewPost) -> Result<Post> {
        Err(api::ApiError::Remote("Content exceeds the 500 character limit".into()).into())
    }

    fn bulk_create(&self, _posts: Vec<NewPost>) -> Result<Vec<Post>> {
        bail!("connection refused")
    }

    fn update(&self, _post: Post) -> Result<Post> {
        bail!("connection refused")
    }

    fn delete(&self, _id: i64) -> Result<()> {
        bail!("connection refused")
    }
}

fn canned_post(id: i64, content: &str) -> Post {
    Post {
        id,
        username: "feedr".into(),
        user_image_url: String::new(),
        content: Some(content.into()),
        image_url: None,
        video_url: None,
        image_title: None,
        video_title: None,
        like_count: 0,
        share_count: 0,
        comments: Vec::new(),
    }
}

fn promote(id: i64, post: NewPost) -> Post {
    Post {
        id,
        username: post.username,
        user_image_url: post.user_image_url,
        content: post.content,
        image_url: post.image_url,
        video_url: post.video_url,
        image_title: None,
        video_title: None,
        like_count: 0,
        share_count: 0,
        comments: Vec::new(),
    }
}

/// The in-memory post collection. Local state is only ever a cache of
/// the last-known server response; every operation here runs strictly
/// after the matching remote call succeeded, never before.
#[derive(Debug, Default)]
pub struct FeedStore {
    posts: Vec<Post>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.posts.iter().position(|post| post.id == id)
    }

    /// List success: the whole collection is replaced wholesale.
    pub fn replace_all(&mut self, posts: Vec<Post>) {
        self.posts = posts;
    }

    pub fn prepend(&mut self, post: Post) {
        self.posts.insert(0, post);
    }

    pub fn prepend_many(&mut self, posts: Vec<Post>) -> usize {
        let count = posts.len();
        self.posts.splice(0..0, posts);
        count
    }

    /// Swap the matching entry by id; every other post is untouched.
    /// An id the server knows but the client does not is a no-op.
    pub fn replace(&mut self, post: Post) -> bool {
        match self.position(post.id) {
            Some(index) => {
                self.posts[index] = post;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: i64) -> bool {
        match self.position(id) {
            Some(index) => {
                self.posts.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn replace_comment(&mut self, post_id: i64, comment: Comment) -> bool {
        let Some(post) = self.posts.iter_mut().find(|post| post.id == post_id) else {
            return false;
        };
        match post.comments.iter_mut().find(|c| c.id == comment.id) {
            Some(slot) => {
                *slot = comment;
                true
            }
            None => false,
        }
    }

    pub fn remove_comment(&mut self, post_id: i64, comment_id: i64) -> bool {
        let Some(post) = self.posts.iter_mut().find(|post| post.id == post_id) else {
            return false;
        };
        let before = post.comments.len();
        post.comments.retain(|comment| comment.id != comment_id);
        post.comments.len() != before
    }

    /// Like-comment responses only carry the new count, so only the
    /// count is patched; the rest of the comment stays as-is.
    pub fn patch_comment_likes(&mut self, post_id: i64, comment_id: i64, like_count: i64) -> bool {
        let Some(post) = self.posts.iter_mut().find(|post| post.id == post_id) else {
            return false;
        };
        match post.comments.iter_mut().find(|c| c.id == comment_id) {
            Some(comment) => {
                comment.like_count = like_count;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: i64, content: &str) -> Comment {
        Comment {
            id,
            username: "luffy_d_joyboy".into(),
            user_image_url: "https://example.test/luffy.jpg".into(),
            content: content.into(),
            like_count: 0,
        }
    }

    fn post(id: i64, content: &str) -> Post {
        Post {
            id,
            username: "gojo_sensei".into(),
            user_image_url: "https://example.test/gojo.jpg".into(),
            content: Some(content.into()),
            image_url: None,
            video_url: None,
            image_title: None,
            video_title: None,
            like_count: 0,
            share_count: 0,
            comments: Vec::new(),
        }
    }

    fn seeded() -> FeedStore {
        let mut store = FeedStore::new();
        let mut seventh = post(7, "seventh");
        seventh.comments = vec![comment(1, "first"), comment(3, "third"), comment(5, "fifth")];
        store.replace_all(vec![post(9, "ninth"), seventh, post(2, "second")]);
        store
    }

    #[test]
    fn mock_create_assigns_a_server_id() {
        let service = MockPostService;
        let created = service
            .create(NewPost {
                username: "zoro".into(),
                user_image_url: String::new(),
                content: Some("hi".into()),
                image_url: None,
                video_url: None,
            })
            .unwrap();
        assert_eq!(created.id, 101);
        assert_eq!(created.username, "zoro");
        assert_eq!(created.content.as_deref(), Some("hi"));
    }

    #[test]
    fn failing_create_carries_a_remote_message() {
        let err = FailingPostService
            .create(NewPost {
                username: "zoro".into(),
                user_image_url: String::new(),
                content: Some("hi".into()),
                image_url: None,
                video_url: None,
            })
            .unwrap_err();
        match err.downcast_ref::<api::ApiError>() {
            Some(api::ApiError::Remote(message)) => {
                assert_eq!(message, "Content exceeds the 500 character limit")
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn replace_all_swaps_collection_wholesale() {
        let mut store = seeded();
        store.replace_all(vec![post(42, "fresh")]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.posts()[0].id, 42);
    }

    #[test]
    fn prepend_puts_new_post_first() {
        let mut store = seeded();
        store.prepend(post(100, "newest"));
        assert_eq!(store.posts()[0].id, 100);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn prepend_many_keeps_batch_order_at_front() {
        let mut store = seeded();
        let count = store.prepend_many(vec![post(100, "a"), post(101, "b")]);
        assert_eq!(count, 2);
        let ids: Vec<i64> = store.posts().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![100, 101, 9, 7, 2]);
    }

    #[test]
    fn replace_swaps_only_the_matching_post() {
        let mut store = seeded();
        let mut liked = post(7, "seventh");
        liked.like_count = 8;
        assert!(store.replace(liked));
        assert_eq!(store.get(7).unwrap().like_count, 8);
        assert_eq!(store.get(9).unwrap().like_count, 0);
        assert_eq!(store.get(2).unwrap().like_count, 0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn replace_unknown_id_is_a_noop() {
        let mut store = seeded();
        assert!(!store.replace(post(999, "ghost")));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn remove_drops_exactly_one_post() {
        let mut store = seeded();
        assert!(store.remove(9));
        assert!(!store.remove(9));
        let ids: Vec<i64> = store.posts().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![7, 2]);
    }

    #[test]
    fn replace_comment_maps_by_id_inside_one_post() {
        let mut store = seeded();
        let mut edited = comment(3, "edited");
        edited.like_count = 2;
        assert!(store.replace_comment(7, edited));
        let comments = &store.get(7).unwrap().comments;
        assert_eq!(comments[1].content, "edited");
        assert_eq!(comments[0].content, "first");
        assert_eq!(comments[2].content, "fifth");
    }

    #[test]
    fn remove_comment_preserves_remainder_order() {
        let mut store = seeded();
        assert!(store.remove_comment(7, 3));
        let ids: Vec<i64> = store
            .get(7)
            .unwrap()
            .comments
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1, 5]);
    }

    #[test]
    fn patch_comment_likes_touches_only_the_count() {
        let mut store = seeded();
        assert!(store.patch_comment_likes(7, 3, 11));
        let comments = &store.get(7).unwrap().comments;
        assert_eq!(comments[1].like_count, 11);
        assert_eq!(comments[1].content, "third");
        assert_eq!(comments[1].username, "luffy_d_joyboy");
        assert_eq!(comments[0].like_count, 0);
        assert_eq!(comments[2].like_count, 0);
    }

    #[test]
    fn comment_ops_on_unknown_post_are_noops() {
        let mut store = seeded();
        assert!(!store.replace_comment(999, comment(3, "x")));
        assert!(!store.remove_comment(999, 3));
        assert!(!store.patch_comment_likes(999, 3, 1));
    }
}
