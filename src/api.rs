use std::time::Duration;

use anyhow::{bail, Result};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4000/";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub http_client: Option<HttpClient>,
}

/// A feed entry as the server returns it. The server is authoritative
/// for ids and engagement counts; the client never fabricates either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub user_image_url: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub share_count: i64,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub user_image_url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub like_count: i64,
}

/// Create payload. Absent media fields serialize as explicit nulls,
/// which is what the server expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub username: String,
    pub user_image_url: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

/// Loosely-shaped post from bulk input; every field is optional and the
/// active profile fills in whatever is missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkPost {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user_image_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    pub username: String,
    pub user_image_url: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
struct CommentEdit<'a> {
    content: &'a str,
}

/// Like-comment responses carry only the new count.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeCountPatch {
    pub like_count: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server supplied a `message` or `error` string; surfaced verbatim.
    #[error("{0}")]
    Remote(String),
    #[error("api error {0}")]
    Status(StatusCode),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug)]
pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("api client user agent required");
        }
        let base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn list_posts(&self) -> Result<Vec<Post>> {
        let resp = self.request(Method::GET, "/api/posts", None)?;
        Ok(resp.json()?)
    }

    pub fn create_post(&self, post: &NewPost) -> Result<Post> {
        let body = serde_json::to_value(post)?;
        let resp = self.request(Method::POST, "/api/posts", Some(body))?;
        Ok(resp.json()?)
    }

    pub fn bulk_create_posts(&self, posts: &[NewPost]) -> Result<Vec<Post>> {
        let body = serde_json::to_value(posts)?;
        let resp = self.request(Method::POST, "/api/posts/bulk", Some(body))?;
        Ok(resp.json()?)
    }

    pub fn update_post(&self, post: &Post) -> Result<Post> {
        let path = format!("/api/posts/{}", post.id);
        let body = serde_json::to_value(post)?;
        let resp = self.request(Method::PUT, &path, Some(body))?;
        Ok(resp.json()?)
    }

    pub fn delete_post(&self, id: i64) -> Result<()> {
        let path = format!("/api/posts/{}", id);
        self.request(Method::DELETE, &path, None)?;
        Ok(())
    }

    pub fn like_post(&self, id: i64) -> Result<Post> {
        let path = format!("/api/posts/{}/like", id);
        let resp = self.request(Method::POST, &path, None)?;
        Ok(resp.json()?)
    }

    pub fn share_post(&self, id: i64) -> Result<Post> {
        let path = format!("/api/posts/{}/share", id);
        let resp = self.request(Method::POST, &path, None)?;
        Ok(resp.json()?)
    }

    pub fn add_comment(&self, post_id: i64, payload: &CommentPayload) -> Result<Post> {
        let path = format!("/api/posts/{}/comments", post_id);
        let body = serde_json::to_value(payload)?;
        let resp = self.request(Method::POST, &path, Some(body))?;
        Ok(resp.json()?)
    }

    pub fn update_comment(&self, post_id: i64, comment_id: i64, content: &str) -> Result<Comment> {
        let path = format!("/api/posts/{}/comments/{}", post_id, comment_id);
        let body = serde_json::to_value(CommentEdit { content })?;
        let resp = self.request(Method::PUT, &path, Some(body))?;
        Ok(resp.json()?)
    }

    pub fn delete_comment(&self, post_id: i64, comment_id: i64) -> Result<()> {
        let path = format!("/api/posts/{}/comments/{}", post_id, comment_id);
        self.request(Method::DELETE, &path, None)?;
        Ok(())
    }

    pub fn like_comment(&self, post_id: i64, comment_id: i64) -> Result<LikeCountPatch> {
        let path = format!("/api/posts/{}/comments/{}/like", post_id, comment_id);
        let resp = self.request(Method::POST, &path, None)?;
        Ok(resp.json()?)
    }

    fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response> {
        let url = self.base_url.join(path)?;
        let mut req = self
            .http
            .request(method, url)
            .header(reqwest::header::USER_AGENT, self.user_agent.clone());
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send()?;
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        match remote_message(&text) {
            Some(message) => Err(ApiError::Remote(message).into()),
            None => Err(ApiError::Status(status).into()),
        }
    }
}

fn remote_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .message
        .or(parsed.error)
        .filter(|msg| !msg.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_user_agent() {
        let err = Client::new(ClientConfig::default()).unwrap_err();
        assert!(err.to_string().contains("user agent"));
    }

    #[test]
    fn extracts_message_field() {
        let body = r#"{"message":"content too long"}"#;
        assert_eq!(remote_message(body).as_deref(), Some("content too long"));
    }

    #[test]
    fn falls_back_to_error_field() {
        let body = r#"{"error":"bad media url"}"#;
        assert_eq!(remote_message(body).as_deref(), Some("bad media url"));
    }

    #[test]
    fn prefers_message_over_error() {
        let body = r#"{"message":"first","error":"second"}"#;
        assert_eq!(remote_message(body).as_deref(), Some("first"));
    }

    #[test]
    fn ignores_non_json_and_blank_bodies() {
        assert_eq!(remote_message("<html>502</html>"), None);
        assert_eq!(remote_message(r#"{"message":"  "}"#), None);
        assert_eq!(remote_message(""), None);
    }

    #[test]
    fn decodes_post_wire_shape() {
        let raw = r#"{
            "id": 7,
            "username": "gojo_sensei",
            "userImageUrl": "https://example.test/a.jpg",
            "content": "hello",
            "imageUrl": null,
            "videoUrl": "https://youtu.be/dQw4w9WgXcQ",
            "videoTitle": "clip",
            "likeCount": 3,
            "shareCount": 1,
            "comments": [
                {"id": 1, "username": "luffy", "userImageUrl": "", "content": "nice", "likeCount": 0}
            ]
        }"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.id, 7);
        assert_eq!(post.video_title.as_deref(), Some("clip"));
        assert_eq!(post.comments.len(), 1);
        assert_eq!(post.comments[0].content, "nice");
    }

    #[test]
    fn new_post_serializes_null_media() {
        let payload = NewPost {
            username: "Anonymous".into(),
            user_image_url: "https://example.test/a.jpg".into(),
            content: Some("hi".into()),
            image_url: None,
            video_url: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("imageUrl").unwrap().is_null());
        assert!(value.get("videoUrl").unwrap().is_null());
        assert_eq!(value.get("username").unwrap(), "Anonymous");
    }
}
