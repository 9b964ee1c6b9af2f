use serde_json::Value;
use url::Url;

use crate::api::{BulkPost, CommentPayload, NewPost, Post};

pub const DEFAULT_USERNAME: &str = "Anonymous";
pub const DEFAULT_AVATAR_URL: &str = "https://randomuser.me/api/portraits/lego/1.jpg";

/// The active identity. Client-local only: there are no accounts, no
/// credentials, and nothing here ever authenticates a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub username: String,
    pub avatar_url: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            avatar_url: DEFAULT_AVATAR_URL.to_string(),
        }
    }
}

impl Profile {
    pub fn comment_payload(&self, content: &str) -> CommentPayload {
        CommentPayload {
            username: self.username.clone(),
            user_image_url: self.avatar_url.clone(),
            content: content.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Post must contain content, image, or video")]
    Empty,
    #[error("Please enter a valid image URL")]
    InvalidImageUrl,
    #[error("Please enter a valid video URL")]
    InvalidVideoUrl,
    #[error("Please choose either image or video, not both")]
    BothMedia,
}

#[derive(Debug, thiserror::Error)]
pub enum BulkError {
    #[error("Invalid JSON format: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Input must be a JSON array")]
    NotAnArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("Username is required")]
    EmptyUsername,
    #[error("Please enter a valid profile image URL")]
    InvalidAvatarUrl,
}

/// The post composer's working state, for both create and edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub content: String,
    pub image_url: String,
    pub video_url: String,
}

impl PostDraft {
    pub fn from_post(post: &Post) -> Self {
        Self {
            content: post.content.clone().unwrap_or_default(),
            image_url: post.image_url.clone().unwrap_or_default(),
            video_url: post.video_url.clone().unwrap_or_default(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
            && self.image_url.trim().is_empty()
            && self.video_url.trim().is_empty()
    }

    /// Create-mode validation: an all-blank draft is rejected before
    /// any network call, and non-empty media URLs must parse.
    pub fn validate_create(&self) -> Result<(), ValidationError> {
        if self.is_blank() {
            return Err(ValidationError::Empty);
        }
        if !self.image_url.trim().is_empty() && Url::parse(self.image_url.trim()).is_err() {
            return Err(ValidationError::InvalidImageUrl);
        }
        if !self.video_url.trim().is_empty() && Url::parse(self.video_url.trim()).is_err() {
            return Err(ValidationError::InvalidVideoUrl);
        }
        Ok(())
    }

    /// Edit-mode validation only refuses image and video set together;
    /// the update path otherwise trusts the caller, emptiness included.
    pub fn validate_edit(&self) -> Result<(), ValidationError> {
        if !self.image_url.trim().is_empty() && !self.video_url.trim().is_empty() {
            return Err(ValidationError::BothMedia);
        }
        Ok(())
    }

    pub fn new_post(&self, profile: &Profile) -> NewPost {
        NewPost {
            username: profile.username.clone(),
            user_image_url: profile.avatar_url.clone(),
            content: normalized(&self.content),
            image_url: normalized(&self.image_url),
            video_url: normalized(&self.video_url),
        }
    }

    /// Fold the edited fields back into the full post payload the
    /// update endpoint expects, media null-normalized.
    pub fn apply_to(&self, post: &Post) -> Post {
        let mut updated = post.clone();
        updated.content = normalized(&self.content);
        updated.image_url = normalized(&self.image_url);
        updated.video_url = normalized(&self.video_url);
        updated
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Parse the bulk textarea. Invalid JSON surfaces the parser's own
/// message; valid JSON of the wrong shape is rejected before any
/// element is examined. Nothing here touches the network.
pub fn parse_bulk(input: &str) -> Result<Vec<BulkPost>, BulkError> {
    let value: Value = serde_json::from_str(input)?;
    let Value::Array(items) = value else {
        return Err(BulkError::NotAnArray);
    };
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(BulkError::Json))
        .collect()
}

/// Continuous validation for the bulk overlay's submit button.
pub fn bulk_is_valid(input: &str) -> bool {
    parse_bulk(input).is_ok()
}

/// Default missing author fields from the active profile and
/// trim/null-normalize media, mirroring what the create path does.
pub fn with_profile(posts: Vec<BulkPost>, profile: &Profile) -> Vec<NewPost> {
    posts
        .into_iter()
        .map(|post| NewPost {
            username: post
                .username
                .as_deref()
                .and_then(non_blank)
                .unwrap_or_else(|| profile.username.clone()),
            user_image_url: post
                .user_image_url
                .as_deref()
                .and_then(non_blank)
                .unwrap_or_else(|| profile.avatar_url.clone()),
            content: post.content.as_deref().and_then(non_blank),
            image_url: post.image_url.as_deref().and_then(non_blank),
            video_url: post.video_url.as_deref().and_then(non_blank),
        })
        .collect()
}

/// Profile editor working state. Commits locally; no round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDraft {
    pub username: String,
    pub avatar_url: String,
}

impl ProfileDraft {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            username: profile.username.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }

    pub fn commit(&self) -> Result<Profile, ProfileError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(ProfileError::EmptyUsername);
        }
        let avatar = self.avatar_url.trim();
        if Url::parse(avatar).is_err() {
            return Err(ProfileError::InvalidAvatarUrl);
        }
        Ok(Profile {
            username: username.to_string(),
            avatar_url: avatar.to_string(),
        })
    }
}

fn normalized(value: &str) -> Option<String> {
    non_blank(value)
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_blank_draft_is_rejected_locally() {
        let draft = PostDraft {
            content: "".into(),
            image_url: "".into(),
            video_url: "".into(),
        };
        assert_eq!(draft.validate_create(), Err(ValidationError::Empty));

        let whitespace = PostDraft {
            content: "   ".into(),
            ..PostDraft::default()
        };
        assert_eq!(whitespace.validate_create(), Err(ValidationError::Empty));
    }

    #[test]
    fn malformed_media_urls_are_rejected() {
        let draft = PostDraft {
            content: "hi".into(),
            image_url: "not a url".into(),
            ..PostDraft::default()
        };
        assert_eq!(
            draft.validate_create(),
            Err(ValidationError::InvalidImageUrl)
        );

        let draft = PostDraft {
            content: "hi".into(),
            video_url: "also bad".into(),
            ..PostDraft::default()
        };
        assert_eq!(
            draft.validate_create(),
            Err(ValidationError::InvalidVideoUrl)
        );
    }

    #[test]
    fn well_formed_draft_passes() {
        let draft = PostDraft {
            content: "hello".into(),
            image_url: "https://example.test/a.jpg".into(),
            video_url: String::new(),
        };
        assert!(draft.validate_create().is_ok());
    }

    #[test]
    fn edit_refuses_both_media_but_allows_empty() {
        let both = PostDraft {
            content: String::new(),
            image_url: "https://example.test/a.jpg".into(),
            video_url: "https://example.test/b.mp4".into(),
        };
        assert_eq!(both.validate_edit(), Err(ValidationError::BothMedia));

        // Update trusts the caller: an emptied-out draft still submits.
        assert!(PostDraft::default().validate_edit().is_ok());
    }

    #[test]
    fn new_post_trims_and_null_normalizes() {
        let draft = PostDraft {
            content: "  hello  ".into(),
            image_url: "   ".into(),
            video_url: String::new(),
        };
        let payload = draft.new_post(&Profile::default());
        assert_eq!(payload.content.as_deref(), Some("hello"));
        assert_eq!(payload.image_url, None);
        assert_eq!(payload.video_url, None);
        assert_eq!(payload.username, DEFAULT_USERNAME);
    }

    #[test]
    fn bulk_rejects_invalid_json_with_parser_message() {
        let err = parse_bulk("{invalid").unwrap_err();
        match err {
            BulkError::Json(inner) => assert!(!inner.to_string().is_empty()),
            other => panic!("expected Json error, got {other}"),
        }
    }

    #[test]
    fn bulk_rejects_non_array_shapes() {
        let err = parse_bulk(r#""not an array""#).unwrap_err();
        assert!(matches!(err, BulkError::NotAnArray));
        assert_eq!(err.to_string(), "Input must be a JSON array");
        assert!(matches!(
            parse_bulk(r#"{"username":"x"}"#),
            Err(BulkError::NotAnArray)
        ));
        assert!(!bulk_is_valid(r#""not an array""#));
    }

    #[test]
    fn bulk_accepts_an_array_of_partial_posts() {
        let input = r#"[
            {"username": "gojo_sensei", "content": "gojo epic"},
            {"content": "anonymous entry", "imageUrl": " https://example.test/a.jpg "}
        ]"#;
        let posts = parse_bulk(input).unwrap();
        assert_eq!(posts.len(), 2);
        assert!(bulk_is_valid(input));

        let profile = Profile::default();
        let payloads = with_profile(posts, &profile);
        assert_eq!(payloads[0].username, "gojo_sensei");
        assert_eq!(payloads[1].username, DEFAULT_USERNAME);
        assert_eq!(payloads[1].user_image_url, DEFAULT_AVATAR_URL);
        assert_eq!(
            payloads[1].image_url.as_deref(),
            Some("https://example.test/a.jpg")
        );
        assert_eq!(payloads[1].video_url, None);
    }

    #[test]
    fn empty_array_is_valid_bulk_input() {
        assert!(parse_bulk("[]").unwrap().is_empty());
    }

    #[test]
    fn profile_commit_validates() {
        let draft = ProfileDraft {
            username: "  ".into(),
            avatar_url: "https://example.test/a.jpg".into(),
        };
        assert_eq!(draft.commit(), Err(ProfileError::EmptyUsername));

        let draft = ProfileDraft {
            username: "zoro".into(),
            avatar_url: "nope".into(),
        };
        assert_eq!(draft.commit(), Err(ProfileError::InvalidAvatarUrl));

        let draft = ProfileDraft {
            username: " zoro ".into(),
            avatar_url: " https://example.test/z.jpg ".into(),
        };
        let profile = draft.commit().unwrap();
        assert_eq!(profile.username, "zoro");
        assert_eq!(profile.avatar_url, "https://example.test/z.jpg");
    }
}
