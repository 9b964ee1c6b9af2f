use once_cell::sync::Lazy;
use regex::Regex;

// The recognized YouTube URL shapes: youtu.be/, /v/, /u/<ch>/, /embed/,
// ?v= and &v=. The id is whatever follows up to a #, & or ?.
static YOUTUBE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtu\.be/|/v/|/u/\w/|/embed/|[?&]v=)([^#&?]*)").expect("youtube pattern")
});

static VIMEO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:vimeo\.com/|player\.vimeo\.com/video/)(\d+)").expect("vimeo pattern")
});

static FILE_EXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mp4|webm|ogg)$").expect("file extension pattern"));

/// How a video URL should be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Embed {
    YouTube { id: String },
    Vimeo { id: String },
    File { url: String, mime: String },
    External { url: String },
}

/// Map a video URL to its render strategy. Pure and total: every input
/// lands in exactly one variant, malformed URLs simply fail every
/// pattern and fall through to the external-link fallback.
pub fn classify(url: &str) -> Embed {
    if let Some(id) = youtube_id(url) {
        return Embed::YouTube { id };
    }
    if let Some(id) = vimeo_id(url) {
        return Embed::Vimeo { id };
    }
    if let Some(ext) = file_extension(url) {
        return Embed::File {
            url: url.to_string(),
            mime: format!("video/{ext}"),
        };
    }
    Embed::External {
        url: url.to_string(),
    }
}

impl Embed {
    /// The address a browser should open for this strategy.
    pub fn player_url(&self) -> String {
        match self {
            Embed::YouTube { id } => format!("https://www.youtube.com/embed/{id}"),
            Embed::Vimeo { id } => format!("https://player.vimeo.com/video/{id}"),
            Embed::File { url, .. } => url.clone(),
            Embed::External { url } => url.clone(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Embed::YouTube { .. } => "YouTube",
            Embed::Vimeo { .. } => "Vimeo",
            Embed::File { .. } => "Video file",
            Embed::External { .. } => "External link",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Embed::YouTube { id } => format!("YouTube embed ({id})"),
            Embed::Vimeo { id } => format!("Vimeo embed ({id})"),
            Embed::File { mime, .. } => format!("Direct playback ({mime})"),
            Embed::External { .. } => "No embed support, opens on the original site".to_string(),
        }
    }
}

/// Extract an 11-character YouTube id; anything else falls through.
fn youtube_id(url: &str) -> Option<String> {
    let captures = YOUTUBE_RE.captures(url)?;
    let id = captures.get(1)?.as_str();
    if id.chars().count() == 11 {
        Some(id.to_string())
    } else {
        None
    }
}

fn vimeo_id(url: &str) -> Option<String> {
    let captures = VIMEO_RE.captures(url)?;
    Some(captures.get(1)?.as_str().to_string())
}

fn file_extension(url: &str) -> Option<String> {
    let captures = FILE_EXT_RE.captures(url)?;
    Some(captures.get(1)?.as_str().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_short_youtube_links() {
        assert_eq!(
            classify("https://youtu.be/dQw4w9WgXcQ"),
            Embed::YouTube {
                id: "dQw4w9WgXcQ".into()
            }
        );
    }

    #[test]
    fn recognizes_watch_and_embed_shapes() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
            "https://www.youtube.com/u/w/dQw4w9WgXcQ",
        ] {
            assert_eq!(
                classify(url),
                Embed::YouTube {
                    id: "dQw4w9WgXcQ".into()
                },
                "url: {url}"
            );
        }
    }

    #[test]
    fn id_stops_at_query_and_fragment() {
        assert_eq!(
            classify("https://youtu.be/dQw4w9WgXcQ?t=42"),
            Embed::YouTube {
                id: "dQw4w9WgXcQ".into()
            }
        );
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ#comments"),
            Embed::YouTube {
                id: "dQw4w9WgXcQ".into()
            }
        );
    }

    #[test]
    fn wrong_length_youtube_id_falls_through() {
        // A matching shape whose id is not exactly 11 chars is not an embed.
        assert_eq!(
            classify("https://youtu.be/short"),
            Embed::External {
                url: "https://youtu.be/short".into()
            }
        );
    }

    #[test]
    fn recognizes_vimeo_links() {
        assert_eq!(
            classify("https://vimeo.com/123456789"),
            Embed::Vimeo {
                id: "123456789".into()
            }
        );
        assert_eq!(
            classify("https://player.vimeo.com/video/98765"),
            Embed::Vimeo {
                id: "98765".into()
            }
        );
    }

    #[test]
    fn direct_files_map_to_mime_types() {
        assert_eq!(
            classify("https://cdn.example.test/clip.mp4"),
            Embed::File {
                url: "https://cdn.example.test/clip.mp4".into(),
                mime: "video/mp4".into()
            }
        );
        assert_eq!(
            classify("https://cdn.example.test/clip.WEBM"),
            Embed::File {
                url: "https://cdn.example.test/clip.WEBM".into(),
                mime: "video/webm".into()
            }
        );
        assert_eq!(
            classify("https://cdn.example.test/clip.Ogg"),
            Embed::File {
                url: "https://cdn.example.test/clip.Ogg".into(),
                mime: "video/ogg".into()
            }
        );
    }

    #[test]
    fn extension_must_terminate_the_url() {
        assert_eq!(
            classify("https://cdn.example.test/clip.mp4?sig=abc"),
            Embed::External {
                url: "https://cdn.example.test/clip.mp4?sig=abc".into()
            }
        );
    }

    #[test]
    fn everything_else_falls_back_to_a_link() {
        for url in [
            "https://www.dailymotion.com/video/x7tgad0",
            "not even a url",
            "",
        ] {
            assert_eq!(
                classify(url),
                Embed::External { url: url.into() },
                "url: {url}"
            );
        }
    }

    #[test]
    fn player_urls_match_the_strategy() {
        assert_eq!(
            classify("https://youtu.be/dQw4w9WgXcQ").player_url(),
            "https://www.youtube.com/embed/dQw4w9WgXcQ"
        );
        assert_eq!(
            classify("https://vimeo.com/42").player_url(),
            "https://player.vimeo.com/video/42"
        );
        assert_eq!(
            classify("https://cdn.example.test/clip.mp4").player_url(),
            "https://cdn.example.test/clip.mp4"
        );
    }
}
