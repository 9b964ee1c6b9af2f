use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use unicode_width::UnicodeWidthStr;

use crate::alert::{AlertKind, AlertQueue};
use crate::api::{ApiError, Comment, CommentPayload, NewPost, Post};
use crate::compose::{self, PostDraft, Profile, ProfileDraft};
use crate::embed::{self, Embed};
use crate::feed::{CommentService, EngagementService, FeedStore, PostService};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);
const COLOR_SELECTED_BG: Color = Color::Rgb(69, 71, 90);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const ALERT_WIDTH: u16 = 44;
const FEED_SNIPPET_LEN: usize = 60;

const EMPTY_POST_NOTICE: &str = "Post must contain content, image, or video";
const SAMPLE_BULK_JSON: &str = r#"[
  {
    "username": "gojo_sensei",
    "userImageUrl": "https://randomuser.me/api/portraits/men/10.jpg",
    "content": "gojo epic",
    "imageUrl": null,
    "videoUrl": null
  },
  {
    "username": "luffy_d_joyboy",
    "userImageUrl": "https://randomuser.me/api/portraits/men/20.jpg",
    "content": "one piece luffy yey",
    "imageUrl": null,
    "videoUrl": null
  }
]"#;

struct Spinner {
    index: usize,
}

impl Spinner {
    fn new() -> Self {
        Self { index: 0 }
    }

    fn advance(&mut self) -> bool {
        self.index = (self.index + 1) % SPINNER_FRAMES.len();
        true
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index]
    }

    fn reset(&mut self) {
        self.index = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Feed,
    Detail,
    Comments,
}

impl Pane {
    fn title(self) -> &'static str {
        match self {
            Pane::Feed => "Feed",
            Pane::Detail => "Post",
            Pane::Comments => "Comments",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Feed => Pane::Detail,
            Pane::Detail => Pane::Comments,
            Pane::Comments => Pane::Feed,
        }
    }

    fn previous(self) -> Self {
        match self {
            Pane::Feed => Pane::Comments,
            Pane::Detail => Pane::Feed,
            Pane::Comments => Pane::Detail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ComposerField {
    #[default]
    Content,
    ImageUrl,
    VideoUrl,
    Submit,
}

impl ComposerField {
    fn next(self) -> Self {
        match self {
            ComposerField::Content => ComposerField::ImageUrl,
            ComposerField::ImageUrl => ComposerField::VideoUrl,
            ComposerField::VideoUrl => ComposerField::Submit,
            ComposerField::Submit => ComposerField::Content,
        }
    }

    fn previous(self) -> Self {
        match self {
            ComposerField::Content => ComposerField::Submit,
            ComposerField::ImageUrl => ComposerField::Content,
            ComposerField::VideoUrl => ComposerField::ImageUrl,
            ComposerField::Submit => ComposerField::VideoUrl,
        }
    }

    fn title(self) -> &'static str {
        match self {
            ComposerField::Content => "Content",
            ComposerField::ImageUrl => "Image URL",
            ComposerField::VideoUrl => "Video URL",
            ComposerField::Submit => "Submit",
        }
    }
}

#[derive(Default)]
struct ComposerForm {
    active: ComposerField,
    draft: PostDraft,
    editing: Option<Post>,
    error: Option<String>,
}

impl ComposerForm {
    fn create() -> Self {
        Self::default()
    }

    fn edit(post: Post) -> Self {
        Self {
            active: ComposerField::Content,
            draft: PostDraft::from_post(&post),
            editing: Some(post),
            error: None,
        }
    }

    fn is_edit(&self) -> bool {
        self.editing.is_some()
    }

    fn active_value_mut(&mut self) -> Option<&mut String> {
        match self.active {
            ComposerField::Content => Some(&mut self.draft.content),
            ComposerField::ImageUrl => Some(&mut self.draft.image_url),
            ComposerField::VideoUrl => Some(&mut self.draft.video_url),
            ComposerField::Submit => None,
        }
    }

    fn insert_char(&mut self, ch: char) {
        if let Some(value) = self.active_value_mut() {
            value.push(ch);
        }
        self.error = None;
    }

    fn backspace(&mut self) {
        if let Some(value) = self.active_value_mut() {
            value.pop();
        }
        self.error = None;
    }

    fn clear_active(&mut self) {
        if let Some(value) = self.active_value_mut() {
            value.clear();
        }
        self.error = None;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum BulkField {
    #[default]
    Input,
    Sample,
    Submit,
}

impl BulkField {
    fn next(self) -> Self {
        match self {
            BulkField::Input => BulkField::Sample,
            BulkField::Sample => BulkField::Submit,
            BulkField::Submit => BulkField::Input,
        }
    }

    fn previous(self) -> Self {
        match self {
            BulkField::Input => BulkField::Submit,
            BulkField::Sample => BulkField::Input,
            BulkField::Submit => BulkField::Sample,
        }
    }
}

#[derive(Default)]
struct BulkForm {
    active: BulkField,
    input: String,
    error: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum ProfileField {
    #[default]
    Username,
    AvatarUrl,
    Save,
}

impl ProfileField {
    fn next(self) -> Self {
        match self {
            ProfileField::Username => ProfileField::AvatarUrl,
            ProfileField::AvatarUrl => ProfileField::Save,
            ProfileField::Save => ProfileField::Username,
        }
    }

    fn previous(self) -> Self {
        match self {
            ProfileField::Username => ProfileField::Save,
            ProfileField::AvatarUrl => ProfileField::Username,
            ProfileField::Save => ProfileField::AvatarUrl,
        }
    }

    fn title(self) -> &'static str {
        match self {
            ProfileField::Username => "Username",
            ProfileField::AvatarUrl => "Profile Image URL",
            ProfileField::Save => "Save",
        }
    }
}

struct ProfileForm {
    active: ProfileField,
    draft: ProfileDraft,
    error: Option<String>,
}

impl ProfileForm {
    fn new(profile: &Profile) -> Self {
        Self {
            active: ProfileField::Username,
            draft: ProfileDraft::from_profile(profile),
            error: None,
        }
    }

    fn active_value_mut(&mut self) -> Option<&mut String> {
        match self.active {
            ProfileField::Username => Some(&mut self.draft.username),
            ProfileField::AvatarUrl => Some(&mut self.draft.avatar_url),
            ProfileField::Save => None,
        }
    }
}

struct CommentForm {
    post_id: i64,
    comment_id: Option<i64>,
    input: String,
}

struct MediaImage {
    title: Option<String>,
    url: String,
}

struct MediaVideo {
    title: Option<String>,
    url: String,
    embed: Embed,
}

struct MediaPopup {
    image: Option<MediaImage>,
    video: Option<MediaVideo>,
}

enum Overlay {
    Composer(ComposerForm),
    Bulk(BulkForm),
    Profile(ProfileForm),
    Comment(CommentForm),
    ConfirmDeletePost { post_id: i64 },
    ConfirmDeleteComment { post_id: i64, comment_id: i64 },
    Media(MediaPopup),
}

enum AsyncResponse {
    Posts {
        result: Result<Vec<Post>>,
    },
    Created {
        result: Result<Post>,
    },
    BulkCreated {
        result: Result<Vec<Post>>,
    },
    Updated {
        result: Result<Post>,
    },
    Deleted {
        id: i64,
        result: Result<()>,
    },
    Liked {
        id: i64,
        result: Result<Post>,
    },
    Shared {
        id: i64,
        result: Result<Post>,
    },
    CommentAdded {
        post_id: i64,
        result: Result<Post>,
    },
    CommentUpdated {
        post_id: i64,
        result: Result<Comment>,
    },
    CommentDeleted {
        post_id: i64,
        comment_id: i64,
        result: Result<()>,
    },
    CommentLiked {
        post_id: i64,
        comment_id: i64,
        result: Result<i64>,
    },
}

#[derive(Clone)]
pub struct Options {
    pub status_message: String,
    pub posts: Vec<Post>,
    pub post_service: Arc<dyn PostService>,
    pub comment_service: Arc<dyn CommentService>,
    pub engagement_service: Arc<dyn EngagementService>,
    pub profile: Profile,
    pub alert_ttl: Duration,
    pub theme: String,
    pub config_path: String,
    pub fetch_on_start: bool,
}

pub struct Model {
    store: FeedStore,
    alerts: AlertQueue,
    profile: Profile,
    status_message: String,
    focused_pane: Pane,
    selected_post: usize,
    selected_comment: usize,
    feed_state: ListState,
    comment_state: ListState,
    overlay: Option<Overlay>,
    empty_notice: bool,
    post_service: Arc<dyn PostService>,
    comment_service: Arc<dyn CommentService>,
    engagement_service: Arc<dyn EngagementService>,
    plain_theme: bool,
    config_path: String,
    spinner: Spinner,
    pending_requests: usize,
    needs_redraw: bool,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let mut store = FeedStore::new();
        store.replace_all(opts.posts);

        let mut model = Self {
            store,
            alerts: AlertQueue::new(opts.alert_ttl),
            profile: opts.profile,
            status_message: opts.status_message,
            focused_pane: Pane::Feed,
            selected_post: 0,
            selected_comment: 0,
            feed_state: ListState::default(),
            comment_state: ListState::default(),
            overlay: None,
            empty_notice: false,
            post_service: opts.post_service,
            comment_service: opts.comment_service,
            engagement_service: opts.engagement_service,
            plain_theme: opts.theme.eq_ignore_ascii_case("plain"),
            config_path: opts.config_path,
            spinner: Spinner::new(),
            pending_requests: 0,
            needs_redraw: true,
            response_tx,
            response_rx,
        };

        if opts.fetch_on_start {
            model.refresh_posts();
        }

        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.alerts.prune(Instant::now()) {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key)? {
                        break;
                    }
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() && self.spinner.advance() {
                    self.mark_dirty();
                } else if !self.is_loading() {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.pending_requests > 0
    }

    fn poll_async(&mut self) -> bool {
        let mut handled = false;
        loop {
            match self.response_rx.try_recv() {
                Ok(message) => {
                    self.handle_async_response(message);
                    handled = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        handled
    }

    fn current_post(&self) -> Option<&Post> {
        self.store.posts().get(self.selected_post)
    }

    fn current_comment(&self) -> Option<&Comment> {
        self.current_post()
            .and_then(|post| post.comments.get(self.selected_comment))
    }

    fn clamp_selection(&mut self) {
        if self.store.is_empty() {
            self.selected_post = 0;
        } else if self.selected_post >= self.store.len() {
            self.selected_post = self.store.len() - 1;
        }
        let comment_count = self.current_post().map(|p| p.comments.len()).unwrap_or(0);
        if comment_count == 0 {
            self.selected_comment = 0;
        } else if self.selected_comment >= comment_count {
            self.selected_comment = comment_count - 1;
        }
    }

    // === key handling =====================================================

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.empty_notice {
            self.empty_notice = false;
            self.mark_dirty();
            return Ok(false);
        }

        if self.overlay.is_some() {
            self.handle_overlay_key(key);
            self.mark_dirty();
            return Ok(false);
        }

        let mut dirty = true;
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('r') => self.refresh_posts(),
            KeyCode::Char('h') | KeyCode::Left => {
                self.focused_pane = self.focused_pane.previous();
                self.status_message = format!("{} pane.", self.focused_pane.title());
            }
            KeyCode::Char('l') | KeyCode::Right => {
                self.focused_pane = self.focused_pane.next();
                self.status_message = format!("{} pane.", self.focused_pane.title());
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Enter => {
                if self.focused_pane == Pane::Feed && !self.store.is_empty() {
                    self.focused_pane = Pane::Comments;
                    self.selected_comment = 0;
                    self.status_message = "Comments pane.".to_string();
                }
            }
            KeyCode::Char('n') => {
                self.overlay = Some(Overlay::Composer(ComposerForm::create()));
            }
            KeyCode::Char('e') => {
                if self.focused_pane == Pane::Comments {
                    self.open_comment_editor();
                } else {
                    self.open_post_editor();
                }
            }
            KeyCode::Char('d') => {
                if self.focused_pane == Pane::Comments {
                    self.confirm_comment_delete();
                } else if let Some(post) = self.current_post() {
                    self.overlay = Some(Overlay::ConfirmDeletePost { post_id: post.id });
                }
            }
            KeyCode::Char('L') => {
                if self.focused_pane == Pane::Comments {
                    self.like_current_comment();
                } else if let Some(post) = self.current_post() {
                    let id = post.id;
                    self.submit_like(id);
                }
            }
            KeyCode::Char('s') => {
                if let Some(post) = self.current_post() {
                    let id = post.id;
                    self.submit_share(id);
                }
            }
            KeyCode::Char('c') => {
                if let Some(post) = self.current_post() {
                    self.overlay = Some(Overlay::Comment(CommentForm {
                        post_id: post.id,
                        comment_id: None,
                        input: String::new(),
                    }));
                }
            }
            KeyCode::Char('b') => {
                self.overlay = Some(Overlay::Bulk(BulkForm::default()));
            }
            KeyCode::Char('u') => {
                self.overlay = Some(Overlay::Profile(ProfileForm::new(&self.profile)));
            }
            KeyCode::Char('m') => self.open_media_popup(),
            KeyCode::Char('x') => {
                if !self.alerts.dismiss_latest() {
                    self.status_message = "No alerts to dismiss.".to_string();
                }
            }
            _ => dirty = false,
        }

        if dirty {
            self.mark_dirty();
        }
        Ok(false)
    }

    fn move_selection(&mut self, delta: i64) {
        match self.focused_pane {
            Pane::Feed | Pane::Detail => {
                let len = self.store.len();
                if len == 0 {
                    return;
                }
                let next = self.selected_post as i64 + delta;
                self.selected_post = next.clamp(0, len as i64 - 1) as usize;
                self.selected_comment = 0;
            }
            Pane::Comments => {
                let len = self.current_post().map(|p| p.comments.len()).unwrap_or(0);
                if len == 0 {
                    return;
                }
                let next = self.selected_comment as i64 + delta;
                self.selected_comment = next.clamp(0, len as i64 - 1) as usize;
            }
        }
    }

    fn open_post_editor(&mut self) {
        if let Some(post) = self.current_post() {
            self.overlay = Some(Overlay::Composer(ComposerForm::edit(post.clone())));
        }
    }

    fn open_comment_editor(&mut self) {
        let Some(post) = self.current_post() else {
            return;
        };
        let post_id = post.id;
        let Some(comment) = self.current_comment() else {
            return;
        };
        if comment.username != self.profile.username {
            self.status_message = "You can only edit your own comments.".to_string();
            return;
        }
        self.overlay = Some(Overlay::Comment(CommentForm {
            post_id,
            comment_id: Some(comment.id),
            input: comment.content.clone(),
        }));
    }

    fn confirm_comment_delete(&mut self) {
        let Some(post) = self.current_post() else {
            return;
        };
        let post_id = post.id;
        let Some(comment) = self.current_comment() else {
            return;
        };
        if comment.username != self.profile.username {
            self.status_message = "You can only delete your own comments.".to_string();
            return;
        }
        self.overlay = Some(Overlay::ConfirmDeleteComment {
            post_id,
            comment_id: comment.id,
        });
    }

    fn like_current_comment(&mut self) {
        let Some(post) = self.current_post() else {
            return;
        };
        let post_id = post.id;
        let Some(comment) = self.current_comment() else {
            return;
        };
        let comment_id = comment.id;
        self.submit_comment_like(post_id, comment_id);
    }

    fn open_media_popup(&mut self) {
        let Some(post) = self.current_post() else {
            return;
        };
        let image = post.image_url.as_ref().map(|url| MediaImage {
            title: post.image_title.clone(),
            url: url.clone(),
        });
        let video = post.video_url.as_ref().map(|url| MediaVideo {
            title: post.video_title.clone(),
            url: url.clone(),
            embed: embed::classify(url),
        });
        if image.is_none() && video.is_none() {
            self.status_message = "No media attached to this post.".to_string();
            return;
        }
        self.overlay = Some(Overlay::Media(MediaPopup { image, video }));
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) {
        let Some(overlay) = self.overlay.take() else {
            return;
        };

        match overlay {
            Overlay::Composer(form) => self.handle_composer_key(form, key),
            Overlay::Bulk(form) => self.handle_bulk_key(form, key),
            Overlay::Profile(form) => self.handle_profile_key(form, key),
            Overlay::Comment(form) => self.handle_comment_key(form, key),
            Overlay::ConfirmDeletePost { post_id } => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.submit_delete(post_id),
                KeyCode::Char('n') | KeyCode::Esc => {}
                _ => self.overlay = Some(Overlay::ConfirmDeletePost { post_id }),
            },
            Overlay::ConfirmDeleteComment {
                post_id,
                comment_id,
            } => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.submit_comment_delete(post_id, comment_id)
                }
                KeyCode::Char('n') | KeyCode::Esc => {}
                _ => {
                    self.overlay = Some(Overlay::ConfirmDeleteComment {
                        post_id,
                        comment_id,
                    })
                }
            },
            Overlay::Media(popup) => match key.code {
                KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('m') => {}
                KeyCode::Enter | KeyCode::Char('o') => {
                    let target = popup
                        .video
                        .as_ref()
                        .map(|video| video.embed.player_url())
                        .or_else(|| popup.image.as_ref().map(|image| image.url.clone()));
                    if let Some(url) = target {
                        if webbrowser::open(&url).is_err() {
                            self.status_message = format!("Unable to open {url}");
                        } else {
                            self.status_message = "Opened media in browser.".to_string();
                        }
                    }
                    self.overlay = Some(Overlay::Media(popup));
                }
                _ => self.overlay = Some(Overlay::Media(popup)),
            },
        }
    }

    fn handle_composer_key(&mut self, mut form: ComposerForm, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('u') {
            form.clear_active();
            self.overlay = Some(Overlay::Composer(form));
            return;
        }

        match key.code {
            KeyCode::Esc => {}
            KeyCode::Tab | KeyCode::Down => {
                form.active = form.active.next();
                self.overlay = Some(Overlay::Composer(form));
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.active = form.active.previous();
                self.overlay = Some(Overlay::Composer(form));
            }
            KeyCode::Backspace => {
                form.backspace();
                self.overlay = Some(Overlay::Composer(form));
            }
            KeyCode::Enter => {
                if form.active == ComposerField::Content {
                    form.insert_char('\n');
                    self.overlay = Some(Overlay::Composer(form));
                } else {
                    self.submit_composer(form);
                }
            }
            KeyCode::Char(ch) => {
                form.insert_char(ch);
                self.overlay = Some(Overlay::Composer(form));
            }
            _ => self.overlay = Some(Overlay::Composer(form)),
        }
    }

    fn submit_composer(&mut self, mut form: ComposerForm) {
        if let Some(original) = form.editing.clone() {
            if let Err(err) = form.draft.validate_edit() {
                form.error = Some(err.to_string());
                self.overlay = Some(Overlay::Composer(form));
                return;
            }
            let payload = form.draft.apply_to(&original);
            // The form stays open until the server acknowledges.
            self.overlay = Some(Overlay::Composer(form));
            self.submit_update(payload);
            return;
        }

        match form.draft.validate_create() {
            Err(compose::ValidationError::Empty) => {
                // Blocking notice; the draft is kept underneath.
                self.empty_notice = true;
                self.overlay = Some(Overlay::Composer(form));
            }
            Err(err) => {
                form.error = Some(err.to_string());
                self.overlay = Some(Overlay::Composer(form));
            }
            Ok(()) => {
                let payload = form.draft.new_post(&self.profile);
                self.overlay = Some(Overlay::Composer(form));
                self.submit_create(payload);
            }
        }
    }

    fn handle_bulk_key(&mut self, mut form: BulkForm, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('u') {
            form.input.clear();
            form.error = None;
            self.overlay = Some(Overlay::Bulk(form));
            return;
        }

        match key.code {
            KeyCode::Esc => {}
            KeyCode::Tab | KeyCode::Down => {
                form.active = form.active.next();
                self.overlay = Some(Overlay::Bulk(form));
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.active = form.active.previous();
                self.overlay = Some(Overlay::Bulk(form));
            }
            KeyCode::Backspace => {
                if form.active == BulkField::Input {
                    form.input.pop();
                    form.error = None;
                }
                self.overlay = Some(Overlay::Bulk(form));
            }
            KeyCode::Enter => match form.active {
                BulkField::Input => {
                    form.input.push('\n');
                    self.overlay = Some(Overlay::Bulk(form));
                }
                BulkField::Sample => {
                    form.input = SAMPLE_BULK_JSON.to_string();
                    form.error = None;
                    self.overlay = Some(Overlay::Bulk(form));
                }
                BulkField::Submit => self.submit_bulk_form(form),
            },
            KeyCode::Char(ch) => {
                if form.active == BulkField::Input {
                    form.input.push(ch);
                    form.error = None;
                }
                self.overlay = Some(Overlay::Bulk(form));
            }
            _ => self.overlay = Some(Overlay::Bulk(form)),
        }
    }

    fn submit_bulk_form(&mut self, mut form: BulkForm) {
        match compose::parse_bulk(&form.input) {
            Err(err) => {
                // Parse failures never reach the network.
                form.error = Some(err.to_string());
                self.overlay = Some(Overlay::Bulk(form));
            }
            Ok(posts) => {
                let payloads = compose::with_profile(posts, &self.profile);
                self.overlay = Some(Overlay::Bulk(form));
                self.submit_bulk(payloads);
            }
        }
    }

    fn handle_profile_key(&mut self, mut form: ProfileForm, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('u') {
            if let Some(value) = form.active_value_mut() {
                value.clear();
            }
            form.error = None;
            self.overlay = Some(Overlay::Profile(form));
            return;
        }

        match key.code {
            KeyCode::Esc => {}
            KeyCode::Tab | KeyCode::Down => {
                form.active = form.active.next();
                self.overlay = Some(Overlay::Profile(form));
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.active = form.active.previous();
                self.overlay = Some(Overlay::Profile(form));
            }
            KeyCode::Backspace => {
                if let Some(value) = form.active_value_mut() {
                    value.pop();
                }
                form.error = None;
                self.overlay = Some(Overlay::Profile(form));
            }
            KeyCode::Enter => match form.draft.commit() {
                Ok(profile) => {
                    // Identity is client-local; no round-trip happens here.
                    self.profile = profile;
                    self.alerts.success("Profile updated!");
                }
                Err(err) => {
                    form.error = Some(err.to_string());
                    self.overlay = Some(Overlay::Profile(form));
                }
            },
            KeyCode::Char(ch) => {
                if let Some(value) = form.active_value_mut() {
                    value.push(ch);
                }
                form.error = None;
                self.overlay = Some(Overlay::Profile(form));
            }
            _ => self.overlay = Some(Overlay::Profile(form)),
        }
    }

    fn handle_comment_key(&mut self, mut form: CommentForm, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('u') {
            form.input.clear();
            self.overlay = Some(Overlay::Comment(form));
            return;
        }

        match key.code {
            KeyCode::Esc => {}
            KeyCode::Backspace => {
                form.input.pop();
                self.overlay = Some(Overlay::Comment(form));
            }
            KeyCode::Enter => {
                if form.input.trim().is_empty() {
                    self.status_message = "Comment text is required.".to_string();
                    self.overlay = Some(Overlay::Comment(form));
                    return;
                }
                match form.comment_id {
                    Some(comment_id) => {
                        let content = form.input.trim().to_string();
                        let post_id = form.post_id;
                        self.overlay = Some(Overlay::Comment(form));
                        self.submit_comment_update(post_id, comment_id, content);
                    }
                    None => {
                        let payload = self.profile.comment_payload(&form.input);
                        let post_id = form.post_id;
                        self.overlay = Some(Overlay::Comment(form));
                        self.submit_comment_add(post_id, payload);
                    }
                }
            }
            KeyCode::Char(ch) => {
                form.input.push(ch);
                self.overlay = Some(Overlay::Comment(form));
            }
            _ => self.overlay = Some(Overlay::Comment(form)),
        }
    }

    // === remote operations ================================================

    fn begin_request<S: Into<String>>(&mut self, status: S) {
        self.pending_requests += 1;
        self.status_message = status.into();
        self.mark_dirty();
    }

    fn request_done(&mut self) {
        self.pending_requests = self.pending_requests.saturating_sub(1);
    }

    fn refresh_posts(&mut self) {
        let service = Arc::clone(&self.post_service);
        let tx = self.response_tx.clone();
        self.begin_request("Loading posts…");
        thread::spawn(move || {
            let result = service.list();
            let _ = tx.send(AsyncResponse::Posts { result });
        });
    }

    fn submit_create(&mut self, payload: NewPost) {
        let service = Arc::clone(&self.post_service);
        let tx = self.response_tx.clone();
        self.begin_request("Posting…");
        thread::spawn(move || {
            let result = service.create(payload);
            let _ = tx.send(AsyncResponse::Created { result });
        });
    }

    fn submit_bulk(&mut self, payloads: Vec<NewPost>) {
        let service = Arc::clone(&self.post_service);
        let tx = self.response_tx.clone();
        self.begin_request(format!("Uploading {} posts…", payloads.len()));
        thread::spawn(move || {
            let result = service.bulk_create(payloads);
            let _ = tx.send(AsyncResponse::BulkCreated { result });
        });
    }

    fn submit_update(&mut self, post: Post) {
        let service = Arc::clone(&self.post_service);
        let tx = self.response_tx.clone();
        self.begin_request("Saving changes…");
        thread::spawn(move || {
            let result = service.update(post);
            let _ = tx.send(AsyncResponse::Updated { result });
        });
    }

    fn submit_delete(&mut self, id: i64) {
        let service = Arc::clone(&self.post_service);
        let tx = self.response_tx.clone();
        self.begin_request("Deleting post…");
        thread::spawn(move || {
            let result = service.delete(id);
            let _ = tx.send(AsyncResponse::Deleted { id, result });
        });
    }

    fn submit_like(&mut self, id: i64) {
        let service = Arc::clone(&self.engagement_service);
        let tx = self.response_tx.clone();
        self.begin_request("Liking post…");
        thread::spawn(move || {
            let result = service.like(id);
            let _ = tx.send(AsyncResponse::Liked { id, result });
        });
    }

    fn submit_share(&mut self, id: i64) {
        let service = Arc::clone(&self.engagement_service);
        let tx = self.response_tx.clone();
        self.begin_request("Sharing post…");
        thread::spawn(move || {
            let result = service.share(id);
            let _ = tx.send(AsyncResponse::Shared { id, result });
        });
    }

    fn submit_comment_add(&mut self, post_id: i64, payload: CommentPayload) {
        let service = Arc::clone(&self.comment_service);
        let tx = self.response_tx.clone();
        self.begin_request("Posting comment…");
        thread::spawn(move || {
            let result = service.add(post_id, payload);
            let _ = tx.send(AsyncResponse::CommentAdded { post_id, result });
        });
    }

    fn submit_comment_update(&mut self, post_id: i64, comment_id: i64, content: String) {
        let service = Arc::clone(&self.comment_service);
        let tx = self.response_tx.clone();
        self.begin_request("Saving comment…");
        thread::spawn(move || {
            let result = service.update(post_id, comment_id, &content);
            let _ = tx.send(AsyncResponse::CommentUpdated { post_id, result });
        });
    }

    fn submit_comment_delete(&mut self, post_id: i64, comment_id: i64) {
        let service = Arc::clone(&self.comment_service);
        let tx = self.response_tx.clone();
        self.begin_request("Deleting comment…");
        thread::spawn(move || {
            let result = service.delete(post_id, comment_id);
            let _ = tx.send(AsyncResponse::CommentDeleted {
                post_id,
                comment_id,
                result,
            });
        });
    }

    fn submit_comment_like(&mut self, post_id: i64, comment_id: i64) {
        let service = Arc::clone(&self.engagement_service);
        let tx = self.response_tx.clone();
        self.begin_request("Liking comment…");
        thread::spawn(move || {
            let result = service.like_comment(post_id, comment_id);
            let _ = tx.send(AsyncResponse::CommentLiked {
                post_id,
                comment_id,
                result,
            });
        });
    }

    // === reconciliation ===================================================

    fn handle_async_response(&mut self, message: AsyncResponse) {
        self.request_done();
        match message {
            AsyncResponse::Posts { result } => match result {
                Ok(posts) => {
                    self.store.replace_all(posts);
                    self.clamp_selection();
                    self.status_message = format!("Loaded {} posts.", self.store.len());
                }
                Err(_) => {
                    // Prior state stays; no retry.
                    self.alerts
                        .error("Failed to fetch posts. Please try again later.");
                    self.status_message = "Failed to load posts.".to_string();
                }
            },
            AsyncResponse::Created { result } => match result {
                Ok(post) => {
                    self.store.prepend(post);
                    self.selected_post = 0;
                    self.selected_comment = 0;
                    self.alerts.success("Post created successfully!");
                    self.status_message = "Post created.".to_string();
                    self.close_composer(false);
                }
                Err(err) => {
                    self.alerts.error(create_error_message(&err));
                    self.status_message = "Create failed.".to_string();
                }
            },
            AsyncResponse::BulkCreated { result } => match result {
                Ok(posts) => {
                    let count = self.store.prepend_many(posts);
                    self.selected_post = 0;
                    self.selected_comment = 0;
                    self.alerts
                        .success(format!("{count} posts created successfully!"));
                    self.status_message = format!("Created {count} posts.");
                    self.clear_bulk_input();
                }
                Err(_) => {
                    self.alerts.error("Failed to create posts");
                    self.status_message = "Bulk upload failed.".to_string();
                }
            },
            AsyncResponse::Updated { result } => match result {
                Ok(post) => {
                    self.store.replace(post);
                    self.alerts.success("Post updated successfully!");
                    self.status_message = "Post updated.".to_string();
                    self.close_composer(true);
                }
                Err(_) => {
                    self.alerts.error("Failed to update post");
                    self.status_message = "Update failed.".to_string();
                }
            },
            AsyncResponse::Deleted { id, result } => match result {
                Ok(()) => {
                    self.store.remove(id);
                    self.clamp_selection();
                    self.alerts.success("Post deleted successfully!");
                    self.status_message = "Post deleted.".to_string();
                }
                Err(_) => {
                    self.alerts.error("Failed to delete post");
                    self.status_message = "Delete failed.".to_string();
                }
            },
            AsyncResponse::Liked { id, result } => match result {
                Ok(post) => {
                    // Counts come only from the server; the whole post swaps in.
                    self.store.replace(post);
                    self.status_message = format!("Liked post {id}.");
                }
                Err(_) => {
                    self.alerts.error("Failed to like post");
                    self.status_message = "Like failed.".to_string();
                }
            },
            AsyncResponse::Shared { id, result } => match result {
                Ok(post) => {
                    self.store.replace(post);
                    self.alerts.success("Post shared!");
                    self.status_message = format!("Shared post {id}.");
                }
                Err(_) => {
                    self.alerts.error("Failed to share post");
                    self.status_message = "Share failed.".to_string();
                }
            },
            AsyncResponse::CommentAdded { post_id, result } => match result {
                Ok(post) => {
                    // The response is the full post with comments included.
                    self.store.replace(post);
                    self.alerts.success("Comment added successfully!");
                    self.status_message = "Comment added.".to_string();
                    self.close_comment_form(post_id, None);
                }
                Err(_) => {
                    self.alerts.error("Failed to add comment");
                    self.status_message = "Comment failed.".to_string();
                }
            },
            AsyncResponse::CommentUpdated { post_id, result } => match result {
                Ok(comment) => {
                    let comment_id = comment.id;
                    self.store.replace_comment(post_id, comment);
                    self.alerts.success("Comment updated successfully!");
                    self.status_message = "Comment updated.".to_string();
                    self.close_comment_form(post_id, Some(comment_id));
                }
                Err(_) => {
                    self.alerts.error("Failed to update comment");
                    self.status_message = "Comment update failed.".to_string();
                }
            },
            AsyncResponse::CommentDeleted {
                post_id,
                comment_id,
                result,
            } => match result {
                Ok(()) => {
                    self.store.remove_comment(post_id, comment_id);
                    self.clamp_selection();
                    self.alerts.success("Comment deleted successfully!");
                    self.status_message = "Comment deleted.".to_string();
                }
                Err(_) => {
                    self.alerts.error("Failed to delete comment");
                    self.status_message = "Comment delete failed.".to_string();
                }
            },
            AsyncResponse::CommentLiked {
                post_id,
                comment_id,
                result,
            } => match result {
                Ok(like_count) => {
                    self.store
                        .patch_comment_likes(post_id, comment_id, like_count);
                    self.status_message = "Liked comment.".to_string();
                }
                Err(_) => {
                    self.alerts.error("Failed to like comment");
                    self.status_message = "Comment like failed.".to_string();
                }
            },
        }
        self.mark_dirty();
    }

    fn close_composer(&mut self, edited: bool) {
        if let Some(Overlay::Composer(form)) = &self.overlay {
            if form.is_edit() == edited {
                self.overlay = None;
            }
        }
    }

    fn close_comment_form(&mut self, post_id: i64, comment_id: Option<i64>) {
        if let Some(Overlay::Comment(form)) = &self.overlay {
            if form.post_id == post_id && form.comment_id == comment_id {
                self.overlay = None;
            }
        }
    }

    fn clear_bulk_input(&mut self) {
        if let Some(Overlay::Bulk(form)) = self.overlay.as_mut() {
            form.input.clear();
            form.error = None;
        }
    }

    // === rendering ========================================================

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        if !self.plain_theme {
            frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);
        }

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(28),
                Constraint::Percentage(42),
                Constraint::Percentage(30),
            ])
            .split(layout[1]);

        self.draw_feed(frame, panes[0]);
        self.draw_detail(frame, panes[1]);
        self.draw_comments(frame, panes[2]);

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);

        match &self.overlay {
            Some(Overlay::Composer(form)) => self.draw_composer(frame, layout[1], form),
            Some(Overlay::Bulk(form)) => self.draw_bulk(frame, layout[1], form),
            Some(Overlay::Profile(form)) => self.draw_profile(frame, layout[1], form),
            Some(Overlay::Comment(form)) => self.draw_comment_form(frame, layout[1], form),
            Some(Overlay::ConfirmDeletePost { .. }) => self.draw_confirm(
                frame,
                layout[1],
                "Are you sure you want to delete this post?",
            ),
            Some(Overlay::ConfirmDeleteComment { .. }) => self.draw_confirm(
                frame,
                layout[1],
                "Are you sure you want to delete this comment?",
            ),
            Some(Overlay::Media(popup)) => self.draw_media(frame, layout[1], popup),
            None => {}
        }

        if self.empty_notice {
            self.draw_empty_notice(frame, layout[1]);
        }

        self.draw_alerts(frame, full);
    }

    fn pane_block(&self, pane: Pane) -> Block<'static> {
        let focused = self.focused_pane == pane;
        let border = if focused {
            COLOR_BORDER_FOCUSED
        } else {
            COLOR_BORDER_IDLE
        };
        let mut block = Block::default()
            .title(Span::styled(
                pane.title(),
                Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border));
        if !self.plain_theme {
            block = block.style(Style::default().bg(COLOR_PANEL_BG));
        }
        block
    }

    fn draw_feed(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Feed);
        let mut items: Vec<ListItem> = Vec::with_capacity(self.store.len());

        if self.store.is_empty() {
            items.push(ListItem::new(Line::from(Span::styled(
                "No posts yet. Press n to write one, r to refresh.",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            ))));
        }

        for post in self.store.posts() {
            let meta = format!(
                "{} · {} likes · {} shares · {} comments",
                post.username,
                post.like_count,
                post.share_count,
                post.comments.len()
            );
            let body = feed_snippet(post);
            let lines = vec![
                Line::from(Span::styled(
                    meta,
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    body,
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )),
            ];
            items.push(ListItem::new(lines));
        }

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_SELECTED_BG)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        if self.store.is_empty() {
            self.feed_state.select(None);
        } else {
            self.feed_state.select(Some(self.selected_post));
        }
        frame.render_stateful_widget(list, area, &mut self.feed_state);
    }

    fn draw_detail(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Detail);
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;

        let mut lines: Vec<Line> = Vec::new();
        if let Some(post) = self.current_post() {
            lines.push(Line::from(Span::styled(
                post.username.clone(),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::default());

            if let Some(content) = post.content.as_deref() {
                for wrapped in textwrap::wrap(content, width) {
                    lines.push(Line::from(Span::styled(
                        wrapped.into_owned(),
                        Style::default().fg(COLOR_TEXT_PRIMARY),
                    )));
                }
                lines.push(Line::default());
            }

            if let Some(image_url) = post.image_url.as_deref() {
                let label = match post.image_title.as_deref() {
                    Some(title) => format!("Image: {title}"),
                    None => "Image".to_string(),
                };
                lines.push(Line::from(Span::styled(
                    label,
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(Span::styled(
                    image_url.to_string(),
                    Style::default().fg(COLOR_ACCENT),
                )));
                lines.push(Line::default());
            }

            if let Some(video_url) = post.video_url.as_deref() {
                let label = match post.video_title.as_deref() {
                    Some(title) => format!("Video: {title}"),
                    None => "Video".to_string(),
                };
                lines.push(Line::from(Span::styled(
                    label,
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(Span::styled(
                    video_url.to_string(),
                    Style::default().fg(COLOR_ACCENT),
                )));
                let verdict = embed::classify(video_url);
                lines.push(Line::from(Span::styled(
                    format!("  → {}", verdict.describe()),
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )));
                lines.push(Line::default());
            }

            lines.push(Line::from(Span::styled(
                format!(
                    "{} likes · {} shares · {} comments",
                    post.like_count,
                    post.share_count,
                    post.comments.len()
                ),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));

            if post.image_url.is_some() || post.video_url.is_some() {
                lines.push(Line::default());
                lines.push(Line::from(Span::styled(
                    "Press m to open the media viewer.",
                    Style::default()
                        .fg(COLOR_TEXT_SECONDARY)
                        .add_modifier(Modifier::ITALIC),
                )));
            }
        } else {
            lines.push(Line::from(Span::styled(
                "Select a post to see its details.",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_comments(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let block = self.pane_block(Pane::Comments);
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;

        let mut items: Vec<ListItem> = Vec::new();
        let comment_count = match self.current_post() {
            Some(post) if !post.comments.is_empty() => {
                for comment in &post.comments {
                    let own = comment.username == self.profile.username;
                    let mut meta = format!("{} · {} likes", comment.username, comment.like_count);
                    if own {
                        meta.push_str(" · yours");
                    }
                    let mut lines = vec![Line::from(Span::styled(
                        meta,
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ))];
                    for wrapped in textwrap::wrap(&comment.content, width.saturating_sub(2).max(1))
                    {
                        lines.push(Line::from(Span::styled(
                            format!("  {wrapped}"),
                            Style::default().fg(COLOR_TEXT_PRIMARY),
                        )));
                    }
                    items.push(ListItem::new(lines));
                }
                post.comments.len()
            }
            Some(_) => {
                items.push(ListItem::new(Line::from(Span::styled(
                    "No comments yet. Press c to write one.",
                    Style::default()
                        .fg(COLOR_TEXT_SECONDARY)
                        .add_modifier(Modifier::ITALIC),
                ))));
                0
            }
            None => {
                items.push(ListItem::new(Line::from(Span::styled(
                    "Select a post to load comments.",
                    Style::default()
                        .fg(COLOR_TEXT_SECONDARY)
                        .add_modifier(Modifier::ITALIC),
                ))));
                0
            }
        };

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_SELECTED_BG)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");

        if comment_count == 0 {
            self.comment_state.select(None);
        } else {
            self.comment_state
                .select(Some(self.selected_comment.min(comment_count - 1)));
        }
        frame.render_stateful_widget(list, area, &mut self.comment_state);
    }

    fn field_line(active: bool, label: &str, value: &str) -> Line<'static> {
        let indicator_style = if active {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        let value_style = if active {
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        Line::from(vec![
            Span::styled(if active { "> " } else { "  " }.to_string(), indicator_style),
            Span::styled(format!("{label}: "), indicator_style),
            Span::styled(value.to_string(), value_style),
        ])
    }

    fn button_line(active: bool, label: &str) -> Line<'static> {
        let style = if active {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::BOLD)
        };
        Line::from(vec![
            Span::raw(if active { "> " } else { "  " }.to_string()),
            Span::styled(format!("[ {label} ]"), style),
        ])
    }

    fn popup_block(title: &str) -> Block<'static> {
        Block::default()
            .title(Span::styled(
                title.to_string(),
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_ACCENT))
            .style(Style::default().bg(COLOR_PANEL_BG))
    }

    fn draw_composer(&self, frame: &mut Frame<'_>, area: Rect, form: &ComposerForm) {
        let popup = centered_rect(62, 62, area);
        frame.render_widget(Clear, popup);

        let title = if form.is_edit() { "Edit Post" } else { "New Post" };
        let mut lines = Vec::new();
        lines.push(Self::field_line(
            form.active == ComposerField::Content,
            ComposerField::Content.title(),
            &form.draft.content.replace('\n', "⏎"),
        ));
        lines.push(Self::field_line(
            form.active == ComposerField::ImageUrl,
            ComposerField::ImageUrl.title(),
            &form.draft.image_url,
        ));
        lines.push(Self::field_line(
            form.active == ComposerField::VideoUrl,
            ComposerField::VideoUrl.title(),
            &form.draft.video_url,
        ));
        lines.push(Line::default());
        lines.push(Self::button_line(
            form.active == ComposerField::Submit,
            if form.is_edit() { "Save Changes" } else { "Post" },
        ));

        if let Some(error) = &form.error {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
            )));
        }

        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Tab next field · Enter submit · Ctrl-U clear · Esc cancel",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        )));

        let paragraph = Paragraph::new(lines)
            .block(Self::popup_block(title))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup);
    }

    fn draw_bulk(&self, frame: &mut Frame<'_>, area: Rect, form: &BulkForm) {
        let popup = centered_rect(72, 72, area);
        frame.render_widget(Clear, popup);

        let mut lines = Vec::new();
        lines.push(Line::from(Span::styled(
            "Paste a JSON array of posts:",
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));
        if form.input.is_empty() {
            lines.push(Line::from(Span::styled(
                "(empty — Load Sample shows the expected shape)",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )));
        } else {
            for raw in form.input.lines() {
                lines.push(Line::from(Span::styled(
                    raw.to_string(),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )));
            }
        }
        lines.push(Line::default());

        if !form.input.is_empty() && !compose::bulk_is_valid(&form.input) {
            lines.push(Line::from(Span::styled(
                "Invalid JSON format",
                Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
            )));
        }
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
            )));
        }

        lines.push(Self::button_line(form.active == BulkField::Sample, "Load Sample"));
        lines.push(Self::button_line(form.active == BulkField::Submit, "Upload Posts"));
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Tab cycles · Enter activates · Ctrl-U clears · Esc cancels",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        )));

        let paragraph = Paragraph::new(lines)
            .block(Self::popup_block("Bulk Create Posts"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup);
    }

    fn draw_profile(&self, frame: &mut Frame<'_>, area: Rect, form: &ProfileForm) {
        let popup = centered_rect(56, 42, area);
        frame.render_widget(Clear, popup);

        let mut lines = Vec::new();
        lines.push(Self::field_line(
            form.active == ProfileField::Username,
            ProfileField::Username.title(),
            &form.draft.username,
        ));
        lines.push(Self::field_line(
            form.active == ProfileField::AvatarUrl,
            ProfileField::AvatarUrl.title(),
            &form.draft.avatar_url,
        ));
        lines.push(Line::default());
        lines.push(Self::button_line(form.active == ProfileField::Save, "Save"));

        if let Some(error) = &form.error {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
            )));
        }

        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Changes apply to new posts and comments only.",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        )));

        let paragraph = Paragraph::new(lines)
            .block(Self::popup_block("Edit Profile"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup);
    }

    fn draw_comment_form(&self, frame: &mut Frame<'_>, area: Rect, form: &CommentForm) {
        let popup = centered_rect(56, 34, area);
        frame.render_widget(Clear, popup);

        let title = if form.comment_id.is_some() {
            "Edit Comment"
        } else {
            "Add Comment"
        };
        let lines = vec![
            Line::from(Span::styled(
                format!("> {}", form.input),
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            Line::from(Span::styled(
                "Enter submit · Ctrl-U clear · Esc cancel",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .block(Self::popup_block(title))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup);
    }

    fn draw_confirm(&self, frame: &mut Frame<'_>, area: Rect, message: &str) {
        let popup = centered_rect(46, 24, area);
        frame.render_widget(Clear, popup);

        let lines = vec![
            Line::from(Span::styled(
                message.to_string(),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )),
            Line::default(),
            Line::from(Span::styled(
                "y / Enter confirm · n / Esc cancel",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .block(Self::popup_block("Confirm"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup);
    }

    fn draw_media(&self, frame: &mut Frame<'_>, area: Rect, popup_data: &MediaPopup) {
        let popup = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup);

        let mut lines = Vec::new();
        if let Some(image) = &popup_data.image {
            if let Some(title) = &image.title {
                lines.push(Line::from(Span::styled(
                    title.clone(),
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .add_modifier(Modifier::BOLD),
                )));
            }
            lines.push(Line::from(Span::styled(
                format!("Image: {}", image.url),
                Style::default().fg(COLOR_ACCENT),
            )));
            lines.push(Line::default());
        }
        if let Some(video) = &popup_data.video {
            if let Some(title) = &video.title {
                lines.push(Line::from(Span::styled(
                    title.clone(),
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .add_modifier(Modifier::BOLD),
                )));
            }
            lines.push(Line::from(Span::styled(
                format!("Video: {}", video.url),
                Style::default().fg(COLOR_ACCENT),
            )));
            lines.push(Line::from(Span::styled(
                format!("{}: {}", video.embed.label(), video.embed.describe()),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            "o / Enter open in browser · Esc close",
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        )));

        let paragraph = Paragraph::new(lines)
            .block(Self::popup_block("Media"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup);
    }

    fn draw_empty_notice(&self, frame: &mut Frame<'_>, area: Rect) {
        let popup = centered_rect(44, 20, area);
        frame.render_widget(Clear, popup);

        let lines = vec![
            Line::from(Span::styled(
                EMPTY_POST_NOTICE,
                Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            Line::from(Span::styled(
                "Press any key to continue",
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .add_modifier(Modifier::ITALIC),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .block(Self::popup_block("Cannot Post"))
            .wrap(Wrap { trim: true })
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, popup);
    }

    fn draw_alerts(&self, frame: &mut Frame<'_>, area: Rect) {
        let width = ALERT_WIDTH.min(area.width.saturating_sub(2));
        if width < 10 {
            return;
        }
        let x = area.width.saturating_sub(width + 1);
        let mut y = 1u16;

        for alert in self.alerts.iter() {
            if y + 3 > area.height {
                break;
            }
            let rect = Rect::new(x, y, width, 3);
            frame.render_widget(Clear, rect);

            let (title, color) = match alert.kind {
                AlertKind::Success => ("Success", COLOR_SUCCESS),
                AlertKind::Error => ("Error", COLOR_ERROR),
            };
            let paragraph = Paragraph::new(Line::from(Span::styled(
                alert.message.clone(),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )))
            .block(
                Block::default()
                    .title(Span::styled(
                        title,
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color))
                    .style(Style::default().bg(COLOR_PANEL_BG)),
            )
            .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, rect);
            y += 3;
        }
    }

    fn footer_text(&self) -> String {
        if self.overlay.is_some() || self.empty_notice {
            return String::new();
        }
        let mut text = String::from(
            "j/k move · h/l panes · n post · e edit · d delete · L like · s share · c comment · b bulk · u profile · m media · x dismiss · r refresh · q quit",
        );
        if !self.config_path.is_empty() {
            text.push_str(&format!("  ({})", self.config_path));
        }
        text
    }
}

fn feed_snippet(post: &Post) -> String {
    if let Some(content) = post.content.as_deref() {
        let flat = content.replace('\n', " ");
        let trimmed = flat.trim();
        if !trimmed.is_empty() {
            return truncate_snippet(trimmed, FEED_SNIPPET_LEN);
        }
    }
    match (post.image_url.is_some(), post.video_url.is_some()) {
        (true, true) => "[image] [video]".to_string(),
        (true, false) => "[image]".to_string(),
        (false, true) => "[video]".to_string(),
        (false, false) => String::new(),
    }
}

fn truncate_snippet(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    for ch in text.chars() {
        if out.width() + 1 >= max_width {
            break;
        }
        out.push(ch);
    }
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn create_error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::Remote(message)) => message.clone(),
        _ => "Failed to create post".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post(content: Option<&str>, image: Option<&str>, video: Option<&str>) -> Post {
        Post {
            id: 1,
            username: "gojo_sensei".into(),
            user_image_url: String::new(),
            content: content.map(Into::into),
            image_url: image.map(Into::into),
            video_url: video.map(Into::into),
            image_title: None,
            video_title: None,
            like_count: 0,
            share_count: 0,
            comments: Vec::new(),
        }
    }

    #[test]
    fn panes_cycle_in_both_directions() {
        assert_eq!(Pane::Feed.next(), Pane::Detail);
        assert_eq!(Pane::Comments.next(), Pane::Feed);
        assert_eq!(Pane::Feed.previous(), Pane::Comments);
        let round_trip = Pane::Detail.next().previous();
        assert_eq!(round_trip, Pane::Detail);
    }

    #[test]
    fn composer_fields_cycle() {
        let mut field = ComposerField::Content;
        for _ in 0..4 {
            field = field.next();
        }
        assert_eq!(field, ComposerField::Content);
        assert_eq!(ComposerField::Content.previous(), ComposerField::Submit);
    }

    #[test]
    fn create_error_prefers_remote_message() {
        let err: anyhow::Error = ApiError::Remote("content too long".into()).into();
        assert_eq!(create_error_message(&err), "content too long");

        let err: anyhow::Error = ApiError::Status(reqwest::StatusCode::BAD_GATEWAY).into();
        assert_eq!(create_error_message(&err), "Failed to create post");

        let err = anyhow::anyhow!("connection refused");
        assert_eq!(create_error_message(&err), "Failed to create post");
    }

    #[test]
    fn feed_snippet_prefers_content_then_media_markers() {
        let post = sample_post(Some("hello world"), None, None);
        assert_eq!(feed_snippet(&post), "hello world");

        let post = sample_post(None, Some("https://example.test/a.jpg"), None);
        assert_eq!(feed_snippet(&post), "[image]");

        let post = sample_post(
            Some("  "),
            Some("https://example.test/a.jpg"),
            Some("https://example.test/b.mp4"),
        );
        assert_eq!(feed_snippet(&post), "[image] [video]");
    }

    #[test]
    fn snippets_are_truncated_with_an_ellipsis() {
        let long = "a".repeat(200);
        let snippet = truncate_snippet(&long, FEED_SNIPPET_LEN);
        assert!(snippet.ends_with('…'));
        assert!(snippet.width() <= FEED_SNIPPET_LEN);
    }

    use crate::feed::{
        FailingPostService, MockCommentService, MockEngagementService, MockPostService,
    };

    fn feed_post(id: i64, like_count: i64) -> Post {
        let mut post = sample_post(Some("hello"), None, None);
        post.id = id;
        post.like_count = like_count;
        post
    }

    fn test_model(posts: Vec<Post>) -> Model {
        Model::new(Options {
            status_message: String::new(),
            posts,
            post_service: Arc::new(MockPostService),
            comment_service: Arc::new(MockCommentService),
            engagement_service: Arc::new(MockEngagementService),
            profile: Profile::default(),
            alert_ttl: Duration::from_secs(5),
            theme: "default".into(),
            config_path: String::new(),
            fetch_on_start: false,
        })
    }

    #[test]
    fn refresh_flows_through_the_worker_channel() {
        let mut model = test_model(Vec::new());
        model.refresh_posts();
        let message = model
            .response_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("worker response");
        model.handle_async_response(message);
        assert_eq!(model.store.len(), 2);
        assert!(model.alerts.is_empty());
    }

    #[test]
    fn failed_list_keeps_prior_posts_and_raises_the_fetch_alert() {
        let mut model = test_model(vec![feed_post(7, 0), feed_post(9, 0)]);
        model.handle_async_response(AsyncResponse::Posts {
            result: Err(anyhow::anyhow!("connection refused")),
        });
        assert_eq!(model.store.len(), 2);
        let alert = model.alerts.iter().next().expect("alert raised");
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.message, "Failed to fetch posts. Please try again later.");
    }

    #[test]
    fn create_failure_keeps_the_draft_and_surfaces_the_server_message() {
        let mut model = test_model(Vec::new());
        model.post_service = Arc::new(FailingPostService);
        let mut form = ComposerForm::create();
        form.draft.content = "first try".into();
        model.overlay = Some(Overlay::Composer(form));

        model.submit_create(NewPost {
            username: "Anonymous".into(),
            user_image_url: String::new(),
            content: Some("first try".into()),
            image_url: None,
            video_url: None,
        });
        let message = model
            .response_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("worker response");
        model.handle_async_response(message);

        match &model.overlay {
            Some(Overlay::Composer(form)) => {
                assert!(!form.is_edit());
                assert_eq!(form.draft.content, "first try");
            }
            _ => panic!("composer should stay open on failure"),
        }
        let alert = model.alerts.iter().next().expect("alert raised");
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.message, "Content exceeds the 500 character limit");
        assert!(model.store.is_empty());
    }

    #[test]
    fn create_success_prepends_and_closes_the_composer() {
        let mut model = test_model(vec![feed_post(7, 0)]);
        model.overlay = Some(Overlay::Composer(ComposerForm::create()));
        model.handle_async_response(AsyncResponse::Created {
            result: Ok(feed_post(101, 0)),
        });
        assert_eq!(model.store.posts()[0].id, 101);
        assert_eq!(model.store.len(), 2);
        assert!(model.overlay.is_none());
        let alert = model.alerts.iter().next().expect("alert raised");
        assert_eq!(alert.kind, AlertKind::Success);
        assert_eq!(alert.message, "Post created successfully!");
    }

    #[test]
    fn like_success_swaps_the_post_and_raises_no_alert() {
        let mut model = test_model(vec![feed_post(7, 0), feed_post(9, 0)]);
        model.handle_async_response(AsyncResponse::Liked {
            id: 7,
            result: Ok(feed_post(7, 8)),
        });
        assert_eq!(model.store.get(7).unwrap().like_count, 8);
        assert_eq!(model.store.get(9).unwrap().like_count, 0);
        assert!(model.alerts.is_empty());
    }

    #[test]
    fn comment_add_replaces_the_post_and_closes_the_form() {
        let mut model = test_model(vec![feed_post(7, 0)]);
        model.overlay = Some(Overlay::Comment(CommentForm {
            post_id: 7,
            comment_id: None,
            input: "nice".into(),
        }));
        let mut updated = feed_post(7, 0);
        updated.comments.push(crate::api::Comment {
            id: 1,
            username: "Anonymous".into(),
            user_image_url: String::new(),
            content: "nice".into(),
            like_count: 0,
        });
        model.handle_async_response(AsyncResponse::CommentAdded {
            post_id: 7,
            result: Ok(updated),
        });
        assert_eq!(model.store.get(7).unwrap().comments.len(), 1);
        assert!(model.overlay.is_none());
        let alert = model.alerts.iter().next().expect("alert raised");
        assert_eq!(alert.message, "Comment added successfully!");
    }

    #[test]
    fn composer_form_edits_active_field() {
        let mut form = ComposerForm::create();
        form.insert_char('h');
        form.insert_char('i');
        assert_eq!(form.draft.content, "hi");
        form.active = ComposerField::ImageUrl;
        form.insert_char('x');
        assert_eq!(form.draft.image_url, "x");
        form.backspace();
        assert_eq!(form.draft.image_url, "");
        form.active = ComposerField::Content;
        form.clear_active();
        assert_eq!(form.draft.content, "");
    }
}
