use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api;
use crate::compose::Profile;
use crate::config;
use crate::feed::{
    CommentService, EngagementService, PostService, RemoteCommentService, RemoteEngagementService,
    RemotePostService,
};
use crate::ui;

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let config_path = config::default_path();
    let display_path = friendly_path(config_path.as_ref());

    let user_agent = if !cfg.api.user_agent.trim().is_empty() {
        cfg.api.user_agent.clone()
    } else {
        format!("feedr/{}", crate::VERSION)
    };

    let client = api::Client::new(api::ClientConfig {
        user_agent,
        base_url: Some(cfg.api.base_url.clone()),
        http_client: None,
    })
    .context("initialize api client")?;
    let client = Arc::new(client);

    let post_service: Arc<dyn PostService> = Arc::new(RemotePostService::new(client.clone()));
    let comment_service: Arc<dyn CommentService> =
        Arc::new(RemoteCommentService::new(client.clone()));
    let engagement_service: Arc<dyn EngagementService> =
        Arc::new(RemoteEngagementService::new(client));

    let profile = Profile {
        username: cfg.profile.username.clone(),
        avatar_url: cfg.profile.avatar_url.clone(),
    };

    let options = ui::Options {
        status_message: "Loading posts. Press j/k to navigate, n to post, q to quit.".to_string(),
        posts: Vec::new(),
        post_service,
        comment_service,
        engagement_service,
        profile,
        alert_ttl: cfg.alerts.ttl,
        theme: cfg.ui.theme.clone(),
        config_path: display_path,
        fetch_on_start: true,
    };

    let mut model = ui::Model::new(options);
    model.run()?;

    Ok(())
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/feedr/config.yaml".to_string()
    }
}
