#![allow(clippy::uninlined_format_args)]

pub mod alert;
pub mod api;
pub mod app;
pub mod compose;
pub mod config;
pub mod embed;
pub mod feed;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
