#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod data;
pub mod feed;
pub mod filler;
pub mod gif;
pub mod loading;
pub mod pagination;
pub mod query;
pub mod reddit;
pub mod settings;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
pub use feed::{Feed, FeedOptions, SettingsChangePolicy};
pub use gif::{Gif, GifView};
