use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config;
use crate::data::{PostSource, RedditPostSource};
use crate::feed::Feed;
use crate::reddit::{self, SortOption};
use crate::settings::{Settings, SettingsHandle};

pub const LOG_ENV: &str = "GIF_SCROLL_LOG";

const PAGE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub config_file: Option<PathBuf>,
    pub term: Option<String>,
    pub sort: Option<SortOption>,
    pub per_page: Option<usize>,
    pub pages: usize,
}

pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(options: Options, out: &mut dyn Write) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;

    let client = reddit::Client::new(reddit::ClientConfig {
        user_agent: cfg.reddit.user_agent.clone(),
        base_url: Some(cfg.reddit.base_url.clone()),
        http_client: None,
    })
    .context("build reddit client")?;
    let source: Arc<dyn PostSource> = Arc::new(
        RedditPostSource::new(Arc::new(client)).with_fixed_limit(cfg.feed.request_limit),
    );

    let defaults = cfg.feed.settings().context("feed settings")?;
    let settings = Settings::new(
        options.sort.unwrap_or(defaults.sort()),
        options.per_page.unwrap_or(defaults.per_page()),
    )
    .context("feed settings")?;
    let term = options
        .term
        .clone()
        .unwrap_or_else(|| cfg.feed.default_term.clone());

    let mut feed = Feed::new(source, SettingsHandle::new(settings), cfg.feed.options());
    print_pages(&mut feed, &term, options.pages.max(1), out)
}

fn print_pages(feed: &mut Feed, term: &str, pages: usize, out: &mut dyn Write) -> Result<()> {
    feed.start(term);
    let mut printed = 0;
    for page in 0..pages {
        if page > 0 {
            let Some(last) = feed.last_name().map(str::to_string) else {
                break;
            };
            if !feed.more_available() {
                break;
            }
            let _ = feed.load_more(&last);
        }
        if !feed.settle(PAGE_TIMEOUT) {
            anyhow::bail!("timed out waiting for page {}", page + 1);
        }
        for item in &feed.items()[printed..] {
            writeln!(out, "{}\t{}", item.gif.src, item.gif.title)?;
        }
        printed = feed.gifs().len();
    }

    if feed.more_available() {
        writeln!(out, "# {printed} gifs from {term}, more available")?;
    } else {
        writeln!(out, "# {printed} gifs from {term}, no more available")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockPostSource;
    use crate::feed::FeedOptions;

    #[test]
    fn prints_each_page_once() {
        let source = Arc::new(MockPostSource::new());
        source
            .push_page(vec![MockPostSource::gif("a"), MockPostSource::still("s")])
            .push_page(vec![MockPostSource::gif("b")]);
        let settings = SettingsHandle::new(Settings::new(SortOption::Hot, 1).unwrap());
        let mut feed = Feed::new(source.clone(), settings, FeedOptions::default());

        let mut out = Vec::new();
        print_pages(&mut feed, "gifs", 3, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "https://i.imgur.com/a.mp4\tgif a");
        assert_eq!(lines[1], "https://i.imgur.com/b.mp4\tgif b");
        assert_eq!(lines[2], "# 2 gifs from gifs, no more available");
        assert_eq!(source.calls()[1].after.as_deref(), Some("a"));
    }
}
