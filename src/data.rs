use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::reddit::{self, ListingOptions, SortOption};

pub trait PostSource: Send + Sync {
    fn fetch_page(
        &self,
        term: &str,
        sort: SortOption,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<reddit::Post>>;
}

pub struct RedditPostSource {
    client: Arc<reddit::Client>,
    fixed_limit: Option<u32>,
}

impl RedditPostSource {
    pub fn new(client: Arc<reddit::Client>) -> Self {
        Self {
            client,
            fixed_limit: None,
        }
    }

    /// Always request `limit` posts instead of the caller's hint.
    pub fn with_fixed_limit(mut self, limit: Option<u32>) -> Self {
        self.fixed_limit = limit;
        self
    }
}

impl PostSource for RedditPostSource {
    fn fetch_page(
        &self,
        term: &str,
        sort: SortOption,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<reddit::Post>> {
        let hint = u32::try_from(limit).unwrap_or(u32::MAX);
        let opts = ListingOptions {
            after: after.map(str::to_string),
            limit: Some(self.fixed_limit.unwrap_or(hint)),
        };
        let listing = self
            .client
            .subreddit_listing(term, sort, opts)
            .context("fetch gif listing")?;
        let rate = self.client.rate_limit();
        tracing::debug!(
            term,
            remaining = rate.remaining,
            used = rate.used,
            "reddit: rate limit after listing"
        );
        Ok(listing
            .children
            .into_iter()
            .map(|thing| thing.data)
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub term: String,
    pub sort: SortOption,
    pub after: Option<String>,
    pub limit: usize,
}

/// Replays scripted pages in order and records every call it receives. Pages
/// scripted for a specific term are served first for that term. Once the
/// script runs out every fetch returns an empty page.
#[derive(Default)]
pub struct MockPostSource {
    pages: Mutex<VecDeque<Result<Vec<reddit::Post>>>>,
    term_pages: Mutex<HashMap<String, VecDeque<Vec<reddit::Post>>>>,
    calls: Mutex<Vec<FetchCall>>,
    gate: Option<Receiver<()>>,
}

impl MockPostSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each fetch blocks until a unit is received on `gate`.
    pub fn gated(gate: Receiver<()>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push_page(&self, posts: Vec<reddit::Post>) -> &Self {
        self.pages.lock().push_back(Ok(posts));
        self
    }

    pub fn push_term_page(&self, term: &str, posts: Vec<reddit::Post>) -> &Self {
        self.term_pages
            .lock()
            .entry(term.to_string())
            .or_default()
            .push_back(posts);
        self
    }

    pub fn push_error(&self, message: &str) -> &Self {
        self.pages.lock().push_back(Err(anyhow!(message.to_string())));
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().clone()
    }

    pub fn gif(name: &str) -> reddit::Post {
        reddit::Post {
            name: name.into(),
            url: format!("https://i.imgur.com/{name}.gifv"),
            permalink: format!("/r/gifs/comments/{name}"),
            title: format!("gif {name}"),
            author: "mock".into(),
            ..reddit::Post::default()
        }
    }

    pub fn still(name: &str) -> reddit::Post {
        reddit::Post {
            name: name.into(),
            url: format!("https://i.redd.it/{name}.jpg"),
            permalink: format!("/r/gifs/comments/{name}"),
            title: format!("image {name}"),
            author: "mock".into(),
            ..reddit::Post::default()
        }
    }
}

impl PostSource for MockPostSource {
    fn fetch_page(
        &self,
        term: &str,
        sort: SortOption,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<reddit::Post>> {
        self.calls.lock().push(FetchCall {
            term: term.to_string(),
            sort,
            after: after.map(str::to_string),
            limit,
        });
        if let Some(gate) = &self.gate {
            gate.recv().map_err(|_| anyhow!("mock: gate closed"))?;
        }
        if let Some(posts) = self
            .term_pages
            .lock()
            .get_mut(term)
            .and_then(|queue| queue.pop_front())
        {
            return Ok(posts);
        }
        self.pages.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}
