use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use parking_lot::RwLock;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{HeaderMap, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com/";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("reddit: unauthorized")]
    Unauthorized,
    #[error("reddit: forbidden")]
    Forbidden,
    #[error("reddit: rate limited: {0}")]
    RateLimited(String),
    #[error("reddit: api error {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub http_client: Option<HttpClient>,
}

#[derive(Debug, Clone, Default)]
pub struct ListingOptions {
    pub after: Option<String>,
    pub limit: Option<u32>,
}

impl ListingOptions {
    fn into_params(self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(limit) = self.limit {
            params.push(("limit".into(), limit.to_string()));
        }
        if let Some(after) = self.after {
            params.push(("after".into(), after));
        }
        params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOption {
    #[default]
    Hot,
    New,
    Top,
    Best,
    Rising,
}

impl SortOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::Hot => "hot",
            SortOption::New => "new",
            SortOption::Top => "top",
            SortOption::Best => "best",
            SortOption::Rising => "rising",
        }
    }
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
    rate: RwLock<RateLimit>,
}

#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    pub used: f64,
    pub remaining: f64,
    pub reset_at: Option<SystemTime>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("reddit client user agent required");
        }
        let base = config
            .base_url
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&base).with_context(|| format!("reddit: parse base url {base}"))?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .context("reddit: build http client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
            rate: RwLock::new(RateLimit::default()),
        })
    }

    pub fn rate_limit(&self) -> RateLimit {
        self.rate.read().clone()
    }

    pub fn subreddit_listing(
        &self,
        subreddit: &str,
        sort: SortOption,
        opts: ListingOptions,
    ) -> Result<Listing<Post>> {
        self.fetch_listing(&listing_path(subreddit, sort), opts)
    }

    fn fetch_listing<T>(&self, path: &str, opts: ListingOptions) -> Result<Listing<T>>
    where
        T: DeserializeOwned,
    {
        let params = opts.into_params();
        let resp = self.request(path, &params)?;
        let listing: ListingEnvelope<T> = resp.json().context("reddit: decode listing")?;
        Ok(listing.data)
    }

    fn request(&self, path: &str, params: &[(String, String)]) -> Result<Response> {
        let mut url = self.base_url.join(path.trim_start_matches('/'))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }

        tracing::debug!(%url, "reddit: GET");
        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, self.user_agent.clone())
            .send()
            .context("reddit: send request")?;
        self.capture_rate(resp.headers());
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        let err = match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            429 => ApiError::RateLimited(body),
            code => ApiError::Status { status: code, body },
        };
        Err(err.into())
    }

    fn capture_rate(&self, headers: &HeaderMap) {
        let remaining = header_float(headers, "x-ratelimit-remaining");
        let used = header_float(headers, "x-ratelimit-used");
        let reset = header_float(headers, "x-ratelimit-reset");
        if remaining == 0.0 && used == 0.0 && reset == 0.0 {
            return;
        }
        let reset_at = SystemTime::now().checked_add(Duration::from_secs_f64(reset.max(0.0)));
        let mut rate = self.rate.write();
        rate.remaining = remaining;
        rate.used = used;
        rate.reset_at = reset_at;
    }
}

fn listing_path(subreddit: &str, sort: SortOption) -> String {
    let name = subreddit.trim().trim_start_matches("r/").trim_matches('/');
    if name.is_empty() {
        format!("{}/.json", sort.as_str())
    } else {
        format!(
            "r/{}/{}/.json",
            utf8_percent_encode(name, NON_ALPHANUMERIC),
            sort.as_str()
        )
    }
}

fn header_float(headers: &HeaderMap, key: &str) -> f64 {
    headers
        .get(key)
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thing<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Post {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub secure_media: Option<PostMedia>,
    #[serde(default)]
    pub media: Option<PostMedia>,
    #[serde(default)]
    pub preview: Option<Preview>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PostMedia {
    #[serde(default)]
    pub reddit_video: Option<RedditVideo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Preview {
    #[serde(default)]
    pub reddit_video_preview: Option<RedditVideo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RedditVideo {
    #[serde(default)]
    pub fallback_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ListingEnvelope<T> {
    data: Listing<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_path_encodes_term() {
        assert_eq!(listing_path("gifs", SortOption::Hot), "r/gifs/hot/.json");
        assert_eq!(listing_path("r/aww/", SortOption::Top), "r/aww/top/.json");
        assert_eq!(listing_path("a b", SortOption::New), "r/a%20b/new/.json");
        assert_eq!(listing_path("  ", SortOption::Rising), "rising/.json");
    }

    #[test]
    fn listing_params_order() {
        let opts = ListingOptions {
            after: Some("t3_abc".into()),
            limit: Some(4),
            ..Default::default()
        };
        assert_eq!(
            opts.into_params(),
            vec![
                ("limit".to_string(), "4".to_string()),
                ("after".to_string(), "t3_abc".to_string()),
            ]
        );
    }

    #[test]
    fn decodes_listing_with_sparse_posts() {
        let payload = r#"{
            "kind": "Listing",
            "data": {
                "after": "t3_b",
                "children": [
                    {"kind": "t3", "data": {"name": "t3_a", "url": "https://i.imgur.com/a.gifv"}},
                    {"kind": "t3", "data": {
                        "name": "t3_b",
                        "url": "https://v.redd.it/b",
                        "secure_media": {"reddit_video": {"fallback_url": "https://v.redd.it/b/DASH_480.mp4"}},
                        "media": null,
                        "preview": {"images": []}
                    }}
                ]
            }
        }"#;
        let listing: ListingEnvelope<Post> = serde_json::from_str(payload).unwrap();
        assert_eq!(listing.data.children.len(), 2);
        let second = &listing.data.children[1].data;
        assert!(second.media.is_none());
        assert!(second.preview.as_ref().unwrap().reddit_video_preview.is_none());
        assert_eq!(
            second
                .secure_media
                .as_ref()
                .and_then(|m| m.reddit_video.as_ref())
                .map(|v| v.fallback_url.as_str()),
            Some("https://v.redd.it/b/DASH_480.mp4")
        );
    }

    #[test]
    fn captures_rate_limit_headers() {
        let client = Client::new(ClientConfig {
            user_agent: "gif-scroll-test/0.1".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.rate_limit().remaining, 0.0);

        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", "42.0".parse().unwrap());
        headers.insert("x-ratelimit-used", "58".parse().unwrap());
        headers.insert("x-ratelimit-reset", "120".parse().unwrap());
        client.capture_rate(&headers);

        let rate = client.rate_limit();
        assert_eq!(rate.remaining, 42.0);
        assert_eq!(rate.used, 58.0);
        assert!(rate.reset_at.is_some());

        client.capture_rate(&HeaderMap::new());
        assert_eq!(client.rate_limit().remaining, 42.0);
    }

    #[test]
    fn client_requires_user_agent() {
        assert!(Client::new(ClientConfig::default()).is_err());
    }

    #[test]
    fn sort_serializes_lowercase() {
        let value = serde_json::to_string(&SortOption::Rising).unwrap();
        assert_eq!(value, "\"rising\"");
    }
}
