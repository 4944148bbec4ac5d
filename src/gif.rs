use serde::{Deserialize, Serialize};

use crate::reddit::{Post, PostMedia, RedditVideo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gif {
    pub src: String,
    pub author: String,
    pub name: String,
    pub permalink: String,
    pub title: String,
    pub thumbnail: String,
    pub comments: i64,
}

/// A gif as presented to the consumer, with the per-item load flags folded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GifView {
    #[serde(flatten)]
    pub gif: Gif,
    pub loading: bool,
    pub loaded: bool,
}

/// Converts a listing post into a [`Gif`], or `None` when the post carries no
/// playable source.
pub fn normalize(post: &Post) -> Option<Gif> {
    let src = best_source(post)?;
    Some(Gif {
        src,
        author: post.author.clone(),
        name: post.name.clone(),
        permalink: post.permalink.clone(),
        title: post.title.clone(),
        thumbnail: post.thumbnail.clone(),
        comments: post.num_comments,
    })
}

pub fn best_source(post: &Post) -> Option<String> {
    let url = post.url.as_str();
    if url.contains(".mp4") {
        return Some(url.to_string());
    }
    if url.contains(".gifv") {
        return Some(url.replacen(".gifv", ".mp4", 1));
    }
    if url.contains(".webm") {
        return Some(url.replacen(".webm", ".mp4", 1));
    }

    fallback_from_media(post.secure_media.as_ref())
        .or_else(|| fallback_from_media(post.media.as_ref()))
        .or_else(|| {
            post.preview
                .as_ref()
                .and_then(|preview| preview.reddit_video_preview.as_ref())
                .and_then(fallback_url)
        })
}

fn fallback_from_media(media: Option<&PostMedia>) -> Option<String> {
    media?.reddit_video.as_ref().and_then(fallback_url)
}

fn fallback_url(video: &RedditVideo) -> Option<String> {
    let url = video.fallback_url.trim();
    if url.is_empty() {
        return None;
    }
    Some(url.replace("&amp;", "&"))
}
