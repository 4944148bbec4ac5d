use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use gif_scroll::data::MockPostSource;
use gif_scroll::filler::PageFiller;
use gif_scroll::pagination::{CompletionHandle, FillStatus, PaginationState};
use gif_scroll::query::Query;
use gif_scroll::reddit::{Post, SortOption};
use gif_scroll::settings::{Settings, SettingsHandle};
use gif_scroll::{Feed, FeedOptions};

fn mixed(prefix: &str, valid: usize, invalid: usize) -> Vec<Post> {
    let mut posts = Vec::new();
    for i in 0..valid.max(invalid) {
        if i < valid {
            posts.push(MockPostSource::gif(&format!("{prefix}v{i}")));
        }
        if i < invalid {
            posts.push(MockPostSource::still(&format!("{prefix}i{i}")));
        }
    }
    posts
}

fn query(per_page: usize) -> Query {
    Query::new("gifs", Settings::new(SortOption::Hot, per_page).unwrap())
}

#[test]
fn sparse_first_page_is_topped_up() {
    let source = Arc::new(MockPostSource::new());
    let first = mixed("a", 6, 9);
    let last_name = first.last().unwrap().name.clone();
    source.push_page(first).push_page(mixed("b", 4, 0));

    let outcome = PageFiller::new(source.clone())
        .fill(&query(10), PaginationState::first_page(), &AtomicBool::new(false))
        .unwrap();

    assert_eq!(outcome.status, FillStatus::Filled);
    assert_eq!(outcome.gifs.len(), 10);
    let calls = source.calls();
    assert_eq!(calls[1].limit, 4);
    assert_eq!(calls[1].after, Some(last_name));
}

#[test]
fn empty_upstream_ends_the_feed() {
    let source = Arc::new(MockPostSource::new());
    let settings = SettingsHandle::new(Settings::new(SortOption::Hot, 10).unwrap());
    let mut feed = Feed::new(source.clone(), settings, FeedOptions::default());

    feed.start("gifs");
    assert!(feed.settle(Duration::from_secs(5)));

    assert!(feed.items().is_empty());
    assert!(!feed.more_available());
    assert_eq!(source.calls().len(), 1);
}

#[test]
fn overshoot_keeps_only_the_page() {
    let source = Arc::new(MockPostSource::new());
    source.push_page(mixed("a", 3, 0)).push_page(mixed("b", 3, 0));
    let (handle, done) = CompletionHandle::channel();

    let outcome = PageFiller::new(source)
        .fill(
            &query(5),
            PaginationState::next_page("t3_prev", Some(handle)),
            &AtomicBool::new(false),
        )
        .unwrap();

    assert_eq!(outcome.gifs.len(), 5);
    assert_eq!(outcome.gifs[4].name, "bv1");
    assert_eq!(done.try_recv(), Ok(FillStatus::Filled));
}
