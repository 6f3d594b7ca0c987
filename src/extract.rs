//! Per-article content extraction with ordered fallback locators.
//!
//! Every field tries a short ordered list of locator strategies and takes
//! the first non-empty, non-placeholder value. Failures degrade to skips
//! rather than errors: a post that cannot be read is simply absent from
//! the output.

use crate::controls::CrawlControls;
use crate::renderer::{attribute_of, text_of, Renderer, RendererSession};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Loading-state placeholder that must never be treated as real content.
pub const LOADING_SENTINEL: &str = "請稍候...";
/// Separator joining comment texts in the dataset artifact.
pub const COMMENT_SEPARATOR: &str = " || ";

/// A body candidate is accepted only past this many characters.
const MIN_BODY_CHARS: usize = 10;
/// Posts older than this many days are dropped at extraction time.
const FRESHNESS_WINDOW_DAYS: i64 = 365 * 3;

const TAGGED_TITLE_SELECTOR: &str = "[data-testid='article-title']";
const BODY_SELECTORS: [&str; 3] = ["div[data-testid='post-content']", "article", ".content"];
const DATE_SELECTOR: &str = "time, [data-testid='post-date']";
const COMMENT_SELECTOR: &str = "div[data-testid='comment']";
const PAGE_TITLE_SUFFIXES: [&str; 2] = [" | Dcard", "- Dcard"];

/// Title locator strategies, evaluated in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TitleRule {
    /// Primary heading element on the article page.
    PrimaryHeading,
    /// Semantically tagged title attribute.
    TaggedTitle,
    /// Page title metadata with the site suffix stripped.
    PageTitle,
}

const TITLE_RULES: [TitleRule; 3] = [
    TitleRule::PrimaryHeading,
    TitleRule::TaggedTitle,
    TitleRule::PageTitle,
];

/// A fully extracted article, grouped by board downstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord {
    /// Article title; may be empty until the cleaning pass filters it.
    pub title: String,
    /// Article body text; may be empty until the cleaning pass filters it.
    pub body: String,
    /// Source URL, dropped again during cleaning.
    pub url: String,
    /// Posting date, normalized to a timezone-naive day.
    pub posted: NaiveDate,
    /// Comment texts in document order.
    pub comments: Vec<String>,
}

impl RawRecord {
    /// Comments joined for dataset storage.
    pub fn comments_joined(&self) -> String {
        self.comments.join(COMMENT_SEPARATOR)
    }
}

/// Run-wide record of URLs that have already been extracted.
///
/// Guarantees at-most-once extraction per URL within a single run; the
/// insert happens before the extractor returns its record. Not persisted.
#[derive(Debug, Default)]
pub struct ProcessedLinks {
    seen: Mutex<HashSet<String>>,
}

impl ProcessedLinks {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the URL has already been extracted this run.
    pub async fn contains(&self, url: &str) -> bool {
        self.seen.lock().await.contains(url)
    }

    /// Records the URL; returns false when it was already present.
    pub async fn insert(&self, url: &str) -> bool {
        self.seen.lock().await.insert(url.to_string())
    }

    /// Number of URLs extracted so far.
    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    /// True when nothing has been extracted yet.
    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }
}

/// Extracts one article, or `None` when the post is skipped.
///
/// Skips are not errors: an already-processed URL, any page-interaction
/// failure, and a post outside the freshness window all yield `None`.
pub async fn extract_content(
    renderer: &Renderer,
    processed: &ProcessedLinks,
    controls: &CrawlControls,
    url: &str,
) -> Option<RawRecord> {
    if processed.contains(url).await {
        debug!(url, "already extracted, skipping");
        return None;
    }

    let session = renderer.session().await;
    if let Err(err) = session.navigate(url).await {
        warn!(url, error = %err, "navigation failed, skipping");
        return None;
    }

    let mut title = String::new();
    for rule in TITLE_RULES {
        if let Some(found) = title_candidate(&session, rule).await {
            title = found;
            break;
        }
    }

    let mut body = String::new();
    for selector in BODY_SELECTORS {
        if let Some(found) = body_candidate(&session, selector).await {
            body = found;
            break;
        }
    }

    let now = Utc::now().naive_utc();
    let posted = match posted_timestamp(&session).await {
        Some(stamp) => stamp,
        None if controls.drop_undated() => {
            debug!(url, "no parseable post date, dropping");
            return None;
        }
        None => now,
    };
    if !is_fresh(posted, now) {
        debug!(url, posted = %posted.date(), "outside freshness window, skipping");
        return None;
    }

    let mut comments = Vec::new();
    for element in session.find_all(COMMENT_SELECTOR).await {
        if let Some(text) = text_of(&element).await {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                comments.push(trimmed.to_string());
            }
        }
    }
    drop(session);

    // The insert gates the return, so a URL racing through two workers
    // still produces at most one record.
    if !processed.insert(url).await {
        debug!(url, "extracted concurrently elsewhere, skipping");
        return None;
    }
    Some(RawRecord {
        title,
        body,
        url: url.to_string(),
        posted: posted.date(),
        comments,
    })
}

async fn title_candidate(session: &RendererSession<'_>, rule: TitleRule) -> Option<String> {
    match rule {
        TitleRule::PrimaryHeading => {
            let element = session.find_within("h1").await?;
            accept_field(&text_of(&element).await?)
        }
        TitleRule::TaggedTitle => {
            let element = session.find_within(TAGGED_TITLE_SELECTOR).await?;
            accept_field(&text_of(&element).await?)
        }
        TitleRule::PageTitle => title_from_page_title(&session.title().await?),
    }
}

async fn body_candidate(session: &RendererSession<'_>, selector: &str) -> Option<String> {
    let element = session.find_within(selector).await?;
    accept_body(&text_of(&element).await?)
}

async fn posted_timestamp(session: &RendererSession<'_>) -> Option<NaiveDateTime> {
    let element = session.find(DATE_SELECTOR).await?;
    let machine = attribute_of(&element, "datetime").await;
    let raw = match machine {
        Some(value) => value,
        None => text_of(&element).await?,
    };
    parse_timestamp(&raw)
}

fn accept_field(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == LOADING_SENTINEL {
        return None;
    }
    Some(trimmed.to_string())
}

fn accept_body(raw: &str) -> Option<String> {
    accept_field(raw).filter(|text| text.chars().count() > MIN_BODY_CHARS)
}

fn title_from_page_title(raw: &str) -> Option<String> {
    if !raw.contains("Dcard") {
        return None;
    }
    let mut title = raw.to_string();
    for suffix in PAGE_TITLE_SUFFIXES {
        title = title.replace(suffix, "");
    }
    accept_field(&title)
}

/// Parses a timestamp to a timezone-naive UTC instant.
///
/// Accepts RFC 3339 with an offset or `Z`, a bare ISO date-time, and a
/// date-only form. Anything else is `None`; callers decide whether that
/// means "now" or a drop.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.with_timezone(&Utc).naive_utc());
    }

    if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(stamp);
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }

    None
}

fn is_fresh(posted: NaiveDateTime, now: NaiveDateTime) -> bool {
    posted >= now - Duration::days(FRESHNESS_WINDOW_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_rejected_at_every_strategy() {
        assert_eq!(accept_field("請稍候..."), None);
        assert_eq!(accept_field("  請稍候...  "), None);
        assert_eq!(accept_body("請稍候..."), None);
        assert_eq!(accept_field("真實標題"), Some("真實標題".to_string()));
    }

    #[test]
    fn body_requires_more_than_minimum_length() {
        assert_eq!(accept_body("0123456789"), None);
        assert_eq!(accept_body("0123456789a"), Some("0123456789a".to_string()));
        // Length is counted in characters, not bytes.
        assert_eq!(accept_body("一二三四五六七八九十"), None);
        assert_eq!(
            accept_body("一二三四五六七八九十十一"),
            Some("一二三四五六七八九十十一".to_string())
        );
    }

    #[test]
    fn page_title_strips_site_suffix() {
        assert_eq!(
            title_from_page_title("某篇遊記 | Dcard"),
            Some("某篇遊記".to_string())
        );
        assert_eq!(
            title_from_page_title("某篇遊記 - Dcard"),
            Some("某篇遊記".to_string())
        );
        // A page title without the site marker is not trusted.
        assert_eq!(title_from_page_title("Some Other Site"), None);
        // Suffix-only titles collapse to nothing.
        assert_eq!(title_from_page_title(" | Dcard"), None);
    }

    #[test]
    fn timestamps_normalize_to_naive_utc() {
        let zulu = parse_timestamp("2024-01-15T12:30:00Z").expect("zulu form");
        assert_eq!(zulu.to_string(), "2024-01-15 12:30:00");

        let offset = parse_timestamp("2024-01-15T13:30:00+08:00").expect("offset form");
        assert_eq!(offset.to_string(), "2024-01-15 05:30:00");

        let bare = parse_timestamp("2024-01-15T12:30:00").expect("bare form");
        assert_eq!(bare.to_string(), "2024-01-15 12:30:00");

        let date_only = parse_timestamp("2024-01-15").expect("date form");
        assert_eq!(date_only.to_string(), "2024-01-15 00:00:00");

        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn freshness_window_boundaries() {
        let now = Utc::now().naive_utc();
        let just_inside = now - Duration::days(FRESHNESS_WINDOW_DAYS - 1);
        let just_outside = now - Duration::days(FRESHNESS_WINDOW_DAYS + 1);
        assert!(is_fresh(just_inside, now));
        assert!(!is_fresh(just_outside, now));
    }

    #[test]
    fn comments_join_with_fixed_separator() {
        let record = RawRecord {
            title: "t".to_string(),
            body: "b".to_string(),
            url: "https://example.test/p/1".to_string(),
            posted: NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date"),
            comments: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(record.comments_joined(), "first || second");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn processed_links_record_each_url_once() {
        let processed = ProcessedLinks::new();
        assert!(!processed.contains("https://a.test/p/1").await);
        assert!(processed.insert("https://a.test/p/1").await);
        assert!(!processed.insert("https://a.test/p/1").await);
        assert!(processed.contains("https://a.test/p/1").await);
        assert_eq!(processed.len().await, 1);
    }
}
