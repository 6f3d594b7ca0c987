//! Board listing discovery under a scrolling/time-cutoff policy.

use crate::controls::{Board, CrawlControls};
use crate::extract::parse_timestamp;
use crate::renderer::{attribute_of, find_in, text_of, Renderer};
use chrono::{Duration, NaiveDateTime, Utc};
use std::collections::HashSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

/// Anchors pointing at article pages on a board listing.
pub const POST_LINK_SELECTOR: &str = "a[href*='/p/']";

/// Anchors older than this many days end discovery for the board.
const DISCOVERY_WINDOW_DAYS: i64 = 365 * 10;

/// A post URL observed on a listing page, not yet content-extracted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateLink {
    /// Absolute article URL, unique within one discovery run.
    pub url: String,
    /// Timestamp shown next to the anchor, when one was present and parseable.
    pub observed: Option<NaiveDateTime>,
}

/// Scrolls a board listing and harvests candidate post links.
///
/// Scrolling stops at the first anchor whose timestamp falls outside the
/// discovery window (that anchor is excluded), or after `max_scroll`
/// steps. A listing that never reports ready is logged and harvested
/// anyway. Anchors without a parseable timestamp count as fresh.
pub async fn discover_links(
    renderer: &Renderer,
    controls: &CrawlControls,
    board: &Board,
) -> Vec<CandidateLink> {
    let listing = controls.board_url(board);
    let session = renderer.session().await;

    if let Err(err) = session.navigate(&listing).await {
        warn!(board = %board.name, error = %err, "board navigation failed");
        return Vec::new();
    }
    if !session.wait_until_ready().await {
        warn!(board = %board.name, "board listing load timed out");
    }
    sleep(controls.medium_wait()).await;

    let now = Utc::now().naive_utc();
    let cutoff = now - Duration::days(DISCOVERY_WINDOW_DAYS);
    let mut seen: HashSet<String> = HashSet::new();
    let mut links = Vec::new();

    for _ in 0..controls.max_scroll() {
        if let Err(err) = session.scroll_to_bottom().await {
            debug!(board = %board.name, error = %err, "scroll command failed");
        }
        sleep(controls.short_wait()).await;

        for anchor in session.find_all(POST_LINK_SELECTOR).await {
            let Some(href) = attribute_of(&anchor, "href").await else {
                continue;
            };
            let Some(url) = resolve_href(&listing, &href) else {
                continue;
            };
            if !seen.insert(url.clone()) {
                continue;
            }

            let observed = anchor_observation(&anchor).await;
            if observed.unwrap_or(now) < cutoff {
                info!(
                    board = %board.name,
                    collected = links.len(),
                    "anchor older than discovery window, stopping scroll"
                );
                return links;
            }
            links.push(CandidateLink { url, observed });
        }
    }

    links
}

async fn anchor_observation(anchor: &chromiumoxide::element::Element) -> Option<NaiveDateTime> {
    let time = find_in(anchor, "time").await?;
    let raw = match attribute_of(&time, "datetime").await {
        Some(value) => value,
        None => text_of(&time).await?,
    };
    parse_timestamp(&raw)
}

fn resolve_href(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let resolved = base.join(href).ok()?;
    Some(resolved.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_hrefs_resolve_against_the_listing() {
        assert_eq!(
            resolve_href("https://www.dcard.tw/f/travel", "/f/travel/p/123").as_deref(),
            Some("https://www.dcard.tw/f/travel/p/123")
        );
        assert_eq!(
            resolve_href("https://www.dcard.tw/f/travel", "https://www.dcard.tw/f/food/p/9")
                .as_deref(),
            Some("https://www.dcard.tw/f/food/p/9")
        );
        assert_eq!(resolve_href("not a url", "/p/1"), None);
    }

    #[test]
    fn discovery_cutoff_matches_the_window_boundary() {
        let now = Utc::now().naive_utc();
        let cutoff = now - Duration::days(DISCOVERY_WINDOW_DAYS);
        let just_inside = now - Duration::days(DISCOVERY_WINDOW_DAYS - 1);
        let just_outside = now - Duration::days(DISCOVERY_WINDOW_DAYS + 1);
        assert!(just_inside >= cutoff);
        assert!(just_outside < cutoff);
        // A missing timestamp resolves to "now" and never stops the scroll.
        let observed: Option<NaiveDateTime> = None;
        assert!(observed.unwrap_or(now) >= cutoff);
    }
}
