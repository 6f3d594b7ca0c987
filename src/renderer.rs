//! Shared browser session with serialized page access.
//!
//! One Chromium process and one page serve every discovery and extraction
//! task. Page interaction is not safe under concurrent use, so all access
//! goes through [`Renderer::session`], which hands out a guard holding the
//! session lock for the duration of one logical interaction. Task
//! submission stays concurrent; renderer use is serialized.

use crate::error::{CrawlError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the browser process and the single shared page.
pub struct Renderer {
    browser: Browser,
    page: Mutex<Page>,
    wait_timeout: Duration,
}

impl Renderer {
    /// Launches a headless browser and opens the shared page.
    ///
    /// The option set mirrors a hardened scraping profile: fixed window
    /// size, ephemeral incognito profile, image loading disabled.
    pub async fn launch(wait_timeout: Duration) -> Result<Self> {
        let config = BrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--window-size=1920,1080")
            .arg("--incognito")
            .arg("--blink-settings=imagesEnabled=false")
            .build()
            .map_err(CrawlError::BrowserConfig)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(CrawlError::BrowserLaunch)?;

        tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(CrawlError::BrowserLaunch)?;

        Ok(Self {
            browser,
            page: Mutex::new(page),
            wait_timeout,
        })
    }

    /// Acquires exclusive use of the page for one logical interaction.
    pub async fn session(&self) -> RendererSession<'_> {
        RendererSession {
            page: self.page.lock().await,
            wait_timeout: self.wait_timeout,
        }
    }

    /// Shuts the browser down. Always called on exit, success or failure.
    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "browser close error");
        }
        if let Err(err) = self.browser.wait().await {
            debug!(error = %err, "browser process reap error");
        }
    }
}

/// Exclusive handle on the shared page.
///
/// Holding the guard serializes every navigate/evaluate/read sequence
/// against all other tasks. Lookups degrade failures to absence; only
/// navigation reports an error, because a failed navigation invalidates
/// the whole interaction.
pub struct RendererSession<'a> {
    page: MutexGuard<'a, Page>,
    wait_timeout: Duration,
}

impl RendererSession<'_> {
    /// Navigates the shared page to `url`.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(CrawlError::Renderer)?;
        Ok(())
    }

    /// Polls `document.readyState` until complete or the wait bound lapses.
    ///
    /// Best effort: returns false on timeout so callers can log and keep
    /// going with whatever has rendered.
    pub async fn wait_until_ready(&self) -> bool {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            if let Ok(value) = self.evaluate("document.readyState").await {
                if value.as_str() == Some("complete") {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Runs a script in the page and returns its JSON value.
    pub async fn evaluate(&self, script: &str) -> Result<Value> {
        let outcome = self
            .page
            .evaluate(script)
            .await
            .map_err(CrawlError::Renderer)?;
        Ok(outcome.into_value::<Value>().unwrap_or(Value::Null))
    }

    /// Scrolls the page to the bottom of the document.
    pub async fn scroll_to_bottom(&self) -> Result<()> {
        self.evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map(|_| ())
    }

    /// Current page title, if any.
    pub async fn title(&self) -> Option<String> {
        self.page.get_title().await.ok().flatten()
    }

    /// First element matching `selector`, without waiting.
    pub async fn find(&self, selector: &str) -> Option<Element> {
        self.page.find_element(selector).await.ok()
    }

    /// All elements matching `selector`, in document order.
    pub async fn find_all(&self, selector: &str) -> Vec<Element> {
        self.page.find_elements(selector).await.unwrap_or_default()
    }

    /// Polls for an element until found or the wait bound lapses.
    pub async fn find_within(&self, selector: &str) -> Option<Element> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Some(element);
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(READY_POLL_INTERVAL).await;
        }
    }
}

/// Rendered text of an element, or `None` when the read fails.
pub async fn text_of(element: &Element) -> Option<String> {
    element.inner_text().await.ok().flatten()
}

/// Attribute value of an element, or `None` when absent or unreadable.
pub async fn attribute_of(element: &Element, name: &str) -> Option<String> {
    element.attribute(name).await.ok().flatten()
}

/// First descendant of an element matching `selector`.
pub async fn find_in(element: &Element, selector: &str) -> Option<Element> {
    element.find_element(selector).await.ok()
}
