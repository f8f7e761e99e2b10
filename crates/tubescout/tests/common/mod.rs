//! In-memory browser fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use tubescout::{BrowserSession, ExtractorRegistry, PageElement, Scraper, SessionProvider, TargetConfig};

/// One fake result container.
#[derive(Clone, Default)]
pub struct FakeItem {
    texts: HashMap<String, String>,
    hrefs: HashMap<String, String>,
    broken: HashSet<String>,
}

impl FakeItem {
    /// A channel container with a name and link, using default selectors.
    pub fn channel(name: &str, href: &str) -> Self {
        Self::default()
            .text("#text", name)
            .href("#main-link", href)
            .text("#subscribers", "1.2K subscribers")
            .text("#video-count", "42 videos")
            .text("#description", "A channel")
    }

    pub fn text(mut self, selector: &str, value: &str) -> Self {
        self.texts.insert(selector.to_string(), value.to_string());
        self
    }

    pub fn href(mut self, selector: &str, value: &str) -> Self {
        self.hrefs.insert(selector.to_string(), value.to_string());
        self
    }

    /// Make every lookup of `selector` fail.
    pub fn broken(mut self, selector: &str) -> Self {
        self.broken.insert(selector.to_string());
        self
    }
}

#[async_trait]
impl PageElement for FakeItem {
    async fn child_text(&self, selector: &str) -> Result<String> {
        if self.broken.contains(selector) {
            bail!("stale element: {selector}");
        }
        self.texts
            .get(selector)
            .cloned()
            .ok_or_else(|| anyhow!("no element matches {selector}"))
    }

    async fn child_attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        if self.broken.contains(selector) {
            bail!("stale element: {selector}");
        }
        if name != "href" {
            return Ok(None);
        }
        match self.hrefs.get(selector) {
            Some(href) => Ok(Some(href.clone())),
            None => bail!("no element matches {selector}"),
        }
    }
}

/// What the fake browser shows for a term.
#[derive(Clone)]
pub enum FakePage {
    /// Results that render normally.
    Results(Vec<FakeItem>),
    /// The result container never appears.
    Empty,
    /// Navigation fails.
    Broken,
    /// Reading the result containers panics.
    Panics,
}

/// Session lifecycle counters.
#[derive(Default)]
pub struct Stats {
    pub open_attempts: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub scrolls: AtomicUsize,
}

impl Stats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }
}

/// Serves scripted pages keyed by search term.
#[derive(Clone, Default)]
pub struct FakeProvider {
    pages: Arc<HashMap<String, FakePage>>,
    delay: Duration,
    failing_open: Option<usize>,
    pub stats: Arc<Stats>,
}

impl FakeProvider {
    pub fn new(pages: Vec<(&str, FakePage)>) -> Self {
        Self {
            pages: Arc::new(
                pages
                    .into_iter()
                    .map(|(term, page)| (term.to_string(), page))
                    .collect(),
            ),
            delay: Duration::ZERO,
            failing_open: None,
            stats: Arc::new(Stats::default()),
        }
    }

    /// Make the `n`th call to `open` (0-based) fail to launch.
    pub fn with_failing_open(mut self, n: usize) -> Self {
        self.failing_open = Some(n);
        self
    }

    /// Simulated page load time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let attempt = self.stats.open_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_open == Some(attempt) {
            bail!("browser process exited during startup");
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            pages: Arc::clone(&self.pages),
            delay: self.delay,
            stats: Arc::clone(&self.stats),
            current: None,
        }))
    }
}

struct FakeSession {
    pages: Arc<HashMap<String, FakePage>>,
    delay: Duration,
    stats: Arc<Stats>,
    current: Option<FakePage>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let url = url::Url::parse(url)?;
        let term = url
            .query_pairs()
            .find(|(k, _)| k == "search_query")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.pages.get(&term) {
            Some(FakePage::Broken) => bail!("net::ERR_CONNECTION_RESET for {term}"),
            Some(page) => self.current = Some(page.clone()),
            None => self.current = Some(FakePage::Empty),
        }
        Ok(())
    }

    async fn wait_for_element(&mut self, _selector: &str, _timeout: Duration) -> Result<bool> {
        Ok(matches!(
            self.current,
            Some(FakePage::Results(_)) | Some(FakePage::Panics)
        ))
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.stats.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_elements(&mut self, _selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        match &self.current {
            Some(FakePage::Panics) => panic!("renderer crashed while listing results"),
            Some(FakePage::Results(items)) => Ok(items
                .iter()
                .cloned()
                .map(|item| Box::new(item) as Box<dyn PageElement>)
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A channel config with no scroll pauses.
pub fn fast_config() -> TargetConfig {
    TargetConfig::from_toml_str(
        r#"
        type = "channel"

        [options]
        max_scroll = 2
        scroll_pause_ms = 0
        element_timeout_ms = 50
        "#,
    )
    .unwrap()
}

pub fn scraper(provider: &FakeProvider) -> Scraper {
    Scraper::new(
        fast_config(),
        Arc::new(provider.clone()),
        &ExtractorRegistry::with_defaults(),
    )
    .unwrap()
}

pub fn url(handle: &str) -> String {
    format!("https://www.youtube.com/@{handle}")
}

/// A result page listing the given handles.
pub fn results(handles: &[&str]) -> FakePage {
    FakePage::Results(
        handles
            .iter()
            .map(|h| FakeItem::channel(h, &url(h)))
            .collect(),
    )
}
