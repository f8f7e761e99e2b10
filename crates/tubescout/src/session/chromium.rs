//! Chromium-based session provider using chromiumoxide.
//!
//! Every session launches its own Chromium process with a throwaway profile
//! directory, so cookies and site state never leak between concurrent terms.

use super::{BrowserSession, PageElement, SessionProvider};
use crate::config::OptionsConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Poll interval while waiting for a selector to appear.
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.documentElement.scrollHeight);";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. TUBESCOUT_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("TUBESCOUT_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.tubescout/chromium/
    if let Some(dir) = dirs::home_dir().map(|home| home.join(".tubescout/chromium")) {
        for candidate in [dir.join("chrome"), dir.join("chrome-linux64/chrome")] {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches one Chromium instance per session.
pub struct ChromiumProvider {
    options: OptionsConfig,
    executable: Option<PathBuf>,
}

impl ChromiumProvider {
    pub fn new(options: OptionsConfig) -> Self {
        Self {
            options,
            executable: None,
        }
    }

    /// Use an explicit Chromium binary instead of searching for one.
    pub fn with_executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }

    fn browser_config(&self, chrome_path: PathBuf, profile_dir: PathBuf) -> Result<BrowserConfig> {
        let opts = &self.options;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(profile_dir)
            .window_size(opts.window_width, opts.window_height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!(
                "--window-size={},{}",
                opts.window_width, opts.window_height
            ))
            .arg(format!("--lang={}", opts.lang))
            .arg(format!("--user-agent={}", opts.user_agent));

        builder = if opts.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };

        builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))
    }
}

#[async_trait]
impl SessionProvider for ChromiumProvider {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let chrome_path = self
            .executable
            .clone()
            .or_else(find_chromium)
            .context("Chromium not found. Set TUBESCOUT_CHROMIUM_PATH.")?;

        let profile_dir = std::env::temp_dir().join(format!(
            "tubescout-profile-{}",
            uuid::Uuid::new_v4().simple()
        ));
        let config = self.browser_config(chrome_path, profile_dir.clone())?;

        tracing::info!("Launching Chromium session");
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                let _ = std::fs::remove_dir_all(&profile_dir);
                bail!("failed to create new page: {e}");
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page: Some(page),
            handler_task,
            profile_dir,
            navigation_timeout: self.options.navigation_timeout(),
        }))
    }
}

/// A single Chromium instance with one page.
pub struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
    navigation_timeout: Duration,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page> {
        self.page.as_ref().context("page already closed")
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let timeout_ms = self.navigation_timeout.as_millis();
        let page = self.page()?;

        let result = tokio::time::timeout(self.navigation_timeout, page.goto(url)).await;

        match result {
            Ok(Ok(_)) => {
                // Wait for page to be loaded
                let _ = page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<bool> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;
        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.page()?
            .evaluate(SCROLL_SCRIPT)
            .await
            .context("scroll script failed")?;
        Ok(())
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        let elements = self
            .page()?
            .find_elements(selector)
            .await
            .with_context(|| format!("failed to query '{selector}'"))?;

        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromiumElement { element }) as Box<dyn PageElement>)
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        if let Some(page) = this.page.take() {
            let _ = page.close().await;
        }
        let closed = this.browser.close().await;
        let _ = this.browser.wait().await;
        this.handler_task.abort();
        let _ = std::fs::remove_dir_all(&this.profile_dir);
        closed.context("failed to close Chromium")?;
        Ok(())
    }
}

/// A result element inside a Chromium page.
pub struct ChromiumElement {
    element: Element,
}

#[async_trait]
impl PageElement for ChromiumElement {
    async fn child_text(&self, selector: &str) -> Result<String> {
        let found = self.element.find_element(selector).await?;
        let text = found.inner_text().await?.unwrap_or_default();
        Ok(text.trim().to_string())
    }

    async fn child_attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let found = self.element.find_element(selector).await?;
        Ok(found.attribute(name).await?)
    }
}
