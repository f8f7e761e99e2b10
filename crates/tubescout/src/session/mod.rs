//! Browser session abstraction.
//!
//! Defines the `BrowserSession`, `PageElement` and `SessionProvider` traits
//! that abstract over the browser engine (currently Chromium via
//! chromiumoxide), plus `SessionGuard`, the scoped owner that guarantees a
//! session is torn down on every exit path.

pub mod chromium;

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// One isolated browser instance, used for exactly one search term.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to a URL and wait for the load to settle.
    async fn navigate(&mut self, url: &str) -> Result<()>;
    /// Wait until `selector` matches an element. `Ok(false)` on timeout.
    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<bool>;
    /// Scroll the document to its current bottom edge.
    async fn scroll_to_bottom(&mut self) -> Result<()>;
    /// All elements currently matching `selector`.
    async fn find_elements(&mut self, selector: &str) -> Result<Vec<Box<dyn PageElement>>>;
    /// Shut the session down and release the browser.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A handle to one element on the rendered page.
#[async_trait]
pub trait PageElement: Send + Sync {
    /// Trimmed text of the first descendant matching `selector`.
    async fn child_text(&self, selector: &str) -> Result<String>;
    /// Attribute `name` of the first descendant matching `selector`.
    async fn child_attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;
}

/// Supplies a fresh, unshared browser session per request.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Scoped owner of a browser session.
///
/// Two cleanup paths:
/// 1. `close()` awaits teardown and reports its error.
/// 2. `Drop`: if the guard is dropped without `close()` (an early `?`, a
///    panic in the extractor, an aborted task), teardown is spawned on the
///    runtime captured at acquisition.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
    runtime: tokio::runtime::Handle,
}

impl SessionGuard {
    /// Open a session from `provider`. Must be called inside a tokio runtime.
    pub async fn acquire(provider: &dyn SessionProvider) -> Result<Self> {
        let session = provider.open().await?;
        Ok(Self {
            session: Some(session),
            runtime: tokio::runtime::Handle::current(),
        })
    }

    /// Borrow the live session.
    pub fn session_mut(&mut self) -> Result<&mut dyn BrowserSession> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(anyhow!("session already closed")),
        }
    }

    /// Close the session, consuming the guard.
    pub async fn close(mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => {
                tracing::debug!("Closing browser session");
                session.close().await
            }
            None => Ok(()),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.runtime.spawn(async move {
                if let Err(e) = session.close().await {
                    tracing::warn!("Session cleanup on drop failed: {e:#}");
                } else {
                    tracing::trace!("Session cleanup on drop succeeded");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSession {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserSession for CountingSession {
        async fn navigate(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }
        async fn wait_for_element(&mut self, _selector: &str, _timeout: Duration) -> Result<bool> {
            Ok(true)
        }
        async fn scroll_to_bottom(&mut self) -> Result<()> {
            Ok(())
        }
        async fn find_elements(&mut self, _selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
            Ok(Vec::new())
        }
        async fn close(self: Box<Self>) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingProvider {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionProvider for CountingProvider {
        async fn open(&self) -> Result<Box<dyn BrowserSession>> {
            Ok(Box::new(CountingSession {
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    #[tokio::test]
    async fn test_explicit_close() {
        let closed = Arc::new(AtomicUsize::new(0));
        let provider = CountingProvider {
            closed: Arc::clone(&closed),
        };
        let mut guard = SessionGuard::acquire(&provider).await.unwrap();
        guard.session_mut().unwrap().navigate("about:blank").await.unwrap();
        guard.close().await.unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_spawns_close() {
        let closed = Arc::new(AtomicUsize::new(0));
        let provider = CountingProvider {
            closed: Arc::clone(&closed),
        };
        {
            let _guard = SessionGuard::acquire(&provider).await.unwrap();
        }
        // Let the spawned cleanup run.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
