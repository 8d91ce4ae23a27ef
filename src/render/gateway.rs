//! Render gateway implementation
//!
//! The gateway owns at most one live session. The session is created lazily
//! on the first fetch, guarded by an async mutex so navigations never
//! interleave, and torn down by `close()`.

use crate::render::{BrowserSession, RenderError, SessionLauncher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Maximum navigation attempts per fetch (the first try plus one restart)
const MAX_ATTEMPTS: u32 = 2;

/// Owns one browser session and renders pages through it
pub struct RenderGateway {
    launcher: Arc<dyn SessionLauncher>,
    session: Mutex<Option<Box<dyn BrowserSession>>>,
    settle: Duration,
}

impl RenderGateway {
    /// Creates a gateway without starting a session
    ///
    /// # Arguments
    ///
    /// * `launcher` - Backend used to start sessions
    /// * `settle` - Time to wait after navigation for challenges and
    ///   client-side rendering to finish
    pub fn new(launcher: Arc<dyn SessionLauncher>, settle: Duration) -> Self {
        Self {
            launcher,
            session: Mutex::new(None),
            settle,
        }
    }

    /// Starts the session eagerly if it is not running yet
    pub async fn open(&self) -> Result<(), RenderError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        Ok(())
    }

    /// Returns true if a session is currently live
    pub async fn is_open(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Renders a URL and returns the document HTML
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Session not started | Launch lazily |
    /// | Transport error | Restart session, retry once |
    /// | Second transport error | `RenderFailure` |
    /// | Launch failure | Returned as is |
    /// | Cancellation | `Cancelled`, no retry |
    pub async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> Result<String, RenderError> {
        let mut guard = self.session.lock().await;
        let mut last_error = None;

        for attempt in 1..=MAX_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }

            if guard.is_none() {
                match self.launch().await {
                    Ok(session) => *guard = Some(session),
                    Err(e) if attempt == 1 => return Err(e),
                    Err(e) => {
                        last_error = Some(e);
                        break;
                    }
                }
            }

            let Some(session) = guard.as_mut() else {
                continue;
            };

            let result = tokio::select! {
                _ = cancel.cancelled() => Err(RenderError::Cancelled),
                result = render_once(session.as_mut(), url.as_str(), self.settle) => result,
            };

            match result {
                Ok(html) => {
                    tracing::debug!("Rendered {} ({} bytes)", url, html.len());
                    return Ok(html);
                }
                Err(e) if e.is_transport() => {
                    tracing::warn!(
                        "Render attempt {}/{} for {} failed: {}",
                        attempt,
                        MAX_ATTEMPTS,
                        url,
                        e
                    );
                    if let Some(mut broken) = guard.take() {
                        if let Err(quit_err) = broken.quit().await {
                            tracing::debug!("Ignoring error while discarding session: {}", quit_err);
                        }
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(RenderError::RenderFailure {
            url: url.to_string(),
            attempts: MAX_ATTEMPTS,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Shuts the session down; calling it again is a no-op
    pub async fn close(&self) -> Result<(), RenderError> {
        let mut guard = self.session.lock().await;
        if let Some(mut session) = guard.take() {
            tracing::info!("Closing {} session", self.launcher.name());
            session.quit().await?;
        }
        Ok(())
    }

    async fn launch(&self) -> Result<Box<dyn BrowserSession>, RenderError> {
        tracing::info!("Starting {} session", self.launcher.name());
        self.launcher.launch().await
    }
}

/// Navigates, waits for the page to settle, then reads the document
async fn render_once(
    session: &mut dyn BrowserSession,
    url: &str,
    settle: Duration,
) -> Result<String, RenderError> {
    session.navigate(url).await?;
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    session.page_source().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` navigations across all sessions
    struct FlakyLauncher {
        launches: Arc<AtomicU32>,
        quits: Arc<AtomicU32>,
        failures: Arc<AtomicU32>,
    }

    struct FlakySession {
        failures: Arc<AtomicU32>,
        quits: Arc<AtomicU32>,
        current: Option<String>,
    }

    #[async_trait]
    impl BrowserSession for FlakySession {
        async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(RenderError::Navigation {
                    url: url.to_string(),
                    message: "connection reset".to_string(),
                });
            }
            self.current = Some(format!("<html><body>{}</body></html>", url));
            Ok(())
        }

        async fn page_source(&mut self) -> Result<String, RenderError> {
            self.current.clone().ok_or(RenderError::NoDocument)
        }

        async fn quit(&mut self) -> Result<(), RenderError> {
            self.quits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl SessionLauncher for FlakyLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, RenderError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FlakySession {
                failures: self.failures.clone(),
                quits: self.quits.clone(),
                current: None,
            }))
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    struct Counters {
        launches: Arc<AtomicU32>,
        quits: Arc<AtomicU32>,
    }

    fn gateway(failures: u32) -> (RenderGateway, Counters) {
        let launches = Arc::new(AtomicU32::new(0));
        let quits = Arc::new(AtomicU32::new(0));
        let launcher = FlakyLauncher {
            launches: launches.clone(),
            quits: quits.clone(),
            failures: Arc::new(AtomicU32::new(failures)),
        };
        (
            RenderGateway::new(Arc::new(launcher), Duration::ZERO),
            Counters { launches, quits },
        )
    }

    fn url() -> Url {
        Url::parse("https://partsouq.com/en/catalog/genuine/groups/?c=TOYOTA00").unwrap()
    }

    #[tokio::test]
    async fn test_session_is_created_lazily() {
        let (gateway, counters) = gateway(0);
        assert!(!gateway.is_open().await);
        assert_eq!(counters.launches.load(Ordering::SeqCst), 0);

        let html = gateway.fetch(&url(), &CancellationToken::new()).await.unwrap();
        assert!(html.contains("groups"));
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
        assert!(gateway.is_open().await);
    }

    #[tokio::test]
    async fn test_session_is_reused() {
        let (gateway, counters) = gateway(0);
        let cancel = CancellationToken::new();
        gateway.fetch(&url(), &cancel).await.unwrap();
        gateway.fetch(&url(), &cancel).await.unwrap();
        assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_failure_restarts_and_retries() {
        let (gateway, counters) = gateway(1);
        let html = gateway.fetch(&url(), &CancellationToken::new()).await;
        assert!(html.is_ok());
        assert_eq!(counters.launches.load(Ordering::SeqCst), 2);
        assert_eq!(counters.quits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_failure_surfaces_render_failure() {
        let (gateway, counters) = gateway(5);
        let err = gateway
            .fetch(&url(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::RenderFailure { attempts: 2, .. }));
        assert_eq!(counters.launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_does_not_navigate() {
        let (gateway, counters) = gateway(0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = gateway.fetch(&url(), &cancel).await.unwrap_err();
        assert_eq!(err, RenderError::Cancelled);
        assert_eq!(counters.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_settle_wait() {
        let launcher = FlakyLauncher {
            launches: Arc::new(AtomicU32::new(0)),
            quits: Arc::new(AtomicU32::new(0)),
            failures: Arc::new(AtomicU32::new(0)),
        };
        let gateway = RenderGateway::new(Arc::new(launcher), Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = gateway.fetch(&url(), &cancel).await.unwrap_err();
        assert_eq!(err, RenderError::Cancelled);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (gateway, counters) = gateway(0);
        gateway.open().await.unwrap();
        gateway.close().await.unwrap();
        gateway.close().await.unwrap();
        assert_eq!(counters.quits.load(Ordering::SeqCst), 1);
        assert!(!gateway.is_open().await);
    }
}
