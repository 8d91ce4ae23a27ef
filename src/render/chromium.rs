//! Headless Chromium backend
//!
//! Drives a local Chromium over the DevTools protocol. The CDP handler
//! stream must be polled for the browser to make progress, so each session
//! owns a background task that drains it.

use crate::render::{BrowserSession, RenderError, SessionLauncher};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Launches Chromium sessions
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    headless: bool,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ChromiumLauncher {
    /// Creates a launcher
    ///
    /// # Arguments
    ///
    /// * `headless` - Run without a visible window
    /// * `timeout` - CDP request timeout, which bounds each navigation
    /// * `user_agent` - Override for the browser's user agent string
    pub fn new(headless: bool, timeout: Duration, user_agent: Option<String>) -> Self {
        Self {
            headless,
            timeout,
            user_agent,
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(self.timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run");

        if !self.headless {
            builder = builder.with_head();
        }

        if let Some(user_agent) = &self.user_agent {
            builder = builder.arg(format!("--user-agent={}", user_agent));
        }

        builder.build().map_err(RenderError::Launch)
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, RenderError> {
        let config = self.browser_config()?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(RenderError::Launch(e.to_string()));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            loaded: false,
        }))
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

/// A live Chromium process with one tab
struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    loaded: bool,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.loaded = false;
        self.page
            .goto(url)
            .await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        self.loaded = true;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, RenderError> {
        if !self.loaded {
            return Err(RenderError::NoDocument);
        }

        match self.page.content().await {
            Ok(html) => Ok(html),
            Err(e) => Err(RenderError::Navigation {
                url: self.page.url().await.ok().flatten().unwrap_or_default(),
                message: e.to_string(),
            }),
        }
    }

    async fn quit(&mut self) -> Result<(), RenderError> {
        let result = self.browser.close().await;
        if result.is_ok() {
            let _ = self.browser.wait().await;
        }
        self.handler_task.abort();
        result
            .map(|_| ())
            .map_err(|e| RenderError::Launch(format!("failed to close browser: {}", e)))
    }
}
