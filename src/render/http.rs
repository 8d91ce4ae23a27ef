//! Plain HTTP backend
//!
//! Fetches documents without executing scripts. Useful against mirrors,
//! pre-rendered dumps and local fixtures; it cannot pass a live anti-bot
//! challenge.

use crate::render::{BrowserSession, RenderError, SessionLauncher};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Builds an HTTP client with the configured user agent
///
/// # Arguments
///
/// * `user_agent` - Value of the `User-Agent` header
/// * `timeout` - Total request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Launches HTTP "sessions" that share nothing but a client configuration
#[derive(Debug, Clone)]
pub struct HttpLauncher {
    user_agent: String,
    timeout: Duration,
}

impl HttpLauncher {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SessionLauncher for HttpLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, RenderError> {
        let client = build_http_client(&self.user_agent, self.timeout)
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        Ok(Box::new(HttpSession {
            client,
            document: None,
        }))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

struct HttpSession {
    client: Client,
    document: Option<String>,
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.document = None;

        let navigation_error = |message: String| RenderError::Navigation {
            url: url.to_string(),
            message,
        };

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                navigation_error("Request timeout".to_string())
            } else if e.is_connect() {
                navigation_error("Connection refused".to_string())
            } else {
                navigation_error(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(navigation_error(format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;
        self.document = Some(body);
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, RenderError> {
        self.document.clone().ok_or(RenderError::NoDocument)
    }

    async fn quit(&mut self) -> Result<(), RenderError> {
        self.document = None;
        Ok(())
    }
}
