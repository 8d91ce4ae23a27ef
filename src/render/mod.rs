//! Render gateway for script-rendered pages
//!
//! This module contains everything needed to turn a URL into rendered HTML:
//! - The `BrowserSession` / `SessionLauncher` seam over automation backends
//! - A headless Chromium backend driven over CDP
//! - A plain HTTP backend for mirrors and cached dumps
//! - The `RenderGateway`, which owns one session, waits out anti-bot
//!   challenges and retries a failed navigation exactly once

mod chromium;
mod gateway;
mod http;

pub use chromium::ChromiumLauncher;
pub use gateway::RenderGateway;
pub use http::{build_http_client, HttpLauncher};

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while rendering a page
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Failed to start browser session: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("No document has been loaded in this session")]
    NoDocument,

    #[error("Rendering {url} failed after {attempts} attempts: {message}")]
    RenderFailure {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Render cancelled")]
    Cancelled,
}

impl RenderError {
    /// Returns true if a fresh session might succeed where this one failed
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Navigation { .. } | Self::NoDocument)
    }
}

/// One live browser automation session
///
/// Sessions hold a single "current page"; callers must not interleave
/// navigations on the same session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigates the session to a URL
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// Reads the current rendered document
    async fn page_source(&mut self) -> Result<String, RenderError>;

    /// Shuts the session down
    async fn quit(&mut self) -> Result<(), RenderError>;
}

/// Creates browser sessions on demand
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Starts a new session
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, RenderError>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
