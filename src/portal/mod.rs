//! Page-interaction capability consumed by the login and export flows.
//!
//! The browser engine itself is an external collaborator; the flows only see
//! this trait. Waits suspend the current task until the condition holds or
//! the bound elapses; a timeout surfaces as [`crate::Error::Timeout`] except
//! for [`PortalPage::probe_visible`], which reports absence.

pub mod selectors;

mod chromium;

#[cfg(test)]
pub(crate) mod fake;

pub use chromium::{ChromiumPage, PortalSession};

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// A file the portal handed to the engine, staged but not yet persisted.
#[derive(Debug, Clone)]
pub struct CapturedDownload {
    /// Filename suggested by the environment. Untrusted.
    pub suggested_filename: String,
    /// Where the engine staged the bytes.
    pub staged_path: PathBuf,
}

#[async_trait]
pub trait PortalPage: Send + Sync {
    /// Block until the element is visible, up to `timeout`.
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Non-fatal visibility probe: `Ok(false)` when the element never shows.
    async fn probe_visible(&self, selector: &str, timeout: Duration) -> Result<bool>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Click a control located by its exact visible text.
    async fn click_text(&self, text: &str) -> Result<()>;

    /// Type into the element with a fixed inter-key delay.
    async fn type_text(&self, selector: &str, text: &str, delay: Duration) -> Result<()>;

    /// Read the element's text content verbatim.
    async fn text_content(&self, selector: &str) -> Result<String>;

    /// Select an option of a `<select>` element by value.
    async fn select_value(&self, selector: &str, value: &str) -> Result<()>;

    /// Dispatch a bubbling change event on the element.
    async fn dispatch_change(&self, selector: &str) -> Result<()>;

    /// Block until the element reports an enabled state.
    async fn wait_enabled(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Block until in-flight navigation settles.
    async fn wait_network_idle(&self) -> Result<()>;

    /// Resolve with the next download the portal hands to the engine.
    ///
    /// Implementations must capture their observing state on first poll, so
    /// that a caller polling this future before running a triggering action
    /// cannot miss a download that fires immediately.
    async fn next_download(&self) -> Result<CapturedDownload>;
}
