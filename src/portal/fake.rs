//! Scripted portal page for unit tests.
//!
//! Records every interaction so tests can assert ordering and retry counts,
//! and plays back configured portal behavior (hidden elements, controls that
//! render only after repeated attempts, downloads that never fire).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::{CapturedDownload, PortalPage};

#[derive(Default)]
pub struct FakePage {
    calls: Mutex<Vec<String>>,
    hidden: HashSet<String>,
    visible_after_failures: Mutex<HashMap<String, u32>>,
    missing_texts: HashSet<String>,
    never_enabled: HashSet<String>,
    texts: HashMap<String, String>,
    download: Option<CapturedDownload>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    /// The selector never becomes visible.
    pub fn hide(mut self, selector: &str) -> Self {
        self.hidden.insert(selector.to_string());
        self
    }

    /// Visibility waits on the selector fail `failures` times, then succeed.
    pub fn visible_after(self, selector: &str, failures: u32) -> Self {
        self.visible_after_failures
            .lock()
            .unwrap()
            .insert(selector.to_string(), failures);
        self
    }

    /// No control with this visible text exists.
    pub fn without_text_control(mut self, text: &str) -> Self {
        self.missing_texts.insert(text.to_string());
        self
    }

    /// The selector never reports enabled.
    pub fn never_enable(mut self, selector: &str) -> Self {
        self.never_enabled.insert(selector.to_string());
        self
    }

    /// The next armed download capture resolves with this download.
    pub fn with_download(mut self, download: CapturedDownload) -> Self {
        self.download = Some(download);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn call_position(&self, call: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.as_str() == call)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PortalPage for FakePage {
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.record(format!("wait_visible {selector}"));
        if self.hidden.contains(selector) {
            return Err(Error::timeout(
                format!("{selector} to become visible"),
                timeout,
            ));
        }
        if let Some(remaining) = self
            .visible_after_failures
            .lock()
            .unwrap()
            .get_mut(selector)
        {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::timeout(
                    format!("{selector} to become visible"),
                    timeout,
                ));
            }
        }
        Ok(())
    }

    async fn probe_visible(&self, selector: &str, _timeout: Duration) -> Result<bool> {
        self.record(format!("probe_visible {selector}"));
        Ok(!self.hidden.contains(selector))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.record(format!("click {selector}"));
        Ok(())
    }

    async fn click_text(&self, text: &str) -> Result<()> {
        self.record(format!("click_text {text}"));
        if self.missing_texts.contains(text) {
            return Err(Error::engine(format!(
                "no control with visible text {text:?}"
            )));
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str, _delay: Duration) -> Result<()> {
        self.record(format!("type {selector} {text}"));
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> Result<String> {
        self.record(format!("read {selector}"));
        self.texts
            .get(selector)
            .cloned()
            .ok_or_else(|| Error::engine(format!("no element matches {selector}")))
    }

    async fn select_value(&self, selector: &str, value: &str) -> Result<()> {
        self.record(format!("select {selector} {value}"));
        Ok(())
    }

    async fn dispatch_change(&self, selector: &str) -> Result<()> {
        self.record(format!("change {selector}"));
        Ok(())
    }

    async fn wait_enabled(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.record(format!("wait_enabled {selector}"));
        if self.never_enabled.contains(selector) {
            return Err(Error::timeout(
                format!("{selector} to become enabled"),
                timeout,
            ));
        }
        Ok(())
    }

    async fn wait_network_idle(&self) -> Result<()> {
        self.record("wait_network_idle".to_string());
        Ok(())
    }

    async fn next_download(&self) -> Result<CapturedDownload> {
        self.record("arm_download".to_string());
        match &self.download {
            Some(download) => Ok(download.clone()),
            None => std::future::pending().await,
        }
    }
}
