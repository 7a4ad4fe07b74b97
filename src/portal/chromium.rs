//! chromiumoxide-backed implementation of the portal capability.
//!
//! The engine has no built-in waits, so visibility and enabled-state checks
//! are bounded polls over in-page evaluation. Downloads are routed into a
//! staging directory next to the final download directory and observed there;
//! a file counts as ready once it exists under its final name (Chromium keeps
//! in-flight downloads under a `.crdownload` suffix).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

use super::{CapturedDownload, PortalPage};

const ELEMENT_POLL: Duration = Duration::from_millis(100);
const DOWNLOAD_POLL: Duration = Duration::from_millis(500);
const PARTIAL_DOWNLOAD_SUFFIX: &str = ".crdownload";

/// A live, isolated browser session against the portal.
pub struct PortalSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: ChromiumPage,
}

impl PortalSession {
    /// Launch the browser and prepare a page configured for automatic
    /// file-save into a staging directory.
    pub async fn launch(config: &Config) -> Result<Self> {
        let executable = find_browser().ok_or_else(|| {
            Error::configuration(
                "no Chrome or Chromium executable found; install one or add it to PATH",
            )
        })?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .viewport(None)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(proxy) = &config.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        let browser_config = builder.build().map_err(Error::engine)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(Error::engine)?;
        let handler_task = tokio::spawn(async move { while (handler.next().await).is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(Error::engine)?;

        std::fs::create_dir_all(&config.download_dir).map_err(|source| Error::Filesystem {
            path: config.download_dir.clone(),
            source,
        })?;
        let staging_dir = tempfile::Builder::new()
            .prefix(".rbsee-staging-")
            .tempdir_in(&config.download_dir)
            .map_err(|source| Error::Filesystem {
                path: config.download_dir.clone(),
                source,
            })?;

        let download_params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(staging_dir.path().display().to_string())
            .build()
            .map_err(Error::engine)?;
        page.execute(download_params).await.map_err(Error::engine)?;

        Ok(Self {
            browser,
            handler_task,
            page: ChromiumPage {
                page,
                slow_mo: config.slow_mo,
                staging_dir,
            },
        })
    }

    pub fn page(&self) -> &ChromiumPage {
        &self.page
    }

    /// Open the portal URL and wait for the landing load to settle.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.page.page.goto(url).await.map_err(Error::engine)?;
        self.page
            .page
            .wait_for_navigation()
            .await
            .map_err(Error::engine)?;
        Ok(())
    }

    /// Tear the session down. Staged partial downloads are discarded.
    pub fn close(self) {
        drop(self.page);
        drop(self.browser);
        self.handler_task.abort();
    }
}

/// Page handle implementing [`PortalPage`] over CDP.
pub struct ChromiumPage {
    page: Page,
    slow_mo: Option<Duration>,
    staging_dir: TempDir,
}

impl ChromiumPage {
    async fn pace(&self) {
        if let Some(delay) = self.slow_mo {
            tokio::time::sleep(delay).await;
        }
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, expr: String) -> Result<T> {
        let result = self.page.evaluate(expr).await.map_err(Error::engine)?;
        result.into_value().map_err(Error::engine)
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let expr = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                const style = window.getComputedStyle(el);
                return rect.width > 0 && rect.height > 0
                    && style.visibility !== "hidden" && style.display !== "none";
            }})()"#,
            sel = js_string(selector)
        );
        self.eval(expr).await
    }

    async fn is_enabled(&self, selector: &str) -> Result<bool> {
        let expr = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                return !!el && !el.disabled;
            }})()"#,
            sel = js_string(selector)
        );
        self.eval(expr).await
    }
}

#[async_trait::async_trait]
impl PortalPage for ChromiumPage {
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(selector).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::timeout(
                    format!("{selector} to become visible"),
                    timeout,
                ));
            }
            tokio::time::sleep(ELEMENT_POLL).await;
        }
    }

    async fn probe_visible(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(selector).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(ELEMENT_POLL).await;
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.pace().await;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|err| Error::engine(format!("{selector}: {err}")))?;
        element.click().await.map_err(Error::engine)?;
        Ok(())
    }

    async fn click_text(&self, text: &str) -> Result<()> {
        self.pace().await;
        let expr = format!(
            r#"(() => {{
                const wanted = {wanted};
                const candidates =
                    document.querySelectorAll("button, [role='button'], a, span, div, label");
                for (const el of candidates) {{
                    if (el.textContent.trim() === wanted) {{
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            wanted = js_string(text)
        );
        if self.eval::<bool>(expr).await? {
            Ok(())
        } else {
            Err(Error::engine(format!(
                "no control with visible text {text:?}"
            )))
        }
    }

    async fn type_text(&self, selector: &str, text: &str, delay: Duration) -> Result<()> {
        self.pace().await;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|err| Error::engine(format!("{selector}: {err}")))?;
        element.click().await.map_err(Error::engine)?;
        for ch in text.chars() {
            element
                .type_str(ch.to_string())
                .await
                .map_err(Error::engine)?;
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn text_content(&self, selector: &str) -> Result<String> {
        let expr = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                return el ? el.textContent : null;
            }})()"#,
            sel = js_string(selector)
        );
        let text: Option<String> = self.eval(expr).await?;
        text.ok_or_else(|| Error::engine(format!("no element matches {selector}")))
    }

    async fn select_value(&self, selector: &str, value: &str) -> Result<()> {
        self.pace().await;
        let expr = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.value = {value};
                return true;
            }})()"#,
            sel = js_string(selector),
            value = js_string(value)
        );
        if self.eval::<bool>(expr).await? {
            Ok(())
        } else {
            Err(Error::engine(format!("no element matches {selector}")))
        }
    }

    async fn dispatch_change(&self, selector: &str) -> Result<()> {
        let expr = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.dispatchEvent(new Event("change", {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = js_string(selector)
        );
        if self.eval::<bool>(expr).await? {
            Ok(())
        } else {
            Err(Error::engine(format!("no element matches {selector}")))
        }
    }

    async fn wait_enabled(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_enabled(selector).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::timeout(
                    format!("{selector} to become enabled"),
                    timeout,
                ));
            }
            tokio::time::sleep(ELEMENT_POLL).await;
        }
    }

    async fn wait_network_idle(&self) -> Result<()> {
        self.page.wait_for_navigation().await.map_err(Error::engine)?;
        Ok(())
    }

    async fn next_download(&self) -> Result<CapturedDownload> {
        // The snapshot happens on first poll, before any trigger can act.
        let staging = self.staging_dir.path();
        let initial = list_files(staging)?;
        loop {
            tokio::time::sleep(DOWNLOAD_POLL).await;
            for path in list_files(staging)? {
                if initial.contains(&path) {
                    continue;
                }
                let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned())
                else {
                    continue;
                };
                if name.ends_with(PARTIAL_DOWNLOAD_SUFFIX) {
                    continue;
                }
                debug!(file = %name, "download landed in staging directory");
                return Ok(CapturedDownload {
                    suggested_filename: name,
                    staged_path: path,
                });
            }
        }
    }
}

fn list_files(dir: &Path) -> Result<HashSet<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|source| Error::Filesystem {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect())
}

/// Embed a string into an in-page expression as a JS string literal.
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

/// Find a Chrome/Chromium executable on PATH, with a few known fallbacks.
fn find_browser() -> Option<PathBuf> {
    const NAMES: [&str; 4] = [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ];
    for name in NAMES {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    const FALLBACKS: [&str; 3] = [
        "/snap/bin/chromium",
        "/run/current-system/sw/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    ];
    for candidate in FALLBACKS {
        if Path::new(candidate).exists() {
            return Some(PathBuf::from(candidate));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(js_string(r#"a"b"#), r#""a\"b""#);
    }
}
