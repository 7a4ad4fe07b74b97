//! Post-login navigation to the transaction export form.
//!
//! Sequential, non-branching except for one documented retry: the portal's
//! export form intermittently fails to render on the first click of the
//! export link, and the recovery is to repeat that click exactly once.

use std::time::Duration;

use tracing::info;

use crate::error::{Error, Result};
use crate::portal::{selectors, PortalPage};

const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);
const FORMAT_CONTROL_TIMEOUT: Duration = Duration::from_secs(5);
const SUBMIT_ENABLED_TIMEOUT: Duration = Duration::from_secs(10);

/// Export parameters fixed for the run.
///
/// Neither value is validated locally; the portal's own UI is the only
/// authority on which accounts and formats exist.
#[derive(Debug, Clone)]
pub struct ExportParameters {
    /// Option value of the account entry on the export form.
    pub account: String,
    /// Radio id of the export format on the export form.
    pub format: String,
}

/// Walks the portal from the authenticated landing page to an export form
/// that is ready to submit.
pub struct ExportFlowController<'a, P: PortalPage + ?Sized> {
    page: &'a P,
    params: &'a ExportParameters,
}

impl<'a, P: PortalPage + ?Sized> ExportFlowController<'a, P> {
    pub fn new(page: &'a P, params: &'a ExportParameters) -> Self {
        Self { page, params }
    }

    pub async fn prepare(&self) -> Result<()> {
        self.open_export_form().await?;
        self.configure_form().await
    }

    async fn open_export_form(&self) -> Result<()> {
        self.page
            .wait_visible(selectors::ACCOUNT_SERVICES_LINK, VISIBILITY_TIMEOUT)
            .await?;
        info!("opening account services");
        self.page.click(selectors::ACCOUNT_SERVICES_LINK).await?;
        self.page.wait_network_idle().await?;

        self.page
            .wait_visible(selectors::DOWNLOAD_TRANSACTIONS_LINK, VISIBILITY_TIMEOUT)
            .await?;
        info!("opening transaction export");
        self.page.click(selectors::DOWNLOAD_TRANSACTIONS_LINK).await?;
        self.wait_for_format_control().await
    }

    /// One repeat click of the triggering link, then one repeat wait with the
    /// same bound. The retry target is the link, not the stuck form control.
    async fn wait_for_format_control(&self) -> Result<()> {
        let format_radio = selectors::format_radio(&self.params.format);
        match self
            .page
            .wait_visible(&format_radio, FORMAT_CONTROL_TIMEOUT)
            .await
        {
            Ok(()) => return Ok(()),
            Err(Error::Timeout { .. }) => {}
            Err(err) => return Err(err),
        }

        info!("export form did not render, repeating the link click");
        self.page.click(selectors::DOWNLOAD_TRANSACTIONS_LINK).await?;
        self.page
            .wait_visible(&format_radio, FORMAT_CONTROL_TIMEOUT)
            .await
            .map_err(|err| match err {
                Error::Timeout { .. } => Error::Navigation {
                    step: "export-format-control",
                    detail: format!("{format_radio} did not appear after one repeat click"),
                },
                other => other,
            })
    }

    async fn configure_form(&self) -> Result<()> {
        let format_radio = selectors::format_radio(&self.params.format);
        self.page.click(&format_radio).await?;

        self.page
            .select_value(selectors::ACCOUNT_SELECT, &self.params.account)
            .await?;
        // The portal does not always react to selection alone.
        self.page.dispatch_change(selectors::ACCOUNT_SELECT).await?;

        // The submit control is re-enabled asynchronously after account
        // selection; a premature click is swallowed by the portal, not
        // merely delayed.
        self.page
            .wait_enabled(selectors::CONTINUE_BUTTON, SUBMIT_ENABLED_TIMEOUT)
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::portal::fake::FakePage;

    use super::*;

    fn params() -> ExportParameters {
        ExportParameters {
            account: "C001".to_string(),
            format: "Excel".to_string(),
        }
    }

    fn link_click() -> String {
        format!("click {}", selectors::DOWNLOAD_TRANSACTIONS_LINK)
    }

    fn format_wait() -> String {
        format!("wait_visible {}", selectors::format_radio("Excel"))
    }

    #[tokio::test]
    async fn happy_path_configures_the_form() {
        let page = FakePage::new();
        let params = params();

        ExportFlowController::new(&page, &params)
            .prepare()
            .await
            .unwrap();

        let calls = page.calls();
        let expected = [
            "wait_visible #accountServicesLocal".to_string(),
            "click #accountServicesLocal".to_string(),
            "wait_network_idle".to_string(),
            format!("wait_visible {}", selectors::DOWNLOAD_TRANSACTIONS_LINK),
            link_click(),
            format_wait(),
            format!("click {}", selectors::format_radio("Excel")),
            "select #accountInfo C001".to_string(),
            "change #accountInfo".to_string(),
            "wait_enabled #id_btn_continue".to_string(),
        ];
        assert_eq!(calls, expected);
    }

    #[tokio::test]
    async fn one_lost_click_is_recovered_by_a_single_retry() {
        let page = FakePage::new().visible_after(&selectors::format_radio("Excel"), 1);
        let params = params();

        ExportFlowController::new(&page, &params)
            .prepare()
            .await
            .unwrap();

        assert_eq!(page.count_calls(&link_click()), 2);
        assert_eq!(page.count_calls(&format_wait()), 2);
    }

    #[tokio::test]
    async fn second_lost_click_is_a_navigation_error() {
        let page = FakePage::new().visible_after(&selectors::format_radio("Excel"), 2);
        let params = params();

        let err = ExportFlowController::new(&page, &params)
            .prepare()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Navigation {
                step: "export-format-control",
                ..
            }
        ));
        // Exactly one retry: two clicks, two waits, never a third.
        assert_eq!(page.count_calls(&link_click()), 2);
        assert_eq!(page.count_calls(&format_wait()), 2);
    }

    #[tokio::test]
    async fn submit_never_enabling_times_out() {
        let page = FakePage::new().never_enable(selectors::CONTINUE_BUTTON);
        let params = params();

        let err = ExportFlowController::new(&page, &params)
            .prepare()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_account_services_times_out() {
        let page = FakePage::new().hide(selectors::ACCOUNT_SERVICES_LINK);
        let params = params();

        let err = ExportFlowController::new(&page, &params)
            .prepare()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(page.count_calls("click #accountServicesLocal"), 0);
    }
}
