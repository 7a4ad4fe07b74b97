//! Selectors identifying the portal's life-cycle states.
//!
//! These pin the exact shape of the portal this automation understands; if
//! the portal changes, the flows fail loudly rather than guessing.

pub const COOKIE_ACCEPT: &str = "#onetrust-accept-btn-handler";

pub const USERNAME_INPUT: &str = "#userName";
pub const PASSWORD_INPUT: &str = "#password";
pub const SIGNIN_NEXT: &str = "#signinNext";

/// Visible text of the control that opens the alternate verification list.
pub const MFA_OTHER_OPTIONS: &str = "Select Another Option";
/// Visible text of the personal-verification-question entry in that list.
pub const MFA_PVQ_OPTION: &str = "Personal Verification Question";

pub const PVQ_QUESTION_LABEL: &str = r#"label[for="pvqQInput"]"#;
pub const PVQ_ANSWER_INPUT: &str = "#pvqQInput";
pub const PVQ_CONTINUE: &str = r#"button[data-testid="pvq_continue_button"]"#;

pub const ACCOUNT_SERVICES_LINK: &str = "#accountServicesLocal";
pub const DOWNLOAD_TRANSACTIONS_LINK: &str = r#"a[data-dig-id="OLB_PMSM_404"]"#;
pub const ACCOUNT_SELECT: &str = "#accountInfo";
pub const CONTINUE_BUTTON: &str = "#id_btn_continue";

/// Radio input for an export format id (e.g. `Excel`).
pub fn format_radio(format: &str) -> String {
    format!(r#"input#{format}[type="radio"]"#)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_radio_embeds_the_format_id() {
        assert_eq!(format_radio("Excel"), r#"input#Excel[type="radio"]"#);
    }
}
