//! Portal login state machine.
//!
//! Linear progression with one optional branch (the cookie banner, which the
//! portal may or may not show) and no backtracking. Every transition blocks
//! on a bounded visibility wait before acting; the machine never proceeds on
//! an element that has not reported interactable.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::challenge::ChallengeResolver;
use crate::error::{Error, Result};
use crate::portal::{selectors, PortalPage};
use crate::provider::SecretProvider;

const COOKIE_BANNER_TIMEOUT: Duration = Duration::from_secs(3);
const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);
/// Pause after dismissing the banner so its removal animation settles.
const BANNER_SETTLE: Duration = Duration::from_millis(500);

const USERNAME_KEY_DELAY: Duration = Duration::from_millis(20);
const PASSWORD_KEY_DELAY: Duration = Duration::from_millis(21);
const ANSWER_KEY_DELAY: Duration = Duration::from_millis(82);

#[derive(Debug)]
enum LoginState {
    Start,
    CookieBannerCheck,
    UsernameEntry,
    PasswordEntry,
    MfaMethodSelection,
    ChallengeDisplayed,
    ChallengeAnswered { answer: SecretString },
    Submitted,
}

/// Drives the portal from the landing page to a submitted challenge answer.
///
/// Borrows the provider for the duration of the login sequence only; secrets
/// are fetched at the step that needs them and never cached.
pub struct LoginStateMachine<'a, P: PortalPage + ?Sized> {
    page: &'a P,
    provider: &'a dyn SecretProvider,
    resolver: &'a ChallengeResolver,
}

impl<'a, P: PortalPage + ?Sized> LoginStateMachine<'a, P> {
    pub fn new(
        page: &'a P,
        provider: &'a dyn SecretProvider,
        resolver: &'a ChallengeResolver,
    ) -> Self {
        Self {
            page,
            provider,
            resolver,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let mut state = LoginState::Start;
        loop {
            state = match state {
                LoginState::Start => LoginState::CookieBannerCheck,
                LoginState::CookieBannerCheck => {
                    self.dismiss_cookie_banner().await?;
                    LoginState::UsernameEntry
                }
                LoginState::UsernameEntry => {
                    self.enter_username().await?;
                    LoginState::PasswordEntry
                }
                LoginState::PasswordEntry => {
                    self.enter_password().await?;
                    LoginState::MfaMethodSelection
                }
                LoginState::MfaMethodSelection => {
                    self.select_challenge_method().await?;
                    LoginState::ChallengeDisplayed
                }
                LoginState::ChallengeDisplayed => {
                    let answer = self.resolve_challenge().await?;
                    LoginState::ChallengeAnswered { answer }
                }
                LoginState::ChallengeAnswered { answer } => {
                    self.submit_answer(&answer).await?;
                    LoginState::Submitted
                }
                LoginState::Submitted => {
                    info!("login submitted");
                    return Ok(());
                }
            };
        }
    }

    /// Best-effort: the banner only shows on fresh sessions, and its absence
    /// is not an error.
    async fn dismiss_cookie_banner(&self) -> Result<()> {
        if self
            .page
            .probe_visible(selectors::COOKIE_ACCEPT, COOKIE_BANNER_TIMEOUT)
            .await?
        {
            info!("dismissing cookie banner");
            self.page.click(selectors::COOKIE_ACCEPT).await?;
            tokio::time::sleep(BANNER_SETTLE).await;
        } else {
            debug!("no cookie banner to dismiss");
        }
        Ok(())
    }

    async fn enter_username(&self) -> Result<()> {
        self.page
            .wait_visible(selectors::USERNAME_INPUT, VISIBILITY_TIMEOUT)
            .await?;
        let username = self.provider.get_username().await?;
        if username.expose_secret().is_empty() {
            return Err(Error::Credential { field: "username" });
        }
        self.page
            .type_text(
                selectors::USERNAME_INPUT,
                username.expose_secret(),
                USERNAME_KEY_DELAY,
            )
            .await?;
        self.advance().await
    }

    async fn enter_password(&self) -> Result<()> {
        self.page
            .wait_visible(selectors::PASSWORD_INPUT, VISIBILITY_TIMEOUT)
            .await?;
        let password = self.provider.get_password().await?;
        if password.expose_secret().is_empty() {
            return Err(Error::Credential { field: "password" });
        }
        self.page
            .type_text(
                selectors::PASSWORD_INPUT,
                password.expose_secret(),
                PASSWORD_KEY_DELAY,
            )
            .await?;
        self.advance().await
    }

    async fn advance(&self) -> Result<()> {
        self.page
            .wait_visible(selectors::SIGNIN_NEXT, VISIBILITY_TIMEOUT)
            .await?;
        self.page.click(selectors::SIGNIN_NEXT).await
    }

    /// Fixed two-click sequence into the personal-verification-question
    /// branch. A missing control means the portal's challenge flow no longer
    /// has the shape this machine assumes.
    async fn select_challenge_method(&self) -> Result<()> {
        self.page
            .click_text(selectors::MFA_OTHER_OPTIONS)
            .await
            .map_err(|err| Error::Navigation {
                step: "mfa-method-selection",
                detail: format!("{:?}: {err}", selectors::MFA_OTHER_OPTIONS),
            })?;
        self.page
            .click_text(selectors::MFA_PVQ_OPTION)
            .await
            .map_err(|err| Error::Navigation {
                step: "mfa-method-selection",
                detail: format!("{:?}: {err}", selectors::MFA_PVQ_OPTION),
            })?;
        Ok(())
    }

    async fn resolve_challenge(&self) -> Result<SecretString> {
        self.page
            .wait_visible(selectors::PVQ_QUESTION_LABEL, VISIBILITY_TIMEOUT)
            .await?;
        // Read verbatim; the resolver owns any normalization.
        let question = self.page.text_content(selectors::PVQ_QUESTION_LABEL).await?;
        debug!(question = %question.trim(), "challenge question displayed");
        self.resolver.resolve(&question, self.provider).await
    }

    async fn submit_answer(&self, answer: &SecretString) -> Result<()> {
        self.page
            .wait_visible(selectors::PVQ_ANSWER_INPUT, VISIBILITY_TIMEOUT)
            .await?;
        self.page
            .type_text(
                selectors::PVQ_ANSWER_INPUT,
                answer.expose_secret(),
                ANSWER_KEY_DELAY,
            )
            .await?;
        self.page.click(selectors::PVQ_CONTINUE).await
    }
}
