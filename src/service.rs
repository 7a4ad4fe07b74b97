//! Run orchestration: provider → login → export → capture.

use tracing::info;

use crate::challenge::{ChallengeAnswerMap, ChallengeResolver};
use crate::config::Config;
use crate::download::{DownloadArtifact, DownloadSynchronizer};
use crate::error::{Error, Result};
use crate::export::ExportFlowController;
use crate::login::LoginStateMachine;
use crate::portal::{selectors, PortalPage, PortalSession};
use crate::provider::{self, SecretProvider, StaticSecretProvider};

/// Run one full export: authenticate, configure the export form, and capture
/// the downloaded artifact. Returns the artifact's final path.
pub async fn run_export(config: &Config) -> Result<DownloadArtifact> {
    config.validate()?;

    let resolver = build_resolver(config)?;
    let provider = build_provider(config)?;

    let session = PortalSession::launch(config).await?;
    let outcome = drive(&session, config, provider.as_ref(), &resolver).await;
    session.close();
    outcome
}

async fn drive(
    session: &PortalSession,
    config: &Config,
    provider: &dyn SecretProvider,
    resolver: &ChallengeResolver,
) -> Result<DownloadArtifact> {
    info!(url = %config.url, "opening portal");
    session.navigate(&config.url).await?;
    let page = session.page();

    LoginStateMachine::new(page, provider, resolver)
        .run()
        .await?;

    ExportFlowController::new(page, &config.export)
        .prepare()
        .await?;

    DownloadSynchronizer::new(&config.download_dir)
        .trigger_and_capture(page, page.click(selectors::CONTINUE_BUTTON))
        .await
}

fn build_resolver(config: &Config) -> Result<ChallengeResolver> {
    match &config.challenge_answers {
        Some(raw) => {
            let map = ChallengeAnswerMap::from_json(raw)?;
            info!(entries = map.len(), "using static challenge answer map");
            Ok(ChallengeResolver::StaticMap(map))
        }
        None => {
            info!("delegating challenge answers to the secret provider");
            Ok(ChallengeResolver::Delegating)
        }
    }
}

fn build_provider(config: &Config) -> Result<Box<dyn SecretProvider>> {
    match (&config.username, &config.password) {
        (Some(username), Some(password)) => {
            Ok(Box::new(StaticSecretProvider::new(username, password)))
        }
        (None, None) => provider::load_provider(config.provider_location.as_deref()),
        _ => Err(Error::configuration(
            "username and password must be supplied together",
        )),
    }
}
