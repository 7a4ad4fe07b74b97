use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rbsee::config::{Config, DEFAULT_SLOW_MO};
use rbsee::export::ExportParameters;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rbsee")]
#[command(about = "Export bank portal transactions to a local file")]
struct Cli {
    /// Portal entry URL
    #[arg(long, env = "RBSEE_URL")]
    url: String,

    /// Proxy server for the browser session
    #[arg(long, env = "RBSEE_PROXY")]
    proxy: Option<String>,

    /// Headless browser mode; pass 0 to watch the run
    #[arg(long, env = "RBSEE_HEADLESS", default_value = "1")]
    headless: String,

    /// Per-action pause in milliseconds for headful runs
    #[arg(long, env = "RBSEE_SLOW_MO")]
    slow_mo: Option<u64>,

    /// Directory that receives the exported file
    #[arg(long, env = "RBSEE_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Secret provider manifest (absolute path or file:// URL)
    #[arg(long, env = "RBSEE_SECRET_PROVIDER")]
    provider: Option<String>,

    /// JSON map of challenge questions to answers
    #[arg(long, env = "RBSEE_PVQ_JSON", hide_env_values = true)]
    challenge_answers: Option<String>,

    /// Portal login name (otherwise supplied by the provider)
    #[arg(long, env = "RBSEE_USERNAME", hide_env_values = true)]
    username: Option<String>,

    /// Portal password (otherwise supplied by the provider)
    #[arg(long, env = "RBSEE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Account option value on the export form
    #[arg(long, env = "RBSEE_ACCOUNT", default_value = "C001")]
    account: String,

    /// Export format radio id on the export form
    #[arg(long, env = "RBSEE_FORMAT", default_value = "Excel")]
    format: String,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let headless = self.headless != "0";
        let slow_mo = match (headless, self.slow_mo) {
            (_, Some(ms)) => Some(Duration::from_millis(ms)),
            (false, None) => Some(DEFAULT_SLOW_MO),
            (true, None) => None,
        };
        let download_dir = match self.download_dir {
            Some(dir) => dir,
            None => Config::default_download_dir()?,
        };

        let config = Config {
            url: self.url,
            proxy: self.proxy,
            headless,
            slow_mo,
            download_dir,
            provider_location: self.provider,
            challenge_answers: self.challenge_answers,
            username: self.username,
            password: self.password,
            export: ExportParameters {
                account: self.account,
                format: self.format,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "info,chromiumoxide=warn,chromiumoxide::conn=off,chromiumoxide::handler=off",
            )
        }))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.into_config()?;

    let artifact = rbsee::service::run_export(&config).await?;
    println!("{}", artifact.path.display());

    Ok(())
}
