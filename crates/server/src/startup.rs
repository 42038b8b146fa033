//! Process bootstrap shared by every mode.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use leasehold_core::{AppContext, Clock, Config, SystemClock};

/// `RUST_LOG` wins; otherwise everything at info.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();
}

pub fn load_config() -> Config {
    leasehold_core::config::load_dotenv();
    Config::from_env()
}

/// Connect the configured store and build the process context.
pub async fn build_context(config: Config) -> anyhow::Result<AppContext> {
    config.log_summary();
    if std::env::var_os("BASEPATH").is_none() {
        info!("Determining basepath to be {}", config.app.base_path.display());
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = leasehold_store::connect(&config.store, Arc::clone(&clock))
        .await
        .with_context(|| format!("connecting to the {} store", config.store.backend))?;

    let ctx = AppContext::new(config, store, clock);
    register_utilities(&ctx)?;
    info!("leasehold initialized");
    Ok(ctx)
}

/// Shared outbound HTTP client; every request carries `agent`.
pub fn http_client(agent: &str) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(agent)
        .timeout(Duration::from_secs(30))
        .build()
}

fn register_utilities(ctx: &AppContext) -> anyhow::Result<()> {
    let utilities = ctx.utilities();
    utilities.register("started_at", Utc::now());

    let agent = std::env::var("USER_AGENT")
        .unwrap_or_else(|_| format!("leasehold/{}", env!("CARGO_PKG_VERSION")));
    utilities.register("http", http_client(&agent).context("building HTTP client")?);
    utilities.register("user_agent", agent);
    Ok(())
}
