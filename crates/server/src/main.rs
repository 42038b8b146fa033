mod cli;
mod cron;
mod demo;
mod prepare;
mod routes;
mod startup;
mod watch;
mod www;

use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = startup::load_config();
    startup::init_tracing();

    let cli = Cli::parse();
    let watch_sources = !cli.no_watch;

    match cli.command {
        Some(Mode::Prepare) => {
            let created = prepare::prepare(&config.app.base_path)?;
            info!("Prepared {} ({} new entries)", config.app.base_path.display(), created.len());
        }
        Some(Mode::Www) => {
            let ctx = startup::build_context(config).await?;
            www::serve(ctx, demo::controllers(), watch_sources).await?;
        }
        Some(Mode::Cron { task }) => {
            let ctx = startup::build_context(config).await?;
            cron::run(ctx, demo::tasks()?, task, watch_sources).await?;
        }
        None => cli::print_usage(),
    }

    Ok(())
}
