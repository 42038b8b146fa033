//! `leasehold cron`: the scheduler loop, or a one-off debug run.

use tracing::info;

use leasehold_core::AppContext;
use leasehold_scheduler::{Scheduler, SchedulerExit, TaskRegistry};

use crate::watch::{self, ChangeWatcher};

pub async fn run(
    ctx: AppContext,
    registry: TaskRegistry,
    task: Option<String>,
    watch_sources: bool,
) -> anyhow::Result<()> {
    let scheduler = Scheduler::new(ctx.clone(), registry);

    if let Some(id) = task {
        scheduler.run_once(&id).await?;
        return Ok(());
    }

    let restart = if watch_sources {
        let watcher = ChangeWatcher::start(&watch::watch_paths(&ctx.config().app.base_path))?;
        Some(tokio::spawn(watch::restart_on_change(ctx.store().clone(), watcher)))
    } else {
        None
    };

    let exit = scheduler.run().await;
    if let Some(handle) = restart {
        handle.abort();
    }

    match exit {
        SchedulerExit::Stopped => info!("Scheduler stopped"),
        SchedulerExit::Restart => info!("Scheduler exiting for restart"),
    }
    Ok(())
}
