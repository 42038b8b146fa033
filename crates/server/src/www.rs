//! `leasehold www`: serve controllers until interrupted or the sources change.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use leasehold_core::AppContext;
use leasehold_dispatch::{Dispatcher, ViewRenderer};

use crate::routes::{self, Controller};
use crate::watch::{self, ChangeWatcher};

pub async fn serve(ctx: AppContext, controllers: Vec<Controller>, watch_sources: bool) -> anyhow::Result<()> {
    let config = ctx.config().clone();
    let renderer = Arc::new(ViewRenderer::new(config.app.views_dir()));
    let dispatcher = Arc::new(Dispatcher::new(ctx, renderer));
    let app = routes::router(dispatcher, controllers);

    let watcher = if watch_sources {
        Some(ChangeWatcher::start(&watch::watch_paths(&config.app.base_path))?)
    } else {
        None
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(watcher))
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(watcher: Option<ChangeWatcher>) {
    let changed = async {
        match watcher {
            Some(mut w) => {
                if let Some(path) = w.next_change().await {
                    info!("{} changed, shutting down", path.display());
                }
            }
            None => futures::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
        _ = changed => {}
    }
}
