//! Example task and controller mounted by default.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use leasehold_core::{AppContext, LoadError};
use leasehold_dispatch::{handler_fn, HandlerError, RequestContext};
use leasehold_scheduler::{task_fn, TaskDefinition, TaskError, TaskRegistry};

use crate::routes::Controller;

async fn helloworld(ctx: AppContext, shard: u32) -> Result<(), TaskError> {
    info!(shard, window = ctx.now_mod(60), "Hello world");
    Ok(())
}

async fn helloworld_page(_req: RequestContext) -> Result<Value, HandlerError> {
    Ok(json!({
        "package": { "now": Utc::now().to_rfc3339() },
        "ttl": 5,
        "view": "helloworld.html",
    }))
}

pub fn tasks() -> Result<TaskRegistry, LoadError> {
    TaskRegistry::from_definitions([("helloworld", TaskDefinition::new(task_fn(helloworld)).span(60))])
}

pub fn controllers() -> Vec<Controller> {
    vec![Controller::new("helloworld").path("/").get(handler_fn(helloworld_page))]
}
