//! Cache-aside dispatcher with per-fingerprint request coalescing.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use leasehold_core::config::HttpCacheConfig;
use leasehold_core::{AppContext, LeaseStore};

use crate::descriptor::ResponseDescriptor;
use crate::error::{DispatchError, HandlerError};
use crate::fingerprint::{sends_body, Fingerprint};
use crate::handler::{Handler, RequestContext};
use crate::response::translate;
use crate::singleflight::{InFlight, Role};
use crate::template::TemplateRenderer;

type Outcome = Result<ResponseDescriptor, DispatchError>;

/// Turns matched requests into responses.
///
/// At most one handler invocation per fingerprint is in flight inside this
/// instance; concurrent identical requests share its outcome. Cacheable
/// outcomes are written to the shared store for other instances too.
pub struct Dispatcher {
    ctx: AppContext,
    cache: HttpCacheConfig,
    renderer: Arc<dyn TemplateRenderer>,
    in_flight: InFlight<Fingerprint, Outcome>,
}

impl Dispatcher {
    pub fn new(ctx: AppContext, renderer: Arc<dyn TemplateRenderer>) -> Self {
        let cache = ctx.config().http_cache.clone();
        Self {
            ctx,
            cache,
            renderer,
            in_flight: InFlight::new(),
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Requests currently being computed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Produce the descriptor for `req`: join an in-flight computation,
    /// else read the cache, else run `handler` (and cache what it allows).
    pub async fn resolve(
        &self,
        handler: &Arc<dyn Handler>,
        req: &RequestContext,
    ) -> Result<(ResponseDescriptor, Role), DispatchError> {
        let fingerprint = Fingerprint::new(&req.method, req.url());
        let key = fingerprint.cache_key(&self.cache.key_prefix);

        let (outcome, role) = self
            .in_flight
            .run(fingerprint, || {
                compute(
                    Arc::clone(self.ctx.store()),
                    self.cache.enabled,
                    key,
                    Arc::clone(handler),
                    req.clone(),
                )
            })
            .await;

        if role == Role::Follower {
            debug!(url = %req.url(), "joined in-flight request");
        }
        let outcome = outcome.unwrap_or_else(|e| Err(DispatchError::Handler(HandlerError::new(e))));
        outcome.map(|desc| (desc, role))
    }

    /// Resolve and translate. Failures are logged and answered with a 500.
    pub async fn dispatch(&self, handler: &Arc<dyn Handler>, req: RequestContext) -> Response {
        let result = match self.resolve(handler, &req).await {
            Ok((desc, _)) => translate(&desc, sends_body(&req.method), self.renderer.as_ref(), &req.locals),
            Err(e) => Err(e),
        };
        match result {
            Ok(resp) => resp,
            Err(e) => {
                error!(method = %req.method, url = %req.url(), error = %e, "request failed");
                e.into_response()
            }
        }
    }
}

async fn compute(
    store: Arc<dyn LeaseStore>,
    caching: bool,
    key: String,
    handler: Arc<dyn Handler>,
    req: RequestContext,
) -> Outcome {
    if caching {
        if let Some(raw) = store.get(&key).await? {
            match serde_json::from_str::<ResponseDescriptor>(&raw) {
                Ok(desc) => {
                    debug!(key = %key, "cache hit");
                    return Ok(desc);
                }
                Err(e) => warn!(key = %key, error = %e, "unreadable cache entry, recomputing"),
            }
        }
    }

    let value = handler.handle(&req).await?;
    let desc = ResponseDescriptor::from_value(value)?;

    if caching {
        if let Some(ttl) = desc.cache_ttl() {
            let raw = serde_json::to_string(&desc).map_err(|e| DispatchError::Serialize(e.to_string()))?;
            store.set_with_ttl(&key, &raw, ttl).await?;
            debug!(key = %key, ttl, "cached response");
        }
    }
    Ok(desc)
}
