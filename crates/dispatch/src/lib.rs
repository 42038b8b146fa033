//! Request dispatch: handler contract, in-process coalescing, the shared
//! response cache, and translation of handler descriptors into responses.

pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod fingerprint;
pub mod handler;
pub mod query;
pub mod response;
pub mod singleflight;
pub mod template;

pub use descriptor::ResponseDescriptor;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, HandlerError};
pub use fingerprint::Fingerprint;
pub use handler::{handler_fn, Handler, RequestContext};
pub use query::{ParamKind, QuerySpec, QueryVerdict};
pub use singleflight::{FlightError, InFlight, Role};
pub use template::{TemplateRenderer, ViewRenderer};
