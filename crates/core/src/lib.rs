pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod lease;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use context::{AppContext, Utilities};
pub use error::*;
pub use lease::{Lease, LeaseKeys, RESTART_KEY, STOP_KEY};
pub use store::{LeaseStore, StoreError};
