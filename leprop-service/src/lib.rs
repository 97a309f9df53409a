//! Property service daemon: reactor, persistence, triggers, client stub.

pub mod client;
pub mod config;
mod error;
pub mod paths;
pub mod persist;
mod runtime;
pub mod trigger;

pub use client::{get_property, set_property, PropertyClient, RequestFailed};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use persist::{PersistManager, PersistOutcome};
pub use runtime::{run, start_blocking, ConnectionId, PropertyService};
pub use trigger::{ProcessSpawner, Spawner, TriggerDispatcher};
