//! leprop core library — property types, wire codec, in-memory database.
//!
//! - [`types`] — bounded names and values, `name=value` line parsing
//! - [`protocol`] — request/reply codec shared by daemon and client
//! - [`database`] — [`PropertyDb`]
//! - [`error`] — [`PropError`]

pub mod database;
pub mod error;
pub mod protocol;
pub mod types;

pub use database::PropertyDb;
pub use error::PropError;
pub use protocol::{Command, Reply, Request, MAX_MESSAGE_LEN};
pub use types::{
    PropName, PropValue, Property, MAX_ALLOWED_LINE_LEN, PERSIST_ENABLE_PROP, PERSIST_PREFIX,
    PROP_NAME_MAX, PROP_VALUE_MAX,
};
