//! Error types for leprop-core.

use thiserror::Error;

/// Errors raised while parsing, encoding or looking up properties.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropError {
    /// A `name=value` payload had no `=`.
    #[error("missing '=' separator in {0:?}")]
    MissingSeparator(String),

    /// The name part of a payload was empty.
    #[error("property name is empty")]
    EmptyName,

    /// A wire message was empty, too long, or not valid UTF-8.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The leading byte of a message is not a known command tag.
    #[error("unknown command tag 0x{0:02x}")]
    UnknownCommand(u8),

    /// Lookup miss.
    #[error("property not found: {0}")]
    NotFound(String),
}

impl PropError {
    /// Protocol errors are recoverable per request and answered with an
    /// error reply; everything else here is a lookup miss.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, PropError::NotFound(_))
    }
}
