//! Wire codec shared by the daemon and the client stub.
//!
//! A message is one command tag byte followed by ASCII `name=value`
//! (`SET`) or `name=` (`GET`). There is no length prefix: one socket read
//! carries one message, bounded by [`MAX_MESSAGE_LEN`]. Replies use the
//! same shape, except that failures carry [`ERROR_TAG`] and `name=`.

use crate::error::PropError;
use crate::types::{PropName, PropValue, Property, MAX_ALLOWED_LINE_LEN, SEPARATOR};

pub const SET_TAG: u8 = b'S';
pub const GET_TAG: u8 = b'G';
pub const ERROR_TAG: u8 = b'E';

/// Upper bound of a single request or reply, tag included.
pub const MAX_MESSAGE_LEN: usize = MAX_ALLOWED_LINE_LEN + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Set,
    Get,
}

impl Command {
    pub fn tag(self) -> u8 {
        match self {
            Command::Set => SET_TAG,
            Command::Get => GET_TAG,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, PropError> {
        match tag {
            SET_TAG => Ok(Command::Set),
            GET_TAG => Ok(Command::Get),
            other => Err(PropError::UnknownCommand(other)),
        }
    }
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Set(Property),
    Get(PropName),
}

impl Request {
    pub fn set(name: &str, value: &str) -> Self {
        Request::Set(Property::new(name, value))
    }

    pub fn get(name: &str) -> Self {
        Request::Get(PropName::new(name))
    }

    pub fn command(&self) -> Command {
        match self {
            Request::Set(_) => Command::Set,
            Request::Get(_) => Command::Get,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MAX_MESSAGE_LEN);
        out.push(self.command().tag());
        match self {
            Request::Set(prop) => out.extend_from_slice(prop.to_line().as_bytes()),
            Request::Get(name) => {
                out.extend_from_slice(name.as_str().as_bytes());
                out.push(SEPARATOR as u8);
            }
        }
        out
    }

    /// Decode one request. A `GET` payload still needs its `=`; any value
    /// after it is ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, PropError> {
        let (tag, payload) = split_message(bytes)?;
        let prop = Property::parse_line(payload)?;
        match Command::from_tag(tag)? {
            Command::Set => Ok(Request::Set(prop)),
            Command::Get => Ok(Request::Get(prop.name)),
        }
    }
}

/// A reply produced by the daemon for exactly one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok { command: Command, property: Property },
    Error { name: PropName },
}

impl Reply {
    pub fn ok(command: Command, property: Property) -> Self {
        Reply::Ok { command, property }
    }

    pub fn error(name: impl Into<PropName>) -> Self {
        Reply::Error { name: name.into() }
    }

    /// Error reply for a message that could not be decoded, echoing
    /// whatever name can be recovered from it.
    pub fn rejecting(message: &[u8]) -> Self {
        let payload = String::from_utf8_lossy(message.get(1..).unwrap_or_default());
        let name = payload.split(SEPARATOR).next().unwrap_or_default();
        Reply::error(name)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Ok { .. })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MAX_MESSAGE_LEN);
        match self {
            Reply::Ok { command, property } => {
                out.push(command.tag());
                out.extend_from_slice(property.to_line().as_bytes());
            }
            Reply::Error { name } => {
                out.push(ERROR_TAG);
                out.extend_from_slice(name.as_str().as_bytes());
                out.push(SEPARATOR as u8);
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PropError> {
        let (tag, payload) = split_message(bytes)?;
        if tag == ERROR_TAG {
            let name = payload
                .split_once(SEPARATOR)
                .map(|(name, _)| name)
                .unwrap_or(payload);
            return Ok(Reply::error(name));
        }
        let command = Command::from_tag(tag)?;
        let property = Property::parse_line(payload)?;
        Ok(Reply::ok(command, property))
    }

    /// Value carried by a successful reply.
    pub fn value(&self) -> Option<&PropValue> {
        match self {
            Reply::Ok { property, .. } => Some(&property.value),
            Reply::Error { .. } => None,
        }
    }
}

fn split_message(bytes: &[u8]) -> Result<(u8, &str), PropError> {
    let Some((&tag, payload)) = bytes.split_first() else {
        return Err(PropError::Malformed("empty message".to_string()));
    };
    if bytes.len() > MAX_MESSAGE_LEN {
        return Err(PropError::Malformed(format!(
            "message of {} bytes exceeds {MAX_MESSAGE_LEN}",
            bytes.len()
        )));
    }
    let payload = std::str::from_utf8(payload)
        .map_err(|err| PropError::Malformed(format!("payload is not UTF-8: {err}")))?;
    Ok((tag, payload.trim_end_matches('\0')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PROP_NAME_MAX, PROP_VALUE_MAX};

    #[test]
    fn set_request_wire_shape() {
        assert_eq!(Request::set("ro.foo", "bar").encode(), b"Sro.foo=bar".to_vec());
    }

    #[test]
    fn get_request_wire_shape() {
        assert_eq!(Request::get("ro.foo").encode(), b"Gro.foo=".to_vec());
    }

    #[test]
    fn get_request_ignores_trailing_value() {
        let request = Request::decode(b"Gro.foo=junk").unwrap();
        assert_eq!(request, Request::get("ro.foo"));
    }

    #[test]
    fn error_reply_wire_shape() {
        assert_eq!(Reply::error("never.set").encode(), b"Enever.set=".to_vec());
        assert_eq!(
            Reply::decode(b"Enever.set=").unwrap(),
            Reply::error("never.set")
        );
    }

    #[test]
    fn rejecting_echoes_recoverable_name() {
        assert_eq!(Reply::rejecting(b"Sro.foo"), Reply::error("ro.foo"));
        assert_eq!(Reply::rejecting(b"Qro.foo=1"), Reply::error("ro.foo"));
        assert_eq!(Reply::rejecting(b""), Reply::error(""));
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        assert_eq!(
            Request::decode(b"Xa=b"),
            Err(PropError::UnknownCommand(b'X'))
        );
    }

    #[test]
    fn decode_rejects_empty_and_oversized_messages() {
        assert!(matches!(Request::decode(b""), Err(PropError::Malformed(_))));
        let mut huge = vec![SET_TAG];
        huge.extend(std::iter::repeat(b'a').take(MAX_MESSAGE_LEN));
        assert!(matches!(Request::decode(&huge), Err(PropError::Malformed(_))));
    }

    #[test]
    fn largest_request_fits_in_one_message() {
        let name = "n".repeat(PROP_NAME_MAX + 10);
        let value = "v".repeat(PROP_VALUE_MAX + 10);
        let encoded = Request::set(&name, &value).encode();
        assert_eq!(encoded.len(), MAX_MESSAGE_LEN);
        assert!(Request::decode(&encoded).is_ok());
    }

    #[test]
    fn reply_without_separator_is_rejected() {
        assert!(matches!(
            Reply::decode(b"Gro.foo"),
            Err(PropError::MissingSeparator(_))
        ));
    }
}
