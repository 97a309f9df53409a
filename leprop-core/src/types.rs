//! Domain types for the property store.
//!
//! Names and values are bounded strings. Every constructor clamps its input
//! to the bound instead of rejecting it, cutting on a UTF-8 character
//! boundary so the stored text is always valid.

use std::fmt;

use crate::error::PropError;

// ---------------------------------------------------------------------------
// Bounds and well-known names
// ---------------------------------------------------------------------------

/// Maximum length of a property name, in bytes.
pub const PROP_NAME_MAX: usize = 32;

/// Maximum length of a property value, in bytes.
pub const PROP_VALUE_MAX: usize = 92;

/// Longest `name=value` line shared by the wire protocol and property files.
pub const MAX_ALLOWED_LINE_LEN: usize = PROP_NAME_MAX + 1 + PROP_VALUE_MAX;

/// Prefix that marks a property as durable across restarts.
pub const PERSIST_PREFIX: &str = "persist.";

/// Writing `true` to this property activates persistent storage.
pub const PERSIST_ENABLE_PROP: &str = "le.persistprop.enable";

/// Separator between name and value; the first occurrence wins.
pub const SEPARATOR: char = '=';

/// Cut `s` to at most `max` bytes without splitting a character.
pub fn clamp(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A property name, clamped to [`PROP_NAME_MAX`] bytes.
///
/// May only be empty when built through `From`; parsers reject empty names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropName(String);

impl PropName {
    /// Build a name, truncating anything past the bound.
    pub fn new(name: &str) -> Self {
        Self(clamp(name, PROP_NAME_MAX).to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_persistent(&self) -> bool {
        self.0.starts_with(PERSIST_PREFIX)
    }
}

impl fmt::Display for PropName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PropName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PropName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

/// A property value, clamped to [`PROP_VALUE_MAX`] bytes. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PropValue(String);

impl PropValue {
    pub fn new(value: &str) -> Self {
        Self(clamp(value, PROP_VALUE_MAX).to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// A single named configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: PropName,
    pub value: PropValue,
}

impl Property {
    pub fn new(name: impl Into<PropName>, value: impl Into<PropValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse one `name=value` line.
    ///
    /// Trailing line terminators are stripped. The first `=` separates name
    /// from value, so values may themselves contain `=`. Oversized parts are
    /// truncated; a missing separator or an empty name is an error.
    pub fn parse_line(line: &str) -> Result<Self, PropError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let Some((name, value)) = line.split_once(SEPARATOR) else {
            return Err(PropError::MissingSeparator(line.to_owned()));
        };
        if name.is_empty() {
            return Err(PropError::EmptyName);
        }
        Ok(Self::new(name, value))
    }

    /// Render as a `name=value` line without terminator.
    pub fn to_line(&self) -> String {
        format!("{}{SEPARATOR}{}", self.name, self.value)
    }
}
