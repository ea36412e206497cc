//! Validated user identifiers.
//!
//! User ids become path segments in the file backend, so the character set
//! is restricted up front rather than sanitized downstream.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_USER_ID_BYTES: usize = 128;

/// An opaque, validated user identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

/// Error validating a user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserIdError {
    #[error("user id must not be empty")]
    Empty,
    #[error("user id is {0} bytes, max is {MAX_USER_ID_BYTES}")]
    TooLong(usize),
    #[error("user id contains forbidden character `{0}`")]
    InvalidChar(char),
    #[error("user id `{0}` is reserved")]
    Reserved(String),
}

impl UserId {
    /// Accepts ASCII alphanumerics plus `_ - . @`, up to 128 bytes.
    /// `.` and `..` are refused outright.
    pub fn new(id: impl Into<String>) -> Result<Self, UserIdError> {
        let id = id.into();
        validate(&id)?;
        Ok(UserId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate(id: &str) -> Result<(), UserIdError> {
    if id.is_empty() {
        return Err(UserIdError::Empty);
    }
    if id.len() > MAX_USER_ID_BYTES {
        return Err(UserIdError::TooLong(id.len()));
    }
    if id == "." || id == ".." {
        return Err(UserIdError::Reserved(id.to_string()));
    }
    if let Some(ch) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@')))
    {
        return Err(UserIdError::InvalidChar(ch));
    }
    Ok(())
}

impl TryFrom<String> for UserId {
    type Error = UserIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        UserId::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
