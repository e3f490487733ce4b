use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub const MIN_NAME_LEN: usize = 1;
pub const MAX_NAME_LEN: usize = 35;

/// Why a submitted display name was refused. The messages are shown to the
/// member verbatim.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameRejection {
    #[error("Names must be between 1 and 35 characters long.")]
    Length,
    #[error("Names may only contain letters.")]
    NonAlphabetic,
}

/// A display name that passed [`validate_name`]. The original text is kept
/// as submitted, it becomes the member nickname as-is.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn parse(raw: &str) -> Result<Self, NameRejection> {
        validate_name(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Length is counted in characters. Only the ASCII space is ignored for the
/// alphabetic check, so tabs and other whitespace are rejected, and a name
/// made only of spaces has no letters left and is rejected too.
pub fn validate_name(raw: &str) -> Result<DisplayName, NameRejection> {
    let length = raw.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&length) {
        return Err(NameRejection::Length);
    }

    let mut letters = raw.chars().filter(|ch| *ch != ' ').peekable();
    if letters.peek().is_none() || !letters.all(char::is_alphabetic) {
        return Err(NameRejection::NonAlphabetic);
    }

    Ok(DisplayName(raw.to_owned()))
}
