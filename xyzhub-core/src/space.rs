//! Identifier of a remote hub space.

use std::{fmt, ops::Deref, str::FromStr};

use thiserror::Error;

/// Identifier of a hub space, validated to be usable as a URL path segment.
///
/// # Examples
/// ```
/// use xyzhub_core::SpaceId;
///
/// let space: SpaceId = "aX9bQ2".parse()?;
/// assert_eq!(space.as_ref(), "aX9bQ2");
/// # Ok::<(), xyzhub_core::SpaceIdError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpaceId(String);

/// Errors returned when parsing a [`SpaceId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpaceIdError {
    /// The identifier was empty or whitespace.
    #[error("space id must not be empty")]
    Empty,
    /// The identifier contains characters that cannot appear in a path segment.
    #[error("space id {id:?} contains invalid character {invalid:?}")]
    InvalidCharacter {
        /// The rejected identifier.
        id: String,
        /// First offending character.
        invalid: char,
    },
}

impl SpaceId {
    /// Validate and wrap a space identifier.
    ///
    /// # Errors
    /// Returns [`SpaceIdError`] for empty identifiers or identifiers carrying
    /// whitespace, `/`, `?` or `#`.
    pub fn parse(value: &str) -> Result<Self, SpaceIdError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SpaceIdError::Empty);
        }
        if let Some(invalid) = trimmed
            .chars()
            .find(|ch| ch.is_whitespace() || matches!(ch, '/' | '?' | '#'))
        {
            return Err(SpaceIdError::InvalidCharacter {
                id: trimmed.to_owned(),
                invalid,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Consume the wrapper and return the inner [`String`].
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for SpaceId {
    type Err = SpaceIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl AsRef<str> for SpaceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for SpaceId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("  abc  ", "abc")]
    #[case("x-y_z", "x-y_z")]
    fn trims_and_accepts(#[case] raw: &str, #[case] expected: &str) {
        let space = SpaceId::parse(raw).expect("space id should parse");
        assert_eq!(space.as_ref(), expected);
    }

    #[rstest]
    #[case("", SpaceIdError::Empty)]
    #[case("a/b", SpaceIdError::InvalidCharacter { id: "a/b".into(), invalid: '/' })]
    #[case("a b", SpaceIdError::InvalidCharacter { id: "a b".into(), invalid: ' ' })]
    fn rejects_unusable_identifiers(#[case] raw: &str, #[case] expected: SpaceIdError) {
        assert_eq!(SpaceId::parse(raw), Err(expected));
    }
}
