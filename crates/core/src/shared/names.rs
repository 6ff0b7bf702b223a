use std::fmt;

use thiserror::Error;

use crate::shared::constants::UNKNOWN_LABEL;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("name must not be empty")]
    Empty,
    #[error("name '{0}' contains a path separator or NUL byte")]
    Separator(String),
    #[error("name '{0}' is not a valid folder name")]
    Reserved(String),
}

/// A registered person's name, safe to use as a single folder segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PersonName(String);

impl PersonName {
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        validate_segment(raw)?;
        if raw.eq_ignore_ascii_case(UNKNOWN_LABEL) {
            return Err(NameError::Reserved(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Folder a categorized photo is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Person(PersonName),
    Unknown,
}

impl Label {
    /// `unknown` matches case-insensitively; anything else must be a valid
    /// person name.
    pub fn parse(raw: &str) -> Result<Self, NameError> {
        if raw.eq_ignore_ascii_case(UNKNOWN_LABEL) {
            Ok(Label::Unknown)
        } else {
            PersonName::parse(raw).map(Label::Person)
        }
    }

    pub fn folder_name(&self) -> &str {
        match self {
            Label::Person(name) => name.as_str(),
            Label::Unknown => UNKNOWN_LABEL,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Checks that `raw` can be joined onto a directory as exactly one segment.
pub fn validate_segment(raw: &str) -> Result<(), NameError> {
    if raw.trim().is_empty() {
        return Err(NameError::Empty);
    }
    if raw.contains(['/', '\\', '\0']) {
        return Err(NameError::Separator(raw.to_string()));
    }
    if raw == "." || raw == ".." {
        return Err(NameError::Reserved(raw.to_string()));
    }
    Ok(())
}
