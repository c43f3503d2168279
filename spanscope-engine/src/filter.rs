use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt::{Display, Error as FmtError, Formatter};

use regex::Regex;

use crate::models::SpanId;

pub mod duration;
pub mod input;
pub mod structured;
pub mod text;

/// The identifiers of the spans that matched. A search that did not run
/// (because there was nothing to filter by, or nothing to filter) is
/// represented by `None` rather than an empty set.
pub type MatchResult = HashSet<SpanId>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InputError {
    InvalidDuration,
    InvalidRegex,
    InvalidSyntax,
    MissingDurationOperator,
    InvalidDurationOperator,
    InvalidInherentProperty,
    DuplicateProperty,
}

impl Display for InputError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            InputError::InvalidDuration => write!(f, "invalid duration value"),
            InputError::InvalidRegex => write!(f, "invalid regex value"),
            InputError::InvalidSyntax => write!(f, "invalid filter syntax"),
            InputError::MissingDurationOperator => write!(f, "missing #duration operator"),
            InputError::InvalidDurationOperator => write!(f, "invalid #duration operator"),
            InputError::InvalidInherentProperty => write!(f, "invalid '#' property"),
            InputError::DuplicateProperty => write!(f, "repeated '#' property"),
        }
    }
}

impl StdError for InputError {}

/// A string comparison with any regex already compiled.
#[derive(Debug, Clone)]
pub enum ValueStringComparison {
    Equals(String),
    Regex(Regex),
}

impl ValueStringComparison {
    pub fn from_input(regex: bool, value: &str) -> Result<ValueStringComparison, InputError> {
        if regex {
            let regex = Regex::new(value).map_err(|_| InputError::InvalidRegex)?;
            Ok(ValueStringComparison::Regex(regex))
        } else {
            Ok(ValueStringComparison::Equals(value.to_owned()))
        }
    }

    pub fn compare(&self, lhs: &str) -> bool {
        match self {
            ValueStringComparison::Equals(rhs) => lhs == rhs,
            ValueStringComparison::Regex(regex) => regex.is_match(lhs),
        }
    }
}
