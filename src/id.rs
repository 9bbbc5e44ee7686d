use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::serde_utils;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("Media identifier is empty")]
    Empty,
    #[error("Media identifier '{0}' is not an unsigned 64-bit integer")]
    Malformed(String),
}

/// Server-assigned media identifier.
///
/// The API sends ids both as numbers and as strings; this type accepts either
/// and always renders as the decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaId(u64);

impl MediaId {
    pub const fn new(id: u64) -> Self {
        MediaId(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl FromStr for MediaId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }
        // u64::from_str accepts a leading '+', ids never carry one
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::Malformed(s.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(MediaId)
            .map_err(|_| IdError::Malformed(s.to_string()))
    }
}

impl From<u64> for MediaId {
    fn from(id: u64) -> Self {
        MediaId(id)
    }
}

impl Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for MediaId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MediaId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_utils::deserialize_string_or_u64(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
