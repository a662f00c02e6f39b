use std::{fmt::Display, num::NonZeroU32, str::FromStr};

use thiserror::Error;

/// Per-folder stable message identifier. Never zero.
#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Uid(NonZeroU32);

#[derive(Error, Debug, PartialEq)]
#[error("invalid uid {value:?}")]
pub struct InvalidUid {
    value: String,
}

impl TryFrom<u32> for Uid {
    type Error = InvalidUid;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        NonZeroU32::new(value).map(Self).ok_or(InvalidUid {
            value: value.to_string(),
        })
    }
}

impl FromStr for Uid {
    type Err = InvalidUid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<NonZeroU32>().map(Self).map_err(|_| InvalidUid {
            value: s.to_string(),
        })
    }
}

impl Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uid> for u32 {
    fn from(value: Uid) -> Self {
        value.0.into()
    }
}
