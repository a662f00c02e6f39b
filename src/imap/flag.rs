use std::{fmt::Display, str::FromStr};

use log::trace;
use thiserror::Error;

/// System flags this crate sets on messages or inspects on fetched metadata.
/// Keywords and other flags stay raw strings in [`ParsedMessageMeta`](super::ParsedMessageMeta).
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Recent,
}

impl Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flag::Seen => write!(f, r"\Seen"),
            Flag::Answered => write!(f, r"\Answered"),
            Flag::Flagged => write!(f, r"\Flagged"),
            Flag::Deleted => write!(f, r"\Deleted"),
            Flag::Draft => write!(f, r"\Draft"),
            Flag::Recent => write!(f, r"\Recent"),
        }
    }
}

#[derive(Error, Debug)]
#[error("unknown flag {flag}")]
pub struct UnknownFlagError {
    flag: String,
}

impl FromStr for Flag {
    type Err = UnknownFlagError;

    // flags are case-insensitive on the wire
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            r"\seen" => Ok(Flag::Seen),
            r"\answered" => Ok(Flag::Answered),
            r"\flagged" => Ok(Flag::Flagged),
            r"\deleted" => Ok(Flag::Deleted),
            r"\draft" => Ok(Flag::Draft),
            r"\recent" => Ok(Flag::Recent),
            _ => {
                trace!("encountered non-system flag {value}");
                Err(Self::Err {
                    flag: value.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use rstest::*;

    use super::*;

    #[rstest]
    #[case(Flag::Seen)]
    #[case(Flag::Answered)]
    #[case(Flag::Flagged)]
    #[case(Flag::Deleted)]
    #[case(Flag::Draft)]
    #[case(Flag::Recent)]
    fn test_flag_display_parses_back(#[case] flag: Flag) {
        assert_eq!(flag, assert_ok!(flag.to_string().parse::<Flag>()));
    }

    #[rstest]
    fn test_flag_parsing_ignores_case() {
        assert_eq!(Flag::Seen, assert_ok!(r"\SEEN".parse::<Flag>()));
    }

    #[rstest]
    #[case("$Forwarded")]
    #[case("Seen")]
    #[case(r"\*")]
    fn test_keywords_are_not_system_flags(#[case] flag: &str) {
        assert_err!(flag.parse::<Flag>());
    }
}
