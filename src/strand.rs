//! Strand orientation for genomic features.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Strand orientation of a genomic feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Strand {
    Forward = 0,
    Reverse = 1,
}

impl Strand {
    #[must_use]
    pub fn is_reverse(self) -> bool {
        self == Self::Reverse
    }

    #[must_use]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Strand {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Forward),
            1 => Ok(Self::Reverse),
            _ => Err(Error::Parse(format!("invalid strand byte: {value}"))),
        }
    }
}

/// Accepts the symbolic (`+`/`-`) and numeric (`1`/`-1`) spellings used by
/// annotation dumps.
impl FromStr for Strand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" | "1" => Ok(Self::Forward),
            "-" | "-1" => Ok(Self::Reverse),
            _ => Err(Error::Parse(format!("invalid strand: '{s}'"))),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "+"),
            Self::Reverse => write!(f, "-"),
        }
    }
}
