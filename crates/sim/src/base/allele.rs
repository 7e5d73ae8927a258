use core::fmt;

use crate::errors::InvalidAllele;
use serde::{Deserialize, Serialize};

/// The entire genome of an organism: one tri-state allele.
///
/// The integer mapping is stable and used in parameter files and reports
/// (deleterious = -1, neutral = 0, beneficial = +1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i8)]
pub enum Allele {
    Deleterious = -1,
    #[default]
    Neutral = 0,
    Beneficial = 1,
}

impl Allele {
    /// Convert from the integer value (-1, 0, +1).
    #[inline]
    pub const fn from_value(value: i8) -> Option<Self> {
        match value {
            -1 => Some(Self::Deleterious),
            0 => Some(Self::Neutral),
            1 => Some(Self::Beneficial),
            _ => None,
        }
    }

    /// Convert to the integer value (-1, 0, +1).
    #[inline(always)]
    pub const fn value(self) -> i8 {
        self as i8
    }

    /// Move the allele by `delta` steps along -1 < 0 < +1.
    ///
    /// Returns `None` if the result would leave the landscape.
    #[inline]
    pub const fn shifted(self, delta: i8) -> Option<Self> {
        Self::from_value(self.value() + delta)
    }
}

impl TryFrom<i8> for Allele {
    type Error = InvalidAllele;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or(InvalidAllele(value))
    }
}

impl From<Allele> for i8 {
    #[inline(always)]
    fn from(allele: Allele) -> i8 {
        allele.value()
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allele_from_value() {
        assert_eq!(Allele::from_value(-1), Some(Allele::Deleterious));
        assert_eq!(Allele::from_value(0), Some(Allele::Neutral));
        assert_eq!(Allele::from_value(1), Some(Allele::Beneficial));
        assert_eq!(Allele::from_value(2), None);
        assert_eq!(Allele::from_value(-2), None);
    }

    #[test]
    fn test_allele_try_from_rejects_out_of_range() {
        assert_eq!(Allele::try_from(5), Err(InvalidAllele(5)));
        assert_eq!(Allele::try_from(-1), Ok(Allele::Deleterious));
    }

    #[test]
    fn test_allele_shifted() {
        assert_eq!(Allele::Neutral.shifted(1), Some(Allele::Beneficial));
        assert_eq!(Allele::Neutral.shifted(-1), Some(Allele::Deleterious));
        assert_eq!(Allele::Beneficial.shifted(-1), Some(Allele::Neutral));
        assert_eq!(Allele::Beneficial.shifted(1), None);
        assert_eq!(Allele::Deleterious.shifted(0), Some(Allele::Deleterious));
    }

    #[test]
    fn test_allele_default_is_neutral() {
        assert_eq!(Allele::default(), Allele::Neutral);
    }

    #[test]
    fn test_allele_display() {
        assert_eq!(Allele::Beneficial.to_string(), "+1");
        assert_eq!(Allele::Neutral.to_string(), "+0");
        assert_eq!(Allele::Deleterious.to_string(), "-1");
    }

    #[test]
    fn test_allele_serde_names() {
        let json = serde_json::to_string(&Allele::Beneficial).unwrap();
        assert_eq!(json, "\"beneficial\"");
        let back: Allele = serde_json::from_str("\"deleterious\"").unwrap();
        assert_eq!(back, Allele::Deleterious);
    }
}
