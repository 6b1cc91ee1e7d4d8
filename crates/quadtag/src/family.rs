//! Supported tag families.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::dictionary::{Dictionary, TAG16H5, TAG25H9, TAG36H11};

/// A square fiducial tag family.
///
/// The family fixes the payload grid size and the code dictionary. Border
/// width is a detector setting, not a family property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagFamily {
    /// 6x6 payload, minimum Hamming distance 11.
    #[default]
    #[serde(rename = "36h11")]
    Tag36h11,
    /// 5x5 payload, minimum Hamming distance 9.
    #[serde(rename = "25h9")]
    Tag25h9,
    /// 4x4 payload, minimum Hamming distance 5.
    #[serde(rename = "16h5")]
    Tag16h5,
}

impl TagFamily {
    /// Payload bits per tag.
    pub fn bit_count(self) -> usize {
        self.grid_size() * self.grid_size()
    }

    /// Payload grid side length.
    pub fn grid_size(self) -> usize {
        match self {
            TagFamily::Tag36h11 => 6,
            TagFamily::Tag25h9 => 5,
            TagFamily::Tag16h5 => 4,
        }
    }

    /// Maximum number of bit errors the decoder will correct.
    ///
    /// Kept below `(min_hamming - 1) / 2` so corrected matches stay unique;
    /// 16h5 is tightened further because its dictionary is dense.
    pub fn max_correction(self) -> u8 {
        match self {
            TagFamily::Tag36h11 => 2,
            TagFamily::Tag25h9 => 2,
            TagFamily::Tag16h5 => 1,
        }
    }

    /// Canonical family name, e.g. `"36h11"`.
    pub fn name(self) -> &'static str {
        match self {
            TagFamily::Tag36h11 => "36h11",
            TagFamily::Tag25h9 => "25h9",
            TagFamily::Tag16h5 => "16h5",
        }
    }

    /// Number of ids in the family dictionary.
    pub fn num_codes(self) -> usize {
        self.dictionary().codes.len()
    }

    /// Payload bits for a tag id, packed row-major with the top-left data
    /// cell in the least significant bit and black cells set to 1. Useful
    /// for rendering tags. `None` when the id is out of range.
    pub fn code(self, id: u32) -> Option<u64> {
        self.dictionary().codes.get(id as usize).copied()
    }

    pub(crate) fn dictionary(self) -> Dictionary {
        match self {
            TagFamily::Tag36h11 => TAG36H11,
            TagFamily::Tag25h9 => TAG25H9,
            TagFamily::Tag16h5 => TAG16H5,
        }
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TagFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "36h11" | "tag36h11" => Ok(TagFamily::Tag36h11),
            "25h9" | "tag25h9" => Ok(TagFamily::Tag25h9),
            "16h5" | "tag16h5" => Ok(TagFamily::Tag16h5),
            _ => Err(ConfigError::UnknownFamily(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("36h11".parse::<TagFamily>().unwrap(), TagFamily::Tag36h11);
        assert_eq!("tag25h9".parse::<TagFamily>().unwrap(), TagFamily::Tag25h9);
        assert_eq!(" 16H5 ".parse::<TagFamily>().unwrap(), TagFamily::Tag16h5);
    }

    #[test]
    fn rejects_unknown_name() {
        assert!(matches!(
            "41h12".parse::<TagFamily>(),
            Err(ConfigError::UnknownFamily(_))
        ));
    }

    #[test]
    fn correction_stays_within_unique_decoding() {
        for family in [TagFamily::Tag36h11, TagFamily::Tag25h9, TagFamily::Tag16h5] {
            let dict = family.dictionary();
            assert!(u32::from(family.max_correction()) * 2 < u32::from(dict.min_hamming));
            assert_eq!(family.grid_size(), dict.grid);
        }
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&TagFamily::Tag25h9).unwrap();
        assert_eq!(json, "\"25h9\"");
        let back: TagFamily = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TagFamily::Tag25h9);
    }
}
