//! Word order representation for multi-word register values

use serde::{Deserialize, Serialize};

/// Order of the 16-bit words (or bytes, for strings) of a register value
///
/// # Which axis the flag controls
///
/// - **Numeric types** (`int32`, `uint32`, `float32`, `int64`, `uint64`,
///   `double64`): the flag orders the *word sequence*. Bytes inside each word
///   are always big-endian, as on the wire.
/// - **`string`**: the flag orders the two *bytes inside each word*. The word
///   sequence always follows the character sequence.
/// - **`uint16` / `bool`**: single word, the flag is ignored.
///
/// For the 32-bit value `0x12345678`:
/// - `Big`: `[0x1234, 0x5678]` (most significant word first)
/// - `Little`: `[0x5678, 0x1234]` (least significant word first)
///
/// For the string `"AB"`:
/// - `Big`: `[0x4142]`
/// - `Little`: `[0x4241]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordOrder {
    /// Most significant word first (ABCD)
    #[default]
    #[serde(alias = "BIG", alias = "abcd", alias = "ABCD")]
    Big,

    /// Least significant word first (CDAB)
    #[serde(alias = "LITTLE", alias = "cdab", alias = "CDAB")]
    Little,
}

impl WordOrder {
    /// Convert from common string formats
    ///
    /// - "big", "be", "ABCD" → Big
    /// - "little", "le", "CDAB" → Little
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "BIG" | "BE" | "BIGENDIAN" | "ABCD" => Some(Self::Big),
            "LITTLE" | "LE" | "LITTLEENDIAN" | "CDAB" => Some(Self::Little),
            _ => None,
        }
    }

    /// Get configuration name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Big => "big",
            Self::Little => "little",
        }
    }

    /// Arrange most-significant-first words into this order (in place)
    pub(crate) fn arrange_words(&self, words: &mut [u16]) {
        if *self == Self::Little {
            words.reverse();
        }
    }

    /// Arrange a big-endian packed string word into this order
    pub(crate) fn arrange_bytes(&self, word: u16) -> u16 {
        match self {
            Self::Big => word,
            Self::Little => word.swap_bytes(),
        }
    }
}

impl std::fmt::Display for WordOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
