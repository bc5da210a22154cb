//! Core types returned by the client.
//!
//! This module defines the status code bitmask reported by the daemon,
//! the per-item [`Response`] verdict and the [`Info`] handshake record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status code bitmask reported on each response line.
///
/// Several bits may be set at once, so classification always tests bits
/// rather than comparing for equality. The raw value is kept as received.
///
/// # Examples
///
/// ```rust
/// use fprot::StatusCode;
///
/// let code = StatusCode::from_bits(1 | 64);
/// assert!(code.is_infected());
/// assert!(code.is_error());
/// assert!(code.contains(StatusCode::SKIP_ERROR));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u64);

impl StatusCode {
    /// No signature was matched.
    pub const NO_MATCH: Self = Self(0);
    /// At least one virus-infected object was found.
    pub const INFECTED: Self = Self(1);
    /// At least one suspicious (heuristic match) object was found.
    pub const HEURISTIC_MATCH: Self = Self(2);
    /// Scanning was interrupted by the user.
    pub const USER_ERROR: Self = Self(4);
    /// A scan restriction caused files to be skipped.
    pub const RESTRICTION_ERROR: Self = Self(8);
    /// Platform error.
    pub const SYSTEM_ERROR: Self = Self(16);
    /// Internal engine error.
    pub const INTERNAL_ERROR: Self = Self(32);
    /// At least one object was not scanned.
    pub const SKIP_ERROR: Self = Self(64);
    /// At least one object was disinfected.
    pub const DISINFECT_ERROR: Self = Self(128);

    /// Bits that mark an item as infected.
    const INFECTED_MASK: u64 = 1 | 2 | 128;

    /// Bits that mark an item as having failed to scan cleanly.
    const ERROR_MASK: u64 = 4 | 8 | 16 | 32 | 64 | 128;

    const NAMED: [(Self, &'static str); 8] = [
        (Self::INFECTED, "Atleast one virus-infected object was found"),
        (
            Self::HEURISTIC_MATCH,
            "Atleast one suspicious (heuristic match) object was found",
        ),
        (Self::USER_ERROR, "Scanning interrupted by user"),
        (
            Self::RESTRICTION_ERROR,
            "Scan restriction caused scan to skip files",
        ),
        (Self::SYSTEM_ERROR, "Platform error"),
        (Self::INTERNAL_ERROR, "Internal Engine error"),
        (Self::SKIP_ERROR, "Atleast one object was not scanned"),
        (Self::DISINFECT_ERROR, "Atleast one object was disinfected"),
    ];

    /// Wraps a raw status value.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw status value.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any bit of `other` is set in `self`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` if no signature was matched and no error occurred.
    pub const fn is_clean(self) -> bool {
        self.0 & (Self::INFECTED_MASK | Self::ERROR_MASK) == 0
    }

    /// Returns `true` if the infected, heuristic or disinfect bit is set.
    pub const fn is_infected(self) -> bool {
        self.0 & Self::INFECTED_MASK != 0
    }

    /// Returns `true` if the heuristic match bit is set.
    pub const fn is_heuristic(self) -> bool {
        self.intersects(Self::HEURISTIC_MATCH)
    }

    /// Returns `true` if any soft error bit is set.
    ///
    /// These are the user, restriction, system, internal, skip and
    /// disinfect bits.
    pub const fn is_error(self) -> bool {
        self.0 & Self::ERROR_MASK != 0
    }

    /// Iterates over the named flags set in this code.
    pub fn flags(self) -> impl Iterator<Item = StatusCode> {
        Self::NAMED
            .into_iter()
            .map(|(flag, _)| flag)
            .filter(move |flag| self.contains(*flag))
    }

    /// Returns the daemon's description of a single flag, if known.
    pub fn description(self) -> Option<&'static str> {
        if self == Self::NO_MATCH {
            return Some("No signature was matched");
        }
        Self::NAMED
            .iter()
            .find(|(flag, _)| *flag == self)
            .map(|(_, text)| *text)
    }
}

impl std::ops::BitOr for StatusCode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<u64> for StatusCode {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.description() {
            return f.write_str(text);
        }

        let mut known = 0;
        for (i, flag) in self.flags().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            // flags() only yields named flags
            f.write_str(flag.description().unwrap_or_default())?;
            known |= flag.0;
        }

        if known == 0 {
            write!(f, "{}", self.0)
        } else if known != self.0 {
            write!(f, " | {}", self.0 & !known)
        } else {
            Ok(())
        }
    }
}

/// The verdict for one scanned item.
///
/// Built by the response parser from one line of daemon output and never
/// modified afterwards. Optional fields distinguish "absent from the
/// line" from "present but empty".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Name of the scanned item as echoed by the daemon.
    pub filename: Option<String>,

    /// Member inside a container, set when the match was inside an archive.
    pub archive_item: Option<String>,

    /// Detected signature name.
    pub signature: Option<String>,

    /// Free-text status phrase (e.g. `clean`, `infected`).
    pub status: String,

    /// Status bitmask.
    pub status_code: StatusCode,

    /// Whether the item counts as infected.
    pub infected: bool,

    /// The unparsed line, kept for diagnostics.
    ///
    /// The line terminator is stripped and bytes that are not valid
    /// UTF-8 are replaced with `U+FFFD`, so a filename in a legacy
    /// encoding does not survive here byte for byte.
    pub raw: String,
}

impl Response {
    /// Returns the signature name, or `""` when none was reported.
    pub fn signature(&self) -> &str {
        self.signature.as_deref().unwrap_or_default()
    }

    /// Returns `true` if the item reported a soft error.
    pub fn is_error(&self) -> bool {
        self.status_code.is_error()
    }

    /// Returns `true` if nothing was found and no error occurred.
    pub fn is_clean(&self) -> bool {
        self.status_code.is_clean()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Server information returned by the `HELP` handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// Daemon version.
    pub version: String,
    /// Scan engine version.
    pub engine: String,
    /// Protocol version.
    pub protocol: String,
    /// Signature database version.
    pub signature: String,
    /// Daemon uptime as reported.
    pub uptime: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_descriptions() {
        let cases = [
            (StatusCode::NO_MATCH, "No signature was matched"),
            (StatusCode::INFECTED, "Atleast one virus-infected object was found"),
            (
                StatusCode::HEURISTIC_MATCH,
                "Atleast one suspicious (heuristic match) object was found",
            ),
            (StatusCode::USER_ERROR, "Scanning interrupted by user"),
            (
                StatusCode::RESTRICTION_ERROR,
                "Scan restriction caused scan to skip files",
            ),
            (StatusCode::SYSTEM_ERROR, "Platform error"),
            (StatusCode::INTERNAL_ERROR, "Internal Engine error"),
            (StatusCode::SKIP_ERROR, "Atleast one object was not scanned"),
            (StatusCode::DISINFECT_ERROR, "Atleast one object was disinfected"),
        ];
        for (code, text) in cases {
            assert_eq!(code.to_string(), text);
        }
    }

    #[test]
    fn test_combined_display() {
        let code = StatusCode::INFECTED | StatusCode::SKIP_ERROR;
        assert_eq!(
            code.to_string(),
            "Atleast one virus-infected object was found | Atleast one object was not scanned"
        );
        assert_eq!(StatusCode::from_bits(256).to_string(), "256");
        assert_eq!(
            StatusCode::from_bits(257).to_string(),
            "Atleast one virus-infected object was found | 256"
        );
    }

    #[test]
    fn test_infected_iff_infected_bits() {
        for bits in 0u64..256 {
            let code = StatusCode::from_bits(bits);
            let expected = bits & 1 != 0 || bits & 2 != 0 || bits & 128 != 0;
            assert_eq!(code.is_infected(), expected, "bits {bits}");
        }
        assert!(!StatusCode::USER_ERROR.is_infected());
        assert!(StatusCode::from_bits(1 | 64).is_infected());
    }

    #[test]
    fn test_error_bits() {
        assert!(!StatusCode::NO_MATCH.is_error());
        assert!(!StatusCode::INFECTED.is_error());
        assert!(!StatusCode::HEURISTIC_MATCH.is_error());
        assert!(StatusCode::USER_ERROR.is_error());
        assert!(StatusCode::DISINFECT_ERROR.is_error());
        assert!(StatusCode::NO_MATCH.is_clean());
        assert!(!StatusCode::SKIP_ERROR.is_clean());
    }

    #[test]
    fn test_flags() {
        let code = StatusCode::from_bits(1 | 2 | 32);
        let flags: Vec<_> = code.flags().collect();
        assert_eq!(
            flags,
            vec![
                StatusCode::INFECTED,
                StatusCode::HEURISTIC_MATCH,
                StatusCode::INTERNAL_ERROR
            ]
        );
        assert!(code.is_heuristic());
        assert_eq!(StatusCode::NO_MATCH.flags().count(), 0);
    }
}
