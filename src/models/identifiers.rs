//! Human-readable record identifiers (`PAT-000001`, `APT-000042`).
//!
//! Formatting and parsing only. Allocation of the next number happens in
//! the repository layer (`db::repository::sequence`), inside the same
//! transaction as the insert that consumes it.

use std::fmt;

/// Minimum number of digits after the prefix.
pub const ID_DIGITS: usize = 6;

/// The identifier families that carry a sequential public ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Patient,
    Appointment,
}

impl IdKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Patient => "PAT",
            Self::Appointment => "APT",
        }
    }

    /// Row name in the `id_sequences` table.
    pub fn sequence_name(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Appointment => "appointment",
        }
    }

    /// `PREFIX-` followed by `n` zero-padded to six digits. Larger
    /// numbers keep all their digits.
    pub fn format(self, n: u64) -> String {
        format!("{}-{:0width$}", self.prefix(), n, width = ID_DIGITS)
    }

    /// Numeric suffix of an identifier of this kind, if well-formed.
    pub fn parse(self, id: &str) -> Option<u64> {
        let (prefix, digits) = id.split_once('-')?;
        if prefix != self.prefix() || digits.len() < ID_DIGITS {
            return None;
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}
