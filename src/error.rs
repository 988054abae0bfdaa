//! Error kinds raised by the serializer core.
//!
//! The read path surfaces every failure to the caller and never aborts the
//! process; a failed load leaves the destination partially populated and the
//! caller is expected to discard it. The write path can only fail with
//! [`Error::InternalLayout`], which indicates a bug in the layout planner
//! rather than bad input.
//!
//! A type claimed by more than one encoding class is not an error value at
//! all here: a type has exactly one [`Flat`](crate::Flat) impl, so that
//! conflict is a compile error and cannot reach runtime.

use core::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Error enum
// ─────────────────────────────────────────────────────────────────────────────

/// Failures surfaced by [`save`](crate::save), [`load`](crate::load), and
/// [`read_file_identifier`](crate::read_file_identifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A computed offset or length would read past the end of the buffer.
    Truncated {
        /// Byte offset of the attempted access.
        offset: usize,
        /// Length of the attempted access.
        len: usize,
        /// Total buffer length.
        buffer_len: usize,
    },
    /// The identifier in the envelope does not match the expected root type.
    BadFileIdentifier {
        /// Identifier declared by the destination root type.
        expected: u32,
        /// Identifier found in the buffer.
        found: u32,
    },
    /// A union tag exceeds the declared alternative count plus one.
    BadUnionTag {
        /// The on-wire tag byte (1-based; 0 means empty and is never an error).
        tag: u8,
        /// Number of alternatives the destination union declares.
        alternatives: u8,
    },
    /// A planned write does not fit the buffer computed for it.
    InternalLayout {
        /// Position (distance from buffer end) of the offending write.
        position: usize,
        /// Length of the offending write.
        length: usize,
        /// Computed buffer length.
        buffer_len: usize,
    },
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Stable short name for the error kind.
    pub fn error_name(&self) -> &'static str {
        match self {
            Error::Truncated { .. } => "Truncated",
            Error::BadFileIdentifier { .. } => "BadFileIdentifier",
            Error::BadUnionTag { .. } => "BadUnionTag",
            Error::InternalLayout { .. } => "InternalLayout",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Truncated { offset, len, buffer_len } => write!(
                f,
                "Truncated: read of {len} bytes at offset {offset} exceeds buffer of {buffer_len}"
            ),
            Error::BadFileIdentifier { expected, found } => write!(
                f,
                "BadFileIdentifier: expected {expected:#010x}, found {found:#010x}"
            ),
            Error::BadUnionTag { tag, alternatives } => write!(
                f,
                "BadUnionTag: tag {tag} with {alternatives} declared alternatives"
            ),
            Error::InternalLayout { position, length, buffer_len } => write!(
                f,
                "InternalLayout: write of {length} bytes at position {position} \
                 outside buffer of {buffer_len}"
            ),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_names() {
        assert_eq!(
            Error::Truncated { offset: 0, len: 4, buffer_len: 2 }.error_name(),
            "Truncated"
        );
        assert_eq!(
            Error::BadFileIdentifier { expected: 1, found: 2 }.error_name(),
            "BadFileIdentifier"
        );
        assert_eq!(
            Error::BadUnionTag { tag: 9, alternatives: 3 }.error_name(),
            "BadUnionTag"
        );
        assert_eq!(
            Error::InternalLayout { position: 0, length: 0, buffer_len: 0 }.error_name(),
            "InternalLayout"
        );
    }

    #[test]
    fn display_carries_context() {
        let msg = Error::Truncated { offset: 12, len: 4, buffer_len: 8 }.to_string();
        assert!(msg.contains("12") && msg.contains("4") && msg.contains("8"), "{msg}");

        let msg = Error::BadUnionTag { tag: 7, alternatives: 3 }.to_string();
        assert!(msg.contains("7") && msg.contains("3"), "{msg}");
    }
}
