//! Error handling for the archive codec.
//!
//! Every failure surfaces to the caller; nothing inside the codec retries.

use thiserror::Error;

/// Errors produced while writing or reading an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The sink or source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The header does not follow the entry grammar.
    #[error("corrupt archive: {message}")]
    Corrupt {
        /// What was wrong with the header.
        message: String,
    },

    /// The packed body is shorter than its header requires.
    #[error("premature end of bitstream: expected {expected} body bytes, found {found}")]
    PrematureEnd {
        /// Body bytes required by the header.
        expected: u64,
        /// Body bytes actually available.
        found: u64,
    },

    /// The bitstream ran out in the middle of a codeword.
    #[error("unreachable code: bitstream exhausted after {decoded} of {expected} symbols")]
    UnreachableCode {
        /// Symbols decoded before the stream ran out.
        decoded: u64,
        /// Symbols declared by the header.
        expected: u64,
    },

    /// The output buffer could not be reserved.
    #[error("out of memory: cannot reserve {size} bytes")]
    OutOfMemory {
        /// Bytes requested.
        size: u64,
    },

    /// The entry name cannot be stored in a header line.
    #[error("invalid entry name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A configuration value is out of range or could not be loaded.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// What was wrong.
        message: String,
    },
}

impl ArchiveError {
    /// Create a corrupt archive error.
    pub fn corrupt<S: Into<String>>(message: S) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid name error.
    pub fn invalid_name<S: Into<String>>(name: S) -> Self {
        Self::InvalidName { name: name.into() }
    }

    /// True for failures caused by the archive content rather than the environment.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Corrupt { .. } | Self::PrematureEnd { .. } | Self::UnreachableCode { .. }
        )
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_classification() {
        assert!(ArchiveError::corrupt("bad digit").is_corruption());
        assert!(ArchiveError::PrematureEnd {
            expected: 4,
            found: 3
        }
        .is_corruption());
        assert!(ArchiveError::UnreachableCode {
            decoded: 1,
            expected: 2
        }
        .is_corruption());
        assert!(!ArchiveError::invalid_name("a\nb").is_corruption());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        assert!(!ArchiveError::from(io).is_corruption());
    }

    #[test]
    fn test_error_messages() {
        let err = ArchiveError::PrematureEnd {
            expected: 4,
            found: 3,
        };
        assert_eq!(
            err.to_string(),
            "premature end of bitstream: expected 4 body bytes, found 3"
        );
        assert_eq!(
            ArchiveError::corrupt("missing file name").to_string(),
            "corrupt archive: missing file name"
        );
    }
}
