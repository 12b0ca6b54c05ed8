//! Error types for value parsing.

use thiserror::Error;

/// Errors produced while parsing identifiers and names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// The hex text has the wrong length.
    #[error("invalid object id length: {0}")]
    InvalidLength(usize),

    /// The hex text contains a byte outside `[0-9a-f]`.
    #[error("invalid object id character {byte:?} at offset {offset}")]
    InvalidCharacter {
        /// The offending byte.
        byte: char,
        /// Its position in the input.
        offset: usize,
    },

    /// The reference name is unusable on the wire.
    #[error("invalid reference name: {0:?}")]
    InvalidReference(String),
}

/// A specialized Result type for value parsing.
pub type Result<T> = std::result::Result<T, TypesError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_display() {
        assert_eq!(
            TypesError::InvalidLength(12).to_string(),
            "invalid object id length: 12"
        );
        assert_eq!(
            TypesError::InvalidCharacter {
                byte: 'G',
                offset: 3
            }
            .to_string(),
            "invalid object id character 'G' at offset 3"
        );
    }
}
