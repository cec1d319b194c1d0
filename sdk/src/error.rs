//! SDK error types.
//!
//! Provides error types for codec and conversion operations.

/// SDK errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkError {
    /// Input was not valid standard base64.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    /// A chain enumeration carried a value with no known meaning.
    #[error("unknown {kind} value: {value}")]
    UnknownEnumValue {
        /// Name of the enumeration.
        kind: &'static str,
        /// The raw value received.
        value: String,
    },

    /// Arithmetic overflow.
    #[error("arithmetic overflow")]
    Overflow,

    /// Protobuf decoding failed.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<prost::DecodeError> for SdkError {
    fn from(err: prost::DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}
