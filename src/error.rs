//! Error types shared across the crate.

use thiserror::Error;
use time::OffsetDateTime;

/// Represents errors that can occur in the tokencert library.
///
/// The enum is `Clone` so that a memoized decoding failure can be handed back
/// unchanged on every later structural accessor.
#[derive(Debug, Error, Clone)]
pub enum TokenCertError {
    /// A required native reference was null at construction.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The canonical byte form could not be produced.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// The canonical byte form could not be decoded.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// An accessor was invoked after the underlying handle was released.
    #[error("Native handle used after close")]
    UseAfterClose,

    /// The certificate's validity period ended before the checked date.
    #[error("Certificate expired at {not_after}")]
    Expired { not_after: OffsetDateTime },

    /// The certificate's validity period starts after the checked date.
    #[error("Certificate not valid until {not_before}")]
    NotYetValid { not_before: OffsetDateTime },

    /// Signature verification failed.
    #[error("Verification failure: {0}")]
    Verification(#[from] VerificationError),

    /// The token rejected a trust flag get or set.
    #[error("Trust operation failed: {0}")]
    TrustOperation(String),

    /// Any other internal failure, carrying the original cause as text.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Distinguished kinds of signature verification failure.
#[derive(Debug, Error, Clone)]
pub enum VerificationError {
    /// The certificate's signature algorithm is not supported.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The supplied public key does not fit the signature algorithm.
    #[error("invalid key for signature algorithm: {0}")]
    InvalidKey(String),

    /// The requested verification provider does not exist.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The signature does not verify under the supplied key.
    #[error("signature does not match")]
    BadSignature,

    /// Any other failure inside the verification path.
    #[error("{0}")]
    Other(String),
}

impl From<der::Error> for TokenCertError {
    /// Converts a `der::Error` into a `TokenCertError`.
    fn from(err: der::Error) -> Self {
        TokenCertError::DecodingError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TokenCertError>;
