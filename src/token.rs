//! The native token boundary: opaque references, the backend contract, and
//! the handle wrapper that guarantees exactly-once release.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, TokenCertError};
use crate::trust::TrustUsage;

/// An opaque reference into the token subsystem. Not inspectable; only
/// meaningful to the backend that issued it.
pub type RawRef = u64;

/// The null reference. Constructing a handle from it fails.
pub const NULL_REF: RawRef = 0;

/// The token-protocol layer this crate delegates to.
///
/// Implementations wrap a hardware or software security module. All
/// operations are synchronous blocking calls; timeouts and retries are the
/// implementation's concern. Every operation takes a live reference
/// previously handed out by the same backend.
pub trait TokenBackend: Send + Sync {
    /// DER encoding of the certificate.
    fn encoded(&self, cert: RawRef) -> Result<Vec<u8>>;

    /// Serial number as a big-endian two's-complement byte string.
    fn serial_number(&self, cert: RawRef) -> Result<Vec<u8>>;

    /// Subject distinguished name, rendered as a string.
    fn subject_dn(&self, cert: RawRef) -> Result<String>;

    /// Issuer distinguished name, rendered as a string.
    fn issuer_dn(&self, cert: RawRef) -> Result<String>;

    /// Subject public key as DER-encoded SubjectPublicKeyInfo.
    fn public_key(&self, cert: RawRef) -> Result<Vec<u8>>;

    /// X.509 version number (1, 2 or 3).
    fn version(&self, cert: RawRef) -> Result<u32>;

    /// Token-assigned unique identifier for the certificate object.
    fn unique_id(&self, cert: RawRef) -> Result<Vec<u8>>;

    /// Trust flag mask for one usage category. Only valid for certificates
    /// resident in the persistent trust store.
    fn trust(&self, cert: RawRef, usage: TrustUsage) -> Result<u16>;

    /// Stores the trust flag mask for one usage category. Only valid for
    /// certificates resident in the persistent trust store.
    fn set_trust(&self, cert: RawRef, usage: TrustUsage, mask: u16) -> Result<()>;

    /// Releases a certificate reference.
    fn release_certificate(&self, cert: RawRef) -> Result<()>;

    /// Releases one counted reference to a token. The token itself outlives
    /// the reference for as long as the registry holds others.
    fn release_token(&self, token: RawRef) -> Result<()>;
}

/// Which release operation a handle maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Certificate,
    Token,
}

/// Wraps one opaque native reference with a liveness flag.
///
/// The state machine is `Live -> Released`, terminal. `close` swaps the flag
/// atomically, so the underlying release runs at most once even when an
/// explicit close races a drop-triggered one. Errors from the release
/// operation are logged and contained: by the time close is called the
/// handle must be considered gone to the caller.
pub struct NativeHandle {
    raw: RawRef,
    kind: HandleKind,
    backend: Arc<dyn TokenBackend>,
    live: AtomicBool,
}

impl NativeHandle {
    /// Wraps a non-null native reference.
    pub fn new(backend: Arc<dyn TokenBackend>, raw: RawRef, kind: HandleKind) -> Result<Self> {
        if raw == NULL_REF {
            return Err(TokenCertError::InvalidArgument(format!(
                "null {kind:?} reference"
            )));
        }
        Ok(Self {
            raw,
            kind,
            backend,
            live: AtomicBool::new(true),
        })
    }

    /// The wrapped reference, or `UseAfterClose` once released.
    pub fn raw(&self) -> Result<RawRef> {
        if self.live.load(Ordering::Acquire) {
            Ok(self.raw)
        } else {
            Err(TokenCertError::UseAfterClose)
        }
    }

    /// True until the first `close` (explicit or drop-triggered).
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Releases the native resource. Idempotent; a second call is a no-op.
    pub fn close(&self) {
        if !self.live.swap(false, Ordering::AcqRel) {
            return;
        }
        let released = match self.kind {
            HandleKind::Certificate => self.backend.release_certificate(self.raw),
            HandleKind::Token => self.backend.release_token(self.raw),
        };
        if let Err(err) = released {
            tracing::warn!(kind = ?self.kind, %err, "native release failed");
        }
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &self.kind)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Capabilities of a certificate that lives on a token.
pub trait TokenResident {
    /// Token-assigned unique identifier for this certificate object.
    fn unique_id(&self) -> Result<Vec<u8>>;

    /// The reference to the owning token held since construction.
    fn owning_token(&self) -> Result<RawRef>;

    /// The label assigned at construction; not derived from the certificate.
    fn nickname(&self) -> &str;
}
