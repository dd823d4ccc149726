//! The certificate object: one identity over a token handle and a decoded
//! view, plus trust management and the close protocol.

use std::sync::{Arc, OnceLock};

use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::decoded::DecodedCertificate;
use crate::error::{Result, TokenCertError};
use crate::key::PublicKey;
use crate::token::{HandleKind, NULL_REF, NativeHandle, RawRef, TokenBackend, TokenResident};
use crate::trust::{TrustFlags, TrustSettings, TrustUsage, flags_from_mask};

/// A subject or issuer name keyed by its string rendering.
///
/// Equality and hashing compare the raw string the token produced, not the
/// structural attribute set: two DNs with reordered or differently encoded
/// attributes of equal meaning compare unequal. This matches the behavior of
/// the trust stores this crate interoperates with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamePrincipal(String);

impl NamePrincipal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NamePrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An X.509 certificate resident on a cryptographic token.
///
/// Accessors that the token answers directly (encoding, serial number,
/// names, public key, version) go through the certificate handle. Accessors
/// that need the full ASN.1 structure decode the DER form once, on first
/// use, and reuse the decoded view thereafter; the encoded form is immutable
/// so the memoization is sound. A decoding failure is memoized the same way
/// and repeats with the same cause for the object's lifetime; a failure to
/// fetch the encoded form is not, and the next access retries.
///
/// Identity is defined over the canonical encoded form: two independently
/// obtained handles to the same certificate compare equal.
///
/// Dropping the object releases both native handles; calling [`close`]
/// first releases them eagerly, and the drop then finds nothing left to do.
///
/// [`close`]: TokenCertificate::close
pub struct TokenCertificate {
    // Field order fixes drop order: the certificate handle is released
    // before the counted token reference.
    cert_handle: NativeHandle,
    token_handle: NativeHandle,
    backend: Arc<dyn TokenBackend>,
    nickname: String,
    decoded: OnceLock<Result<DecodedCertificate>>,
}

impl TokenCertificate {
    /// Wraps a certificate reference and one counted reference to its
    /// owning token.
    ///
    /// Fails with `InvalidArgument` if either reference is null; nothing is
    /// wrapped or released in that case.
    pub fn new(
        backend: Arc<dyn TokenBackend>,
        cert_ref: RawRef,
        token_ref: RawRef,
        nickname: impl Into<String>,
    ) -> Result<Self> {
        if cert_ref == NULL_REF {
            return Err(TokenCertError::InvalidArgument(
                "null certificate reference".into(),
            ));
        }
        if token_ref == NULL_REF {
            return Err(TokenCertError::InvalidArgument(
                "null token reference".into(),
            ));
        }
        let cert_handle =
            NativeHandle::new(backend.clone(), cert_ref, HandleKind::Certificate)?;
        let token_handle = NativeHandle::new(backend.clone(), token_ref, HandleKind::Token)?;
        Ok(Self {
            cert_handle,
            token_handle,
            backend,
            nickname: nickname.into(),
            decoded: OnceLock::new(),
        })
    }

    /// DER encoding of the certificate, fetched through the handle.
    pub fn encoded(&self) -> Result<Vec<u8>> {
        self.backend.encoded(self.cert_handle.raw()?)
    }

    /// SHA-256 digest of the DER encoding. Equal certificates have equal
    /// fingerprints.
    pub fn fingerprint(&self) -> Result<[u8; 32]> {
        Ok(Sha256::digest(self.encoded()?).into())
    }

    /// Byte-exact identity comparison over the encoded forms. Unlike the
    /// `PartialEq` impl this propagates an encoding failure instead of
    /// folding it into "not equal".
    pub fn matches(&self, other: &TokenCertificate) -> Result<bool> {
        Ok(self.encoded()? == other.encoded()?)
    }

    /// Serial number as the token's big-endian two's-complement byte
    /// string, the form an arbitrary-precision integer is built from.
    pub fn serial_number(&self) -> Result<Vec<u8>> {
        self.backend.serial_number(self.cert_handle.raw()?)
    }

    /// Subject name over the handle-backed DN string.
    pub fn subject(&self) -> Result<NamePrincipal> {
        Ok(NamePrincipal(
            self.backend.subject_dn(self.cert_handle.raw()?)?,
        ))
    }

    /// Issuer name over the handle-backed DN string.
    pub fn issuer(&self) -> Result<NamePrincipal> {
        Ok(NamePrincipal(
            self.backend.issuer_dn(self.cert_handle.raw()?)?,
        ))
    }

    /// The subject public key, decoded from the token's SPKI bytes.
    pub fn public_key(&self) -> Result<PublicKey> {
        let spki = self.backend.public_key(self.cert_handle.raw()?)?;
        PublicKey::from_spki_der(&spki)
    }

    /// X.509 version number, answered by the token.
    pub fn version(&self) -> Result<u32> {
        self.backend.version(self.cert_handle.raw()?)
    }

    /// Releases the certificate handle, then the token reference. Each is
    /// released independently; a failure on one never prevents the attempt
    /// on the other. Idempotent, and safe to race with a drop or another
    /// close: each native release runs at most once.
    pub fn close(&self) {
        self.cert_handle.close();
        self.token_handle.close();
    }

    /// True once `close` has run (or begun) on this object.
    pub fn is_closed(&self) -> bool {
        !self.cert_handle.is_live()
    }

    /// The decoded view, built on first use.
    fn decoded(&self) -> Result<&DecodedCertificate> {
        // A closed object refuses structural accessors even when the view
        // is already cached.
        self.cert_handle.raw()?;
        if let Some(cached) = self.decoded.get() {
            return cached.as_ref().map_err(|e| e.clone());
        }
        // Fetch before entering the cell: a failed fetch propagates without
        // being memoized, so the next access retries once the token
        // recovers. Only the pure decode result is cached.
        let der = self.encoded()?;
        let cached = self.decoded.get_or_init(|| {
            tracing::debug!(nickname = %self.nickname, "decoding certificate");
            DecodedCertificate::from_der(&der)
        });
        cached.as_ref().map_err(|e| e.clone())
    }

    /// The basic constraints extension, if present.
    pub fn basic_constraints(
        &self,
    ) -> Result<Option<x509_cert::ext::pkix::BasicConstraints>> {
        self.decoded()?.basic_constraints()
    }

    /// The key usage bitset, if the extension is present.
    pub fn key_usage(
        &self,
    ) -> Result<Option<flagset::FlagSet<x509_cert::ext::pkix::KeyUsages>>> {
        self.decoded()?.key_usage()
    }

    /// The subject unique identifier, if present.
    pub fn subject_unique_id(&self) -> Result<Option<der::asn1::BitString>> {
        Ok(self.decoded()?.subject_unique_id())
    }

    /// The issuer unique identifier, if present.
    pub fn issuer_unique_id(&self) -> Result<Option<der::asn1::BitString>> {
        Ok(self.decoded()?.issuer_unique_id())
    }

    /// OID of the signature algorithm.
    pub fn signature_algorithm_oid(&self) -> Result<const_oid::ObjectIdentifier> {
        Ok(self.decoded()?.signature_algorithm_oid())
    }

    /// Display name of the signature algorithm.
    pub fn signature_algorithm_name(&self) -> Result<String> {
        Ok(self.decoded()?.signature_algorithm_name())
    }

    /// DER-encoded signature algorithm parameters, if any.
    pub fn signature_algorithm_params(&self) -> Result<Option<Vec<u8>>> {
        self.decoded()?.signature_algorithm_params()
    }

    /// Raw signature bytes.
    pub fn signature(&self) -> Result<Vec<u8>> {
        self.decoded()?.signature()
    }

    /// DER encoding of the to-be-signed substructure.
    pub fn tbs_certificate(&self) -> Result<Vec<u8>> {
        self.decoded()?.tbs_certificate()
    }

    /// Start of the validity period.
    pub fn not_before(&self) -> Result<OffsetDateTime> {
        Ok(self.decoded()?.not_before())
    }

    /// End of the validity period.
    pub fn not_after(&self) -> Result<OffsetDateTime> {
        Ok(self.decoded()?.not_after())
    }

    /// Checks validity against the current time.
    pub fn check_validity(&self) -> Result<()> {
        self.decoded()?.check_validity()
    }

    /// Checks validity at `at`, bounds inclusive.
    pub fn check_validity_at(&self, at: OffsetDateTime) -> Result<()> {
        self.decoded()?.check_validity_at(at)
    }

    /// Verifies the certificate's signature under the issuer's public key.
    pub fn verify_signature(&self, issuer_key: &PublicKey) -> Result<()> {
        self.decoded()?.verify_signature(issuer_key)
    }

    /// Verifies the signature, selecting a provider by name.
    pub fn verify_signature_with_provider(
        &self,
        issuer_key: &PublicKey,
        provider: &str,
    ) -> Result<()> {
        self.decoded()?
            .verify_signature_with_provider(issuer_key, provider)
    }

    /// The value of the extension identified by `oid`, if present.
    pub fn extension_value(&self, oid: const_oid::ObjectIdentifier) -> Result<Option<Vec<u8>>> {
        Ok(self.decoded()?.extension_value(oid).map(|v| v.to_vec()))
    }

    /// Identifiers of all critical extensions.
    pub fn critical_extension_oids(&self) -> Result<Vec<const_oid::ObjectIdentifier>> {
        Ok(self.decoded()?.critical_extension_oids())
    }

    /// Identifiers of all non-critical extensions.
    pub fn non_critical_extension_oids(&self) -> Result<Vec<const_oid::ObjectIdentifier>> {
        Ok(self.decoded()?.non_critical_extension_oids())
    }

    /// True when the certificate carries a critical extension this crate
    /// cannot interpret.
    pub fn has_unsupported_critical_extension(&self) -> Result<bool> {
        Ok(self.decoded()?.has_unsupported_critical_extension())
    }
}

impl PartialEq for TokenCertificate {
    /// Equal iff both encoded forms can be produced and are byte-identical.
    /// An object whose encoding fails equals nothing, itself included; use
    /// [`matches`](TokenCertificate::matches) to observe the failure.
    fn eq(&self, other: &Self) -> bool {
        self.matches(other).unwrap_or(false)
    }
}

impl std::hash::Hash for TokenCertificate {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.encoded().ok().hash(state);
    }
}

impl TokenResident for TokenCertificate {
    fn unique_id(&self) -> Result<Vec<u8>> {
        self.backend.unique_id(self.cert_handle.raw()?)
    }

    fn owning_token(&self) -> Result<RawRef> {
        self.token_handle.raw()
    }

    fn nickname(&self) -> &str {
        &self.nickname
    }
}

impl TrustSettings for TokenCertificate {
    fn trust(&self, usage: TrustUsage) -> Result<TrustFlags> {
        let mask = self.backend.trust(self.cert_handle.raw()?, usage)?;
        flags_from_mask(mask)
    }

    fn set_trust(&self, usage: TrustUsage, flags: TrustFlags) -> Result<()> {
        self.backend
            .set_trust(self.cert_handle.raw()?, usage, flags.bits())
    }
}

impl std::fmt::Display for TokenCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.decoded() {
            Ok(view) => std::fmt::Display::fmt(view, f),
            Err(err) => write!(f, "Certificate \"{}\" ({err})", self.nickname),
        }
    }
}

impl std::fmt::Debug for TokenCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCertificate")
            .field("nickname", &self.nickname)
            .field("cert_handle", &self.cert_handle)
            .field("token_handle", &self.token_handle)
            .finish()
    }
}
