//! The fully decoded structural view of a certificate.
//!
//! Built on demand from the DER form via `x509-cert`; everything here is a
//! pure function of the immutable bytes, so a decoded view is safe to cache
//! for the lifetime of the certificate object that produced it.

use const_oid::{AssociatedOid, ObjectIdentifier};
use der::asn1::BitString;
use der::{Decode, Encode};
use flagset::FlagSet;
use time::OffsetDateTime;
use x509_cert::Certificate;
use x509_cert::ext::Extension;
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
    SubjectAltName, SubjectKeyIdentifier,
};

use crate::error::{Result, TokenCertError, VerificationError};
use crate::key::{PublicKey, SignatureAlgorithm};

/// The verification provider built into this crate.
pub const PROVIDER_RUSTCRYPTO: &str = "rustcrypto";

/// Critical extensions this crate knows how to interpret.
const SUPPORTED_EXTENSIONS: [ObjectIdentifier; 6] = [
    BasicConstraints::OID,
    KeyUsage::OID,
    ExtendedKeyUsage::OID,
    SubjectAltName::OID,
    AuthorityKeyIdentifier::OID,
    SubjectKeyIdentifier::OID,
];

/// A decoded X.509 certificate.
///
/// Wraps the `x509-cert` structure and exposes the accessors that require
/// the full ASN.1 view rather than a token round trip.
#[derive(Debug, Clone)]
pub struct DecodedCertificate {
    inner: Certificate,
}

impl DecodedCertificate {
    /// Decodes a DER-encoded certificate.
    pub fn from_der(der_bytes: &[u8]) -> Result<Self> {
        let inner = Certificate::from_der(der_bytes)
            .map_err(|e| TokenCertError::DecodingError(e.to_string()))?;
        Ok(Self { inner })
    }

    /// The underlying `x509-cert` structure.
    pub fn inner(&self) -> &Certificate {
        &self.inner
    }

    /// X.509 version number (1, 2 or 3).
    pub fn version(&self) -> u32 {
        match self.inner.tbs_certificate.version {
            x509_cert::Version::V1 => 1,
            x509_cert::Version::V2 => 2,
            x509_cert::Version::V3 => 3,
        }
    }

    /// Serial number bytes, big-endian.
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    /// Subject distinguished name rendered per RFC 4514.
    pub fn subject(&self) -> String {
        self.inner.tbs_certificate.subject.to_string()
    }

    /// Issuer distinguished name rendered per RFC 4514.
    pub fn issuer(&self) -> String {
        self.inner.tbs_certificate.issuer.to_string()
    }

    /// The basic constraints extension, if present.
    pub fn basic_constraints(&self) -> Result<Option<BasicConstraints>> {
        match self.extension_value(BasicConstraints::OID) {
            Some(value) => Ok(Some(BasicConstraints::from_der(value)?)),
            None => Ok(None),
        }
    }

    /// The key usage bitset, if the extension is present.
    pub fn key_usage(&self) -> Result<Option<FlagSet<KeyUsages>>> {
        match self.extension_value(KeyUsage::OID) {
            Some(value) => Ok(Some(KeyUsage::from_der(value)?.0)),
            None => Ok(None),
        }
    }

    /// The subject unique identifier, if present.
    pub fn subject_unique_id(&self) -> Option<BitString> {
        self.inner.tbs_certificate.subject_unique_id.clone()
    }

    /// The issuer unique identifier, if present.
    pub fn issuer_unique_id(&self) -> Option<BitString> {
        self.inner.tbs_certificate.issuer_unique_id.clone()
    }

    /// OID of the certificate's signature algorithm.
    pub fn signature_algorithm_oid(&self) -> ObjectIdentifier {
        self.inner.signature_algorithm.oid
    }

    /// The signature algorithm, if this crate supports it.
    pub fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(self.signature_algorithm_oid())
    }

    /// Display name of the signature algorithm; the dotted OID when the
    /// algorithm is not one this crate knows.
    pub fn signature_algorithm_name(&self) -> String {
        match self.signature_algorithm() {
            Some(algorithm) => algorithm.name().to_string(),
            None => self.signature_algorithm_oid().to_string(),
        }
    }

    /// DER-encoded signature algorithm parameters, if any.
    pub fn signature_algorithm_params(&self) -> Result<Option<Vec<u8>>> {
        match &self.inner.signature_algorithm.parameters {
            Some(params) => {
                let der_bytes = params
                    .to_der()
                    .map_err(|e| TokenCertError::EncodingError(e.to_string()))?;
                Ok(Some(der_bytes))
            }
            None => Ok(None),
        }
    }

    /// Raw signature bytes.
    pub fn signature(&self) -> Result<Vec<u8>> {
        self.inner
            .signature
            .as_bytes()
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| TokenCertError::DecodingError("unaligned signature bits".into()))
    }

    /// DER encoding of the to-be-signed substructure.
    pub fn tbs_certificate(&self) -> Result<Vec<u8>> {
        self.inner
            .tbs_certificate
            .to_der()
            .map_err(|e| TokenCertError::EncodingError(e.to_string()))
    }

    /// Start of the validity period.
    pub fn not_before(&self) -> OffsetDateTime {
        match self.inner.tbs_certificate.validity.not_before {
            x509_cert::time::Time::UtcTime(ut) => OffsetDateTime::from(ut.to_system_time()),
            x509_cert::time::Time::GeneralTime(gt) => OffsetDateTime::from(gt.to_system_time()),
        }
    }

    /// End of the validity period.
    pub fn not_after(&self) -> OffsetDateTime {
        match self.inner.tbs_certificate.validity.not_after {
            x509_cert::time::Time::UtcTime(ut) => OffsetDateTime::from(ut.to_system_time()),
            x509_cert::time::Time::GeneralTime(gt) => OffsetDateTime::from(gt.to_system_time()),
        }
    }

    /// Checks validity against the current time.
    pub fn check_validity(&self) -> Result<()> {
        self.check_validity_at(OffsetDateTime::now_utc())
    }

    /// Checks validity at `at`. Both bounds are inclusive: a date exactly
    /// equal to notBefore or notAfter is valid.
    pub fn check_validity_at(&self, at: OffsetDateTime) -> Result<()> {
        let not_before = self.not_before();
        if at < not_before {
            return Err(TokenCertError::NotYetValid { not_before });
        }
        let not_after = self.not_after();
        if at > not_after {
            return Err(TokenCertError::Expired { not_after });
        }
        Ok(())
    }

    /// All extensions, in certificate order.
    pub fn extensions(&self) -> &[Extension] {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or(&[])
    }

    /// The value of the extension identified by `oid`, if present.
    pub fn extension_value(&self, oid: ObjectIdentifier) -> Option<&[u8]> {
        self.extensions()
            .iter()
            .find(|ext| ext.extn_id == oid)
            .map(|ext| ext.extn_value.as_bytes())
    }

    /// Identifiers of all critical extensions.
    pub fn critical_extension_oids(&self) -> Vec<ObjectIdentifier> {
        self.extensions()
            .iter()
            .filter(|ext| ext.critical)
            .map(|ext| ext.extn_id)
            .collect()
    }

    /// Identifiers of all non-critical extensions.
    pub fn non_critical_extension_oids(&self) -> Vec<ObjectIdentifier> {
        self.extensions()
            .iter()
            .filter(|ext| !ext.critical)
            .map(|ext| ext.extn_id)
            .collect()
    }

    /// True when the certificate carries a critical extension this crate
    /// cannot interpret.
    pub fn has_unsupported_critical_extension(&self) -> bool {
        self.extensions()
            .iter()
            .any(|ext| ext.critical && !SUPPORTED_EXTENSIONS.contains(&ext.extn_id))
    }

    /// Verifies the certificate's signature under the issuer's public key.
    pub fn verify_signature(&self, issuer_key: &PublicKey) -> Result<()> {
        let oid = self.signature_algorithm_oid();
        let algorithm = self
            .signature_algorithm()
            .ok_or_else(|| VerificationError::UnsupportedAlgorithm(oid.to_string()))?;
        let message = self
            .tbs_certificate()
            .map_err(|e| VerificationError::Other(e.to_string()))?;
        let signature = self
            .signature()
            .map_err(|e| VerificationError::Other(e.to_string()))?;
        issuer_key
            .verify(algorithm, &message, &signature)
            .map_err(TokenCertError::Verification)
    }

    /// Verifies the signature, selecting a provider by name.
    pub fn verify_signature_with_provider(
        &self,
        issuer_key: &PublicKey,
        provider: &str,
    ) -> Result<()> {
        if provider != PROVIDER_RUSTCRYPTO {
            return Err(VerificationError::UnknownProvider(provider.to_string()).into());
        }
        self.verify_signature(issuer_key)
    }
}

impl std::fmt::Display for DecodedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Certificate")?;
        writeln!(f, "  subject: {}", self.subject())?;
        writeln!(f, "  issuer: {}", self.issuer())?;
        writeln!(f, "  serial: {}", hex::encode(self.serial_number()))?;
        writeln!(f, "  version: {}", self.version())?;
        writeln!(
            f,
            "  validity: {} to {}",
            self.not_before(),
            self.not_after()
        )?;
        write!(f, "  algorithm: {}", self.signature_algorithm_name())
    }
}
