//! Shared fixtures: an in-memory token double and a self-signed certificate
//! builder.

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use der::Encode;
use der::asn1::{BitString, OctetString, UtcTime};
use flagset::FlagSet;
use time::OffsetDateTime;
use x509_cert::certificate::{CertificateInner, TbsCertificateInner};
use x509_cert::ext::pkix::{KeyUsage, KeyUsages};
use x509_cert::name::RdnSequence;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::AlgorithmIdentifierOwned;

use tokencert::decoded::DecodedCertificate;
use tokencert::error::{Result, TokenCertError};
use tokencert::key::KeyPair;
use tokencert::token::{RawRef, TokenBackend};
use tokencert::trust::TrustUsage;

/// 2024-01-01T00:00:00Z
pub const T0: i64 = 1_704_067_200;
/// 2025-01-01T00:00:00Z
pub const T1: i64 = 1_735_689_600;

pub fn at(unix: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(unix).unwrap()
}

struct StoredCert {
    der: Vec<u8>,
    persistent: bool,
    trust: [u16; 3],
}

/// An in-memory stand-in for the token-protocol layer, instrumented with
/// release and fetch counters.
pub struct FakeToken {
    certs: Mutex<HashMap<RawRef, StoredCert>>,
    flaky_encoded: AtomicBool,
    pub cert_releases: AtomicUsize,
    pub token_releases: AtomicUsize,
    pub encoded_fetches: AtomicUsize,
}

fn usage_index(usage: TrustUsage) -> usize {
    match usage {
        TrustUsage::Tls => 0,
        TrustUsage::SecureMail => 1,
        TrustUsage::ObjectSigning => 2,
    }
}

impl FakeToken {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            certs: Mutex::new(HashMap::new()),
            flaky_encoded: AtomicBool::new(false),
            cert_releases: AtomicUsize::new(0),
            token_releases: AtomicUsize::new(0),
            encoded_fetches: AtomicUsize::new(0),
        })
    }

    pub fn add_certificate(&self, cert_ref: RawRef, der: Vec<u8>, persistent: bool) {
        self.certs.lock().unwrap().insert(
            cert_ref,
            StoredCert {
                der,
                persistent,
                trust: [0; 3],
            },
        );
    }

    /// Makes the next `encoded` fetch fail, as a transient token fault
    /// would.
    pub fn fail_next_encoded(&self) {
        self.flaky_encoded.store(true, Ordering::SeqCst);
    }

    /// Direct store read; does not count as a handle-backed fetch.
    pub fn encoded_of(&self, cert_ref: RawRef) -> Vec<u8> {
        self.certs.lock().unwrap()[&cert_ref].der.clone()
    }

    /// Edits the trust store directly, as another process would.
    pub fn write_trust(&self, cert_ref: RawRef, usage: TrustUsage, mask: u16) {
        let mut certs = self.certs.lock().unwrap();
        certs.get_mut(&cert_ref).unwrap().trust[usage_index(usage)] = mask;
    }

    /// Reads the trust store directly, bypassing the certificate object.
    pub fn read_trust(&self, cert_ref: RawRef, usage: TrustUsage) -> u16 {
        self.certs.lock().unwrap()[&cert_ref].trust[usage_index(usage)]
    }

    fn with_cert<T>(&self, cert: RawRef, f: impl FnOnce(&StoredCert) -> T) -> Result<T> {
        let certs = self.certs.lock().unwrap();
        certs
            .get(&cert)
            .map(f)
            .ok_or_else(|| TokenCertError::Internal(format!("unknown certificate ref {cert}")))
    }

    fn decoded(&self, cert: RawRef) -> Result<DecodedCertificate> {
        let der = self.with_cert(cert, |stored| stored.der.clone())?;
        DecodedCertificate::from_der(&der)
    }
}

impl TokenBackend for FakeToken {
    fn encoded(&self, cert: RawRef) -> Result<Vec<u8>> {
        self.encoded_fetches.fetch_add(1, Ordering::SeqCst);
        if self.flaky_encoded.swap(false, Ordering::SeqCst) {
            return Err(TokenCertError::Internal("transient token fault".into()));
        }
        self.with_cert(cert, |stored| stored.der.clone())
    }

    fn serial_number(&self, cert: RawRef) -> Result<Vec<u8>> {
        Ok(self.decoded(cert)?.serial_number().to_vec())
    }

    fn subject_dn(&self, cert: RawRef) -> Result<String> {
        Ok(self.decoded(cert)?.subject())
    }

    fn issuer_dn(&self, cert: RawRef) -> Result<String> {
        Ok(self.decoded(cert)?.issuer())
    }

    fn public_key(&self, cert: RawRef) -> Result<Vec<u8>> {
        let decoded = self.decoded(cert)?;
        decoded
            .inner()
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| TokenCertError::EncodingError(e.to_string()))
    }

    fn version(&self, cert: RawRef) -> Result<u32> {
        Ok(self.decoded(cert)?.version())
    }

    fn unique_id(&self, cert: RawRef) -> Result<Vec<u8>> {
        self.with_cert(cert, |_| cert.to_be_bytes().to_vec())
    }

    fn trust(&self, cert: RawRef, usage: TrustUsage) -> Result<u16> {
        self.with_cert(cert, |stored| {
            if stored.persistent {
                Ok(stored.trust[usage_index(usage)])
            } else {
                Err(TokenCertError::TrustOperation(
                    "certificate is not resident in the persistent store".into(),
                ))
            }
        })?
    }

    fn set_trust(&self, cert: RawRef, usage: TrustUsage, mask: u16) -> Result<()> {
        let mut certs = self.certs.lock().unwrap();
        let stored = certs
            .get_mut(&cert)
            .ok_or_else(|| TokenCertError::Internal(format!("unknown certificate ref {cert}")))?;
        if !stored.persistent {
            return Err(TokenCertError::TrustOperation(
                "certificate is not resident in the persistent store".into(),
            ));
        }
        stored.trust[usage_index(usage)] = mask;
        Ok(())
    }

    fn release_certificate(&self, _cert: RawRef) -> Result<()> {
        self.cert_releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release_token(&self, _token: RawRef) -> Result<()> {
        self.token_releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mints a self-signed certificate valid over `[not_before, not_after]`,
/// signed by `key`.
pub fn self_signed_der(
    subject: &str,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    key: &KeyPair,
) -> Vec<u8> {
    build_self_signed(subject, not_before, not_after, key, None)
}

/// Same, with a non-critical KeyUsage extension carrying `usages`.
pub fn self_signed_der_with_key_usage(
    subject: &str,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    key: &KeyPair,
    usages: FlagSet<KeyUsages>,
) -> Vec<u8> {
    build_self_signed(subject, not_before, not_after, key, Some(usages))
}

fn build_self_signed(
    subject: &str,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
    key: &KeyPair,
    key_usage: Option<FlagSet<KeyUsages>>,
) -> Vec<u8> {
    let name = RdnSequence::from_str(&format!("CN={subject}")).unwrap();
    let signature_algorithm = AlgorithmIdentifierOwned {
        oid: key.signature_algorithm().oid(),
        parameters: None,
    };

    let basic_constraints = x509_cert::ext::pkix::BasicConstraints {
        ca: true,
        path_len_constraint: None,
    };
    let mut extensions = vec![x509_cert::ext::Extension {
        extn_id: <x509_cert::ext::pkix::BasicConstraints as const_oid::AssociatedOid>::OID,
        critical: true,
        extn_value: OctetString::new(basic_constraints.to_der().unwrap()).unwrap(),
    }];
    if let Some(usages) = key_usage {
        extensions.push(x509_cert::ext::Extension {
            extn_id: <KeyUsage as const_oid::AssociatedOid>::OID,
            critical: false,
            extn_value: OctetString::new(KeyUsage(usages).to_der().unwrap()).unwrap(),
        });
    }

    let validity = x509_cert::time::Validity {
        not_before: x509_cert::time::Time::UtcTime(
            UtcTime::from_system_time(not_before.into()).unwrap(),
        ),
        not_after: x509_cert::time::Time::UtcTime(
            UtcTime::from_system_time(not_after.into()).unwrap(),
        ),
    };

    // The Profile parameter only defaults in type position.
    let tbs: TbsCertificateInner = TbsCertificateInner {
        version: x509_cert::Version::V3,
        serial_number: SerialNumber::new(&[0x01, 0x23]).unwrap(),
        signature: signature_algorithm.clone(),
        issuer: name.clone(),
        validity,
        subject: name,
        subject_public_key_info: key.spki().unwrap(),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    };

    let signature = key.sign_data(&tbs.to_der().unwrap()).unwrap();

    let cert = CertificateInner {
        tbs_certificate: tbs,
        signature_algorithm,
        signature: BitString::from_bytes(&signature).unwrap(),
    };
    cert.to_der().unwrap()
}

/// A fake token preloaded with one persistent self-signed certificate.
pub fn token_with_cert() -> (Arc<FakeToken>, KeyPair, RawRef, RawRef) {
    let key = KeyPair::generate_ecdsa_p256();
    let der = self_signed_der("test.example", at(T0), at(T1), &key);
    let backend = FakeToken::new();
    let cert_ref: RawRef = 0x2001;
    let token_ref: RawRef = 0x1001;
    backend.add_certificate(cert_ref, der, true);
    (backend, key, cert_ref, token_ref)
}
