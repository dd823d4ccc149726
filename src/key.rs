//! Public keys, key pairs and signature algorithm identifiers.
//!
//! Verification delegates to the RustCrypto implementations; the key family
//! must match the certificate's signature algorithm (ECDSA additionally
//! requires the curve paired with the hash the algorithm names).

use const_oid::ObjectIdentifier;
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use ed25519_dalek::VerifyingKey as Ed25519VerifyingKey;
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::VerifyingKey as P384VerifyingKey;
use p521::ecdsa::VerifyingKey as P521VerifyingKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{Result, TokenCertError, VerificationError};

/// The signature algorithms this crate can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA PKCS#1 v1.5.
    Sha256WithRsa,
    /// ECDSA over P-256 with SHA-256.
    EcdsaWithSha256,
    /// ECDSA over P-384 with SHA-384.
    EcdsaWithSha384,
    /// ECDSA over P-521 with SHA-512.
    EcdsaWithSha512,
    /// Ed25519.
    Ed25519,
}

impl SignatureAlgorithm {
    /// Maps an algorithm OID to a supported algorithm, if any.
    pub fn from_oid(oid: ObjectIdentifier) -> Option<Self> {
        match oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                Some(SignatureAlgorithm::Sha256WithRsa)
            }
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => Some(SignatureAlgorithm::EcdsaWithSha256),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_384 => Some(SignatureAlgorithm::EcdsaWithSha384),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_512 => Some(SignatureAlgorithm::EcdsaWithSha512),
            const_oid::db::rfc8410::ID_ED_25519 => Some(SignatureAlgorithm::Ed25519),
            _ => None,
        }
    }

    /// The OID identifying this algorithm.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRsa => {
                const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION
            }
            SignatureAlgorithm::EcdsaWithSha256 => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::EcdsaWithSha384 => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::EcdsaWithSha512 => const_oid::db::rfc5912::ECDSA_WITH_SHA_512,
            SignatureAlgorithm::Ed25519 => const_oid::db::rfc8410::ID_ED_25519,
        }
    }

    /// Conventional display name for the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha256WithRsa => "SHA256withRSA",
            SignatureAlgorithm::EcdsaWithSha256 => "SHA256withECDSA",
            SignatureAlgorithm::EcdsaWithSha384 => "SHA384withECDSA",
            SignatureAlgorithm::EcdsaWithSha512 => "SHA512withECDSA",
            SignatureAlgorithm::Ed25519 => "Ed25519",
        }
    }
}

/// A decoded subject public key.
#[derive(Clone)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    EcdsaP521(P521VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl std::fmt::Debug for PublicKey {
    /// Variant name only; key material stays out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PublicKey::Rsa(_) => "Rsa",
            PublicKey::EcdsaP256(_) => "EcdsaP256",
            PublicKey::EcdsaP384(_) => "EcdsaP384",
            PublicKey::EcdsaP521(_) => "EcdsaP521",
            PublicKey::Ed25519(_) => "Ed25519",
        })
    }
}

impl PublicKey {
    /// Decodes a DER-encoded SubjectPublicKeyInfo.
    pub fn from_spki_der(der_bytes: &[u8]) -> Result<Self> {
        use der::Decode;
        let spki = SubjectPublicKeyInfoOwned::from_der(der_bytes)?;
        Self::from_spki(&spki)
    }

    /// Converts from an already decoded SubjectPublicKeyInfo.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let key_bytes = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| TokenCertError::DecodingError("unaligned public key bits".into()))?;

        match spki.algorithm.oid {
            const_oid::db::rfc5912::RSA_ENCRYPTION => {
                let public = RsaPublicKey::from_pkcs1_der(key_bytes)
                    .map_err(|e| TokenCertError::DecodingError(e.to_string()))?;
                Ok(PublicKey::Rsa(public))
            }
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .ok_or_else(|| {
                        TokenCertError::DecodingError("missing EC curve parameters".into())
                    })?
                    .decode_as::<ObjectIdentifier>()?;
                match curve {
                    const_oid::db::rfc5912::SECP_256_R_1 => {
                        let key = P256VerifyingKey::from_sec1_bytes(key_bytes)
                            .map_err(|e| TokenCertError::DecodingError(e.to_string()))?;
                        Ok(PublicKey::EcdsaP256(key))
                    }
                    const_oid::db::rfc5912::SECP_384_R_1 => {
                        let key = P384VerifyingKey::from_sec1_bytes(key_bytes)
                            .map_err(|e| TokenCertError::DecodingError(e.to_string()))?;
                        Ok(PublicKey::EcdsaP384(key))
                    }
                    const_oid::db::rfc5912::SECP_521_R_1 => {
                        let key = P521VerifyingKey::from_sec1_bytes(key_bytes)
                            .map_err(|e| TokenCertError::DecodingError(e.to_string()))?;
                        Ok(PublicKey::EcdsaP521(key))
                    }
                    other => Err(TokenCertError::DecodingError(format!(
                        "unsupported EC curve {other}"
                    ))),
                }
            }
            const_oid::db::rfc8410::ID_ED_25519 => {
                let raw: [u8; 32] = key_bytes.try_into().map_err(|_| {
                    TokenCertError::DecodingError("Ed25519 key is not 32 bytes".into())
                })?;
                let key = Ed25519VerifyingKey::from_bytes(&raw)
                    .map_err(|e| TokenCertError::DecodingError(e.to_string()))?;
                Ok(PublicKey::Ed25519(key))
            }
            other => Err(TokenCertError::DecodingError(format!(
                "unsupported public key algorithm {other}"
            ))),
        }
    }

    /// Verifies `signature` over `message` under the given algorithm.
    ///
    /// A key of the wrong family or curve for the algorithm is an
    /// [`VerificationError::InvalidKey`]; a key of the right shape whose
    /// verification fails is [`VerificationError::BadSignature`].
    pub fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> std::result::Result<(), VerificationError> {
        match (algorithm, self) {
            (SignatureAlgorithm::Sha256WithRsa, PublicKey::Rsa(public)) => {
                let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public.clone());
                let signature = rsa::pkcs1v15::Signature::try_from(signature)
                    .map_err(|_| VerificationError::BadSignature)?;
                verifying_key
                    .verify(message, &signature)
                    .map_err(|_| VerificationError::BadSignature)
            }
            (SignatureAlgorithm::EcdsaWithSha256, PublicKey::EcdsaP256(key)) => {
                let signature = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|_| VerificationError::BadSignature)?;
                key.verify(message, &signature)
                    .map_err(|_| VerificationError::BadSignature)
            }
            (SignatureAlgorithm::EcdsaWithSha384, PublicKey::EcdsaP384(key)) => {
                let signature = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|_| VerificationError::BadSignature)?;
                key.verify(message, &signature)
                    .map_err(|_| VerificationError::BadSignature)
            }
            (SignatureAlgorithm::EcdsaWithSha512, PublicKey::EcdsaP521(key)) => {
                let signature = p521::ecdsa::Signature::from_der(signature)
                    .map_err(|_| VerificationError::BadSignature)?;
                key.verify(message, &signature)
                    .map_err(|_| VerificationError::BadSignature)
            }
            (SignatureAlgorithm::Ed25519, PublicKey::Ed25519(key)) => {
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| VerificationError::BadSignature)?;
                key.verify(message, &signature)
                    .map_err(|_| VerificationError::BadSignature)
            }
            (algorithm, _) => Err(VerificationError::InvalidKey(format!(
                "key does not fit {}",
                algorithm.name()
            ))),
        }
    }
}

/// A signing key pair. Used by callers that mint certificates for a token,
/// and by the test fixtures in this repository.
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| TokenCertError::Internal(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P256SigningKey::random(&mut rng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = Ed25519SigningKey::generate(&mut rng);
        KeyPair::Ed25519 { signing_key }
    }

    /// The signature algorithm this key signs with.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRsa,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::EcdsaWithSha256,
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
        }
    }

    /// The public half.
    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::Ed25519 { signing_key } => PublicKey::Ed25519(signing_key.verifying_key()),
        }
    }

    /// The public half as SubjectPublicKeyInfo.
    pub fn spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            KeyPair::Rsa { public, .. } => SubjectPublicKeyInfoOwned::from_key(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)
            }
            KeyPair::Ed25519 { signing_key } => {
                SubjectPublicKeyInfoOwned::from_key(signing_key.verifying_key())
            }
        };
        spki.map_err(|e| TokenCertError::EncodingError(e.to_string()))
    }

    /// Signs `data`, producing signature bytes in the form the matching
    /// certificate signature algorithm expects (DER for ECDSA).
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            KeyPair::Rsa { private, .. } => {
                let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(*private.clone());
                let signature = signing_key.sign(data);
                Ok(signature.to_vec())
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                let signature: p256::ecdsa::Signature = signing_key.sign(data);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::Ed25519 { signing_key } => {
                let signature = signing_key.sign(data);
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}
