mod util;

use tokencert::cert::TokenCertificate;
use tokencert::error::TokenCertError;
use tokencert::trust::{TrustFlag, TrustFlags, TrustSettings, TrustUsage, flags_from_mask};

/// Every 10-bit mask survives a set/get round trip through the token.
#[test]
fn every_mask_round_trips() {
    let (backend, _key, cert_ref, token_ref) = util::token_with_cert();
    let cert = TokenCertificate::new(backend, cert_ref, token_ref, "round-trip").unwrap();

    for mask in 0u16..1024 {
        let flags = flags_from_mask(mask).unwrap();
        cert.set_trust(TrustUsage::Tls, flags).unwrap();
        assert_eq!(cert.trust(TrustUsage::Tls).unwrap(), flags);
    }
}

/// The categories are independent stores.
#[test]
fn categories_are_independent() {
    let (backend, _key, cert_ref, token_ref) = util::token_with_cert();
    let cert = TokenCertificate::new(backend, cert_ref, token_ref, "categories").unwrap();

    cert.set_trust(TrustUsage::Tls, TrustFlag::ValidCa | TrustFlag::TrustedCa)
        .unwrap();
    cert.set_trust(TrustUsage::SecureMail, TrustFlags::from(TrustFlag::TrustedPeer))
        .unwrap();

    assert_eq!(
        cert.trust(TrustUsage::Tls).unwrap(),
        TrustFlag::ValidCa | TrustFlag::TrustedCa
    );
    assert_eq!(
        cert.trust(TrustUsage::SecureMail).unwrap(),
        TrustFlags::from(TrustFlag::TrustedPeer)
    );
    assert!(cert.trust(TrustUsage::ObjectSigning).unwrap().is_empty());
}

/// The convenience accessors are pure aliases of the category-scoped ones.
#[test]
fn convenience_accessors_are_aliases() {
    let (backend, _key, cert_ref, token_ref) = util::token_with_cert();
    let cert = TokenCertificate::new(backend, cert_ref, token_ref, "aliases").unwrap();

    cert.set_tls_trust(TrustFlags::from(TrustFlag::UserCert)).unwrap();
    cert.set_mail_trust(TrustFlags::from(TrustFlag::SendWarning)).unwrap();
    cert.set_object_signing_trust(TrustFlags::from(TrustFlag::TerminalRecord))
        .unwrap();

    assert_eq!(cert.tls_trust().unwrap(), cert.trust(TrustUsage::Tls).unwrap());
    assert_eq!(
        cert.mail_trust().unwrap(),
        cert.trust(TrustUsage::SecureMail).unwrap()
    );
    assert_eq!(
        cert.object_signing_trust().unwrap(),
        cert.trust(TrustUsage::ObjectSigning).unwrap()
    );
}

/// Trust operations on a certificate outside the persistent store are a
/// token-level precondition violation, propagated rather than masked.
#[test]
fn non_persistent_certificate_is_rejected() {
    let (backend, key, _cert_ref, token_ref) = util::token_with_cert();
    let session_ref = 0x3001;
    let der = util::self_signed_der("session.example", util::at(util::T0), util::at(util::T1), &key);
    backend.add_certificate(session_ref, der, false);

    let cert = TokenCertificate::new(backend, session_ref, token_ref, "session-only").unwrap();

    assert!(matches!(
        cert.trust(TrustUsage::Tls),
        Err(TokenCertError::TrustOperation(_))
    ));
    assert!(matches!(
        cert.set_trust(TrustUsage::Tls, TrustFlags::from(TrustFlag::ValidCa)),
        Err(TokenCertError::TrustOperation(_))
    ));
}

/// Nothing is cached: an edit made behind the object's back is visible on
/// the next read, and writes through the object land in the store at once.
#[test]
fn external_modification_is_visible() {
    let (backend, _key, cert_ref, token_ref) = util::token_with_cert();
    let cert = TokenCertificate::new(backend.clone(), cert_ref, token_ref, "no-cache").unwrap();

    backend.write_trust(cert_ref, TrustUsage::Tls, 0b11_0000_0011);
    assert_eq!(cert.trust(TrustUsage::Tls).unwrap().bits(), 0b11_0000_0011);

    cert.set_trust(TrustUsage::Tls, TrustFlags::from(TrustFlag::TrustedCa))
        .unwrap();
    assert_eq!(
        backend.read_trust(cert_ref, TrustUsage::Tls),
        TrustFlags::from(TrustFlag::TrustedCa).bits()
    );
}

/// A token handing back bits outside the 10-flag contract is an error, not
/// a truncation.
#[test]
fn out_of_contract_mask_is_an_error() {
    let (backend, _key, cert_ref, token_ref) = util::token_with_cert();
    let cert = TokenCertificate::new(backend.clone(), cert_ref, token_ref, "bad-mask").unwrap();

    backend.write_trust(cert_ref, TrustUsage::Tls, 1 << 12);
    assert!(matches!(
        cert.trust(TrustUsage::Tls),
        Err(TokenCertError::TrustOperation(_))
    ));
}
