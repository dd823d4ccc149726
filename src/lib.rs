//! # tokencert - Token-Resident X.509 Certificate Objects
//!
//! tokencert models an X.509 certificate that lives on a cryptographic token
//! (a hardware or software security module) as one coherent object. The same
//! certificate has two representations: an opaque handle owned by the token,
//! and a fully decoded ASN.1 view. This crate unifies them behind one
//! identity, tracks per-usage trust decisions, and manages the lifetime of
//! the underlying native resources safely.
//!
//! ## What it does
//!
//! - **Handle-backed accessors**: encoding, serial number, subject/issuer
//!   names, public key and version are answered by the token directly.
//! - **Lazy decoded view**: accessors that need the full ASN.1 structure
//!   (extensions, validity, signature verification) decode the DER form once
//!   and reuse the result; a malformed certificate fails those accessors with
//!   the same cause for the object's lifetime.
//! - **Identity over bytes**: two independently obtained handles to the same
//!   certificate compare equal, because equality and hashing are defined over
//!   the canonical DER encoding, never over handle identity.
//! - **Trust flags**: a 10-bit standards-defined flag set per usage category
//!   (TLS, secure mail, object signing), round-tripped through the token's
//!   persistent trust store on every access.
//! - **Safe lifecycle**: the certificate handle and the counted token
//!   reference are each released exactly once, whether the object is closed
//!   explicitly, dropped, or both, including under concurrent closes.
//!
//! The token-protocol layer itself is a collaborator, not part of this crate:
//! implement [`token::TokenBackend`] over your module's wire protocol and
//! hand the crate raw references. ASN.1 decoding is delegated to `x509-cert`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokencert::cert::TokenCertificate;
//! use tokencert::token::TokenBackend;
//! use tokencert::trust::{TrustFlag, TrustSettings, TrustUsage};
//!
//! # fn connect() -> Arc<dyn TokenBackend> { unimplemented!() }
//! # fn main() -> Result<(), tokencert::error::TokenCertError> {
//! let backend: Arc<dyn TokenBackend> = connect();
//!
//! // References previously enumerated from the token.
//! let cert = TokenCertificate::new(backend, 0x2001, 0x1001, "server-cert")?;
//!
//! // Handle-backed accessors go straight to the token.
//! println!("subject: {}", cert.subject()?);
//!
//! // Structural accessors decode the DER form once and reuse it.
//! cert.check_validity()?;
//! if cert.has_unsupported_critical_extension()? {
//!     println!("certificate carries an unknown critical extension");
//! }
//!
//! // Trust flags round-trip through the token's persistent store.
//! cert.set_trust(TrustUsage::Tls, TrustFlag::ValidCa | TrustFlag::TrustedCa)?;
//!
//! // Releases the certificate handle and the counted token reference;
//! // dropping without closing would release them just the same.
//! cert.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Contract errors keep their specific kind and are never laundered into a
//! generic failure:
//!
//! ```rust,no_run
//! use tokencert::error::TokenCertError;
//! # use tokencert::cert::TokenCertificate;
//! # fn check(cert: &TokenCertificate) {
//! match cert.check_validity() {
//!     Ok(()) => println!("valid"),
//!     Err(TokenCertError::Expired { not_after }) => println!("expired {not_after}"),
//!     Err(TokenCertError::NotYetValid { not_before }) => println!("not until {not_before}"),
//!     Err(e) => println!("other error: {e}"),
//! }
//! # }
//! ```
//!
//! The one deliberate exception is release: errors from the native release
//! operation during close are logged (via `tracing`) and contained, so that
//! resource cleanup is never blocked by a downstream failure.
//!
//! ## Module Organization
//!
//! - [`cert`]: the certificate object, identity, and close protocol
//! - [`decoded`]: the lazily built structural view
//! - [`token`]: the native handle wrapper and the backend contract
//! - [`trust`]: per-usage trust flags
//! - [`key`]: public keys and signature algorithms
//! - [`error`]: error types and handling

pub mod cert;
pub mod decoded;
pub mod error;
pub mod key;
pub mod token;
pub mod trust;
