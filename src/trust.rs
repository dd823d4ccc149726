//! Per-usage trust flags, stored in the token's persistent trust store.
//!
//! Trust is tracked independently for each usage category; the ten flags are
//! independent bits with no implied relationships, so every mask in
//! `0..=0x3ff` is syntactically legal. Semantic validity of a combination is
//! the token's concern.

use flagset::{FlagSet, flags};

use crate::error::{Result, TokenCertError};

flags! {
    /// The standards-defined trust flags, bit positions 0 through 9.
    pub enum TrustFlag: u16 {
        /// This record is the last word on trust for the certificate.
        TerminalRecord,
        /// Explicitly trusted as a peer.
        TrustedPeer,
        /// Warn before using the certificate.
        SendWarning,
        /// Valid as a certificate authority.
        ValidCa,
        /// Trusted as a certificate authority.
        TrustedCa,
        /// Trusted as a CA by the vendor's built-in list.
        VendorTrustedCa,
        /// The user owns the corresponding private key.
        UserCert,
        /// Trusted to issue client certificates.
        TrustedClientCa,
        /// A CA hidden from normal display.
        InvisibleCa,
        /// A government-approved CA.
        GovtApprovedCa,
    }
}

/// A set of [`TrustFlag`]s, round-tripped through the token as a 10-bit mask.
pub type TrustFlags = FlagSet<TrustFlag>;

/// Converts a raw mask coming back from the token into a flag set.
///
/// Bits above position 9 mean the token handed back something outside the
/// contract, reported as a trust operation failure rather than truncated.
pub fn flags_from_mask(mask: u16) -> Result<TrustFlags> {
    TrustFlags::new(mask)
        .map_err(|_| TokenCertError::TrustOperation(format!("invalid trust mask {mask:#06x}")))
}

/// The usage categories trust is tracked under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustUsage {
    /// TLS server and client authentication.
    Tls,
    /// Secure mail (S/MIME).
    SecureMail,
    /// Object and code signing.
    ObjectSigning,
}

impl TrustUsage {
    pub const ALL: [TrustUsage; 3] = [
        TrustUsage::Tls,
        TrustUsage::SecureMail,
        TrustUsage::ObjectSigning,
    ];
}

/// Trust management for certificates resident in a persistent trust store.
///
/// Every get and set is a direct round trip to the token; nothing is cached,
/// so a concurrent edit of the trust store by another process is visible on
/// the next read. Calling either operation on a certificate the token does
/// not recognize as persistent fails with
/// [`TokenCertError::TrustOperation`](crate::error::TokenCertError).
pub trait TrustSettings {
    /// Reads the trust flags for one usage category.
    fn trust(&self, usage: TrustUsage) -> Result<TrustFlags>;

    /// Stores the trust flags for one usage category.
    fn set_trust(&self, usage: TrustUsage, flags: TrustFlags) -> Result<()>;

    /// Reads the TLS trust flags.
    fn tls_trust(&self) -> Result<TrustFlags> {
        self.trust(TrustUsage::Tls)
    }

    /// Stores the TLS trust flags.
    fn set_tls_trust(&self, flags: TrustFlags) -> Result<()> {
        self.set_trust(TrustUsage::Tls, flags)
    }

    /// Reads the secure mail trust flags.
    fn mail_trust(&self) -> Result<TrustFlags> {
        self.trust(TrustUsage::SecureMail)
    }

    /// Stores the secure mail trust flags.
    fn set_mail_trust(&self, flags: TrustFlags) -> Result<()> {
        self.set_trust(TrustUsage::SecureMail, flags)
    }

    /// Reads the object signing trust flags.
    fn object_signing_trust(&self) -> Result<TrustFlags> {
        self.trust(TrustUsage::ObjectSigning)
    }

    /// Stores the object signing trust flags.
    fn set_object_signing_trust(&self, flags: TrustFlags) -> Result<()> {
        self.set_trust(TrustUsage::ObjectSigning, flags)
    }
}
