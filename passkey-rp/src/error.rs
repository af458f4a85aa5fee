use std::fmt;

use serde::Serialize;
use typeshare::typeshare;

/// Why a ceremony was rejected. Every rejection is terminal: the pending ceremony is gone and the
/// client must begin again.
///
/// How much of this is exposed to the end user is a deployment decision; the reason is always
/// logged.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// No ceremony of this kind was pending for the identity: never started, already consumed or
    /// expired.
    NoPendingCeremony,
    /// Authentication was requested for an identity without an account.
    UnknownIdentity,
    /// The credential is not registered to the identity, or the user handle does not match.
    UnknownCredential,
    /// The credential ID is already registered, to this or any other identity.
    DuplicateCredential,
    /// The client data does not carry the challenge that was issued.
    ChallengeMismatch,
    /// The client data was produced for another origin.
    OriginMismatch,
    /// The authenticator data is scoped to another RP ID.
    RpIdMismatch,
    /// The authenticator did not test for user presence.
    UserNotPresent,
    /// User verification is required but the authenticator did not perform it.
    UserNotVerified,
    /// The credential's key uses an algorithm that was not offered.
    UnsupportedAlgorithm,
    /// The client data is for another kind of operation, e.g. `webauthn.get` at registration.
    ClientDataTypeMismatch,
    /// The assertion signature does not verify under the stored public key.
    SignatureInvalid,
    /// The signature counter did not increase, the credential may have been cloned.
    PossibleCloning,
    /// The response could not be decoded or is inconsistent with itself.
    MalformedResponse,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RejectionReason::NoPendingCeremony => "no pending ceremony",
            RejectionReason::UnknownIdentity => "unknown identity",
            RejectionReason::UnknownCredential => "unknown credential",
            RejectionReason::DuplicateCredential => "credential already registered",
            RejectionReason::ChallengeMismatch => "challenge mismatch",
            RejectionReason::OriginMismatch => "origin mismatch",
            RejectionReason::RpIdMismatch => "RP ID mismatch",
            RejectionReason::UserNotPresent => "user not present",
            RejectionReason::UserNotVerified => "user not verified",
            RejectionReason::UnsupportedAlgorithm => "unsupported algorithm",
            RejectionReason::ClientDataTypeMismatch => "client data type mismatch",
            RejectionReason::SignatureInvalid => "invalid signature",
            RejectionReason::PossibleCloning => "signature counter did not increase",
            RejectionReason::MalformedResponse => "malformed response",
        })
    }
}

impl std::error::Error for RejectionReason {}

/// Errors produced by a [`SessionStore`](crate::SessionStore) or a
/// [`CredentialRegistry`](crate::CredentialRegistry).
#[typeshare]
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content")]
pub enum StoreError {
    /// The requested entry does not exist.
    NotFound,
    /// A credential with the same ID is already registered.
    DuplicateCredential,
    /// The backing store could not be reached.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => f.write_str("not found"),
            StoreError::DuplicateCredential => f.write_str("duplicate credential"),
            StoreError::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// The random number generator could not produce a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntropyError(pub String);

impl fmt::Display for EntropyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entropy source failed: {}", self.0)
    }
}

impl std::error::Error for EntropyError {}

/// Reasons a [`RelyingPartyConfig`](crate::RelyingPartyConfig) is refused.
#[typeshare]
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content")]
pub enum ConfigError {
    /// The origin could not be parsed, or is more than `scheme://host[:port]`.
    InvalidOrigin,
    /// The origin was missing a proper domain part.
    OriginMissingDomain,
    /// The origin is not a sub-domain of, or equal to, the RP ID.
    OriginRpMissmatch,
    /// The origin does not use HTTPS.
    UnprotectedOrigin,
    /// The origin is localhost but insecure localhost was not allowed.
    InsecureLocalhostNotAllowed,
    /// The RP ID is empty or not a valid domain.
    InvalidRpId,
    /// The RP name is empty.
    EmptyRpName,
    /// The policy asks for challenges shorter than the minimum.
    ChallengeTooShort,
    /// The policy lists no algorithm, or one the verifier cannot check.
    UnsupportedAlgorithm,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigError::InvalidOrigin => "invalid origin",
            ConfigError::OriginMissingDomain => "origin has no domain",
            ConfigError::OriginRpMissmatch => "origin is not within the RP ID",
            ConfigError::UnprotectedOrigin => "origin does not use https",
            ConfigError::InsecureLocalhostNotAllowed => "insecure localhost is not allowed",
            ConfigError::InvalidRpId => "invalid RP ID",
            ConfigError::EmptyRpName => "RP name is empty",
            ConfigError::ChallengeTooShort => "challenge length below the minimum",
            ConfigError::UnsupportedAlgorithm => "unsupported signature algorithm",
        })
    }
}

impl std::error::Error for ConfigError {}

/// Errors produced by the ceremony operations of a [`RelyingParty`](crate::RelyingParty).
///
/// The finish operations fold [`CeremonyError::Rejected`] into a [`CeremonyOutcome`], so only
/// the service-unavailable variants reach their callers.
#[typeshare]
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content")]
pub enum CeremonyError {
    /// The ceremony was refused.
    Rejected(RejectionReason),
    /// No challenge could be generated. Nothing was recorded.
    EntropyUnavailable,
    /// The session store or the credential registry failed.
    StorageUnavailable(String),
}

impl CeremonyError {
    /// Whether the error is the service's fault rather than the client's.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, CeremonyError::Rejected(_))
    }
}

impl fmt::Display for CeremonyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CeremonyError::Rejected(reason) => write!(f, "ceremony rejected: {reason}"),
            CeremonyError::EntropyUnavailable => f.write_str("entropy source unavailable"),
            CeremonyError::StorageUnavailable(reason) => {
                write!(f, "storage unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for CeremonyError {}

impl From<RejectionReason> for CeremonyError {
    fn from(reason: RejectionReason) -> Self {
        CeremonyError::Rejected(reason)
    }
}

impl From<EntropyError> for CeremonyError {
    fn from(_: EntropyError) -> Self {
        CeremonyError::EntropyUnavailable
    }
}

/// The result of a finish operation.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CeremonyOutcome {
    /// Whether the response was accepted and committed.
    pub verified: bool,
    /// Why it was not, when `verified` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
}

impl CeremonyOutcome {
    pub(crate) fn verified() -> Self {
        Self {
            verified: true,
            reason: None,
        }
    }

    pub(crate) fn rejected(reason: RejectionReason) -> Self {
        Self {
            verified: false,
            reason: Some(reason),
        }
    }

    /// Turn the internal result of a finish operation into its outcome, keeping only the
    /// service-unavailable errors as errors.
    pub(crate) fn from_result(result: Result<(), CeremonyError>) -> Result<Self, CeremonyError> {
        match result {
            Ok(()) => Ok(Self::verified()),
            Err(CeremonyError::Rejected(reason)) => Ok(Self::rejected(reason)),
            Err(error) => Err(error),
        }
    }
}
