//! # Passkey RP
//!
//! This crate defines a [`RelyingParty`] type implementing the server side of the [Webauthn]
//! registration and authentication ceremonies. The [`RelyingParty`] issues challenges, binds them
//! to identities and verifies what browsers send back, while where pending ceremonies and
//! credentials live is defined through the [`SessionStore`] and [`CredentialRegistry`] traits.
//! In-memory implementations of both are provided.
//!
//! This crate does not provide any networking, routing or rendering. Options are returned as the
//! JSON structures `navigator.credentials.create()` and `navigator.credentials.get()` take, and
//! responses are accepted in the shape produced by `PublicKeyCredential.toJSON()`.
//!
//! Attestation statements are checked for their shape only. No attestation trust chain is
//! validated.
//!
//! ## Testing
//!
//! The `testable` feature exposes a `MockChallengeSource` and a software authenticator in the
//! `testing` module, which produce browser-shaped responses without a browser.
//!
//! [Webauthn]: https://w3c.github.io/webauthn/

mod ceremony;
mod challenge;
mod config;
mod credential_registry;
mod error;
mod rp_id_verifier;
mod session_store;
mod verifier;

#[cfg(any(test, feature = "testable"))]
pub mod testing;

pub use self::{
    ceremony::RelyingParty,
    challenge::{ChallengeSource, OsChallengeSource, MIN_CHALLENGE_LEN},
    config::{CeremonyPolicy, ConfigService, RelyingPartyConfig, VersionedConfig},
    credential_registry::{
        Account, CounterUpdate, Credential, CredentialRegistry, MemoryRegistry, USER_HANDLE_LEN,
    },
    error::{
        CeremonyError, CeremonyOutcome, ConfigError, EntropyError, RejectionReason, StoreError,
    },
    rp_id_verifier::RpIdVerifier,
    session_store::{CeremonyKind, MemorySessionStore, PendingCeremony, SessionStore},
    verifier::{
        check_counter, ResponseVerifier, VerifiedAuthentication, VerifiedRegistration,
    },
};

#[cfg(any(test, feature = "testable"))]
pub use self::challenge::MockChallengeSource;
