//! Binary structures produced by authenticators and carried inside the JSON responses: the
//! authenticator data, the attestation object wrapping it at registration, and their parts.

mod aaguid;
mod attestation_object;
mod data;
mod flags;

pub use self::{
    aaguid::Aaguid,
    attestation_object::AttestationObject,
    data::{AttestedCredentialData, AuthenticatorData},
    flags::Flags,
};
