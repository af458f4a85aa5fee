//! The JSON shapes of [WebAuthn Level 3] that a Relying Party sends and receives.
//!
//! Options are only ever serialized by a Relying Party and responses only ever deserialized, but
//! both directions are implemented so that software authenticators and tests can speak the same
//! language as browsers.
//!
//! [WebAuthn Level 3]: https://w3c.github.io/webauthn

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{utils::serde::ignore_unknown, Bytes};

mod assertion;
mod attestation;
mod client_data;
mod common;

// re-export types
pub use self::{assertion::*, attestation::*, client_data::*, common::*};

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::AuthenticatorAssertionResponse {}
    impl Sealed for super::AuthenticatorAttestationResponse {}
}

/// Marker trait for response types
pub trait AuthenticatorResponse: sealed::Sealed {}

impl AuthenticatorResponse for AuthenticatorAssertionResponse {}
impl AuthenticatorResponse for AuthenticatorAttestationResponse {}

/// The credential a browser hands back after `create()` or `get()`, in the shape produced by
/// `PublicKeyCredential.toJSON()`.
///
/// Use the aliases depending on the ceremony:
/// * Registration: [RegistrationCredential]
/// * Authentication: [AuthenticationCredential]
///
/// <https://w3c.github.io/webauthn/#iface-pkcredential>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredential<R: AuthenticatorResponse> {
    /// The `base64url` encoding of [Self::raw_id]. A Relying Party must check that both agree.
    pub id: String,

    /// The credential ID chosen by the authenticator.
    pub raw_id: Bytes,

    /// Always [PublicKeyCredentialType::PublicKey] for a well formed response.
    #[serde(rename = "type", deserialize_with = "ignore_unknown")]
    pub ty: PublicKeyCredentialType,

    /// Either an [AuthenticatorAttestationResponse] or an [AuthenticatorAssertionResponse].
    pub response: R,

    /// The modality of the communication between the client and authenticator.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown"
    )]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,

    /// Client extension outputs. No extension is requested by this Relying Party, so the value is
    /// kept opaque.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub client_extension_results: serde_json::Map<String, serde_json::Value>,
}

impl<R: AuthenticatorResponse> PublicKeyCredential<R> {
    /// Checks the parts of the envelope that do not depend on the response type: that the
    /// credential is a public key credential and that `id` is the encoding of `rawId`.
    pub fn is_well_formed(&self) -> bool {
        self.ty == PublicKeyCredentialType::PublicKey
            && crate::encoding::try_from_base64url(&self.id).as_deref() == Some(&self.raw_id[..])
    }
}
