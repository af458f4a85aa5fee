//! Types used for public key credential registration

use coset::iana;
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{
    utils::serde::{
        i64_to_iana, ignore_unknown, ignore_unknown_opt_vec, ignore_unknown_vec, maybe_stringified,
    },
    webauthn::{
        AuthenticatorAttachment, AuthenticatorTransport, PublicKeyCredential,
        PublicKeyCredentialDescriptor, PublicKeyCredentialType, UserVerificationRequirement,
    },
    Bytes,
};


/// The browser's answer to a registration ceremony.
#[typeshare]
pub type RegistrationCredential = PublicKeyCredential<AuthenticatorAttestationResponse>;

/// The argument to [`navigator.credentials.create`], as handed to the browser by
/// `beginRegistration`.
///
/// <https://w3c.github.io/webauthn/#sctn-credentialcreationoptions-extension>
///
/// [`navigator.credentials.create`]: https://developer.mozilla.org/en-US/docs/Web/API/CredentialsContainer/create
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct CredentialCreationOptions {
    /// The key defining that this is a request for a webauthn credential.
    pub public_key: PublicKeyCredentialCreationOptions,
}

/// Parameters for creating a new credential.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialcreationoptions>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredentialCreationOptions {
    /// The Relying Party the credential will be scoped to.
    pub rp: PublicKeyCredentialRpEntity,

    /// The account the credential is created for.
    pub user: PublicKeyCredentialUserEntity,

    /// The single-use challenge the authenticator signs over, through `clientDataJSON`.
    pub challenge: Bytes,

    /// Accepted key types and algorithms, most preferred first. Entries the deserializer does not
    /// know are dropped.
    #[serde(deserialize_with = "ignore_unknown_vec")]
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,

    /// A hint, in milliseconds, of how long the Relying Party is willing to wait.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "maybe_stringified"
    )]
    pub timeout: Option<u32>,

    /// Credentials already registered to the account, so the same authenticator is not
    /// registered twice.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub exclude_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,

    /// Requirements on the authenticator's capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,

    /// Attestation conveyance preference. Unknown values act as the default.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub attestation: AttestationConveyancePreference,
}

/// The Relying Party's identity as shown to the user and used for scoping the credential.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialrpentity>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[typeshare]
pub struct PublicKeyCredentialRpEntity {
    /// The RP ID, a registrable domain suffix of (or equal to) the origin's effective domain.
    /// If omitted the client uses the origin's effective domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// A human-palatable name for the Relying Party.
    pub name: String,
}

/// The user account the credential is bound to.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialuserentity>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredentialUserEntity {
    /// The opaque user handle. It must not carry personally identifying information, so it is
    /// never the account name.
    pub id: Bytes,

    /// The account name, e.g. a username or email address.
    pub name: String,

    /// A friendly name for the account.
    pub display_name: String,
}

/// One accepted credential type and signature algorithm.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialparameters>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[typeshare]
pub struct PublicKeyCredentialParameters {
    /// The type of credential to be created.
    #[serde(rename = "type")]
    pub ty: PublicKeyCredentialType,

    /// The COSE algorithm identifier, serialized as its registered integer.
    #[serde(with = "i64_to_iana")]
    #[typeshare(serialized_as = "I54")]
    pub alg: iana::Algorithm,
}

impl PublicKeyCredentialParameters {
    /// A public key credential parameter for the given algorithm.
    pub fn public_key(alg: iana::Algorithm) -> Self {
        Self {
            ty: PublicKeyCredentialType::PublicKey,
            alg,
        }
    }

}

/// Requirements a Relying Party places on authenticators taking part in registration.
///
/// <https://w3c.github.io/webauthn/#dictdef-authenticatorselectioncriteria>
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticatorSelectionCriteria {
    /// Restrict eligible authenticators to an attachment modality.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown"
    )]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,

    /// Whether a client-side discoverable credential should be created.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown"
    )]
    pub resident_key: Option<ResidentKeyRequirement>,

    /// Legacy flag, kept for older clients. True only if `resident_key` is `required`.
    #[serde(default)]
    pub require_resident_key: bool,

    /// The user verification requirement for the `create()` operation.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub user_verification: UserVerificationRequirement,
}

/// How much the Relying Party wants a client-side discoverable credential.
///
/// <https://w3c.github.io/webauthn/#enumdef-residentkeyrequirement>
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum ResidentKeyRequirement {
    /// Prefer a server-side credential, accept a discoverable one.
    #[default]
    Discouraged,

    /// Prefer a discoverable credential, accept a server-side one.
    Preferred,

    /// Fail unless a discoverable credential can be created.
    Required,
}

/// What the Relying Party wants to learn about the authenticator through attestation.
///
/// <https://w3c.github.io/webauthn/#enumdef-attestationconveyancepreference>
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum AttestationConveyancePreference {
    /// No attestation wanted; the client replaces non-self attestation with `none`.
    #[default]
    None,

    /// A verifiable attestation is wanted, the client may anonymize it.
    Indirect,

    /// The attestation statement as generated by the authenticator.
    Direct,

    /// An attestation that may uniquely identify the authenticator, for managed deployments.
    Enterprise,
}

/// Attestation statement format identifiers registered with [IANA][1].
///
/// [1]: https://www.iana.org/assignments/webauthn/webauthn.xhtml#webauthn-attestation-statement-format-ids
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[typeshare]
pub enum AttestationStatementFormatIdentifiers {
    /// The WebAuthn optimized `packed` format.
    Packed,

    /// TPM attestation.
    Tpm,

    /// Android hardware key attestation.
    AndroidKey,

    /// Android SafetyNet.
    AndroidSafetynet,

    /// FIDO U2F authenticators.
    FidoU2f,

    /// Apple platform authenticators.
    Apple,

    /// No attestation.
    None,
}

impl AttestationStatementFormatIdentifiers {
    /// Map a `fmt` value from an attestation object, if it is a registered identifier.
    pub fn from_fmt(fmt: &str) -> Option<Self> {
        Some(match fmt {
            "packed" => Self::Packed,
            "tpm" => Self::Tpm,
            "android-key" => Self::AndroidKey,
            "android-safetynet" => Self::AndroidSafetynet,
            "fido-u2f" => Self::FidoU2f,
            "apple" => Self::Apple,
            "none" => Self::None,
            _ => return None,
        })
    }
}

/// The authenticator's response to a registration request, in `toJSON()` form.
///
/// <https://w3c.github.io/webauthn/#iface-authenticatorattestationresponse>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticatorAttestationResponse {
    /// The exact bytes of the serialized [`CollectedClientData`](crate::webauthn::CollectedClientData).
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Bytes,

    /// A CBOR attestation object holding `fmt`, `attStmt` and `authData`.
    pub attestation_object: Bytes,

    /// Convenience copy of `authData`. The Relying Party only trusts the copy inside
    /// [`Self::attestation_object`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_data: Option<Bytes>,

    /// The transports the authenticator is believed to support. Stored as advisory hints.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub transports: Option<Vec<AuthenticatorTransport>>,

    /// Convenience copy of the credential's COSE algorithm identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[typeshare(serialized_as = "Option<I54>")]
    pub public_key_algorithm: Option<i64>,
}
