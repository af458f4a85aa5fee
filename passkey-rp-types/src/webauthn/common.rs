//! Types shared by registration (attestation) and authentication (assertion).

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{
    utils::serde::{ignore_unknown, ignore_unknown_opt_vec},
    Bytes,
};

/// The valid credential types. Only public key credentials exist today; anything else a client
/// sends deserializes to [`PublicKeyCredentialType::Unknown`] and is rejected by the engine.
///
/// <https://w3c.github.io/webauthn/#enumdef-publickeycredentialtype>
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[typeshare(serialized_as = "String")]
pub enum PublicKeyCredentialType {
    /// Serializes to `"public-key"`.
    PublicKey,
    /// Fallback for values this crate does not know about.
    #[default]
    Unknown,
}

/// Identifies one registered credential inside `excludeCredentials` (registration) or
/// `allowCredentials` (authentication).
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialdescriptor>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[typeshare]
pub struct PublicKeyCredentialDescriptor {
    /// Always [`PublicKeyCredentialType::PublicKey`] when emitted by a Relying Party.
    #[serde(rename = "type", deserialize_with = "ignore_unknown")]
    pub ty: PublicKeyCredentialType,

    /// The credential ID, `base64url` encoded on the wire.
    pub id: Bytes,

    /// The transports recorded at registration, handed back so the client can pick how to reach
    /// the authenticator.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

impl PublicKeyCredentialDescriptor {
    /// Describe a public key credential by its ID and known transports. An empty transport list
    /// is left out of the serialized form.
    pub fn public_key(id: impl Into<Bytes>, transports: &[AuthenticatorTransport]) -> Self {
        Self {
            ty: PublicKeyCredentialType::PublicKey,
            id: id.into(),
            transports: (!transports.is_empty()).then(|| transports.to_vec()),
        }
    }
}

/// How strongly the Relying Party wants the authenticator to verify the user (PIN, biometric).
///
/// <https://w3c.github.io/webauthn/#enumdef-userverificationrequirement>
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum UserVerificationRequirement {
    /// The ceremony fails unless the UV flag is set in the authenticator data.
    Required,

    /// Ask for user verification but accept responses without it.
    #[default]
    Preferred,

    /// Do not ask for user verification.
    Discouraged,
}

impl UserVerificationRequirement {
    /// Whether a response without the UV flag must be rejected.
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }
}

/// Transport hints: how a client may reach the authenticator holding a credential. Advisory only.
///
/// <https://w3c.github.io/webauthn/#enum-transport>
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum AuthenticatorTransport {
    /// Removable USB.
    Usb,

    /// Near Field Communication.
    Nfc,

    /// Bluetooth Low Energy.
    Ble,

    /// Cross-device flows such as a phone authenticating for a desktop.
    #[serde(alias = "cable")]
    Hybrid,

    /// A platform authenticator built into the client device.
    Internal,

    /// A smart card.
    #[serde(rename = "smart-card")]
    SmartCard,
}

/// Whether the authenticator is built into the client device or roams between devices.
///
/// <https://w3c.github.io/webauthn/#enumdef-authenticatorattachment>
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[typeshare(serialized_as = "String")]
pub enum AuthenticatorAttachment {
    /// A platform authenticator, usually not removable.
    Platform,

    /// A roaming authenticator such as a security key.
    CrossPlatform,
}
