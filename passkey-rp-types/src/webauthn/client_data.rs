use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use typeshare::typeshare;

/// The client data: the browser's record of which challenge it was asked to sign, for which
/// origin and which operation. The authenticator signs over its hash, so the Relying Party must
/// check it against the hash of the exact bytes received, never against a re-serialization.
///
/// > Note: The [`CollectedClientData`] may be extended in the future. Therefore it is critical
/// >       when parsing to be tolerant of unknown keys and of any reordering of the keys.
///
/// <https://w3c.github.io/webauthn/#dictionary-client-data>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    /// [`ClientDataType::Create`] for registration and [`ClientDataType::Get`] for authentication.
    #[serde(rename = "type")]
    pub ty: ClientDataType,

    /// The `base64url` encoding of the challenge provided by the Relying Party.
    pub challenge: String,

    /// The fully qualified origin of the requester, in the syntax defined by [RFC6454].
    ///
    /// [RFC6454]: https://www.rfc-editor.org/rfc/rfc6454
    pub origin: String,

    /// Whether the call came from a cross-origin iframe.
    #[serde(default, serialize_with = "truthiness")]
    pub cross_origin: Option<bool>,

    /// Keys unknown to this crate, kept in order.
    #[serde(flatten)]
    pub unknown_keys: IndexMap<String, serde_json::Value>,
}

impl CollectedClientData {
    /// Parse the `clientDataJSON` bytes of a response.
    pub fn from_json(client_data_json: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(client_data_json)
    }

    /// Serialize in the order browsers use. Used by software authenticators.
    pub fn to_json(&self) -> Vec<u8> {
        // serializing strings, booleans and json values into a Vec cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }
}

fn truthiness<S>(cross_origin: &Option<bool>, ser: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    ser.serialize_bool(cross_origin.filter(|b| *b).is_some())
}

/// The operation recorded in [`CollectedClientData::ty`].
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[typeshare]
pub enum ClientDataType {
    /// Serializes to the string `"webauthn.create"`
    #[serde(rename = "webauthn.create")]
    Create,

    /// Serializes to the string `"webauthn.get"`
    #[serde(rename = "webauthn.get")]
    Get,
}

impl fmt::Display for ClientDataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ClientDataType::Create => "webauthn.create",
            ClientDataType::Get => "webauthn.get",
        })
    }
}
