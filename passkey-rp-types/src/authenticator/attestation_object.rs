use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::{authenticator::AuthenticatorData, Bytes};

/// The CBOR map returned by `create()` in `attestationObject`: the attestation statement format,
/// the statement itself and the authenticator data it covers.
///
/// The statement is kept as a raw CBOR value because its shape depends on `fmt`. Checking it is
/// left to the Relying Party.
///
/// <https://w3c.github.io/webauthn/#sctn-attestation>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationObject {
    /// The attestation statement format identifier, such as `"none"` or `"packed"`.
    pub fmt: String,

    /// The attestation statement, whose format is identified by [`Self::fmt`].
    pub att_stmt: Value,

    /// The encoded authenticator data.
    pub auth_data: Bytes,
}

impl AttestationObject {
    /// Wrap authenticator data in an attestation object of format `none`, the format used by
    /// authenticators that do not attest.
    pub fn none(auth_data: &AuthenticatorData) -> Self {
        Self {
            fmt: "none".into(),
            att_stmt: Value::Map(Vec::new()),
            auth_data: auth_data.to_vec().into(),
        }
    }

    /// Decode an attestation object from its CBOR bytes.
    pub fn from_slice(v: &[u8]) -> Result<Self, ciborium::de::Error<std::io::Error>> {
        ciborium::de::from_reader(v)
    }

    /// Encode the attestation object to CBOR.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        // strings, byte strings and CBOR values always encode into a Vec
        let _ = ciborium::ser::into_writer(self, &mut bytes);
        bytes
    }

    /// Decode the authenticator data this object carries.
    pub fn authenticator_data(&self) -> coset::Result<AuthenticatorData> {
        AuthenticatorData::from_slice(&self.auth_data)
    }
}

#[cfg(test)]
mod tests {
    use ciborium::cbor;

    use super::*;
    use crate::authenticator::Flags;

    #[test]
    fn none_attestation_encodes_as_a_three_entry_map() {
        let auth_data = AuthenticatorData::new("example.com", 0).set_flags(Flags::UP);
        let bytes = AttestationObject::none(&auth_data).to_vec();

        let value: Value = ciborium::de::from_reader(bytes.as_slice()).expect("valid cbor");
        let expected = cbor!({
            "fmt" => "none",
            "attStmt" => {},
            "authData" => Value::Bytes(auth_data.to_vec()),
        })
        .expect("valid cbor");
        assert_eq!(value, expected);
    }

    #[test]
    fn decodes_an_attestation_from_another_encoder() {
        let auth_data = AuthenticatorData::new("example.com", 7).set_flags(Flags::UP | Flags::UV);
        let value = cbor!({
            "authData" => Value::Bytes(auth_data.to_vec()),
            "attStmt" => { "alg" => -7, "sig" => Value::Bytes(vec![1, 2, 3]) },
            "fmt" => "packed",
        })
        .expect("valid cbor");
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&value, &mut bytes).expect("valid cbor");

        let attestation = AttestationObject::from_slice(&bytes).expect("could not decode");
        assert_eq!(attestation.fmt, "packed");
        assert!(attestation.att_stmt.is_map());
        assert_eq!(
            attestation.authenticator_data().expect("valid authenticator data"),
            auth_data
        );
    }

    #[test]
    fn missing_members_fail_to_decode() {
        let value = cbor!({ "fmt" => "none", "attStmt" => {} }).expect("valid cbor");
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&value, &mut bytes).expect("valid cbor");

        AttestationObject::from_slice(&bytes).expect_err("authData is required");
        AttestationObject::from_slice(&[0xff]).expect_err("not cbor");
    }
}
