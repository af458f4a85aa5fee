use std::fmt;

use ciborium::value::Value;
use coset::{
    iana::{self, EnumI64},
    CborSerializable, CoseKey, Label, RegisteredLabel, RegisteredLabelWithPrivate,
};
use p256::{
    ecdsa::{signature::Verifier, Signature, VerifyingKey},
    elliptic_curve::{generic_array::GenericArray, sec1::FromEncodedPoint},
    EncodedPoint, PublicKey,
};
use ring::signature::{RsaPublicKeyComponents, RSA_PKCS1_2048_8192_SHA256};

/// Why a COSE key cannot be used to verify signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyError {
    /// The key's `alg` is absent or not one this crate verifies.
    UnsupportedAlgorithm,
    /// The key's parameters do not describe a valid key for its algorithm.
    InvalidKey,
}

/// A credential public key, decoded from COSE and ready to verify assertions.
pub(crate) enum CredentialKey {
    /// ECDSA over P-256 with SHA-256, signatures DER encoded.
    Es256(VerifyingKey),
    /// RSASSA-PKCS1-v1_5 with SHA-256, moduli of 2048 to 8192 bits.
    Rs256(RsaPublicKeyComponents<Vec<u8>>),
}

impl fmt::Debug for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CredentialKey")
            .field(&self.algorithm())
            .finish()
    }
}

const RSA_MIN_MODULUS_LEN: usize = 2048 / 8;
const RSA_MAX_MODULUS_LEN: usize = 8192 / 8;

fn param(key: &CoseKey, label: i64) -> Option<&Value> {
    key.params
        .iter()
        .find(|(l, _)| *l == Label::Int(label))
        .map(|(_, value)| value)
}

fn bytes_param(key: &CoseKey, label: i64) -> Result<&[u8], KeyError> {
    param(key, label)
        .and_then(Value::as_bytes)
        .map(Vec::as_slice)
        .ok_or(KeyError::InvalidKey)
}

impl CredentialKey {
    /// Decode a key from its COSE encoding, as stored with the credential.
    pub fn from_cose_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let key = CoseKey::from_slice(bytes).map_err(|_| KeyError::InvalidKey)?;
        Self::from_cose(&key)
    }

    /// Build a verifying key from a COSE key, dispatching on its `alg`.
    pub fn from_cose(key: &CoseKey) -> Result<Self, KeyError> {
        match key.alg {
            Some(RegisteredLabelWithPrivate::Assigned(iana::Algorithm::ES256)) => Self::es256(key),
            Some(RegisteredLabelWithPrivate::Assigned(iana::Algorithm::RS256)) => Self::rs256(key),
            _ => Err(KeyError::UnsupportedAlgorithm),
        }
    }

    fn es256(key: &CoseKey) -> Result<Self, KeyError> {
        if key.kty != RegisteredLabel::Assigned(iana::KeyType::EC2) {
            return Err(KeyError::InvalidKey);
        }
        let crv = param(key, iana::Ec2KeyParameter::Crv.to_i64())
            .and_then(Value::as_integer)
            .ok_or(KeyError::InvalidKey)?;
        if crv != iana::EllipticCurve::P_256.to_i64().into() {
            return Err(KeyError::InvalidKey);
        }

        let x = bytes_param(key, iana::Ec2KeyParameter::X.to_i64())?;
        let y = bytes_param(key, iana::Ec2KeyParameter::Y.to_i64())?;
        // GenericArray::from_slice panics on a length mismatch
        if x.len() != 32 || y.len() != 32 {
            return Err(KeyError::InvalidKey);
        }

        let point = EncodedPoint::from_affine_coordinates(
            GenericArray::from_slice(x),
            GenericArray::from_slice(y),
            false,
        );
        let Some(public_key): Option<PublicKey> = PublicKey::from_encoded_point(&point).into()
        else {
            log::warn!("ES256 credential key is not a point on P-256");
            return Err(KeyError::InvalidKey);
        };
        Ok(CredentialKey::Es256(VerifyingKey::from(public_key)))
    }

    fn rs256(key: &CoseKey) -> Result<Self, KeyError> {
        if key.kty != RegisteredLabel::Assigned(iana::KeyType::RSA) {
            return Err(KeyError::InvalidKey);
        }
        let n = bytes_param(key, iana::RsaKeyParameter::N.to_i64())?;
        let e = bytes_param(key, iana::RsaKeyParameter::E.to_i64())?;

        let modulus_len = n.iter().skip_while(|b| **b == 0).count();
        if !(RSA_MIN_MODULUS_LEN..=RSA_MAX_MODULUS_LEN).contains(&modulus_len) || e.is_empty() {
            return Err(KeyError::InvalidKey);
        }

        Ok(CredentialKey::Rs256(RsaPublicKeyComponents {
            n: n.to_vec(),
            e: e.to_vec(),
        }))
    }

    /// The algorithm this key verifies.
    pub fn algorithm(&self) -> iana::Algorithm {
        match self {
            CredentialKey::Es256(_) => iana::Algorithm::ES256,
            CredentialKey::Rs256(_) => iana::Algorithm::RS256,
        }
    }

    /// Check `signature` over `signed_data`. The message is hashed with SHA-256 by the
    /// algorithm, it must not be pre-hashed.
    pub fn verify(&self, signed_data: &[u8], signature: &[u8]) -> bool {
        match self {
            CredentialKey::Es256(verifying_key) => Signature::from_der(signature)
                .map(|signature| verifying_key.verify(signed_data, &signature).is_ok())
                .unwrap_or(false),
            CredentialKey::Rs256(components) => components
                .verify(&RSA_PKCS1_2048_8192_SHA256, signed_data, signature)
                .is_ok(),
        }
    }
}
