//! A software authenticator answering ceremonies the way a browser and a passkey would. Used to
//! test code built on [`RelyingParty`](crate::RelyingParty) without a browser.
//!
//! Its public fields control what ends up in the responses so that tests can produce responses a
//! well behaved authenticator never would: missing flags, stale counters or foreign attestation
//! formats. Responses are plain structs, so the rest (signatures, user handles, client data) can
//! be tampered with after the fact.

use std::sync::Arc;

use ciborium::value::Value;
use coset::{
    iana::{self, EnumI64},
    CoseKey, CoseKeyBuilder,
};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use passkey_rp_types::{
    authenticator::{Aaguid, AttestationObject, AttestedCredentialData, AuthenticatorData, Flags},
    crypto::sha256,
    encoding::base64url,
    rand::random_vec,
    webauthn::{
        AuthenticationCredential, AuthenticatorAssertionResponse, AuthenticatorAttachment,
        AuthenticatorAttestationResponse, AuthenticatorTransport, ClientDataType,
        CollectedClientData, CredentialCreationOptions, CredentialRequestOptions,
        PublicKeyCredentialType, RegistrationCredential,
    },
    Bytes,
};
use rand::rngs::OsRng;
use ring::{
    rand::SystemRandom,
    signature::{RsaKeyPair, RSA_PKCS1_SHA256},
};

use crate::{EntropyError, MockChallengeSource};

/// A 2048 bit RSA key in PKCS#8 and its public modulus. The exponent is 65537.
const RSA_PKCS8: &[u8] = include_bytes!("testing/rsa-2048.pk8");
const RSA_MODULUS: &[u8] = include_bytes!("testing/rsa-2048.n");

#[derive(Debug, Clone)]
enum SoftKey {
    Es256(SigningKey),
    Rs256(Arc<RsaKeyPair>),
}

impl SoftKey {
    fn algorithm(&self) -> iana::Algorithm {
        match self {
            SoftKey::Es256(_) => iana::Algorithm::ES256,
            SoftKey::Rs256(_) => iana::Algorithm::RS256,
        }
    }

    fn cose_key(&self) -> CoseKey {
        match self {
            SoftKey::Es256(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                let x = point.x().map(|x| x.to_vec()).unwrap_or_default();
                let y = point.y().map(|y| y.to_vec()).unwrap_or_default();
                CoseKeyBuilder::new_ec2_pub_key(iana::EllipticCurve::P_256, x, y)
                    .algorithm(iana::Algorithm::ES256)
                    .build()
            }
            SoftKey::Rs256(_) => CoseKeyBuilder::new()
                .key_type(iana::KeyType::RSA)
                .param(
                    iana::RsaKeyParameter::N.to_i64(),
                    Value::Bytes(RSA_MODULUS.to_vec()),
                )
                .param(iana::RsaKeyParameter::E.to_i64(), Value::Bytes(vec![1, 0, 1]))
                .algorithm(iana::Algorithm::RS256)
                .build(),
        }
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        match self {
            SoftKey::Es256(key) => {
                let signature: Signature = key.sign(data);
                signature.to_der().as_bytes().to_vec()
            }
            SoftKey::Rs256(key) => {
                let mut signature = vec![0; RSA_MODULUS.len()];
                key.sign(&RSA_PKCS1_SHA256, &SystemRandom::new(), data, &mut signature)
                    .expect("the signature buffer matches the modulus");
                signature
            }
        }
    }
}

/// A single-credential authenticator with its key in memory.
///
/// Cloning it clones the key and the counter, which is exactly what a cloned hardware token
/// looks like to a Relying Party.
#[derive(Debug, Clone)]
pub struct SoftAuthenticator {
    key: SoftKey,
    credential_id: Vec<u8>,
    user_handle: Option<Bytes>,
    /// The signature counter reported in the next response.
    pub counter: u32,
    /// How much [`Self::counter`] grows before each assertion. `0` behaves like an authenticator
    /// without a counter.
    pub counter_step: u32,
    /// The flags set in authenticator data. `UP | UV` unless changed.
    pub flags: Flags,
    /// The attestation format and statement. `none` with an empty statement unless changed.
    pub attestation: (String, Value),
    /// The AAGUID reported at registration.
    pub aaguid: Aaguid,
    /// The transports reported at registration.
    pub transports: Vec<AuthenticatorTransport>,
}

impl SoftAuthenticator {
    fn with_key(key: SoftKey) -> Self {
        Self {
            key,
            credential_id: random_vec(16),
            user_handle: None,
            counter: 0,
            counter_step: 1,
            flags: Flags::UP | Flags::UV,
            attestation: ("none".into(), Value::Map(Vec::new())),
            aaguid: Aaguid::new_empty(),
            transports: vec![AuthenticatorTransport::Internal, AuthenticatorTransport::Hybrid],
        }
    }

    /// An authenticator with a fresh P-256 key.
    pub fn es256() -> Self {
        Self::with_key(SoftKey::Es256(SigningKey::random(&mut OsRng)))
    }

    /// An authenticator with a fixed 2048 bit RSA key. Every RS256 authenticator shares the key
    /// but gets its own credential ID.
    pub fn rs256() -> Self {
        let key = RsaKeyPair::from_pkcs8(RSA_PKCS8).expect("the fixture is a valid RSA key");
        Self::with_key(SoftKey::Rs256(Arc::new(key)))
    }

    /// The ID of the credential this authenticator holds.
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    /// The algorithm of the credential key.
    pub fn algorithm(&self) -> iana::Algorithm {
        self.key.algorithm()
    }

    /// Answer `navigator.credentials.create()` from `origin`. The user handle is remembered and
    /// returned in later assertions. Exclusion lists are ignored.
    pub fn register(
        &mut self,
        options: &CredentialCreationOptions,
        origin: &str,
    ) -> RegistrationCredential {
        let options = &options.public_key;
        self.user_handle = Some(options.user.id.clone());
        let rp_id = options.rp.id.clone().unwrap_or_default();
        let client_data = client_data(ClientDataType::Create, &options.challenge, origin);
        self.attest(&client_data, &rp_id)
    }

    /// Build an attestation over arbitrary client data and RP ID.
    pub fn attest(&self, client_data: &CollectedClientData, rp_id: &str) -> RegistrationCredential {
        let acd = AttestedCredentialData::new(
            self.aaguid,
            self.credential_id.clone(),
            self.key.cose_key(),
        )
        .expect("credential IDs are short and keys encodable");
        let auth_data = AuthenticatorData::new(rp_id, self.counter)
            .set_flags(self.flags)
            .set_attested_credential_data(acd);

        let (fmt, att_stmt) = self.attestation.clone();
        let attestation_object = AttestationObject {
            fmt,
            att_stmt,
            auth_data: auth_data.to_vec().into(),
        };

        RegistrationCredential {
            id: base64url(&self.credential_id),
            raw_id: self.credential_id.clone().into(),
            ty: PublicKeyCredentialType::PublicKey,
            response: AuthenticatorAttestationResponse {
                client_data_json: client_data.to_json().into(),
                attestation_object: attestation_object.to_vec().into(),
                authenticator_data: Some(attestation_object.auth_data.clone()),
                transports: Some(self.transports.clone()),
                public_key_algorithm: Some(self.key.algorithm().to_i64()),
            },
            authenticator_attachment: Some(AuthenticatorAttachment::Platform),
            client_extension_results: Default::default(),
        }
    }

    /// Answer `navigator.credentials.get()` from `origin`, advancing the counter first.
    pub fn authenticate(
        &mut self,
        options: &CredentialRequestOptions,
        origin: &str,
    ) -> AuthenticationCredential {
        let options = &options.public_key;
        let rp_id = options.rp_id.clone().unwrap_or_default();
        let client_data = client_data(ClientDataType::Get, &options.challenge, origin);
        self.counter = self.counter.wrapping_add(self.counter_step);
        self.assert(&client_data, &rp_id)
    }

    /// Build an assertion over arbitrary client data and RP ID, with the current counter.
    pub fn assert(&self, client_data: &CollectedClientData, rp_id: &str) -> AuthenticationCredential {
        let authenticator_data = AuthenticatorData::new(rp_id, self.counter)
            .set_flags(self.flags)
            .to_vec();
        let client_data_json = client_data.to_json();

        let mut signed_data = authenticator_data.clone();
        signed_data.extend_from_slice(&sha256(&client_data_json));
        let signature = self.key.sign(&signed_data);

        AuthenticationCredential {
            id: base64url(&self.credential_id),
            raw_id: self.credential_id.clone().into(),
            ty: PublicKeyCredentialType::PublicKey,
            response: AuthenticatorAssertionResponse {
                client_data_json: client_data_json.into(),
                authenticator_data: authenticator_data.into(),
                signature: signature.into(),
                user_handle: self.user_handle.clone(),
            },
            authenticator_attachment: Some(AuthenticatorAttachment::Platform),
            client_extension_results: Default::default(),
        }
    }
}

/// The client data a browser at `origin` would collect.
pub fn client_data(ty: ClientDataType, challenge: &[u8], origin: &str) -> CollectedClientData {
    CollectedClientData {
        ty,
        challenge: base64url(challenge),
        origin: origin.into(),
        cross_origin: Some(false),
        unknown_keys: Default::default(),
    }
}

impl MockChallengeSource {
    /// A source that always fails, like an operating system without entropy.
    pub fn exhausted() -> Self {
        let mut source = MockChallengeSource::new();
        source
            .expect_new_challenge()
            .returning(|_| Err(EntropyError("entropy pool exhausted".into())));
        source
    }

    /// A source handing out `challenges` in order, then failing.
    pub fn sequence(challenges: Vec<Vec<u8>>) -> Self {
        let mut challenges = challenges.into_iter();
        let mut source = MockChallengeSource::new();
        source
            .expect_new_challenge()
            .returning(move |_| {
                challenges
                    .next()
                    .ok_or_else(|| EntropyError("no challenge left".into()))
            });
        source
    }
}
