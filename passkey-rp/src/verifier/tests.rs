use ciborium::cbor;
use passkey_rp_types::webauthn::UserVerificationRequirement;

use super::*;
use crate::testing::{client_data, SoftAuthenticator};

const RP_ID: &str = "example.com";
const ORIGIN: &str = "https://example.com";

struct Fixture {
    challenge: Vec<u8>,
    config: RelyingPartyConfig,
    policy: CeremonyPolicy,
}

impl Fixture {
    fn new() -> Self {
        Self {
            challenge: vec![7; 32],
            config: RelyingPartyConfig::new(RP_ID, "Example", ORIGIN),
            policy: CeremonyPolicy::default(),
        }
    }

    fn verifier(&self) -> ResponseVerifier<'_> {
        ResponseVerifier::new(&self.challenge, &self.config, &self.policy)
    }

    fn create(&self) -> CollectedClientData {
        client_data(ClientDataType::Create, &self.challenge, ORIGIN)
    }

    fn get(&self) -> CollectedClientData {
        client_data(ClientDataType::Get, &self.challenge, ORIGIN)
    }

    fn registration(&self, authenticator: &SoftAuthenticator) -> RegistrationCredential {
        authenticator.attest(&self.create(), RP_ID)
    }

    fn stored(&self, authenticator: &SoftAuthenticator) -> Credential {
        self.verifier()
            .verify_registration(&self.registration(authenticator))
            .expect("a well behaved authenticator registers")
            .into()
    }
}

#[test]
fn es256_registration() {
    let fixture = Fixture::new();
    let authenticator = SoftAuthenticator::es256();

    let verified = fixture
        .verifier()
        .verify_registration(&fixture.registration(&authenticator))
        .expect("registration verifies");

    assert_eq!(verified.credential_id.as_slice(), authenticator.credential_id());
    assert_eq!(verified.algorithm, iana::Algorithm::ES256);
    assert_eq!(verified.sign_count, 0);
    assert!(verified.user_verified);
    assert!(verified.aaguid.is_empty());
    assert_eq!(
        verified.transports,
        BTreeSet::from([
            AuthenticatorTransport::Internal,
            AuthenticatorTransport::Hybrid
        ])
    );
    let key = CredentialKey::from_cose_bytes(&verified.public_key).expect("stored key decodes");
    assert_eq!(key.algorithm(), iana::Algorithm::ES256);
}

#[test]
fn rs256_registration() {
    let fixture = Fixture::new();
    let mut authenticator = SoftAuthenticator::rs256();
    authenticator.counter = 3;

    let verified = fixture
        .verifier()
        .verify_registration(&fixture.registration(&authenticator))
        .expect("registration verifies");
    assert_eq!(verified.algorithm, iana::Algorithm::RS256);
    assert_eq!(verified.sign_count, 3);
}

#[test]
fn registration_binds_challenge_origin_and_type() {
    let fixture = Fixture::new();
    let authenticator = SoftAuthenticator::es256();
    let verify = |client_data: CollectedClientData| {
        fixture
            .verifier()
            .verify_registration(&authenticator.attest(&client_data, RP_ID))
    };

    assert_eq!(
        verify(fixture.get()).map(|_| ()),
        Err(RejectionReason::ClientDataTypeMismatch)
    );
    assert_eq!(
        verify(client_data(ClientDataType::Create, &[8; 32], ORIGIN)).map(|_| ()),
        Err(RejectionReason::ChallengeMismatch)
    );
    // a prefix of the challenge is not the challenge
    assert_eq!(
        verify(client_data(ClientDataType::Create, &[7; 16], ORIGIN)).map(|_| ()),
        Err(RejectionReason::ChallengeMismatch)
    );

    let mut not_base64 = fixture.create();
    not_base64.challenge = "not base64!".into();
    assert_eq!(
        verify(not_base64).map(|_| ()),
        Err(RejectionReason::ChallengeMismatch)
    );

    for origin in [
        "https://evil.com",
        "https://login.example.com",
        "https://example.com:8443",
        "http://example.com",
        "https://example.com/",
    ] {
        assert_eq!(
            verify(client_data(ClientDataType::Create, &fixture.challenge, origin)).map(|_| ()),
            Err(RejectionReason::OriginMismatch),
            "{origin}"
        );
    }
}

#[test]
fn challenge_is_checked_before_origin() {
    let fixture = Fixture::new();
    let authenticator = SoftAuthenticator::es256();
    let response = authenticator.attest(
        &client_data(ClientDataType::Create, &[1; 32], "https://evil.com"),
        "evil.com",
    );
    assert_eq!(
        fixture.verifier().verify_registration(&response).map(|_| ()),
        Err(RejectionReason::ChallengeMismatch)
    );
}

#[test]
fn registration_checks_rp_id_and_flags() {
    let fixture = Fixture::new();
    let mut authenticator = SoftAuthenticator::es256();

    let other_rp = authenticator.attest(&fixture.create(), "login.example.com");
    assert_eq!(
        fixture.verifier().verify_registration(&other_rp).map(|_| ()),
        Err(RejectionReason::RpIdMismatch)
    );

    authenticator.flags = Flags::UV;
    assert_eq!(
        fixture
            .verifier()
            .verify_registration(&fixture.registration(&authenticator))
            .map(|_| ()),
        Err(RejectionReason::UserNotPresent)
    );

    authenticator.flags = Flags::UP;
    assert_eq!(
        fixture
            .verifier()
            .verify_registration(&fixture.registration(&authenticator))
            .map(|_| ()),
        Err(RejectionReason::UserNotVerified)
    );

    let relaxed = Fixture {
        policy: CeremonyPolicy {
            user_verification: UserVerificationRequirement::Preferred,
            ..Default::default()
        },
        ..Fixture::new()
    };
    let verified = relaxed
        .verifier()
        .verify_registration(&relaxed.registration(&authenticator))
        .expect("user verification is only preferred");
    assert!(!verified.user_verified);

    authenticator.flags = Flags::UP | Flags::UV | Flags::BS;
    assert_eq!(
        fixture
            .verifier()
            .verify_registration(&fixture.registration(&authenticator))
            .map(|_| ()),
        Err(RejectionReason::MalformedResponse)
    );
    authenticator.flags = Flags::UP | Flags::UV | Flags::BE | Flags::BS;
    assert!(fixture
        .verifier()
        .verify_registration(&fixture.registration(&authenticator))
        .is_ok());
}

#[test]
fn algorithms_outside_the_policy_are_refused() {
    let fixture = Fixture {
        policy: CeremonyPolicy {
            algorithms: vec![iana::Algorithm::ES256],
            ..Default::default()
        },
        ..Fixture::new()
    };
    let response = fixture.registration(&SoftAuthenticator::rs256());
    assert_eq!(
        fixture.verifier().verify_registration(&response).map(|_| ()),
        Err(RejectionReason::UnsupportedAlgorithm)
    );
}

#[test]
fn attestation_statements_are_checked_for_shape() {
    let fixture = Fixture::new();
    let mut authenticator = SoftAuthenticator::es256();
    let mut verify = |fmt: &str, att_stmt: Value| {
        authenticator.attestation = (fmt.into(), att_stmt);
        fixture
            .verifier()
            .verify_registration(&fixture.registration(&authenticator))
            .map(|_| ())
    };

    let packed = cbor!({ "alg" => -7, "sig" => Value::Bytes(vec![0x30, 0x44]) }).expect("cbor");
    assert_eq!(verify("packed", packed), Ok(()));
    assert_eq!(
        verify("packed", Value::Map(Vec::new())),
        Err(RejectionReason::MalformedResponse)
    );
    let sig_as_text = cbor!({ "alg" => -7, "sig" => "signature" }).expect("cbor");
    assert_eq!(
        verify("packed", sig_as_text),
        Err(RejectionReason::MalformedResponse)
    );

    let not_empty = cbor!({ "alg" => -7 }).expect("cbor");
    assert_eq!(
        verify("none", not_empty),
        Err(RejectionReason::MalformedResponse)
    );
    assert_eq!(
        verify("none", Value::Array(Vec::new())),
        Err(RejectionReason::MalformedResponse)
    );
    assert_eq!(
        verify("made-up", Value::Map(Vec::new())),
        Err(RejectionReason::MalformedResponse)
    );

    // registered formats with chains are accepted unvalidated
    let u2f = cbor!({ "x5c" => [Value::Bytes(vec![1, 2, 3])], "sig" => Value::Bytes(vec![4]) })
        .expect("cbor");
    assert_eq!(verify("fido-u2f", u2f), Ok(()));
}

#[test]
fn registration_envelope_must_be_consistent() {
    let fixture = Fixture::new();
    let authenticator = SoftAuthenticator::es256();
    let verify = |response: &RegistrationCredential| {
        fixture.verifier().verify_registration(response).map(|_| ())
    };

    let mut wrong_id = fixture.registration(&authenticator);
    wrong_id.id = "AAAA".into();
    assert_eq!(verify(&wrong_id), Err(RejectionReason::MalformedResponse));

    // id and rawId agree with each other but not with the attested credential
    let mut foreign_raw_id = fixture.registration(&authenticator);
    foreign_raw_id.raw_id = vec![0; 16].into();
    foreign_raw_id.id = passkey_rp_types::encoding::base64url(&[0; 16]);
    assert_eq!(
        verify(&foreign_raw_id),
        Err(RejectionReason::MalformedResponse)
    );

    let mut garbage_client_data = fixture.registration(&authenticator);
    garbage_client_data.response.client_data_json = b"{\"type\":".to_vec().into();
    assert_eq!(
        verify(&garbage_client_data),
        Err(RejectionReason::MalformedResponse)
    );

    let mut garbage_attestation = fixture.registration(&authenticator);
    garbage_attestation.response.attestation_object = vec![0xff, 0x00].into();
    assert_eq!(
        verify(&garbage_attestation),
        Err(RejectionReason::MalformedResponse)
    );

    let mut declared_rs256 = fixture.registration(&authenticator);
    declared_rs256.response.public_key_algorithm = Some(-257);
    assert_eq!(
        verify(&declared_rs256),
        Err(RejectionReason::MalformedResponse)
    );

    let mut stale_copy = fixture.registration(&authenticator);
    stale_copy.response.authenticator_data = Some(vec![0; 37].into());
    assert_eq!(verify(&stale_copy), Err(RejectionReason::MalformedResponse));

    let without_credential = AttestationObject::none(
        &AuthenticatorData::new(RP_ID, 0).set_flags(Flags::UP | Flags::UV),
    );
    let mut no_acd = fixture.registration(&authenticator);
    no_acd.response.attestation_object = without_credential.to_vec().into();
    no_acd.response.authenticator_data = None;
    assert_eq!(verify(&no_acd), Err(RejectionReason::MalformedResponse));
}

#[test]
fn es256_assertion() {
    let fixture = Fixture::new();
    let mut authenticator = SoftAuthenticator::es256();
    let stored = fixture.stored(&authenticator);

    authenticator.counter = 1;
    let response = authenticator.assert(&fixture.get(), RP_ID);
    let verified = fixture
        .verifier()
        .verify_authentication(&response, &stored, &[1; 16])
        .expect("assertion verifies");
    assert_eq!(
        verified,
        VerifiedAuthentication {
            new_sign_count: 1,
            user_verified: true,
        }
    );
}

#[test]
fn rs256_assertion() {
    let fixture = Fixture::new();
    let authenticator = SoftAuthenticator::rs256();
    let stored = fixture.stored(&authenticator);

    // a counterless authenticator keeps sending 0
    let response = authenticator.assert(&fixture.get(), RP_ID);
    let verified = fixture
        .verifier()
        .verify_authentication(&response, &stored, &[1; 16])
        .expect("assertion verifies");
    assert_eq!(verified.new_sign_count, 0);
}

#[test]
fn assertion_signature_covers_everything() {
    let fixture = Fixture::new();
    let mut authenticator = SoftAuthenticator::es256();
    let stored = fixture.stored(&authenticator);
    authenticator.counter = 1;
    let verify = |response: &AuthenticationCredential| {
        fixture
            .verifier()
            .verify_authentication(response, &stored, &[1; 16])
            .map(|_| ())
    };

    let mut flipped = authenticator.assert(&fixture.get(), RP_ID);
    if let Some(last) = flipped.response.signature.last_mut() {
        *last ^= 0x01;
    }
    assert_eq!(verify(&flipped), Err(RejectionReason::SignatureInvalid));

    let mut bumped_counter = authenticator.assert(&fixture.get(), RP_ID);
    bumped_counter.response.authenticator_data[36] = 0x09;
    assert_eq!(
        verify(&bumped_counter),
        Err(RejectionReason::SignatureInvalid)
    );

    // client data that still passes every check but is not what was signed
    let mut extra_key = authenticator.assert(&fixture.get(), RP_ID);
    let mut resigned = fixture.get();
    resigned
        .unknown_keys
        .insert("other_keys_can_be_added_here".into(), "x".into());
    extra_key.response.client_data_json = resigned.to_json().into();
    assert_eq!(verify(&extra_key), Err(RejectionReason::SignatureInvalid));

    // a signature from another key over the same data
    let mut impostor = SoftAuthenticator::es256();
    impostor.counter = 1;
    let mut foreign = impostor.assert(&fixture.get(), RP_ID);
    foreign.id = authenticator.assert(&fixture.get(), RP_ID).id;
    foreign.raw_id = stored.credential_id.clone();
    assert_eq!(verify(&foreign), Err(RejectionReason::SignatureInvalid));
}

#[test]
fn assertion_binds_the_credential_and_user() {
    let fixture = Fixture::new();
    let mut authenticator = SoftAuthenticator::es256();
    let stored = fixture.stored(&authenticator);
    authenticator.counter = 1;

    let other = fixture.stored(&SoftAuthenticator::es256());
    let response = authenticator.assert(&fixture.get(), RP_ID);
    assert_eq!(
        fixture
            .verifier()
            .verify_authentication(&response, &other, &[1; 16])
            .map(|_| ()),
        Err(RejectionReason::UnknownCredential)
    );

    let mut with_handle = authenticator.assert(&fixture.get(), RP_ID);
    with_handle.response.user_handle = Some(vec![2; 16].into());
    assert_eq!(
        fixture
            .verifier()
            .verify_authentication(&with_handle, &stored, &[1; 16])
            .map(|_| ()),
        Err(RejectionReason::UnknownCredential)
    );
    assert!(fixture
        .verifier()
        .verify_authentication(&with_handle, &stored, &[2; 16])
        .is_ok());
}

#[test]
fn assertion_runs_the_common_checks() {
    let fixture = Fixture::new();
    let mut authenticator = SoftAuthenticator::es256();
    let stored = fixture.stored(&authenticator);
    authenticator.counter = 1;
    let verify = |response: &AuthenticationCredential| {
        fixture
            .verifier()
            .verify_authentication(response, &stored, &[1; 16])
            .map(|_| ())
    };

    assert_eq!(
        verify(&authenticator.assert(&fixture.create(), RP_ID)),
        Err(RejectionReason::ClientDataTypeMismatch)
    );
    assert_eq!(
        verify(&authenticator.assert(
            &client_data(ClientDataType::Get, &[0; 32], ORIGIN),
            RP_ID
        )),
        Err(RejectionReason::ChallengeMismatch)
    );
    assert_eq!(
        verify(&authenticator.assert(
            &client_data(ClientDataType::Get, &fixture.challenge, "https://evil.com"),
            RP_ID
        )),
        Err(RejectionReason::OriginMismatch)
    );
    assert_eq!(
        verify(&authenticator.assert(&fixture.get(), "evil.com")),
        Err(RejectionReason::RpIdMismatch)
    );

    authenticator.flags = Flags::UP;
    assert_eq!(
        verify(&authenticator.assert(&fixture.get(), RP_ID)),
        Err(RejectionReason::UserNotVerified)
    );
    authenticator.flags = Flags::empty();
    assert_eq!(
        verify(&authenticator.assert(&fixture.get(), RP_ID)),
        Err(RejectionReason::UserNotPresent)
    );

    let mut truncated = authenticator.assert(&fixture.get(), RP_ID);
    truncated.response.authenticator_data.truncate(36);
    assert_eq!(verify(&truncated), Err(RejectionReason::MalformedResponse));
}

#[test]
fn assertion_counter_must_increase() {
    let fixture = Fixture::new();
    let mut authenticator = SoftAuthenticator::es256();
    let mut stored = fixture.stored(&authenticator);
    stored.signature_counter = 5;

    for counter in [0, 3, 5] {
        authenticator.counter = counter;
        let response = authenticator.assert(&fixture.get(), RP_ID);
        assert_eq!(
            fixture
                .verifier()
                .verify_authentication(&response, &stored, &[1; 16])
                .map(|_| ()),
            Err(RejectionReason::PossibleCloning),
            "counter {counter}"
        );
    }

    authenticator.counter = 6;
    let response = authenticator.assert(&fixture.get(), RP_ID);
    assert_eq!(
        fixture
            .verifier()
            .verify_authentication(&response, &stored, &[1; 16])
            .map(|verified| verified.new_sign_count),
        Ok(6)
    );
}

#[test]
fn counter_rule() {
    // counterless authenticators
    assert_eq!(check_counter(0, 0), Ok(()));
    // first use of a counter
    assert_eq!(check_counter(0, 1), Ok(()));
    assert_eq!(check_counter(41, 42), Ok(()));
    assert_eq!(check_counter(u32::MAX - 1, u32::MAX), Ok(()));

    assert_eq!(check_counter(42, 42), Err(RejectionReason::PossibleCloning));
    assert_eq!(check_counter(42, 7), Err(RejectionReason::PossibleCloning));
    // a counter that was in use cannot drop back to "unsupported"
    assert_eq!(check_counter(42, 0), Err(RejectionReason::PossibleCloning));
}
