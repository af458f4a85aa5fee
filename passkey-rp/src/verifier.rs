//! Verification of the responses browsers return from `create()` and `get()`.
//!
//! A [`ResponseVerifier`] is built per ceremony from the challenge that was issued, the
//! configuration snapshot the ceremony runs under and the ceremony policy. It performs every
//! check that does not need the stores, in a fixed order, and stops at the first failure with a
//! specific [`RejectionReason`].

use std::collections::BTreeSet;

use ciborium::value::Value;
use coset::iana::{self, EnumI64};
use passkey_rp_types::{
    authenticator::{Aaguid, AttestationObject, AuthenticatorData, Flags},
    crypto::sha256,
    encoding::try_from_base64url,
    webauthn::{
        AttestationStatementFormatIdentifiers, AuthenticationCredential, AuthenticatorTransport,
        ClientDataType, CollectedClientData, RegistrationCredential,
    },
    Bytes,
};

use crate::{CeremonyPolicy, Credential, RejectionReason, RelyingPartyConfig};

mod signature;

use self::signature::{CredentialKey, KeyError};

#[cfg(test)]
mod tests;

/// What a successful registration response establishes about the new credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRegistration {
    /// The credential ID, equal to the response's `rawId`.
    pub credential_id: Bytes,
    /// The COSE public key, byte for byte as the authenticator encoded it.
    pub public_key: Bytes,
    /// The algorithm of [`Self::public_key`].
    pub algorithm: iana::Algorithm,
    /// The initial signature counter, `0` for authenticators without one.
    pub sign_count: u32,
    /// The authenticator model, all zeros when not disclosed.
    pub aaguid: Aaguid,
    /// Whether the user was verified.
    pub user_verified: bool,
    /// The transports the client reported, unknown ones dropped.
    pub transports: BTreeSet<AuthenticatorTransport>,
}

impl From<VerifiedRegistration> for Credential {
    fn from(verified: VerifiedRegistration) -> Self {
        Credential {
            credential_id: verified.credential_id,
            public_key: verified.public_key,
            algorithm: verified.algorithm,
            signature_counter: verified.sign_count,
            transports: verified.transports,
            aaguid: verified.aaguid,
            user_verified: verified.user_verified,
        }
    }
}

/// What a successful authentication response establishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedAuthentication {
    /// The counter to persist for the credential.
    pub new_sign_count: u32,
    /// Whether the user was verified.
    pub user_verified: bool,
}

/// Checks one response against what the Relying Party expects for the ceremony.
#[derive(Debug, Clone, Copy)]
pub struct ResponseVerifier<'a> {
    expected_challenge: &'a [u8],
    config: &'a RelyingPartyConfig,
    policy: &'a CeremonyPolicy,
}

fn malformed<E: std::fmt::Display>(what: &'static str) -> impl FnOnce(E) -> RejectionReason {
    move |error| {
        log::debug!("could not decode {what}: {error}");
        RejectionReason::MalformedResponse
    }
}

impl<'a> ResponseVerifier<'a> {
    /// A verifier for responses to `expected_challenge`, under one configuration snapshot.
    pub fn new(
        expected_challenge: &'a [u8],
        config: &'a RelyingPartyConfig,
        policy: &'a CeremonyPolicy,
    ) -> Self {
        Self {
            expected_challenge,
            config,
            policy,
        }
    }

    /// Verify the response to a registration.
    ///
    /// Once the response is decoded, the checks run in this order: client data type, challenge,
    /// origin, RP ID hash, user presence, user verification, public key algorithm and finally the
    /// attestation statement's shape. Attestation trust chains are never validated.
    pub fn verify_registration(
        &self,
        credential: &RegistrationCredential,
    ) -> Result<VerifiedRegistration, RejectionReason> {
        if !credential.is_well_formed() {
            return Err(RejectionReason::MalformedResponse);
        }
        let response = &credential.response;
        let client_data = CollectedClientData::from_json(&response.client_data_json)
            .map_err(malformed("client data"))?;
        let attestation = AttestationObject::from_slice(&response.attestation_object)
            .map_err(malformed("attestation object"))?;
        let auth_data = attestation
            .authenticator_data()
            .map_err(malformed("authenticator data"))?;

        // the convenience copy outside the attestation object must agree with the signed one
        if response
            .authenticator_data
            .as_ref()
            .is_some_and(|copy| *copy != attestation.auth_data)
        {
            return Err(RejectionReason::MalformedResponse);
        }

        self.verify_client_data(&client_data, ClientDataType::Create)?;
        self.verify_authenticator_data(&auth_data)?;

        let Some(acd) = auth_data.attested_credential_data.as_ref() else {
            log::debug!("registration response without attested credential data");
            return Err(RejectionReason::MalformedResponse);
        };

        let algorithm = acd
            .algorithm()
            .filter(|alg| self.policy.algorithms.contains(alg))
            .ok_or(RejectionReason::UnsupportedAlgorithm)?;
        if response
            .public_key_algorithm
            .is_some_and(|declared| declared != algorithm.to_i64())
        {
            return Err(RejectionReason::MalformedResponse);
        }
        CredentialKey::from_cose(acd.key()).map_err(|error| match error {
            KeyError::UnsupportedAlgorithm => RejectionReason::UnsupportedAlgorithm,
            KeyError::InvalidKey => RejectionReason::MalformedResponse,
        })?;

        verify_attestation_statement(&attestation.fmt, &attestation.att_stmt)?;

        if acd.credential_id() != credential.raw_id.as_slice() {
            log::debug!("attested credential ID differs from rawId");
            return Err(RejectionReason::MalformedResponse);
        }

        Ok(VerifiedRegistration {
            credential_id: credential.raw_id.clone(),
            public_key: acd.key_bytes().into(),
            algorithm,
            sign_count: auth_data.counter,
            aaguid: acd.aaguid,
            user_verified: auth_data.flags.user_verified(),
            transports: response
                .transports
                .iter()
                .flatten()
                .copied()
                .collect(),
        })
    }

    /// Verify the response to an authentication with the credential it claims to be from.
    ///
    /// `user_handle` is the handle of the account the ceremony was started for. The checks after
    /// decoding are: client data type, challenge, origin, RP ID hash, user presence, user
    /// verification, user handle, signature and finally the signature counter.
    pub fn verify_authentication(
        &self,
        credential: &AuthenticationCredential,
        stored: &Credential,
        user_handle: &[u8],
    ) -> Result<VerifiedAuthentication, RejectionReason> {
        if !credential.is_well_formed() {
            return Err(RejectionReason::MalformedResponse);
        }
        if credential.raw_id != stored.credential_id {
            return Err(RejectionReason::UnknownCredential);
        }
        let response = &credential.response;
        let client_data = CollectedClientData::from_json(&response.client_data_json)
            .map_err(malformed("client data"))?;
        let auth_data = AuthenticatorData::from_slice(&response.authenticator_data)
            .map_err(malformed("authenticator data"))?;

        self.verify_client_data(&client_data, ClientDataType::Get)?;
        self.verify_authenticator_data(&auth_data)?;

        if response
            .user_handle
            .as_ref()
            .is_some_and(|handle| handle.as_slice() != user_handle)
        {
            log::debug!("assertion user handle does not belong to the account");
            return Err(RejectionReason::UnknownCredential);
        }

        let key = CredentialKey::from_cose_bytes(&stored.public_key).map_err(|error| {
            log::error!("stored public key cannot be used: {error:?}");
            RejectionReason::SignatureInvalid
        })?;
        let mut signed_data = response.authenticator_data.to_vec();
        signed_data.extend_from_slice(&sha256(&response.client_data_json));
        if !key.verify(&signed_data, &response.signature) {
            return Err(RejectionReason::SignatureInvalid);
        }

        check_counter(stored.signature_counter, auth_data.counter)?;

        Ok(VerifiedAuthentication {
            new_sign_count: auth_data.counter,
            user_verified: auth_data.flags.user_verified(),
        })
    }

    fn verify_client_data(
        &self,
        client_data: &CollectedClientData,
        expected_type: ClientDataType,
    ) -> Result<(), RejectionReason> {
        if client_data.ty != expected_type {
            return Err(RejectionReason::ClientDataTypeMismatch);
        }

        let challenge =
            try_from_base64url(&client_data.challenge).ok_or(RejectionReason::ChallengeMismatch)?;
        ring::constant_time::verify_slices_are_equal(&challenge, self.expected_challenge)
            .map_err(|_| RejectionReason::ChallengeMismatch)?;

        if client_data.origin != self.config.origin {
            return Err(RejectionReason::OriginMismatch);
        }
        Ok(())
    }

    fn verify_authenticator_data(&self, auth_data: &AuthenticatorData) -> Result<(), RejectionReason> {
        if auth_data.rp_id_hash() != sha256(self.config.rp_id.as_bytes()).as_slice() {
            return Err(RejectionReason::RpIdMismatch);
        }
        if !auth_data.flags.user_present() {
            return Err(RejectionReason::UserNotPresent);
        }
        if self.policy.user_verification.is_required() && !auth_data.flags.user_verified() {
            return Err(RejectionReason::UserNotVerified);
        }
        // a credential cannot be backed up without being eligible for it
        if auth_data.flags.contains(Flags::BS) && !auth_data.flags.contains(Flags::BE) {
            return Err(RejectionReason::MalformedResponse);
        }
        Ok(())
    }
}

/// The anti-clone rule. Authenticators without a counter send `0` forever, so two zeros pass.
/// Once either side is non-zero the new counter must be strictly greater.
pub fn check_counter(stored: u32, new: u32) -> Result<(), RejectionReason> {
    if (new > 0 || stored > 0) && new <= stored {
        log::warn!("signature counter went from {stored} to {new}");
        return Err(RejectionReason::PossibleCloning);
    }
    Ok(())
}

fn map_get<'v>(entries: &'v [(Value, Value)], key: &str) -> Option<&'v Value> {
    entries
        .iter()
        .find(|(k, _)| k.as_text() == Some(key))
        .map(|(_, v)| v)
}

/// Only the syntax of the statement is checked: `none` must be empty and `packed` must carry an
/// algorithm and a signature. Other registered formats are accepted as opaque maps.
fn verify_attestation_statement(fmt: &str, att_stmt: &Value) -> Result<(), RejectionReason> {
    let Some(format) = AttestationStatementFormatIdentifiers::from_fmt(fmt) else {
        log::debug!("unregistered attestation format {fmt:?}");
        return Err(RejectionReason::MalformedResponse);
    };
    let Value::Map(entries) = att_stmt else {
        return Err(RejectionReason::MalformedResponse);
    };

    let well_formed = match format {
        AttestationStatementFormatIdentifiers::None => entries.is_empty(),
        AttestationStatementFormatIdentifiers::Packed => {
            map_get(entries, "alg").is_some_and(Value::is_integer)
                && map_get(entries, "sig").is_some_and(Value::is_bytes)
        }
        _ => true,
    };
    if well_formed {
        Ok(())
    } else {
        log::debug!("{fmt} attestation statement is malformed");
        Err(RejectionReason::MalformedResponse)
    }
}
