use std::sync::Arc;

use passkey_rp_types::webauthn::{
    AuthenticationCredential, AuthenticatorSelectionCriteria, CredentialCreationOptions,
    CredentialRequestOptions, PublicKeyCredentialCreationOptions, PublicKeyCredentialParameters,
    PublicKeyCredentialRequestOptions, PublicKeyCredentialRpEntity, PublicKeyCredentialUserEntity,
    RegistrationCredential, ResidentKeyRequirement,
};

use crate::{
    Account, CeremonyError, CeremonyKind, CeremonyOutcome, CeremonyPolicy, ChallengeSource,
    ConfigError, ConfigService, CounterUpdate, Credential, CredentialRegistry, MemoryRegistry,
    MemorySessionStore, OsChallengeSource, PendingCeremony, RejectionReason, RelyingPartyConfig,
    ResponseVerifier, RpIdVerifier, SessionStore, StoreError, VersionedConfig,
};


/// Only [`StoreError::Unavailable`] is expected here. Anything else means the stores disagree
/// with each other, which the caller cannot fix either.
fn storage_unavailable(error: StoreError) -> CeremonyError {
    log::error!("ceremony storage failed: {error}");
    match error {
        StoreError::Unavailable(reason) => CeremonyError::StorageUnavailable(reason),
        other => CeremonyError::StorageUnavailable(other.to_string()),
    }
}

/// The Relying Party: drives registration and authentication ceremonies for identities.
///
/// Every ceremony is two calls. A `begin_*` call issues a fresh challenge, binds it to the
/// identity in the [`SessionStore`] and returns the options for the browser. The matching
/// `finish_*` call consumes that binding, whatever the outcome, verifies the browser's answer and
/// commits the result to the [`CredentialRegistry`]. Ceremonies for different identities never
/// contend with each other; a new `begin_*` for an identity replaces the one in flight.
///
/// The configuration is read as one snapshot per call, so a concurrent
/// [`set_config`](Self::set_config) is seen either entirely or not at all.
#[derive(Debug)]
pub struct RelyingParty<S, R, C = OsChallengeSource> {
    config: ConfigService,
    policy: CeremonyPolicy,
    sessions: S,
    registry: R,
    challenges: C,
}

impl RelyingParty<MemorySessionStore, MemoryRegistry> {
    /// A Relying Party keeping everything in memory, with the default policy and challenges from
    /// the operating system.
    pub fn in_memory(config: RelyingPartyConfig) -> Result<Self, ConfigError> {
        let policy = CeremonyPolicy::default();
        Self::new(
            ConfigService::new(config, RpIdVerifier::new())?,
            MemorySessionStore::new(policy.session_ttl),
            MemoryRegistry::new(),
            OsChallengeSource,
        )
    }
}

impl<S, R, C> RelyingParty<S, R, C>
where
    S: SessionStore + Send + Sync,
    R: CredentialRegistry + Send + Sync,
    C: ChallengeSource + Send + Sync,
{
    /// Assemble a Relying Party with the default [`CeremonyPolicy`].
    pub fn new(
        config: ConfigService,
        sessions: S,
        registry: R,
        challenges: C,
    ) -> Result<Self, ConfigError> {
        Self::with_policy(config, CeremonyPolicy::default(), sessions, registry, challenges)
    }

    /// Assemble a Relying Party, refusing policies the verifier cannot honour.
    ///
    /// The session store's expiry is its own: make it agree with
    /// [`CeremonyPolicy::session_ttl`] when building it.
    pub fn with_policy(
        config: ConfigService,
        policy: CeremonyPolicy,
        sessions: S,
        registry: R,
        challenges: C,
    ) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self {
            config,
            policy,
            sessions,
            registry,
            challenges,
        })
    }

    /// The policy every ceremony runs under.
    pub fn policy(&self) -> &CeremonyPolicy {
        &self.policy
    }

    /// Publish a new configuration, returning its version.
    pub async fn set_config(&self, config: RelyingPartyConfig) -> Result<u64, ConfigError> {
        self.config.set(config).await
    }

    /// The current configuration snapshot.
    pub async fn get_config(&self) -> Arc<VersionedConfig> {
        self.config.get().await
    }

    /// Every account and its credentials, ordered by identity.
    pub async fn accounts(&self) -> Result<Vec<Account>, CeremonyError> {
        self.registry.accounts().await.map_err(storage_unavailable)
    }

    /// Drop expired pending ceremonies, returning how many were dropped.
    ///
    /// [`MemorySessionStore`] also sweeps as ceremonies are put. Other stores may rely on the
    /// caller scheduling this.
    pub async fn purge_expired(&self) -> Result<usize, CeremonyError> {
        self.sessions
            .purge_expired()
            .await
            .map_err(storage_unavailable)
    }

    async fn bind_challenge(
        &self,
        identity: &str,
        kind: CeremonyKind,
        challenge: &[u8],
    ) -> Result<(), CeremonyError> {
        self.sessions
            .put(PendingCeremony::new(identity, kind, challenge))
            .await
            .map_err(storage_unavailable)
    }

    /// Consume the identity's pending ceremony. One of the wrong kind is consumed all the same.
    async fn take_pending(
        &self,
        identity: &str,
        kind: CeremonyKind,
    ) -> Result<PendingCeremony, CeremonyError> {
        match self.sessions.take(identity).await {
            Ok(pending) if pending.kind == kind => Ok(pending),
            Ok(pending) => {
                log::debug!(
                    "{identity} answered a {:?} ceremony as {kind:?}",
                    pending.kind
                );
                Err(RejectionReason::NoPendingCeremony.into())
            }
            Err(StoreError::NotFound) => Err(RejectionReason::NoPendingCeremony.into()),
            Err(error) => Err(storage_unavailable(error)),
        }
    }

    /// Start registering a new credential for `identity`, creating its account if needed.
    ///
    /// The returned options exclude every credential already registered to the identity, so the
    /// same authenticator is not registered twice.
    pub async fn begin_registration(
        &self,
        identity: &str,
    ) -> Result<CredentialCreationOptions, CeremonyError> {
        let snapshot = self.config.get().await;
        // no challenge, nothing stored
        let challenge = self.challenges.new_challenge(self.policy.challenge_len)?;
        let account = self
            .registry
            .get_or_create_account(identity)
            .await
            .map_err(storage_unavailable)?;
        self.bind_challenge(identity, CeremonyKind::Registration, &challenge)
            .await?;

        log::debug!(
            "issued registration challenge for {identity} under config v{}",
            snapshot.version
        );

        Ok(CredentialCreationOptions {
            public_key: PublicKeyCredentialCreationOptions {
                rp: PublicKeyCredentialRpEntity {
                    id: Some(snapshot.config.rp_id.clone()),
                    name: snapshot.config.rp_name.clone(),
                },
                user: PublicKeyCredentialUserEntity {
                    id: account.user_handle.clone(),
                    name: identity.to_owned(),
                    display_name: identity.to_owned(),
                },
                challenge: challenge.into(),
                pub_key_cred_params: self
                    .policy
                    .algorithms
                    .iter()
                    .copied()
                    .map(PublicKeyCredentialParameters::public_key)
                    .collect(),
                timeout: Some(self.policy.timeout_ms),
                exclude_credentials: Some(
                    account.credentials.iter().map(Credential::descriptor).collect(),
                ),
                authenticator_selection: Some(AuthenticatorSelectionCriteria {
                    authenticator_attachment: None,
                    resident_key: Some(ResidentKeyRequirement::Preferred),
                    require_resident_key: false,
                    user_verification: self.policy.user_verification,
                }),
                attestation: self.policy.attestation,
            },
        })
    }

    /// Finish a registration with the browser's answer.
    ///
    /// Rejections are reported in the outcome and leave the registry untouched. Only storage
    /// failures are errors.
    pub async fn finish_registration(
        &self,
        identity: &str,
        credential: &RegistrationCredential,
    ) -> Result<CeremonyOutcome, CeremonyError> {
        let result = self.try_finish_registration(identity, credential).await;
        log_outcome(identity, CeremonyKind::Registration, &result);
        CeremonyOutcome::from_result(result)
    }

    async fn try_finish_registration(
        &self,
        identity: &str,
        credential: &RegistrationCredential,
    ) -> Result<(), CeremonyError> {
        let pending = self
            .take_pending(identity, CeremonyKind::Registration)
            .await?;
        let snapshot = self.config.get().await;

        let verified =
            ResponseVerifier::new(&pending.expected_challenge, &snapshot.config, &self.policy)
                .verify_registration(credential)?;

        // the account normally exists since begin, but a persistent registry may have lost it
        self.registry
            .get_or_create_account(identity)
            .await
            .map_err(storage_unavailable)?;
        match self.registry.add_credential(identity, verified.into()).await {
            Ok(()) => Ok(()),
            Err(StoreError::DuplicateCredential) => {
                Err(RejectionReason::DuplicateCredential.into())
            }
            Err(error) => Err(storage_unavailable(error)),
        }
    }

    /// Start authenticating `identity` with one of its registered credentials.
    ///
    /// Fails with [`RejectionReason::UnknownIdentity`] if the identity has no account or no
    /// credential yet. Exposing that to clients lets them enumerate accounts.
    pub async fn begin_authentication(
        &self,
        identity: &str,
    ) -> Result<CredentialRequestOptions, CeremonyError> {
        let snapshot = self.config.get().await;
        let account = match self.registry.get_account(identity).await {
            Ok(account) if !account.credentials.is_empty() => account,
            Ok(_) | Err(StoreError::NotFound) => {
                log::warn!("authentication requested for unknown identity {identity}");
                return Err(RejectionReason::UnknownIdentity.into());
            }
            Err(error) => return Err(storage_unavailable(error)),
        };
        let challenge = self.challenges.new_challenge(self.policy.challenge_len)?;
        self.bind_challenge(identity, CeremonyKind::Authentication, &challenge)
            .await?;

        log::debug!(
            "issued authentication challenge for {identity} under config v{}",
            snapshot.version
        );

        Ok(CredentialRequestOptions {
            public_key: PublicKeyCredentialRequestOptions {
                challenge: challenge.into(),
                timeout: Some(self.policy.timeout_ms),
                rp_id: Some(snapshot.config.rp_id.clone()),
                allow_credentials: Some(
                    account.credentials.iter().map(Credential::descriptor).collect(),
                ),
                user_verification: self.policy.user_verification,
            },
        })
    }

    /// Finish an authentication with the browser's answer.
    ///
    /// The new signature counter is committed with a compare-and-swap against the value the
    /// verifier checked, so two assertions racing for one credential never both succeed.
    pub async fn finish_authentication(
        &self,
        identity: &str,
        credential: &AuthenticationCredential,
    ) -> Result<CeremonyOutcome, CeremonyError> {
        let result = self.try_finish_authentication(identity, credential).await;
        log_outcome(identity, CeremonyKind::Authentication, &result);
        CeremonyOutcome::from_result(result)
    }

    async fn try_finish_authentication(
        &self,
        identity: &str,
        credential: &AuthenticationCredential,
    ) -> Result<(), CeremonyError> {
        let pending = self
            .take_pending(identity, CeremonyKind::Authentication)
            .await?;
        let snapshot = self.config.get().await;

        let account = match self.registry.get_account(identity).await {
            Ok(account) => account,
            Err(StoreError::NotFound) => return Err(RejectionReason::UnknownIdentity.into()),
            Err(error) => return Err(storage_unavailable(error)),
        };
        let stored = account
            .credential(&credential.raw_id)
            .ok_or(RejectionReason::UnknownCredential)?;

        let verified =
            ResponseVerifier::new(&pending.expected_challenge, &snapshot.config, &self.policy)
                .verify_authentication(credential, stored, &account.user_handle)?;

        let update = self
            .registry
            .compare_and_update_counter(
                identity,
                &stored.credential_id,
                stored.signature_counter,
                verified.new_sign_count,
            )
            .await;
        match update {
            Ok(CounterUpdate::Applied) => Ok(()),
            Ok(CounterUpdate::Conflict { stored: current }) => {
                log::warn!(
                    "counter of a credential of {identity} moved to {current} during the \
                     ceremony, refusing {}",
                    verified.new_sign_count
                );
                Err(RejectionReason::PossibleCloning.into())
            }
            Err(StoreError::NotFound) => Err(RejectionReason::UnknownCredential.into()),
            Err(error) => Err(storage_unavailable(error)),
        }
    }
}

fn log_outcome(identity: &str, kind: CeremonyKind, result: &Result<(), CeremonyError>) {
    match result {
        Ok(()) => log::info!("{kind:?} verified for {identity}"),
        Err(CeremonyError::Rejected(reason)) => {
            log::warn!("{kind:?} rejected for {identity}: {reason}")
        }
        // logged where they happen
        Err(_) => {}
    }
}
