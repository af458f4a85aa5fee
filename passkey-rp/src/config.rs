use std::{sync::Arc, time::Duration};

use coset::iana;
use passkey_rp_types::webauthn::{AttestationConveyancePreference, UserVerificationRequirement};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use typeshare::typeshare;

use crate::{challenge::MIN_CHALLENGE_LEN, rp_id_verifier::parse_origin, ConfigError, RpIdVerifier};

/// The identity of the Relying Party: the RP ID credentials are scoped to, the name shown to
/// users and the one origin responses must come from.
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelyingPartyConfig {
    /// A domain equal to, or a parent of, the origin's host.
    pub rp_id: String,
    /// A human-palatable name for the Relying Party.
    pub rp_name: String,
    /// The exact origin, `scheme://host[:port]`, clients must report.
    pub origin: String,
}

impl RelyingPartyConfig {
    /// Build a configuration from its parts. Nothing is checked until it is handed to a
    /// [`ConfigService`].
    pub fn new(
        rp_id: impl Into<String>,
        rp_name: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            rp_id: rp_id.into(),
            rp_name: rp_name.into(),
            origin: origin.into(),
        }
    }

    /// Derive a configuration from the origin the service is reached on, using its host as RP ID.
    pub fn from_origin(origin: &str, rp_name: impl Into<String>) -> Result<Self, ConfigError> {
        let url = parse_origin(origin)?;
        let rp_id = url.domain().ok_or(ConfigError::OriginMissingDomain)?;
        Ok(Self {
            rp_id: rp_id.to_owned(),
            rp_name: rp_name.into(),
            origin: url.origin().ascii_serialization(),
        })
    }
}

/// A published [`RelyingPartyConfig`] and its version. Readers always see one whole version.
#[typeshare]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedConfig {
    /// The configuration itself.
    #[serde(flatten)]
    pub config: RelyingPartyConfig,
    /// Starts at 1 and increases with every accepted update.
    #[typeshare(serialized_as = "number")]
    pub version: u64,
}

/// Holds the current [`RelyingPartyConfig`] as an atomically replaced snapshot.
#[derive(Debug)]
pub struct ConfigService {
    current: RwLock<Arc<VersionedConfig>>,
    verifier: RpIdVerifier,
}

impl ConfigService {
    /// Validate and publish the initial configuration as version 1.
    pub fn new(config: RelyingPartyConfig, verifier: RpIdVerifier) -> Result<Self, ConfigError> {
        verifier.verify_config(&config)?;
        Ok(Self {
            current: RwLock::new(Arc::new(VersionedConfig { config, version: 1 })),
            verifier,
        })
    }

    /// The current snapshot.
    pub async fn get(&self) -> Arc<VersionedConfig> {
        self.current.read().await.clone()
    }

    /// Validate and publish a new configuration, returning its version. An invalid configuration
    /// leaves the current one in place.
    pub async fn set(&self, config: RelyingPartyConfig) -> Result<u64, ConfigError> {
        self.verifier.verify_config(&config)?;

        let mut current = self.current.write().await;
        let version = current.version + 1;
        log::info!(
            "publishing relying party config v{version}: rp_id={} origin={}",
            config.rp_id,
            config.origin
        );
        *current = Arc::new(VersionedConfig { config, version });
        Ok(version)
    }
}

/// Tunables shared by every ceremony.
#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyPolicy {
    /// Length of generated challenges in bytes, at least 16.
    pub challenge_len: usize,
    /// Timeout hint handed to the client, in milliseconds.
    pub timeout_ms: u32,
    /// How long a pending ceremony stays valid.
    pub session_ttl: Duration,
    /// The user verification requirement for both ceremonies.
    pub user_verification: UserVerificationRequirement,
    /// Accepted signature algorithms, most preferred first.
    pub algorithms: Vec<iana::Algorithm>,
    /// Attestation conveyance preference sent at registration.
    pub attestation: AttestationConveyancePreference,
}

impl CeremonyPolicy {
    /// Algorithms the verifier knows how to check.
    pub const SUPPORTED_ALGORITHMS: [iana::Algorithm; 2] =
        [iana::Algorithm::ES256, iana::Algorithm::RS256];

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.challenge_len < MIN_CHALLENGE_LEN {
            return Err(ConfigError::ChallengeTooShort);
        }
        if self.algorithms.is_empty()
            || self
                .algorithms
                .iter()
                .any(|alg| !Self::SUPPORTED_ALGORITHMS.contains(alg))
        {
            return Err(ConfigError::UnsupportedAlgorithm);
        }
        Ok(())
    }
}

impl Default for CeremonyPolicy {
    fn default() -> Self {
        Self {
            challenge_len: 32,
            timeout_ms: 60_000,
            session_ttl: Duration::from_secs(300),
            user_verification: UserVerificationRequirement::Required,
            algorithms: Self::SUPPORTED_ALGORITHMS.to_vec(),
            attestation: AttestationConveyancePreference::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> RelyingPartyConfig {
        RelyingPartyConfig::new("example.com", "Example", "https://example.com")
    }

    #[test]
    fn from_origin_uses_the_host() {
        let config = RelyingPartyConfig::from_origin("https://login.example.com", "Example")
            .expect("valid origin");
        assert_eq!(
            config,
            RelyingPartyConfig::new("login.example.com", "Example", "https://login.example.com")
        );
        assert_eq!(
            RelyingPartyConfig::from_origin("https://10.0.0.1", "Example"),
            Err(ConfigError::OriginMissingDomain)
        );
    }

    #[test]
    fn config_serializes_with_its_version() {
        let versioned = VersionedConfig {
            config: example(),
            version: 3,
        };
        assert_eq!(
            serde_json::to_value(versioned).expect("serializable"),
            serde_json::json!({
                "rpId": "example.com",
                "rpName": "Example",
                "origin": "https://example.com",
                "version": 3
            })
        );
    }

    #[tokio::test]
    async fn set_bumps_the_version() {
        let service = ConfigService::new(example(), RpIdVerifier::new()).expect("valid config");
        let first = service.get().await;
        assert_eq!(first.version, 1);

        let moved = RelyingPartyConfig::new("example.org", "Example", "https://www.example.org");
        assert_eq!(service.set(moved.clone()).await, Ok(2));

        let second = service.get().await;
        assert_eq!(second.version, 2);
        assert_eq!(second.config, moved);
        // earlier snapshots are unaffected
        assert_eq!(first.config, example());
    }

    #[tokio::test]
    async fn invalid_update_keeps_the_current_config() {
        let service = ConfigService::new(example(), RpIdVerifier::new()).expect("valid config");
        let result = service
            .set(RelyingPartyConfig::new(
                "example.com",
                "Example",
                "https://evil.com",
            ))
            .await;
        assert_eq!(result, Err(ConfigError::OriginRpMissmatch));

        let current = service.get().await;
        assert_eq!(current.version, 1);
        assert_eq!(current.config, example());
    }

    #[test]
    fn invalid_initial_config_is_refused() {
        let result = ConfigService::new(
            RelyingPartyConfig::new("localhost", "Local", "http://localhost:5000"),
            RpIdVerifier::new(),
        );
        assert_eq!(
            result.map(|_| ()),
            Err(ConfigError::InsecureLocalhostNotAllowed)
        );
    }

    #[test]
    fn policy_defaults() {
        let policy = CeremonyPolicy::default();
        assert_eq!(policy.challenge_len, 32);
        assert_eq!(policy.timeout_ms, 60_000);
        assert_eq!(policy.session_ttl, Duration::from_secs(300));
        assert!(policy.user_verification.is_required());
        assert_eq!(
            policy.algorithms,
            [iana::Algorithm::ES256, iana::Algorithm::RS256]
        );
        assert_eq!(policy.validate(), Ok(()));
    }

    #[test]
    fn policy_validation() {
        let short = CeremonyPolicy {
            challenge_len: 8,
            ..Default::default()
        };
        assert_eq!(short.validate(), Err(ConfigError::ChallengeTooShort));

        let eddsa = CeremonyPolicy {
            algorithms: vec![iana::Algorithm::EdDSA],
            ..Default::default()
        };
        assert_eq!(eddsa.validate(), Err(ConfigError::UnsupportedAlgorithm));

        let none = CeremonyPolicy {
            algorithms: Vec::new(),
            ..Default::default()
        };
        assert_eq!(none.validate(), Err(ConfigError::UnsupportedAlgorithm));
    }
}
