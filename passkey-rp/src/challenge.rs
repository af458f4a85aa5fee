use rand::{rngs::OsRng, RngCore};

use crate::EntropyError;

/// Challenges are never shorter than this many bytes, whatever the policy asks for.
pub const MIN_CHALLENGE_LEN: usize = 16;

/// Pluggable source of ceremony challenges.
///
/// Implementations must draw from a cryptographically secure generator and must fail rather than
/// return weaker randomness.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
pub trait ChallengeSource {
    /// Produce `len` fresh random bytes.
    fn new_challenge(&self, len: usize) -> Result<Vec<u8>, EntropyError>;
}

/// Challenges from the operating system's random number generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsChallengeSource;

impl ChallengeSource for OsChallengeSource {
    fn new_challenge(&self, len: usize) -> Result<Vec<u8>, EntropyError> {
        let mut challenge = vec![0; len.max(MIN_CHALLENGE_LEN)];
        OsRng.try_fill_bytes(&mut challenge).map_err(|e| {
            log::error!("operating system RNG failed: {e}");
            EntropyError(e.to_string())
        })?;
        Ok(challenge)
    }
}
