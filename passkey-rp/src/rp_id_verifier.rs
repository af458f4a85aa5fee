use url::Url;

use crate::{ConfigError, RelyingPartyConfig};


/// Verifies that a Relying Party ID may be used with an origin before the configuration is
/// published.
///
/// The RP ID must be the origin's effective domain or a parent domain of it, cut at a label
/// boundary, and the origin must use `https` unless it is `localhost` and insecure localhost was
/// explicitly allowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RpIdVerifier {
    allows_insecure_localhost: bool,
}

impl RpIdVerifier {
    /// A verifier that requires `https` everywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows [`RpIdVerifier::assert_domain`] to pass through origins on `localhost`, over plain
    /// `http`.
    pub fn allows_insecure_localhost(mut self, is_allowed: bool) -> Self {
        self.allows_insecure_localhost = is_allowed;
        self
    }

    /// Check a whole configuration: its name, its origin's syntax and the RP ID against the origin.
    pub fn verify_config(&self, config: &RelyingPartyConfig) -> Result<(), ConfigError> {
        if config.rp_name.trim().is_empty() {
            return Err(ConfigError::EmptyRpName);
        }
        let origin = parse_origin(&config.origin)?;
        self.assert_domain(&origin, &config.rp_id).map(|_| ())
    }

    /// Verify the given Relying Party ID against the origin.
    ///
    /// This follows the steps defined in: <https://html.spec.whatwg.org/multipage/browsers.html#is-a-registrable-domain-suffix-of-or-is-equal-to>
    /// without the public suffix list: an RP ID needs at least two labels unless it is `localhost`.
    ///
    /// Returns the RP ID in its ASCII form on success.
    pub fn assert_domain(&self, origin: &Url, rp_id: &str) -> Result<String, ConfigError> {
        let effective_domain = origin.domain().ok_or(ConfigError::OriginMissingDomain)?;
        let rp_id = to_ascii(rp_id).ok_or(ConfigError::InvalidRpId)?;

        if !is_domain_suffix(effective_domain, &rp_id) {
            return Err(ConfigError::OriginRpMissmatch);
        }

        // guard against localhost, return early
        if rp_id == "localhost" {
            return if self.allows_insecure_localhost {
                Ok(rp_id)
            } else {
                Err(ConfigError::InsecureLocalhostNotAllowed)
            };
        }

        if !self.is_valid_rp_id(&rp_id) {
            return Err(ConfigError::InvalidRpId);
        }

        // Make sure origin uses https://
        if !origin.scheme().eq_ignore_ascii_case("https") {
            return Err(ConfigError::UnprotectedOrigin);
        }

        Ok(rp_id)
    }

    /// Assert that an RP ID is acceptable on its own, regardless of any origin.
    ///
    /// 1. An RP ID set to `localhost` is only allowed when explicitly enabled with
    ///    [`Self::allows_insecure_localhost`].
    /// 1. Otherwise it must be a domain name of at least two labels, none of them empty.
    pub fn is_valid_rp_id(&self, rp_id: &str) -> bool {
        let Some(rp_id) = to_ascii(rp_id) else {
            return false;
        };
        if rp_id == "localhost" {
            return self.allows_insecure_localhost;
        }
        let labels: Vec<&str> = rp_id.split('.').collect();
        labels.len() >= 2
            && labels.iter().all(|label| !label.is_empty())
            && labels
                .last()
                .is_some_and(|tld| !tld.chars().all(|c| c.is_ascii_digit()))
    }
}

/// Parse an origin, refusing anything beyond `scheme://host[:port]`.
pub(crate) fn parse_origin(origin: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(origin).map_err(|_| ConfigError::InvalidOrigin)?;
    if url.origin().ascii_serialization() != origin {
        return Err(ConfigError::InvalidOrigin);
    }
    Ok(url)
}

/// Returns the lowercase ASCII (punycode) form of a domain, or `None` if it is not a valid one.
fn to_ascii(domain: &str) -> Option<String> {
    if domain.is_empty() {
        return None;
    }
    idna::domain_to_ascii(domain).ok()
}

/// Whether `rp_id` equals `host` or is one of its parent domains.
fn is_domain_suffix(host: &str, rp_id: &str) -> bool {
    host == rp_id
        || host
            .strip_suffix(rp_id)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
