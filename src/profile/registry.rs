use crate::config::Config;
use crate::profile::SiteProfile;
use crate::url::normalize_domain;
use std::collections::HashMap;

/// Read-only lookup of site profiles by normalized domain
#[derive(Debug, Clone)]
pub struct SiteProfileRegistry {
    profiles: HashMap<String, SiteProfile>,
    default_profile: SiteProfile,
}

impl SiteProfileRegistry {
    /// Creates a registry from a default profile and per-site profiles
    ///
    /// Profile domains are normalized on the way in. When two entries
    /// normalize to the same domain the later one wins.
    pub fn new(default_profile: SiteProfile, profiles: Vec<SiteProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| {
                let domain = normalize_domain(&profile.domain);
                (domain.clone(), profile.for_domain(&domain))
            })
            .collect();

        Self {
            profiles,
            default_profile,
        }
    }

    /// Builds the registry from the `[default-profile]` and `[[site]]` sections
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.default_profile.clone(), config.sites.clone())
    }

    /// Resolves the profile for a domain
    ///
    /// The domain is normalized (lower-cased, `www.` stripped) and then
    /// exact-matched. `blog.example.com` does not match an `example.com`
    /// profile. Unmatched domains get the default profile.
    ///
    /// # Arguments
    ///
    /// * `domain` - Host or domain to look up
    ///
    /// # Returns
    ///
    /// The matching profile, or the default profile
    pub fn resolve(&self, domain: &str) -> &SiteProfile {
        let normalized = normalize_domain(domain);
        match self.profiles.get(&normalized) {
            Some(profile) => profile,
            None => {
                tracing::trace!("No site profile for {}, using default", normalized);
                &self.default_profile
            }
        }
    }

    /// Whether a domain has its own profile
    pub fn contains(&self, domain: &str) -> bool {
        self.profiles.contains_key(&normalize_domain(domain))
    }

    pub fn default_profile(&self) -> &SiteProfile {
        &self.default_profile
    }

    /// Configured domains, sorted
    pub fn domains(&self) -> Vec<&str> {
        let mut domains: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        domains.sort_unstable();
        domains
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for SiteProfileRegistry {
    fn default() -> Self {
        Self::new(SiteProfile::generic(), Vec::new())
    }
}
