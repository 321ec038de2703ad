//! The static shape of the allocator's pools: which sites exist, and what
//! first octet each (vrf, site) is provisioned under. Grounded on
//! `config/settings.py`'s `SITES` / `NETWORK_SITE_IP_PREFIXES` (spec.md §6).
//! `segment-api`'s `EngineConfig` parses these from the environment and
//! hands a `PoolConfig` down to the Validator; nothing here touches `env`.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    /// Canonical, lowercase site slugs this deployment is allowed to
    /// allocate in.
    sites: Vec<String>,
    /// `(vrf, site)` (case folded as configured) -> required first octet,
    /// from the `vrf:site:octet` config form.
    site_prefixes: HashMap<(String, String), String>,
    /// `site` -> required first octet, from the legacy single-network
    /// `site:octet` config form (`original_source/src/config/settings.py`'s
    /// `SITE_PREFIXES`, which has no VRF dimension at all). Consulted only
    /// when no `(vrf, site)` entry matches.
    legacy_site_prefixes: HashMap<String, String>,
}

impl PoolConfig {
    pub fn new(sites: Vec<String>, site_prefixes: HashMap<(String, String), String>) -> Self {
        Self {
            sites,
            site_prefixes,
            legacy_site_prefixes: HashMap::new(),
        }
    }

    pub fn with_legacy_prefixes(mut self, legacy_site_prefixes: HashMap<String, String>) -> Self {
        self.legacy_site_prefixes = legacy_site_prefixes;
        self
    }

    pub fn contains_site(&self, site: &str) -> bool {
        let site = site.to_lowercase();
        self.sites.iter().any(|s| s.to_lowercase() == site)
    }

    /// The first octet `prefix` must begin with for this (vrf, site), if
    /// the combination is configured at all. Falls back to the legacy
    /// site-only mapping when no exact (vrf, site) entry exists, so a
    /// single-network deployment can configure `SITE_PREFIXES` the way the
    /// original settings module does, without naming a VRF at all.
    pub fn expected_first_octet(&self, vrf: &str, site: &str) -> Option<&str> {
        let site = site.to_lowercase();
        self.site_prefixes
            .get(&(vrf.to_string(), site.clone()))
            .or_else(|| self.legacy_site_prefixes.get(&site))
            .map(|s| s.as_str())
    }

    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    /// Whether `site` has a prefix under any VRF at all (scoped or
    /// legacy). Used at startup to decide whether a configured site is
    /// actually usable before the engine accepts requests for it.
    pub fn site_has_any_prefix(&self, site: &str) -> bool {
        let site = site.to_lowercase();
        self.legacy_site_prefixes.contains_key(&site) || self.site_prefixes.keys().any(|(_, s)| s == &site)
    }
}
