//! Environment-driven configuration for the allocator, loaded the way
//! `net-migration::config::MigrationConfig::load_with_defaults` loads
//! overrides: defaults computed, then environment variables applied via the
//! `config` crate's `Environment` source, then validated — a missing
//! `(vrf, site)` prefix entry for any configured site aborts boot (spec.md
//! §6), mirroring `config/settings.py::validate_site_prefixes`'s
//! fail-fast behavior.

use segment_validate::PoolConfig;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("missing required setting: {0}")]
    MissingField(String),

    #[error("malformed SITE_PREFIXES entry '{0}', expected 'vrf:site:octet' or legacy 'site:octet'")]
    MalformedSitePrefix(String),

    #[error("sites {missing:?} have no configured IP prefix (configured sites: {sites:?}); set SITE_PREFIXES or NETWORK_SITE_PREFIXES")]
    MissingSitePrefixes { missing: Vec<String>, sites: Vec<String> },
}

/// Raw, string-typed settings as read from the environment, before the
/// comma/colon-separated fields are parsed into their structured forms.
#[derive(Debug, Deserialize, Default)]
struct RawSettings {
    ipam_url: Option<String>,
    ipam_token: Option<String>,
    ipam_ssl_verify: Option<bool>,
    sites: Option<String>,
    site_prefixes: Option<String>,
    network_site_prefixes: Option<String>,
    tenant_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub ipam_url: String,
    pub ipam_token: String,
    pub ipam_ssl_verify: bool,
    pub tenant_name: String,
    pub pool_config: PoolConfig,
}

impl EngineConfig {
    /// Loads from the process environment (`IPAM_URL`, `IPAM_TOKEN`,
    /// `IPAM_SSL_VERIFY`, `SITES`, `SITE_PREFIXES`/`NETWORK_SITE_PREFIXES`,
    /// `TENANT_NAME`) and validates that every configured site has at least
    /// one IP prefix entry.
    pub fn load_with_defaults() -> Result<Self, ConfigError> {
        let settings = config::Config::builder().add_source(config::Environment::default()).build()?;
        let raw: RawSettings = settings.try_deserialize()?;

        let ipam_url = raw.ipam_url.ok_or_else(|| ConfigError::MissingField("IPAM_URL".into()))?;
        let ipam_token = raw.ipam_token.ok_or_else(|| ConfigError::MissingField("IPAM_TOKEN".into()))?;
        let ipam_ssl_verify = raw.ipam_ssl_verify.unwrap_or(true);
        let tenant_name = raw.tenant_name.ok_or_else(|| ConfigError::MissingField("TENANT_NAME".into()))?;

        let sites: Vec<String> = raw
            .sites
            .unwrap_or_else(|| "site1,site2,site3".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let prefixes_env = raw.site_prefixes.or(raw.network_site_prefixes).unwrap_or_else(|| "site1:192,site2:193,site3:194".to_string());
        let (site_prefixes, legacy_site_prefixes) = parse_site_prefixes(&prefixes_env)?;

        let pool_config = PoolConfig::new(sites.clone(), site_prefixes).with_legacy_prefixes(legacy_site_prefixes);

        let missing: Vec<String> = sites.iter().filter(|site| !pool_config.site_has_any_prefix(site)).cloned().collect();
        if !missing.is_empty() {
            log::error!("CRITICAL CONFIGURATION ERROR: sites {missing:?} are missing IP prefixes");
            return Err(ConfigError::MissingSitePrefixes { missing, sites });
        }

        Ok(Self {
            ipam_url,
            ipam_token,
            ipam_ssl_verify,
            tenant_name,
            pool_config,
        })
    }
}

type ParsedPrefixes = (HashMap<(String, String), String>, HashMap<String, String>);

fn parse_site_prefixes(raw: &str) -> Result<ParsedPrefixes, ConfigError> {
    let mut scoped = HashMap::new();
    let mut legacy = HashMap::new();

    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        match parts.as_slice() {
            [vrf, site, octet] => {
                scoped.insert((vrf.to_string(), site.to_lowercase()), octet.to_string());
            }
            [site, octet] => {
                legacy.insert(site.to_lowercase(), octet.to_string());
            }
            _ => return Err(ConfigError::MalformedSitePrefix(entry.to_string())),
        }
    }
    Ok((scoped, legacy))
}
