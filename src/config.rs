use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::OrgId;
use crate::error::StatsError;

pub const DEFAULT_CONFIG_FILE: &str = "cz-ds.json";
pub const DEFAULT_COUNTRY: &str = "CZ";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub organisations: Vec<OrganisationEntry>,
    #[serde(default)]
    pub open_license_tokens: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OrganisationEntry {
    Shorthand(String),
    Detailed(OrganisationEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OrganisationEntryObject {
    pub id: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub country: Option<String>,
    pub organisations: BTreeSet<OrgId>,
    pub open_license_tokens: Vec<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            country: Some(DEFAULT_COUNTRY.to_string()),
            organisations: BTreeSet::new(),
            open_license_tokens: Vec::new(),
        }
    }
}

impl ResolvedConfig {
    pub fn allow_set(&self) -> Option<&BTreeSet<OrgId>> {
        (!self.organisations.is_empty()).then_some(&self.organisations)
    }
}

pub fn country_filter(value: Option<&str>) -> Option<String> {
    match value.map(str::trim) {
        None | Some("") => Some(DEFAULT_COUNTRY.to_string()),
        Some("*") => None,
        Some(code) => Some(code.to_ascii_uppercase()),
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&Path>) -> Result<ResolvedConfig, StatsError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            tracing::debug!("no config file, using defaults");
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| StatsError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| StatsError::ConfigParse(err.to_string()))?;

        tracing::debug!(path = %config_path.display(), "loaded config");
        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, StatsError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let country = country_filter(config.country.as_deref());

        let organisations = config
            .organisations
            .into_iter()
            .map(|entry| match entry {
                OrganisationEntry::Shorthand(value) => value.parse(),
                OrganisationEntry::Detailed(obj) => obj.id.parse(),
            })
            .collect::<Result<BTreeSet<OrgId>, StatsError>>()?;

        let open_license_tokens = config
            .open_license_tokens
            .into_iter()
            .map(|token| token.trim().to_lowercase())
            .filter(|token| !token.is_empty())
            .collect();

        Ok(ResolvedConfig {
            schema_version,
            country,
            organisations,
            open_license_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_shorthand() {
        let config = Config {
            organisations: vec![
                OrganisationEntry::Shorthand("024d6js02".to_string()),
                OrganisationEntry::Detailed(OrganisationEntryObject {
                    id: "https://ror.org/02j46qs45".to_string(),
                    note: Some("Masaryk".to_string()),
                }),
            ],
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.country.as_deref(), Some("CZ"));
        assert_eq!(resolved.organisations.len(), 2);
        assert!(resolved.allow_set().is_some());
    }

    #[test]
    fn wildcard_country_keeps_all() {
        let config = Config {
            country: Some("*".to_string()),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.country, None);
        assert!(resolved.allow_set().is_none());
    }

    #[test]
    fn blank_country_falls_back() {
        assert_eq!(country_filter(Some("  ")).as_deref(), Some("CZ"));
        assert_eq!(country_filter(None).as_deref(), Some("CZ"));
        assert_eq!(country_filter(Some("sk")).as_deref(), Some("SK"));
        assert_eq!(country_filter(Some(" * ")), None);
    }
}
