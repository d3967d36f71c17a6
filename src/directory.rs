use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::domain::{OrgId, normalize_org_id};
use crate::error::StatsError;
use crate::store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organisation {
    pub name: String,
    pub country_code: Option<String>,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: BTreeMap<OrgId, Organisation>,
}

#[derive(Debug, Deserialize)]
struct RorRecord {
    id: Option<String>,
    #[serde(default)]
    names: Vec<RorName>,
    name: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    locations: Vec<RorLocation>,
    #[serde(default)]
    addresses: Vec<RorAddress>,
    country: Option<RorCountry>,
}

#[derive(Debug, Deserialize)]
struct RorName {
    value: Option<String>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RorLocation {
    geonames_details: Option<RorGeonames>,
}

#[derive(Debug, Deserialize)]
struct RorGeonames {
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RorAddress {
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RorCountry {
    country_code: Option<String>,
}

impl RorRecord {
    fn country_codes(&self) -> impl Iterator<Item = &str> {
        self.locations
            .iter()
            .filter_map(|loc| loc.geonames_details.as_ref()?.country_code.as_deref())
            .chain(self.addresses.iter().filter_map(|a| a.country_code.as_deref()))
            .chain(self.country.iter().filter_map(|c| c.country_code.as_deref()))
    }

    fn display_name(&self) -> Option<String> {
        self.names
            .iter()
            .find(|n| n.types.iter().any(|t| t == "ror_display"))
            .or_else(|| self.names.first())
            .and_then(|n| n.value.clone())
            .or_else(|| self.name.clone())
            .filter(|name| !name.trim().is_empty())
    }

    fn alias_names(&self) -> Vec<String> {
        let mut aliases = self
            .names
            .iter()
            .filter(|n| n.types.iter().any(|t| t == "alias" || t == "acronym"))
            .filter_map(|n| n.value.clone())
            .collect::<Vec<_>>();
        aliases.extend(self.aliases.iter().cloned());
        aliases
    }
}

impl Directory {
    pub fn load(path: &Path, country: Option<&str>) -> Result<Self, StatsError> {
        let reader = store::open_input(path).map_err(|err| StatsError::DirectoryLoad {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_reader(reader, country).map_err(|message| StatsError::DirectoryLoad {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_reader<R: Read>(reader: R, country: Option<&str>) -> Result<Self, String> {
        let records: Vec<RorRecord> =
            serde_json::from_reader(reader).map_err(|err| err.to_string())?;

        let mut entries = BTreeMap::new();
        let mut rejected = 0usize;
        for record in records {
            let country_code = record.country_codes().next().map(str::to_ascii_uppercase);
            if let Some(wanted) = country {
                if !record.country_codes().any(|cc| cc.eq_ignore_ascii_case(wanted)) {
                    continue;
                }
            }

            let Some(id) = record.id.as_deref().and_then(|id| normalize_org_id(id).ok()) else {
                rejected += 1;
                continue;
            };
            let name = record.display_name().unwrap_or_else(|| id.to_string());
            entries.insert(
                id,
                Organisation {
                    name,
                    country_code,
                    aliases: record.alias_names(),
                },
            );
        }

        if rejected > 0 {
            tracing::warn!(rejected, "organisation records without a usable id");
        }
        tracing::info!(organisations = entries.len(), country = ?country, "loaded organisation directory");
        Ok(Self { entries })
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (OrgId, Organisation)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, org: &OrgId) -> Option<&Organisation> {
        self.entries.get(org)
    }

    pub fn resolve(&self, org: &OrgId) -> Option<&str> {
        self.entries.get(org).map(|entry| entry.name.as_str())
    }

    pub fn display_name(&self, org: &OrgId) -> String {
        self.resolve(org)
            .map(String::from)
            .unwrap_or_else(|| org.to_string())
    }

    pub fn contains(&self, org: &OrgId) -> bool {
        self.entries.contains_key(org)
    }

    pub fn ids(&self) -> impl Iterator<Item = &OrgId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
