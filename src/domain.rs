use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{IdentifierKind, StatsError};

pub const ROR_BASE: &str = "https://ror.org/";

static DOI_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:https?://)?(?:www\.|dx\.)?doi\.org/|doi:\s*)").unwrap()
});

static ORCID_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:https?://)?(?:www\.)?orcid\.org/").unwrap());

static ORCID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-?(\d{4})-?(\d{4})-?(\d{3}[0-9X])$").unwrap()
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Datacite,
    Crossref,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Datacite, Source::Crossref];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Datacite => "datacite",
            Source::Crossref => "crossref",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = StatsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "datacite" => Ok(Source::Datacite),
            "crossref" => Ok(Source::Crossref),
            _ => Err(StatsError::InvalidSource(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Doi(String);

impl Doi {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Doi {
    type Err = StatsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        normalize_doi(value)
    }
}

impl TryFrom<String> for Doi {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        normalize_doi(&value)
    }
}

impl From<Doi> for String {
    fn from(value: Doi) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrgId(String);

impl OrgId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn code(&self) -> &str {
        self.0.strip_prefix(ROR_BASE).unwrap_or(&self.0)
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OrgId {
    type Err = StatsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        normalize_org_id(value)
    }
}

impl TryFrom<String> for OrgId {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        normalize_org_id(&value)
    }
}

impl From<OrgId> for String {
    fn from(value: OrgId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonKey(String);

impl PersonKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_orcid(&self) -> bool {
        self.0.starts_with("orcid:")
    }
}

impl fmt::Display for PersonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize_doi(raw: &str) -> Result<Doi, StatsError> {
    let trimmed = raw.trim();
    let stripped = DOI_PREFIX.replace(trimmed, "");
    let normalized = stripped.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(StatsError::invalid(IdentifierKind::Doi, raw));
    }
    Ok(Doi(normalized))
}

pub fn normalize_org_id(raw: &str) -> Result<OrgId, StatsError> {
    let trimmed = raw.trim();
    let code = match trimmed.to_ascii_lowercase().find("ror.org/") {
        Some(idx) => &trimmed[idx + "ror.org/".len()..],
        None => trimmed.rsplit('/').next().unwrap_or_default(),
    };
    let code = code.trim().trim_matches('/').to_ascii_lowercase();
    if code.is_empty() || code.contains(char::is_whitespace) || code.contains('/') {
        return Err(StatsError::invalid(IdentifierKind::Organisation, raw));
    }
    Ok(OrgId(format!("{ROR_BASE}{code}")))
}

pub fn normalize_orcid(raw: &str) -> Result<String, StatsError> {
    let trimmed = raw.trim();
    let stripped = ORCID_PREFIX.replace(trimmed, "");
    let compact = stripped
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    let caps = ORCID
        .captures(&compact)
        .ok_or_else(|| StatsError::invalid(IdentifierKind::Orcid, raw))?;
    Ok(format!("{}-{}-{}-{}", &caps[1], &caps[2], &caps[3], &caps[4]))
}

pub fn normalize_name(family: Option<&str>, given: Option<&str>, name: Option<&str>) -> Option<String> {
    let family = family.map(str::trim).unwrap_or_default();
    let given = given.map(str::trim).unwrap_or_default();
    if !family.is_empty() || !given.is_empty() {
        let key = format!("{},{}", family.to_lowercase(), given.to_lowercase());
        let key = key.trim_matches(',');
        return Some(key.to_string());
    }
    let name = name.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

/// Outcome of resolving an author's identity.
///
/// `rejected_orcid` carries the error of an ORCID that was present but
/// malformed; the key then falls back to the name.
#[derive(Debug)]
pub struct PersonResolution {
    pub key: PersonKey,
    pub rejected_orcid: Option<StatsError>,
}

pub fn normalize_person(
    orcid: Option<&str>,
    family: Option<&str>,
    given: Option<&str>,
    name: Option<&str>,
) -> Result<PersonResolution, StatsError> {
    let mut rejected_orcid = None;
    if let Some(raw) = orcid.filter(|value| !value.trim().is_empty()) {
        match normalize_orcid(raw) {
            Ok(id) => {
                return Ok(PersonResolution {
                    key: PersonKey(format!("orcid:{id}")),
                    rejected_orcid: None,
                });
            }
            Err(err) => rejected_orcid = Some(err),
        }
    }

    match normalize_name(family, given, name) {
        Some(key) => Ok(PersonResolution {
            key: PersonKey(format!("name:{key}")),
            rejected_orcid,
        }),
        None => Err(StatsError::invalid(
            IdentifierKind::Person,
            orcid.unwrap_or_default(),
        )),
    }
}
