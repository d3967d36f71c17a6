use serde_json::Value;

use crate::domain::Source;

pub mod crossref;
pub mod datacite;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorAffiliation {
    pub orcid: Option<String>,
    pub family: Option<String>,
    pub given: Option<String>,
    pub name: Option<String>,
    pub organisations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LicenseRef {
    pub uri: Option<String>,
    pub identifier: Option<String>,
    pub rights: Option<String>,
}

impl LicenseRef {
    pub fn label(&self) -> Option<&str> {
        self.uri
            .as_deref()
            .or(self.identifier.as_deref())
            .or(self.rights.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.label().is_none()
    }
}

pub fn authors(source: Source, payload: &Value) -> Vec<AuthorAffiliation> {
    match source {
        Source::Datacite => datacite::authors(payload),
        Source::Crossref => crossref::authors(payload),
    }
}

pub fn dataset_organisations(source: Source, payload: &Value) -> Vec<String> {
    match source {
        Source::Datacite => datacite::dataset_organisations(payload),
        Source::Crossref => crossref::dataset_organisations(payload),
    }
}

pub fn year(source: Source, payload: &Value) -> Option<i32> {
    match source {
        Source::Datacite => datacite::publication_year(payload),
        Source::Crossref => crossref::issued_year(payload),
    }
}

pub fn title(source: Source, payload: &Value) -> Option<String> {
    match source {
        Source::Datacite => datacite::title(payload),
        Source::Crossref => crossref::title(payload),
    }
}

pub(crate) fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

pub(crate) fn year_value(value: Option<&Value>) -> Option<i32> {
    match value? {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.chars().all(|ch| ch.is_ascii_digit()) {
                s.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

pub(crate) fn one_or_many(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    let items: &[Value] = match value {
        Some(Value::Array(items)) => items.as_slice(),
        Some(other @ (Value::Object(_) | Value::String(_))) => std::slice::from_ref(other),
        _ => &[][..],
    };
    items.iter()
}

pub(crate) fn mentions_ror(value: &str) -> bool {
    value.to_ascii_lowercase().contains("ror.org")
}
