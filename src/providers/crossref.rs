use serde_json::Value;

use super::{AuthorAffiliation, LicenseRef, mentions_ror, non_empty, one_or_many, year_value};

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Funder {
    pub doi: String,
    pub name: String,
}

pub fn authors(record: &Value) -> Vec<AuthorAffiliation> {
    one_or_many(record.get("author"))
        .filter(|author| author.is_object())
        .map(|author| AuthorAffiliation {
            orcid: non_empty(author.get("ORCID")),
            family: non_empty(author.get("family")),
            given: non_empty(author.get("given")),
            name: non_empty(author.get("name")),
            organisations: one_or_many(author.get("affiliation"))
                .flat_map(organisation_identifiers)
                .collect(),
        })
        .collect()
}

fn organisation_identifiers(entry: &Value) -> Vec<String> {
    match entry {
        Value::String(text) if mentions_ror(text) => vec![text.trim().to_string()],
        Value::Object(_) => {
            let mut ids = Vec::new();
            for id in one_or_many(entry.get("id")) {
                match id {
                    Value::String(text) if mentions_ror(text) => ids.push(text.trim().to_string()),
                    Value::Object(_) => {
                        let id_type = non_empty(id.get("id-type")).unwrap_or_default();
                        if let Some(value) = non_empty(id.get("id")) {
                            if id_type.eq_ignore_ascii_case("ror") || mentions_ror(&value) {
                                ids.push(value);
                            }
                        }
                    }
                    _ => {}
                }
            }
            if ids.is_empty() {
                if let Some(name) = non_empty(entry.get("name")).filter(|name| mentions_ror(name)) {
                    ids.push(name);
                }
            }
            ids
        }
        _ => Vec::new(),
    }
}

pub fn dataset_organisations(record: &Value) -> Vec<String> {
    one_or_many(record.get("institution"))
        .flat_map(organisation_identifiers)
        .collect()
}

pub fn issued_year(record: &Value) -> Option<i32> {
    year_value(record.pointer("/issued/date-parts/0/0"))
}

pub fn title(record: &Value) -> Option<String> {
    match record.get("title") {
        Some(Value::Array(titles)) => titles.first().and_then(|t| non_empty(Some(t))),
        Some(title @ Value::String(_)) => non_empty(Some(title)),
        _ => None,
    }
}

pub fn member(record: &Value) -> Option<String> {
    match record.get("member") {
        Some(Value::String(member)) => Some(member.clone()),
        Some(Value::Number(member)) => Some(member.to_string()),
        _ => None,
    }
}

pub fn publisher(record: &Value) -> Option<String> {
    non_empty(record.get("publisher"))
}

pub fn licenses(record: &Value) -> Vec<LicenseRef> {
    one_or_many(record.get("license"))
        .map(|entry| match entry {
            Value::String(_) => LicenseRef {
                rights: non_empty(Some(entry)),
                ..LicenseRef::default()
            },
            _ => LicenseRef {
                uri: non_empty(entry.get("URL")),
                ..LicenseRef::default()
            },
        })
        .filter(|license| !license.is_empty())
        .collect()
}

pub fn funders(record: &Value) -> Vec<Funder> {
    one_or_many(record.get("funder"))
        .map(|entry| Funder {
            doi: non_empty(entry.get("DOI")).unwrap_or_default(),
            name: non_empty(entry.get("name")).unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn author_affiliation_ids() {
        let record = json!({
            "author": [
                {
                    "given": "Jana",
                    "family": "Dvořáková",
                    "ORCID": "http://orcid.org/0000-0002-1825-0097",
                    "affiliation": [
                        {"name": "Masaryk University", "id": [{"id": "https://ror.org/02j46qs45", "id-type": "ROR", "asserted-by": "publisher"}]},
                        {"name": "Unidentified institute"}
                    ]
                },
                {"given": "Petr", "family": "Svoboda", "affiliation": [{"name": "https://ror.org/053avzc18"}]}
            ],
            "institution": [{"name": "CESNET", "id": [{"id": "https://ror.org/050dkka69", "id-type": "ROR"}]}]
        });

        let authors = authors(&record);
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[0].organisations, vec!["https://ror.org/02j46qs45".to_string()]);
        assert_eq!(authors[1].organisations, vec!["https://ror.org/053avzc18".to_string()]);
        assert_eq!(
            dataset_organisations(&record),
            vec!["https://ror.org/050dkka69".to_string()]
        );
    }

    #[test]
    fn issued_and_member() {
        let record = json!({
            "issued": {"date-parts": [["2020", 4]]},
            "member": 297,
            "title": ["Measurements"],
            "license": [{"URL": "http://creativecommons.org/licenses/by/4.0/", "content-version": "vor"}]
        });
        assert_eq!(issued_year(&record), Some(2020));
        assert_eq!(member(&record).as_deref(), Some("297"));
        assert_eq!(title(&record).as_deref(), Some("Measurements"));
        assert_eq!(licenses(&record).len(), 1);
    }
}
