use serde_json::Value;

use super::{AuthorAffiliation, LicenseRef, mentions_ror, non_empty, one_or_many, year_value};

const PERSON_FIELDS: [&str; 2] = ["creators", "contributors"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedIdentifier {
    pub relation_type: String,
    pub identifier_type: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Funder {
    pub identifier: String,
    pub identifier_type: String,
    pub name: String,
}

pub fn attributes(record: &Value) -> &Value {
    match record.get("attributes") {
        Some(attrs @ Value::Object(_)) => attrs,
        _ => record,
    }
}

pub fn authors(record: &Value) -> Vec<AuthorAffiliation> {
    let attrs = attributes(record);
    PERSON_FIELDS
        .iter()
        .flat_map(|field| one_or_many(attrs.get(*field)))
        .filter(|person| person.is_object())
        .map(|person| AuthorAffiliation {
            orcid: orcid(person),
            family: non_empty(person.get("familyName")),
            given: non_empty(person.get("givenName")),
            name: non_empty(person.get("name")),
            organisations: one_or_many(person.get("affiliation"))
                .filter_map(affiliation_identifier)
                .collect(),
        })
        .collect()
}

fn orcid(person: &Value) -> Option<String> {
    one_or_many(person.get("nameIdentifiers"))
        .find(|ni| {
            ni.get("nameIdentifierScheme")
                .and_then(Value::as_str)
                .map(|scheme| scheme.eq_ignore_ascii_case("orcid"))
                .unwrap_or(false)
        })
        .and_then(|ni| non_empty(ni.get("nameIdentifier")))
}

fn affiliation_identifier(affiliation: &Value) -> Option<String> {
    match affiliation {
        Value::String(text) => mentions_ror(text).then(|| text.trim().to_string()),
        Value::Object(_) => {
            let identifier = non_empty(affiliation.get("affiliationIdentifier"))
                .or_else(|| non_empty(affiliation.get("id")));
            let scheme = non_empty(affiliation.get("affiliationIdentifierScheme"))
                .unwrap_or_default()
                .to_ascii_lowercase();
            let scheme_uri = non_empty(affiliation.get("schemeUri")).unwrap_or_default();

            match identifier {
                Some(id) if scheme == "ror" || mentions_ror(&scheme_uri) || mentions_ror(&id) => {
                    Some(id)
                }
                Some(_) => None,
                None => non_empty(affiliation.get("name")).filter(|name| mentions_ror(name)),
            }
        }
        _ => None,
    }
}

pub fn dataset_organisations(record: &Value) -> Vec<String> {
    let attrs = attributes(record);
    let mut organisations = Vec::new();

    if let Some(publisher @ Value::Object(_)) = attrs.get("publisher") {
        let scheme = non_empty(publisher.get("publisherIdentifierScheme")).unwrap_or_default();
        if let Some(id) = non_empty(publisher.get("publisherIdentifier")) {
            if scheme.eq_ignore_ascii_case("ror") || mentions_ror(&id) {
                organisations.push(id);
            }
        }
    }

    organisations.extend(one_or_many(attrs.get("affiliations")).filter_map(affiliation_identifier));
    organisations
}

pub fn publication_year(record: &Value) -> Option<i32> {
    year_value(attributes(record).get("publicationYear"))
}

pub fn title(record: &Value) -> Option<String> {
    attributes(record)
        .get("titles")
        .and_then(Value::as_array)
        .and_then(|titles| titles.first())
        .and_then(|first| non_empty(first.get("title")))
}

pub fn client_id(record: &Value) -> Option<String> {
    non_empty(record.pointer("/relationships/client/data/id"))
        .or_else(|| non_empty(attributes(record).get("clientId")))
        .or_else(|| non_empty(attributes(record).get("client-id")))
}

pub fn publisher(record: &Value) -> Option<String> {
    match attributes(record).get("publisher") {
        Some(Value::String(name)) => Some(name.trim().to_string()).filter(|s| !s.is_empty()),
        Some(publisher @ Value::Object(_)) => non_empty(publisher.get("name")),
        _ => None,
    }
}

pub fn resource_type_general(record: &Value) -> Option<String> {
    non_empty(attributes(record).pointer("/types/resourceTypeGeneral"))
}

pub fn rights(record: &Value) -> Vec<LicenseRef> {
    one_or_many(attributes(record).get("rightsList"))
        .map(|entry| LicenseRef {
            uri: non_empty(entry.get("rightsUri")),
            identifier: non_empty(entry.get("rightsIdentifier")),
            rights: non_empty(entry.get("rights")),
        })
        .filter(|license| !license.is_empty())
        .collect()
}

pub fn funders(record: &Value) -> Vec<Funder> {
    one_or_many(attributes(record).get("fundingReferences"))
        .map(|entry| Funder {
            identifier: non_empty(entry.get("funderIdentifier")).unwrap_or_default(),
            identifier_type: non_empty(entry.get("funderIdentifierType")).unwrap_or_default(),
            name: non_empty(entry.get("funderName")).unwrap_or_default(),
        })
        .collect()
}

pub fn related_identifiers(record: &Value) -> Vec<RelatedIdentifier> {
    one_or_many(attributes(record).get("relatedIdentifiers"))
        .filter_map(|entry| {
            Some(RelatedIdentifier {
                relation_type: non_empty(entry.get("relationType"))?,
                identifier_type: non_empty(entry.get("relatedIdentifierType")).unwrap_or_default(),
                identifier: non_empty(entry.get("relatedIdentifier"))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Value {
        json!({
            "id": "10.5281/zenodo.123",
            "attributes": {
                "publicationYear": 2022,
                "titles": [{"title": "Soil samples"}],
                "publisher": {
                    "name": "Charles University",
                    "publisherIdentifier": "https://ror.org/024d6js02",
                    "publisherIdentifierScheme": "ROR"
                },
                "creators": [
                    {
                        "name": "Novák, Jan",
                        "givenName": "Jan",
                        "familyName": "Novák",
                        "nameIdentifiers": [
                            {"nameIdentifier": "https://orcid.org/0000-0001-2345-6789", "nameIdentifierScheme": "ORCID"}
                        ],
                        "affiliation": [
                            {"name": "Charles University", "affiliationIdentifier": "https://ror.org/024d6js02", "affiliationIdentifierScheme": "ROR"},
                            {"name": "Somewhere", "affiliationIdentifier": "grid.1234.5", "affiliationIdentifierScheme": "GRID"},
                            "Plain text affiliation"
                        ]
                    }
                ],
                "contributors": [
                    {"name": "Lab", "affiliation": {"name": "Lab", "affiliationIdentifier": "05x2bcf33", "schemeUri": "https://ror.org/"}}
                ],
                "rightsList": [{"rights": "CC BY 4.0", "rightsUri": "https://creativecommons.org/licenses/by/4.0/"}],
                "relatedIdentifiers": [
                    {"relationType": "IsVersionOf", "relatedIdentifier": "10.5281/zenodo.122", "relatedIdentifierType": "DOI"}
                ]
            },
            "relationships": {"client": {"data": {"id": "cern.zenodo"}}}
        })
    }

    #[test]
    fn authors_keep_only_ror_affiliations() {
        let authors = authors(&sample());
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[0].orcid.as_deref(), Some("https://orcid.org/0000-0001-2345-6789"));
        assert_eq!(authors[0].organisations, vec!["https://ror.org/024d6js02".to_string()]);
        assert_eq!(authors[1].organisations, vec!["05x2bcf33".to_string()]);
    }

    #[test]
    fn publisher_is_dataset_level() {
        let record = sample();
        assert_eq!(dataset_organisations(&record), vec!["https://ror.org/024d6js02".to_string()]);
        assert_eq!(publisher(&record).as_deref(), Some("Charles University"));
    }

    #[test]
    fn scalar_accessors() {
        let record = sample();
        assert_eq!(publication_year(&record), Some(2022));
        assert_eq!(title(&record).as_deref(), Some("Soil samples"));
        assert_eq!(client_id(&record).as_deref(), Some("cern.zenodo"));
        assert_eq!(rights(&record).len(), 1);
        assert_eq!(related_identifiers(&record)[0].relation_type, "IsVersionOf");
    }
}
