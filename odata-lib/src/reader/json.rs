//! JSON payloads: modern light, legacy light (`odata.*`) and legacy verbose (`d`)

use serde_json::Map;
use serde_json::Value as Json;

use super::Payload;
use super::ResponseReader;
use super::convert;
use super::push_entry;
use crate::error::Error;
use crate::metadata::EdmType;
use crate::metadata::EntityType;
use crate::model::AssociationLink;
use crate::model::Entry;
use crate::model::EntryAnnotations;
use crate::model::Feed;
use crate::model::FeedAnnotations;
use crate::model::MediaAnnotations;
use crate::model::Value;

type Object = Map<String, Json>;

pub(super) fn read(reader: &ResponseReader<'_>, text: &str) -> Result<Payload, Error> {
    let json: Json = serde_json::from_str(text)
        .map_err(|e| Error::parse_with_body(format!("Invalid JSON response: {}", e), text))?;

    let (root, verbose) = match &json {
        Json::Object(map) if map.len() == 1 && map.contains_key("d") => (&map["d"], true),
        other => (other, false),
    };

    match root {
        // Verbose V1 feeds are bare arrays.
        Json::Array(items) if items.iter().all(Json::is_object) => {
            feed(reader, items, FeedAnnotations::default()).map(Payload::Feed)
        }
        Json::Object(map) => object(reader, map, verbose),
        other => convert::from_json(other, reader.value_type, reader.catalog).map(Payload::Value),
    }
}

fn object(reader: &ResponseReader<'_>, map: &Object, verbose: bool) -> Result<Payload, Error> {
    if let Some(value) = map.get("value").filter(|_| only_annotations_besides(map, "value")) {
        return match value {
            Json::Array(items) if holds_entries(reader, items) => {
                feed(reader, items, feed_annotations(map)).map(Payload::Feed)
            }
            other => convert::from_json(other, reader.value_type, reader.catalog).map(Payload::Value),
        };
    }
    if let Some(Json::Array(items)) = map.get("results") {
        return match holds_entries(reader, items) {
            true => feed(reader, items, feed_annotations(map)).map(Payload::Feed),
            false => convert::from_json(&Json::Array(items.clone()), reader.value_type, reader.catalog)
                .map(Payload::Value),
        };
    }
    // Verbose scalar results: {"d": {"FunctionName": 5}}
    if verbose && map.len() == 1 {
        if let Some(value) = map.values().next().filter(|v| !v.is_object() && !v.is_array()) {
            return convert::from_json(value, reader.value_type, reader.catalog).map(Payload::Value);
        }
    }
    entry(reader, map, reader.entity_type).map(Payload::Entry)
}

fn only_annotations_besides(map: &Object, name: &str) -> bool {
    map.keys().all(|k| k == name || convert::is_annotation(k))
}

/// Decides whether an array is a list of entries rather than a collection
/// value (complex or primitive).
fn holds_entries(reader: &ResponseReader<'_>, items: &[Json]) -> bool {
    if !items.iter().all(Json::is_object) {
        return false;
    }
    match (reader.value_type.map(EdmType::element_type), reader.catalog) {
        (Some(EdmType::Named(name)), Some(catalog)) => catalog.complex_type(name).is_none(),
        (Some(element), _) => !element.is_primitive(),
        _ => true,
    }
}

fn feed(reader: &ResponseReader<'_>, items: &[Json], annotations: FeedAnnotations) -> Result<Feed, Error> {
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        if let Json::Object(map) = item {
            push_entry(&mut entries, entry(reader, map, reader.entity_type)?);
        }
    }
    Ok(Feed::new(entries).with_annotations(annotations))
}

/// Looks up `@odata.<name>` or its legacy light form `odata.<name>`.
fn annotation<'j>(map: &'j Object, name: &str) -> Option<&'j Json> {
    map.get(&format!("@odata.{}", name))
        .or_else(|| map.get(&format!("odata.{}", name)))
}

fn text(json: Option<&Json>) -> Option<String> {
    json.and_then(Json::as_str).map(str::to_string)
}

fn count(json: Option<&Json>) -> Option<i64> {
    match json? {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn feed_annotations(map: &Object) -> FeedAnnotations {
    FeedAnnotations {
        id: text(annotation(map, "id")),
        count: count(annotation(map, "count")).or_else(|| count(map.get("__count"))),
        next_link: text(annotation(map, "nextLink")).or_else(|| text(map.get("__next"))),
        delta_link: text(annotation(map, "deltaLink")),
    }
}

fn entry_annotations(map: &Object) -> EntryAnnotations {
    let metadata = map.get("__metadata").and_then(Json::as_object);
    let meta = |name: &str| text(metadata.and_then(|m| m.get(name)));

    let media = MediaAnnotations {
        read_link: text(annotation(map, "mediaReadLink")).or_else(|| meta("media_src")),
        edit_link: text(annotation(map, "mediaEditLink")).or_else(|| meta("edit_media")),
        content_type: text(annotation(map, "mediaContentType")).or_else(|| meta("content_type")),
        etag: text(annotation(map, "mediaEtag")).or_else(|| meta("media_etag")),
    };

    let mut annotations = EntryAnnotations {
        id: text(annotation(map, "id")).or_else(|| meta("id")).or_else(|| meta("uri")),
        type_name: text(annotation(map, "type"))
            .or_else(|| meta("type"))
            .map(|t| t.trim_start_matches('#').to_string()),
        edit_link: text(annotation(map, "editLink")).or_else(|| meta("uri")),
        read_link: text(annotation(map, "readLink")),
        etag: text(annotation(map, "etag")).or_else(|| meta("etag")),
        association_links: Vec::new(),
        media: (media != MediaAnnotations::default()).then_some(media),
    };

    for (key, value) in map {
        let Some((navigation, kind)) = key.split_once('@') else {
            continue;
        };
        let kind = kind.trim_start_matches("odata.");
        let link = text(Some(value));
        let entry = AssociationLink {
            name: navigation.to_string(),
            ..Default::default()
        };
        let entry = match kind {
            "navigationLink" | "navigationLinkUrl" => AssociationLink {
                navigation_link: link,
                ..entry
            },
            "associationLink" | "associationLinkUrl" => AssociationLink {
                association_link: link,
                ..entry
            },
            _ => continue,
        };
        annotations.merge(EntryAnnotations {
            association_links: vec![entry],
            ..Default::default()
        });
    }
    annotations
}

fn entry<'a>(
    reader: &ResponseReader<'a>,
    map: &Object,
    fallback: Option<&'a EntityType>,
) -> Result<Entry, Error> {
    let mut annotations = entry_annotations(map);
    let entity_type = reader.entity_type_for(annotations.type_name.as_deref(), fallback);
    let mut entry = Entry::new();

    for (key, value) in map {
        if convert::is_annotation(key) {
            continue;
        }
        // Deferred (not expanded) associations only publish their link.
        if let Some(uri) = value
            .get("__deferred")
            .and_then(|d| d.get("uri"))
            .and_then(Json::as_str)
        {
            annotations.merge(EntryAnnotations {
                association_links: vec![AssociationLink {
                    name: key.clone(),
                    navigation_link: Some(uri.to_string()),
                    association_link: None,
                }],
                ..Default::default()
            });
            continue;
        }

        let value = match reader.navigation(entity_type, key) {
            Some((_, target)) => related(reader, value, target)?,
            None => match reader.property_type(entity_type, key) {
                Some(edm_type) => convert::from_json(value, Some(edm_type), reader.catalog)?,
                None => undeclared(reader, value)?,
            },
        };
        entry.insert(key.clone(), value);
    }

    entry.merge_annotations(annotations);
    reader.complete_key(&mut entry, entity_type)?;
    Ok(entry)
}

/// Reads an expanded association: an object is one related entry, an array
/// (or verbose `results`) is a list.
fn related<'a>(reader: &ResponseReader<'a>, value: &Json, target: Option<&'a EntityType>) -> Result<Value, Error> {
    match value {
        Json::Null => Ok(Value::Null),
        Json::Array(items) => entries(reader, items, target),
        Json::Object(map) => match map.get("results") {
            Some(Json::Array(items)) => entries(reader, items, target),
            _ => Ok(Value::Entry(Box::new(entry(reader, map, target)?))),
        },
        other => Err(Error::parse(format!("Unexpected navigation value: {}", other))),
    }
}

fn entries<'a>(reader: &ResponseReader<'a>, items: &[Json], target: Option<&'a EntityType>) -> Result<Value, Error> {
    let mut list = Vec::with_capacity(items.len());
    for item in items {
        if let Json::Object(map) = item {
            push_entry(&mut list, entry(reader, map, target)?);
        }
    }
    Ok(Value::Entries(list))
}

/// Values without catalog information: objects carrying entry annotations
/// are read as entries, everything else as plain values.
fn undeclared(reader: &ResponseReader<'_>, value: &Json) -> Result<Value, Error> {
    let looks_like_entry = |json: &Json| {
        json.as_object()
            .is_some_and(|m| m.contains_key("__metadata") || annotation(m, "id").is_some())
    };
    match value {
        Json::Object(map) if looks_like_entry(value) => {
            Ok(Value::Entry(Box::new(entry(reader, map, None)?)))
        }
        Json::Object(map)
            if map
                .get("results")
                .and_then(Json::as_array)
                .is_some_and(|items| items.iter().all(looks_like_entry)) =>
        {
            related(reader, value, None)
        }
        Json::Array(items) if !items.is_empty() && items.iter().all(looks_like_entry) => {
            entries(reader, items, None)
        }
        other => Ok(convert::untyped(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Catalog;
    use crate::metadata::catalog::fixtures::northwind;
    use rust_decimal::Decimal;

    fn typed<'a>(catalog: &'a Catalog, entity: &str) -> ResponseReader<'a> {
        ResponseReader::new()
            .with_catalog(catalog)
            .with_entity_type(catalog.entity_type(entity).unwrap())
    }

    #[test]
    fn test_v4_feed_with_annotations() {
        let catalog = northwind();
        let body = r#"{
            "@odata.context": "http://host/svc/$metadata#Products",
            "@odata.count": 2,
            "@odata.nextLink": "http://host/svc/Products?$skip=1",
            "value": [
                {
                    "@odata.id": "http://host/svc/Products(1)",
                    "@odata.etag": "W/\"1\"",
                    "ProductID": 1,
                    "ProductName": "Chai",
                    "UnitPrice": 18.0,
                    "Category@odata.navigationLink": "Products(1)/Category"
                }
            ]
        }"#;
        let feed = typed(&catalog, "Product").read(body.as_bytes()).unwrap().into_feed();

        assert_eq!(feed.total_count(), Some(2));
        assert_eq!(feed.next_link(), Some("http://host/svc/Products?$skip=1"));
        let entry = &feed.entries()[0];
        assert_eq!(entry.get("UnitPrice"), Some(&Value::Decimal(Decimal::new(18, 0))));
        assert_eq!(entry.etag(), Some("W/\"1\""));
        let link = entry.annotations().unwrap().association("Category").unwrap();
        assert_eq!(link.navigation_link.as_deref(), Some("Products(1)/Category"));
    }

    #[test]
    fn test_key_recovered_from_identity() {
        let catalog = northwind();
        let body = r#"{"@odata.id":"http://host/svc/Products(7)","ProductName":"Tofu"}"#;
        let entry = typed(&catalog, "Product").read(body.as_bytes()).unwrap().into_entry().unwrap();
        assert_eq!(entry.get("ProductID"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_v3_verbose_feed() {
        let catalog = northwind();
        let body = r#"{"d": {
            "__count": "10",
            "__next": "Categories?$skiptoken=1",
            "results": [{
                "__metadata": {"uri": "http://host/svc/Categories(1)", "type": "NorthwindModel.Category", "etag": "W/\"x\""},
                "CategoryName": "Beverages",
                "Products": {"__deferred": {"uri": "http://host/svc/Categories(1)/Products"}}
            }]
        }}"#;
        let feed = typed(&catalog, "Category").read(body.as_bytes()).unwrap().into_feed();

        assert_eq!(feed.total_count(), Some(10));
        assert_eq!(feed.next_link(), Some("Categories?$skiptoken=1"));
        let entry = &feed.entries()[0];
        assert_eq!(entry.get("CategoryID"), Some(&Value::Int(1)));
        assert!(!entry.contains("Products"));
        let annotations = entry.annotations().unwrap();
        assert_eq!(annotations.type_name.as_deref(), Some("NorthwindModel.Category"));
        assert_eq!(
            annotations.association("Products").unwrap().navigation_link.as_deref(),
            Some("http://host/svc/Categories(1)/Products")
        );
    }

    #[test]
    fn test_expanded_associations() {
        let catalog = northwind();
        let body = r#"{
            "EmployeeID": 1,
            "LastName": "Davolio",
            "Superior": {"EmployeeID": 2, "LastName": "Fuller"},
            "Subordinates": [{"EmployeeID": 3}, {"EmployeeID": 4}]
        }"#;
        let entry = typed(&catalog, "Employee").read(body.as_bytes()).unwrap().into_entry().unwrap();

        let Some(Value::Entry(superior)) = entry.get("Superior") else {
            panic!("expected a single related entry");
        };
        assert_eq!(superior.get("LastName"), Some(&Value::from("Fuller")));
        let Some(Value::Entries(subordinates)) = entry.get("Subordinates") else {
            panic!("expected a related list");
        };
        assert_eq!(subordinates.len(), 2);
    }

    #[test]
    fn test_v3_light_prefixes() {
        let body = r#"{"odata.metadata":"x","odata.count":"3","value":[{"odata.id":"P(1)","odata.editLink":"P(1)","A":1}]}"#;
        let feed = ResponseReader::new().read(body.as_bytes()).unwrap().into_feed();
        assert_eq!(feed.total_count(), Some(3));
        assert_eq!(feed.entries()[0].id(), Some("P(1)"));
    }

    #[test]
    fn test_scalar_results() {
        let body = br#"{"@odata.context":"x#Edm.Int32","value":42}"#;
        let entry = ResponseReader::new().read(body).unwrap().into_entry().unwrap();
        assert_eq!(entry.get(crate::reader::RESULT_FIELD), Some(&Value::Int(42)));

        let verbose = br#"{"d":{"GetCount":5}}"#;
        assert_eq!(ResponseReader::new().read(verbose).unwrap().into_value(), Value::Int(5));
    }

    #[test]
    fn test_annotations_can_be_dropped() {
        let body = br#"{"value":[{"@odata.id":"P(1)","@odata.etag":"1","A":1}],"@odata.count":1}"#;
        let feed = ResponseReader::new()
            .with_annotations(false)
            .read(body)
            .unwrap()
            .into_feed();
        assert_eq!(feed.total_count(), None);
        assert!(feed.entries()[0].annotations().is_none());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ResponseReader::new().read(b"{not json"),
            Err(Error::Parse { .. })
        ));
    }
}
