//! Atom XML payloads

use std::collections::HashMap;

use roxmltree::Document;
use roxmltree::Node;

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

pub(super) fn read(reader: &ResponseReader<'_>, text: &str) -> Result<Payload, Error> {
    let document = Document::parse(text)
        .map_err(|e| Error::parse_with_body(format!("Invalid XML response: {}", e), text))?;
    let root = document.root_element();
    match root.tag_name().name() {
        "feed" => feed(reader, root, reader.entity_type).map(Payload::Feed),
        "entry" => entry(reader, root, reader.entity_type).map(Payload::Entry),
        "error" => Err(Error::parse_with_body("Response is an error document", text)),
        _ => property(reader, root, reader.value_type).map(Payload::Value),
    }
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|n| n.tag_name().name() == name)
}

/// Attribute by local name, whatever its namespace (`m:null`, `m:type`).
fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes().find(|a| a.name() == name).map(|a| a.value())
}

fn text(node: Node<'_, '_>) -> Option<String> {
    node.text().map(|t| t.trim().to_string())
}

/// Navigation name of a `.../related/<Name>` style link relation.
fn relation<'r>(rel: &'r str, kind: &str) -> Option<&'r str> {
    let (_, name) = rel.rsplit_once(kind)?;
    (!name.is_empty() && !name.contains('/')).then_some(name)
}

fn feed<'a>(reader: &ResponseReader<'a>, node: Node<'_, '_>, entity_type: Option<&'a EntityType>) -> Result<Feed, Error> {
    let mut annotations = FeedAnnotations::default();
    let mut entries = Vec::new();
    for element in elements(node) {
        match element.tag_name().name() {
            "id" => annotations.id = text(element),
            "count" => annotations.count = text(element).and_then(|t| t.parse().ok()),
            "link" => match attr(element, "rel") {
                Some("next") => annotations.next_link = attr(element, "href").map(str::to_string),
                Some(rel) if rel.ends_with("delta") || rel.ends_with("deltaLink") => {
                    annotations.delta_link = attr(element, "href").map(str::to_string)
                }
                _ => {}
            },
            "entry" => push_entry(&mut entries, entry(reader, element, entity_type)?),
            _ => {}
        }
    }
    Ok(Feed::new(entries).with_annotations(annotations))
}

fn entry<'a>(reader: &ResponseReader<'a>, node: Node<'_, '_>, fallback: Option<&'a EntityType>) -> Result<Entry, Error> {
    let mut annotations = EntryAnnotations {
        etag: attr(node, "etag").map(str::to_string),
        ..Default::default()
    };
    let mut media = MediaAnnotations::default();
    let mut properties = None;
    let mut inline = Vec::new();

    for element in elements(node) {
        match element.tag_name().name() {
            "id" => annotations.id = text(element),
            "category" => {
                annotations.type_name = attr(element, "term").map(|t| t.trim_start_matches('#').to_string())
            }
            "link" => {
                let rel = attr(element, "rel").unwrap_or_default();
                let href = attr(element, "href").map(str::to_string);
                match rel {
                    "edit" => annotations.edit_link = href,
                    "self" => annotations.read_link = href,
                    "edit-media" => {
                        media.edit_link = href;
                        media.etag = attr(element, "etag").map(str::to_string);
                    }
                    _ => {
                        if let Some(name) = relation(rel, "/related/") {
                            annotations.association_links.push(AssociationLink {
                                name: name.to_string(),
                                navigation_link: href,
                                association_link: None,
                            });
                            if let Some(content) = child(element, "inline") {
                                inline.push((name, content, attr(element, "type")));
                            }
                        } else if let Some(name) = relation(rel, "/relatedlinks/") {
                            annotations.merge(EntryAnnotations {
                                association_links: vec![AssociationLink {
                                    name: name.to_string(),
                                    navigation_link: None,
                                    association_link: href,
                                }],
                                ..Default::default()
                            });
                        }
                    }
                }
            }
            "content" => match attr(element, "src") {
                Some(src) => {
                    media.read_link = Some(src.to_string());
                    media.content_type = attr(element, "type").map(str::to_string);
                }
                None => properties = child(element, "properties").or(properties),
            },
            // Media-link entries carry their properties beside the content.
            "properties" => properties = Some(element),
            _ => {}
        }
    }

    if media != MediaAnnotations::default() {
        annotations.media = Some(media);
    }
    let entity_type = reader.entity_type_for(annotations.type_name.as_deref(), fallback);

    let mut record = Entry::new();
    if let Some(properties) = properties {
        for element in elements(properties) {
            let name = element.tag_name().name();
            let declared = reader.property_type(entity_type, name);
            record.insert(name, property(reader, element, declared)?);
        }
    }
    for (name, content, link_type) in inline {
        let target = reader.navigation(entity_type, name);
        let value = match child(content, "feed").or_else(|| child(content, "entry")) {
            Some(node) if node.tag_name().name() == "feed" => {
                Value::Entries(feed(reader, node, target.and_then(|t| t.1))?.into_entries())
            }
            Some(node) => Value::Entry(Box::new(entry(reader, node, target.and_then(|t| t.1))?)),
            None => {
                let many = match target {
                    Some((navigation, _)) => navigation.is_collection(),
                    None => link_type.is_some_and(|t| t.contains("type=feed")),
                };
                if many { Value::Entries(Vec::new()) } else { Value::Null }
            }
        };
        record.insert(name, value);
    }

    record.merge_annotations(annotations);
    reader.complete_key(&mut record, entity_type)?;
    Ok(record)
}

/// Reads a `d:` property element: null, collection (`element` children),
/// complex (other children) or a primitive text value.
fn property(reader: &ResponseReader<'_>, node: Node<'_, '_>, declared: Option<&EdmType>) -> Result<Value, Error> {
    if attr(node, "null") == Some("true") {
        return Ok(Value::Null);
    }
    let wire = attr(node, "type").and_then(|t| t.parse::<EdmType>().ok());
    let edm_type = declared.or(wire.as_ref());
    let children: Vec<_> = elements(node).collect();

    let is_collection = matches!(edm_type, Some(EdmType::Collection(_)))
        || (!children.is_empty() && children.iter().all(|c| c.tag_name().name() == "element"));
    if is_collection {
        let item_type = match edm_type {
            Some(EdmType::Collection(inner)) => Some(inner.as_ref()),
            _ => None,
        };
        return children
            .into_iter()
            .map(|c| property(reader, c, item_type))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Collection);
    }

    if !children.is_empty() {
        let members = match (edm_type, reader.catalog) {
            (Some(EdmType::Named(name)), Some(catalog)) => catalog
                .complex_type(name)
                .map(|c| catalog.complex_properties(c))
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let mut fields = HashMap::new();
        for element in children {
            let name = element.tag_name().name();
            let declared = members.iter().find(|p| p.name == name).map(|p| &p.edm_type);
            fields.insert(name.to_string(), property(reader, element, declared)?);
        }
        return Ok(Value::Complex(fields));
    }

    let text = node.text().unwrap_or_default();
    match edm_type {
        Some(edm_type) => convert::from_text(text, edm_type, reader.catalog),
        None => Ok(Value::String(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::catalog::fixtures::northwind;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xml:base="http://host/svc/" xmlns="http://www.w3.org/2005/Atom"
      xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
      xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <id>http://host/svc/Categories</id>
  <m:count>8</m:count>
  <entry m:etag="W/&quot;3&quot;">
    <id>http://host/svc/Categories(1)</id>
    <category term="NorthwindModel.Category" scheme="http://schemas.microsoft.com/ado/2007/08/dataservices/scheme" />
    <link rel="edit" title="Category" href="Categories(1)" />
    <link rel="http://schemas.microsoft.com/ado/2007/08/dataservices/related/Products" type="application/atom+xml;type=feed" title="Products" href="Categories(1)/Products">
      <m:inline>
        <feed>
          <entry>
            <id>http://host/svc/Products(1)</id>
            <content type="application/xml">
              <m:properties>
                <d:ProductName>Chai</d:ProductName>
                <d:UnitPrice m:type="Edm.Decimal">18.0000</d:UnitPrice>
              </m:properties>
            </content>
          </entry>
        </feed>
      </m:inline>
    </link>
    <link rel="http://schemas.microsoft.com/ado/2007/08/dataservices/relatedlinks/Products" href="Categories(1)/$links/Products" />
    <content type="application/xml">
      <m:properties>
        <d:CategoryName>Beverages</d:CategoryName>
        <d:Picture m:null="true" />
      </m:properties>
    </content>
  </entry>
  <link rel="next" href="Categories?$skiptoken=1" />
</feed>"#;

    #[test]
    fn test_feed() {
        let catalog = northwind();
        let reader = ResponseReader::new().with_catalog(&catalog);
        let feed = reader.read(FEED.as_bytes()).unwrap().into_feed();

        assert_eq!(feed.total_count(), Some(8));
        assert_eq!(feed.next_link(), Some("Categories?$skiptoken=1"));
        assert_eq!(feed.annotations().id.as_deref(), Some("http://host/svc/Categories"));

        let category = &feed.entries()[0];
        assert_eq!(category.get("CategoryID"), Some(&Value::Int(1)));
        assert_eq!(category.get("CategoryName"), Some(&Value::from("Beverages")));
        assert_eq!(category.get("Picture"), Some(&Value::Null));
        assert_eq!(category.etag(), Some("W/\"3\""));

        let link = category.annotations().unwrap().association("Products").unwrap();
        assert_eq!(link.navigation_link.as_deref(), Some("Categories(1)/Products"));
        assert_eq!(link.association_link.as_deref(), Some("Categories(1)/$links/Products"));

        let Some(Value::Entries(products)) = category.get("Products") else {
            panic!("expected inline products");
        };
        assert_eq!(products[0].get("ProductID"), Some(&Value::Int(1)));
        assert_eq!(
            products[0].get("UnitPrice").map(Value::type_name),
            Some("decimal")
        );
    }

    #[test]
    fn test_media_entry_and_collections() {
        let body = r#"<entry xmlns="http://www.w3.org/2005/Atom"
              xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
              xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
          <id>http://host/svc/Photos(5)</id>
          <link rel="edit-media" href="Photos(5)/$value" m:etag="W/&quot;m&quot;" />
          <content type="image/png" src="Photos(5)/$value" />
          <m:properties>
            <d:Tags m:type="Collection(Edm.String)"><d:element>a</d:element><d:element>b</d:element></d:Tags>
            <d:Size m:type="Edm.Int32">12</d:Size>
          </m:properties>
        </entry>"#;
        let entry = ResponseReader::new().read(body.as_bytes()).unwrap().into_entry().unwrap();

        let media = entry.annotations().unwrap().media.as_ref().unwrap();
        assert_eq!(media.read_link.as_deref(), Some("Photos(5)/$value"));
        assert_eq!(media.content_type.as_deref(), Some("image/png"));
        assert_eq!(media.etag.as_deref(), Some("W/\"m\""));
        assert_eq!(
            entry.get("Tags"),
            Some(&Value::Collection(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(entry.get("Size"), Some(&Value::Int(12)));
    }

    #[test]
    fn test_empty_inline_uses_multiplicity() {
        let catalog = northwind();
        let body = r#"<entry xmlns="http://www.w3.org/2005/Atom"
              xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
          <id>http://host/svc/Products(1)</id>
          <category term="NorthwindModel.Product" />
          <link rel="http://schemas.microsoft.com/ado/2007/08/dataservices/related/Category" href="Products(1)/Category"><m:inline /></link>
          <link rel="http://schemas.microsoft.com/ado/2007/08/dataservices/related/Order_Details" href="Products(1)/Order_Details"><m:inline /></link>
        </entry>"#;
        let entry = ResponseReader::new()
            .with_catalog(&catalog)
            .read(body.as_bytes())
            .unwrap()
            .into_entry()
            .unwrap();
        assert_eq!(entry.get("Category"), Some(&Value::Null));
        assert_eq!(entry.get("Order_Details"), Some(&Value::Entries(Vec::new())));
    }

    #[test]
    fn test_scalar_document() {
        let body = r#"<d:GetCount xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
            xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata" m:type="Edm.Int32">5</d:GetCount>"#;
        assert_eq!(ResponseReader::new().read(body.as_bytes()).unwrap().into_value(), Value::Int(5));
    }

    #[test]
    fn test_bad_literal_is_conversion_error() {
        let body = r#"<entry xmlns="http://www.w3.org/2005/Atom"
              xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
              xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
          <m:properties><d:Size m:type="Edm.Int32">big</d:Size></m:properties>
        </entry>"#;
        assert!(matches!(
            ResponseReader::new().read(body.as_bytes()),
            Err(Error::Conversion(_))
        ));
    }
}
