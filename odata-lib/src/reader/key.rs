//! Key values recovered from entry identity URIs

use std::borrow::Cow;

use super::convert;
use crate::error::ConversionError;
use crate::error::Error;
use crate::metadata::Catalog;
use crate::metadata::EdmType;
use crate::metadata::EntityType;
use crate::model::Value;
use crate::protocol::literal::from_hex;

/// Returns the key segment of `uri` without its parentheses, scanning from
/// the end so quoted key values may contain `/` or `(`.
fn key_segment(uri: &str) -> Option<&str> {
    let uri = uri.split_once('?').map_or(uri, |(path, _)| path);
    let uri = uri.trim_end_matches('/');
    let body = uri.strip_suffix(')')?;
    let mut quoted = false;
    for (i, c) in body.char_indices().rev() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => return Some(&body[i + 1..]),
            _ => {}
        }
    }
    None
}

/// Splits on `separator` outside of quoted literals.
fn split_unquoted(s: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c == '\'' {
            quoted = !quoted;
        } else if c == separator && !quoted {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Decodes the key values of an entry of `entity_type` from its identity URI
/// (`.../Products(1)`, `.../Order_Details(OrderID=1,ProductID=2)`).
pub(crate) fn decode_key(
    uri: &str,
    entity_type: &EntityType,
    catalog: &Catalog,
) -> Result<Vec<(String, Value)>, Error> {
    let malformed = || Error::parse(format!("Cannot read key from '{}'", uri));
    let segment = key_segment(uri).ok_or_else(malformed)?;
    let key_properties = catalog.key_properties(entity_type);
    if key_properties.is_empty() || segment.is_empty() {
        return Err(malformed());
    }

    let parts = split_unquoted(segment, ',');
    if parts.len() == 1 && key_properties.len() == 1 && split_unquoted(parts[0], '=').len() == 1 {
        let property = key_properties[0];
        let value = key_literal(parts[0], &property.edm_type, catalog)?;
        return Ok(vec![(property.name.clone(), value)]);
    }

    let mut values = Vec::with_capacity(parts.len());
    for part in parts {
        let (name, literal) = match split_unquoted(part, '=').as_slice() {
            [name, literal] => (name.trim(), *literal),
            _ => return Err(malformed()),
        };
        let property = key_properties
            .iter()
            .find(|p| p.name == name)
            .or_else(|| key_properties.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
            .ok_or_else(malformed)?;
        values.push((property.name.clone(), key_literal(literal, &property.edm_type, catalog)?));
    }
    Ok(values)
}

/// Content of a `prefix'...'` literal; `''` inside is unescaped.
fn quoted_content(text: &str) -> Option<String> {
    let start = text.find('\'')?;
    let inner = text[start + 1..].strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

/// Reads a URI key literal in either protocol's syntax.
pub(crate) fn key_literal(text: &str, edm_type: &EdmType, catalog: &Catalog) -> Result<Value, Error> {
    let decoded = urlencoding::decode(text).unwrap_or(Cow::Borrowed(text));
    let text = decoded.trim();
    let fail = || Error::from(ConversionError::new(text, edm_type.to_string()));

    match edm_type {
        EdmType::String => quoted_content(text).map(Value::String).ok_or_else(fail),
        EdmType::Binary => {
            let inner = quoted_content(text).ok_or_else(fail)?;
            match from_hex(&inner) {
                Some(bytes) => Ok(Value::Binary(bytes)),
                None => convert::from_text(&inner, edm_type, Some(catalog)),
            }
        }
        EdmType::Int64 | EdmType::Decimal | EdmType::Single | EdmType::Double => {
            convert::from_text(text, edm_type, Some(catalog)).or_else(|_| {
                let trimmed = text.trim_end_matches(['L', 'l', 'M', 'm', 'D', 'd', 'F', 'f']);
                convert::from_text(trimmed, edm_type, Some(catalog))
            })
        }
        _ => {
            let inner = match text.ends_with('\'') {
                true => quoted_content(text).ok_or_else(fail)?,
                false => text.to_string(),
            };
            convert::from_text(&inner, edm_type, Some(catalog))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::catalog::fixtures::northwind;
    use crate::model::EnumValue;

    fn entity<'a>(catalog: &'a Catalog, name: &str) -> &'a EntityType {
        catalog.entity_type(name).unwrap()
    }

    #[test]
    fn test_single_key() {
        let catalog = northwind();
        let key = decode_key(
            "http://host/svc/Products(1)",
            entity(&catalog, "Product"),
            &catalog,
        )
        .unwrap();
        assert_eq!(key, vec![("ProductID".to_string(), Value::Int(1))]);
    }

    #[test]
    fn test_composite_key() {
        let catalog = northwind();
        let key = decode_key(
            "Order_Details(OrderID=10248,ProductID=11)",
            entity(&catalog, "Order_Detail"),
            &catalog,
        )
        .unwrap();
        assert_eq!(
            key,
            vec![
                ("OrderID".to_string(), Value::Int(10248)),
                ("ProductID".to_string(), Value::Int(11)),
            ]
        );
    }

    #[test]
    fn test_literals() {
        let catalog = northwind();
        assert_eq!(
            key_literal("'O''Brien%20Ltd'", &EdmType::String, &catalog).unwrap(),
            Value::from("O'Brien Ltd")
        );
        assert_eq!(key_literal("42L", &EdmType::Int64, &catalog).unwrap(), Value::Long(42));
        assert_eq!(key_literal("X'0AFF'", &EdmType::Binary, &catalog).unwrap(), Value::Binary(vec![0x0a, 0xff]));
        assert_eq!(
            key_literal(
                "guid'00000000-0000-0000-0000-000000000001'",
                &EdmType::Guid,
                &catalog
            )
            .unwrap()
            .type_name(),
            "guid"
        );
        assert_eq!(
            key_literal(
                "NorthwindModel.Color'Green'",
                &EdmType::Named("NorthwindModel.Color".into()),
                &catalog
            )
            .unwrap(),
            Value::Enum(EnumValue::new("NorthwindModel.Color", "Green", 2))
        );
    }

    #[test]
    fn test_quoted_parenthesis_in_key() {
        assert_eq!(key_segment("Categories('a(b)/c')"), Some("'a(b)/c'"));
        assert_eq!(split_unquoted("A='x,y',B=2", ','), vec!["A='x,y'", "B=2"]);
    }

    #[test]
    fn test_malformed() {
        let catalog = northwind();
        assert!(decode_key("Products", entity(&catalog, "Product"), &catalog).is_err());
        assert!(matches!(
            decode_key("Products('x')", entity(&catalog, "Product"), &catalog),
            Err(Error::Conversion(_))
        ));
    }
}
