//! Response reader
//!
//! Turns a response body into annotated entries. Both JSON families (the
//! modern light format, legacy verbose `d` payloads and legacy light
//! `odata.*` payloads) and Atom XML are accepted; the format is detected
//! from the body itself.
//!
//! When a catalog is supplied, property values are converted by their
//! declared types and key values missing from the payload are recovered
//! from each entry's identity URI.

mod atom;
mod convert;
mod json;
mod key;

use crate::error::Error;
use crate::metadata::Catalog;
use crate::metadata::EdmType;
use crate::metadata::EntityType;
use crate::metadata::NavigationProperty;
use crate::model::Entry;
use crate::model::Feed;
use crate::model::Value;

/// Field name of the synthetic entry wrapping a scalar response.
pub const RESULT_FIELD: &str = "__result";

/// A parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Feed(Feed),
    Entry(Entry),
    /// A primitive, complex or collection value (function results, `$count`).
    Value(Value),
}

impl Payload {
    /// Returns the payload as a feed; a single entry becomes a one-entry
    /// feed and a scalar becomes one synthetic entry.
    pub fn into_feed(self) -> Feed {
        match self {
            Payload::Feed(feed) => feed,
            Payload::Entry(entry) => Feed::new(vec![entry]),
            Payload::Value(Value::Collection(items)) => {
                Feed::new(items.into_iter().map(wrap_value).collect())
            }
            Payload::Value(value) => Feed::new(vec![wrap_value(value)]),
        }
    }

    /// Returns the first entry of the payload, if any.
    pub fn into_entry(self) -> Option<Entry> {
        match self {
            Payload::Feed(feed) => feed.into_entries().into_iter().next(),
            Payload::Entry(entry) => Some(entry),
            Payload::Value(Value::Null) => None,
            Payload::Value(value) => Some(wrap_value(value)),
        }
    }

    /// Returns the payload as a single value.
    pub fn into_value(self) -> Value {
        match self {
            Payload::Feed(feed) => Value::Entries(feed.into_entries()),
            Payload::Entry(mut entry) => match entry.remove(RESULT_FIELD) {
                Some(value) if entry.is_empty() => value,
                Some(value) => {
                    entry.insert(RESULT_FIELD, value);
                    Value::Entry(Box::new(entry))
                }
                None => Value::Entry(Box::new(entry)),
            },
            Payload::Value(value) => value,
        }
    }
}

/// Wraps a value into an entry: complex values keep their members, anything
/// else lands under [`RESULT_FIELD`].
fn wrap_value(value: Value) -> Entry {
    match value {
        Value::Complex(fields) => Entry::from_fields(fields),
        Value::Entry(entry) => *entry,
        other => Entry::new().set(RESULT_FIELD, other),
    }
}

/// Reads response bodies, optionally typed by a catalog.
///
/// # Example
///
/// ```
/// use odata_lib::reader::ResponseReader;
///
/// # fn main() -> Result<(), odata_lib::error::Error> {
/// let body = br#"{"value":[{"ProductID":1,"ProductName":"Chai"}]}"#;
/// let feed = ResponseReader::new().read(body)?.into_feed();
/// assert_eq!(feed.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ResponseReader<'a> {
    catalog: Option<&'a Catalog>,
    entity_type: Option<&'a EntityType>,
    value_type: Option<&'a EdmType>,
    include_annotations: bool,
}

impl Default for ResponseReader<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ResponseReader<'a> {
    pub fn new() -> Self {
        Self {
            catalog: None,
            entity_type: None,
            value_type: None,
            include_annotations: true,
        }
    }

    /// Types properties and annotated type names against `catalog`.
    pub fn with_catalog(mut self, catalog: &'a Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Entity type assumed for entries without a type annotation.
    pub fn with_entity_type(mut self, entity_type: &'a EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    /// Declared type of a scalar response (function results).
    pub fn with_value_type(mut self, value_type: &'a EdmType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    /// Keeps (default) or drops protocol annotations.
    pub fn with_annotations(mut self, include: bool) -> Self {
        self.include_annotations = include;
        self
    }

    /// Parses a response body.
    ///
    /// An empty body reads as [`Value::Null`].
    pub fn read(&self, body: &[u8]) -> Result<Payload, Error> {
        let text = std::str::from_utf8(body)
            .map_err(|e| Error::parse(format!("Response is not UTF-8: {}", e)))?;
        let text = text.trim_start_matches('\u{feff}').trim();
        log::trace!("reading {} byte response", text.len());
        if text.is_empty() {
            return Ok(Payload::Value(Value::Null));
        }

        let mut payload = if text.starts_with('<') {
            atom::read(self, text)?
        } else if text.starts_with('{') || text.starts_with('[') {
            json::read(self, text)?
        } else {
            // Raw `$count` and `$value` bodies.
            Payload::Value(self.raw_value(text)?)
        };

        if !self.include_annotations {
            match &mut payload {
                Payload::Feed(feed) => {
                    *feed.annotations_mut() = Default::default();
                    feed.entries_mut().iter_mut().for_each(Entry::strip_annotations);
                }
                Payload::Entry(entry) => entry.strip_annotations(),
                Payload::Value(_) => {}
            }
        }
        Ok(payload)
    }

    fn raw_value(&self, text: &str) -> Result<Value, Error> {
        match self.value_type {
            Some(edm_type) => convert::from_text(text, edm_type, self.catalog),
            None => Ok(match text.parse::<i64>() {
                Ok(n) => Value::Long(n),
                Err(_) => Value::String(text.to_string()),
            }),
        }
    }

    // =========================================================================
    // Catalog lookups shared by the format readers
    // =========================================================================

    /// Picks the entity type named by an annotation, falling back to
    /// `fallback`.
    pub(crate) fn entity_type_for(
        &self,
        annotated: Option<&str>,
        fallback: Option<&'a EntityType>,
    ) -> Option<&'a EntityType> {
        let named = annotated
            .map(|name| name.trim_start_matches('#'))
            .and_then(|name| self.catalog?.entity_type(name));
        named.or(fallback)
    }

    pub(crate) fn property_type(&self, entity_type: Option<&'a EntityType>, name: &str) -> Option<&'a EdmType> {
        let catalog = self.catalog?;
        catalog
            .properties(entity_type?)
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| &p.edm_type)
    }

    pub(crate) fn navigation(
        &self,
        entity_type: Option<&'a EntityType>,
        name: &str,
    ) -> Option<(&'a NavigationProperty, Option<&'a EntityType>)> {
        let catalog = self.catalog?;
        let navigation = catalog
            .navigation_properties(entity_type?)
            .into_iter()
            .find(|n| n.name == name)?;
        Some((navigation, catalog.entity_type(&navigation.target_type)))
    }

    /// Fills key values missing from `entry` using its identity URI.
    ///
    /// A URI without a key segment is left alone; a key literal that does not
    /// match its declared type fails.
    pub(crate) fn complete_key(&self, entry: &mut Entry, entity_type: Option<&'a EntityType>) -> Result<(), Error> {
        let (Some(catalog), Some(entity_type)) = (self.catalog, entity_type) else {
            return Ok(());
        };
        let Some(annotations) = entry.annotations() else {
            return Ok(());
        };
        let Some(uri) = annotations
            .id
            .as_deref()
            .or(annotations.edit_link.as_deref())
            .or(annotations.read_link.as_deref())
        else {
            return Ok(());
        };
        let key_properties = catalog.key_properties(entity_type);
        if key_properties.iter().all(|p| entry.contains(&p.name)) {
            return Ok(());
        }
        let values = match key::decode_key(uri, entity_type, catalog) {
            Ok(values) => values,
            Err(Error::Parse { message, .. }) => {
                log::trace!("{}", message);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        for (name, value) in values {
            if !entry.contains(&name) {
                entry.insert(name, value);
            }
        }
        Ok(())
    }
}

/// Appends `entry` to `entries`, merging it into an earlier description of
/// the same entity (same identity URI).
pub(crate) fn push_entry(entries: &mut Vec<Entry>, entry: Entry) {
    let existing = entry
        .id()
        .and_then(|id| entries.iter().position(|e| e.id() == Some(id)));
    match existing {
        Some(index) => entries[index].merge(entry),
        None => entries.push(entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_is_wrapped() {
        let entry = Payload::Value(Value::Int(5)).into_entry().unwrap();
        assert_eq!(entry.get(RESULT_FIELD), Some(&Value::Int(5)));
        assert_eq!(Payload::Entry(entry).into_value(), Value::Int(5));
    }

    #[test]
    fn test_raw_count_body() {
        let payload = ResponseReader::new().read(b"77").unwrap();
        assert_eq!(payload.into_value(), Value::Long(77));
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(ResponseReader::new().read(b"  ").unwrap(), Payload::Value(Value::Null));
        assert_eq!(Payload::Value(Value::Null).into_entry(), None);
    }

    #[test]
    fn test_duplicate_entries_merge() {
        let mut entries = Vec::new();
        let mut first = Entry::new().set("A", 1);
        first.merge_annotations(crate::model::EntryAnnotations {
            id: Some("X(1)".into()),
            ..Default::default()
        });
        let mut second = Entry::new().set("B", 2);
        second.merge_annotations(crate::model::EntryAnnotations {
            id: Some("X(1)".into()),
            etag: Some("W/\"2\"".into()),
            ..Default::default()
        });
        push_entry(&mut entries, first);
        push_entry(&mut entries, second);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("B"));
        assert_eq!(entries[0].etag(), Some("W/\"2\""));
    }
}
