//! Annotated entry

use std::collections::HashMap;

use chrono::DateTime;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::EntryAnnotations;
use super::Value;
use crate::error::FieldError;

/// A navigation binding attached to an entry being written.
///
/// `target` is a URI relative to the service root (`Categories(1)`) or a
/// batch content-id reference (`$1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryBinding {
    pub navigation: String,
    pub target: String,
}

/// Property values of one entity plus the annotations the service sent
/// with them.
///
/// Typed getters fail on a missing field or a value of another type and
/// read an explicit null as `None`.
///
/// # Example
///
/// ```
/// use odata_lib::model::Entry;
///
/// let entry = Entry::new()
///     .set("ProductName", "Chai")
///     .set("UnitsInStock", 39);
///
/// assert_eq!(entry.get_string("ProductName").unwrap(), Some("Chai"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entry {
    pub(crate) fields: HashMap<String, Value>,
    pub(crate) annotations: Option<EntryAnnotations>,
    pub(crate) bindings: Vec<EntryBinding>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an entry from existing fields.
    pub fn from_fields(fields: HashMap<String, Value>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    // =========================================================================
    // Annotations
    // =========================================================================

    /// Returns the annotations, if the payload carried any.
    pub fn annotations(&self) -> Option<&EntryAnnotations> {
        self.annotations.as_ref()
    }

    /// Returns the identity URI, if known.
    pub fn id(&self) -> Option<&str> {
        self.annotations.as_ref()?.id.as_deref()
    }

    /// Returns the concurrency token, if known.
    pub fn etag(&self) -> Option<&str> {
        self.annotations.as_ref()?.etag.as_deref()
    }

    /// Merges annotations into this entry, keeping values already present.
    pub fn merge_annotations(&mut self, annotations: EntryAnnotations) {
        if annotations.is_empty() {
            return;
        }
        match &mut self.annotations {
            Some(existing) => existing.merge(annotations),
            None => self.annotations = Some(annotations),
        }
    }

    /// Drops all annotations.
    pub fn strip_annotations(&mut self) {
        self.annotations = None;
        for value in self.fields.values_mut() {
            match value {
                Value::Entry(e) => e.strip_annotations(),
                Value::Entries(list) => list.iter_mut().for_each(Entry::strip_annotations),
                _ => {}
            }
        }
    }

    /// Merges another description of the same logical entry into this one.
    ///
    /// Properties missing here are taken from `other`; annotations merge
    /// additively.
    pub fn merge(&mut self, other: Entry) {
        for (name, value) in other.fields {
            self.fields.entry(name).or_insert(value);
        }
        if let Some(annotations) = other.annotations {
            self.merge_annotations(annotations);
        }
        self.bindings.extend(other.bindings);
    }

    // =========================================================================
    // Raw field access
    // =========================================================================

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> &HashMap<String, Value> {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.fields
    }

    /// Returns the navigation bindings attached for writing.
    pub fn bindings(&self) -> &[EntryBinding] {
        &self.bindings
    }

    /// Returns `true` if the entry has neither fields nor bindings.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.bindings.is_empty()
    }

    // =========================================================================
    // Setters
    // =========================================================================

    /// Sets `field`, consuming the entry.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Binds a navigation property to an existing entity or a batch reference.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let product = Entry::new()
    ///     .set("ProductName", "Chai")
    ///     .bind("Category", "Categories(1)");
    /// ```
    pub fn bind(mut self, navigation: impl Into<String>, target: impl Into<String>) -> Self {
        self.bindings.push(EntryBinding {
            navigation: navigation.into(),
            target: target.into(),
        });
        self
    }

    // =========================================================================
    // Typed getters
    // =========================================================================

    /// Reads `field` through `extract`.
    ///
    /// A missing field or a value `extract` rejects is an error; an explicit
    /// null reads as `None`.
    fn typed<'e, T>(
        &'e self,
        field: &str,
        expected: &'static str,
        extract: impl FnOnce(&'e Value) -> Option<T>,
    ) -> Result<Option<T>, FieldError> {
        let value = self.fields.get(field).ok_or_else(|| FieldError::missing(field))?;
        if value.is_null() {
            return Ok(None);
        }
        extract(value)
            .map(Some)
            .ok_or_else(|| FieldError::type_mismatch(field, expected, value.type_name()))
    }

    pub fn get_string(&self, field: &str) -> Result<Option<&str>, FieldError> {
        self.typed(field, "string", |v| match v {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn get_bool(&self, field: &str) -> Result<Option<bool>, FieldError> {
        self.typed(field, "bool", |v| match v {
            Value::Bool(b) => Some(*b),
            _ => None,
        })
    }

    /// Reads an `Int32`, widening `Int16`, `Byte` and `SByte`.
    pub fn get_int(&self, field: &str) -> Result<Option<i32>, FieldError> {
        self.typed(field, "int", |v| match v {
            Value::Int(n) => Some(*n),
            Value::Short(n) => Some(i32::from(*n)),
            Value::Byte(n) => Some(i32::from(*n)),
            Value::SByte(n) => Some(i32::from(*n)),
            _ => None,
        })
    }

    /// Reads an `Int64` or any narrower integer.
    pub fn get_long(&self, field: &str) -> Result<Option<i64>, FieldError> {
        self.typed(field, "long", |v| match v {
            Value::Enum(_) => None,
            other => other.as_i64(),
        })
    }

    pub fn get_float(&self, field: &str) -> Result<Option<f64>, FieldError> {
        self.typed(field, "float", |v| match v {
            Value::Float(n) => Some(*n),
            Value::Single(n) => Some(f64::from(*n)),
            _ => None,
        })
    }

    pub fn get_decimal(&self, field: &str) -> Result<Option<Decimal>, FieldError> {
        self.typed(field, "decimal", |v| match v {
            Value::Decimal(d) => Some(*d),
            _ => None,
        })
    }

    pub fn get_guid(&self, field: &str) -> Result<Option<Uuid>, FieldError> {
        self.typed(field, "guid", |v| match v {
            Value::Guid(g) => Some(*g),
            _ => None,
        })
    }

    /// Reads an instant. Legacy `Edm.DateTime` values carry no offset and
    /// are taken as UTC.
    pub fn get_datetime(&self, field: &str) -> Result<Option<DateTime<Utc>>, FieldError> {
        self.typed(field, "datetime", |v| match v {
            Value::DateTime(dt) => Some(*dt),
            Value::LocalDateTime(dt) => Some(dt.and_utc()),
            _ => None,
        })
    }

    /// Reads an expanded to-one association.
    pub fn get_entry(&self, field: &str) -> Result<Option<&Entry>, FieldError> {
        self.typed(field, "entry", |v| match v {
            Value::Entry(e) => Some(e.as_ref()),
            _ => None,
        })
    }

    /// Reads an expanded to-many association.
    pub fn get_entries(&self, field: &str) -> Result<Option<&[Entry]>, FieldError> {
        self.typed(field, "entries", |v| match v {
            Value::Entries(list) => Some(list.as_slice()),
            _ => None,
        })
    }
}

impl FromIterator<(String, Value)> for Entry {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::from_fields(iter.into_iter().collect())
    }
}
