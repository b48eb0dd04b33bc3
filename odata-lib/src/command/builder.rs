//! Fluent command builder

use super::arena::CommandArena;
use super::arena::CommandData;
use super::arena::CommandId;
use super::arena::KeyValues;
use super::arena::Target;
use super::ExpandSpec;
use super::OrderBy;
use crate::error::Error;
use crate::expr::Expr;
use crate::model::Entry;
use crate::model::Value;

/// An immutable, unresolved command.
///
/// Every clause method returns a new `Command`; the receiver is left
/// untouched, so a base command can be shared and specialized freely.
/// Navigation chaining (`Categories(1)/Products`) appends a child snapshot
/// that refers back to its parent.
///
/// Clauses that contradict each other fail with
/// [`Error::InvalidCommand`] as soon as they are added.
///
/// # Example
///
/// ```
/// use odata_lib::command::Command;
/// use odata_lib::command::OrderBy;
/// use odata_lib::expr::prop;
///
/// # fn main() -> Result<(), odata_lib::error::Error> {
/// let cheap = Command::collection("Products")
///     .filter(prop("UnitPrice").lt(10))?
///     .select(["ProductName", "UnitPrice"])
///     .order_by(OrderBy::desc("UnitPrice"))
///     .top(5)?;
///
/// let products_of_category = Command::collection("Categories")
///     .key(1)?
///     .navigate("Products");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    arena: CommandArena,
    head: CommandId,
}

impl Command {
    fn root(target: Target) -> Self {
        let mut arena = CommandArena::default();
        let head = arena.push(CommandData::new(None, target));
        Self { arena, head }
    }

    /// Starts a command on an entity set (or entity type) name.
    pub fn collection(name: impl Into<String>) -> Self {
        Self::root(Target::Collection(name.into()))
    }

    /// Starts a command calling a function import.
    pub fn function(name: impl Into<String>) -> Self {
        Self::root(Target::Function(name.into()))
    }

    /// Starts a command invoking an action import.
    pub fn action(name: impl Into<String>) -> Self {
        Self::root(Target::Action(name.into()))
    }

    pub(crate) fn data(&self) -> &CommandData {
        self.arena.get(self.head)
    }

    pub(crate) fn chain(&self) -> Vec<&CommandData> {
        self.arena.chain(self.head)
    }

    /// Derives a new snapshot from the head with `apply` applied.
    fn derive(&self, apply: impl FnOnce(&mut CommandData)) -> Self {
        let mut data = self.data().clone();
        apply(&mut data);
        let mut arena = self.arena.clone();
        let head = arena.push(data);
        Self { arena, head }
    }

    fn try_derive(
        &self,
        apply: impl FnOnce(&mut CommandData) -> Result<(), Error>,
    ) -> Result<Self, Error> {
        let mut data = self.data().clone();
        apply(&mut data)?;
        let mut arena = self.arena.clone();
        let head = arena.push(data);
        Ok(Self { arena, head })
    }

    // =========================================================================
    // Addressing
    // =========================================================================

    /// Narrows the addressed entities to a derived type.
    pub fn as_type(&self, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        self.derive(|d| d.derived_type = Some(type_name))
    }

    /// Addresses a single entity by the value of its single-property key.
    pub fn key(&self, value: impl Into<Value>) -> Result<Self, Error> {
        self.set_key(KeyValues::Single(value.into()))
    }

    /// Addresses a single entity by named key values.
    pub fn key_values<I, S, V>(&self, values: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        let values = values
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        self.set_key(KeyValues::Named(values))
    }

    fn set_key(&self, key: KeyValues) -> Result<Self, Error> {
        self.try_derive(|d| {
            if d.filter.is_some() {
                return Err(Error::invalid_command("a key cannot be combined with a filter"));
            }
            if let Some(top) = d.top.filter(|&n| n != 1) {
                return Err(Error::invalid_command(format!(
                    "a key cannot be combined with top({})",
                    top
                )));
            }
            d.key = Some(key);
            Ok(())
        })
    }

    /// Follows an association from the entity (or entities) addressed so far.
    pub fn navigate(&self, navigation: impl Into<String>) -> Self {
        let mut arena = self.arena.clone();
        let head = arena.push(CommandData::new(
            Some(self.head),
            Target::Navigation(navigation.into()),
        ));
        Self { arena, head }
    }

    /// Addresses the link between the entity and its related entities
    /// (`$ref` / `$links`).
    pub fn link(&self, navigation: impl Into<String>) -> Self {
        let navigation = navigation.into();
        self.derive(|d| d.link = Some(navigation))
    }

    /// Addresses the media stream of a media-link entry (`$value`).
    pub fn media(&self) -> Self {
        self.derive(|d| d.media = true)
    }

    // =========================================================================
    // Query clauses
    // =========================================================================

    /// Adds a filter; repeated filters are and-ed.
    ///
    /// A filter that is a pure equality conjunction over exactly the key
    /// properties is turned into a key during resolution.
    pub fn filter(&self, filter: impl Into<Expr>) -> Result<Self, Error> {
        let filter = filter.into();
        self.try_derive(|d| {
            if d.key.is_some() {
                return Err(Error::invalid_command("a filter cannot be combined with a key"));
            }
            d.filter = Some(match d.filter.take() {
                Some(existing) => existing.and(filter),
                None => filter,
            });
            Ok(())
        })
    }

    /// Adds projected fields. Paths may cross associations
    /// (`Category/CategoryName`).
    pub fn select<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.derive(|d| d.select.extend(fields))
    }

    /// Expands an association path (`Subordinates/Orders`).
    ///
    /// A path with an empty segment makes the command fail to resolve.
    pub fn expand(&self, path: &str) -> Self {
        match ExpandSpec::from_path(path) {
            Some(spec) => self.expand_spec(spec),
            None => self.derive(|d| {
                d.malformed
                    .get_or_insert_with(|| format!("malformed expand path '{}'", path));
            }),
        }
    }

    /// Expands an association with nested options.
    pub fn expand_with<F>(&self, navigation: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(ExpandSpec) -> ExpandSpec,
    {
        self.expand_spec(build(ExpandSpec::new(navigation)))
    }

    /// Adds a prepared expand spec.
    pub fn expand_spec(&self, spec: ExpandSpec) -> Self {
        self.derive(|d| d.expands.push(spec))
    }

    /// Adds ordering.
    pub fn order_by(&self, order: impl Into<OrderBy>) -> Self {
        let order = order.into();
        self.derive(|d| d.order_by.extend(order))
    }

    /// Skips the first `n` results.
    pub fn skip(&self, n: u64) -> Self {
        self.derive(|d| d.skip = Some(n))
    }

    /// Limits the number of results.
    ///
    /// Fails if a key is set and `n` is not 1.
    pub fn top(&self, n: u64) -> Result<Self, Error> {
        self.try_derive(|d| {
            if d.key.is_some() && n != 1 {
                return Err(Error::invalid_command(format!(
                    "top({}) cannot be combined with a key",
                    n
                )));
            }
            d.top = Some(n);
            Ok(())
        })
    }

    /// Requests the total count alongside the results.
    pub fn include_count(&self) -> Self {
        self.derive(|d| d.include_count = true)
    }

    /// Requests only the number of matching entities (`/$count`).
    pub fn count(&self) -> Self {
        self.derive(|d| d.count = true)
    }

    // =========================================================================
    // Operations and payloads
    // =========================================================================

    /// Adds a function or action parameter.
    pub fn parameter(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        self.derive(|d| d.parameters.push((name, value)))
    }

    /// Merges `entry` into the write payload; its fields override earlier ones.
    pub fn set(&self, entry: Entry) -> Self {
        self.derive(|d| {
            let payload = d.entry.get_or_insert_with(Entry::new);
            payload.fields.extend(entry.fields);
            payload.bindings.extend(entry.bindings);
        })
    }

    /// Sets a single field of the write payload.
    pub fn set_value(&self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        self.derive(|d| d.entry.get_or_insert_with(Entry::new).insert(field, value))
    }

    /// Returns the write payload, if any.
    pub fn entry(&self) -> Option<&Entry> {
        self.data().entry.as_ref()
    }

    /// Returns `true` if this level addresses a single entity by key.
    pub fn has_key(&self) -> bool {
        self.data().key.is_some()
    }

    /// Returns the filter of this level, if any.
    pub fn filter_expr(&self) -> Option<&Expr> {
        self.data().filter.as_ref()
    }
}
