//! Command resolution against a catalog

use std::fmt;

use rust_decimal::Decimal;
use uuid::Uuid;

use super::arena::CommandData;
use super::arena::KeyValues;
use super::arena::Target;
use super::Command;
use super::Direction;
use super::ExpandSpec;
use crate::error::ConversionError;
use crate::error::Error;
use crate::expr::BinaryOperator;
use crate::expr::Expr;
use crate::expr::Function;
use crate::expr::MemberPath;
use crate::metadata::CatalogView;
use crate::metadata::EdmType;
use crate::metadata::EntityType;
use crate::metadata::EnumType;
use crate::metadata::FunctionImport;
use crate::metadata::FunctionKind;
use crate::metadata::Member;
use crate::metadata::StructuredType;
use crate::model::Entry;
use crate::model::EnumValue;
use crate::model::Value;

// =============================================================================
// Resolved command model
// =============================================================================

/// What a resolved path step is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Structural (primitive or complex) property.
    Property,
    /// Association to a single entity.
    ToOne,
    /// Association to many entities.
    ToMany,
}

/// One step of a resolved member path, carrying the catalog name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub name: String,
    pub kind: StepKind,
}

/// A member path whose names were matched against the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPath {
    pub steps: Vec<PathStep>,
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(&step.name)?;
        }
        Ok(())
    }
}

/// Projection clauses at one level of the expand tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub select: Vec<ResolvedPath>,
    pub order_by: Vec<(ResolvedPath, Direction)>,
    pub expands: Vec<ResolvedExpand>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.select.is_empty() && self.order_by.is_empty() && self.expands.is_empty()
    }
}

/// An expanded association with its resolved options.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedExpand {
    pub navigation: String,
    pub is_collection: bool,
    pub filter: Option<Expr>,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub levels: Option<u32>,
    pub projection: Projection,
}

impl ResolvedExpand {
    fn new(navigation: &str, is_collection: bool) -> Self {
        Self {
            navigation: navigation.to_string(),
            is_collection,
            filter: None,
            top: None,
            skip: None,
            levels: None,
            projection: Projection::default(),
        }
    }
}

/// One addressed segment: `Name[/NS.Derived](key)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub name: String,
    /// Qualified derived type name.
    pub derived_type: Option<String>,
    /// Key values in key declaration order.
    pub key: Option<Vec<(String, Value)>>,
}

/// A resolved function or action import call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOperation {
    pub name: String,
    pub kind: FunctionKind,
    /// Parameters in declaration order.
    pub parameters: Vec<(String, Value)>,
}

/// The association addressed by a link command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub navigation: String,
    pub is_collection: bool,
}

/// Navigation bindings of a write payload, grouped per association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBinding {
    pub navigation: String,
    pub is_collection: bool,
    pub targets: Vec<String>,
}

/// A command bound to concrete catalog names, key order and types.
///
/// Produced by [`Command::resolve`] in one step; a failed resolution
/// yields no partially resolved command.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCommand {
    pub(crate) path: Vec<PathSegment>,
    pub(crate) operation: Option<ResolvedOperation>,
    pub(crate) entity_type: Option<String>,
    pub(crate) is_single: bool,
    pub(crate) filter: Option<Expr>,
    pub(crate) projection: Projection,
    pub(crate) skip: Option<u64>,
    pub(crate) top: Option<u64>,
    pub(crate) include_count: bool,
    pub(crate) count: bool,
    pub(crate) media: bool,
    pub(crate) link: Option<ResolvedLink>,
    pub(crate) entry: Option<Entry>,
    pub(crate) bindings: Vec<ResolvedBinding>,
}

impl ResolvedCommand {
    /// Returns the addressed segments, root entity set first.
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Returns the entity set name at the root of the path.
    pub fn entity_set(&self) -> Option<&str> {
        self.path.first().map(|s| s.name.as_str())
    }

    /// Returns the most specific entity type addressed, if any.
    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    /// Returns the key of the last segment.
    pub fn key(&self) -> Option<&[(String, Value)]> {
        self.path.last().and_then(|s| s.key.as_deref())
    }

    /// Returns `true` if the command addresses at most one entity.
    pub fn is_single(&self) -> bool {
        self.is_single
    }

    pub fn operation(&self) -> Option<&ResolvedOperation> {
        self.operation.as_ref()
    }

    pub fn filter(&self) -> Option<&Expr> {
        self.filter.as_ref()
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn link(&self) -> Option<&ResolvedLink> {
        self.link.as_ref()
    }

    /// Returns the write payload with catalog names and declared types.
    pub fn entry(&self) -> Option<&Entry> {
        self.entry.as_ref()
    }

    pub fn bindings(&self) -> &[ResolvedBinding] {
        &self.bindings
    }

    pub fn is_count(&self) -> bool {
        self.count
    }

    pub fn is_media(&self) -> bool {
        self.media
    }
}

impl Command {
    /// Resolves every name in the command chain against `view`.
    pub fn resolve(&self, view: &CatalogView<'_>) -> Result<ResolvedCommand, Error> {
        Resolver { view: *view }.resolve(self)
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Typing context for filter expressions.
#[derive(Clone)]
struct Scope<'a> {
    owner: Option<StructuredType<'a>>,
    /// Lambda range variables, innermost last.
    variables: Vec<(String, Option<StructuredType<'a>>)>,
}

impl<'a> Scope<'a> {
    fn entity(entity_type: &'a EntityType) -> Self {
        Self {
            owner: Some(StructuredType::Entity(entity_type)),
            variables: Vec::new(),
        }
    }
}

struct Resolver<'a> {
    view: CatalogView<'a>,
}

impl<'a> Resolver<'a> {
    fn resolve(&self, command: &Command) -> Result<ResolvedCommand, Error> {
        let chain = command.chain();
        let Some((leaf, ancestors)) = chain.split_last() else {
            return Err(Error::invalid_command("empty command"));
        };
        if let Some(message) = chain.iter().find_map(|level| level.malformed.as_ref()) {
            return Err(Error::invalid_command(message.clone()));
        }
        for level in ancestors {
            ensure_addressing_only(level)?;
        }

        let mut path: Vec<PathSegment> = Vec::new();
        let mut operation = None;
        let mut current: Option<&'a EntityType> = None;
        let mut is_single = false;
        let mut leaf_filter = None;
        let last = chain.len() - 1;

        for (depth, level) in chain.iter().enumerate() {
            let is_leaf = depth == last;
            match &level.target {
                Target::Collection(name) => {
                    if depth > 0 {
                        return Err(Error::invalid_command("a collection must start the command"));
                    }
                    let resolved = self.view.entity_set(name)?;
                    let mut entity_type = resolved.entity_type();
                    if let Some(requested) = &level.derived_type {
                        entity_type = self.view.derived_type(resolved.base_type, requested)?;
                    }
                    path.push(self.segment(&resolved.set.name, resolved.base_type, entity_type));
                    current = Some(entity_type);
                    is_single = false;
                }
                Target::Function(name) | Target::Action(name) => {
                    if depth > 0 {
                        return Err(Error::invalid_command("an operation must start the command"));
                    }
                    let function = self.view.function(name)?;
                    let expected = match level.target {
                        Target::Action(_) => FunctionKind::Action,
                        _ => FunctionKind::Function,
                    };
                    if function.kind != expected {
                        return Err(Error::invalid_command(format!(
                            "'{}' is not a {:?} import",
                            function.name, expected
                        )));
                    }
                    operation = Some(ResolvedOperation {
                        name: function.name.clone(),
                        kind: function.kind,
                        parameters: self.parameters(function, &level.parameters)?,
                    });
                    current = self.returned_type(function);
                    is_single = current.is_some()
                        && !matches!(function.return_type, Some(EdmType::Collection(_)));
                }
                Target::Navigation(name) => {
                    let owner = current
                        .filter(|_| operation.is_none())
                        .ok_or_else(|| Error::invalid_command(format!(
                            "cannot navigate to '{}' from an operation result",
                            name
                        )))?;
                    if !is_single {
                        return Err(Error::invalid_command(format!(
                            "navigation to '{}' requires a single entity",
                            name
                        )));
                    }
                    let navigation = self.view.navigation(owner, name)?;
                    let target = self.view.target_type(navigation)?;
                    let entity_type = match &level.derived_type {
                        Some(requested) => self.view.derived_type(target, requested)?,
                        None => target,
                    };
                    path.push(self.segment(&navigation.name, target, entity_type));
                    current = Some(entity_type);
                    is_single = !navigation.is_collection();
                }
            }

            let (key, filter) = self.key_or_filter(level, current, is_leaf)?;
            if let Some(key) = key {
                if operation.is_some() {
                    return Err(Error::invalid_command("an operation result cannot be keyed"));
                }
                if let Some(segment) = path.last_mut() {
                    segment.key = Some(key);
                }
                is_single = true;
            }
            if is_leaf {
                leaf_filter = filter;
            }
        }

        let scope = current.map(Scope::entity);
        let needs_type = leaf_filter.is_some()
            || !leaf.select.is_empty()
            || !leaf.expands.is_empty()
            || !leaf.order_by.is_empty()
            || leaf.link.is_some();
        let (scope, entity_type) = match (scope, current) {
            (Some(scope), Some(entity_type)) => (scope, entity_type),
            _ if needs_type => {
                return Err(Error::invalid_command(
                    "query clauses require an entity-typed result",
                ));
            }
            _ => {
                return Ok(ResolvedCommand {
                    path,
                    operation,
                    entity_type: None,
                    is_single,
                    filter: None,
                    projection: Projection::default(),
                    skip: leaf.skip,
                    top: leaf.top,
                    include_count: leaf.include_count,
                    count: leaf.count,
                    media: leaf.media,
                    link: None,
                    entry: leaf.entry.clone(),
                    bindings: Vec::new(),
                });
            }
        };

        if leaf.count && is_single {
            return Err(Error::invalid_command("$count requires a collection"));
        }
        if (leaf.media || leaf.link.is_some()) && !is_single {
            return Err(Error::invalid_command(
                "media and link access require a single entity",
            ));
        }

        let filter = leaf_filter
            .map(|f| self.expr(&f, &scope))
            .transpose()?;

        let mut projection = Projection::default();
        for spec in &leaf.expands {
            self.expand(entity_type, spec, &mut projection.expands)?;
        }
        for field in &leaf.select {
            self.place_select(entity_type, field, &mut projection)?;
        }
        for (field, direction) in leaf.order_by.fields() {
            self.place_order(entity_type, field, *direction, &mut projection)?;
        }

        let link = leaf
            .link
            .as_deref()
            .map(|name| {
                self.view.navigation(entity_type, name).map(|n| ResolvedLink {
                    navigation: n.name.clone(),
                    is_collection: n.is_collection(),
                })
            })
            .transpose()?;

        let (entry, bindings) = match &leaf.entry {
            Some(entry) => {
                let (entry, bindings) = self.payload(entity_type, entry)?;
                (Some(entry), bindings)
            }
            None => (None, Vec::new()),
        };

        Ok(ResolvedCommand {
            path,
            operation,
            entity_type: Some(entity_type.name.clone()),
            is_single,
            filter,
            projection,
            skip: leaf.skip,
            top: leaf.top,
            include_count: leaf.include_count,
            count: leaf.count,
            media: leaf.media,
            link,
            entry,
            bindings,
        })
    }

    fn segment(&self, name: &str, declared: &EntityType, addressed: &EntityType) -> PathSegment {
        PathSegment {
            name: name.to_string(),
            derived_type: (declared.name != addressed.name)
                .then(|| self.view.catalog().qualified_name(&addressed.name)),
            key: None,
        }
    }

    fn returned_type(&self, function: &'a FunctionImport) -> Option<&'a EntityType> {
        let catalog = self.view.catalog();
        if let Some(set) = function.entity_set.as_deref().and_then(|s| catalog.entity_set(s)) {
            return catalog.entity_type(&set.entity_type);
        }
        match function.return_type.as_ref()?.element_type() {
            EdmType::Named(name) => catalog.entity_type(name),
            _ => None,
        }
    }

    fn parameters(
        &self,
        function: &'a FunctionImport,
        supplied: &[(String, Value)],
    ) -> Result<Vec<(String, Value)>, Error> {
        let mut resolved = supplied
            .iter()
            .map(|(name, value)| {
                let parameter = self.view.parameter(function, name)?;
                let position = function
                    .parameters
                    .iter()
                    .position(|p| p.name == parameter.name)
                    .unwrap_or(usize::MAX);
                let value = self.coerce(value.clone(), &parameter.edm_type)?;
                Ok((position, parameter.name.clone(), value))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        resolved.sort_by_key(|(position, _, _)| *position);
        Ok(resolved.into_iter().map(|(_, name, value)| (name, value)).collect())
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// Splits a level's key/filter into a structured key or a remaining filter.
    fn key_or_filter(
        &self,
        level: &CommandData,
        entity_type: Option<&'a EntityType>,
        is_leaf: bool,
    ) -> Result<(Option<Vec<(String, Value)>>, Option<Expr>), Error> {
        if let Some(key) = &level.key {
            let entity_type = entity_type
                .ok_or_else(|| Error::invalid_command("a key requires an entity type"))?;
            return Ok((Some(self.key(entity_type, key)?), None));
        }
        let Some(filter) = &level.filter else {
            return Ok((None, None));
        };

        let convertible = !is_leaf
            || (level.top.is_none_or(|n| n == 1)
                && level.skip.is_none()
                && !level.count
                && !level.include_count);
        if let (true, Some(entity_type), Some(pairs)) =
            (convertible, entity_type, filter.equality_map())
        {
            if let Some(key) = self.match_key(entity_type, &pairs)? {
                log::trace!("filter on '{}' converted to key", entity_type.name);
                return Ok((Some(key), None));
            }
        }
        if !is_leaf {
            return Err(Error::invalid_command(
                "a filter before a navigation must match the full key",
            ));
        }
        Ok((None, Some(filter.clone())))
    }

    fn key(&self, entity_type: &'a EntityType, key: &KeyValues) -> Result<Vec<(String, Value)>, Error> {
        let catalog = self.view.catalog();
        match key {
            KeyValues::Single(value) => {
                let properties = catalog.key_properties(entity_type);
                let [property] = properties.as_slice() else {
                    return Err(Error::invalid_command(format!(
                        "'{}' has a key of {} properties",
                        entity_type.name,
                        properties.len()
                    )));
                };
                Ok(vec![(
                    property.name.clone(),
                    self.coerce(value.clone(), &property.edm_type)?,
                )])
            }
            KeyValues::Named(pairs) => self.match_key(entity_type, pairs)?.ok_or_else(|| {
                Error::invalid_command(format!(
                    "key values do not match the key of '{}'",
                    entity_type.name
                ))
            }),
        }
    }

    /// Matches named values against the key properties.
    ///
    /// Returns `None` unless every name is a key property and every key
    /// property is named exactly once.
    fn match_key(
        &self,
        entity_type: &'a EntityType,
        pairs: &[(String, Value)],
    ) -> Result<Option<Vec<(String, Value)>>, Error> {
        let key_properties = self.view.catalog().key_properties(entity_type);
        if key_properties.is_empty() || pairs.len() != key_properties.len() {
            return Ok(None);
        }
        let mut matched: Vec<(&str, &Value)> = Vec::with_capacity(pairs.len());
        for (name, value) in pairs {
            let property = self.view.property(entity_type, name)?;
            if matched.iter().any(|(n, _)| *n == property.name) {
                return Ok(None);
            }
            matched.push((property.name.as_str(), value));
        }

        let mut key = Vec::with_capacity(key_properties.len());
        for property in key_properties {
            let Some((_, value)) = matched.iter().find(|(n, _)| *n == property.name) else {
                return Ok(None);
            };
            key.push((
                property.name.clone(),
                self.coerce((*value).clone(), &property.edm_type)?,
            ));
        }
        Ok(Some(key))
    }

    // =========================================================================
    // Projection
    // =========================================================================

    fn path(&self, owner: &'a EntityType, path: &str) -> Result<ResolvedPath, Error> {
        let mut current = Some(StructuredType::Entity(owner));
        let mut steps = Vec::new();
        for segment in path.split(['/', '.']).filter(|s| !s.is_empty()) {
            let structured = current.ok_or_else(|| Error::unresolvable("property", segment))?;
            let member = self.view.member(structured, segment)?;
            let kind = match member {
                Member::Property(_) => StepKind::Property,
                Member::Navigation(n) if n.is_collection() => StepKind::ToMany,
                Member::Navigation(_) => StepKind::ToOne,
            };
            steps.push(PathStep {
                name: member.name().to_string(),
                kind,
            });
            current = self.view.member_type(member)?;
        }
        if steps.is_empty() {
            return Err(Error::invalid_command("empty member path"));
        }
        Ok(ResolvedPath { steps })
    }

    fn expand(
        &self,
        owner: &'a EntityType,
        spec: &ExpandSpec,
        into: &mut Vec<ResolvedExpand>,
    ) -> Result<(), Error> {
        let navigation = self.view.navigation(owner, &spec.navigation)?;
        let target = self.view.target_type(navigation)?;
        let node = ensure_expand(into, &navigation.name, navigation.is_collection());

        if let Some(filter) = &spec.filter {
            let filter = self.expr(filter, &Scope::entity(target))?;
            node.filter = Some(match node.filter.take() {
                Some(existing) => existing.and(filter),
                None => filter,
            });
        }
        node.top = spec.top.or(node.top);
        node.skip = spec.skip.or(node.skip);
        node.levels = spec.levels.or(node.levels);

        for nested in &spec.expands {
            self.expand(target, nested, &mut node.projection.expands)?;
        }
        for field in &spec.select {
            self.place_select(target, field, &mut node.projection)?;
        }
        for (field, direction) in spec.order_by.fields() {
            self.place_order(target, field, *direction, &mut node.projection)?;
        }
        Ok(())
    }

    /// Adds a selected path at the level of its last crossed association.
    fn place_select(
        &self,
        owner: &'a EntityType,
        field: &str,
        projection: &mut Projection,
    ) -> Result<(), Error> {
        let path = self.path(owner, field)?;
        let inner = &path.steps[..path.steps.len() - 1];
        let split = inner.iter().rposition(|s| s.kind != StepKind::Property);
        let (target, path) = match split {
            Some(i) => {
                let (head, tail) = path.steps.split_at(i + 1);
                (expand_chain(projection, head), ResolvedPath { steps: tail.to_vec() })
            }
            None => (projection, path),
        };
        if !target.select.contains(&path) {
            target.select.push(path);
        }
        Ok(())
    }

    /// Adds an ordering path at the level of its last crossed to-many
    /// association; paths through to-one associations stay in place.
    fn place_order(
        &self,
        owner: &'a EntityType,
        field: &str,
        direction: Direction,
        projection: &mut Projection,
    ) -> Result<(), Error> {
        let path = self.path(owner, field)?;
        let inner = &path.steps[..path.steps.len() - 1];
        let split = inner.iter().rposition(|s| s.kind == StepKind::ToMany);
        let (target, path) = match split {
            Some(i) => {
                let (head, tail) = path.steps.split_at(i + 1);
                (expand_chain(projection, head), ResolvedPath { steps: tail.to_vec() })
            }
            None => (projection, path),
        };
        target.order_by.push((path, direction));
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expr(&self, expr: &Expr, scope: &Scope<'a>) -> Result<Expr, Error> {
        Ok(self.typed_expr(expr, scope)?.0)
    }

    /// Resolves an expression, returning the declared type of a property
    /// reference so that literals compared with it can be coerced.
    fn typed_expr(&self, expr: &Expr, scope: &Scope<'a>) -> Result<(Expr, Option<&'a EdmType>), Error> {
        match expr {
            Expr::Reference(path) => {
                let (path, edm_type) = self.reference(path, scope)?;
                Ok((Expr::Reference(path), edm_type))
            }
            Expr::Literal(_) => Ok((expr.clone(), None)),
            Expr::Unary { op, operand } => Ok((
                Expr::Unary {
                    op: *op,
                    operand: Box::new(self.expr(operand, scope)?),
                },
                None,
            )),
            Expr::Binary { op, left, right } => {
                let (mut left, left_type) = self.typed_expr(left, scope)?;
                let (mut right, right_type) = self.typed_expr(right, scope)?;
                if is_comparison(*op) {
                    if let (Some(edm_type), Expr::Literal(value)) = (left_type, &right) {
                        right = Expr::Literal(self.coerce(value.clone(), edm_type)?);
                    }
                    if let (Some(edm_type), Expr::Literal(value)) = (right_type, &left) {
                        left = Expr::Literal(self.coerce(value.clone(), edm_type)?);
                    }
                }
                Ok((
                    Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    None,
                ))
            }
            Expr::Call { function, args } => {
                let mut args = args
                    .iter()
                    .map(|a| self.expr(a, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                if matches!(function, Function::Cast | Function::IsOf) {
                    if let Some(Expr::Literal(Value::String(name))) = args.last_mut() {
                        *name = self.qualify_type(name);
                    }
                }
                Ok((
                    Expr::Call {
                        function: *function,
                        args,
                    },
                    None,
                ))
            }
            Expr::Member { target, name } => Ok((
                Expr::Member {
                    target: Box::new(self.expr(target, scope)?),
                    name: name.clone(),
                },
                None,
            )),
            Expr::Lambda {
                collection,
                kind,
                variable,
                predicate,
            } => {
                let Expr::Reference(path) = collection.as_ref() else {
                    return Err(Error::invalid_command(
                        "a lambda operator must apply to a member path",
                    ));
                };
                let (path, element) = self.collection(path, scope)?;
                let mut inner = scope.clone();
                inner.variables.push((variable.clone(), element));
                Ok((
                    Expr::Lambda {
                        collection: Box::new(Expr::Reference(path)),
                        kind: *kind,
                        variable: variable.clone(),
                        predicate: Box::new(self.expr(predicate, &inner)?),
                    },
                    None,
                ))
            }
        }
    }

    /// Walks a member path from the scope owner or a range variable.
    fn walk(
        &self,
        path: &MemberPath,
        scope: &Scope<'a>,
    ) -> Result<(Vec<String>, Option<Member<'a>>, Option<StructuredType<'a>>), Error> {
        let segments = path.segments();
        let variable = segments
            .first()
            .and_then(|first| scope.variables.iter().rev().find(|(v, _)| v == first));
        let (mut names, mut owner, rest) = match variable {
            Some((name, element)) => (vec![name.clone()], *element, &segments[1..]),
            None => (Vec::new(), scope.owner, segments),
        };

        let mut last = None;
        for segment in rest {
            let structured = owner.ok_or_else(|| Error::unresolvable("property", segment.clone()))?;
            let member = self.view.member(structured, segment)?;
            names.push(member.name().to_string());
            owner = self.view.member_type(member)?;
            last = Some(member);
        }
        Ok((names, last, owner))
    }

    fn reference(
        &self,
        path: &MemberPath,
        scope: &Scope<'a>,
    ) -> Result<(MemberPath, Option<&'a EdmType>), Error> {
        let (names, last, _) = self.walk(path, scope)?;
        let edm_type = match last {
            Some(Member::Property(property)) => Some(property.edm_type.element_type()),
            _ => None,
        };
        Ok((MemberPath::from_segments(names), edm_type))
    }

    fn collection(
        &self,
        path: &MemberPath,
        scope: &Scope<'a>,
    ) -> Result<(MemberPath, Option<StructuredType<'a>>), Error> {
        let (names, last, element) = self.walk(path, scope)?;
        let is_collection = match last {
            Some(Member::Navigation(n)) => n.is_collection(),
            Some(Member::Property(p)) => matches!(p.edm_type, EdmType::Collection(_)),
            None => false,
        };
        if !is_collection {
            return Err(Error::invalid_command(format!(
                "'{}' is not a collection",
                path
            )));
        }
        Ok((MemberPath::from_segments(names), element))
    }

    fn qualify_type(&self, name: &str) -> String {
        if name.contains('.') {
            return name.to_string();
        }
        let catalog = self.view.catalog();
        let found = self
            .view
            .entity_type(name)
            .map(|t| t.name.as_str())
            .ok()
            .or_else(|| catalog.complex_type(name).map(|t| t.name.as_str()));
        match found {
            Some(type_name) => catalog.qualified_name(type_name),
            None => name.to_string(),
        }
    }

    // =========================================================================
    // Payloads
    // =========================================================================

    fn payload(
        &self,
        entity_type: &'a EntityType,
        entry: &Entry,
    ) -> Result<(Entry, Vec<ResolvedBinding>), Error> {
        let mut resolved = Entry::new();
        for (name, value) in entry.fields() {
            match self.view.member(StructuredType::Entity(entity_type), name)? {
                Member::Property(property) => {
                    let value = self.coerce(value.clone(), &property.edm_type)?;
                    resolved.insert(property.name.clone(), value);
                }
                Member::Navigation(navigation) => {
                    resolved.insert(navigation.name.clone(), value.clone());
                }
            }
        }

        let mut bindings: Vec<ResolvedBinding> = Vec::new();
        for binding in entry.bindings() {
            let navigation = self.view.navigation(entity_type, &binding.navigation)?;
            match bindings.iter_mut().find(|b| b.navigation == navigation.name) {
                Some(existing) => existing.targets.push(binding.target.clone()),
                None => bindings.push(ResolvedBinding {
                    navigation: navigation.name.clone(),
                    is_collection: navigation.is_collection(),
                    targets: vec![binding.target.clone()],
                }),
            }
        }
        Ok((resolved, bindings))
    }

    // =========================================================================
    // Literal coercion
    // =========================================================================

    /// Converts a caller-supplied value to the variant matching `edm_type`.
    ///
    /// Values that already fit, and types without a closer variant, pass
    /// through unchanged.
    fn coerce(&self, value: Value, edm_type: &EdmType) -> Result<Value, Error> {
        let integral = match &value {
            Value::Enum(_) => None,
            other => other.as_i64(),
        };
        let mismatch = |value: &Value| -> Error {
            ConversionError::new(format!("{:?}", value), edm_type.to_string()).into()
        };

        match (edm_type, integral) {
            (_, _) if value.is_null() => Ok(Value::Null),
            (EdmType::Byte, Some(n)) => u8::try_from(n).map(Value::Byte).map_err(|_| mismatch(&value)),
            (EdmType::SByte, Some(n)) => i8::try_from(n).map(Value::SByte).map_err(|_| mismatch(&value)),
            (EdmType::Int16, Some(n)) => i16::try_from(n).map(Value::Short).map_err(|_| mismatch(&value)),
            (EdmType::Int32, Some(n)) => i32::try_from(n).map(Value::Int).map_err(|_| mismatch(&value)),
            (EdmType::Int64, Some(n)) => Ok(Value::Long(n)),
            (EdmType::Double, Some(n)) => Ok(Value::Float(n as f64)),
            (EdmType::Single, Some(n)) => Ok(Value::Single(n as f32)),
            (EdmType::Decimal, Some(n)) => Ok(Value::Decimal(Decimal::from(n))),
            (EdmType::Named(name), _) => match self.view.catalog().enum_type(name) {
                Some(enum_type) => self.coerce_enum(enum_type, value),
                None => Ok(value),
            },
            _ => match (edm_type, value) {
                (EdmType::Double, Value::Single(f)) => Ok(Value::Float(f as f64)),
                (EdmType::Single, Value::Float(f)) => Ok(Value::Single(f as f32)),
                (EdmType::Decimal, Value::Float(f)) => Decimal::try_from(f)
                    .map(Value::Decimal)
                    .map_err(|_| mismatch(&Value::Float(f))),
                (EdmType::Guid, Value::String(s)) => Uuid::parse_str(&s)
                    .map(Value::Guid)
                    .map_err(|_| ConversionError::new(s, edm_type.to_string()).into()),
                (EdmType::DateTime, Value::DateTime(dt)) => Ok(Value::LocalDateTime(dt.naive_utc())),
                (EdmType::DateTimeOffset, Value::LocalDateTime(dt)) => Ok(Value::DateTime(dt.and_utc())),
                (_, value) => Ok(value),
            },
        }
    }

    fn coerce_enum(&self, enum_type: &EnumType, value: Value) -> Result<Value, Error> {
        let qualified = self.view.catalog().qualified_name(&enum_type.name);
        match value {
            Value::String(text) => {
                let mut total = 0;
                let mut names = Vec::new();
                for part in text.split(',').map(str::trim) {
                    let member = enum_type
                        .members
                        .iter()
                        .find(|m| m.name.eq_ignore_ascii_case(part))
                        .ok_or_else(|| ConversionError::new(text.clone(), qualified.clone()))?;
                    total |= member.value;
                    names.push(member.name.clone());
                }
                Ok(Value::Enum(EnumValue::new(qualified, names.join(","), total)))
            }
            Value::Enum(mut e) => {
                e.type_name.get_or_insert(qualified);
                if e.member.is_none() {
                    e.member = member_names(enum_type, e.value);
                }
                Ok(Value::Enum(e))
            }
            other => match other.as_i64() {
                Some(n) => Ok(Value::Enum(EnumValue {
                    type_name: Some(qualified),
                    member: member_names(enum_type, n),
                    value: n,
                })),
                None => Ok(other),
            },
        }
    }
}

/// Names the members making up `value`: an exact member, or the flag
/// members summing to it.
pub(crate) fn member_names(enum_type: &EnumType, value: i64) -> Option<String> {
    if let Some(member) = enum_type.members.iter().find(|m| m.value == value) {
        return Some(member.name.clone());
    }
    if !enum_type.is_flags {
        return None;
    }
    let flags: Vec<_> = enum_type
        .members
        .iter()
        .filter(|m| m.value != 0 && value & m.value == m.value)
        .collect();
    let covered = flags.iter().fold(0, |acc, m| acc | m.value);
    (covered == value && !flags.is_empty())
        .then(|| flags.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join(","))
}

fn is_comparison(op: BinaryOperator) -> bool {
    matches!(
        op,
        BinaryOperator::Eq
            | BinaryOperator::Ne
            | BinaryOperator::Gt
            | BinaryOperator::Ge
            | BinaryOperator::Lt
            | BinaryOperator::Le
            | BinaryOperator::Has
    )
}

/// Rejects clauses on a level that is followed by a navigation.
fn ensure_addressing_only(level: &CommandData) -> Result<(), Error> {
    let has_clauses = !level.select.is_empty()
        || !level.expands.is_empty()
        || !level.order_by.is_empty()
        || level.skip.is_some()
        || level.top.is_some_and(|n| n != 1)
        || level.include_count
        || level.count
        || level.media
        || level.link.is_some()
        || level.entry.is_some();
    if has_clauses {
        return Err(Error::invalid_command(
            "query clauses must follow the last navigation",
        ));
    }
    Ok(())
}

fn ensure_expand<'e>(
    expands: &'e mut Vec<ResolvedExpand>,
    navigation: &str,
    is_collection: bool,
) -> &'e mut ResolvedExpand {
    let index = match expands.iter().position(|e| e.navigation == navigation) {
        Some(index) => index,
        None => {
            expands.push(ResolvedExpand::new(navigation, is_collection));
            expands.len() - 1
        }
    };
    &mut expands[index]
}

/// Finds or creates the expand levels for `steps` and returns the innermost
/// projection. Structural steps prefix the following association name.
fn expand_chain<'p>(mut projection: &'p mut Projection, steps: &[PathStep]) -> &'p mut Projection {
    let mut prefix: Vec<&str> = Vec::new();
    for step in steps {
        prefix.push(&step.name);
        if step.kind == StepKind::Property {
            continue;
        }
        let name = prefix.join("/");
        prefix.clear();
        let node = ensure_expand(&mut projection.expands, &name, step.kind == StepKind::ToMany);
        projection = &mut node.projection;
    }
    projection
}
