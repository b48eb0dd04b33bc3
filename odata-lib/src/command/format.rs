//! URI formatting of resolved commands

use super::resolve::Projection;
use super::resolve::ResolvedCommand;
use super::resolve::ResolvedExpand;
use super::resolve::ResolvedPath;
use super::Direction;
use crate::error::Error;
use crate::expr::ExprFormatter;
use crate::metadata::FunctionKind;
use crate::model::Value;
use crate::protocol::literal::escape;
use crate::protocol::ExpandStyle;
use crate::protocol::ProtocolAdapter;

/// Formats resolved commands into service-relative URIs.
///
/// Clause values are percent-escaped exactly once, here.
#[derive(Debug, Clone, Copy)]
pub struct CommandFormatter<'a> {
    adapter: &'a dyn ProtocolAdapter,
    expand_style: ExpandStyle,
}

#[derive(Default)]
struct Clauses {
    expand: Vec<String>,
    select: Vec<String>,
    order_by: Vec<String>,
}

impl<'a> CommandFormatter<'a> {
    pub fn new(adapter: &'a dyn ProtocolAdapter) -> Self {
        Self {
            adapter,
            expand_style: adapter.expand_style(),
        }
    }

    /// Overrides the expand style. Adapters that only support flattened
    /// expands keep it.
    pub fn with_expand_style(mut self, style: ExpandStyle) -> Self {
        if self.adapter.expand_style() == ExpandStyle::Nested {
            self.expand_style = style;
        }
        self
    }

    /// Formats the full relative URI: path, suffix and query clauses.
    pub fn format(&self, command: &ResolvedCommand) -> Result<String, Error> {
        let (mut uri, parameters) = self.target(command);
        if let Some(link) = &command.link {
            uri.push('/');
            uri.push_str(&self.adapter.link_path(&link.navigation, None));
        }
        if command.media {
            uri.push_str("/$value");
        }
        if command.count {
            uri.push_str("/$count");
        }

        let mut clauses: Vec<(String, String)> = parameters;
        if let Some(filter) = &command.filter {
            clauses.push(("$filter".into(), ExprFormatter::new(self.adapter).format(filter)?));
        }
        if let Some(skip) = command.skip {
            clauses.push(("$skip".into(), skip.to_string()));
        }
        if let Some(top) = command.top {
            clauses.push(("$top".into(), top.to_string()));
        }
        let projection = self.projection(&command.projection)?;
        if !projection.expand.is_empty() {
            clauses.push(("$expand".into(), projection.expand.join(",")));
        }
        if !projection.select.is_empty() {
            clauses.push(("$select".into(), projection.select.join(",")));
        }
        if !projection.order_by.is_empty() {
            clauses.push(("$orderby".into(), projection.order_by.join(",")));
        }
        if command.include_count {
            let (name, value) = self.adapter.inline_count_option();
            clauses.push((name.into(), value.into()));
        }

        if !clauses.is_empty() {
            let query: Vec<String> = clauses
                .iter()
                .map(|(name, value)| format!("{}={}", name, escape(value)))
                .collect();
            uri.push('?');
            uri.push_str(&query.join("&"));
        }
        log::trace!("formatted command: {}", uri);
        Ok(uri)
    }

    /// Formats the addressed resource only, without suffixes or clauses.
    pub fn path(&self, command: &ResolvedCommand) -> String {
        self.target(command).0
    }

    /// Formats the link between `source` and one related entity, as used to
    /// remove a member of a to-many association.
    pub fn link_path(&self, source: &ResolvedCommand, related_key: Option<&[(String, Value)]>) -> Result<String, Error> {
        let link = source
            .link
            .as_ref()
            .ok_or_else(|| Error::invalid_command("command does not address a link"))?;
        let key = related_key.map(|key| self.key_segment(key));
        Ok(format!(
            "{}/{}",
            self.path(source),
            self.adapter.link_path(&link.navigation, key.as_deref())
        ))
    }

    /// Formats a key as `(v)` or `(A=v1,B=v2)`, escaped.
    pub fn key_segment(&self, key: &[(String, Value)]) -> String {
        let text = match key {
            [(_, value)] => self.adapter.format_literal(value),
            _ => key
                .iter()
                .map(|(name, value)| format!("{}={}", name, self.adapter.format_literal(value)))
                .collect::<Vec<_>>()
                .join(","),
        };
        format!("({})", escape(&text))
    }

    /// Path plus any parameters that travel as query clauses.
    fn target(&self, command: &ResolvedCommand) -> (String, Vec<(String, String)>) {
        if let Some(operation) = &command.operation {
            if operation.kind == FunctionKind::Action {
                return (operation.name.clone(), Vec::new());
            }
            let parameters: Vec<(String, String)> = operation
                .parameters
                .iter()
                .map(|(name, value)| (name.clone(), self.adapter.format_literal(value)))
                .collect();
            let (segment, query) = self.adapter.function_call(&operation.name, &parameters);
            return (escape(&segment), query);
        }

        let segments: Vec<String> = command
            .path
            .iter()
            .map(|segment| {
                let mut text = segment.name.clone();
                if let Some(derived) = &segment.derived_type {
                    text.push('/');
                    text.push_str(derived);
                }
                if let Some(key) = &segment.key {
                    text.push_str(&self.key_segment(key));
                }
                text
            })
            .collect();
        (segments.join("/"), Vec::new())
    }

    fn projection(&self, projection: &Projection) -> Result<Clauses, Error> {
        let mut clauses = Clauses {
            select: projection.select.iter().map(ToString::to_string).collect(),
            order_by: projection
                .order_by
                .iter()
                .map(|(path, direction)| order_item(&path.to_string(), *direction))
                .collect(),
            ..Clauses::default()
        };
        match self.expand_style {
            ExpandStyle::Nested => {
                clauses.expand = projection
                    .expands
                    .iter()
                    .map(|e| self.nested(e))
                    .collect::<Result<_, _>>()?;
            }
            ExpandStyle::Flattened => self.flatten(&projection.expands, "", &mut clauses)?,
        }
        Ok(clauses)
    }

    /// `Nav($filter=..;$skip=..;$top=..;$expand=..;$select=..;$orderby=..;$levels=..)`
    fn nested(&self, expand: &ResolvedExpand) -> Result<String, Error> {
        let mut options = Vec::new();
        if let Some(filter) = &expand.filter {
            options.push(format!("$filter={}", ExprFormatter::new(self.adapter).format(filter)?));
        }
        if let Some(skip) = expand.skip {
            options.push(format!("$skip={}", skip));
        }
        if let Some(top) = expand.top {
            options.push(format!("$top={}", top));
        }
        let inner = self.projection(&expand.projection)?;
        if !inner.expand.is_empty() {
            options.push(format!("$expand={}", inner.expand.join(",")));
        }
        if !inner.select.is_empty() {
            options.push(format!("$select={}", inner.select.join(",")));
        }
        if !inner.order_by.is_empty() {
            options.push(format!("$orderby={}", inner.order_by.join(",")));
        }
        if let Some(levels) = expand.levels {
            options.push(format!("$levels={}", levels));
        }

        if options.is_empty() {
            Ok(expand.navigation.clone())
        } else {
            Ok(format!("{}({})", expand.navigation, options.join(";")))
        }
    }

    /// Emits leaf expand paths; nested selects and orderings are prefixed
    /// with their path. Levels repeat the association.
    fn flatten(&self, expands: &[ResolvedExpand], prefix: &str, clauses: &mut Clauses) -> Result<(), Error> {
        for expand in expands {
            if expand.filter.is_some() || expand.top.is_some() || expand.skip.is_some() {
                return Err(Error::invalid_command(format!(
                    "filter, top and skip on expanded '{}' require nested expand syntax",
                    expand.navigation
                )));
            }

            let mut path = prefix.to_string();
            for _ in 0..expand.levels.unwrap_or(1).max(1) {
                if !path.is_empty() {
                    path.push('/');
                }
                path.push_str(&expand.navigation);
                let projection = &expand.projection;
                clauses
                    .select
                    .extend(projection.select.iter().map(|p| prefixed(&path, p)));
                clauses.order_by.extend(
                    projection
                        .order_by
                        .iter()
                        .map(|(p, direction)| order_item(&prefixed(&path, p), *direction)),
                );
            }

            if expand.projection.expands.is_empty() {
                clauses.expand.push(path);
            } else {
                self.flatten(&expand.projection.expands, &path, clauses)?;
            }
        }
        Ok(())
    }
}

fn prefixed(prefix: &str, path: &ResolvedPath) -> String {
    format!("{}/{}", prefix, path)
}

fn order_item(path: &str, direction: Direction) -> String {
    match direction {
        Direction::Asc => path.to_string(),
        Direction::Desc => format!("{} desc", path),
    }
}

impl ResolvedCommand {
    /// Formats this command with `adapter`'s default expand style.
    pub fn format(&self, adapter: &dyn ProtocolAdapter) -> Result<String, Error> {
        CommandFormatter::new(adapter).format(self)
    }
}
