//! Append-only storage of immutable command snapshots

use std::sync::Arc;

use super::ExpandSpec;
use super::OrderBy;
use crate::expr::Expr;
use crate::model::Entry;
use crate::model::Value;

/// Handle of a snapshot inside a [`CommandArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(usize);

/// What a command addresses at its own level of the chain.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    /// Root entity set (or entity type name narrowing one).
    Collection(String),
    /// Association followed from the parent command.
    Navigation(String),
    /// Function import (side-effect free).
    Function(String),
    /// Action import.
    Action(String),
}

/// Key as supplied by the caller, before matching against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValues {
    /// Value of a single-property key.
    Single(Value),
    /// Named values of a (possibly composite) key.
    Named(Vec<(String, Value)>),
}

/// Clauses accumulated at one level of a command chain.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandData {
    pub(crate) parent: Option<CommandId>,
    pub(crate) target: Target,
    pub(crate) derived_type: Option<String>,
    pub(crate) key: Option<KeyValues>,
    pub(crate) filter: Option<Expr>,
    pub(crate) select: Vec<String>,
    pub(crate) expands: Vec<ExpandSpec>,
    pub(crate) order_by: OrderBy,
    pub(crate) skip: Option<u64>,
    pub(crate) top: Option<u64>,
    pub(crate) include_count: bool,
    pub(crate) count: bool,
    pub(crate) media: bool,
    pub(crate) link: Option<String>,
    pub(crate) parameters: Vec<(String, Value)>,
    pub(crate) entry: Option<Entry>,
    /// First malformed builder input, reported when the command resolves.
    pub(crate) malformed: Option<String>,
}

impl CommandData {
    pub(crate) fn new(parent: Option<CommandId>, target: Target) -> Self {
        Self {
            parent,
            target,
            derived_type: None,
            key: None,
            filter: None,
            select: Vec::new(),
            expands: Vec::new(),
            order_by: OrderBy::default(),
            skip: None,
            top: None,
            include_count: false,
            count: false,
            media: false,
            link: None,
            parameters: Vec::new(),
            entry: None,
            malformed: None,
        }
    }
}

/// Snapshots are shared between every command derived from them and are
/// never mutated once pushed; each one refers to its parent by index.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommandArena {
    nodes: Vec<Arc<CommandData>>,
}

impl CommandArena {
    pub(crate) fn push(&mut self, data: CommandData) -> CommandId {
        self.nodes.push(Arc::new(data));
        CommandId(self.nodes.len() - 1)
    }

    pub(crate) fn get(&self, id: CommandId) -> &CommandData {
        &self.nodes[id.0]
    }

    /// Returns the chain ending at `id`, root first.
    pub(crate) fn chain(&self, id: CommandId) -> Vec<&CommandData> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.get(id);
            chain.push(node);
            current = node.parent;
        }
        chain.reverse();
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_is_root_first() {
        let mut arena = CommandArena::default();
        let root = arena.push(CommandData::new(None, Target::Collection("Categories".into())));
        let child = arena.push(CommandData::new(Some(root), Target::Navigation("Products".into())));

        let chain = arena.chain(child);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].target, Target::Collection("Categories".into()));
        assert_eq!(chain[1].target, Target::Navigation("Products".into()));
    }
}
