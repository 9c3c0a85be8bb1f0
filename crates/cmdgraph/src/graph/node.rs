//! Command nodes of a built graph.

use std::any::Any;

use serde::Serialize;

use crate::invoke::Handler;
use crate::model::{Constructor, ParamDecl, SetParent, TypeKey};
use crate::naming::NamingPolicy;
use crate::symbol::{Binder, Symbol, SymbolInfo, ValueAccessor};

/// Index of a node in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Which kind of definition backs a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeVariant {
    Type,
    Method,
    Function,
}

/// Public description of a command node.
#[derive(Debug, Clone, Serialize)]
pub struct CommandInfo {
    pub name: String,
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub hidden: bool,
    /// Names from the root's first child down to this node.
    pub path: Vec<String>,
    pub order: i32,
    pub variant: NodeVariant,
    pub treat_unmatched_tokens_as_errors: bool,
}

pub(crate) enum NodeKind {
    Type {
        key: TypeKey,
        constructor: Constructor,
        handler: Option<Handler>,
    },
    Method {
        name: &'static str,
        declaring: TypeKey,
        params: Vec<ParamDecl>,
        handler: Handler,
    },
    Function {
        key: TypeKey,
        params: Vec<ParamDecl>,
        handler: Handler,
        accepts: fn(&(dyn Any + Send + Sync)) -> bool,
    },
}

/// Wires an ancestor's bound instance into a field of this node's instance.
pub(crate) struct ParentAccessor {
    pub(crate) parent: NodeId,
    pub(crate) member: &'static str,
    pub(crate) set: SetParent,
}

pub(crate) struct CommandNode {
    pub(crate) kind: NodeKind,
    pub(crate) info: CommandInfo,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) binders: Vec<Binder>,
    pub(crate) value_accessors: Vec<ValueAccessor>,
    pub(crate) parent_accessors: Vec<ParentAccessor>,
    pub(crate) policy: NamingPolicy,
}

impl CommandNode {
    /// The type bound for this node: its own type, or the declaring type of
    /// a method.
    pub(crate) fn bound_key(&self) -> TypeKey {
        match &self.kind {
            NodeKind::Type { key, .. } | NodeKind::Function { key, .. } => *key,
            NodeKind::Method { declaring, .. } => *declaring,
        }
    }

    /// Display name used in error messages.
    pub(crate) fn display_name(&self) -> String {
        match &self.kind {
            NodeKind::Type { key, .. } | NodeKind::Function { key, .. } => key.short_name().to_string(),
            NodeKind::Method { name, declaring, .. } => {
                format!("{}::{}", declaring.short_name(), name)
            }
        }
    }

    pub(crate) fn params(&self) -> &[ParamDecl] {
        match &self.kind {
            NodeKind::Type { .. } => &[],
            NodeKind::Method { params, .. } | NodeKind::Function { params, .. } => params,
        }
    }

    pub(crate) fn handler(&self) -> Option<&Handler> {
        match &self.kind {
            NodeKind::Type { handler, .. } => handler.as_ref(),
            NodeKind::Method { handler, .. } | NodeKind::Function { handler, .. } => Some(handler),
        }
    }

    pub(crate) fn symbol_infos(&self) -> impl Iterator<Item = &SymbolInfo> {
        self.symbols.iter().map(|s| &s.info)
    }
}
