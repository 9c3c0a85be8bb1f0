//! The built command graph.
//!
//! [`GraphBuilder`] expands a root definition into a tree of
//! [`CommandNode`](node::CommandNode)s, validates it, and renders the clap
//! command tree. The resulting [`RuntimeGraph`] is immutable and cheap to
//! clone; every parse, bind and invocation borrows it.

mod builder;
mod node;

pub use builder::GraphBuilder;
pub use node::{CommandInfo, NodeId, NodeVariant};
pub(crate) use node::{CommandNode, NodeKind};

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::fs::FileSystem;
use crate::parse::TokenNormalizer;
use crate::services::{FunctionResolver, ServiceResolver};
use crate::settings::Settings;
use crate::symbol::SymbolInfo;

/// Lookup tables shared by every parse result of one graph.
pub(crate) struct BindingContext {
    /// Definition type → node.
    pub(crate) descriptors: HashMap<TypeId, NodeId>,
    /// Command path (canonical names below the root) → node.
    pub(crate) commands: HashMap<Vec<String>, NodeId>,
    pub(crate) services: RwLock<Option<Arc<dyn ServiceResolver>>>,
    pub(crate) functions: RwLock<Option<Arc<dyn FunctionResolver>>>,
}

pub(crate) struct GraphInner {
    pub(crate) nodes: Vec<CommandNode>,
    pub(crate) root: NodeId,
    pub(crate) command: clap::Command,
    pub(crate) binding: BindingContext,
    pub(crate) settings: Settings,
    /// Indexed by node.
    pub(crate) normalizers: Vec<TokenNormalizer>,
    pub(crate) directives: Vec<String>,
    pub(crate) file_system: Arc<dyn FileSystem>,
}

/// A validated command tree, ready for repeated parsing and invocation.
#[derive(Clone)]
pub struct RuntimeGraph {
    pub(crate) inner: Arc<GraphInner>,
}

impl std::fmt::Debug for RuntimeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeGraph")
            .field("nodes", &self.inner.nodes.len())
            .field("root", &self.inner.root)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct TreeView<'a> {
    #[serde(flatten)]
    info: &'a CommandInfo,
    symbols: Vec<&'a SymbolInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeView<'a>>,
}

impl RuntimeGraph {
    pub(crate) fn node(&self, id: NodeId) -> &CommandNode {
        &self.inner.nodes[id.0]
    }

    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// The clap command tree the graph parses with.
    pub fn clap_command(&self) -> &clap::Command {
        &self.inner.command
    }

    pub fn len(&self) -> usize {
        self.inner.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.nodes.is_empty()
    }

    pub fn info(&self, id: NodeId) -> Option<&CommandInfo> {
        self.inner.nodes.get(id.0).map(|n| &n.info)
    }

    /// Children of `id` in their final order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.inner
            .nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn symbols(&self, id: NodeId) -> Vec<&SymbolInfo> {
        self.inner
            .nodes
            .get(id.0)
            .map(|n| n.symbol_infos().collect())
            .unwrap_or_default()
    }

    /// Node of a command or function type.
    pub fn node_for<T: Any>(&self) -> Option<NodeId> {
        self.inner
            .binding
            .descriptors
            .get(&TypeId::of::<T>())
            .copied()
    }

    /// Node at a path of canonical command names below the root.
    pub fn find(&self, path: &[&str]) -> Option<NodeId> {
        let key: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        self.inner.binding.commands.get(&key).copied()
    }

    /// Nodes from the root down to `id`, inclusive.
    pub fn ancestry(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            chain.push(node);
            current = self.parent(node);
        }
        chain.reverse();
        chain
    }

    /// Replaces the process-wide default service resolver.
    pub fn set_default_services(&self, resolver: Arc<dyn ServiceResolver>) {
        *self.inner.binding.services.write() = Some(resolver);
    }

    /// Replaces the process-wide default function resolver.
    pub fn set_default_functions(&self, resolver: Arc<dyn FunctionResolver>) {
        *self.inner.binding.functions.write() = Some(resolver);
    }

    pub(crate) fn default_services(&self) -> Option<Arc<dyn ServiceResolver>> {
        self.inner.binding.services.read().clone()
    }

    pub(crate) fn default_functions(&self) -> Option<Arc<dyn FunctionResolver>> {
        self.inner.binding.functions.read().clone()
    }

    fn tree_view(&self, id: NodeId) -> TreeView<'_> {
        let node = self.node(id);
        TreeView {
            info: &node.info,
            symbols: node.symbol_infos().collect(),
            children: node.children.iter().map(|c| self.tree_view(*c)).collect(),
        }
    }

    /// Describes the whole tree as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.tree_view(self.inner.root))
    }
}
