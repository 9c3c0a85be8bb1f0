//! Graph construction.
//!
//! Building runs in fixed phases, each of which may fail with an
//! [`AuthoringError`]:
//!
//! 1. discover every reachable definition (children, parents, registered types),
//! 2. detect cycles in the children relation,
//! 3. check that every command has a single parent,
//! 4. build nodes top-down, naming symbols and checking option visibility,
//! 5. render the clap command tree and the lookup tables.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use clap::builder::ValueParser;
use clap::{Arg, ArgAction, Command};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::node::{CommandInfo, CommandNode, NodeId, NodeKind, NodeVariant, ParentAccessor};
use super::{BindingContext, GraphInner, RuntimeGraph};
use crate::error::AuthoringError;
use crate::fs::{FileSystem, RealFileSystem};
use crate::model::{CommandModel, CommandRef, MethodDecl, ModelKind, ParamKind, SymbolDecl, TypeKey};
use crate::naming::{AliasPool, ClapName, NamingPolicy, SymbolKind};
use crate::parse::{TokenNormalizer, UNMATCHED_ID};
use crate::services::{FunctionResolver, ServiceResolver};
use crate::settings::Settings;
use crate::shape::{CommandDefinition, FunctionShape};
use crate::symbol::{build_symbol, Symbol, SymbolContext};
use crate::value::ValueShape;

pub(crate) const HELP_ID: &str = "help";
pub(crate) const VERSION_ID: &str = "version";
const BUILT_IN: &str = "<built-in>";

enum RootDecl {
    Type(CommandRef),
    Function(Box<CommandModel>),
}

/// Builds a [`RuntimeGraph`] from a root definition.
///
/// ```rust,ignore
/// let graph = GraphBuilder::new::<RootCommand>()
///     .register::<ChildDeclaringParent>()
///     .settings(Settings::default().with_version("1.2.0"))
///     .build()?;
/// ```
pub struct GraphBuilder {
    root: RootDecl,
    catalog: Vec<CommandRef>,
    settings: Settings,
    file_system: Arc<dyn FileSystem>,
    services: Option<Arc<dyn ServiceResolver>>,
    functions: Option<Arc<dyn FunctionResolver>>,
}

impl GraphBuilder {
    fn with_root(root: RootDecl) -> Self {
        Self {
            root,
            catalog: Vec::new(),
            settings: Settings::default(),
            file_system: Arc::new(RealFileSystem),
            services: None,
            functions: None,
        }
    }

    pub fn new<T: CommandDefinition>() -> Self {
        Self::with_root(RootDecl::Type(CommandRef::of::<T>()))
    }

    /// Uses a standalone function as the root command.
    pub fn from_function<F: Any + Send + Sync>(shape: FunctionShape<F>) -> Self {
        Self::with_root(RootDecl::Function(Box::new(shape.into_model())))
    }

    /// Makes a definition discoverable even if no command lists it as a child.
    ///
    /// Needed for commands that only declare their parent.
    pub fn register<T: CommandDefinition>(mut self) -> Self {
        self.catalog.push(CommandRef::of::<T>());
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// File system used by path validation rules.
    pub fn file_system<F: FileSystem + 'static>(mut self, file_system: F) -> Self {
        self.file_system = Arc::new(file_system);
        self
    }

    /// Process-wide default service resolver.
    pub fn services<R: ServiceResolver + 'static>(mut self, resolver: R) -> Self {
        self.services = Some(Arc::new(resolver));
        self
    }

    /// Process-wide default function resolver.
    pub fn functions<R: FunctionResolver + 'static>(mut self, resolver: R) -> Self {
        self.functions = Some(Arc::new(resolver));
        self
    }

    pub fn build(self) -> Result<RuntimeGraph, AuthoringError> {
        let root = match self.root {
            RootDecl::Type(reference) => (reference.model)()?,
            RootDecl::Function(model) => *model,
        };

        let catalog = Catalog::discover(root, &self.catalog)?;
        let edges = catalog.child_edges();
        detect_cycles(&catalog.models, &edges)?;
        check_parents(&catalog)?;

        let mut tree = TreeBuilder {
            models: &catalog.models,
            edges: &edges,
            settings: &self.settings,
            nodes: Vec::new(),
            descriptors: HashMap::new(),
            commands: HashMap::new(),
        };

        let mut inherited = Visible::default();
        if self.settings.enable_help {
            inherited.insert_built_in("--help");
            inherited.insert_built_in("-h");
        }
        let root_id = tree.add_node(
            Source::Model(0),
            None,
            &NamingPolicy::default(),
            Vec::new(),
            &inherited,
            &Visible::default(),
        )?;

        let TreeBuilder {
            nodes,
            descriptors,
            commands,
            ..
        } = tree;

        let mut command = root_command(&nodes, root_id, &self.settings);
        command.build();
        let normalizers = (0..nodes.len())
            .map(|i| TokenNormalizer::new(visible_option_names(&nodes, NodeId(i))))
            .collect();
        let directives = directive_names(&nodes, &self.settings);

        debug!(
            commands = nodes.len(),
            root = %nodes[root_id.0].info.name,
            "built command graph"
        );

        Ok(RuntimeGraph {
            inner: Arc::new(GraphInner {
                nodes,
                root: root_id,
                command,
                binding: BindingContext {
                    descriptors,
                    commands,
                    services: RwLock::new(self.services),
                    functions: RwLock::new(self.functions),
                },
                settings: self.settings,
                normalizers,
                directives,
                file_system: self.file_system,
            }),
        })
    }
}

/// Every definition reachable from the root, in discovery order.
struct Catalog {
    models: Vec<CommandModel>,
    index: HashMap<TypeId, usize>,
}

impl Catalog {
    fn discover(root: CommandModel, registered: &[CommandRef]) -> Result<Self, AuthoringError> {
        let mut catalog = Catalog {
            models: Vec::new(),
            index: HashMap::new(),
        };
        let mut queue = VecDeque::new();

        catalog.push(root, &mut queue);
        queue.extend(registered.iter().copied());

        while let Some(reference) = queue.pop_front() {
            if catalog.index.contains_key(&reference.key.id) {
                continue;
            }
            let model = (reference.model)()?;
            debug!(command = reference.key.name, "discovered command definition");
            catalog.push(model, &mut queue);
        }

        Ok(catalog)
    }

    fn push(&mut self, model: CommandModel, queue: &mut VecDeque<CommandRef>) {
        queue.extend(model.spec.children.iter().copied());
        queue.extend(model.spec.parent);
        self.index.insert(model.key.id, self.models.len());
        self.models.push(model);
    }

    fn position(&self, key: &TypeKey) -> Option<usize> {
        self.index.get(&key.id).copied()
    }

    /// Children per model: declared children first, then types naming this
    /// one as their parent.
    fn child_edges(&self) -> Vec<Vec<usize>> {
        let mut edges = vec![Vec::new(); self.models.len()];

        for (i, model) in self.models.iter().enumerate() {
            for child in &model.spec.children {
                if let Some(j) = self.position(&child.key) {
                    if !edges[i].contains(&j) {
                        edges[i].push(j);
                    }
                }
            }
        }

        for (j, model) in self.models.iter().enumerate() {
            if let Some(i) = model.spec.parent.and_then(|p| self.position(&p.key)) {
                if !edges[i].contains(&j) {
                    edges[i].push(j);
                }
            }
        }

        edges
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Active,
    Done,
}

fn detect_cycles(models: &[CommandModel], edges: &[Vec<usize>]) -> Result<(), AuthoringError> {
    let mut marks = vec![Mark::New; models.len()];
    let mut stack = Vec::new();
    for start in 0..models.len() {
        visit(start, models, edges, &mut marks, &mut stack)?;
    }
    Ok(())
}

fn visit(
    i: usize,
    models: &[CommandModel],
    edges: &[Vec<usize>],
    marks: &mut [Mark],
    stack: &mut Vec<usize>,
) -> Result<(), AuthoringError> {
    match marks[i] {
        Mark::Done => return Ok(()),
        Mark::Active => {
            let start = stack.iter().position(|&s| s == i).unwrap_or(0);
            let mut path: Vec<&'static str> = stack[start..]
                .iter()
                .map(|&s| models[s].key.short_name())
                .collect();
            path.push(models[i].key.short_name());
            return Err(AuthoringError::Cycle { path });
        }
        Mark::New => {}
    }

    marks[i] = Mark::Active;
    stack.push(i);
    for &child in &edges[i] {
        visit(child, models, edges, marks, stack)?;
    }
    stack.pop();
    marks[i] = Mark::Done;
    Ok(())
}

fn check_parents(catalog: &Catalog) -> Result<(), AuthoringError> {
    let mut listers: HashMap<TypeId, Vec<usize>> = HashMap::new();
    for (i, model) in catalog.models.iter().enumerate() {
        for child in &model.spec.children {
            let entry = listers.entry(child.key.id).or_default();
            if !entry.contains(&i) {
                entry.push(i);
            }
        }
    }

    for model in &catalog.models {
        let listed = listers.get(&model.key.id).map(Vec::as_slice).unwrap_or(&[]);
        let child = model.key.short_name();

        if let [first, second, ..] = listed {
            return Err(AuthoringError::ConflictingParent {
                child,
                declared: catalog.models[*first].key.short_name(),
                listed_by: catalog.models[*second].key.short_name(),
            });
        }

        if let (Some(declared), Some(&lister)) = (model.spec.parent, listed.first()) {
            let lister = &catalog.models[lister];
            if declared.key != lister.key {
                return Err(AuthoringError::ConflictingParent {
                    child,
                    declared: declared.key.short_name(),
                    listed_by: lister.key.short_name(),
                });
            }
        }
    }

    Ok(())
}

#[derive(Clone)]
struct Seen {
    alias: String,
    owner: String,
    recursive: bool,
}

/// Option names visible to a command, keyed the way clap compares them.
#[derive(Clone, Default)]
struct Visible {
    entries: HashMap<ClapName, Seen>,
}

impl Visible {
    fn get(&self, key: &ClapName) -> Option<&Seen> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: ClapName, seen: Seen) {
        self.entries.insert(key, seen);
    }

    fn insert_built_in(&mut self, alias: &str) {
        if let Some(key) = ClapName::parse(alias) {
            self.insert(
                key,
                Seen {
                    alias: alias.to_string(),
                    owner: BUILT_IN.to_string(),
                    recursive: true,
                },
            );
        }
    }

    fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|s| s.alias.as_str())
    }

    fn merged(&self, other: &Visible, recursive_only: bool) -> Visible {
        let mut merged = self.clone();
        for (key, seen) in &other.entries {
            if !recursive_only || seen.recursive {
                merged.insert(key.clone(), seen.clone());
            }
        }
        merged
    }
}

#[derive(Clone, Copy)]
enum Source<'a> {
    Model(usize),
    Method(&'a MethodDecl, TypeKey),
}

struct TreeBuilder<'a> {
    models: &'a [CommandModel],
    edges: &'a [Vec<usize>],
    settings: &'a Settings,
    nodes: Vec<CommandNode>,
    descriptors: HashMap<TypeId, NodeId>,
    commands: HashMap<Vec<String>, NodeId>,
}

impl<'a> TreeBuilder<'a> {
    fn add_node(
        &mut self,
        source: Source<'a>,
        parent: Option<NodeId>,
        parent_policy: &NamingPolicy,
        parent_path: Vec<String>,
        inherited: &Visible,
        ancestors: &Visible,
    ) -> Result<NodeId, AuthoringError> {
        let models = self.models;
        let (spec, raw_name, id_prefix, owner_name) = match source {
            Source::Model(i) => {
                let model = &models[i];
                (
                    &model.spec,
                    model.key.short_name(),
                    model.key.name.to_string(),
                    model.key.short_name().to_string(),
                )
            }
            Source::Method(decl, declaring) => (
                &decl.spec,
                decl.name,
                format!("{}::{}", declaring.name, decl.name),
                format!("{}::{}", declaring.short_name(), decl.name),
            ),
        };

        let policy = parent_policy.inherit(&spec.naming);
        let name = match &spec.name {
            Some(name) => name.clone(),
            None => policy.derive_name(raw_name, SymbolKind::Command),
        };
        let mut path = parent_path;
        if parent.is_some() {
            path.push(name.clone());
        }
        let id = NodeId(self.nodes.len());

        let mut decls: Vec<(&'static str, &SymbolDecl)> = match source {
            Source::Model(i) => match &models[i].kind {
                ModelKind::Type { .. } => models[i]
                    .members
                    .iter()
                    .map(|m| (m.member, &m.symbol))
                    .collect(),
                ModelKind::Function { params, .. } => symbol_params(params),
            },
            Source::Method(decl, _) => symbol_params(&decl.params),
        };
        decls.sort_by_key(|(_, decl)| decl.spec.order());

        let mut pool = AliasPool::new();
        for alias in inherited.aliases().chain(ancestors.aliases()) {
            pool.reserve(alias);
        }

        let mut symbols = Vec::new();
        let mut binders = Vec::new();
        let mut value_accessors = Vec::new();
        {
            let mut cx = SymbolContext {
                command: &name,
                id_prefix: &id_prefix,
                policy: &policy,
                pool: &mut pool,
            };
            for (index, (member, decl)) in decls.iter().enumerate() {
                let (symbol, binder, accessor) = build_symbol(member, decl, index, &mut cx)?;
                trace!(command = %name, symbol = %symbol.info.name, "built symbol");
                symbols.push(symbol);
                binders.push(binder);
                value_accessors.extend(accessor);
            }
        }

        check_argument_order(&owner_name, &symbols)?;

        // Option visibility: own names against inherited recursive ones, and
        // own recursive names against every ancestor option.
        let mut own = Visible::default();
        if parent.is_none() && self.settings.enable_version {
            if let Some(key) = ClapName::parse("--version") {
                own.insert(
                    key,
                    Seen {
                        alias: "--version".to_string(),
                        owner: BUILT_IN.to_string(),
                        recursive: false,
                    },
                );
            }
        }
        for symbol in symbols.iter().filter(|s| s.kind() == SymbolKind::Option) {
            for literal in symbol.all_names() {
                let Some(key) = ClapName::parse(literal) else {
                    continue;
                };
                let conflict = inherited
                    .get(&key)
                    .or_else(|| own.get(&key))
                    .or_else(|| symbol.info.recursive.then(|| ancestors.get(&key)).flatten());
                if let Some(seen) = conflict {
                    return Err(AuthoringError::OptionCollision {
                        command: owner_name.clone(),
                        alias: literal.clone(),
                        existing: seen.alias.clone(),
                        owner: seen.owner.clone(),
                    });
                }
                own.insert(
                    key,
                    Seen {
                        alias: literal.clone(),
                        owner: owner_name.clone(),
                        recursive: symbol.info.recursive,
                    },
                );
            }
        }

        let (kind, variant) = match source {
            Source::Model(i) => match &models[i].kind {
                ModelKind::Type {
                    constructor,
                    handler,
                } => (
                    NodeKind::Type {
                        key: models[i].key,
                        constructor: constructor.clone(),
                        handler: handler.clone(),
                    },
                    NodeVariant::Type,
                ),
                ModelKind::Function {
                    params,
                    handler,
                    accepts,
                } => (
                    NodeKind::Function {
                        key: models[i].key,
                        params: params.clone(),
                        handler: handler.clone(),
                        accepts: *accepts,
                    },
                    NodeVariant::Function,
                ),
            },
            Source::Method(decl, declaring) => (
                NodeKind::Method {
                    name: decl.name,
                    declaring,
                    params: decl.params.clone(),
                    handler: decl.handler.clone(),
                },
                NodeVariant::Method,
            ),
        };

        let parent_accessors = match source {
            Source::Model(i) => self.parent_accessors(&models[i], parent, &owner_name),
            Source::Method(..) => Vec::new(),
        };

        self.nodes.push(CommandNode {
            kind,
            info: CommandInfo {
                name: name.clone(),
                aliases: spec.aliases.clone(),
                description: spec.description.clone(),
                hidden: spec.hidden,
                path: path.clone(),
                order: spec.order,
                variant,
                treat_unmatched_tokens_as_errors: spec.treat_unmatched_tokens_as_errors,
            },
            parent,
            children: Vec::new(),
            symbols,
            binders,
            value_accessors,
            parent_accessors,
            policy,
        });
        if let Source::Model(i) = source {
            self.descriptors.insert(models[i].key.id, id);
        }
        self.commands.insert(path.clone(), id);
        debug!(command = %owner_name, path = ?path, "added command node");

        if let Source::Model(i) = source {
            let mut pending: Vec<(i32, Source<'a>)> = self.edges[i]
                .iter()
                .map(|&c| (models[c].spec.order, Source::Model(c)))
                .collect();
            pending.extend(
                models[i]
                    .methods
                    .iter()
                    .map(|m| (m.spec.order, Source::Method(m, models[i].key))),
            );
            pending.sort_by_key(|(order, _)| *order);

            let child_inherited = inherited.merged(&own, true);
            let child_ancestors = ancestors.merged(&own, false);
            let mut children = Vec::with_capacity(pending.len());
            for (_, child) in pending {
                children.push(self.add_node(
                    child,
                    Some(id),
                    &policy,
                    path.clone(),
                    &child_inherited,
                    &child_ancestors,
                )?);
            }
            self.check_siblings(id, &children)?;
            self.nodes[id.0].children = children;
        }

        Ok(id)
    }

    fn parent_accessors(
        &self,
        model: &CommandModel,
        parent: Option<NodeId>,
        owner_name: &str,
    ) -> Vec<ParentAccessor> {
        let mut accessors = Vec::new();
        for reference in &model.parent_refs {
            let mut current = parent;
            let mut found = None;
            while let Some(candidate) = current {
                let node = &self.nodes[candidate.0];
                if !matches!(node.kind, NodeKind::Method { .. })
                    && node.bound_key().id == reference.parent.id
                {
                    found = Some(candidate);
                    break;
                }
                current = node.parent;
            }

            match found {
                Some(ancestor) => accessors.push(ParentAccessor {
                    parent: ancestor,
                    member: reference.member,
                    set: reference.set.clone(),
                }),
                None => warn!(
                    command = %owner_name,
                    member = reference.member,
                    parent = reference.parent.name,
                    "parent reference does not point at an ancestor, ignoring"
                ),
            }
        }
        accessors
    }

    /// Sibling names must be unique, generated command short forms must not
    /// clash, and a recursive option may not share a name with a sibling's.
    fn check_siblings(&mut self, parent: NodeId, children: &[NodeId]) -> Result<(), AuthoringError> {
        let parent_name = self.nodes[parent.0].info.name.clone();

        let mut names = HashSet::new();
        let mut pool = AliasPool::new();
        for &child in children {
            let info = &self.nodes[child.0].info;
            for name in std::iter::once(&info.name).chain(info.aliases.iter()) {
                if !names.insert(name.clone()) {
                    return Err(AuthoringError::DuplicateCommand {
                        parent: parent_name,
                        name: name.clone(),
                    });
                }
                pool.reserve(name);
            }
        }

        for &child in children {
            let node = &self.nodes[child.0];
            if let Some(short) = node
                .policy
                .derive_short_form(&node.info.name, SymbolKind::Command, &pool)
            {
                pool.reserve(&short);
                self.nodes[child.0].info.aliases.push(short);
            }
        }

        let mut seen: HashMap<ClapName, Seen> = HashMap::new();
        for &child in children {
            let node = &self.nodes[child.0];
            let mut own = Vec::new();
            for symbol in node.symbols.iter().filter(|s| s.kind() == SymbolKind::Option) {
                for literal in symbol.all_names() {
                    if let Some(key) = ClapName::parse(literal) {
                        if let Some(existing) = seen.get(&key) {
                            if existing.recursive || symbol.info.recursive {
                                return Err(AuthoringError::OptionCollision {
                                    command: node.display_name(),
                                    alias: literal.clone(),
                                    existing: existing.alias.clone(),
                                    owner: existing.owner.clone(),
                                });
                            }
                        }
                        own.push((
                            key,
                            Seen {
                                alias: literal.clone(),
                                owner: node.display_name(),
                                recursive: symbol.info.recursive,
                            },
                        ));
                    }
                }
            }
            for (key, value) in own {
                seen.entry(key).or_insert(value);
            }
        }

        Ok(())
    }
}

fn symbol_params(params: &[crate::model::ParamDecl]) -> Vec<(&'static str, &SymbolDecl)> {
    params
        .iter()
        .filter_map(|p| match &p.kind {
            ParamKind::Symbol(decl) => Some((p.name, decl)),
            _ => None,
        })
        .collect()
}

/// Positionals are matched in declaration order: required ones come first
/// and only the last may take several values.
fn check_argument_order(command: &str, symbols: &[Symbol]) -> Result<(), AuthoringError> {
    let arguments: Vec<&Symbol> = symbols
        .iter()
        .filter(|s| s.kind() == SymbolKind::Argument)
        .collect();

    let mut seen_optional = false;
    for (index, argument) in arguments.iter().enumerate() {
        let problem = if argument.info.required && seen_optional {
            Some("is required but follows an optional argument")
        } else if argument.shape == ValueShape::Sequence && index + 1 < arguments.len() {
            Some("takes several values but is not the last argument")
        } else {
            None
        };
        if let Some(problem) = problem {
            return Err(AuthoringError::ArgumentOrder {
                command: command.to_string(),
                argument: argument.info.name.clone(),
                problem,
            });
        }
        seen_optional |= !argument.info.required;
    }
    Ok(())
}

fn unmatched_arg() -> Arg {
    Arg::new(UNMATCHED_ID)
        .num_args(1..)
        .action(ArgAction::Append)
        .value_parser(ValueParser::string())
        .allow_hyphen_values(true)
        .trailing_var_arg(true)
        .hide(true)
}

fn node_command(nodes: &[CommandNode], id: NodeId) -> Command {
    let node = &nodes[id.0];
    let mut cmd = Command::new(node.info.name.clone())
        .disable_help_flag(true)
        .disable_version_flag(true)
        .hide(node.info.hidden);
    if let Some(description) = &node.info.description {
        cmd = cmd.about(description.clone());
    }
    if !node.info.aliases.is_empty() {
        cmd = cmd.visible_aliases(node.info.aliases.clone());
    }

    for symbol in &node.symbols {
        if let Some(arg) = symbol.to_arg() {
            cmd = cmd.arg(arg);
        }
    }

    // A catch-all after a multi-valued positional would be ambiguous.
    let has_sequence_argument = node
        .symbols
        .iter()
        .any(|s| s.kind() == SymbolKind::Argument && s.shape == ValueShape::Sequence);
    if !node.info.treat_unmatched_tokens_as_errors && !has_sequence_argument {
        cmd = cmd.arg(unmatched_arg());
    }

    for &child in &node.children {
        cmd = cmd.subcommand(node_command(nodes, child));
    }
    cmd
}

fn root_command(nodes: &[CommandNode], root: NodeId, settings: &Settings) -> Command {
    let node_name = &nodes[root.0].info.name;
    let name = match &settings.executable_name {
        Some(name) => name.clone(),
        None if node_name.is_empty() => "command".to_string(),
        None => node_name.clone(),
    };

    let mut cmd = node_command(nodes, root)
        .name(name)
        .no_binary_name(true)
        .disable_help_subcommand(true);

    if settings.enable_help {
        cmd = cmd.arg(
            Arg::new(HELP_ID)
                .short('h')
                .long("help")
                .action(ArgAction::Help)
                .global(true)
                .help("Show help and usage information"),
        );
    }
    if settings.enable_version {
        cmd = cmd
            .version(settings.version.clone().unwrap_or_else(|| "unknown".to_string()))
            .arg(
                Arg::new(VERSION_ID)
                    .long("version")
                    .action(ArgAction::Version)
                    .help("Show version information"),
            );
    }
    cmd
}

/// Option literals a user may type while `id` is the current command: its
/// own options and every recursive option above it.
fn visible_option_names(nodes: &[CommandNode], id: NodeId) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = Some(id);
    while let Some(node_id) = current {
        let node = &nodes[node_id.0];
        for symbol in node.symbols.iter().filter(|s| s.kind() == SymbolKind::Option) {
            if node_id == id || symbol.info.recursive {
                names.extend(symbol.all_names().cloned());
            }
        }
        current = node.parent;
    }
    names
}

fn directive_names(nodes: &[CommandNode], settings: &Settings) -> Vec<String> {
    let mut names: Vec<String> = nodes
        .iter()
        .flat_map(|n| n.symbols.iter())
        .filter(|s| s.kind() == SymbolKind::Directive)
        .map(|s| s.info.name.clone())
        .collect();

    let built_in = [
        (settings.enable_suggest_directive, "suggest"),
        (settings.enable_diagram_directive, "diagram"),
        (settings.enable_env_directive, "env"),
    ];
    for (enabled, name) in built_in {
        if enabled {
            names.push(name.to_string());
        }
    }

    names.sort();
    names.dedup();
    names
}
