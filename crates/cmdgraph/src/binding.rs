//! Lazy materialization of command instances.
//!
//! Binding turns a node of the graph into a live instance for one
//! [`ParseResult`]:
//!
//! 1. a cached instance is returned as is,
//! 2. function nodes resolve their callable through the function chain,
//! 3. type nodes bind their parent first, then construct, apply parsed
//!    values and wire parent references,
//! 4. the result is cached on the parse result.
//!
//! A `return_empty` request skips the cache both ways and leaves members
//! at their constructed values.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::ambient;
use crate::error::BindingError;
use crate::graph::{NodeId, NodeKind, RuntimeGraph};
use crate::invoke::InvocationContext;
use crate::model::{Instance, ParamDecl, ParamKind, TypeKey};
use crate::parse::ParseResult;
use crate::services::{FunctionResolver, ServiceResolver, ServicesAsFunctions};
use crate::shape::Arguments;

/// Per-call binding configuration.
#[derive(Clone, Default)]
pub struct BindOptions {
    pub(crate) services: Option<Arc<dyn ServiceResolver>>,
    pub(crate) functions: Option<Arc<dyn FunctionResolver>>,
    pub(crate) return_empty: bool,
    pub(crate) cancellation: CancellationToken,
    /// Set while binding inside a run.
    pub(crate) invocation: Option<Arc<ParseResult>>,
}

impl fmt::Debug for BindOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindOptions")
            .field("services", &self.services.is_some())
            .field("functions", &self.functions.is_some())
            .field("return_empty", &self.return_empty)
            .field("invocation", &self.invocation.is_some())
            .finish_non_exhaustive()
    }
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver taking precedence over the ambient and default ones.
    pub fn services<R: ServiceResolver + 'static>(mut self, resolver: R) -> Self {
        self.services = Some(Arc::new(resolver));
        self
    }

    pub fn shared_services(mut self, resolver: Arc<dyn ServiceResolver>) -> Self {
        self.services = Some(resolver);
        self
    }

    /// Function resolver taking precedence over the graph's default.
    pub fn functions<R: FunctionResolver + 'static>(mut self, resolver: R) -> Self {
        self.functions = Some(Arc::new(resolver));
        self
    }

    pub fn shared_functions(mut self, resolver: Arc<dyn FunctionResolver>) -> Self {
        self.functions = Some(resolver);
        self
    }

    /// Constructs a fresh instance without parsed values and without caching.
    pub fn return_empty(mut self, value: bool) -> Self {
        self.return_empty = value;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The same options with caching forced on, used for ancestors.
    fn memoized(&self) -> Self {
        Self {
            return_empty: false,
            ..self.clone()
        }
    }
}

/// An instance bound for one node.
#[derive(Clone)]
pub struct BoundInstance {
    pub node: NodeId,
    /// Canonical command name.
    pub name: String,
    pub instance: Instance,
}

impl BoundInstance {
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance.clone().downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.instance.is::<T>()
    }
}

impl fmt::Debug for BoundInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundInstance")
            .field("node", &self.node)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl RuntimeGraph {
    /// Binds the instance of command type `T`.
    pub fn bind<T: Any + Send + Sync>(&self, result: &ParseResult) -> Result<Arc<T>, BindingError> {
        self.bind_with::<T>(result, &BindOptions::default())
    }

    pub fn bind_with<T: Any + Send + Sync>(
        &self,
        result: &ParseResult,
        opts: &BindOptions,
    ) -> Result<Arc<T>, BindingError> {
        let node = self
            .node_for::<T>()
            .ok_or(BindingError::UnknownDefinition {
                type_name: type_name::<T>(),
            })?;
        self.bind_node(result, node, opts)?
            .downcast::<T>()
            .map_err(|_| BindingError::TypeMismatch {
                name: self.node(node).info.name.clone(),
                expected: type_name::<T>(),
            })
    }

    /// Binds the command the parser selected.
    pub fn bind_called(
        &self,
        result: &ParseResult,
        opts: &BindOptions,
    ) -> Result<BoundInstance, BindingError> {
        let node = result.called();
        Ok(BoundInstance {
            node,
            name: self.node(node).info.name.clone(),
            instance: self.bind_node(result, node, opts)?,
        })
    }

    /// Binds every command from the root down to the called one.
    ///
    /// A called method contributes no entry of its own; its declaring type
    /// is already in the list.
    pub fn bind_all(
        &self,
        result: &ParseResult,
        opts: &BindOptions,
    ) -> Result<Vec<BoundInstance>, BindingError> {
        self.ancestry(result.called())
            .into_iter()
            .filter(|id| !matches!(self.node(*id).kind, NodeKind::Method { .. }))
            .map(|node| {
                Ok(BoundInstance {
                    node,
                    name: self.node(node).info.name.clone(),
                    instance: self.bind_node(result, node, opts)?,
                })
            })
            .collect()
    }

    pub(crate) fn bind_node(
        &self,
        result: &ParseResult,
        node: NodeId,
        opts: &BindOptions,
    ) -> Result<Instance, BindingError> {
        let cmd = self.node(node);
        let key = cmd.bound_key();

        if !opts.return_empty {
            let cached = result.bindings.lock().get(&key.id).cloned();
            if let Some(instance) = cached {
                trace!(command = key.short_name(), "bind cache hit");
                return Ok(instance);
            }
        }

        let instance = match &cmd.kind {
            NodeKind::Method { declaring, .. } => {
                let parent = cmd.parent.ok_or(BindingError::UnknownDefinition {
                    type_name: declaring.name,
                })?;
                return self.bind_node(result, parent, opts);
            }
            NodeKind::Function { key, accepts, .. } => self.resolve_function(*key, accepts, opts)?,
            NodeKind::Type { key, constructor, .. } => {
                if let Some(parent) = cmd.parent {
                    self.bind_node(result, parent, &opts.memoized())?;
                }

                let args = self.resolve_params(result, node, &constructor.params, opts)?;
                let mut boxed = (constructor.build)(&args).map_err(|e| BindingError::Construction {
                    type_name: key.name,
                    source: e.into(),
                })?;

                if !opts.return_empty {
                    for binder in &cmd.binders {
                        if let (Some(assign), Some(value)) = (&binder.assign, result.read_symbol(node, binder)) {
                            assign(boxed.as_mut(), value);
                        }
                    }
                }

                for accessor in &cmd.parent_accessors {
                    let parent = self.bind_node(result, accessor.parent, &opts.memoized())?;
                    (accessor.set)(boxed.as_mut(), parent);
                    trace!(command = key.short_name(), member = accessor.member, "wired parent reference");
                }

                debug!(command = key.short_name(), empty = opts.return_empty, "constructed command instance");
                Arc::from(boxed)
            }
        };

        if !opts.return_empty {
            result.bindings.lock().insert(key.id, instance.clone());
        }
        Ok(instance)
    }

    /// Service resolver for one call: per-call, then ambient, then default.
    pub(crate) fn active_services(&self, opts: &BindOptions) -> Option<Arc<dyn ServiceResolver>> {
        opts.services
            .clone()
            .or_else(ambient::current)
            .or_else(|| self.default_services())
    }

    /// Walks the function chain: per-call override, graph default, then
    /// services when enabled.
    fn resolve_function(
        &self,
        key: TypeKey,
        accepts: &dyn Fn(&(dyn Any + Send + Sync)) -> bool,
        opts: &BindOptions,
    ) -> Result<Instance, BindingError> {
        let mut chain: Vec<Arc<dyn FunctionResolver>> = Vec::new();
        chain.extend(opts.functions.clone());
        chain.extend(self.default_functions());

        let services = self.active_services(opts);
        let from_services = self.settings().resolve_functions_from_services;
        if from_services {
            if let Some(services) = &services {
                chain.push(Arc::new(ServicesAsFunctions(services.clone())));
            }
        }

        if let Some(found) = chain
            .iter()
            .filter_map(|r| r.resolve_function(key))
            .find(|instance| accepts(instance.as_ref()))
        {
            return Ok(found);
        }

        let available_from_services = !from_services
            && services
                .and_then(|s| s.resolve(key))
                .is_some_and(|instance| accepts(instance.as_ref()));
        Err(BindingError::FunctionNotRegistered {
            type_name: key.name,
            available_from_services,
        })
    }

    /// Fills the parameters of a constructor, method or function.
    pub(crate) fn resolve_params(
        &self,
        result: &ParseResult,
        node: NodeId,
        params: &[ParamDecl],
        opts: &BindOptions,
    ) -> Result<Arguments, BindingError> {
        let cmd = self.node(node);
        let owner = cmd.display_name();
        let mut args = Arguments::new(owner.clone(), opts.cancellation.clone());
        let services = self.active_services(opts);

        for param in params {
            match &param.kind {
                ParamKind::Symbol(_) => {
                    let value = cmd
                        .binders
                        .iter()
                        .find(|b| b.member == param.name)
                        .and_then(|binder| {
                            result
                                .read_symbol(node, binder)
                                .or_else(|| binder.absent.as_ref().map(|make| make()))
                        });
                    if let Some(value) = value {
                        args.insert(param.name, Arc::from(value));
                    }
                }
                ParamKind::Service(decl) => {
                    let resolved = services
                        .as_ref()
                        .and_then(|s| s.resolve(decl.key))
                        .or_else(|| decl.default.as_ref().map(|make| make()));
                    match resolved {
                        Some(instance) => args.insert(param.name, instance),
                        None if decl.optional => {}
                        None => {
                            return Err(BindingError::MissingDependency {
                                owner,
                                parameter: param.name,
                                type_name: decl.key.name,
                            })
                        }
                    }
                }
                ParamKind::Function(key) => {
                    let expected = key.id;
                    let instance = self.resolve_function(
                        *key,
                        &|value: &(dyn Any + Send + Sync)| value.type_id() == expected,
                        opts,
                    )?;
                    args.insert(param.name, instance);
                }
                ParamKind::Cancellation => {
                    args.insert(param.name, Arc::new(opts.cancellation.clone()));
                }
                ParamKind::Context => {
                    let Some(invocation) = &opts.invocation else {
                        return Err(BindingError::MissingDependency {
                            owner,
                            parameter: param.name,
                            type_name: type_name::<InvocationContext>(),
                        });
                    };
                    let ctx = InvocationContext::new(self.clone(), invocation.clone(), opts.clone());
                    args.insert(param.name, Arc::new(ctx));
                }
            }
        }

        Ok(args)
    }
}
