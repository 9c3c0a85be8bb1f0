//! Explicit type-shape registration.
//!
//! A command type describes itself by implementing [`CommandDefinition`]:
//!
//! ```rust
//! use cmdgraph::{field, CommandDefinition, CommandSpec, OptionSpec, ArgumentSpec, TypeShape};
//!
//! #[derive(Default)]
//! struct Search {
//!     search_path: Option<String>,
//!     argument1: String,
//! }
//!
//! impl CommandDefinition for Search {
//!     fn define(cmd: &mut TypeShape<Self>) {
//!         cmd.spec(CommandSpec::new().description("Search files"))
//!             .option(field!(Self, search_path), OptionSpec::new())
//!             .argument(field!(Self, argument1), ArgumentSpec::new())
//!             .construct_default()
//!             .run(|search, _ctx| {
//!                 println!("{:?} {}", search.search_path, search.argument1);
//!             });
//!     }
//! }
//! ```

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::{self, FutureExt};
use tokio_util::sync::CancellationToken;

use crate::error::{AuthoringError, BindingError};
use crate::invoke::{Handler, IntoExitCode, InvocationContext};
use crate::model::{
    Access, Boxed, CommandModel, Constructor, Instance, MakeValue, MemberDecl, MethodDecl,
    ModelKind, ParamDecl, ParamKind, ParentRef, ServiceDecl, SymbolDecl, SymbolSource,
    SymbolSpecKind, TypeKey, ValueInfo,
};
use crate::spec::{ArgumentSpec, CommandSpec, DirectiveSpec, OptionSpec};
use crate::value::{DirectiveValue, MemberValue, ValueShape};

/// A type that can be used as a command.
pub trait CommandDefinition: Any + Send + Sync + Sized {
    /// Declares the command's metadata, members, constructor and handlers.
    fn define(cmd: &mut TypeShape<Self>);
}

/// A standalone function that can be listed as a child command.
///
/// `Self` is the callable's type; its instance comes from the
/// function-resolver chain at bind time.
pub trait FunctionDefinition: Any + Send + Sync + Sized {
    fn define() -> FunctionShape<Self>;
}

/// Accessors for one field of a command type.
///
/// Usually created with [`field!`](crate::field).
pub struct Field<T, V> {
    pub(crate) name: &'static str,
    pub(crate) get: fn(&T) -> &V,
    pub(crate) set: fn(&mut T, V),
    pub(crate) default: Option<V>,
}

impl<T, V> Field<T, V> {
    pub fn new(name: &'static str, get: fn(&T) -> &V, set: fn(&mut T, V)) -> Self {
        Self {
            name,
            get,
            set,
            default: None,
        }
    }

    /// Declares the value bound when the symbol is not given.
    ///
    /// A declared default also makes the symbol optional.
    pub fn default(mut self, value: V) -> Self {
        self.default = Some(value);
        self
    }
}

/// Builds a [`Field`] for `$type.$field`.
#[macro_export]
macro_rules! field {
    ($t:ty, $f:ident) => {
        $crate::Field::<$t, _>::new(
            stringify!($f),
            |c: &$t| &c.$f,
            |c: &mut $t, v| c.$f = v,
        )
    };
}

fn make_value<V: Clone + Send + Sync + 'static>(value: V) -> MakeValue {
    Arc::new(move || Box::new(value.clone()) as Boxed)
}

fn value_symbol<V: MemberValue>(spec: SymbolSpecKind, default: Option<V>) -> SymbolDecl {
    SymbolDecl {
        spec,
        value: ValueInfo {
            shape: V::SHAPE,
            type_name: type_name::<V>(),
            parser: V::value_parser(),
        },
        extract: Arc::new(|source: &SymbolSource<'_>| match source {
            SymbolSource::Matches { matches, id } => {
                V::extract(matches, id).map(|v| Box::new(v) as Boxed)
            }
            SymbolSource::Directive(_) => None,
        }),
        default_display: default.as_ref().map(|d| format!("{:?}", d)),
        default: default.map(make_value),
        absent: <V as MemberValue>::absent().map(make_value),
        access: None,
    }
}

fn directive_symbol<V: DirectiveValue>(spec: DirectiveSpec) -> SymbolDecl {
    SymbolDecl {
        spec: SymbolSpecKind::Directive(spec),
        value: ValueInfo {
            shape: ValueShape::Scalar,
            type_name: type_name::<V>(),
            parser: clap::builder::ValueParser::string(),
        },
        extract: Arc::new(|source: &SymbolSource<'_>| match source {
            SymbolSource::Directive(values) => {
                V::from_occurrences(values).map(|v| Box::new(v) as Boxed)
            }
            SymbolSource::Matches { .. } => None,
        }),
        default: None,
        default_display: None,
        absent: V::absent().map(make_value),
        access: None,
    }
}

fn field_access<T, V>(get: fn(&T) -> &V, set: fn(&mut T, V)) -> Access
where
    T: Any + Send + Sync,
    V: std::fmt::Debug + Send + Sync + 'static,
{
    Access {
        assign: Arc::new(move |target: &mut (dyn Any + Send + Sync), value: Boxed| {
            if let (Some(target), Ok(value)) = (target.downcast_mut::<T>(), value.downcast::<V>()) {
                set(target, *value);
            }
        }),
        read: Arc::new(move |target: &(dyn Any + Send + Sync)| {
            target.downcast_ref::<T>().map(|t| format!("{:?}", get(t)))
        }),
    }
}

fn value_member<T, V>(field: Field<T, V>, spec: SymbolSpecKind, origin: &'static str) -> MemberDecl
where
    T: Any + Send + Sync,
    V: MemberValue,
{
    let Field {
        name,
        get,
        set,
        default,
    } = field;
    let mut symbol = value_symbol::<V>(spec, default);
    symbol.access = Some(field_access(get, set));
    MemberDecl {
        member: name,
        origin,
        symbol,
    }
}

fn directive_member<T, V>(field: Field<T, V>, spec: DirectiveSpec, origin: &'static str) -> MemberDecl
where
    T: Any + Send + Sync,
    V: DirectiveValue,
{
    let mut symbol = directive_symbol::<V>(spec);
    symbol.access = Some(field_access(field.get, field.set));
    MemberDecl {
        member: field.name,
        origin,
        symbol,
    }
}

fn mismatch<T>() -> anyhow::Error {
    anyhow::anyhow!("bound instance is not a {}", type_name::<T>())
}

fn sync_handler<T, F, R>(f: F) -> Handler
where
    T: Any + Send + Sync,
    F: Fn(&T, &Arguments, &InvocationContext) -> R + Send + Sync + 'static,
    R: IntoExitCode,
{
    Handler::Sync(Arc::new(
        move |instance: &(dyn Any + Send + Sync), args: &Arguments, ctx: &InvocationContext| {
            let this = instance.downcast_ref::<T>().ok_or_else(mismatch::<T>)?;
            f(this, args, ctx).into_exit_code()
        },
    ))
}

fn async_handler<T, F, Fut, R>(f: F) -> Handler
where
    T: Any + Send + Sync,
    F: Fn(Arc<T>, Arguments, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoExitCode + 'static,
{
    Handler::Async(Arc::new(
        move |instance: Instance, args: Arguments, ctx: InvocationContext| {
            match instance.downcast::<T>() {
                Ok(this) => {
                    let fut = f(this, args, ctx);
                    async move { fut.await.into_exit_code() }.boxed()
                }
                Err(_) => future::ready(Err(mismatch::<T>())).boxed(),
            }
        },
    ))
}

/// Registration surface handed to [`CommandDefinition::define`].
pub struct TypeShape<T> {
    spec: CommandSpec,
    members: Vec<MemberDecl>,
    interfaces: Vec<InterfaceShape<T>>,
    constructor: Option<Constructor>,
    errors: Vec<AuthoringError>,
    parent_refs: Vec<ParentRef>,
    handler: Option<Handler>,
    methods: Vec<MethodDecl>,
}

impl<T: CommandDefinition> TypeShape<T> {
    pub(crate) fn new() -> Self {
        Self {
            spec: CommandSpec::default(),
            members: Vec::new(),
            interfaces: Vec::new(),
            constructor: None,
            errors: Vec::new(),
            parent_refs: Vec::new(),
            handler: None,
            methods: Vec::new(),
        }
    }

    fn origin() -> &'static str {
        TypeKey::of::<T>().short_name()
    }

    pub fn spec(&mut self, spec: CommandSpec) -> &mut Self {
        self.spec = spec;
        self
    }

    pub fn option<V: MemberValue>(&mut self, field: Field<T, V>, spec: OptionSpec) -> &mut Self {
        self.members
            .push(value_member(field, SymbolSpecKind::Option(spec), Self::origin()));
        self
    }

    pub fn argument<V: MemberValue>(&mut self, field: Field<T, V>, spec: ArgumentSpec) -> &mut Self {
        self.members
            .push(value_member(field, SymbolSpecKind::Argument(spec), Self::origin()));
        self
    }

    pub fn directive<V: DirectiveValue>(
        &mut self,
        field: Field<T, V>,
        spec: DirectiveSpec,
    ) -> &mut Self {
        self.members
            .push(directive_member(field, spec, Self::origin()));
        self
    }

    /// Adds the members declared by an interface the type implements.
    pub fn implements(&mut self, interface: InterfaceShape<T>) -> &mut Self {
        self.interfaces.push(interface);
        self
    }

    /// Declares how instances are created. Parameters may be services,
    /// functions or the cancellation token, never symbols.
    pub fn construct_with<F>(&mut self, params: Parameters, build: F) -> &mut Self
    where
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        for param in &params.params {
            if matches!(param.kind, ParamKind::Symbol(_)) {
                self.errors.push(AuthoringError::UnsupportedParameter {
                    owner: type_name::<T>(),
                    parameter: param.name,
                });
            }
        }

        self.constructor = Some(Constructor {
            params: params.params,
            build: Arc::new(move |args: &Arguments| {
                build(args).map(|value| Box::new(value) as Boxed)
            }),
        });
        self
    }

    pub fn construct_default(&mut self) -> &mut Self
    where
        T: Default,
    {
        self.construct_with(Parameters::new(), |_| Ok(T::default()))
    }

    /// Declares a field that receives the bound instance of ancestor `P`.
    ///
    /// Ignored (with a warning) if `P` does not end up above this command.
    pub fn parent_ref<P: CommandDefinition>(&mut self, field: Field<T, Option<Arc<P>>>) -> &mut Self {
        let set = field.set;
        self.parent_refs.push(ParentRef {
            parent: TypeKey::of::<P>(),
            member: field.name,
            set: Arc::new(move |target: &mut (dyn Any + Send + Sync), parent: Instance| {
                if let (Some(target), Ok(parent)) = (target.downcast_mut::<T>(), parent.downcast::<P>()) {
                    set(target, Some(parent));
                }
            }),
        });
        self
    }

    pub fn run<F, R>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&T, &InvocationContext) -> R + Send + Sync + 'static,
        R: IntoExitCode,
    {
        self.handler = Some(sync_handler::<T, _, _>(move |this: &T, _: &Arguments, ctx: &InvocationContext| {
            f(this, ctx)
        }));
        self
    }

    pub fn run_async<F, Fut, R>(&mut self, f: F) -> &mut Self
    where
        F: Fn(Arc<T>, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoExitCode + 'static,
    {
        self.handler = Some(async_handler::<T, _, _, _>(
            move |this: Arc<T>, _: Arguments, ctx: InvocationContext| f(this, ctx),
        ));
        self
    }

    /// Adds a subcommand backed by a method of this type.
    ///
    /// The name defaults to one derived from `name`.
    pub fn method<F, R>(
        &mut self,
        name: &'static str,
        spec: CommandSpec,
        params: Parameters,
        f: F,
    ) -> &mut Self
    where
        F: Fn(&T, &Arguments, &InvocationContext) -> R + Send + Sync + 'static,
        R: IntoExitCode,
    {
        self.methods.push(MethodDecl {
            name,
            spec,
            params: params.params,
            handler: sync_handler::<T, _, _>(f),
        });
        self
    }

    pub fn method_async<F, Fut, R>(
        &mut self,
        name: &'static str,
        spec: CommandSpec,
        params: Parameters,
        f: F,
    ) -> &mut Self
    where
        F: Fn(Arc<T>, Arguments, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoExitCode + 'static,
    {
        self.methods.push(MethodDecl {
            name,
            spec,
            params: params.params,
            handler: async_handler::<T, _, _, _>(f),
        });
        self
    }

    pub(crate) fn into_model(self) -> Result<CommandModel, AuthoringError> {
        let key = TypeKey::of::<T>();
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        let constructor = self.constructor.ok_or(AuthoringError::MissingConstructor {
            type_name: key.name,
        })?;

        let members = merge_interfaces(key, self.members, self.interfaces)?;

        Ok(CommandModel {
            key,
            kind: ModelKind::Type {
                constructor,
                handler: self.handler,
            },
            spec: self.spec,
            members,
            parent_refs: self.parent_refs,
            methods: self.methods,
        })
    }
}

/// Rejects members declared both by the type and an interface, or by two
/// interfaces with different metadata. Identical interface declarations are
/// kept once.
fn merge_interfaces<T>(
    key: TypeKey,
    own: Vec<MemberDecl>,
    interfaces: Vec<InterfaceShape<T>>,
) -> Result<Vec<MemberDecl>, AuthoringError> {
    let mut members = own;
    let own_count = members.len();

    for interface in interfaces {
        for decl in interface.members {
            match members.iter().position(|m| m.member == decl.member) {
                Some(index) if index < own_count => {
                    return Err(AuthoringError::AmbiguousInterfaceSpec {
                        owner: key.name,
                        member: decl.member,
                        first: members[index].origin.to_string(),
                        second: decl.origin.to_string(),
                    });
                }
                Some(index) => {
                    if members[index].symbol.spec != decl.symbol.spec {
                        return Err(AuthoringError::AmbiguousInterfaceSpec {
                            owner: key.name,
                            member: decl.member,
                            first: members[index].origin.to_string(),
                            second: decl.origin.to_string(),
                        });
                    }
                }
                None => members.push(decl),
            }
        }
    }

    Ok(members)
}

/// Members contributed by an interface (a trait-like group of fields shared
/// by several command types).
pub struct InterfaceShape<T> {
    name: &'static str,
    members: Vec<MemberDecl>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> InterfaceShape<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            members: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn option<V: MemberValue>(mut self, field: Field<T, V>, spec: OptionSpec) -> Self {
        self.members
            .push(value_member(field, SymbolSpecKind::Option(spec), self.name));
        self
    }

    pub fn argument<V: MemberValue>(mut self, field: Field<T, V>, spec: ArgumentSpec) -> Self {
        self.members
            .push(value_member(field, SymbolSpecKind::Argument(spec), self.name));
        self
    }

    pub fn directive<V: DirectiveValue>(mut self, field: Field<T, V>, spec: DirectiveSpec) -> Self {
        self.members.push(directive_member(field, spec, self.name));
        self
    }
}

/// Parameter list of a constructor, method or function.
#[derive(Clone, Default)]
pub struct Parameters {
    pub(crate) params: Vec<ParamDecl>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &'static str, kind: ParamKind) -> Self {
        self.params.push(ParamDecl { name, kind });
        self
    }

    pub fn option<V: MemberValue>(self, name: &'static str, spec: OptionSpec) -> Self {
        let symbol = value_symbol::<V>(SymbolSpecKind::Option(spec), None);
        self.push(name, ParamKind::Symbol(symbol))
    }

    pub fn option_or<V: MemberValue>(self, name: &'static str, spec: OptionSpec, default: V) -> Self {
        let symbol = value_symbol::<V>(SymbolSpecKind::Option(spec), Some(default));
        self.push(name, ParamKind::Symbol(symbol))
    }

    pub fn argument<V: MemberValue>(self, name: &'static str, spec: ArgumentSpec) -> Self {
        let symbol = value_symbol::<V>(SymbolSpecKind::Argument(spec), None);
        self.push(name, ParamKind::Symbol(symbol))
    }

    pub fn argument_or<V: MemberValue>(
        self,
        name: &'static str,
        spec: ArgumentSpec,
        default: V,
    ) -> Self {
        let symbol = value_symbol::<V>(SymbolSpecKind::Argument(spec), Some(default));
        self.push(name, ParamKind::Symbol(symbol))
    }

    pub fn directive<V: DirectiveValue>(self, name: &'static str, spec: DirectiveSpec) -> Self {
        self.push(name, ParamKind::Symbol(directive_symbol::<V>(spec)))
    }

    /// A service that must resolve.
    pub fn service<S: Any + Send + Sync>(self, name: &'static str) -> Self {
        self.push(
            name,
            ParamKind::Service(ServiceDecl {
                key: TypeKey::of::<S>(),
                optional: false,
                default: None,
            }),
        )
    }

    /// A service that may be missing.
    pub fn optional_service<S: Any + Send + Sync>(self, name: &'static str) -> Self {
        self.push(
            name,
            ParamKind::Service(ServiceDecl {
                key: TypeKey::of::<S>(),
                optional: true,
                default: None,
            }),
        )
    }

    /// A service with a fallback used when no resolver supplies one.
    pub fn service_or<S, F>(self, name: &'static str, default: F) -> Self
    where
        S: Any + Send + Sync,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.push(
            name,
            ParamKind::Service(ServiceDecl {
                key: TypeKey::of::<S>(),
                optional: false,
                default: Some(Arc::new(move || Arc::new(default()) as Instance)),
            }),
        )
    }

    /// A callable resolved through the function-resolver chain.
    pub fn function<F: Any + Send + Sync>(self, name: &'static str) -> Self {
        self.push(name, ParamKind::Function(TypeKey::of::<F>()))
    }

    pub fn cancellation(self, name: &'static str) -> Self {
        self.push(name, ParamKind::Cancellation)
    }

    /// The [`InvocationContext`] of the running command. Only available
    /// while binding inside a run.
    pub fn context(self, name: &'static str) -> Self {
        self.push(name, ParamKind::Context)
    }
}

/// Resolved parameter values passed to constructors and method handlers.
#[derive(Clone)]
pub struct Arguments {
    owner: String,
    values: HashMap<&'static str, Instance>,
    cancellation: CancellationToken,
}

impl Arguments {
    pub(crate) fn new(owner: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            owner: owner.into(),
            values: HashMap::new(),
            cancellation,
        }
    }

    pub(crate) fn insert(&mut self, name: &'static str, value: Instance) {
        self.values.insert(name, value);
    }

    /// The command or type these arguments were resolved for.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn get(&self, name: &str) -> Result<&Instance, BindingError> {
        self.values
            .get(name)
            .ok_or_else(|| BindingError::UnknownParameter {
                name: name.to_string(),
            })
    }

    pub fn service<S: Any + Send + Sync>(&self, name: &str) -> Result<Arc<S>, BindingError> {
        self.get(name)?
            .clone()
            .downcast::<S>()
            .map_err(|_| BindingError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<S>(),
            })
    }

    /// Returns `None` when the service was optional and not resolved.
    pub fn optional_service<S: Any + Send + Sync>(&self, name: &str) -> Option<Arc<S>> {
        self.values
            .get(name)
            .and_then(|value| value.clone().downcast::<S>().ok())
    }

    pub fn function<F: Any + Send + Sync>(&self, name: &str) -> Result<Arc<F>, BindingError> {
        self.service::<F>(name)
    }

    /// Value of an option, argument or directive parameter.
    pub fn value<V: Clone + 'static>(&self, name: &str) -> Result<V, BindingError> {
        self.get(name)?
            .downcast_ref::<V>()
            .cloned()
            .ok_or_else(|| BindingError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<V>(),
            })
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn context(&self, name: &str) -> Result<InvocationContext, BindingError> {
        self.service::<InvocationContext>(name)
            .map(|ctx| InvocationContext::clone(&ctx))
    }
}

/// A standalone function used as the root command.
///
/// `F` is the callable's type (a struct, or a boxed closure type); its
/// instance comes from the function-resolver chain at bind time.
pub struct FunctionShape<F> {
    spec: CommandSpec,
    params: Vec<ParamDecl>,
    handler: Handler,
    _marker: PhantomData<fn() -> F>,
}

fn accepts<F: Any>(value: &(dyn Any + Send + Sync)) -> bool {
    value.is::<F>()
}

impl<F: Any + Send + Sync> FunctionShape<F> {
    pub fn new<H, R>(spec: CommandSpec, params: Parameters, handler: H) -> Self
    where
        H: Fn(&F, &Arguments, &InvocationContext) -> R + Send + Sync + 'static,
        R: IntoExitCode,
    {
        Self {
            spec,
            params: params.params,
            handler: sync_handler::<F, _, _>(handler),
            _marker: PhantomData,
        }
    }

    pub fn new_async<H, Fut, R>(spec: CommandSpec, params: Parameters, handler: H) -> Self
    where
        H: Fn(Arc<F>, Arguments, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoExitCode + 'static,
    {
        Self {
            spec,
            params: params.params,
            handler: async_handler::<F, _, _, _>(handler),
            _marker: PhantomData,
        }
    }

    pub(crate) fn into_model(self) -> CommandModel {
        CommandModel {
            key: TypeKey::of::<F>(),
            kind: ModelKind::Function {
                params: self.params,
                handler: self.handler,
                accepts: accepts::<F>,
            },
            spec: self.spec,
            members: Vec::new(),
            parent_refs: Vec::new(),
            methods: Vec::new(),
        }
    }
}
