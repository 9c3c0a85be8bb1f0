//! Command models: the type-erased description of one command definition.
//!
//! A [`TypeShape`](crate::TypeShape) is generic over the command type; once
//! `define` has run it is flattened into a [`CommandModel`] whose closures
//! work on `dyn Any`. The graph builder only ever sees models.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use clap::builder::ValueParser;
use clap::ArgMatches;

use crate::error::AuthoringError;
use crate::invoke::Handler;
use crate::naming::SymbolKind;
use crate::shape::{Arguments, CommandDefinition, FunctionDefinition, TypeShape};
use crate::spec::{ArgumentSpec, CommandSpec, DirectiveSpec, OptionSpec};
use crate::value::ValueShape;

/// A shared, type-erased command instance, service or function.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type Boxed = Box<dyn Any + Send + Sync>;
pub(crate) type Extract = Arc<dyn Fn(&SymbolSource<'_>) -> Option<Boxed> + Send + Sync>;
pub(crate) type MakeValue = Arc<dyn Fn() -> Boxed + Send + Sync>;
pub(crate) type Assign = Arc<dyn Fn(&mut (dyn Any + Send + Sync), Boxed) + Send + Sync>;
pub(crate) type Read = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Option<String> + Send + Sync>;
pub(crate) type Factory = Arc<dyn Fn(&Arguments) -> anyhow::Result<Boxed> + Send + Sync>;
pub(crate) type SetParent = Arc<dyn Fn(&mut (dyn Any + Send + Sync), Instance) + Send + Sync>;
pub(crate) type MakeService = Arc<dyn Fn() -> Instance + Send + Sync>;

/// Identity of a Rust type used as a command, service or function.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The type name without its module path (`app::cli::ListCommand` →
    /// `ListCommand`).
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A reference to another command definition, used for parent and children
/// declarations.
#[derive(Clone, Copy)]
pub struct CommandRef {
    pub(crate) key: TypeKey,
    pub(crate) model: fn() -> Result<CommandModel, AuthoringError>,
}

impl CommandRef {
    pub fn of<T: CommandDefinition>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            model: model_of::<T>,
        }
    }

    pub fn function<F: FunctionDefinition>() -> Self {
        Self {
            key: TypeKey::of::<F>(),
            model: function_model_of::<F>,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }
}

impl PartialEq for CommandRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl fmt::Debug for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandRef({})", self.key.name)
    }
}

pub(crate) fn model_of<T: CommandDefinition>() -> Result<CommandModel, AuthoringError> {
    let mut shape = TypeShape::<T>::new();
    T::define(&mut shape);
    shape.into_model()
}

fn function_model_of<F: FunctionDefinition>() -> Result<CommandModel, AuthoringError> {
    Ok(F::define().into_model())
}

/// Where a binder reads its value from.
pub(crate) enum SymbolSource<'a> {
    Matches { matches: &'a ArgMatches, id: &'a str },
    Directive(&'a [Option<String>]),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SymbolSpecKind {
    Option(OptionSpec),
    Argument(ArgumentSpec),
    Directive(DirectiveSpec),
}

impl SymbolSpecKind {
    pub(crate) fn kind(&self) -> SymbolKind {
        match self {
            SymbolSpecKind::Option(_) => SymbolKind::Option,
            SymbolSpecKind::Argument(_) => SymbolKind::Argument,
            SymbolSpecKind::Directive(_) => SymbolKind::Directive,
        }
    }

    pub(crate) fn order(&self) -> i32 {
        match self {
            SymbolSpecKind::Option(spec) => spec.order,
            SymbolSpecKind::Argument(spec) => spec.order,
            SymbolSpecKind::Directive(_) => 0,
        }
    }
}

#[derive(Clone)]
pub(crate) struct ValueInfo {
    pub(crate) shape: ValueShape,
    pub(crate) type_name: &'static str,
    pub(crate) parser: ValueParser,
}

/// Getter and setter for a symbol declared on a field.
#[derive(Clone)]
pub(crate) struct Access {
    pub(crate) assign: Assign,
    pub(crate) read: Read,
}

/// One option, argument or directive before naming is applied.
#[derive(Clone)]
pub(crate) struct SymbolDecl {
    pub(crate) spec: SymbolSpecKind,
    pub(crate) value: ValueInfo,
    pub(crate) extract: Extract,
    /// Declared default.
    pub(crate) default: Option<MakeValue>,
    pub(crate) default_display: Option<String>,
    /// Fallback for parameters that got nothing and declare no default.
    pub(crate) absent: Option<MakeValue>,
    /// Present for field members, absent for callable parameters.
    pub(crate) access: Option<Access>,
}

impl SymbolDecl {
    /// Required unless defaulted, nullable or a flag; an explicit setting wins.
    pub(crate) fn required(&self) -> bool {
        let explicit = match &self.spec {
            SymbolSpecKind::Option(spec) => spec.required,
            SymbolSpecKind::Argument(spec) => spec.required,
            SymbolSpecKind::Directive(_) => Some(false),
        };
        explicit.unwrap_or_else(|| {
            !(self.default.is_some()
                || matches!(self.value.shape, ValueShape::Nullable | ValueShape::Flag))
        })
    }
}

/// A symbol member together with the declaration it came from.
#[derive(Clone)]
pub(crate) struct MemberDecl {
    pub(crate) member: &'static str,
    /// Name of the type or interface that declared it.
    pub(crate) origin: &'static str,
    pub(crate) symbol: SymbolDecl,
}

#[derive(Clone)]
pub(crate) struct ServiceDecl {
    pub(crate) key: TypeKey,
    pub(crate) optional: bool,
    pub(crate) default: Option<MakeService>,
}

#[derive(Clone)]
pub(crate) enum ParamKind {
    Symbol(SymbolDecl),
    Service(ServiceDecl),
    Function(TypeKey),
    Cancellation,
    Context,
}

/// One parameter of a constructor, method or function.
#[derive(Clone)]
pub(crate) struct ParamDecl {
    pub(crate) name: &'static str,
    pub(crate) kind: ParamKind,
}

#[derive(Clone)]
pub(crate) struct Constructor {
    pub(crate) params: Vec<ParamDecl>,
    pub(crate) build: Factory,
}

/// A writable reference from a command to one of its ancestors.
#[derive(Clone)]
pub(crate) struct ParentRef {
    pub(crate) parent: TypeKey,
    pub(crate) member: &'static str,
    pub(crate) set: SetParent,
}

#[derive(Clone)]
pub(crate) struct MethodDecl {
    pub(crate) name: &'static str,
    pub(crate) spec: CommandSpec,
    pub(crate) params: Vec<ParamDecl>,
    pub(crate) handler: Handler,
}

#[derive(Clone)]
pub(crate) enum ModelKind {
    Type {
        constructor: Constructor,
        handler: Option<Handler>,
    },
    Function {
        params: Vec<ParamDecl>,
        handler: Handler,
        accepts: fn(&(dyn Any + Send + Sync)) -> bool,
    },
}

/// Everything the graph builder needs to know about one definition.
#[derive(Clone)]
pub(crate) struct CommandModel {
    pub(crate) key: TypeKey,
    pub(crate) kind: ModelKind,
    pub(crate) spec: CommandSpec,
    pub(crate) members: Vec<MemberDecl>,
    pub(crate) parent_refs: Vec<ParentRef>,
    pub(crate) methods: Vec<MethodDecl>,
}
