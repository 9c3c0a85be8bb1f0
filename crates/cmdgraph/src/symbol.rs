//! Symbol builders: one declared member in, one parseable symbol and one
//! binder out.

use clap::builder::{ValueParser, ValueRange};
use clap::{Arg, ArgAction};
use serde::Serialize;

use crate::error::{AuthoringError, ParseError};
use crate::model::{Assign, Extract, MakeValue, Read, SymbolDecl, SymbolSpecKind};
use crate::naming::{strip_prefix, AliasPool, ClapName, NamingPolicy, SymbolKind};
use crate::spec::Arity;
use crate::validate::{ValueConstraints, Validator};
use crate::value::ValueShape;

/// Public description of a built symbol.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolInfo {
    pub kind: SymbolKind,
    /// Field or parameter the symbol was declared on.
    pub member: &'static str,
    pub name: String,
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_name: Option<String>,
    pub required: bool,
    pub arity: Arity,
    pub recursive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub value_type: &'static str,
}

/// A symbol as registered on a command node.
pub(crate) struct Symbol {
    pub(crate) info: SymbolInfo,
    /// clap id for options and arguments, bare name for directives.
    pub(crate) id: String,
    pub(crate) validator: Validator,
    pub(crate) parser: ValueParser,
    pub(crate) shape: ValueShape,
    pub(crate) allow_multiple_per_token: bool,
    /// Arity was declared rather than inferred.
    pub(crate) explicit_arity: bool,
}

/// Copies one symbol's parsed value into an instance or a parameter list.
#[derive(Clone)]
pub(crate) struct Binder {
    pub(crate) member: &'static str,
    /// Index into the owning node's symbols.
    pub(crate) symbol: usize,
    pub(crate) extract: Extract,
    pub(crate) default: Option<MakeValue>,
    pub(crate) absent: Option<MakeValue>,
    pub(crate) assign: Option<Assign>,
}

/// Display name and getter used for value dumps.
#[derive(Clone)]
pub(crate) struct ValueAccessor {
    pub(crate) name: String,
    pub(crate) read: Read,
}

/// Naming state of the command whose symbols are being built.
pub(crate) struct SymbolContext<'a> {
    pub(crate) command: &'a str,
    pub(crate) id_prefix: &'a str,
    pub(crate) policy: &'a NamingPolicy,
    pub(crate) pool: &'a mut AliasPool,
}

pub(crate) fn build_symbol(
    member: &'static str,
    decl: &SymbolDecl,
    index: usize,
    cx: &mut SymbolContext<'_>,
) -> Result<(Symbol, Binder, Option<ValueAccessor>), AuthoringError> {
    let kind = decl.spec.kind();
    let (explicit_name, description, hidden) = match &decl.spec {
        SymbolSpecKind::Option(s) => (s.name.as_deref(), s.description.clone(), s.hidden),
        SymbolSpecKind::Argument(s) => (s.name.as_deref(), s.description.clone(), s.hidden),
        SymbolSpecKind::Directive(s) => (s.name.as_deref(), s.description.clone(), s.hidden),
    };

    let name = match explicit_name {
        Some(raw) => cx.policy.normalize_alias(raw, kind),
        None => cx.policy.derive_name(member, kind),
    };

    let mut aliases = Vec::new();
    if kind != SymbolKind::Directive {
        cx.pool.register(&name, cx.command)?;
    }

    let empty = ValueConstraints::default();
    let (help_name, arity, constraints, recursive, multiple) = match &decl.spec {
        SymbolSpecKind::Option(s) => {
            for raw in &s.aliases {
                let alias = cx.policy.normalize_alias(raw, kind);
                cx.pool.register(&alias, cx.command)?;
                aliases.push(alias);
            }
            if let Some(short) = cx.policy.derive_short_form(&name, kind, cx.pool) {
                cx.pool.register(&short, cx.command)?;
                aliases.push(short);
            }
            (s.help_name.clone(), s.arity, &s.constraints, s.recursive, s.allow_multiple_per_token)
        }
        SymbolSpecKind::Argument(s) => (s.help_name.clone(), s.arity, &s.constraints, false, false),
        SymbolSpecKind::Directive(_) => (None, None, &empty, false, false),
    };

    let required = decl.required();
    let explicit_arity = arity.is_some() && decl.value.shape != ValueShape::Flag;
    let arity = match decl.value.shape {
        ValueShape::Flag => Arity::ZERO,
        shape => arity.unwrap_or_else(|| Arity::infer(required, shape.is_sequence())),
    };
    let validator = Validator::compile(&format!("{}::{}", cx.id_prefix, member), constraints)?;

    let id = match kind {
        SymbolKind::Directive => name.clone(),
        _ => format!("{}::{}", cx.id_prefix, member),
    };

    let info = SymbolInfo {
        kind,
        member,
        name,
        aliases,
        description,
        hidden,
        help_name,
        required,
        arity,
        recursive,
        allowed_values: validator.allowed_values().to_vec(),
        default: decl.default_display.clone(),
        value_type: decl.value.type_name,
    };

    let binder = Binder {
        member,
        symbol: index,
        extract: decl.extract.clone(),
        default: decl.default.clone(),
        absent: decl.absent.clone(),
        assign: decl.access.as_ref().map(|a| a.assign.clone()),
    };

    let accessor = decl.access.as_ref().map(|a| ValueAccessor {
        name: info.name.clone(),
        read: a.read.clone(),
    });

    let symbol = Symbol {
        info,
        id,
        validator,
        parser: decl.value.parser.clone(),
        shape: decl.value.shape,
        allow_multiple_per_token: multiple,
        explicit_arity,
    };

    Ok((symbol, binder, accessor))
}

impl Symbol {
    pub(crate) fn kind(&self) -> SymbolKind {
        self.info.kind
    }

    /// Every literal form the user may type for this symbol.
    pub(crate) fn all_names(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.info.name).chain(self.info.aliases.iter())
    }

    fn value_name(&self) -> String {
        match &self.info.help_name {
            Some(help_name) => help_name.clone(),
            None => strip_prefix(&self.info.name)
                .to_uppercase()
                .replace(['-', ' '], "_"),
        }
    }

    fn help_text(&self) -> Option<String> {
        let mut help = self.info.description.clone().unwrap_or_default();
        if !self.info.allowed_values.is_empty() {
            help.push_str(&format!(
                " [possible values: {}]",
                self.info.allowed_values.join(", ")
            ));
        }
        if let Some(default) = &self.info.default {
            help.push_str(&format!(" [default: {}]", default));
        }
        let help = help.trim().to_string();
        (!help.is_empty()).then_some(help)
    }

    /// Values accepted after one occurrence of the symbol.
    fn value_range(&self) -> ValueRange {
        let floor = if self.explicit_arity && !self.info.required { 0 } else { 1 };
        let min = self.info.arity.min.max(floor);
        match self.info.arity.max {
            Some(max) => ValueRange::new(min..=max.max(min)),
            None => ValueRange::new(min..),
        }
    }

    /// Checks the total number of values given across every occurrence.
    pub(crate) fn check_count(&self, count: usize) -> Option<ParseError> {
        let arity = self.info.arity;
        let kind = match self.info.kind {
            SymbolKind::Argument => "Argument",
            _ => "Option",
        };
        if count < arity.min {
            return Some(ParseError::syntax_at(
                &self.info.name,
                format!(
                    "{kind} '{}' expects at least {} value(s), got {count}.",
                    self.info.name, arity.min
                ),
            ));
        }
        match arity.max {
            Some(max) if count > max => Some(ParseError::syntax_at(
                &self.info.name,
                format!(
                    "{kind} '{}' expects at most {max} value(s), got {count}.",
                    self.info.name
                ),
            )),
            _ => None,
        }
    }

    /// The clap argument for this symbol. Directives have none.
    pub(crate) fn to_arg(&self) -> Option<Arg> {
        let mut arg = Arg::new(self.id.clone())
            .value_parser(self.parser.clone())
            .hide(self.info.hidden);
        if let Some(help) = self.help_text() {
            arg = arg.help(help);
        }

        match self.info.kind {
            SymbolKind::Option => {
                let mut longs = Vec::new();
                let mut shorts = Vec::new();
                for literal in self.all_names() {
                    match ClapName::parse(literal) {
                        Some(ClapName::Long(long)) => longs.push(long),
                        Some(ClapName::Short(short)) => shorts.push(short),
                        None => {}
                    }
                }
                if let Some((first, rest)) = longs.split_first() {
                    arg = arg.long(first.clone()).visible_aliases(rest.to_vec());
                }
                if let Some((first, rest)) = shorts.split_first() {
                    arg = arg.short(*first).visible_short_aliases(rest.to_vec());
                }

                arg = arg
                    .global(self.info.recursive)
                    .required(self.info.required && !self.info.recursive);

                arg = match self.shape {
                    ValueShape::Flag => arg.action(ArgAction::SetTrue),
                    ValueShape::Sequence => {
                        let arg = arg.action(ArgAction::Append).value_name(self.value_name());
                        if self.allow_multiple_per_token {
                            arg.num_args(self.value_range())
                        } else {
                            arg.num_args(1)
                        }
                    }
                    ValueShape::Scalar | ValueShape::Nullable => {
                        let arg = arg.action(ArgAction::Set).value_name(self.value_name());
                        if self.explicit_arity && self.info.arity.min == 0 {
                            arg.num_args(0..=1)
                        } else {
                            arg.num_args(1)
                        }
                    }
                };
                Some(arg)
            }
            SymbolKind::Argument => {
                arg = arg
                    .value_name(self.value_name())
                    .required(self.info.required);
                arg = if self.shape == ValueShape::Sequence {
                    arg.action(ArgAction::Append).num_args(self.value_range())
                } else {
                    arg.action(ArgAction::Set).num_args(1)
                };
                Some(arg)
            }
            SymbolKind::Directive | SymbolKind::Command => None,
        }
    }
}
