//! Declarative command trees for clap-based CLIs.
//!
//! `cmdgraph` turns command types that describe themselves as data into an
//! executable command hierarchy: a tree of named commands with typed
//! options, arguments and directives, validated input, and a binding
//! pipeline that materializes command instances on demand.
//!
//! # Overview
//!
//! - **Definitions**: a type implements [`CommandDefinition`] and declares
//!   its members, constructor, children and handler on a [`TypeShape`].
//! - **Graph**: [`GraphBuilder`] discovers every reachable definition,
//!   derives names, rejects cycles and collisions, and renders a clap
//!   command tree. The result is an immutable [`RuntimeGraph`].
//! - **Parsing**: [`RuntimeGraph::parse`] yields a [`ParseResult`] with the
//!   called command, validation errors and directives.
//! - **Binding**: [`RuntimeGraph::bind`] and friends build instances lazily,
//!   once per parse result, resolving constructor parameters from service
//!   and function resolvers.
//! - **Running**: [`RuntimeGraph::run`] and [`RuntimeGraph::run_async`]
//!   tie it together and return an exit code.
//!
//! # Example
//!
//! ```rust
//! use cmdgraph::{field, ArgumentSpec, CommandDefinition, GraphBuilder, OptionSpec, TypeShape};
//!
//! #[derive(Default)]
//! struct RootCommand {
//!     search_path_option: Option<String>,
//!     argument1: String,
//! }
//!
//! impl CommandDefinition for RootCommand {
//!     fn define(cmd: &mut TypeShape<Self>) {
//!         cmd.option(field!(Self, search_path_option), OptionSpec::new())
//!             .argument(field!(Self, argument1), ArgumentSpec::new())
//!             .construct_default()
//!             .run(|root, _ctx| {
//!                 println!("{:?} {}", root.search_path_option, root.argument1);
//!             });
//!     }
//! }
//!
//! let graph = GraphBuilder::new::<RootCommand>().build().unwrap();
//! let result = graph.parse(["--search-path", "x", "arg"]);
//! assert!(result.errors().is_empty());
//!
//! let root = graph.bind::<RootCommand>(&result).unwrap();
//! assert_eq!(root.search_path_option.as_deref(), Some("x"));
//! assert_eq!(root.argument1, "arg");
//! ```

pub mod ambient;
mod binding;
mod error;
mod fs;
mod graph;
mod invoke;
mod model;
pub mod naming;
mod parse;
mod services;
mod settings;
mod shape;
mod spec;
mod symbol;
mod validate;
mod value;

pub use clap;
pub use tokio_util::sync::CancellationToken;

pub use binding::{BindOptions, BoundInstance};
pub use error::{AuthoringError, BindingError, CliError, ParseError, ParseErrorKind};
pub use fs::{FileSystem, MockFileSystem, RealFileSystem};
pub use graph::{CommandInfo, GraphBuilder, NodeId, NodeVariant, RuntimeGraph};
pub use invoke::{IntoExitCode, InvocationContext, RunConfig};
pub use model::{CommandRef, Instance, TypeKey};
pub use naming::{AutoGenerate, NameCasing, NamePrefix, NamingOverrides, NamingPolicy, SymbolKind};
pub use parse::ParseResult;
pub use services::{FunctionMap, FunctionResolver, ResolverChain, ServiceMap, ServiceResolver};
pub use settings::Settings;
pub use shape::{
    Arguments, CommandDefinition, Field, FunctionDefinition, FunctionShape, InterfaceShape,
    Parameters, TypeShape,
};
pub use spec::{ArgumentSpec, Arity, CommandSpec, DirectiveSpec, OptionSpec};
pub use symbol::SymbolInfo;
pub use validate::{ValidationRules, ValueConstraints};
pub use value::{DirectiveValue, MemberValue, ScalarValue, ValueShape};
