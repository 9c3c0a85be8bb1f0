//! Error types for graph construction, binding and parsing.
//!
//! Failures fall into three groups:
//!
//! - [`AuthoringError`]: the command model itself is wrong (conflicting
//!   parents, duplicate aliases, cycles). Raised once by
//!   [`GraphBuilder::build`](crate::GraphBuilder::build).
//! - [`BindingError`]: an instance could not be produced for one parse
//!   result (missing dependency, unregistered function).
//! - [`ParseError`]: user input was rejected. These are accumulated on the
//!   [`ParseResult`](crate::ParseResult) rather than returned.

use std::fmt;

use thiserror::Error;

/// Errors in the declared command model, detected while building the graph.
#[derive(Debug, Error)]
pub enum AuthoringError {
    /// A command declares one parent but another command lists it as a child.
    #[error("command '{child}' declares parent '{declared}' but is listed as a child of '{listed_by}'")]
    ConflictingParent {
        child: &'static str,
        declared: &'static str,
        listed_by: &'static str,
    },

    /// The same alias was registered twice on one command.
    #[error("alias '{alias}' is already registered on command '{command}'")]
    DuplicateAlias { command: String, alias: String },

    /// Two children of one command share a name or alias.
    #[error("command '{parent}' has more than one subcommand named '{name}'")]
    DuplicateCommand { parent: String, name: String },

    /// A member is declared by more than one source with different metadata.
    #[error("member '{member}' of '{owner}' is declared by both {first} and {second}")]
    AmbiguousInterfaceSpec {
        owner: &'static str,
        member: &'static str,
        first: String,
        second: String,
    },

    /// Following children edges leads back to a command already on the path.
    #[error("command tree contains a cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<&'static str> },

    /// An option name or alias is visible twice to one command.
    #[error("option '{alias}' of command '{command}' collides with '{existing}' declared by '{owner}'")]
    OptionCollision {
        command: String,
        alias: String,
        existing: String,
        owner: String,
    },

    /// Positional arguments are declared in an order the parser cannot match.
    #[error("argument '{argument}' of command '{command}' {problem}")]
    ArgumentOrder {
        command: String,
        argument: String,
        problem: &'static str,
    },

    /// A validation pattern failed to compile.
    #[error("invalid pattern for '{member}': {source}")]
    InvalidPattern {
        member: String,
        #[source]
        source: regex::Error,
    },

    /// A command type never declared how to construct itself.
    #[error("command '{type_name}' does not declare a constructor")]
    MissingConstructor { type_name: &'static str },

    /// A constructor parameter that can only be filled from parsed input.
    #[error("constructor parameter '{parameter}' of '{owner}' must be a service, function or cancellation token")]
    UnsupportedParameter {
        owner: &'static str,
        parameter: &'static str,
    },
}

/// Errors raised while binding an instance for a parse result.
#[derive(Debug, Error)]
pub enum BindingError {
    /// A required constructor or handler dependency could not be resolved.
    #[error("cannot resolve '{parameter}' ({type_name}) required by '{owner}'")]
    MissingDependency {
        owner: String,
        parameter: &'static str,
        type_name: &'static str,
    },

    /// No resolver in the chain produced an instance of the function type.
    #[error("no instance registered for function type '{type_name}'{}", services_hint(.available_from_services))]
    FunctionNotRegistered {
        type_name: &'static str,
        available_from_services: bool,
    },

    /// The requested type is not part of the command graph.
    #[error("type '{type_name}' is not a command in this graph")]
    UnknownDefinition { type_name: &'static str },

    /// A handler asked for a parameter that was never declared.
    #[error("parameter '{name}' is not declared")]
    UnknownParameter { name: String },

    /// A stored value does not have the type the caller asked for.
    #[error("parameter '{name}' is not of type '{expected}'")]
    TypeMismatch { name: String, expected: &'static str },

    /// The user-supplied constructor failed.
    #[error("failed to construct '{type_name}': {source}")]
    Construction {
        type_name: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn services_hint(available: &bool) -> &'static str {
    if *available {
        " (a service resolver can supply it, but resolving functions from services is disabled)"
    } else {
        ""
    }
}

/// Errors surfaced by the run pipeline.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Authoring(#[from] AuthoringError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    /// A command handler returned an error.
    #[error("{0:#}")]
    Handler(anyhow::Error),
}

/// Category of a [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Rejected by the tokenizer or clap (unknown option, missing value...).
    Syntax,
    /// A required symbol has no value.
    MissingRequired,
    /// A value failed a validation rule, a pattern or the allowed-value set.
    Validation,
}

/// One rejected piece of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Display name of the offending symbol, when known.
    pub symbol: Option<String>,
}

impl ParseError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::Syntax,
            message: message.into(),
            symbol: None,
        }
    }

    pub(crate) fn syntax_at(symbol: &str, message: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::Syntax,
            message: message.into(),
            symbol: Some(symbol.to_string()),
        }
    }

    pub(crate) fn missing(symbol: &str) -> Self {
        Self {
            kind: ParseErrorKind::MissingRequired,
            message: format!("Option '{}' is required.", symbol),
            symbol: Some(symbol.to_string()),
        }
    }

    pub(crate) fn validation(symbol: &str, message: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::Validation,
            message: message.into(),
            symbol: Some(symbol.to_string()),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = AuthoringError::Cycle {
            path: vec!["a::A", "a::B", "a::A"],
        };
        assert_eq!(
            err.to_string(),
            "command tree contains a cycle: a::A -> a::B -> a::A"
        );
    }

    #[test]
    fn test_function_not_registered_hint() {
        let plain = BindingError::FunctionNotRegistered {
            type_name: "Greeter",
            available_from_services: false,
        };
        assert_eq!(
            plain.to_string(),
            "no instance registered for function type 'Greeter'"
        );

        let hinted = BindingError::FunctionNotRegistered {
            type_name: "Greeter",
            available_from_services: true,
        };
        assert!(hinted.to_string().contains("resolving functions from services is disabled"));
    }

    #[test]
    fn test_parse_error_constructors() {
        let err = ParseError::missing("--name");
        assert_eq!(err.kind, ParseErrorKind::MissingRequired);
        assert_eq!(err.to_string(), "Option '--name' is required.");
        assert_eq!(err.symbol.as_deref(), Some("--name"));
    }
}
