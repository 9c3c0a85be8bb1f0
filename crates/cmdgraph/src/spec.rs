//! Declarative metadata for commands and symbols.
//!
//! These are plain values built with chained setters. The graph builder only
//! ever reads them; how they are produced (by hand inside
//! [`CommandDefinition::define`](crate::CommandDefinition::define), from a
//! config file, generated) does not matter.

use serde::Serialize;

use crate::model::CommandRef;
use crate::naming::{AutoGenerate, NameCasing, NamePrefix, NamingOverrides};
use crate::shape::{CommandDefinition, FunctionDefinition};
use crate::validate::{ValidationRules, ValueConstraints};

/// Minimum and maximum number of values a symbol accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Arity {
    pub min: usize,
    /// `None` means unbounded.
    pub max: Option<usize>,
}

impl Arity {
    pub const ZERO: Self = Self::new(0, Some(0));
    pub const ZERO_OR_ONE: Self = Self::new(0, Some(1));
    pub const EXACTLY_ONE: Self = Self::new(1, Some(1));
    pub const ZERO_OR_MORE: Self = Self::new(0, None);
    pub const ONE_OR_MORE: Self = Self::new(1, None);

    pub const fn new(min: usize, max: Option<usize>) -> Self {
        Self { min, max }
    }

    /// Arity implied by required-ness and whether the value is a sequence.
    pub fn infer(required: bool, sequence: bool) -> Self {
        match (required, sequence) {
            (true, false) => Self::EXACTLY_ONE,
            (false, false) => Self::ZERO_OR_ONE,
            (true, true) => Self::ONE_OR_MORE,
            (false, true) => Self::ZERO_OR_MORE,
        }
    }

    pub fn allows_many(&self) -> bool {
        self.max.map_or(true, |max| max > 1)
    }
}

/// Metadata for one command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hidden: bool,
    pub order: i32,
    pub aliases: Vec<String>,
    pub parent: Option<CommandRef>,
    pub children: Vec<CommandRef>,
    pub naming: NamingOverrides,
    pub treat_unmatched_tokens_as_errors: bool,
}

impl Default for CommandSpec {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            hidden: false,
            order: 0,
            aliases: Vec::new(),
            parent: None,
            children: Vec::new(),
            naming: NamingOverrides::default(),
            treat_unmatched_tokens_as_errors: true,
        }
    }
}

impl CommandSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Position among siblings. Lower values come first; ties keep
    /// declaration order.
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Declares the parent command (bottom-up edge).
    pub fn parent<P: CommandDefinition>(mut self) -> Self {
        self.parent = Some(CommandRef::of::<P>());
        self
    }

    /// Declares a child command (top-down edge).
    pub fn child<C: CommandDefinition>(mut self) -> Self {
        self.children.push(CommandRef::of::<C>());
        self
    }

    /// Declares a standalone function as a child command.
    pub fn function_child<F: FunctionDefinition>(mut self) -> Self {
        self.children.push(CommandRef::function::<F>());
        self
    }

    pub fn casing(mut self, casing: NameCasing) -> Self {
        self.naming.casing = Some(casing);
        self
    }

    pub fn prefix(mut self, prefix: NamePrefix) -> Self {
        self.naming.prefix = Some(prefix);
        self
    }

    pub fn short_form_prefix(mut self, prefix: NamePrefix) -> Self {
        self.naming.short_form_prefix = Some(prefix);
        self
    }

    pub fn name_auto_generate(mut self, kinds: AutoGenerate) -> Self {
        self.naming.name_auto_generate = Some(kinds);
        self
    }

    pub fn short_form_auto_generate(mut self, kinds: AutoGenerate) -> Self {
        self.naming.short_form_auto_generate = Some(kinds);
        self
    }

    /// When false, tokens the parser cannot place are collected instead of
    /// being reported as errors.
    pub fn treat_unmatched_tokens_as_errors(mut self, value: bool) -> Self {
        self.treat_unmatched_tokens_as_errors = value;
        self
    }
}

// Setters shared by OptionSpec and ArgumentSpec.
macro_rules! value_spec_setters {
    () => {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn name(mut self, name: impl Into<String>) -> Self {
            self.name = Some(name.into());
            self
        }

        pub fn description(mut self, description: impl Into<String>) -> Self {
            self.description = Some(description.into());
            self
        }

        pub fn hidden(mut self, hidden: bool) -> Self {
            self.hidden = hidden;
            self
        }

        pub fn order(mut self, order: i32) -> Self {
            self.order = order;
            self
        }

        /// Placeholder shown for the value in help output.
        pub fn help_name(mut self, help_name: impl Into<String>) -> Self {
            self.help_name = Some(help_name.into());
            self
        }

        /// Overrides required-ness inference in either direction.
        pub fn required(mut self, required: bool) -> Self {
            self.required = Some(required);
            self
        }

        pub fn arity(mut self, arity: Arity) -> Self {
            self.arity = Some(arity);
            self
        }

        pub fn allowed_values<I, S>(mut self, values: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.constraints.allowed_values = values.into_iter().map(Into::into).collect();
            self
        }

        pub fn rules(mut self, rules: ValidationRules) -> Self {
            self.constraints.rules = rules;
            self
        }

        pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
            self.constraints.pattern = Some(pattern.into());
            self
        }

        /// Replaces the default message reported when the pattern does not match.
        pub fn pattern_message(mut self, message: impl Into<String>) -> Self {
            self.constraints.pattern_message = Some(message.into());
            self
        }
    };
}

/// Metadata for an option member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSpec {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hidden: bool,
    pub order: i32,
    pub aliases: Vec<String>,
    pub help_name: Option<String>,
    pub required: Option<bool>,
    pub arity: Option<Arity>,
    pub constraints: ValueConstraints,
    /// Visible to every descendant command.
    pub recursive: bool,
    /// Accept several values after one occurrence (`--tag a b c`).
    pub allow_multiple_per_token: bool,
}

impl OptionSpec {
    value_spec_setters!();

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn allow_multiple_per_token(mut self, value: bool) -> Self {
        self.allow_multiple_per_token = value;
        self
    }
}

/// Metadata for a positional argument member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSpec {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hidden: bool,
    pub order: i32,
    pub help_name: Option<String>,
    pub required: Option<bool>,
    pub arity: Option<Arity>,
    pub constraints: ValueConstraints,
}

impl ArgumentSpec {
    value_spec_setters!();
}

/// Metadata for a directive member (`[name]` or `[name:value]`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectiveSpec {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hidden: bool,
}

impl DirectiveSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_inference() {
        assert_eq!(Arity::infer(true, false), Arity::EXACTLY_ONE);
        assert_eq!(Arity::infer(false, false), Arity::ZERO_OR_ONE);
        assert_eq!(Arity::infer(true, true), Arity::ONE_OR_MORE);
        assert_eq!(Arity::infer(false, true), Arity::ZERO_OR_MORE);
    }

    #[test]
    fn test_allows_many() {
        assert!(!Arity::EXACTLY_ONE.allows_many());
        assert!(Arity::ONE_OR_MORE.allows_many());
        assert!(Arity::new(0, Some(3)).allows_many());
    }

    #[test]
    fn test_command_spec_defaults() {
        let spec = CommandSpec::new();
        assert!(spec.treat_unmatched_tokens_as_errors);
        assert_eq!(spec.order, 0);
        assert!(spec.children.is_empty());
    }

    #[test]
    fn test_option_spec_builder() {
        let spec = OptionSpec::new()
            .name("--path")
            .alias("-p")
            .required(true)
            .recursive(true)
            .allowed_values(["a", "b"]);
        assert_eq!(spec.name.as_deref(), Some("--path"));
        assert_eq!(spec.aliases, vec!["-p"]);
        assert_eq!(spec.required, Some(true));
        assert!(spec.recursive);
        assert_eq!(spec.constraints.allowed_values, vec!["a", "b"]);
    }

    #[test]
    fn test_specs_compare_by_value() {
        let a = OptionSpec::new().description("name");
        let b = OptionSpec::new().description("name");
        let c = OptionSpec::new().description("other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
