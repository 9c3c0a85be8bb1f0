//! Name derivation for commands and symbols.
//!
//! Raw identifiers (type names, field names, method names) are turned into
//! command-line names by a [`NamingPolicy`]:
//!
//! 1. a kind-specific suffix is stripped (`SearchPathOption` → `SearchPath`),
//! 2. the casing convention is applied (`search-path`),
//! 3. options receive their prefix (`--search-path`).
//!
//! Each command owns an [`AliasPool`] that rejects duplicate aliases and is
//! consulted when short forms (`-s`) are generated.

use std::collections::HashSet;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::error::AuthoringError;

/// Casing applied to derived names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameCasing {
    /// Keep the identifier as written (suffix still stripped).
    None,
    /// `searchpath`
    LowerCase,
    /// `SEARCHPATH`
    UpperCase,
    /// `Search Path`
    TitleCase,
    /// `SearchPath`
    PascalCase,
    /// `searchPath`
    CamelCase,
    /// `search-path`
    #[default]
    KebabCase,
    /// `search_path`
    SnakeCase,
}

/// Prefix put in front of option names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamePrefix {
    None,
    SingleHyphen,
    DoubleHyphen,
    ForwardSlash,
}

impl NamePrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            NamePrefix::None => "",
            NamePrefix::SingleHyphen => "-",
            NamePrefix::DoubleHyphen => "--",
            NamePrefix::ForwardSlash => "/",
        }
    }
}

/// The four kinds of named things in a command tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Command,
    Option,
    Argument,
    Directive,
}

impl SymbolKind {
    /// Conventional suffix stripped from raw identifiers of this kind.
    pub fn suffix(self) -> &'static str {
        match self {
            SymbolKind::Command => "Command",
            SymbolKind::Option => "Option",
            SymbolKind::Argument => "Argument",
            SymbolKind::Directive => "Directive",
        }
    }

    fn flag(self) -> AutoGenerate {
        match self {
            SymbolKind::Command => AutoGenerate::COMMANDS,
            SymbolKind::Option => AutoGenerate::OPTIONS,
            SymbolKind::Argument => AutoGenerate::ARGUMENTS,
            SymbolKind::Directive => AutoGenerate::DIRECTIVES,
        }
    }
}

/// Set of symbol kinds for which something is generated automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AutoGenerate(u8);

impl AutoGenerate {
    pub const NONE: Self = Self(0);
    pub const COMMANDS: Self = Self(1);
    pub const OPTIONS: Self = Self(1 << 1);
    pub const ARGUMENTS: Self = Self(1 << 2);
    pub const DIRECTIVES: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AutoGenerate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AutoGenerate {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Per-command naming overrides. Unset fields inherit from the nearest
/// ancestor that sets them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamingOverrides {
    pub casing: Option<NameCasing>,
    pub prefix: Option<NamePrefix>,
    pub short_form_prefix: Option<NamePrefix>,
    pub name_auto_generate: Option<AutoGenerate>,
    pub short_form_auto_generate: Option<AutoGenerate>,
}

/// Effective naming conventions for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingPolicy {
    pub casing: NameCasing,
    pub prefix: NamePrefix,
    pub short_form_prefix: NamePrefix,
    pub name_auto_generate: AutoGenerate,
    pub short_form_auto_generate: AutoGenerate,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            casing: NameCasing::KebabCase,
            prefix: NamePrefix::DoubleHyphen,
            short_form_prefix: NamePrefix::SingleHyphen,
            name_auto_generate: AutoGenerate::ALL,
            short_form_auto_generate: AutoGenerate::OPTIONS,
        }
    }
}

impl NamingPolicy {
    /// Applies a command's overrides on top of this (the parent's) policy.
    pub fn inherit(&self, overrides: &NamingOverrides) -> Self {
        Self {
            casing: overrides.casing.unwrap_or(self.casing),
            prefix: overrides.prefix.unwrap_or(self.prefix),
            short_form_prefix: overrides.short_form_prefix.unwrap_or(self.short_form_prefix),
            name_auto_generate: overrides
                .name_auto_generate
                .unwrap_or(self.name_auto_generate),
            short_form_auto_generate: overrides
                .short_form_auto_generate
                .unwrap_or(self.short_form_auto_generate),
        }
    }

    /// Derives the canonical name of a symbol from its raw identifier.
    ///
    /// Only options are prefixed. An identifier consisting of nothing but
    /// the suffix yields an empty name.
    pub fn derive_name(&self, raw: &str, kind: SymbolKind) -> String {
        let base = if self.name_auto_generate.contains(kind.flag()) {
            derive_base(raw, kind.suffix(), self.casing)
        } else {
            raw.to_string()
        };

        match kind {
            SymbolKind::Option => format!("{}{}", self.prefix.as_str(), base),
            _ => base,
        }
    }

    /// Generates a single-letter alias for `name`, or `None` when short forms
    /// are disabled for `kind` or the letter is already taken in `pool`.
    pub fn derive_short_form(
        &self,
        name: &str,
        kind: SymbolKind,
        pool: &AliasPool,
    ) -> Option<String> {
        if !self.short_form_auto_generate.contains(kind.flag()) {
            return None;
        }

        let first = strip_prefix(name).chars().next()?;
        let candidate = match kind {
            SymbolKind::Option => format!("{}{}", self.short_form_prefix.as_str(), first),
            SymbolKind::Command => first.to_string(),
            _ => return None,
        };

        if candidate == name || pool.is_taken(&candidate) {
            None
        } else {
            Some(candidate)
        }
    }

    /// Adds the configured prefix to an explicitly supplied option name or
    /// alias that was written without one.
    pub fn normalize_alias(&self, raw: &str, kind: SymbolKind) -> String {
        if kind != SymbolKind::Option || raw.starts_with('-') || raw.starts_with('/') {
            return raw.to_string();
        }

        if raw.chars().count() == 1 {
            format!("{}{}", self.short_form_prefix.as_str(), raw)
        } else {
            format!("{}{}", self.prefix.as_str(), raw)
        }
    }
}

fn derive_base(raw: &str, suffix: &str, casing: NameCasing) -> String {
    if casing == NameCasing::None {
        let trimmed = raw
            .strip_suffix(suffix)
            .or_else(|| raw.strip_suffix(suffix.to_lowercase().as_str()))
            .unwrap_or(raw);
        return trimmed.trim_end_matches(['_', '-']).to_string();
    }

    let mut words = split_words(raw);
    if words
        .last()
        .is_some_and(|last| last.eq_ignore_ascii_case(suffix))
    {
        words.pop();
    }
    apply_casing(&words, casing)
}

/// Splits an identifier into words at case changes, digits-to-letters
/// transitions and `_`/`-`/space separators.
///
/// `HTTPServer` → `["HTTP", "Server"]`, `search_path` → `["search", "path"]`.
pub fn split_words(raw: &str) -> Vec<String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if matches!(c, '_' | '-' | ' ' | '.') {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }

        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Joins words according to a casing convention.
pub fn apply_casing(words: &[String], casing: NameCasing) -> String {
    match casing {
        NameCasing::None => words.concat(),
        NameCasing::LowerCase => words.concat().to_lowercase(),
        NameCasing::UpperCase => words.concat().to_uppercase(),
        NameCasing::TitleCase => words
            .iter()
            .map(|w| capitalize(w))
            .collect::<Vec<_>>()
            .join(" "),
        NameCasing::PascalCase => words.iter().map(|w| capitalize(w)).collect(),
        NameCasing::CamelCase => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
            .collect(),
        NameCasing::KebabCase => join_lower(words, "-"),
        NameCasing::SnakeCase => join_lower(words, "_"),
    }
}

fn join_lower(words: &[String], separator: &str) -> String {
    words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(separator)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Removes a leading `--`, `-` or `/` from an alias.
pub fn strip_prefix(alias: &str) -> &str {
    alias
        .strip_prefix("--")
        .or_else(|| alias.strip_prefix('-'))
        .or_else(|| alias.strip_prefix('/'))
        .unwrap_or(alias)
}

/// How an option alias is presented to clap, which only understands
/// `-s` and `--long`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ClapName {
    Short(char),
    Long(String),
}

impl ClapName {
    pub(crate) fn parse(alias: &str) -> Option<Self> {
        if let Some(rest) = alias.strip_prefix("--") {
            return (!rest.is_empty()).then(|| ClapName::Long(rest.to_string()));
        }

        let rest = strip_prefix(alias);
        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            (None, _) => None,
            (Some(c), None) => Some(ClapName::Short(c)),
            _ => Some(ClapName::Long(rest.to_string())),
        }
    }

    /// The token form clap accepts for this name.
    pub(crate) fn native(&self) -> String {
        match self {
            ClapName::Short(c) => format!("-{}", c),
            ClapName::Long(l) => format!("--{}", l),
        }
    }
}

/// Aliases registered on one command.
///
/// Registration is strict: a literal alias may be registered once. Reserved
/// entries (names inherited from ancestors) only block generated short forms.
#[derive(Debug, Clone, Default)]
pub struct AliasPool {
    aliases: Vec<String>,
    keys: HashSet<ClapName>,
    reserved: HashSet<ClapName>,
}

impl AliasPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `alias` for `command`, failing if it is already present.
    pub fn register(&mut self, alias: &str, command: &str) -> Result<(), AuthoringError> {
        if self.contains(alias) {
            return Err(AuthoringError::DuplicateAlias {
                command: command.to_string(),
                alias: alias.to_string(),
            });
        }
        self.aliases.push(alias.to_string());
        if let Some(key) = ClapName::parse(alias) {
            self.keys.insert(key);
        }
        Ok(())
    }

    /// Marks an alias as unavailable for generated short forms.
    pub fn reserve(&mut self, alias: &str) {
        if let Some(key) = ClapName::parse(alias) {
            self.reserved.insert(key);
        }
    }

    /// Returns true if this exact alias was registered.
    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }

    /// Returns true if the alias, or one clap would treat as the same, is
    /// registered or reserved.
    pub fn is_taken(&self, alias: &str) -> bool {
        self.contains(alias)
            || ClapName::parse(alias)
                .is_some_and(|key| self.keys.contains(&key) || self.reserved.contains(&key))
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("SearchPathOption"), vec!["Search", "Path", "Option"]);
        assert_eq!(split_words("search_path_option"), vec!["search", "path", "option"]);
        assert_eq!(split_words("HTTPServer"), vec!["HTTP", "Server"]);
        assert_eq!(split_words("Argument1"), vec!["Argument1"]);
        assert_eq!(split_words("v2Api"), vec!["v2", "Api"]);
        assert!(split_words("").is_empty());
    }

    #[test]
    fn test_derive_option_name() {
        let policy = NamingPolicy::default();
        assert_eq!(
            policy.derive_name("SearchPathOption", SymbolKind::Option),
            "--search-path"
        );
        assert_eq!(
            policy.derive_name("search_path", SymbolKind::Option),
            "--search-path"
        );
    }

    #[test]
    fn test_arguments_and_directives_are_not_prefixed() {
        let policy = NamingPolicy::default();
        assert_eq!(policy.derive_name("Argument1", SymbolKind::Argument), "argument1");
        assert_eq!(policy.derive_name("FileArgument", SymbolKind::Argument), "file");
        assert_eq!(policy.derive_name("DebugDirective", SymbolKind::Directive), "debug");
    }

    #[test]
    fn test_bare_suffix_yields_empty_name() {
        let policy = NamingPolicy::default();
        assert_eq!(policy.derive_name("Command", SymbolKind::Command), "");
        assert_eq!(policy.derive_name("RootCommand", SymbolKind::Command), "root");
    }

    #[test]
    fn test_casing_conventions() {
        let words: Vec<String> = vec!["search".into(), "Path".into()];
        assert_eq!(apply_casing(&words, NameCasing::LowerCase), "searchpath");
        assert_eq!(apply_casing(&words, NameCasing::UpperCase), "SEARCHPATH");
        assert_eq!(apply_casing(&words, NameCasing::TitleCase), "Search Path");
        assert_eq!(apply_casing(&words, NameCasing::PascalCase), "SearchPath");
        assert_eq!(apply_casing(&words, NameCasing::CamelCase), "searchPath");
        assert_eq!(apply_casing(&words, NameCasing::KebabCase), "search-path");
        assert_eq!(apply_casing(&words, NameCasing::SnakeCase), "search_path");
    }

    #[test]
    fn test_casing_none_strips_suffix_only() {
        let policy = NamingPolicy {
            casing: NameCasing::None,
            ..NamingPolicy::default()
        };
        assert_eq!(
            policy.derive_name("SearchPathOption", SymbolKind::Option),
            "--SearchPath"
        );
        assert_eq!(policy.derive_name("path_option", SymbolKind::Option), "--path");
    }

    #[test]
    fn test_prefix_conventions() {
        let policy = NamingPolicy {
            prefix: NamePrefix::ForwardSlash,
            ..NamingPolicy::default()
        };
        assert_eq!(policy.derive_name("Verbose", SymbolKind::Option), "/verbose");

        let policy = NamingPolicy {
            prefix: NamePrefix::None,
            ..NamingPolicy::default()
        };
        assert_eq!(policy.derive_name("Verbose", SymbolKind::Option), "verbose");
    }

    #[test]
    fn test_auto_generate_disabled_keeps_identifier() {
        let policy = NamingPolicy {
            name_auto_generate: AutoGenerate::COMMANDS,
            ..NamingPolicy::default()
        };
        assert_eq!(
            policy.derive_name("SearchPathOption", SymbolKind::Option),
            "--SearchPathOption"
        );
    }

    #[test]
    fn test_short_form_generation() {
        let policy = NamingPolicy::default();
        let mut pool = AliasPool::new();
        pool.register("--search-path", "root").unwrap();

        let short = policy.derive_short_form("--search-path", SymbolKind::Option, &pool);
        assert_eq!(short.as_deref(), Some("-s"));

        pool.register("-s", "root").unwrap();
        assert_eq!(
            policy.derive_short_form("--size", SymbolKind::Option, &pool),
            None
        );
    }

    #[test]
    fn test_short_form_respects_reserved_and_equivalent_forms() {
        let policy = NamingPolicy::default();
        let mut pool = AliasPool::new();
        pool.reserve("-h");
        assert_eq!(policy.derive_short_form("--host", SymbolKind::Option, &pool), None);

        let mut pool = AliasPool::new();
        pool.register("/v", "root").unwrap();
        assert_eq!(
            policy.derive_short_form("--verbose", SymbolKind::Option, &pool),
            None
        );
    }

    #[test]
    fn test_short_form_disabled_for_commands_by_default() {
        let policy = NamingPolicy::default();
        let pool = AliasPool::new();
        assert_eq!(policy.derive_short_form("add", SymbolKind::Command, &pool), None);

        let policy = NamingPolicy {
            short_form_auto_generate: AutoGenerate::ALL,
            ..NamingPolicy::default()
        };
        assert_eq!(
            policy.derive_short_form("add", SymbolKind::Command, &pool).as_deref(),
            Some("a")
        );
    }

    #[test]
    fn test_register_duplicate_alias_fails() {
        let mut pool = AliasPool::new();
        pool.register("--name", "root").unwrap();
        let err = pool.register("--name", "root").unwrap_err();
        assert!(matches!(err, AuthoringError::DuplicateAlias { .. }));
        // Case-sensitive comparison
        assert!(pool.register("--Name", "root").is_ok());
    }

    #[test]
    fn test_normalize_alias() {
        let policy = NamingPolicy::default();
        assert_eq!(policy.normalize_alias("s", SymbolKind::Option), "-s");
        assert_eq!(policy.normalize_alias("search", SymbolKind::Option), "--search");
        assert_eq!(policy.normalize_alias("--search", SymbolKind::Option), "--search");
        assert_eq!(policy.normalize_alias("/s", SymbolKind::Option), "/s");
        assert_eq!(policy.normalize_alias("ls", SymbolKind::Command), "ls");
    }

    #[test]
    fn test_inherit_overrides() {
        let parent = NamingPolicy::default();
        let child = parent.inherit(&NamingOverrides {
            casing: Some(NameCasing::SnakeCase),
            ..NamingOverrides::default()
        });
        assert_eq!(child.casing, NameCasing::SnakeCase);
        assert_eq!(child.prefix, NamePrefix::DoubleHyphen);

        let grandchild = child.inherit(&NamingOverrides::default());
        assert_eq!(grandchild.casing, NameCasing::SnakeCase);
    }

    #[test]
    fn test_clap_name() {
        assert_eq!(ClapName::parse("--name"), Some(ClapName::Long("name".into())));
        assert_eq!(ClapName::parse("-n"), Some(ClapName::Short('n')));
        assert_eq!(ClapName::parse("/n"), Some(ClapName::Short('n')));
        assert_eq!(ClapName::parse("-name"), Some(ClapName::Long("name".into())));
        assert_eq!(ClapName::parse("name"), Some(ClapName::Long("name".into())));
        assert_eq!(ClapName::parse("--x"), Some(ClapName::Long("x".into())));
        assert_eq!(ClapName::parse("-"), None);
        assert_eq!(ClapName::Short('n').native(), "-n");
    }
}
