//! Parsing command lines against a built graph.
//!
//! Parsing is a thin layer over clap:
//!
//! 1. leading `[name]` / `[name:value]` tokens naming a known directive are
//!    split off,
//! 2. option tokens written with a prefix clap cannot read (`/verbose`,
//!    `-verbose`, bare `verbose`) are rewritten to `--verbose` / `-v`,
//! 3. clap parses the remaining tokens,
//! 4. value counts, validation rules and required recursive options are
//!    checked along the called command's ancestry.
//!
//! The outcome is a [`ParseResult`], which also owns the bind cache.

use std::any::TypeId;
use std::collections::HashMap;

use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::ArgMatches;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ParseError, ParseErrorKind};
use crate::graph::{NodeId, RuntimeGraph};
use crate::model::{Boxed, Instance, SymbolSource};
use crate::naming::{ClapName, SymbolKind};
use crate::shape::CommandDefinition;
use crate::symbol::{Binder, Symbol};
use crate::value::ValueShape;

/// clap id of the hidden catch-all that collects unmatched tokens.
pub(crate) const UNMATCHED_ID: &str = "__unmatched";

/// Rewrites the option literals of one command that clap cannot parse
/// natively.
#[derive(Debug, Default)]
pub(crate) struct TokenNormalizer {
    rewrites: HashMap<String, String>,
}

impl TokenNormalizer {
    pub(crate) fn new(literals: impl IntoIterator<Item = String>) -> Self {
        let mut rewrites = HashMap::new();
        for literal in literals {
            if let Some(name) = ClapName::parse(&literal) {
                let native = name.native();
                if native != literal {
                    rewrites.insert(literal, native);
                }
            }
        }
        Self { rewrites }
    }

    /// The clap form of `token`, if it names one of this command's options.
    pub(crate) fn rewrite(&self, token: &str) -> Option<String> {
        if self.rewrites.is_empty() {
            return None;
        }
        if let Some(native) = self.rewrites.get(token) {
            return Some(native.clone());
        }
        let pos = token.find(['=', ':'])?;
        self.rewrites
            .get(&token[..pos])
            .map(|native| format!("{}={}", native, &token[pos + 1..]))
    }
}

/// Splits leading directive tokens off the command line.
fn extract_directives(
    args: Vec<String>,
    known: &[String],
) -> (Vec<(String, Option<String>)>, Vec<String>) {
    let mut directives = Vec::new();
    let mut rest = args.into_iter().peekable();

    while let Some(token) = rest.peek() {
        let Some(inner) = token
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
        else {
            break;
        };
        let (name, value) = match inner.split_once(':') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (inner, None),
        };
        if !known.iter().any(|k| k == name) {
            break;
        }
        directives.push((name.to_string(), value));
        rest.next();
    }

    (directives, rest.collect())
}

/// Names of the subcommands selected in `matches`, outermost first.
fn extract_command_path(matches: &ArgMatches) -> Vec<String> {
    let mut path = Vec::new();
    let mut current = matches;
    while let Some((name, sub)) = current.subcommand() {
        path.push(name.to_string());
        current = sub;
    }
    path
}

/// Whether `id` was given on the command line (not defaulted).
fn given(matches: &ArgMatches, id: &str) -> bool {
    matches.ids().any(|i| i.as_str() == id)
        && !matches!(matches.value_source(id), Some(ValueSource::DefaultValue) | None)
}

fn raw_values(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_raw(id)
        .map(|values| values.map(|v| v.to_string_lossy().into_owned()).collect())
        .unwrap_or_default()
}

/// First line of a rendered clap error, without the `error: ` prefix.
fn clap_message(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).trim().to_string()
}

/// The outcome of parsing one command line.
///
/// Holds the matched values, the called command, accumulated errors and the
/// cache of instances bound from it.
pub struct ParseResult {
    graph: RuntimeGraph,
    tokens: Vec<String>,
    directives: Vec<(String, Option<String>)>,
    matches: Option<ArgMatches>,
    called: NodeId,
    errors: Vec<ParseError>,
    early_exit: Option<String>,
    unmatched: Vec<String>,
    pub(crate) bindings: Mutex<HashMap<TypeId, Instance>>,
}

impl std::fmt::Debug for ParseResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseResult")
            .field("tokens", &self.tokens)
            .field("directives", &self.directives)
            .field("called", &self.called_path())
            .field("errors", &self.errors)
            .field("unmatched", &self.unmatched)
            .finish_non_exhaustive()
    }
}

impl RuntimeGraph {
    /// Parses `args` (without the program name).
    pub fn parse<I, S>(&self, args: I) -> ParseResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let (directives, rest) = extract_directives(args, &self.inner.directives);
        let tokens = self.normalize_tokens(rest);

        let mut result = ParseResult {
            graph: self.clone(),
            tokens,
            directives,
            matches: None,
            called: self.root(),
            errors: Vec::new(),
            early_exit: None,
            unmatched: Vec::new(),
            bindings: Mutex::new(HashMap::new()),
        };

        match self.inner.command.clone().try_get_matches_from(&result.tokens) {
            Ok(matches) => {
                let path = extract_command_path(&matches);
                result.called = self
                    .inner
                    .binding
                    .commands
                    .get(&path)
                    .copied()
                    .unwrap_or(self.root());
                result.matches = Some(matches);
                result.validate();
                result.collect_unmatched();
            }
            Err(err) => {
                result.called = self.walk_tokens(&result.tokens);
                match err.kind() {
                    ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                        result.early_exit = Some(err.render().to_string());
                    }
                    ErrorKind::MissingRequiredArgument => result.errors.push(ParseError {
                        kind: ParseErrorKind::MissingRequired,
                        message: clap_message(&err),
                        symbol: None,
                    }),
                    _ => result.errors.push(ParseError::syntax(clap_message(&err))),
                }
            }
        }

        debug!(
            called = ?result.called_path(),
            errors = result.errors.len(),
            directives = result.directives.len(),
            "parsed command line"
        );
        result
    }

    /// Rewrites option tokens with the literals visible to the command
    /// reached so far. Only tokens before a literal `--` are touched.
    fn normalize_tokens(&self, tokens: Vec<String>) -> Vec<String> {
        let mut current = self.root();
        let mut escaped = false;
        tokens
            .into_iter()
            .map(|token| {
                if escaped {
                    return token;
                }
                if token == "--" {
                    escaped = true;
                    return token;
                }
                if let Some(child) = self.child_named(current, &token) {
                    current = child;
                    return token;
                }
                self.inner.normalizers[current.0]
                    .rewrite(&token)
                    .unwrap_or(token)
            })
            .collect()
    }

    fn child_named(&self, node: NodeId, token: &str) -> Option<NodeId> {
        self.children(node).iter().copied().find(|child| {
            self.info(*child)
                .is_some_and(|info| info.name == token || info.aliases.iter().any(|a| a == token))
        })
    }

    /// Follows command names and aliases in `tokens` as far as they lead.
    fn walk_tokens(&self, tokens: &[String]) -> NodeId {
        let mut current = self.root();
        for token in tokens {
            if token == "--" {
                break;
            }
            if let Some(next) = self.child_named(current, token) {
                current = next;
            }
        }
        current
    }
}

impl ParseResult {
    pub fn graph(&self) -> &RuntimeGraph {
        &self.graph
    }

    /// Tokens handed to clap, after directive extraction and normalization.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn called(&self) -> NodeId {
        self.called
    }

    /// Canonical names of the called command below the root.
    pub fn called_path(&self) -> &[String] {
        self.graph
            .info(self.called)
            .map(|info| info.path.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `T` is the command that was called.
    pub fn is_called<T: CommandDefinition>(&self) -> bool {
        self.graph.node_for::<T>() == Some(self.called)
    }

    /// True when nothing but command names was given.
    pub fn is_empty_command(&self) -> bool {
        self.tokens.len() <= self.called_path().len()
    }

    /// Tokens collected by commands that accept unmatched input.
    pub fn unmatched_tokens(&self) -> &[String] {
        &self.unmatched
    }

    /// Rendered help or version text when clap asked to print it instead
    /// of running a command.
    pub fn early_exit(&self) -> Option<&str> {
        self.early_exit.as_deref()
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.iter().any(|(n, _)| n == name)
    }

    /// Values of every occurrence of a directive, in order.
    pub fn directive_values(&self, name: &str) -> Vec<Option<String>> {
        self.directives
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn directives(&self) -> &[(String, Option<String>)] {
        &self.directives
    }

    /// clap matches for `node`, when it lies on the called chain.
    pub fn matches_for(&self, node: NodeId) -> Option<&ArgMatches> {
        let info = self.graph.info(node)?;
        let mut current = self.matches.as_ref()?;
        for name in &info.path {
            match current.subcommand() {
                Some((sub, matches)) if sub == name => current = matches,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Parsed value for one binder, falling back to its declared default.
    pub(crate) fn read_symbol(&self, node: NodeId, binder: &Binder) -> Option<Boxed> {
        let symbol = &self.graph.node(node).symbols[binder.symbol];
        let extracted = match symbol.kind() {
            SymbolKind::Directive => {
                let values = self.directive_values(&symbol.info.name);
                if values.is_empty() {
                    None
                } else {
                    (binder.extract)(&SymbolSource::Directive(&values))
                }
            }
            _ => self
                .matches_for(node)
                .filter(|m| given(m, &symbol.id))
                .and_then(|matches| {
                    (binder.extract)(&SymbolSource::Matches {
                        matches,
                        id: &symbol.id,
                    })
                }),
        };
        extracted.or_else(|| binder.default.as_ref().map(|make| make()))
    }

    fn validate(&mut self) {
        let fs = self.graph.inner.file_system.clone();
        let mut errors = Vec::new();

        for node in self.graph.ancestry(self.called) {
            let Some(matches) = self.matches_for(node) else {
                continue;
            };
            for symbol in &self.graph.node(node).symbols {
                if symbol.kind() == SymbolKind::Directive {
                    continue;
                }
                if !given(matches, &symbol.id) {
                    if symbol.info.recursive && symbol.info.required {
                        errors.push(ParseError::missing(&symbol.info.name));
                    }
                    continue;
                }
                let tokens = raw_values(matches, &symbol.id);
                if symbol.shape == ValueShape::Sequence {
                    if let Some(err) = symbol.check_count(tokens.len()) {
                        errors.push(err);
                        continue;
                    }
                }
                if !symbol.validator.is_empty() {
                    errors.extend(symbol.validator.check(&symbol.info.name, &tokens, fs.as_ref()));
                }
            }
        }

        self.errors.extend(errors);
    }

    fn collect_unmatched(&mut self) {
        let unmatched = self
            .matches_for(self.called)
            .filter(|m| m.ids().any(|id| id.as_str() == UNMATCHED_ID))
            .and_then(|m| m.get_many::<String>(UNMATCHED_ID))
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        self.unmatched = unmatched;
    }

    /// A bracketed rendering of what each token was parsed as.
    ///
    /// `[ search-tool [ list [ --depth <2> ] [ path <src> ] ] ]`; defaulted
    /// values are marked with `*`, unmatched tokens with `???-->`.
    pub fn diagram(&self) -> String {
        let mut parts = Vec::new();
        let chain = self.graph.ancestry(self.called);

        for &id in &chain {
            let name = if id == self.graph.root() {
                self.graph.clap_command().get_name().to_string()
            } else {
                self.graph.node(id).info.name.clone()
            };
            parts.push(format!("[ {}", name));

            let Some(matches) = self.matches_for(id) else {
                continue;
            };
            for symbol in &self.graph.node(id).symbols {
                if let Some(part) = diagram_symbol(matches, symbol) {
                    parts.push(part);
                }
            }
        }
        let mut out = parts.join(" ");
        out.push_str(&" ]".repeat(chain.len()));

        let stray: Vec<&String> = if self.matches.is_some() {
            self.unmatched.iter().collect()
        } else {
            self.tokens.iter().skip(self.called_path().len()).collect()
        };
        for token in stray {
            out.push_str(&format!(" ???--> {}", token));
        }
        out
    }

    /// Completion candidates for the last token.
    pub fn suggestions(&self) -> Vec<String> {
        let (context, partial) = match self.tokens.split_last() {
            Some((last, rest)) => (rest, last.as_str()),
            None => (&[][..], ""),
        };
        let graph = &self.graph;
        let node = graph.walk_tokens(context);

        let mut candidates = Vec::new();
        for &child in graph.children(node) {
            let info = &graph.node(child).info;
            if !info.hidden {
                candidates.push(info.name.clone());
                candidates.extend(info.aliases.iter().cloned());
            }
        }
        for ancestor in graph.ancestry(node) {
            for symbol in &graph.node(ancestor).symbols {
                let visible = ancestor == node || symbol.info.recursive;
                if symbol.kind() == SymbolKind::Option && visible && !symbol.info.hidden {
                    candidates.extend(symbol.all_names().cloned());
                }
            }
        }
        let settings = graph.settings();
        if settings.enable_help {
            candidates.extend(["--help".to_string(), "-h".to_string()]);
        }
        if settings.enable_version && node == graph.root() {
            candidates.push("--version".to_string());
        }

        candidates.retain(|c| c.starts_with(partial));
        candidates.sort();
        candidates.dedup();
        candidates
    }
}

fn diagram_symbol(matches: &ArgMatches, symbol: &Symbol) -> Option<String> {
    if symbol.kind() == SymbolKind::Directive || !matches.ids().any(|i| i.as_str() == symbol.id) {
        return None;
    }
    let source = matches.value_source(&symbol.id)?;
    let values: String = raw_values(matches, &symbol.id)
        .iter()
        .map(|v| format!(" <{}>", v))
        .collect();
    match source {
        ValueSource::DefaultValue => None,
        _ => Some(format!("[ {}{} ]", symbol.info.name, values)),
    }
}
