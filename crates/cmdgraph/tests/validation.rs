//! Integration tests for value validation.
//!
//! Path rules run against [`MockFileSystem`] for deterministic results, and
//! once against a real temporary directory.

use std::path::PathBuf;

use cmdgraph::{
    field, ArgumentSpec, Arity, CommandDefinition, CommandSpec, GraphBuilder, MockFileSystem,
    OptionSpec, ParseErrorKind, RealFileSystem, TypeShape, ValidationRules,
};

#[derive(Default)]
struct Convert {
    format: Option<String>,
    name: Option<String>,
    input: Option<PathBuf>,
    output: Option<String>,
    endpoint: Option<String>,
}

impl CommandDefinition for Convert {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(
            field!(Self, format),
            OptionSpec::new().allowed_values(["json", "text"]),
        )
        .option(
            field!(Self, name),
            OptionSpec::new()
                .pattern("^[a-z]+$")
                .pattern_message("'{value}' must be lowercase letters"),
        )
        .option(
            field!(Self, input),
            OptionSpec::new().rules(ValidationRules::EXISTING_FILE),
        )
        .option(
            field!(Self, output),
            OptionSpec::new().rules(ValidationRules::NON_EXISTING_FILE | ValidationRules::LEGAL_PATH),
        )
        .option(
            field!(Self, endpoint),
            OptionSpec::new().rules(ValidationRules::LEGAL_URL),
        )
        .construct_default();
    }
}

fn graph() -> cmdgraph::RuntimeGraph {
    GraphBuilder::new::<Convert>()
        .file_system(
            MockFileSystem::new()
                .with_file("in.txt")
                .with_file("taken.txt")
                .with_directory("out"),
        )
        .build()
        .unwrap()
}

#[test]
fn valid_values_pass() {
    let result = graph().parse([
        "--format",
        "json",
        "--name",
        "report",
        "--input",
        "in.txt",
        "--output",
        "new.txt",
        "--endpoint",
        "https://example.com/api",
    ]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());
}

#[test]
fn value_outside_allowed_set_is_rejected() {
    let result = graph().parse(["--format", "xml"]);
    let errors = result.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ParseErrorKind::Validation);
    assert_eq!(errors[0].symbol.as_deref(), Some("--format"));
    assert_eq!(
        errors[0].message,
        "Argument 'xml' not recognized. Must be one of: 'json', 'text'."
    );
}

#[test]
fn pattern_failure_uses_custom_message() {
    let result = graph().parse(["--name", "Report1"]);
    assert_eq!(
        result.errors()[0].message,
        "'Report1' must be lowercase letters"
    );
}

#[test]
fn existing_file_rule_consults_file_system() {
    let result = graph().parse(["--input", "missing.txt"]);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(
        result.errors()[0].message,
        "File does not exist: 'missing.txt'."
    );
}

#[test]
fn combined_rules_report_first_failure() {
    let result = graph().parse(["--output", "taken.txt"]);
    assert_eq!(result.errors()[0].message, "File already exists: 'taken.txt'.");

    let result = graph().parse(["--output", "bad|name"]);
    assert_eq!(
        result.errors()[0].message,
        "Character not allowed in a path: 'bad|name'."
    );
}

#[test]
fn url_rule_requires_http_scheme() {
    let result = graph().parse(["--endpoint", "ftp://example.com"]);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].kind, ParseErrorKind::Validation);
}

#[test]
fn rule_and_pattern_failures_are_both_reported() {
    #[derive(Default)]
    struct Fetch {
        url: Option<String>,
    }

    impl CommandDefinition for Fetch {
        fn define(cmd: &mut TypeShape<Self>) {
            cmd.option(
                field!(Self, url),
                OptionSpec::new()
                    .rules(ValidationRules::LEGAL_URL)
                    .pattern("^https://"),
            )
            .construct_default();
        }
    }

    let graph = GraphBuilder::new::<Fetch>().build().unwrap();
    let result = graph.parse(["--url", "ftp x"]);
    let messages: Vec<&str> = result.errors().iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Value is not a legal HTTP or HTTPS URL: 'ftp x'.",
            "Value 'ftp x' does not match the pattern '^https://'.",
        ]
    );
}

#[test]
fn errors_accumulate_across_symbols() {
    let result = graph().parse(["--format", "xml", "--input", "nope"]);
    assert_eq!(result.errors().len(), 2);
}

#[test]
fn validation_failure_exits_with_one() {
    assert_eq!(graph().run(["--format", "xml"]), 1);
}

// ============================================================================
// Test: real file system
// ============================================================================

#[derive(Default)]
struct CopyFiles {
    source: PathBuf,
    target: PathBuf,
}

impl CommandDefinition for CopyFiles {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.argument(
            field!(Self, source),
            ArgumentSpec::new().rules(ValidationRules::EXISTING_FILE),
        )
        .argument(
            field!(Self, target),
            ArgumentSpec::new().rules(ValidationRules::EXISTING_DIRECTORY),
        )
        .construct_default();
    }
}

#[test]
fn path_rules_against_real_directory() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("source.txt");
    std::fs::write(&file, "data").unwrap();

    let graph = GraphBuilder::new::<CopyFiles>()
        .file_system(RealFileSystem)
        .build()
        .unwrap();

    let file_arg = file.to_string_lossy().into_owned();
    let dir_arg = dir.path().to_string_lossy().into_owned();

    let result = graph.parse([file_arg.clone(), dir_arg.clone()]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    let copy = graph.bind::<CopyFiles>(&result).unwrap();
    assert_eq!(copy.source, file);

    let result = graph.parse([dir_arg.clone(), file_arg.clone()]);
    let messages: Vec<&str> = result.errors().iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with("File does not exist"));
    assert!(messages[1].starts_with("Directory does not exist"));
}

// ============================================================================
// Test: required recursive options
// ============================================================================

#[derive(Default)]
struct Remote {
    token: String,
}

impl CommandDefinition for Remote {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<Push>())
            .option(field!(Self, token), OptionSpec::new().recursive(true).required(true))
            .construct_default();
    }
}

#[derive(Default)]
struct Push;

impl CommandDefinition for Push {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.construct_default();
    }
}

#[test]
fn missing_required_recursive_option_is_reported() {
    let graph = GraphBuilder::new::<Remote>().build().unwrap();

    let result = graph.parse(["push"]);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].kind, ParseErrorKind::MissingRequired);
    assert_eq!(result.errors()[0].message, "Option '--token' is required.");

    let result = graph.parse(["push", "--token", "abc"]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert_eq!(graph.bind::<Remote>(&result).unwrap().token, "abc");
}

// ============================================================================
// Test: declared arity
// ============================================================================

#[derive(Default)]
struct Tag {
    level: Option<String>,
    tags: Vec<String>,
}

impl CommandDefinition for Tag {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(
            field!(Self, level),
            OptionSpec::new().arity(Arity::ZERO_OR_ONE),
        )
        .option(
            field!(Self, tags),
            OptionSpec::new().arity(Arity::new(1, Some(2))),
        )
        .construct_default();
    }
}

#[test]
fn optional_value_may_be_omitted() {
    let graph = GraphBuilder::new::<Tag>().build().unwrap();

    let result = graph.parse(["--level"]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert_eq!(graph.bind::<Tag>(&result).unwrap().level, None);

    let result = graph.parse(["--level", "debug"]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert_eq!(graph.bind::<Tag>(&result).unwrap().level.as_deref(), Some("debug"));
}

#[test]
fn sequence_total_is_capped_by_arity() {
    let graph = GraphBuilder::new::<Tag>().build().unwrap();

    let result = graph.parse(["--tags", "a", "--tags", "b"]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert_eq!(graph.bind::<Tag>(&result).unwrap().tags, vec!["a", "b"]);

    let result = graph.parse(["--tags", "a", "--tags", "b", "--tags", "c"]);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].kind, ParseErrorKind::Syntax);
    assert_eq!(
        result.errors()[0].message,
        "Option '--tags' expects at most 2 value(s), got 3."
    );
}
