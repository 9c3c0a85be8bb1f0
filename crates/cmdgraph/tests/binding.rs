//! Integration tests for binding.
//!
//! Instances are built lazily per parse result; these tests pin down the
//! cache, the resolver precedence and the dependency errors.

use std::sync::Arc;

use cmdgraph::ambient::ResolverScope;
use cmdgraph::{
    field, ArgumentSpec, BindOptions, BindingError, CommandDefinition, CommandSpec, FunctionMap,
    GraphBuilder, OptionSpec, Parameters, ServiceMap, Settings, TypeShape,
};

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct RootCommand {
    search_path_option: Option<String>,
    argument1: String,
}

impl CommandDefinition for RootCommand {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(field!(Self, search_path_option), OptionSpec::new())
            .argument(field!(Self, argument1), ArgumentSpec::new())
            .construct_default();
    }
}

#[derive(Default)]
struct Tool {
    verbose: bool,
}

impl CommandDefinition for Tool {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<ListCommand>().child::<ShowCommand>())
            .option(field!(Self, verbose), OptionSpec::new().recursive(true))
            .construct_default()
            .method("ping", CommandSpec::new(), Parameters::new(), |_, _, _| {});
    }
}

#[derive(Default)]
struct ListCommand {
    depth: u32,
    patterns: Vec<String>,
}

impl CommandDefinition for ListCommand {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(field!(Self, depth).default(1), OptionSpec::new())
            .argument(field!(Self, patterns), ArgumentSpec::new().required(false))
            .construct_default();
    }
}

#[derive(Default)]
struct ShowCommand;

impl CommandDefinition for ShowCommand {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.construct_default();
    }
}

// ============================================================================
// Test: values and defaults
// ============================================================================

#[test]
fn root_binds_option_and_argument() {
    let graph = GraphBuilder::new::<RootCommand>().build().unwrap();
    let result = graph.parse(["--search-path", "x", "arg"]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());

    let root = graph.bind::<RootCommand>(&result).unwrap();
    assert_eq!(root.search_path_option.as_deref(), Some("x"));
    assert_eq!(root.argument1, "arg");
}

#[test]
fn missing_required_argument_is_a_parse_error() {
    let graph = GraphBuilder::new::<RootCommand>().build().unwrap();
    let result = graph.parse(Vec::<String>::new());
    assert!(!result.errors().is_empty());
    assert_eq!(graph.run(Vec::<String>::new()), 1);
}

#[test]
fn declared_default_applies_when_option_is_absent() {
    let graph = GraphBuilder::new::<Tool>().build().unwrap();

    let list = graph.bind::<ListCommand>(&graph.parse(["list"])).unwrap();
    assert_eq!(list.depth, 1);
    assert!(list.patterns.is_empty());

    let list = graph
        .bind::<ListCommand>(&graph.parse(["list", "--depth", "4", "a*", "b*"]))
        .unwrap();
    assert_eq!(list.depth, 4);
    assert_eq!(list.patterns, vec!["a*", "b*"]);
}

#[test]
fn recursive_option_binds_on_declaring_command() {
    let graph = GraphBuilder::new::<Tool>().build().unwrap();
    let result = graph.parse(["list", "--verbose"]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert!(graph.bind::<Tool>(&result).unwrap().verbose);
}

// ============================================================================
// Test: caching
// ============================================================================

#[test]
fn bind_returns_the_same_instance_per_parse_result() {
    let graph = GraphBuilder::new::<Tool>().build().unwrap();
    let result = graph.parse(["list"]);

    let first = graph.bind::<ListCommand>(&result).unwrap();
    let second = graph.bind::<ListCommand>(&result).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other = graph.bind::<ListCommand>(&graph.parse(["list"])).unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
}

#[test]
fn return_empty_bypasses_cache_and_values() {
    let graph = GraphBuilder::new::<Tool>().build().unwrap();
    let result = graph.parse(["list", "--depth", "9"]);

    let cached = graph.bind::<ListCommand>(&result).unwrap();
    let empty = graph
        .bind_with::<ListCommand>(&result, &BindOptions::new().return_empty(true))
        .unwrap();
    assert!(!Arc::ptr_eq(&cached, &empty));
    assert_eq!(cached.depth, 9);
    assert_eq!(empty.depth, 0);

    let again = graph.bind::<ListCommand>(&result).unwrap();
    assert!(Arc::ptr_eq(&cached, &again));
}

#[test]
fn bind_all_walks_root_to_called() {
    let graph = GraphBuilder::new::<Tool>().build().unwrap();
    let result = graph.parse(["list"]);
    let bound = graph.bind_all(&result, &BindOptions::default()).unwrap();

    let names: Vec<&str> = bound.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["tool", "list"]);
    assert!(bound[0].is::<Tool>());
    assert!(bound[1].get::<ListCommand>().is_some());
}

#[test]
fn bind_all_skips_method_nodes() {
    let graph = GraphBuilder::new::<Tool>().build().unwrap();
    let result = graph.parse(["ping"]);
    let bound = graph.bind_all(&result, &BindOptions::default()).unwrap();
    assert_eq!(bound.len(), 1);
    assert!(bound[0].is::<Tool>());

    let called = graph.bind_called(&result, &BindOptions::default()).unwrap();
    assert!(called.is::<Tool>());
}

#[test]
fn binding_unknown_type_fails() {
    let graph = GraphBuilder::new::<Tool>().build().unwrap();
    let result = graph.parse(["list"]);
    assert!(matches!(
        graph.bind::<RootCommand>(&result),
        Err(BindingError::UnknownDefinition { .. })
    ));
}

// ============================================================================
// Test: services
// ============================================================================

struct Database {
    url: String,
}

struct Label(&'static str);

struct Store {
    db: Arc<Database>,
    label: Option<Arc<Label>>,
}

impl CommandDefinition for Store {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.construct_with(
            Parameters::new()
                .service::<Database>("db")
                .optional_service::<Label>("label"),
            |args| {
                Ok(Store {
                    db: args.service::<Database>("db")?,
                    label: args.optional_service::<Label>("label"),
                })
            },
        );
    }
}

#[test]
fn missing_service_is_reported() {
    let graph = GraphBuilder::new::<Store>().build().unwrap();
    let err = graph.bind::<Store>(&graph.parse(Vec::<String>::new())).err().unwrap();
    match err {
        BindingError::MissingDependency {
            owner, parameter, ..
        } => {
            assert_eq!(owner, "Store");
            assert_eq!(parameter, "db");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn optional_service_may_be_missing() {
    let graph = GraphBuilder::new::<Store>()
        .services(ServiceMap::new().with(Database { url: "mem".into() }))
        .build()
        .unwrap();
    let store = graph.bind::<Store>(&graph.parse(Vec::<String>::new())).unwrap();
    assert_eq!(store.db.url, "mem");
    assert!(store.label.is_none());
}

struct Labelled {
    label: Arc<Label>,
}

impl CommandDefinition for Labelled {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.construct_with(
            Parameters::new().service_or("label", || Label("fallback")),
            |args| {
                Ok(Labelled {
                    label: args.service::<Label>("label")?,
                })
            },
        );
    }
}

fn bound_label(graph: &cmdgraph::RuntimeGraph, opts: &BindOptions) -> &'static str {
    let result = graph.parse(Vec::<String>::new());
    graph.bind_with::<Labelled>(&result, opts).unwrap().label.0
}

#[test]
fn declared_service_default_is_last_resort() {
    let graph = GraphBuilder::new::<Labelled>().build().unwrap();
    assert_eq!(bound_label(&graph, &BindOptions::default()), "fallback");
}

#[test]
fn service_resolvers_are_consulted_by_precedence() {
    let graph = GraphBuilder::new::<Labelled>()
        .services(ServiceMap::new().with(Label("default")))
        .build()
        .unwrap();
    assert_eq!(bound_label(&graph, &BindOptions::default()), "default");

    let _scope = ResolverScope::enter(Arc::new(ServiceMap::new().with(Label("ambient"))));
    assert_eq!(bound_label(&graph, &BindOptions::default()), "ambient");

    let per_call = BindOptions::new().services(ServiceMap::new().with(Label("call")));
    assert_eq!(bound_label(&graph, &per_call), "call");
}

#[test]
fn default_services_can_be_replaced() {
    let graph = GraphBuilder::new::<Labelled>().build().unwrap();
    graph.set_default_services(Arc::new(ServiceMap::new().with(Label("late"))));
    assert_eq!(bound_label(&graph, &BindOptions::default()), "late");
}

#[test]
fn construction_errors_are_wrapped() {
    struct Failing;

    impl CommandDefinition for Failing {
        fn define(cmd: &mut TypeShape<Self>) {
            cmd.construct_with(Parameters::new(), |_| anyhow::bail!("no config file"));
        }
    }

    let graph = GraphBuilder::new::<Failing>().build().unwrap();
    let err = graph.bind::<Failing>(&graph.parse(Vec::<String>::new())).err().unwrap();
    assert!(matches!(err, BindingError::Construction { .. }));
    assert!(err.to_string().contains("no config file"));
}

// ============================================================================
// Test: functions
// ============================================================================

struct Formatter {
    prefix: &'static str,
}

struct Report {
    format: Arc<Formatter>,
}

impl CommandDefinition for Report {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.construct_with(Parameters::new().function::<Formatter>("format"), |args| {
            Ok(Report {
                format: args.function::<Formatter>("format")?,
            })
        });
    }
}

#[test]
fn function_comes_from_function_resolver() {
    let graph = GraphBuilder::new::<Report>()
        .functions(FunctionMap::new().with(Formatter { prefix: ">" }))
        .build()
        .unwrap();
    let report = graph.bind::<Report>(&graph.parse(Vec::<String>::new())).unwrap();
    assert_eq!(report.format.prefix, ">");
}

#[test]
fn per_call_function_resolver_wins() {
    let graph = GraphBuilder::new::<Report>()
        .functions(FunctionMap::new().with(Formatter { prefix: ">" }))
        .build()
        .unwrap();
    let opts = BindOptions::new().functions(FunctionMap::new().with(Formatter { prefix: "#" }));
    let report = graph
        .bind_with::<Report>(&graph.parse(Vec::<String>::new()), &opts)
        .unwrap();
    assert_eq!(report.format.prefix, "#");
}

#[test]
fn unregistered_function_hints_at_services() {
    let graph = GraphBuilder::new::<Report>()
        .services(ServiceMap::new().with(Formatter { prefix: "$" }))
        .build()
        .unwrap();
    let err = graph.bind::<Report>(&graph.parse(Vec::<String>::new())).err().unwrap();
    assert!(matches!(
        err,
        BindingError::FunctionNotRegistered {
            available_from_services: true,
            ..
        }
    ));

    let graph = GraphBuilder::new::<Report>().build().unwrap();
    let err = graph.bind::<Report>(&graph.parse(Vec::<String>::new())).err().unwrap();
    assert!(matches!(
        err,
        BindingError::FunctionNotRegistered {
            available_from_services: false,
            ..
        }
    ));
}

#[test]
fn functions_resolve_from_services_when_enabled() {
    let graph = GraphBuilder::new::<Report>()
        .services(ServiceMap::new().with(Formatter { prefix: "$" }))
        .settings(Settings::default().with_functions_from_services(true))
        .build()
        .unwrap();
    let report = graph.bind::<Report>(&graph.parse(Vec::<String>::new())).unwrap();
    assert_eq!(report.format.prefix, "$");
}
