//! Integration tests for graph construction.
//!
//! These cover discovery through children and parent declarations, ordering,
//! and every authoring error the builder can raise.

use std::sync::Arc;

use cmdgraph::{
    field, ArgumentSpec, AuthoringError, CommandDefinition, CommandSpec, GraphBuilder,
    InterfaceShape, NamePrefix, NodeVariant, OptionSpec, Parameters, Settings, TypeShape,
};

// ============================================================================
// Test: discovery and ordering
// ============================================================================

#[derive(Default)]
struct RootCommand {
    verbose: bool,
}

impl CommandDefinition for RootCommand {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(
            CommandSpec::new()
                .description("Root of the tree")
                .child::<ListCommand>()
                .child::<AddCommand>(),
        )
        .option(field!(Self, verbose), OptionSpec::new().recursive(true))
        .construct_default()
        .method("sync", CommandSpec::new().order(5), Parameters::new(), |_, _, _| {});
    }
}

#[derive(Default)]
struct ListCommand {
    all: bool,
}

impl CommandDefinition for ListCommand {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().order(2).alias("ls"))
            .option(field!(Self, all), OptionSpec::new())
            .construct_default();
    }
}

#[derive(Default)]
struct AddCommand;

impl CommandDefinition for AddCommand {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().order(1)).construct_default();
    }
}

/// Only reachable through its own parent declaration.
#[derive(Default)]
struct RemoveCommand;

impl CommandDefinition for RemoveCommand {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().parent::<RootCommand>().order(3))
            .construct_default();
    }
}

fn child_names(graph: &cmdgraph::RuntimeGraph, id: cmdgraph::NodeId) -> Vec<String> {
    graph
        .children(id)
        .iter()
        .map(|c| graph.info(*c).unwrap().name.clone())
        .collect()
}

#[test]
fn children_are_sorted_by_order() {
    let graph = GraphBuilder::new::<RootCommand>().build().unwrap();
    assert_eq!(child_names(&graph, graph.root()), vec!["add", "list", "sync"]);
    assert_eq!(graph.info(graph.root()).unwrap().name, "root");
}

#[test]
fn registered_type_is_attached_through_its_parent() {
    let graph = GraphBuilder::new::<RootCommand>()
        .register::<RemoveCommand>()
        .build()
        .unwrap();
    assert_eq!(
        child_names(&graph, graph.root()),
        vec!["add", "list", "remove", "sync"]
    );
    let remove = graph.node_for::<RemoveCommand>().unwrap();
    assert_eq!(graph.parent(remove), Some(graph.root()));
}

#[test]
fn method_becomes_child_command() {
    let graph = GraphBuilder::new::<RootCommand>().build().unwrap();
    let sync = graph.find(&["sync"]).unwrap();
    let info = graph.info(sync).unwrap();
    assert_eq!(info.variant, NodeVariant::Method);
    assert_eq!(info.path, vec!["sync"]);
}

#[test]
fn aliases_and_paths_are_recorded() {
    let graph = GraphBuilder::new::<RootCommand>().build().unwrap();
    let list = graph.node_for::<ListCommand>().unwrap();
    let info = graph.info(list).unwrap();
    assert_eq!(info.aliases, vec!["ls"]);
    assert_eq!(info.path, vec!["list"]);
    assert_eq!(info.variant, NodeVariant::Type);

    let result = graph.parse(["ls", "--all"]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert!(result.is_called::<ListCommand>());
}

#[test]
fn option_short_forms_are_generated() {
    let graph = GraphBuilder::new::<RootCommand>().build().unwrap();
    let root_symbols = graph.symbols(graph.root());
    assert_eq!(root_symbols[0].name, "--verbose");
    assert_eq!(root_symbols[0].aliases, vec!["-v"]);

    let list = graph.node_for::<ListCommand>().unwrap();
    assert_eq!(graph.symbols(list)[0].aliases, vec!["-a"]);
}

#[test]
fn executable_name_renames_root() {
    let graph = GraphBuilder::new::<RootCommand>()
        .settings(Settings::default().with_executable_name("tool"))
        .build()
        .unwrap();
    assert_eq!(graph.clap_command().get_name(), "tool");
    assert_eq!(graph.info(graph.root()).unwrap().name, "root");
}

// ============================================================================
// Test: cycles
// ============================================================================

#[derive(Default)]
struct CycleA;

impl CommandDefinition for CycleA {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<CycleB>()).construct_default();
    }
}

#[derive(Default)]
struct CycleB;

impl CommandDefinition for CycleB {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<CycleA>()).construct_default();
    }
}

#[test]
fn cycle_is_detected_from_either_end() {
    match GraphBuilder::new::<CycleA>().build() {
        Err(AuthoringError::Cycle { path }) => assert_eq!(path, vec!["CycleA", "CycleB", "CycleA"]),
        other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
    }
    match GraphBuilder::new::<CycleB>().build() {
        Err(AuthoringError::Cycle { path }) => assert_eq!(path, vec!["CycleB", "CycleA", "CycleB"]),
        other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
    }
}

// ============================================================================
// Test: parent conflicts and duplicate commands
// ============================================================================

#[derive(Default)]
struct Host;

impl CommandDefinition for Host {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<Lister>().child::<Wanted>())
            .construct_default();
    }
}

#[derive(Default)]
struct Lister;

impl CommandDefinition for Lister {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<Orphan>()).construct_default();
    }
}

#[derive(Default)]
struct Wanted;

impl CommandDefinition for Wanted {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.construct_default();
    }
}

#[derive(Default)]
struct Orphan;

impl CommandDefinition for Orphan {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().parent::<Wanted>()).construct_default();
    }
}

#[test]
fn declared_parent_must_match_listing_parent() {
    let err = GraphBuilder::new::<Host>().build().err().unwrap();
    match err {
        AuthoringError::ConflictingParent {
            child,
            declared,
            listed_by,
        } => {
            assert_eq!(child, "Orphan");
            assert_eq!(declared, "Wanted");
            assert_eq!(listed_by, "Lister");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[derive(Default)]
struct Twins;

impl CommandDefinition for Twins {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<TwinOne>().child::<TwinTwo>())
            .construct_default();
    }
}

#[derive(Default)]
struct TwinOne;

impl CommandDefinition for TwinOne {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().name("twin")).construct_default();
    }
}

#[derive(Default)]
struct TwinTwo;

impl CommandDefinition for TwinTwo {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().alias("twin")).construct_default();
    }
}

#[test]
fn sibling_names_and_aliases_must_be_unique() {
    let err = GraphBuilder::new::<Twins>().build().err().unwrap();
    assert!(
        matches!(&err, AuthoringError::DuplicateCommand { name, .. } if name == "twin"),
        "unexpected error: {err}"
    );
}

// ============================================================================
// Test: option visibility
// ============================================================================

#[derive(Default)]
struct Shadowing {
    verbose: bool,
}

impl CommandDefinition for Shadowing {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<ShadowChild>())
            .option(field!(Self, verbose), OptionSpec::new().recursive(true))
            .construct_default();
    }
}

#[derive(Default)]
struct ShadowChild {
    verbose: bool,
}

impl CommandDefinition for ShadowChild {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(field!(Self, verbose), OptionSpec::new())
            .construct_default();
    }
}

#[test]
fn recursive_option_collides_with_descendant_option() {
    let err = GraphBuilder::new::<Shadowing>().build().err().unwrap();
    match err {
        AuthoringError::OptionCollision { alias, owner, .. } => {
            assert_eq!(alias, "--verbose");
            assert_eq!(owner, "Shadowing");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[derive(Default)]
struct HelpShadow {
    help: bool,
}

impl CommandDefinition for HelpShadow {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(field!(Self, help), OptionSpec::new()).construct_default();
    }
}

#[test]
fn built_in_help_is_reserved_unless_disabled() {
    assert!(matches!(
        GraphBuilder::new::<HelpShadow>().build(),
        Err(AuthoringError::OptionCollision { .. })
    ));
    assert!(GraphBuilder::new::<HelpShadow>()
        .settings(Settings::default().with_help(false))
        .build()
        .is_ok());
}

#[derive(Default)]
struct Cousins;

impl CommandDefinition for Cousins {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<CousinA>().child::<CousinB>())
            .construct_default();
    }
}

#[derive(Default)]
struct CousinA {
    force: bool,
}

impl CommandDefinition for CousinA {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(field!(Self, force), OptionSpec::new()).construct_default();
    }
}

#[derive(Default)]
struct CousinB {
    force: bool,
}

impl CommandDefinition for CousinB {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(field!(Self, force), OptionSpec::new()).construct_default();
    }
}

#[test]
fn siblings_may_reuse_plain_option_names() {
    let graph = GraphBuilder::new::<Cousins>().build().unwrap();
    assert!(graph.parse(["cousin-a", "--force"]).errors().is_empty());
    assert!(graph.parse(["cousin-b", "-f"]).errors().is_empty());
}

#[derive(Default)]
struct Siblings;

impl CommandDefinition for Siblings {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<Deep>().child::<Flat>())
            .construct_default();
    }
}

#[derive(Default)]
struct Deep {
    depth: Option<u32>,
}

impl CommandDefinition for Deep {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(field!(Self, depth), OptionSpec::new().recursive(true))
            .construct_default();
    }
}

#[derive(Default)]
struct Flat {
    depth: Option<u32>,
}

impl CommandDefinition for Flat {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(field!(Self, depth), OptionSpec::new()).construct_default();
    }
}

#[test]
fn recursive_option_may_not_share_a_name_with_a_sibling() {
    let err = GraphBuilder::new::<Siblings>().build().err().unwrap();
    assert!(
        matches!(&err, AuthoringError::OptionCollision { alias, .. } if alias == "--depth"),
        "unexpected error: {err}"
    );
}

// ============================================================================
// Test: interfaces
// ============================================================================

#[derive(Default)]
struct Logged {
    quiet: bool,
}

fn quiet_interface(name: &'static str) -> InterfaceShape<Logged> {
    InterfaceShape::new(name).option(field!(Logged, quiet), OptionSpec::new())
}

impl CommandDefinition for Logged {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.implements(quiet_interface("Quiet"))
            .implements(quiet_interface("Silent"))
            .construct_default();
    }
}

#[test]
fn identical_interface_members_are_merged() {
    let graph = GraphBuilder::new::<Logged>().build().unwrap();
    let symbols = graph.symbols(graph.root());
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].name, "--quiet");
}

#[derive(Default)]
struct Clashing {
    quiet: bool,
}

impl CommandDefinition for Clashing {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(field!(Self, quiet), OptionSpec::new())
            .implements(
                InterfaceShape::new("Quiet")
                    .option(field!(Self, quiet), OptionSpec::new().description("other")),
            )
            .construct_default();
    }
}

#[test]
fn own_member_and_interface_member_are_ambiguous() {
    let err = GraphBuilder::new::<Clashing>().build().err().unwrap();
    match err {
        AuthoringError::AmbiguousInterfaceSpec {
            member,
            first,
            second,
            ..
        } => {
            assert_eq!(member, "quiet");
            assert_eq!(first, "Clashing");
            assert_eq!(second, "Quiet");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[derive(Default)]
struct Noisy {
    loud: bool,
}

impl CommandDefinition for Noisy {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.implements(
            InterfaceShape::new("Chatty")
                .option(field!(Self, loud), OptionSpec::new().description("talk more")),
        )
        .implements(
            InterfaceShape::new("Shouty")
                .option(field!(Self, loud), OptionSpec::new().description("use capitals")),
        )
        .construct_default();
    }
}

#[test]
fn interfaces_disagreeing_on_a_member_are_ambiguous() {
    let err = GraphBuilder::new::<Noisy>().build().err().unwrap();
    match err {
        AuthoringError::AmbiguousInterfaceSpec {
            member,
            first,
            second,
            ..
        } => {
            assert_eq!(member, "loud");
            assert_eq!(first, "Chatty");
            assert_eq!(second, "Shouty");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Test: parent references
// ============================================================================

#[derive(Default)]
struct Parent {
    name: Option<String>,
}

impl CommandDefinition for Parent {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<Kid>().child::<Stranger>())
            .option(field!(Self, name), OptionSpec::new().recursive(true))
            .construct_default();
    }
}

#[derive(Default)]
struct Kid {
    parent: Option<Arc<Parent>>,
}

impl CommandDefinition for Kid {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.parent_ref(field!(Self, parent)).construct_default();
    }
}

#[derive(Default)]
struct Stranger {
    kid: Option<Arc<Kid>>,
}

impl CommandDefinition for Stranger {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.parent_ref(field!(Self, kid)).construct_default();
    }
}

#[test]
fn parent_reference_receives_bound_ancestor() {
    let graph = GraphBuilder::new::<Parent>().build().unwrap();
    let result = graph.parse(["kid", "--name", "ada"]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());

    let kid = graph.bind::<Kid>(&result).unwrap();
    let parent = graph.bind::<Parent>(&result).unwrap();
    let wired = kid.parent.as_ref().unwrap();
    assert!(Arc::ptr_eq(wired, &parent));
    assert_eq!(wired.name.as_deref(), Some("ada"));
}

#[test]
fn parent_reference_to_non_ancestor_is_ignored() {
    let graph = GraphBuilder::new::<Parent>().build().unwrap();
    let result = graph.parse(["stranger"]);
    let stranger = graph.bind::<Stranger>(&result).unwrap();
    assert!(stranger.kid.is_none());
}

// ============================================================================
// Test: structural errors in definitions
// ============================================================================

struct Unbuildable;

impl CommandDefinition for Unbuildable {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().description("no constructor"));
    }
}

#[test]
fn missing_constructor_fails_the_build() {
    assert!(matches!(
        GraphBuilder::new::<Unbuildable>().build(),
        Err(AuthoringError::MissingConstructor { .. })
    ));
}

#[derive(Default)]
struct BadPattern {
    name: Option<String>,
}

impl CommandDefinition for BadPattern {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(field!(Self, name), OptionSpec::new().pattern("(unclosed"))
            .construct_default();
    }
}

#[test]
fn invalid_pattern_fails_the_build() {
    assert!(matches!(
        GraphBuilder::new::<BadPattern>().build(),
        Err(AuthoringError::InvalidPattern { .. })
    ));
}

#[derive(Default)]
struct DoubleAlias {
    output: Option<String>,
}

impl CommandDefinition for DoubleAlias {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.option(
            field!(Self, output),
            OptionSpec::new().aliases(["out", "--out"]),
        )
        .construct_default();
    }
}

#[test]
fn duplicate_alias_on_one_option_fails_the_build() {
    assert!(matches!(
        GraphBuilder::new::<DoubleAlias>().build(),
        Err(AuthoringError::DuplicateAlias { .. })
    ));
}

#[derive(Default)]
struct OptionalFirst {
    first: Option<String>,
    second: String,
}

impl CommandDefinition for OptionalFirst {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.argument(field!(Self, first), ArgumentSpec::new())
            .argument(field!(Self, second), ArgumentSpec::new())
            .construct_default();
    }
}

#[test]
fn required_argument_after_optional_one_fails_the_build() {
    let err = GraphBuilder::new::<OptionalFirst>().build().err().unwrap();
    assert!(
        matches!(&err, AuthoringError::ArgumentOrder { argument, .. } if argument == "second"),
        "unexpected error: {err}"
    );
}

#[derive(Default)]
struct ManyFirst {
    sources: Vec<String>,
    target: Option<String>,
}

impl CommandDefinition for ManyFirst {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.argument(field!(Self, sources), ArgumentSpec::new().required(false))
            .argument(field!(Self, target), ArgumentSpec::new())
            .construct_default();
    }
}

#[test]
fn sequence_argument_must_come_last() {
    let err = GraphBuilder::new::<ManyFirst>().build().err().unwrap();
    assert!(
        matches!(&err, AuthoringError::ArgumentOrder { argument, .. } if argument == "sources"),
        "unexpected error: {err}"
    );
}

// ============================================================================
// Test: option prefixes per command
// ============================================================================

#[derive(Default)]
struct Ops;

impl CommandDefinition for Ops {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().child::<Deploy>().child::<CopyPath>())
            .construct_default();
    }
}

#[derive(Default)]
struct Deploy {
    target: Option<String>,
}

impl CommandDefinition for Deploy {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().name("deploy").prefix(NamePrefix::ForwardSlash))
            .option(field!(Self, target), OptionSpec::new())
            .construct_default();
    }
}

#[derive(Default)]
struct CopyPath {
    path: String,
}

impl CommandDefinition for CopyPath {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().name("copy"))
            .argument(field!(Self, path), ArgumentSpec::new())
            .construct_default();
    }
}

#[test]
fn sibling_option_literal_is_left_alone_as_argument_value() {
    let graph = GraphBuilder::new::<Ops>().build().unwrap();

    let result = graph.parse(["copy", "/target"]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert_eq!(graph.bind::<CopyPath>(&result).unwrap().path, "/target");

    let result = graph.parse(["deploy", "/target", "prod"]);
    assert!(result.errors().is_empty(), "{:?}", result.errors());
    assert_eq!(
        graph.bind::<Deploy>(&result).unwrap().target.as_deref(),
        Some("prod")
    );
}
