//! `search-tool`: a small file-search CLI built on cmdgraph.
//!
//! ```text
//! search-tool find <pattern> [--path <dir>] [--max-depth <n>]
//! search-tool index build [--delay-ms <ms>]
//! search-tool index show
//! search-tool stats [--by-extension]
//! search-tool [diagram] find main --path src
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cmdgraph::{
    field, ArgumentSpec, CommandDefinition, CommandSpec, GraphBuilder, OptionSpec, Parameters,
    RuntimeGraph, ServiceMap, Settings, TypeShape,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const SETTINGS: &str = r#"
version: "0.4.0"
executable_name: search-tool
enable_diagram_directive: true
enable_env_directive: true
"#;

/// In-memory file listing the commands search.
struct Catalog {
    files: Vec<String>,
}

impl Catalog {
    fn sample() -> Self {
        let files = [
            "Cargo.toml",
            "README.md",
            "src/main.rs",
            "src/lib.rs",
            "src/graph/mod.rs",
            "src/graph/builder.rs",
            "tests/graph.rs",
            "docs/guide/naming.md",
        ];
        Self {
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn under<'a>(&'a self, root: &'a str, max_depth: u32) -> impl Iterator<Item = &'a str> {
        let prefix = root.trim_end_matches('/');
        self.files.iter().map(String::as_str).filter(move |file| {
            let relative = match prefix {
                "" | "." => Some(*file),
                _ => file
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('/')),
            };
            relative.is_some_and(|rel| rel.matches('/').count() < max_depth as usize)
        })
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Default)]
struct SearchToolCommand {
    verbose: bool,
}

impl CommandDefinition for SearchToolCommand {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(
            CommandSpec::new()
                .description("Search an indexed file tree")
                .child::<FindCommand>()
                .child::<IndexCommand>(),
        )
        .option(
            field!(Self, verbose),
            OptionSpec::new()
                .recursive(true)
                .description("Print extra detail"),
        )
        .construct_default()
        .method(
            "stats",
            CommandSpec::new()
                .description("Summarize the catalog")
                .order(10),
            Parameters::new()
                .option_or(
                    "by_extension",
                    OptionSpec::new().description("Group counts by extension"),
                    false,
                )
                .service::<Catalog>("catalog"),
            |tool, args, _ctx| -> anyhow::Result<()> {
                let catalog = args.service::<Catalog>("catalog")?;
                if !args.value::<bool>("by_extension")? {
                    println!("{} files", catalog.files.len());
                    return Ok(());
                }
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for file in &catalog.files {
                    let ext = file.rsplit_once('.').map_or("", |(_, ext)| ext);
                    *counts.entry(ext).or_default() += 1;
                }
                for (ext, count) in counts {
                    println!("{ext:>6} {count}");
                }
                if tool.verbose {
                    println!("({} files total)", catalog.files.len());
                }
                Ok(())
            },
        );
    }
}

struct FindCommand {
    catalog: Arc<Catalog>,
    pattern: String,
    path: String,
    max_depth: u32,
}

impl CommandDefinition for FindCommand {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().description("Find files by name").alias("f").order(1))
            .argument(
                field!(Self, pattern),
                ArgumentSpec::new()
                    .description("Substring to look for")
                    .pattern("^[^/]+$")
                    .pattern_message("pattern '{value}' may not contain '/'"),
            )
            .option(
                field!(Self, path).default(".".to_string()),
                OptionSpec::new().description("Directory to search"),
            )
            .option(field!(Self, max_depth).default(8), OptionSpec::new())
            .construct_with(Parameters::new().service::<Catalog>("catalog"), |args| {
                Ok(FindCommand {
                    catalog: args.service("catalog")?,
                    pattern: String::new(),
                    path: String::new(),
                    max_depth: 0,
                })
            })
            .run(|find, ctx| -> anyhow::Result<i32> {
                let tool = ctx.bind::<SearchToolCommand>()?;
                let hits: Vec<&str> = find
                    .catalog
                    .under(&find.path, find.max_depth)
                    .filter(|file| file.contains(find.pattern.as_str()))
                    .collect();
                debug!(pattern = %find.pattern, hits = hits.len(), "search finished");
                for hit in &hits {
                    println!("{hit}");
                }
                if tool.verbose {
                    println!("{} match(es)", hits.len());
                }
                Ok(if hits.is_empty() { 1 } else { 0 })
            });
    }
}

/// Grouping command; running it alone prints its help.
struct IndexCommand {
    catalog: Arc<Catalog>,
}

impl CommandDefinition for IndexCommand {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(
            CommandSpec::new()
                .description("Manage the search index")
                .order(2)
                .child::<IndexBuildCommand>(),
        )
        .construct_with(Parameters::new().service::<Catalog>("catalog"), |args| {
            Ok(IndexCommand {
                catalog: args.service("catalog")?,
            })
        })
        .method(
            "show",
            CommandSpec::new().description("List indexed files"),
            Parameters::new(),
            |index, _args, _ctx| {
                for file in &index.catalog.files {
                    println!("{file}");
                }
            },
        );
    }
}

#[derive(Default)]
struct IndexBuildCommand {
    delay_ms: u64,
    index: Option<Arc<IndexCommand>>,
}

impl CommandDefinition for IndexBuildCommand {
    fn define(cmd: &mut TypeShape<Self>) {
        cmd.spec(CommandSpec::new().name("build").description("Rebuild the index"))
            .option(
                field!(Self, delay_ms).default(50),
                OptionSpec::new().description("Simulated work per file"),
            )
            .parent_ref(field!(Self, index))
            .construct_default()
            .run_async(|build, ctx| async move {
                let index = build
                    .index
                    .clone()
                    .context("index command was not bound")?;
                let token = ctx.cancellation();
                for file in &index.catalog.files {
                    tokio::select! {
                        _ = token.cancelled() => anyhow::bail!("index build cancelled"),
                        _ = tokio::time::sleep(Duration::from_millis(build.delay_ms)) => {}
                    }
                    debug!(file = %file, "indexed");
                }
                info!(files = index.catalog.files.len(), "index rebuilt");
                println!("indexed {} files", index.catalog.files.len());
                Ok::<_, anyhow::Error>(())
            });
    }
}

// ============================================================================
// Entry point
// ============================================================================

fn build_graph() -> anyhow::Result<RuntimeGraph> {
    let settings = Settings::from_yaml_str(SETTINGS).context("invalid built-in settings")?;
    let graph = GraphBuilder::new::<SearchToolCommand>()
        .settings(settings)
        .services(ServiceMap::new().with(Catalog::sample()))
        .build()?;
    Ok(graph)
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let code = match build_graph() {
        Ok(graph) => graph.run(std::env::args().skip(1)),
        Err(err) => {
            eprintln!("search-tool: {err:#}");
            2
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_settings_parse() {
        let settings = Settings::from_yaml_str(SETTINGS).unwrap();
        assert_eq!(settings.version.as_deref(), Some("0.4.0"));
        assert_eq!(settings.executable_name.as_deref(), Some("search-tool"));
        assert!(settings.enable_diagram_directive);
    }

    #[test]
    fn test_graph_builds_and_finds() {
        let graph = build_graph().unwrap();
        let result = graph.parse(["find", "main", "--path", "src"]);
        assert!(result.errors().is_empty(), "{:?}", result.errors());

        let find = graph.bind::<FindCommand>(&result).unwrap();
        let hits: Vec<&str> = find.catalog.under(&find.path, find.max_depth).collect();
        assert!(hits.contains(&"src/main.rs"));
        assert!(hits.contains(&"src/graph/mod.rs"));
    }

    #[test]
    fn test_max_depth_limits_results() {
        let catalog = Catalog::sample();
        let shallow: Vec<&str> = catalog.under("src", 1).collect();
        assert_eq!(shallow, vec!["src/main.rs", "src/lib.rs"]);
    }
}
