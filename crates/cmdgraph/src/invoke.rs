//! Running the called command.
//!
//! [`RuntimeGraph::run`] parses, handles built-in directives and parse
//! errors, binds the called command and calls its handler. Handlers may be
//! synchronous or return a future; the blocking entry points drive futures
//! on a current-thread Tokio runtime, the `_async` ones await them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ambient::{self, ResolverScope};
use crate::binding::{BindOptions, BoundInstance};
use crate::error::{BindingError, CliError};
use crate::graph::{NodeId, NodeKind, RuntimeGraph};
use crate::model::Instance;
use crate::parse::ParseResult;
use crate::services::{FunctionResolver, ServiceResolver};
use crate::shape::Arguments;

/// Conversion of handler return values into an exit code.
///
/// `()` and `Ok(())` mean 0; errors are reported by the run pipeline.
pub trait IntoExitCode {
    fn into_exit_code(self) -> anyhow::Result<i32>;
}

impl IntoExitCode for () {
    fn into_exit_code(self) -> anyhow::Result<i32> {
        Ok(0)
    }
}

impl IntoExitCode for i32 {
    fn into_exit_code(self) -> anyhow::Result<i32> {
        Ok(self)
    }
}

impl<E: Into<anyhow::Error>> IntoExitCode for Result<(), E> {
    fn into_exit_code(self) -> anyhow::Result<i32> {
        self.map(|_| 0).map_err(Into::into)
    }
}

impl<E: Into<anyhow::Error>> IntoExitCode for Result<i32, E> {
    fn into_exit_code(self) -> anyhow::Result<i32> {
        self.map_err(Into::into)
    }
}

pub(crate) type SyncHandler = Arc<
    dyn Fn(&(dyn Any + Send + Sync), &Arguments, &InvocationContext) -> anyhow::Result<i32>
        + Send
        + Sync,
>;
pub(crate) type AsyncHandler = Arc<
    dyn Fn(Instance, Arguments, InvocationContext) -> BoxFuture<'static, anyhow::Result<i32>>
        + Send
        + Sync,
>;

#[derive(Clone)]
pub(crate) enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

/// Per-call configuration of a run.
#[derive(Clone, Default)]
pub struct RunConfig {
    services: Option<Arc<dyn ServiceResolver>>,
    functions: Option<Arc<dyn FunctionResolver>>,
    cancellation: Option<CancellationToken>,
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("services", &self.services.is_some())
            .field("functions", &self.functions.is_some())
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service resolver for this run. It is also made current for binds
    /// nested inside the handler.
    pub fn services<R: ServiceResolver + 'static>(mut self, resolver: R) -> Self {
        self.services = Some(Arc::new(resolver));
        self
    }

    pub fn shared_services(mut self, resolver: Arc<dyn ServiceResolver>) -> Self {
        self.services = Some(resolver);
        self
    }

    pub fn functions<R: FunctionResolver + 'static>(mut self, resolver: R) -> Self {
        self.functions = Some(Arc::new(resolver));
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn bind_options(&self) -> BindOptions {
        BindOptions {
            services: self.services.clone(),
            functions: self.functions.clone(),
            return_empty: false,
            cancellation: self.cancellation.clone().unwrap_or_default(),
            invocation: None,
        }
    }
}

/// Everything a handler can reach about the current invocation.
#[derive(Clone)]
pub struct InvocationContext {
    graph: RuntimeGraph,
    result: Arc<ParseResult>,
    node: NodeId,
    opts: BindOptions,
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("node", &self.node)
            .field("path", &self.command_path())
            .finish_non_exhaustive()
    }
}

fn render_help_at(cmd: &mut clap::Command, path: &[String]) -> String {
    if let Some((name, rest)) = path.split_first() {
        if let Some(sub) = cmd.find_subcommand_mut(name) {
            return render_help_at(sub, rest);
        }
    }
    cmd.render_help().to_string()
}

impl InvocationContext {
    pub(crate) fn new(graph: RuntimeGraph, result: Arc<ParseResult>, opts: BindOptions) -> Self {
        Self {
            graph,
            node: result.called(),
            result,
            opts,
        }
    }

    pub fn graph(&self) -> &RuntimeGraph {
        &self.graph
    }

    pub fn parse_result(&self) -> &ParseResult {
        &self.result
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn command_path(&self) -> &[String] {
        self.result.called_path()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.opts.cancellation.clone()
    }

    pub fn is_empty_command(&self) -> bool {
        self.result.is_empty_command()
    }

    /// Binds any command type on the called chain, sharing this
    /// invocation's cache and resolvers.
    pub fn bind<T: Any + Send + Sync>(&self) -> Result<Arc<T>, BindingError> {
        self.graph.bind_with::<T>(&self.result, &self.opts)
    }

    pub fn bind_all(&self) -> Result<Vec<BoundInstance>, BindingError> {
        self.graph.bind_all(&self.result, &self.opts)
    }

    /// Help text of the called command.
    pub fn help_text(&self) -> String {
        let mut cmd = self.graph.clap_command().clone();
        cmd.build();
        render_help_at(&mut cmd, self.command_path())
    }

    pub fn show_help(&self) {
        println!("{}", self.help_text());
    }

    /// `name = value` lines for every member of the called command.
    pub fn values_text(&self) -> Result<String, BindingError> {
        let target = match self.graph.node(self.node).kind {
            NodeKind::Method { .. } => self.graph.parent(self.node).unwrap_or(self.node),
            _ => self.node,
        };
        let instance = self.graph.bind_node(&self.result, target, &self.opts)?;
        let lines: Vec<String> = self
            .graph
            .node(target)
            .value_accessors
            .iter()
            .filter_map(|accessor| {
                (accessor.read)(instance.as_ref()).map(|value| format!("{} = {}", accessor.name, value))
            })
            .collect();
        Ok(lines.join("\n"))
    }

    pub fn show_values(&self) -> Result<(), BindingError> {
        println!("{}", self.values_text()?);
        Ok(())
    }
}

impl RuntimeGraph {
    /// Parses `args`, runs the called command and returns its exit code.
    ///
    /// Errors are printed to stderr and reported as exit code 1.
    pub fn run<I, S>(&self, args: I) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_with(args, &RunConfig::default())
            .unwrap_or_else(|err| {
                eprintln!("{err}");
                1
            })
    }

    pub fn run_with<I, S>(&self, args: I, config: &RunConfig) -> Result<i32, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invoke(self.parse(args), config)
    }

    /// Runs an already parsed command line.
    pub fn invoke(&self, result: ParseResult, config: &RunConfig) -> Result<i32, CliError> {
        if let Some(code) = self.preflight(&result) {
            return Ok(code);
        }

        let _scope = config.services.clone().map(ResolverScope::enter);
        let ctx = self.context(result, config);
        let outcome = self.execute(&ctx);
        self.finish(outcome)
    }

    pub async fn run_async<I, S>(&self, args: I) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_async_with(args, &RunConfig::default())
            .await
            .unwrap_or_else(|err| {
                eprintln!("{err}");
                1
            })
    }

    pub async fn run_async_with<I, S>(&self, args: I, config: &RunConfig) -> Result<i32, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let result = self.parse(args);
        self.invoke_async(result, config).await
    }

    pub async fn invoke_async(&self, result: ParseResult, config: &RunConfig) -> Result<i32, CliError> {
        if let Some(code) = self.preflight(&result) {
            return Ok(code);
        }

        let ctx = self.context(result, config);
        let outcome = match config.services.clone() {
            Some(resolver) => ambient::scope_async(resolver, self.execute_async(ctx)).await,
            None => self.execute_async(ctx).await,
        };
        self.finish(outcome)
    }

    fn context(&self, result: ParseResult, config: &RunConfig) -> InvocationContext {
        let result = Arc::new(result);
        let opts = BindOptions {
            invocation: Some(result.clone()),
            ..config.bind_options()
        };
        InvocationContext::new(self.clone(), result, opts)
    }

    /// Handles everything that ends a run before the handler: help and
    /// version output, built-in directives and parse errors.
    fn preflight(&self, result: &ParseResult) -> Option<i32> {
        let settings = self.settings();

        if let Some(text) = result.early_exit() {
            print!("{text}");
            return Some(0);
        }

        if settings.enable_env_directive {
            for assignment in result.directive_values("env").into_iter().flatten() {
                if let Some((name, value)) = assignment.split_once('=') {
                    debug!(name = name.trim(), "setting environment variable from directive");
                    std::env::set_var(name.trim(), value);
                }
            }
        }

        if settings.enable_suggest_directive && result.has_directive("suggest") {
            for suggestion in result.suggestions() {
                println!("{suggestion}");
            }
            return Some(0);
        }

        if settings.enable_diagram_directive && result.has_directive("diagram") {
            println!("{}", result.diagram());
            return Some(if result.has_errors() { 1 } else { 0 });
        }

        if result.has_errors() {
            for err in result.errors() {
                eprintln!("{err}");
            }
            return Some(1);
        }

        None
    }

    /// Binds the handler's target and parameters.
    fn prepare(&self, ctx: &InvocationContext) -> Result<Option<(Handler, Instance, Arguments)>, CliError> {
        let node = self.node(ctx.node);
        let Some(handler) = node.handler().cloned() else {
            return Ok(None);
        };
        let target = self.bind_node(&ctx.result, ctx.node, &ctx.opts)?;
        let args = self.resolve_params(&ctx.result, ctx.node, node.params(), &ctx.opts)?;
        debug!(command = %node.display_name(), path = ?ctx.command_path(), "invoking command");
        Ok(Some((handler, target, args)))
    }

    fn execute(&self, ctx: &InvocationContext) -> Result<i32, CliError> {
        let Some((handler, target, args)) = self.prepare(ctx)? else {
            ctx.show_help();
            return Ok(0);
        };

        match handler {
            Handler::Sync(f) => f(target.as_ref(), &args, ctx).map_err(CliError::Handler),
            Handler::Async(f) => {
                if tokio::runtime::Handle::try_current().is_ok() {
                    return Err(CliError::Handler(anyhow::anyhow!(
                        "async command '{}' must be run with run_async inside a Tokio runtime",
                        ctx.command_path().join(" ")
                    )));
                }
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| CliError::Handler(e.into()))?;
                runtime
                    .block_on(f(target, args, ctx.clone()))
                    .map_err(CliError::Handler)
            }
        }
    }

    async fn execute_async(&self, ctx: InvocationContext) -> Result<i32, CliError> {
        let Some((handler, target, args)) = self.prepare(&ctx)? else {
            ctx.show_help();
            return Ok(0);
        };

        match handler {
            Handler::Sync(f) => f(target.as_ref(), &args, &ctx).map_err(CliError::Handler),
            Handler::Async(f) => f(target, args, ctx.clone()).await.map_err(CliError::Handler),
        }
    }

    fn finish(&self, outcome: Result<i32, CliError>) -> Result<i32, CliError> {
        match outcome {
            Ok(code) => {
                debug!(exit_code = code, "command finished");
                Ok(code)
            }
            Err(err) if self.settings().enable_default_error_handler => {
                eprintln!("{err}");
                Ok(1)
            }
            Err(err) => Err(err),
        }
    }
}
