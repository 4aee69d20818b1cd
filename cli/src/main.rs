use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use cmdpipe_core::{
    Arity, CommandDecl, CommandModel, ModelOptions, NodeId, validate_declaration,
};
use cmdpipe_runtime::{
    CommandContext, CompletionRegistrar, ExitCode, InvocationRunner, PipelineError,
    ProcessEnvironment, REGISTRATION_TIMEOUT, RunnerSettings, exit_code,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CMDPIPE_LOG";

#[derive(Debug, Parser)]
#[command(name = "cmdpipe")]
#[command(about = "Run and inspect declared command trees")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run arguments through a declared command tree and print the bound values.
    Run(RunArgs),
    /// Check a declaration for structural problems.
    Validate(ValidateArgs),
    /// Print the command tree after name transforms.
    Tree(TreeArgs),
    /// Register the tree with an external shell-completion tool.
    RegisterCompletion(RegisterCompletionArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Command tree declaration (YAML or JSON).
    #[arg(long)]
    app: PathBuf,
    /// Runner settings (YAML).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Named settings consulted by the binder (flat YAML map).
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Arguments for the declared command, usually after `--`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Command tree declaration (YAML or JSON).
    #[arg(long)]
    app: PathBuf,
}

#[derive(Debug, Args)]
struct TreeArgs {
    /// Command tree declaration (YAML or JSON).
    #[arg(long)]
    app: PathBuf,
    /// Runner settings (YAML); only the naming options are used.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RegisterCompletionArgs {
    /// Completion tool executable.
    #[arg(long)]
    tool: PathBuf,
    /// Path of the application being registered.
    #[arg(long)]
    command_path: PathBuf,
    /// Name the tool calls back with the `[suggest]` directive.
    #[arg(long)]
    suggestion_command: String,
    /// Seconds to wait for the tool.
    #[arg(long, default_value_t = REGISTRATION_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run(args) => run_app(args),
        Command::Validate(args) => run_validate(args).map(|()| exit_code::SUCCESS),
        Command::Tree(args) => run_tree(args).map(|()| exit_code::SUCCESS),
        Command::RegisterCompletion(args) => run_register_completion(args),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn run_app(args: RunArgs) -> Result<ExitCode, String> {
    let declaration = load_declaration(&args.app)?;
    let settings = load_settings(args.config.as_deref())?;
    let environment = match &args.settings {
        Some(path) => ProcessEnvironment::load_settings(path).map_err(|err| {
            format!("Failed to load settings '{}': {err}", path.display())
        })?,
        None => ProcessEnvironment::new(),
    };

    let runner = InvocationRunner::builder(declaration)
        .settings(settings)
        .environment(Arc::new(environment))
        .fallback_handler(echo)
        .build()
        .map_err(|err| err.to_string())?;

    let cancellation = CancellationToken::new();
    watch_ctrl_c(cancellation.clone());
    debug!(args = ?args.args, "Running declared command");
    Ok(runner.run_with_cancellation(args.args, cancellation))
}

/// Prints the resolved command path and bound values as JSON.
fn echo(ctx: &mut CommandContext) -> cmdpipe_runtime::Result<ExitCode> {
    let path = ctx
        .node()
        .map(|node| node.path_string())
        .unwrap_or_default();
    let report = serde_json::json!({
        "command": path,
        "values": ctx.values().to_json(),
    });
    let text = serde_json::to_string_pretty(&report).map_err(PipelineError::command_failed)?;
    ctx.write(&format!("{text}\n"));
    Ok(exit_code::SUCCESS)
}

/// Cancels `token` on the first Ctrl-C.
fn watch_ctrl_c(token: CancellationToken) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(error = %err, "Failed to start signal listener");
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Ctrl-C received, cancelling");
                token.cancel();
            }
        });
    });
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let declaration = load_declaration(&args.app)?;
    let errors = validate_declaration(&declaration);
    if errors.is_empty() {
        println!(
            "Declaration '{}' is valid: {} command(s).",
            declaration.name,
            count_commands(&declaration)
        );
        return Ok(());
    }

    for err in &errors {
        println!("  - {err}");
    }
    Err(format!("{} problem(s) found in '{}'", errors.len(), args.app.display()))
}

fn count_commands(decl: &CommandDecl) -> usize {
    1 + decl.subcommands.iter().map(count_commands).sum::<usize>()
}

fn run_tree(args: TreeArgs) -> Result<(), String> {
    let declaration = load_declaration(&args.app)?;
    let settings = load_settings(args.config.as_deref())?;
    let options = ModelOptions {
        transform: settings.name_case.into(),
        transform_overrides: settings.case_overrides,
    };
    let model = CommandModel::build(&declaration, &options).map_err(|err| err.to_string())?;

    let mut out = String::new();
    write_node(&model, model.root().id, 0, &mut out);
    print!("{out}");
    Ok(())
}

fn write_node(model: &CommandModel, id: NodeId, depth: usize, out: &mut String) {
    let node = model.node(id);
    let indent = "  ".repeat(depth);

    let mut line = format!("{indent}{}", node.name);
    if !node.aliases.is_empty() {
        line.push_str(&format!(" ({})", node.aliases.join(", ")));
    }
    if node.default_action && !node.children().is_empty() {
        line.push_str(" [default action]");
    }
    out.push_str(&line);
    out.push('\n');

    for arg in node.arguments() {
        let mut line = format!("{indent}    {}", arg.usage_name());
        if arg.arity == Arity::List {
            line.push_str("...");
        }
        if arg.inherited {
            line.push_str(" (inherited)");
        }
        out.push_str(&line);
        out.push('\n');
    }

    for child in node.children() {
        write_node(model, *child, depth + 1, out);
    }
}

fn run_register_completion(args: RegisterCompletionArgs) -> Result<ExitCode, String> {
    let registrar =
        CompletionRegistrar::new(&args.tool).with_timeout(Duration::from_secs(args.timeout_secs));
    if registrar.register(&args.command_path, &args.suggestion_command) {
        println!(
            "Registered '{}' with '{}'.",
            args.suggestion_command,
            args.tool.display()
        );
        Ok(exit_code::SUCCESS)
    } else {
        Err(format!(
            "Completion registration with '{}' failed",
            args.tool.display()
        ))
    }
}

fn load_declaration(path: &Path) -> Result<CommandDecl, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&raw)
            .map_err(|err| format!("Invalid declaration '{}': {err}", path.display()))
    } else {
        serde_yaml::from_str(&raw)
            .map_err(|err| format!("Invalid declaration '{}': {err}", path.display()))
    }
}

fn load_settings(path: Option<&Path>) -> Result<RunnerSettings, String> {
    match path {
        Some(path) => RunnerSettings::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display())),
        None => Ok(RunnerSettings::default()),
    }
}
