use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, FromArgMatches, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

mod cmd;
mod config;
mod error;
mod github;
mod utils;

use cmd::args::{InvocationArgs, Reserved, parse_pair};
use cmd::context::RunContext;
use cmd::format::{Format, Sink};
use cmd::input::Input;
use cmd::registry::Registry;
use config::Config;
use github::{GithubClient, RepoInfo};

const ERROR_HINT: &str = "(run with --debug for traceback info)";

/// ghizmo - Extensible GitHub command-line tricks
///
/// Every command reads optional newline-delimited JSON from stdin and writes
/// one JSON (or YAML) record per result to stdout:
///   ghizmo tags
///   ghizmo branches | jq -c .name | ghizmo show-branches
///   ghizmo create-release -a tag_name=v1.2 -n
///
/// The repository comes from --repo or the current clone's `origin` remote.
///
/// Global flags / env:
///   -a KEY=VALUE      Command argument (repeatable); GHIZMO_KEY=VALUE also works
///   -n / --dry-run    Report what would change without changing it
///   -f / --force      Skip missing targets instead of failing
///   -v / -vv          Increase verbosity (logs go to stderr)
///   -q / --quiet      Errors only
///   GITHUB_TOKEN      Access token if ~/.ghizmo.yml has none
#[derive(Parser, Debug)]
#[command(
    name = "ghizmo",
    version,
    about = "ghizmo - Extensible GitHub command-line tricks",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Command to run (see the list below)
    #[arg(value_name = "COMMAND")]
    command: String,

    /// Username to check the access token against
    #[arg(long)]
    username: Option<String>,

    /// Repository as OWNER/NAME (default: inferred from the `origin` remote)
    #[arg(long, value_name = "OWNER/NAME")]
    repo: Option<String>,

    /// State filter for pull requests and issues
    #[arg(long, value_parser = ["open", "closed", "all"])]
    state: Option<String>,

    /// Output format: json or yaml
    #[arg(long, default_value = "json")]
    format: String,

    /// Skip missing targets instead of failing
    #[arg(short, long)]
    force: bool,

    /// Report what would change without changing it
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Debug logging with source locations and full error chains
    #[arg(long)]
    debug: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all non-error logging
    #[arg(short, long)]
    quiet: bool,

    /// Command argument (repeatable KEY=VALUE)
    #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE", value_parser = parse_pair)]
    args: Vec<(String, String)>,
}

fn main() -> ExitCode {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    // The registry feeds the help text, so it is built before clap runs.
    let registry = match cmd::build_registry(&cwd) {
        Ok(registry) => registry,
        Err(e) => return report(&e, debug_requested(std::env::args())),
    };

    let cli = parse_cli(&registry);
    let debug = cli.debug;

    let level = utils::derive_level(cli.verbose, cli.quiet, cli.debug);
    utils::init_logging(level, cli.debug);

    match run(cli, &registry) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e, debug),
    }
}

/// `--debug` ahead of full parsing. Arguments after `--` are not flags.
fn debug_requested(args: impl IntoIterator<Item = String>) -> bool {
    args.into_iter()
        .skip(1)
        .take_while(|a| a != "--")
        .any(|a| a == "--debug")
}

/// Parse the command line with the command directory in the help text, and
/// reject command names the registry does not know as a usage error.
fn parse_cli(registry: &Registry) -> Cli {
    let mut command = Cli::command().after_help(directory_help(registry));
    let matches = command.get_matches_mut();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    if !registry.contains(&cli.command) {
        command
            .error(
                ErrorKind::InvalidValue,
                format!(
                    "invalid command '{}'\n\n  [possible values: {}]",
                    cli.command,
                    registry.names(true).join(", ")
                ),
            )
            .exit();
    }
    cli
}

fn directory_help(registry: &Registry) -> String {
    let entries = registry.directory(true);
    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    let mut out = String::from("Commands:\n");
    let mut module = "";
    for entry in &entries {
        if entry.module != module {
            module = entry.module.as_str();
            out.push_str(&format!("  {module}:\n"));
        }
        out.push_str(&format!("    {:<width$}  {}\n", entry.name, entry.summary));
    }
    out
}

fn run(cli: Cli, registry: &Registry) -> Result<()> {
    let format: Format = cli.format.parse()?;
    debug!("{} commands registered", registry.len());

    // Fail on a malformed --repo before touching the network.
    let named_repo = cli.repo.as_deref().map(github::parse_repo).transpose()?;

    let config = Config::load()?;
    let username = cli.username.as_deref().or(config.username.as_deref());
    let client = GithubClient::login(
        config.api_url(),
        config.token(std::env::var("GITHUB_TOKEN").ok()),
        username,
    )?;

    let repository = named_repo
        .or_else(|| github::infer_repo("origin"))
        .map(|id| RepoInfo::fetch(&client, id))
        .transpose()?;

    let reserved = Reserved {
        dry_run: cli.dry_run,
        force: cli.force,
        format,
        state: cli.state,
    };
    let env = std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
    let args = InvocationArgs::assemble(env, cli.args, &reserved);

    let ctx = RunContext {
        api: Box::new(client),
        repository,
        sink: Sink::stdout(format),
        input: Input::stdin(),
        config,
    };
    let emitted = cmd::dispatch::run(registry, &cli.command, &ctx, &args)?;
    debug!("Done: {emitted} record(s)");
    Ok(())
}

/// Print a failure and pick the exit status. A closed stdout downstream of a
/// pipe is not an error worth reporting.
fn report(e: &anyhow::Error, debug: bool) -> ExitCode {
    if is_broken_pipe(e) {
        return ExitCode::from(141);
    }
    if debug {
        eprintln!("error: {e:?}");
    } else {
        eprintln!("error: {e:#}");
        eprintln!("{ERROR_HINT}");
    }
    ExitCode::from(2)
}

fn is_broken_pipe(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::BrokenPipe)
    })
}
