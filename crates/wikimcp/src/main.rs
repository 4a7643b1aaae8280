use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wikimcp_core::{ArgumentBag, ClientConfig, Operation, WikiClient, dispatch, load_config};

const DEFAULT_CONFIG: &str = "wikimcp.toml";

#[derive(Debug, Parser)]
#[command(
    name = "wikimcp",
    version,
    about = "Run MediaWiki editing and search tools against a wiki's action API"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "TOML file with a [wiki] table")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the available tools.
    Tools,
    /// Invoke one tool and print its result as JSON.
    Call(CallArgs),
}

#[derive(Debug, Args)]
struct CallArgs {
    #[arg(value_name = "TOOL")]
    tool: String,
    #[arg(long, value_name = "JSON", conflicts_with = "args_file")]
    args: Option<String>,
    #[arg(long, value_name = "PATH")]
    args_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Tools => {
            run_tools();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Call(args) => run_call(cli.config, args).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();
}

fn run_tools() {
    for operation in Operation::ALL {
        let access = if operation.is_mutating() { "write" } else { "read" };
        println!("{}\t{access}", operation.tool_name());
    }
}

async fn run_call(config_path: Option<PathBuf>, args: CallArgs) -> Result<ExitCode> {
    let Some(operation) = Operation::from_tool_name(&args.tool) else {
        bail!("unknown tool `{}` (run `wikimcp tools` for the list)", args.tool);
    };
    let bag = read_argument_bag(&args)?;

    let config_path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let file_config = load_config(&config_path)?;
    let client_config = ClientConfig::resolve(&file_config)?;
    debug!(
        api_url = %client_config.api_url,
        config = %config_path.display(),
        "resolved wiki configuration"
    );
    let client = WikiClient::new(&client_config)?;

    match dispatch(&client, operation, &bag).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            eprintln!("{error}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn read_argument_bag(args: &CallArgs) -> Result<ArgumentBag> {
    let raw = match (&args.args, &args.args_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => return Ok(ArgumentBag::new()),
    };
    match serde_json::from_str::<Value>(&raw).context("tool arguments are not valid JSON")? {
        Value::Object(bag) => Ok(bag),
        other => bail!("tool arguments must be a JSON object, got {other}"),
    }
}
