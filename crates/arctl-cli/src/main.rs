//! arctl - run and deploy agents and MCP servers
//!
//! Usage:
//!   arctl run [DIR]                      # Run the agent in DIR (default .)
//!   arctl run --registry NAME@VERSION    # Run a published agent
//!   arctl deploy NAME --version V        # Deploy locally or to a provider
//!   arctl deployments list|status|rm     # Manage deployment records

mod session;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arctl_core::commands::{RunOptions, RunSource};
use arctl_core::config::{ConfigStore, EnvSnapshot};
use arctl_core::context::AppContext;
use arctl_core::deploy::{DeployOutcome, DeployRequest, DeploymentRecord};
use arctl_core::manifest::Manifest;
use arctl_core::types::ResourceType;

use crate::session::{WaitForInterrupt, interrupt_token};

const MANIFEST_FILE: &str = "agent.yaml";

#[derive(Parser)]
#[command(name = "arctl")]
#[command(about = "Run and deploy agents and MCP servers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an agent locally with an interactive session
    Run(RunArgs),

    /// Deploy an agent or MCP server
    Deploy(DeployArgs),

    /// Manage deployments
    Deployments(DeploymentsArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Project directory containing agent.yaml
    #[arg(default_value = ".", conflicts_with = "registry")]
    dir: PathBuf,

    /// Run a published agent instead (NAME or NAME@VERSION)
    #[arg(long)]
    registry: Option<String>,

    /// Extra environment for the agent (KEY=VALUE)
    #[arg(long = "env", short = 'e')]
    env: Vec<String>,

    /// Override the model provider
    #[arg(long)]
    model_provider: Option<String>,

    /// Override the model name
    #[arg(long)]
    model_name: Option<String>,
}

#[derive(Args)]
struct DeployArgs {
    /// Name of the agent or MCP server in the registry
    name: String,

    /// Version to deploy
    #[arg(long, default_value = "latest")]
    version: String,

    /// Resource type (agent or mcp)
    #[arg(long = "type", default_value = "agent")]
    kind: String,

    /// Provider to deploy to; `local` runs on this machine
    #[arg(long, default_value = "local")]
    provider: String,

    /// Provider namespace
    #[arg(long)]
    namespace: Option<String>,

    /// Environment for the workload (KEY=VALUE)
    #[arg(long = "env", short = 'e')]
    env: Vec<String>,

    /// Model provider whose credential must be set; defaults to the agent's own
    #[arg(long)]
    model_provider: Option<String>,

    /// Prefer a hosted endpoint over a local build for MCP servers
    #[arg(long)]
    prefer_remote: bool,

    /// Output format
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args)]
struct DeploymentsArgs {
    #[command(subcommand)]
    command: DeploymentsSubcommand,
}

#[derive(Subcommand)]
enum DeploymentsSubcommand {
    /// List deployments
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the deployment of a resource version
    Status {
        name: String,

        #[arg(long, default_value = "latest")]
        version: String,

        /// Resource type (agent or mcp)
        #[arg(long = "type", default_value = "agent")]
        kind: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove a deployment and stop it if it runs locally
    #[command(alias = "rm")]
    Remove {
        /// Deployment id
        id: String,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = ConfigStore::from_default_dir()?;
    let ctx = AppContext::load(&store, EnvSnapshot::from_process())
        .with_context(|| format!("Failed to load {}", store.config_path().display()))?;

    match cli.command {
        Commands::Run(args) => run_run(&ctx, args).await,
        Commands::Deploy(args) => run_deploy(&ctx, args).await,
        Commands::Deployments(args) => run_deployments(&ctx, args).await,
    }
}

async fn run_run(ctx: &AppContext, args: RunArgs) -> Result<()> {
    let source = match &args.registry {
        Some(reference) => {
            let (name, version) = reference
                .split_once('@')
                .unwrap_or((reference.as_str(), "latest"));
            RunSource::Registry {
                name: name.to_string(),
                version: version.to_string(),
            }
        }
        None => {
            let dir = args
                .dir
                .canonicalize()
                .with_context(|| format!("Project directory not found: {}", args.dir.display()))?;
            let manifest = read_manifest(&dir)?;
            RunSource::Directory { dir, manifest }
        }
    };

    let options = RunOptions {
        env: parse_env(&args.env)?,
        model_provider: args.model_provider,
        model_name: args.model_name,
    };

    let cancel = interrupt_token();
    let summary = ctx
        .run_command()?
        .execute(source, &options, &WaitForInterrupt, &cancel)
        .await?;

    println!(
        "✓ Stopped {} ({}) running image {}",
        summary.name, summary.version, summary.image
    );
    for warning in &summary.warnings {
        println!("  ⚠ {}", warning);
    }
    Ok(())
}

async fn run_deploy(ctx: &AppContext, args: DeployArgs) -> Result<()> {
    let resource_type = ResourceType::try_from(args.kind.as_str())?;
    let mut request = DeployRequest::new(&args.name, &args.version, resource_type);
    request.env = parse_env(&args.env)?;
    request.provider_id = args.provider;
    request.namespace = args.namespace;
    request.model_provider = args.model_provider;
    request.prefer_remote = args.prefer_remote;

    let outcome = ctx
        .dispatcher()?
        .deploy(&request)
        .await
        .with_context(|| format!("Failed to deploy {} '{}'", resource_type, args.name))?;

    match args.format {
        OutputFormat::Table => match &outcome {
            DeployOutcome::Local {
                resource_name,
                version,
                deployment_id,
            } => println!("✓ Deployed {resource_name} ({version}) locally [{deployment_id}]"),
            DeployOutcome::Remote {
                provider_id,
                namespace,
                deployment_id,
            } => match namespace {
                Some(ns) => println!(
                    "✓ Submitted {} to {provider_id} in namespace {ns} [{deployment_id}]",
                    args.name
                ),
                None => println!("✓ Submitted {} to {provider_id} [{deployment_id}]", args.name),
            },
        },
        OutputFormat::Json => {
            let output = match &outcome {
                DeployOutcome::Local {
                    resource_name,
                    version,
                    deployment_id,
                } => serde_json::json!({
                    "id": deployment_id,
                    "provider": "local",
                    "name": resource_name,
                    "version": version,
                }),
                DeployOutcome::Remote {
                    provider_id,
                    namespace,
                    deployment_id,
                } => serde_json::json!({
                    "id": deployment_id,
                    "provider": provider_id,
                    "namespace": namespace,
                }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

async fn run_deployments(ctx: &AppContext, args: DeploymentsArgs) -> Result<()> {
    let dispatcher = ctx.dispatcher()?;
    match args.command {
        DeploymentsSubcommand::List { format } => {
            let records = dispatcher.list().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
                OutputFormat::Table => {
                    if records.is_empty() {
                        println!("No deployments");
                    }
                    for record in &records {
                        print_record(record);
                    }
                }
            }
        }
        DeploymentsSubcommand::Status {
            name,
            version,
            kind,
            format,
        } => {
            let resource_type = ResourceType::try_from(kind.as_str())?;
            let record = dispatcher.status(&name, &version, resource_type).await?;
            match (format, record) {
                (OutputFormat::Json, record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?)
                }
                (OutputFormat::Table, Some(record)) => print_record(&record),
                (OutputFormat::Table, None) => {
                    println!("{resource_type} '{name}' ({version}) is not deployed")
                }
            }
        }
        DeploymentsSubcommand::Remove { id } => {
            let report = dispatcher
                .remove(&id)
                .await
                .with_context(|| format!("Failed to remove deployment '{id}'"))?;
            println!(
                "✓ Removed deployment {} ({} {})",
                report.record.id, report.record.resource_name, report.record.version
            );
            for warning in &report.warnings {
                println!("  ⚠ {}", warning);
            }
        }
    }
    Ok(())
}

fn print_record(record: &DeploymentRecord) {
    let provider = if record.is_local() {
        "local".to_string()
    } else {
        match record.namespace() {
            Some(ns) => format!("{}/{}", record.provider_id, ns),
            None => record.provider_id.clone(),
        }
    };
    println!(
        "{:<12} {:<6} {:<24} {:<12} {:<10} {}",
        record.id,
        record.resource_type.as_str(),
        record.resource_name,
        record.version,
        record.status.to_string(),
        provider
    );
    if let Some(error) = &record.error {
        println!("{:<12} ⚠ {}", "", error);
    }
}

fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse_env(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Invalid environment variable '{pair}', expected KEY=VALUE"))?;
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}
