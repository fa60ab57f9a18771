use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use resgraph_client::discovery::connect_or_launch;
use resgraph_client::{ClientConfig, Database, EnvSignals, InitOptions, NewAsset, ResourceFilter};
use resgraph_filter::{filter, Criteria, Criterion};
use resgraph_protocol::{Metadata, DATABASE_ID};
use serde::Serialize;
use serde_json::{json, Value};
use std::io;
use std::path::PathBuf;

mod output;

use output::{AssetView, ContainerView};

#[derive(Parser)]
#[command(name = "resgraph")]
#[command(about = "Query and extend the local resource graph", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Root container folder for interactive sessions (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Change into the project's analysis root once the session is resolved
    #[arg(long, global = true)]
    chdir: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover or launch the database and report its identity
    Ping,

    /// Print the session's root container with its assets
    Root,

    /// Print the children of the root container
    Children,

    /// Search containers under the root
    Containers(SearchArgs),

    /// Search assets under the root
    Assets(SearchArgs),

    /// Journal an asset under the root and print the path to write it to
    AddAsset(AddAssetArgs),

    /// Flag a resource for attention
    Flag(FlagArgs),
}

#[derive(Args)]
struct SearchArgs {
    /// Exact name
    #[arg(long)]
    name: Option<String>,

    /// Exact type
    #[arg(long = "type")]
    kind: Option<String>,

    /// Required tag (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Metadata equality, KEY=JSON (repeatable)
    #[arg(long = "meta", value_parser = parse_key_json)]
    metadata: Vec<(String, Value)>,

    /// Client-side criterion on a property path, PATH=JSON (repeatable)
    #[arg(long = "where", value_parser = parse_key_json)]
    criteria: Vec<(String, Value)>,
}

impl SearchArgs {
    fn resource_filter(&self) -> ResourceFilter {
        ResourceFilter {
            name: self.name.clone(),
            kind: self.kind.clone(),
            tags: (!self.tags.is_empty()).then(|| self.tags.clone()),
            metadata: (!self.metadata.is_empty()).then(|| to_metadata(&self.metadata)),
        }
    }

    fn local_criteria(&self) -> Result<Criteria> {
        let mut criteria = Criteria::new();
        for (path, value) in &self.criteria {
            let criterion = Criterion::from_json(value.clone())
                .with_context(|| format!("invalid --where criterion for `{path}`"))?;
            criteria.insert(path.as_str(), criterion);
        }
        Ok(criteria)
    }
}

#[derive(Args)]
struct AddAssetArgs {
    /// Path relative to the root container
    path: PathBuf,

    #[arg(long)]
    name: Option<String>,

    #[arg(long = "type")]
    kind: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// Tag (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Metadata entry, KEY=JSON (repeatable)
    #[arg(long = "meta", value_parser = parse_key_json)]
    metadata: Vec<(String, Value)>,
}

#[derive(Args)]
struct FlagArgs {
    /// Container or asset id
    resource: String,

    message: String,
}

/// `KEY=JSON`. Values that are not valid JSON are taken as strings.
fn parse_key_json(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn to_metadata(entries: &[(String, Value)]) -> Metadata {
    entries.iter().cloned().collect()
}

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    print_stdout(&text)
}

fn open_database(config: &ClientConfig, root: Option<PathBuf>, chdir: bool) -> Result<Database> {
    let signals = EnvSignals::from_env();
    let dev_root = match root {
        Some(root) => Some(root),
        None if signals.project.is_none() && signals.root.is_none() => {
            Some(std::env::current_dir().context("resolve current directory")?)
        }
        None => None,
    };
    let options = InitOptions { dev_root, chdir };
    Database::with_config(config, &signals, &options).context("open database session")
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = ClientConfig::from_env();
    let pretty = cli.pretty;

    if let Commands::Ping = cli.command {
        connect_or_launch(&config).context("reach database")?;
        let endpoint = config.socket_addr().to_string();
        return print_json(&json!({"status": "ok", "identity": DATABASE_ID, "endpoint": endpoint}), pretty);
    }

    let db = open_database(&config, cli.root, cli.chdir)?;
    match cli.command {
        Commands::Ping => Ok(()),
        Commands::Root => {
            let root = db.root().context("fetch root container")?;
            let assets = root.assets().context("fetch root assets")?;
            print_json(&ContainerView::with_assets(&root, &assets), pretty)
        }
        Commands::Children => {
            let children = db.root()?.children().context("fetch children")?;
            let views: Vec<ContainerView> = children.iter().map(ContainerView::new).collect();
            print_json(&views, pretty)
        }
        Commands::Containers(args) => {
            let criteria = args.local_criteria()?;
            let found = db
                .find_containers(&args.resource_filter())
                .context("search containers")?;
            let kept = filter(&criteria, found.iter());
            log::debug!("{} of {} containers kept", kept.len(), found.len());
            let views: Vec<ContainerView> = kept.into_iter().map(ContainerView::new).collect();
            print_json(&views, pretty)
        }
        Commands::Assets(args) => {
            let criteria = args.local_criteria()?;
            let found = db
                .find_assets(&args.resource_filter())
                .context("search assets")?;
            let kept = filter(&criteria, found.iter());
            let views: Vec<AssetView> = kept.into_iter().map(AssetView::new).collect();
            print_json(&views, pretty)
        }
        Commands::AddAsset(args) => {
            let asset = NewAsset {
                name: args.name,
                kind: args.kind,
                description: args.description,
                tags: args.tags,
                metadata: to_metadata(&args.metadata),
            };
            let destination = db.add_asset(&args.path, asset).context("add asset")?;
            print_json(&json!({"path": destination}), pretty)
        }
        Commands::Flag(args) => {
            db.flag_id(&args.resource, &args.message)
                .with_context(|| format!("flag {}", args.resource))?;
            print_json(&json!({"status": "ok"}), pretty)
        }
    }
}
