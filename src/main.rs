use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use depgraph::db::{migrate, Db};
use depgraph::entity::{decode, Entity};
use depgraph::export::{self, View};
use depgraph::grammar::parse_relationships;
use depgraph::graph::{self, Graph};
use depgraph::{ingest, store, Config};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "depgraph")]
#[command(version, about = "Dependency graph of issues and merge requests across forges")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import fetcher batch files (incremental by default)
    Import {
        /// A batch file, or a directory of .json/.yaml batches
        path: PathBuf,
        /// Re-import files whose hash is already recorded
        #[arg(short, long)]
        force: bool,
    },
    /// Print the filtered task list of the stored graph
    Graph {
        /// Services, owners, repos, milestones or tasks to start from
        targets: Vec<String>,
        #[arg(long)]
        the_world: bool,
        #[arg(long)]
        with_closed: bool,
        #[arg(long)]
        without_isolated: bool,
        #[arg(long)]
        without_prs: bool,
        #[arg(long)]
        without_external_deps: bool,
        /// Hops of DependsOn/Blocking to follow from the targets
        #[arg(long)]
        scope_size: Option<usize>,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Print the canonical form of a URI or shorthand
    Decode {
        uri: String,
        /// Entity the input is relative to
        #[arg(long)]
        context: Option<String>,
    },
    /// Print the relationships declared in a body (stdin if no file)
    Parse {
        #[arg(long)]
        context: String,
        file: Option<PathBuf>,
    },
    /// Most recent update of a repo's stored issues
    LastUpdated { repo: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Csv,
    Tree,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.depgraph.log_level.as_str()),
    )
    .init();

    match cli.command {
        Command::Import { path, force } => run_import(&config, path, force).await,
        Command::Graph {
            targets,
            the_world,
            with_closed,
            without_isolated,
            without_prs,
            without_external_deps,
            scope_size,
            format,
        } => {
            let mut filters = config.filters.filters(decode_targets(&targets), the_world);
            filters.with_closed |= with_closed;
            filters.without_isolated |= without_isolated;
            filters.without_prs |= without_prs;
            filters.without_external_deps |= without_external_deps;
            if let Some(scope_size) = scope_size {
                if scope_size > depgraph::config::MAX_SCOPE_SIZE {
                    anyhow::bail!(
                        "--scope-size must be at most {}",
                        depgraph::config::MAX_SCOPE_SIZE
                    );
                }
                filters.scope_size = scope_size;
            }
            run_graph(&config, &filters, format).await
        }
        Command::Decode { uri, context } => {
            let context = context
                .map(|c| decode(&c, None).with_context(|| format!("Invalid context {:?}", c)))
                .transpose()?;
            let entity = decode(&uri, context.as_ref())?;
            println!("canonical: {}", entity.canonical_string());
            println!("kind:      {}", entity.kind());
            println!("provider:  {}", entity.provider().as_str());
            println!("local id:  {}", entity.local_id());
            Ok(())
        }
        Command::Parse { context, file } => {
            let context = decode(&context, None).with_context(|| format!("Invalid context {:?}", context))?;
            let body = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut body = String::new();
                    std::io::stdin().read_to_string(&mut body).context("Failed to read stdin")?;
                    body
                }
            };
            let (relationships, errors) = parse_relationships(&context, &body);
            for relationship in &relationships {
                println!("{}", relationship);
            }
            for error in &errors {
                log::warn!("{}", error);
            }
            Ok(())
        }
        Command::LastUpdated { repo } => {
            let repo = decode(&repo, None).with_context(|| format!("Invalid repo {:?}", repo))?;
            let db = open_db(&config).await?;
            match store::last_updated_in_repo(&db, &repo).await? {
                Some(updated_at) => println!("{}", updated_at.to_rfc3339()),
                None => log::info!("No stored issues for {}", repo),
            }
            Ok(())
        }
    }
}

async fn open_db(config: &Config) -> Result<Db> {
    let db = Db::new(config.db_path());
    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await
        .context("Failed to initialize database")?;
    log::debug!("Database ready at {}", config.db_path().display());
    Ok(db)
}

/// Targets that fail to decode are reported and skipped.
fn decode_targets(targets: &[String]) -> Vec<Entity> {
    targets
        .iter()
        .filter_map(|target| match decode(target, None) {
            Ok(entity) => Some(entity),
            Err(e) => {
                log::warn!("Skipping target {:?}: {}", target, e);
                None
            }
        })
        .collect()
}

async fn run_import(config: &Config, path: PathBuf, force: bool) -> Result<()> {
    let db = open_db(config).await?;
    let summary = ingest::import_batches(&db, &path, &config.graph, force)
        .await
        .with_context(|| format!("Failed to import {}", path.display()))?;
    log::info!(
        "Import complete: {} imported, {} unchanged, {} tasks / {} owners / {} topics stored",
        summary.imported,
        summary.skipped,
        summary.saved.tasks,
        summary.saved.owners,
        summary.saved.topics
    );
    Ok(())
}

async fn run_graph(config: &Config, filters: &graph::Filters, format: Format) -> Result<()> {
    let db = open_db(config).await?;
    let stored: Graph = store::load_graph(&db).await.context("Failed to load the stored graph")?;
    let tasks = graph::load(&stored, filters)?;
    log::info!("{} of {} tasks selected", tasks.len(), stored.tasks.len());

    match format {
        Format::Json => {
            let view = View {
                owners: graph::load_owners(&stored, filters)?,
                topics: graph::load_topics(&stored, filters)?,
                tasks,
            };
            println!("{}", export::to_json(&view)?);
        }
        Format::Csv => print!("{}", export::to_csv(&tasks)),
        Format::Tree => print!("{}", export::debug_tree(&tasks, true, true)),
    }
    Ok(())
}
