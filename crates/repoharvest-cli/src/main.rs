use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use repoharvest_api::{ApiGateway, GitHubClient, RateLimitGovernor};
use repoharvest_core::{
    Config, Harvester, ProgressCallback, ReadmeFetcher, RepositorySearchEngine, SearchProgress,
};
use repoharvest_store::RepositoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "repoharvest")]
#[command(version, about = "Harvest GitHub repositories matching a search into a local store", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, env = "REPOHARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// GitHub token
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// SQLite database file
    #[arg(long, global = true, env = "REPOHARVEST_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `[search]` section
#[derive(clap::Args, Default)]
struct SearchArgs {
    #[arg(long)]
    keywords: Option<String>,

    #[arg(long)]
    min_stars: Option<u32>,

    /// First creation date, YYYY-MM-DD
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last creation date, YYYY-MM-DD
    #[arg(long)]
    to: Option<NaiveDate>,

    #[arg(long)]
    language: Option<String>,

    /// Include forks (overrides the config file)
    #[arg(long, overrides_with = "no_forks")]
    include_forks: bool,

    /// Exclude forks (overrides the config file)
    #[arg(long, overrides_with = "include_forks")]
    no_forks: bool,

    /// Give up after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Search, store results, then fetch READMEs
    Harvest {
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Search only and print what was found
    Search {
        #[command(flatten)]
        search: SearchArgs,

        /// Print the records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch READMEs for stored repositories that don't have one yet
    Refresh,
    /// Print one repository's README
    Readme {
        /// Repository name (owner/repo)
        full_name: String,

        /// Branch to read from; the repository's default branch when omitted
        #[arg(long)]
        branch: Option<String>,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - helps when things go sideways
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repoharvest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Harvest { search } => {
            apply_search_args(&mut config, search);
            config.validate()?;

            let mut harvester = build_harvester(&config)?;
            let report = harvester.run().await?;

            println!(
                "Found {} repositories ({} new, {} updated)",
                report.found, report.inserted, report.updated
            );
            println!(
                "READMEs: {} stored, {} missing, {} unsupported",
                report.readmes_stored, report.readmes_missing, report.readme_errors
            );
            if report.stats.unavailable_calls > 0 {
                println!(
                    "Warning: {} GitHub calls returned no data; run again to fill gaps",
                    report.stats.unavailable_calls
                );
            }
        }
        Commands::Search { search, json } => {
            apply_search_args(&mut config, search);
            let criteria = config.criteria()?;
            let gateway = build_gateway(&config)?;

            let engine = configure_engine(RepositorySearchEngine::new(gateway), &config);
            let results = engine.search(&criteria).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(results.records())?);
            } else {
                for repo in results.records() {
                    println!("{:>7}  {}", repo.stars, repo.full_name);
                }
                println!("{} repositories", results.len());
            }
            if results.is_degraded() {
                eprintln!(
                    "Warning: {} GitHub calls returned no data",
                    results.stats.unavailable_calls
                );
            }
        }
        Commands::Refresh => {
            config.token()?;
            config.storage_path()?;

            let mut harvester = build_harvester(&config)?;
            let report = harvester.refresh_readmes().await?;
            println!(
                "READMEs: {} stored, {} missing, {} unsupported",
                report.readmes_stored, report.readmes_missing, report.readme_errors
            );
        }
        Commands::Readme { full_name, branch } => {
            let fetcher = ReadmeFetcher::new(build_gateway(&config)?);
            let branch = branch.unwrap_or_default();
            match fetcher.fetch(&full_name, &branch).await? {
                Some(text) => println!("{}", text),
                None if branch.is_empty() => eprintln!("No README found for {}", full_name),
                None => eprintln!("No README found for {}@{}", full_name, branch),
            }
        }
        Commands::Config => {
            print!("{}", config.redacted().to_toml()?);
        }
    }

    Ok(())
}

/// File first, then env/flag overrides on top
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load()?,
    };

    if let Some(token) = &cli.token {
        config.github.token = Some(token.clone());
    }
    if let Some(db) = &cli.db {
        config.storage.path = Some(db.clone());
    }

    Ok(config)
}

fn apply_search_args(config: &mut Config, args: SearchArgs) {
    let search = &mut config.search;
    if let Some(keywords) = args.keywords {
        search.keywords = keywords;
    }
    if let Some(min_stars) = args.min_stars {
        search.min_stars = min_stars;
    }
    if let Some(from) = args.from {
        search.created_from = from;
    }
    if args.to.is_some() {
        search.created_to = args.to;
    }
    if args.language.is_some() {
        search.language = args.language;
    }
    if args.include_forks {
        search.include_forks = true;
    } else if args.no_forks {
        search.include_forks = false;
    }
    if args.deadline_secs.is_some() {
        search.deadline_secs = args.deadline_secs;
    }
}

fn build_gateway(config: &Config) -> anyhow::Result<Arc<dyn ApiGateway>> {
    let client = GitHubClient::with_base_url(
        config.token()?,
        config.github.api_url.clone(),
        Duration::from_secs(config.github.timeout_secs),
    )?
    .with_governor(RateLimitGovernor::new(config.github.rate_limit_threshold));

    Ok(Arc::new(client))
}

fn configure_engine(mut engine: RepositorySearchEngine, config: &Config) -> RepositorySearchEngine {
    if let Some(deadline) = config.deadline() {
        engine = engine.with_deadline(deadline);
    }
    engine.with_progress(progress_printer())
}

/// Running tally on stderr so stdout stays clean for --json
fn progress_printer() -> ProgressCallback {
    Box::new(|event| match event {
        SearchProgress::PartitionSplit {
            from,
            to,
            total_count,
            ..
        } => eprintln!(
            "  {} matches in {}..{}, splitting",
            total_count,
            from.date_naive(),
            to.date_naive()
        ),
        SearchProgress::PageFetched {
            page,
            collected,
            expected,
            ..
        } => eprintln!("  page {}: {}/{}", page, collected, expected),
        _ => {}
    })
}

fn build_harvester(config: &Config) -> anyhow::Result<Harvester> {
    let gateway = build_gateway(config)?;
    let engine = configure_engine(RepositorySearchEngine::new(gateway.clone()), config)
        .with_default_criteria(config.criteria()?);
    let store = RepositoryStore::open(config.storage_path()?)?;

    Ok(Harvester::new(engine, ReadmeFetcher::new(gateway), store))
}
