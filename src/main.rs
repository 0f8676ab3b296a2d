//! A tool to aggregate and score open-source community reputation data.
//!
//! # Overview
//!
//! `talent-rank` tracks people and companies active in a large open-source
//! ecosystem. For each talent it collects public activity from a set of
//! community sites — profile pages, the plugin and theme registries,
//! support forums, the code repository, the documentation wiki, release
//! credits, a Q&A network, and a video directory — caches the normalized
//! data with per-source expiries, derives a single reputation score, and
//! optionally mirrors everything into a search index.
//!
//! # Quick Start
//!
//! Import a talent by their community username and refresh their data:
//!
//! ```bash
//! talent-rank add johndoe
//! talent-rank update johndoe
//! talent-rank score johndoe
//! ```
//!
//! # Commands
//!
//! **Import talents:**
//! ```bash
//! talent-rank add johndoe janedoe
//! talent-rank add acme --name "Acme Corp" --type company
//! ```
//!
//! **Refresh collected data:**
//! ```bash
//! talent-rank update johndoe                 # Respects cache freshness
//! talent-rank update johndoe --force-update  # Bypasses it
//! ```
//!
//! **Scores and search documents:**
//! ```bash
//! talent-rank score johndoe
//! talent-rank sync johndoe --index-url http://localhost:9200
//! ```
//!
//! # Storage
//!
//! Data lives in a directory of JSON documents, one per talent, selected
//! with `--data-dir` (default `./talents-data`). Logging is controlled via
//! `RUST_LOG`.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use talent_rank::Result;
use talent_rank::collectors::Collectors;
use talent_rank::config::{HTTP_TIMEOUT, Sources};
use talent_rank::importer::Importer;
use talent_rank::model::{Talent, TalentKind};
use talent_rank::score::ScoreEngine;
use talent_rank::store::{JsonStore, Store};
use talent_rank::sync::{HttpIndex, IndexTarget, SyncContext, SyncManager};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "talent-rank", version, about)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    /// Directory holding the talent store
    #[arg(long, global = true, default_value = "./talents-data")]
    data_dir: PathBuf,

    /// Base URL of the search index; omit to disable syncing
    #[arg(long, global = true)]
    index_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import talents by their community username
    Add {
        /// Usernames on the community profile site
        #[arg(required = true)]
        usernames: Vec<String>,

        /// Display name (defaults to the profile's own)
        #[arg(long)]
        name: Option<String>,

        /// Kind of talent to create
        #[arg(long = "type", default_value = "person")]
        kind: TalentKind,
    },

    /// Refresh collected data for talents
    Update {
        #[arg(required = true)]
        usernames: Vec<String>,

        /// Refresh even where the cache is still fresh
        #[arg(long)]
        force_update: bool,
    },

    /// Print a talent's reputation score
    Score {
        username: String,
    },

    /// Push a talent's document to the search index
    Sync {
        username: String,
    },
}

struct App {
    store: Arc<dyn Store>,
    collectors: Collectors,
    sync: SyncManager<IndexTarget>,
}

impl App {
    fn new(cli: &Cli) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(JsonStore::open(&cli.data_dir)?);
        let collectors = Collectors::new(Arc::clone(&store), Sources::default())?;

        let index = match &cli.index_url {
            Some(url) => {
                let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build().map_err(ohno::AppError::new)?;
                IndexTarget::Http(HttpIndex::new(client, url.clone()))
            }
            None => IndexTarget::Disabled,
        };

        let sync = SyncManager::new(index, collectors.cache().clone());
        Ok(Self { store, collectors, sync })
    }

    fn talent(&self, username: &str) -> Result<Talent> {
        self.store
            .talent_by_username(username)
            .ok_or_else(|| ohno::app_err!("no talent found for username '{username}'"))
    }

    async fn add(&self, usernames: &[String], name: Option<&str>, kind: TalentKind) -> Result<()> {
        let importer = Importer::new(Arc::clone(&self.store), &self.collectors, Sources::default())?;
        let mut failures = 0_usize;

        for username in usernames {
            match importer.import(username, name, kind).await {
                Ok(talent) => {
                    self.sync.sync(&talent, SyncContext::immediate()).await;
                    println!("Imported '{}' as talent {}", talent.username, talent.id);
                }
                Err(e) => {
                    eprintln!("Unable to import '{username}': {e}");
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            return Err(ohno::app_err!("{failures} of {} imports failed", usernames.len()));
        }
        Ok(())
    }

    async fn update(&self, usernames: &[String], force: bool) -> Result<()> {
        for username in usernames {
            let talent = self.talent(username)?;
            let results = self.collectors.refresh_all(&talent, force).await;

            let failed: Vec<String> = results
                .iter()
                .filter(|(_, result)| result.is_err())
                .map(|(source, _)| source.to_string())
                .collect();

            // One sync per talent after the fan-out, not one per source.
            self.sync.sync(&talent, SyncContext::immediate()).await;

            if failed.is_empty() {
                println!("Updated '{username}'");
            } else {
                println!("Updated '{username}' ({} sources failed: {})", failed.len(), failed.join(", "));
            }
        }
        Ok(())
    }

    fn score(&self, username: &str) -> Result<()> {
        let talent = self.talent(username)?;
        let engine = ScoreEngine::new(self.collectors.cache().clone());
        println!("{}", engine.score(&talent, false)?);
        Ok(())
    }

    async fn sync(&self, username: &str) -> Result<()> {
        let talent = self.talent(username)?;
        self.sync.sync(&talent, SyncContext::immediate()).await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "warn");
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .init();

    let cli = Cli::parse();
    let app = App::new(&cli)?;

    match &cli.command {
        Command::Add { usernames, name, kind } => app.add(usernames, name.as_deref(), *kind).await,
        Command::Update { usernames, force_update } => app.update(usernames, *force_update).await,
        Command::Score { username } => app.score(username),
        Command::Sync { username } => app.sync(username).await,
    }
}
