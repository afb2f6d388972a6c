// SPDX-License-Identifier: MPL-2.0

mod api;
mod config;
mod runtime;
mod server;
mod state;
mod store;

use anyhow::{Context, bail};
use api::{LadderClient, Problem, ProblemStatus};
use clap::{Parser, Subcommand};
use server::{Router, RunningServer, TokenIdentity};
use state::{
    FileSnapshotStorage, MemorySnapshotStorage, ProblemStore, SnapshotStorage, favorite_tag,
    status_tag,
};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::{Db, ProblemRepo, TokenRepo};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "ladder", version, about = "Track progress through a problem ladder")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct DbArgs {
    /// SQLite database file, or `:memory:` for a throwaway one
    #[arg(long, env = "LADDER_DB")]
    db: Option<PathBuf>,
}

impl DbArgs {
    fn open(&self) -> anyhow::Result<Db> {
        let path = self.db.clone().unwrap_or_else(config::default_db_path);
        if path.as_os_str() == ":memory:" {
            return Ok(Db::open_in_memory()?);
        }
        Db::open(&path).with_context(|| format!("opening {}", path.display()))
    }
}

#[derive(clap::Args, Debug)]
struct ClientArgs {
    /// Server base URL
    #[arg(long, env = "LADDER_SERVER", default_value = config::DEFAULT_SERVER)]
    server: String,

    /// API token issued by `ladder token`
    #[arg(long, env = "LADDER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Keep the session snapshot in memory only
    #[arg(long)]
    ephemeral: bool,
}

impl ClientArgs {
    fn client(&self) -> LadderClient {
        let client = LadderClient::with_server(&self.server, self.token.clone());
        debug!(server = client.base_url(), ephemeral = self.ephemeral, "client ready");
        client
    }

    fn store(&self) -> ProblemStore {
        let storage: Box<dyn SnapshotStorage> = if self.ephemeral {
            Box::new(MemorySnapshotStorage::default())
        } else {
            Box::new(FileSnapshotStorage::session_default())
        };
        ProblemStore::new(Arc::new(self.client()), storage)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        #[command(flatten)]
        db: DbArgs,

        /// Address to listen on
        #[arg(long, env = "LADDER_BIND", default_value = config::DEFAULT_BIND)]
        bind: String,

        /// Request worker threads
        #[arg(long, default_value_t = config::DEFAULT_WORKERS)]
        workers: usize,
    },

    /// Load or refresh the problem catalog from a JSON file
    Import {
        #[command(flatten)]
        db: DbArgs,

        /// JSON array of problems
        file: PathBuf,
    },

    /// Issue an API token for a user
    Token {
        #[command(flatten)]
        db: DbArgs,

        user: String,
    },

    /// Revoke every token a user holds
    Revoke {
        #[command(flatten)]
        db: DbArgs,

        user: String,
    },

    /// List the catalog with local progress marks
    Problems {
        #[command(flatten)]
        client: ClientArgs,
    },

    /// Set the status of a problem
    #[command(
        after_help = "STATUSES:\n    untouched, attempting, solved, revisit, skipped\n\nEXAMPLES:\n    ladder status 42 solved"
    )]
    Status {
        #[command(flatten)]
        client: ClientArgs,

        number: i64,
        status: ProblemStatus,
    },

    /// Toggle a problem in or out of favorites
    Favorite {
        #[command(flatten)]
        client: ClientArgs,

        problem_id: i64,
    },

    /// Show recent status changes, newest first
    History {
        #[command(flatten)]
        client: ClientArgs,

        /// Zero-based page
        #[arg(long, default_value_t = 0, conflicts_with = "all")]
        page: usize,

        /// Every entry up to the display cap
        #[arg(long)]
        all: bool,
    },

    /// Progress counts per status
    Stats {
        #[command(flatten)]
        client: ClientArgs,
    },

    /// Refresh the local session from the server
    Sync {
        #[command(flatten)]
        client: ClientArgs,
    },

    /// Print the local session state
    Show {
        #[command(flatten)]
        client: ClientArgs,

        /// Also forget it
        #[arg(long)]
        reset: bool,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { db, bind, workers } => serve(&db, &bind, workers),
        Command::Import { db, file } => import(&db, &file),
        Command::Token { db, user } => {
            let db = db.open()?;
            println!("{}", TokenRepo::new(&db).issue(&user)?);
            Ok(())
        }
        Command::Revoke { db, user } => {
            let db = db.open()?;
            let revoked = TokenRepo::new(&db).revoke_all(&user)?;
            println!("revoked {revoked} token(s) for {user}");
            Ok(())
        }
        Command::Problems { client } => problems(&client),
        Command::Status {
            client,
            number,
            status,
        } => set_status(&client, number, status),
        Command::Favorite { client, problem_id } => toggle_favorite(&client, problem_id),
        Command::History { client, page, all } => history(&client, page, all),
        Command::Stats { client } => stats(&client),
        Command::Sync { client } => {
            let store = client.store();
            runtime::block_on(store.sync())?;
            print_session(&store);
            Ok(())
        }
        Command::Show { client, reset } => {
            let store = client.store();
            print_session(&store);
            if reset {
                store.reset();
            }
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LADDER_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "ladder=debug,info"
        } else {
            "ladder=info,warn"
        })
    });

    let format = env::var("LADDER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn serve(db: &DbArgs, bind: &str, workers: usize) -> anyhow::Result<()> {
    let db = db.open()?;
    let problems = ProblemRepo::new(&db).count()?;
    if problems == 0 {
        tracing::warn!("problem catalog is empty, run `ladder import` first");
    }

    let router = Router::new(db.clone(), Box::new(TokenIdentity::new(db)));
    let server = RunningServer::start(bind, router, workers)?;
    info!(addr = %server.addr(), problems, "{} ready", config::APP_NAME);

    runtime::block_on(tokio::signal::ctrl_c()).context("waiting for ctrl-c")?;
    info!("shutting down");
    server.shutdown();
    Ok(())
}

fn import(db: &DbArgs, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let problems: Vec<Problem> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
    if let Some(bad) = problems.iter().find(|p| p.title.trim().is_empty()) {
        bail!("problem {} has an empty title", bad.number);
    }

    let db = db.open()?;
    let imported = ProblemRepo::new(&db).import(&problems)?;
    info!(imported, "catalog imported");
    println!("imported {imported} problem(s)");
    Ok(())
}

/// Seed from the server unless the session already has state
fn session_store(client: &ClientArgs) -> anyhow::Result<ProblemStore> {
    let store = client.store();
    if !store.is_initialized() {
        runtime::block_on(store.sync()).context("initial sync")?;
    }
    Ok(store)
}

fn problems(client: &ClientArgs) -> anyhow::Result<()> {
    let store = session_store(client)?;
    let catalog = runtime::block_on(client.client().problems())?;

    let mut phase = None;
    for problem in &catalog {
        if problem.phase != phase {
            phase = problem.phase.clone();
            println!("[{}]", phase.as_deref().unwrap_or("unsorted"));
        }
        let status = store.get_status(problem.number);
        println!(
            "{} #{:<5} {:<40} {:<8} {}",
            if store.is_favorite(problem.id) { '*' } else { ' ' },
            problem.number,
            problem.title,
            problem.difficulty.as_deref().unwrap_or("-"),
            if status.is_untouched() { "" } else { status.as_str() }
        );
    }
    Ok(())
}

fn set_status(client: &ClientArgs, number: i64, status: ProblemStatus) -> anyhow::Result<()> {
    let store = session_store(client)?;
    let handle = store.spawn_set_status(number, status);
    debug!(
        local = %store.get_status(number),
        pending = store.is_pending(&status_tag(number)),
        "sent"
    );

    let result = runtime::block_on(handle)?;
    let settled = store.get_status(number);
    match result {
        Ok(update) => {
            println!("#{number}: {} -> {}", update.previous_status, update.status);
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("#{number} stays {settled}")),
    }
}

fn toggle_favorite(client: &ClientArgs, problem_id: i64) -> anyhow::Result<()> {
    let store = session_store(client)?;
    let handle = store.spawn_toggle_favorite(problem_id);
    debug!(
        local = store.is_favorite(problem_id),
        pending = store.is_pending(&favorite_tag(problem_id)),
        "sent"
    );

    let result = runtime::block_on(handle)?;
    let settled = if store.is_favorite(problem_id) {
        "favorited"
    } else {
        "unfavorited"
    };
    match result {
        Ok(_) => {
            println!("problem {problem_id} {settled}");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("problem {problem_id} stays {settled}")),
    }
}

fn history(client: &ClientArgs, page: usize, all: bool) -> anyhow::Result<()> {
    let api = client.client();
    let (entries, has_more) = if all {
        (runtime::block_on(api.all_history())?, false)
    } else {
        let page = runtime::block_on(api.history_page(page))?;
        (page.entries, page.has_more)
    };

    if entries.is_empty() {
        println!("no history");
        return Ok(());
    }

    for entry in &entries {
        let from = entry
            .from_status
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        println!(
            "{}  #{:<5} {:<40} {:>10} -> {}",
            entry.changed_at.format("%Y-%m-%d %H:%M"),
            entry.problem_number,
            entry.problem_title,
            from,
            entry.to_status
        );
    }
    if has_more {
        println!("more: --page {}", page + 1);
    }
    Ok(())
}

fn stats(client: &ClientArgs) -> anyhow::Result<()> {
    let stats = runtime::block_on(client.client().stats())?;
    println!("total       {}", stats.total_problems);
    println!("untouched   {}", stats.untouched);
    println!("attempting  {}", stats.attempting);
    println!("solved      {}", stats.solved);
    println!("revisit     {}", stats.revisit);
    println!("skipped     {}", stats.skipped);
    println!("favorites   {}", stats.favorites);
    Ok(())
}

fn print_session(store: &ProblemStore) {
    let snapshot = store.snapshot();
    if !store.is_initialized() {
        println!("no session state, run `ladder sync`");
        return;
    }

    for (number, status) in &snapshot.statuses {
        println!("#{number:<5} {status}");
    }
    let favorites: Vec<String> = snapshot.favorites.iter().map(i64::to_string).collect();
    println!(
        "favorites: {}",
        if favorites.is_empty() {
            "none".to_string()
        } else {
            favorites.join(", ")
        }
    );
}
