use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use genmusic_server::listing::{ListedEntry, ListingLimits, ListingService};
use genmusic_server::music_store::{CatalogEntryId, MusicStore, SqliteMusicStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the music.db file.
    #[clap(value_parser = parse_path)]
    pub path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shows the newest catalog entries.
    Recent {
        #[clap(short, long)]
        limit: Option<usize>,
    },

    /// Shows the most liked catalog entries.
    Popular {
        #[clap(short, long)]
        limit: Option<usize>,
    },

    /// Shows a single catalog entry.
    Show { id: CatalogEntryId },

    /// Deletes a catalog entry together with its ownership links and likes.
    Delete { id: CatalogEntryId },

    /// Shows how many accounts and entries are stored.
    Stats,
}

fn print_entry(entry: &ListedEntry) {
    println!(
        "{:>6}  {:<40}  likes: {:<4}  {}",
        entry.id, entry.title, entry.like_count, entry.music_url
    );
}

fn execute(command: Command, store: Arc<dyn MusicStore>) -> Result<()> {
    let listing = ListingService::new(store.clone(), ListingLimits::default());
    match command {
        Command::Recent { limit } => {
            for entry in listing.recent(limit, None)?.music_list.iter() {
                print_entry(entry);
            }
        }
        Command::Popular { limit } => {
            for entry in listing.popular(limit, None)?.music_list.iter() {
                print_entry(entry);
            }
        }
        Command::Show { id } => {
            let entry = listing.entry(id, None)?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Command::Delete { id } => {
            let deleted = store.delete_entry(id)?;
            println!(
                "Deleted entry {} ({} ownership links, {} likes)",
                id, deleted.ownerships_removed, deleted.likes_removed
            );
        }
        Command::Stats => {
            println!("Accounts: {}", store.count_accounts()?);
            println!("Entries:  {}", store.count_entries()?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let cli_args = CliArgs::parse();
    if !cli_args.path.exists() {
        bail!("No music database at {:?}", cli_args.path);
    }
    info!("Opening music database at {:?}", cli_args.path);
    let store: Arc<dyn MusicStore> = Arc::new(SqliteMusicStore::new(&cli_args.path)?);

    execute(cli_args.command, store)
}
