use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use folio::cli::{Cli, Commands};
use folio::{AppContext, commands};
use folio_core::storage::{INTERNAL_DIR_NAME, Library};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let command = match cli.command {
        Commands::Init { dir } => return commands::handle_init(dir).await,
        command => command,
    };

    let root = locate_root(cli.root)?;
    debug!("Using library at {}", root.display());
    let library = Library::open(&root)
        .await
        .with_context(|| format!("Failed to open library at {}", root.display()))?;
    let cx = AppContext { library, json: cli.json };

    match command {
        Commands::Tree(args) => commands::handle_tree(args, &cx).await?,
        Commands::Read(args) => commands::handle_read(args, &cx).await?,
        Commands::Write(args) => commands::handle_write(args, &cx).await?,
        Commands::Delete(args) => commands::handle_delete(args, &cx).await?,
        Commands::Collection(args) => commands::handle_collection(args, &cx).await?,
        Commands::Meta(args) => commands::handle_meta(args, &cx).await?,
        Commands::Archive(args) => commands::handle_archive(args, &cx).await?,
        Commands::Restore(args) => commands::handle_restore(args, &cx).await?,
        Commands::Normalize(args) => commands::handle_normalize(args, &cx).await?,
        Commands::Validate(args) => commands::handle_validate(args, &cx).await?,
        Commands::Recover(args) => commands::handle_recover(args, &cx).await?,
        Commands::Init { .. } => {}
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `-q` and the `-v` count pick the level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// An explicit root is used as given. Otherwise the current directory and its
/// parents are searched for a `.folio` directory, falling back to the current
/// directory.
fn locate_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root);
    }
    let cwd = std::env::current_dir()?;
    let found = cwd
        .ancestors()
        .find(|dir| dir.join(INTERNAL_DIR_NAME).is_dir())
        .map(Path::to_path_buf);
    Ok(found.unwrap_or(cwd))
}
