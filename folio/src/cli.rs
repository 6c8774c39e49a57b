use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Folio: Markdown documents in schema-validated collections.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Library root. Defaults to the nearest directory containing `.folio`,
    /// else the current directory.
    #[arg(long, global = true, env = "FOLIO_ROOT")]
    pub root: Option<PathBuf>,

    /// Increase verbosity (use multiple times for more).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the tree of collections and records.
    Tree(TreeArgs),
    /// Print a record.
    Read(PathArgs),
    /// Create or update a record.
    Write(WriteArgs),
    /// Delete a record.
    Delete(PathArgs),
    /// Show a collection with its members, relations and archive.
    Collection(PathArgs),
    /// Update a collection's title, description, icon or schema.
    Meta(MetaArgs),
    /// Move a record into its collection's archive.
    Archive(PathArgs),
    /// Move an archived record back into its collection.
    Restore(PathArgs),
    /// Rewrite the records of a collection to match its schema.
    Normalize(OptionalPathArgs),
    /// Check a record against its collection's schema.
    Validate(PathArgs),
    /// Finish archive or restore moves that were interrupted.
    Recover(OptionalPathArgs),
    /// Initialize a new library. Defaults to the current directory.
    Init {
        dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct PathArgs {
    /// Library-relative path.
    pub path: String,
}

#[derive(Args, Debug)]
pub struct OptionalPathArgs {
    /// Library-relative path. Defaults to the library root.
    #[arg(default_value = "")]
    pub path: String,
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Directory to start from. Defaults to the library root.
    #[arg(default_value = "")]
    pub path: String,

    /// Generate missing index documents and normalize every record first.
    #[arg(long)]
    pub normalize: bool,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Library-relative path of the record.
    pub path: String,

    /// File holding the new body. Without it the stored body is kept.
    #[arg(long)]
    pub body_file: Option<PathBuf>,

    /// Set a front matter value (e.g. --set status=open --set count=3).
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

#[derive(Args, Debug)]
pub struct MetaArgs {
    /// Library-relative path of the collection.
    pub path: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub icon: Option<String>,

    /// Schema as a JSON object, e.g. '{"status":{"type":"select-text","options":["open","done"]}}'.
    #[arg(long)]
    pub schema: Option<String>,
}
