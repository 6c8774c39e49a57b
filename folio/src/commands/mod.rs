use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use folio_core::markdown::FrontMatter;
use folio_core::schema::{FieldIssue, Schema};
use folio_core::storage::{
    CollectionMetaUpdate, CollectionView, Error, Library, NodeKind, NormalizeReport, Record,
    TreeNode,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::AppContext;
use crate::cli::{MetaArgs, OptionalPathArgs, PathArgs, TreeArgs, WriteArgs};

// --- Handler Functions ---

pub async fn handle_tree(args: TreeArgs, cx: &AppContext) -> Result<()> {
    if args.normalize {
        let report = cx.library.normalize_tree(&args.path).await?;
        print_report(&report, cx.json)?;
    }
    let tree = cx.library.build_tree(&args.path).await?;
    if cx.json {
        return print_json(&tree);
    }
    print_tree(&tree);
    Ok(())
}

pub async fn handle_read(args: PathArgs, cx: &AppContext) -> Result<()> {
    let record = cx.library.read_record(&args.path).await?;
    if cx.json {
        return print_json(&record);
    }
    print!("{}", record.render());
    Ok(())
}

pub async fn handle_write(args: WriteArgs, cx: &AppContext) -> Result<()> {
    let mut front_matter = FrontMatter::new();
    for assignment in &args.set {
        let (key, value) = parse_assignment(assignment)?;
        front_matter.insert(key, value);
    }

    let body = match &args.body_file {
        Some(file) => tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read body file {}", file.display()))?,
        None => match cx.library.read_record(&args.path).await {
            Ok(record) => record.body().to_string(),
            Err(Error::FileNotFound(_)) => String::new(),
            Err(e) => return Err(e.into()),
        },
    };

    let record = cx.library.write_record(&args.path, &body, front_matter).await?;
    info!("Wrote {}", record.path());
    if cx.json {
        return print_json(&record);
    }
    println!("  Wrote {}", record.path());
    Ok(())
}

pub async fn handle_delete(args: PathArgs, cx: &AppContext) -> Result<()> {
    cx.library.delete_record(&args.path).await?;
    println!("  Deleted {}", args.path);
    Ok(())
}

pub async fn handle_collection(args: PathArgs, cx: &AppContext) -> Result<()> {
    let view = cx.library.read_collection(&args.path).await?;
    if cx.json {
        return print_json(&view);
    }
    print_collection(&view);
    Ok(())
}

pub async fn handle_meta(args: MetaArgs, cx: &AppContext) -> Result<()> {
    let schema = args
        .schema
        .as_deref()
        .map(Schema::from_json)
        .transpose()
        .context("Invalid schema")?;
    let update = CollectionMetaUpdate {
        title: args.title,
        description: args.description,
        icon: args.icon,
        schema,
    };

    let collection = cx.library.update_collection_meta(&args.path, update).await?;
    if cx.json {
        return print_json(&collection);
    }
    println!("  Updated collection '{}' ({})", collection.title, display_path(&collection.path));
    Ok(())
}

pub async fn handle_archive(args: PathArgs, cx: &AppContext) -> Result<()> {
    let target = cx.library.archive_record(&args.path).await?;
    println!("  Archived {} to {}", args.path, target);
    Ok(())
}

pub async fn handle_restore(args: PathArgs, cx: &AppContext) -> Result<()> {
    let target = cx.library.restore_record(&args.path).await?;
    println!("  Restored {} to {}", args.path, target);
    Ok(())
}

pub async fn handle_normalize(args: OptionalPathArgs, cx: &AppContext) -> Result<()> {
    let report = cx.library.normalize_collection(&args.path).await?;
    print_report(&report, cx.json)
}

pub async fn handle_validate(args: PathArgs, cx: &AppContext) -> Result<()> {
    let issues = cx.library.validate_record(&args.path).await?;
    if cx.json {
        print_json(&issues)?;
    } else if issues.is_empty() {
        println!("  {} is valid", args.path);
    } else {
        for issue in &issues {
            println!("  {}", describe_issue(issue));
        }
    }

    if !issues.is_empty() {
        bail!("{} has {} issue(s)", args.path, issues.len());
    }
    Ok(())
}

pub async fn handle_recover(args: OptionalPathArgs, cx: &AppContext) -> Result<()> {
    let recovered = cx.library.recover_moves(&args.path).await?;
    if cx.json {
        return print_json(&recovered);
    }
    if recovered.is_empty() {
        println!("  No interrupted moves found.");
    }
    for path in recovered {
        println!("  Recovered {}", path);
    }
    Ok(())
}

pub async fn handle_init(dir: Option<PathBuf>) -> Result<()> {
    let target = match dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    info!("Creating library at: {}", target.display());
    let library = Library::create(&target)
        .await
        .with_context(|| format!("Failed to create library at {}", target.display()))?;
    println!("  Library created at {}", library.root().display());
    Ok(())
}

// --- Helpers ---

/// Splits `key=value`. The value is read as JSON when it parses as JSON,
/// otherwise it is taken as a plain string.
pub fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected KEY=VALUE, got '{assignment}'"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("Missing key in '{assignment}'");
    }
    if !FrontMatter::is_valid_key(key) {
        bail!("Key '{key}' cannot be stored in front matter");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_report(report: &NormalizeReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    for path in &report.created_indexes {
        println!("  Created {}", path);
    }
    for path in &report.updated {
        println!("  Normalized {}", path);
    }
    for (path, error) in &report.failed {
        println!("  Failed {}: {}", path, error);
    }
    println!(
        "  {} index document(s) created, {} record(s) updated, {} unchanged, {} failed",
        report.created_indexes.len(),
        report.updated.len(),
        report.unchanged,
        report.failed.len()
    );
    Ok(())
}

fn print_tree(root: &TreeNode) {
    let mut stack = vec![(root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        let marker = match node.kind {
            NodeKind::Collection => node.icon.as_deref().unwrap_or("▸"),
            NodeKind::Record => "·",
        };
        println!("{}{} {}  ({})", "  ".repeat(depth), marker, node.title, display_path(&node.path));
        stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
    }
}

fn print_collection(view: &CollectionView) {
    let collection = &view.collection;
    match &collection.icon {
        Some(icon) => println!("{} {}", icon, collection.title),
        None => println!("{}", collection.title),
    }
    if let Some(description) = &collection.description {
        println!("{}", description);
    }

    if !collection.schema.is_empty() {
        println!();
        println!("  Schema:");
        for (name, field) in collection.schema.fields() {
            let required = if field.required { " (required)" } else { "" };
            println!("    {:20} {}{}", name, field.field_type(), required);
        }
    }

    println!();
    println!("  Members ({}):", view.members.len());
    print_records(&view.members);

    for relation in &view.relations {
        println!();
        println!(
            "  Relation '{}' -> {} ({} options)",
            relation.field,
            relation.path,
            relation.files.len()
        );
    }

    if !view.archived_members.is_empty() {
        println!();
        println!("  Archived ({}):", view.archived_members.len());
        print_records(&view.archived_members);
    }
}

fn print_records(records: &[Record]) {
    for record in records {
        println!("    {:20} {}", record.id(), record.label());
    }
}

fn describe_issue(issue: &FieldIssue) -> String {
    match issue {
        FieldIssue::MissingRequired { field } => format!("{field}: required value is missing"),
        FieldIssue::TypeMismatch { field, expected, found } => {
            format!("{field}: expected {expected}, found {found}")
        }
        FieldIssue::NotAnOption { field, value } => {
            format!("{field}: {value} is not an allowed option")
        }
        FieldIssue::DanglingRelation { field, value, path } => {
            format!("{field}: '{value}' does not exist in {}", display_path(path))
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}
