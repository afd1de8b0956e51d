//! arbor - edit nested folder hierarchies against a flat folder backend.
//!
//! Usage:
//!   arbor tree [--folder ID] [--json]   Print the folder hierarchy
//!   arbor flatten [--folder ID]         List folders with depth and path
//!   arbor create FILE [--parent ID]     Create folders described in a JSON file
//!   arbor rename ID NAME                Rename a folder
//!   arbor delete ID [--policy POLICY]   Delete a folder
//!   arbor browse [--folder ID]          Pick folders to delete interactively

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use arbor_core::{
    BackendId, Category, ClientConfig, FolderNode, HierarchyLoader, NewFolder, NodeId, TreeModel,
    flatten,
};
use arbor_ops::{
    DeletePolicy, DeletionEvent, DeletionPlan, FolderBackend, HttpBackend, OperationType,
    ReconcileEvent, ReconcileOptions, ReconcileReport, Reconciler, create_nested,
    start_deletion, start_reconcile,
};
use arbor_tui::{BrowseOutcome, format_size};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "ARBOR_LOG";

#[derive(Parser)]
#[command(
    name = "arbor",
    version,
    about = "Edit nested folder hierarchies against a flat folder backend"
)]
struct Cli {
    /// Config file (defaults to <config dir>/arbor/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding config and ARBOR_BASE_URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Category for new folders that neither choose one nor inherit one
    #[arg(long, global = true)]
    category: Option<Category>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the folder hierarchy
    Tree {
        /// Only show the subfolders of this folder
        #[arg(short, long)]
        folder: Option<String>,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// List folders in pre-order with depth and path
    Flatten {
        /// Only list the subfolders of this folder
        #[arg(short, long)]
        folder: Option<String>,
    },

    /// Create the folders described in a JSON file
    Create {
        /// JSON file with a folder or a list of folders
        file: PathBuf,

        /// Create the new folders under this existing folder
        #[arg(short, long, conflicts_with = "nested")]
        parent: Option<String>,

        /// Use the single-call nested create (one new root only)
        #[arg(long)]
        nested: bool,
    },

    /// Rename a folder
    Rename {
        /// Backend id of the folder
        id: String,

        /// New name
        name: String,
    },

    /// Delete a folder
    Delete {
        /// Backend id of the folder
        id: String,

        /// What to delete
        #[arg(short, long, default_value = "subtree")]
        policy: PolicyArg,

        /// Execute instead of only printing the plan
        #[arg(short, long)]
        yes: bool,
    },

    /// Browse the hierarchy and pick folders to delete
    Browse {
        /// Only browse the subfolders of this folder
        #[arg(short, long)]
        folder: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// The folder and everything beneath it
    Subtree,
    /// Only the folder; its subfolders move up
    NodeOnly,
}

/// A folder as written in a `create` input file.
#[derive(Debug, Deserialize)]
struct FolderInput {
    name: String,
    #[serde(default)]
    category: Option<Category>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "subfolders")]
    children: Vec<FolderInput>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FolderFile {
    Many(Vec<FolderInput>),
    One(FolderInput),
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = ClientConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
        config.validate()?;
    }
    if let Some(category) = cli.category {
        config.default_category = category;
    }

    let backend = Arc::new(HttpBackend::new(config.clone())?);
    let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    match cli.command {
        Command::Tree { folder, json } => {
            let model = rt.block_on(load_model(backend.as_ref(), &config, folder.as_deref()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&model.to_tree_nodes()?)?);
            } else {
                print_tree(&model);
            }
        }
        Command::Flatten { folder } => {
            let model = rt.block_on(load_model(backend.as_ref(), &config, folder.as_deref()))?;
            for entry in flatten(&model) {
                println!(
                    "{:>2} {:<12} {}{}",
                    entry.depth,
                    entry.path.encode(),
                    "  ".repeat(entry.depth),
                    entry.name
                );
            }
        }
        Command::Create {
            file,
            parent,
            nested,
        } => {
            let inputs = read_folder_file(&file)?;
            rt.block_on(run_create(backend, &config, inputs, parent, nested))?;
        }
        Command::Rename { id, name } => {
            rt.block_on(run_rename(backend.as_ref(), &config, &id, &name))?;
        }
        Command::Delete { id, policy, yes } => {
            rt.block_on(run_delete(backend, &config, &id, policy, yes))?;
        }
        Command::Browse { folder } => {
            let model = rt.block_on(load_model(backend.as_ref(), &config, folder.as_deref()))?;
            let title = folder.as_deref().unwrap_or("folders").to_string();
            if let BrowseOutcome::Delete(ids) = arbor_tui::run(model.clone(), &title)? {
                rt.block_on(execute_deletion(
                    backend,
                    model,
                    DeletePolicy::Selected(ids),
                ))?;
            }
        }
    }

    Ok(())
}

/// Install the stderr log subscriber.
fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Fetch the whole hierarchy, or one folder's subfolders, as a raw payload.
async fn fetch_payload<B: FolderBackend + ?Sized>(
    backend: &B,
    folder: Option<&str>,
) -> Result<serde_json::Value> {
    match folder {
        Some(id) => backend
            .subfolders(&BackendId::from(id))
            .await
            .with_context(|| format!("Failed to fetch subfolders of {id}")),
        None => backend
            .hierarchy()
            .await
            .context("Failed to fetch folder hierarchy"),
    }
}

/// Fetch and load the whole hierarchy, or one folder's subfolders.
async fn load_model<B: FolderBackend + ?Sized>(
    backend: &B,
    config: &ClientConfig,
    folder: Option<&str>,
) -> Result<TreeModel> {
    let payload = fetch_payload(backend, folder).await?;
    let loaded = HierarchyLoader::new(config.default_category).load_or_empty(&payload);
    tracing::debug!(folders = loaded.model.len(), "loaded hierarchy");
    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning.message);
    }
    Ok(loaded.model)
}

impl FolderFile {
    fn into_inputs(self) -> Vec<FolderInput> {
        match self {
            FolderFile::Many(inputs) => inputs,
            FolderFile::One(input) => vec![input],
        }
    }
}

/// Read a `create` input file.
fn read_folder_file(path: &Path) -> Result<Vec<FolderInput>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: FolderFile = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid folder file {}", path.display()))?;
    Ok(file.into_inputs())
}

/// Add the input folders to the root array of `model`, checking every one
/// against its siblings. Returns the new top-level folders.
fn graft_folders(model: &mut TreeModel, inputs: Vec<FolderInput>) -> Result<Vec<NodeId>> {
    let mut added = Vec::new();
    let mut stack: Vec<(Option<NodeId>, FolderInput)> =
        inputs.into_iter().rev().map(|input| (None, input)).collect();
    while let Some((parent, input)) = stack.pop() {
        let mut folder = NewFolder::named(input.name.as_str());
        if let Some(category) = input.category {
            folder = folder.with_category(category);
        }
        if let Some(description) = input.description {
            folder = folder.with_description(description);
        }
        let id = model
            .insert_under(parent, folder)
            .with_context(|| format!("Cannot add folder '{}'", input.name))?;
        if parent.is_none() {
            added.push(id);
        }
        stack.extend(input.children.into_iter().rev().map(|child| (Some(id), child)));
    }
    Ok(added)
}

/// Create the input folders under `parent`, or at the top level.
///
/// The folders already stored there are loaded first so a name clash is
/// rejected before anything is sent.
async fn run_create<B>(
    backend: Arc<B>,
    config: &ClientConfig,
    inputs: Vec<FolderInput>,
    parent: Option<String>,
    nested: bool,
) -> Result<ReconcileReport>
where
    B: FolderBackend + ?Sized + 'static,
{
    if inputs.is_empty() {
        bail!("No folders to create");
    }

    let payload = fetch_payload(backend.as_ref(), parent.as_deref()).await?;
    let mut existing = HierarchyLoader::new(config.default_category)
        .load(&payload)
        .context("Cannot check the existing folders")?
        .model;
    let added = graft_folders(&mut existing, inputs)?;
    let subtrees = added
        .iter()
        .map(|id| existing.subtree(*id))
        .collect::<Result<Vec<_>, _>>()?;
    let mut model = TreeModel::from_tree_nodes(subtrees, config.default_category)?;

    if nested {
        let mut report = create_nested(backend.as_ref(), &mut model)
            .await
            .context("Could not create folders")?;
        println!("Created {} folders", report.created);
        let pending = model.stats().pending;
        if pending > 0 {
            let options = ReconcileOptions {
                skip_unchanged_updates: true,
            };
            let rest = Reconciler::new(backend.as_ref())
                .with_options(options)
                .run(&mut model, None)
                .await
                .context("Could not create remaining folders")?;
            println!("Created {} more folders individually", rest.created);
            report.created += rest.created;
        }
        return Ok(report);
    }

    let parent = parent.map(BackendId::new);
    let mut rx = start_reconcile(backend, model, parent, ReconcileOptions::from(config));
    while let Some(event) = rx.recv().await {
        match event {
            ReconcileEvent::Progress(progress) => {
                if let Some(current) = &progress.current {
                    eprintln!(
                        "[{}/{}] {current}",
                        progress.items_completed + 1,
                        progress.items_total
                    );
                }
            }
            ReconcileEvent::Complete { model, result } => {
                return match result {
                    Ok(report) => {
                        println!(
                            "{}",
                            report
                                .clone()
                                .into_complete(OperationType::Reconcile)
                                .summary()
                        );
                        print_tree(&model);
                        Ok(report)
                    }
                    Err(e) => {
                        eprintln!("{}", e.to_complete().summary());
                        Err(eyre!(e).wrap_err("Could not save changes"))
                    }
                };
            }
        }
    }
    bail!("Reconciliation ended without a result")
}

async fn run_rename(
    backend: &HttpBackend,
    config: &ClientConfig,
    id: &str,
    name: &str,
) -> Result<()> {
    let mut model = load_model(backend, config, None).await?;
    let backend_id = BackendId::from(id);
    let node = model
        .find_by_backend_id(&backend_id)
        .ok_or_else(|| eyre!("Folder {id} not found"))?;
    model.rename(node, name)?;

    let options = ReconcileOptions {
        skip_unchanged_updates: true,
    };
    let report = Reconciler::new(backend)
        .with_options(options)
        .run(&mut model, None)
        .await
        .context("Could not save changes")?;
    println!("Renamed {id} to '{name}' ({} folder updated)", report.updated);
    Ok(())
}

async fn run_delete(
    backend: Arc<HttpBackend>,
    config: &ClientConfig,
    id: &str,
    policy: PolicyArg,
    yes: bool,
) -> Result<()> {
    let model = load_model(backend.as_ref(), config, None).await?;
    let node = model
        .find_by_backend_id(&BackendId::from(id))
        .ok_or_else(|| eyre!("Folder {id} not found"))?;
    let policy = match policy {
        PolicyArg::Subtree => DeletePolicy::Subtree(node),
        PolicyArg::NodeOnly => DeletePolicy::NodeOnly(node),
    };

    if !yes {
        let plan = DeletionPlan::build(&model, policy)?;
        println!("Would delete {} folders, in this order:", plan.len());
        for target in plan.targets() {
            println!("  {}{}", "  ".repeat(target.depth), target.name);
        }
        println!("Re-run with --yes to delete.");
        return Ok(());
    }

    execute_deletion(backend, model, policy).await
}

async fn execute_deletion(
    backend: Arc<HttpBackend>,
    mut model: TreeModel,
    policy: DeletePolicy,
) -> Result<()> {
    let plan = DeletionPlan::build(&model, policy)?;
    let mut rx = start_deletion(backend, plan.clone());
    while let Some(event) = rx.recv().await {
        match event {
            DeletionEvent::Progress(progress) => {
                if let Some(current) = &progress.current {
                    eprintln!(
                        "[{}/{}] deleting {current}",
                        progress.items_completed + 1,
                        progress.items_total
                    );
                }
            }
            DeletionEvent::Complete(result) => {
                let deleted = match &result {
                    Ok(report) => report.deleted.clone(),
                    Err(e) => e.deleted().to_vec(),
                };
                plan.apply_to_model(&mut model, &deleted)?;
                return match result {
                    Ok(report) => {
                        println!("{}", report.into_complete().summary());
                        print_tree(&model);
                        Ok(())
                    }
                    Err(e) => {
                        eprintln!("{}", e.to_complete().summary());
                        Err(eyre!(e).wrap_err("Deletion stopped"))
                    }
                };
            }
        }
    }
    bail!("Deletion ended without a result")
}

/// Print the model as an indented tree.
fn print_tree(model: &TreeModel) {
    let stats = model.stats();
    println!("{}", "─".repeat(60));
    println!(
        " {} folders ({} saved, {} unsaved), {} files, {}",
        stats.total_folders,
        stats.persisted,
        stats.pending,
        stats.total_files,
        format_size(stats.total_file_bytes)
    );
    println!("{}", "─".repeat(60));

    for entry in flatten(model) {
        if let Some(node) = model.node(entry.id) {
            print_node(node, entry.depth);
        }
    }
}

fn print_node(node: &FolderNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let marker = if node.children.is_empty() { "  " } else { "▼ " };
    let id = node
        .backend_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "(new)".to_string());
    println!(
        "{}{}{:<40} {:<10} {:>10} {}",
        indent,
        marker,
        truncate(&node.name, 40),
        node.category.to_string(),
        format_size(node.file_bytes),
        id
    );
}

/// Truncate a string to `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{kept}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_ops::{BackendCall, FolderRecord, MemoryBackend};

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::parse_from(["arbor", "delete", "abc", "--policy", "node-only"]);
        assert!(matches!(
            cli.command,
            Command::Delete {
                policy: PolicyArg::NodeOnly,
                yes: false,
                ..
            }
        ));
    }

    fn folder_inputs(value: serde_json::Value) -> Vec<FolderInput> {
        serde_json::from_value::<FolderFile>(value).unwrap().into_inputs()
    }

    /// `Projects > 2024` already stored on the backend.
    fn stored_backend() -> Arc<MemoryBackend> {
        Arc::new(MemoryBackend::with_records(vec![
            FolderRecord::new("p", "Projects"),
            FolderRecord::new("y24", "2024").with_parent("p"),
        ]))
    }

    fn creates(calls: &[BackendCall]) -> usize {
        calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    BackendCall::Create { .. } | BackendCall::CreateNested { .. }
                )
            })
            .count()
    }

    #[test]
    fn test_folder_file_inherits_categories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folders.json");
        std::fs::write(
            &path,
            r#"{ "name": "Work", "category": "projects",
                 "subfolders": [{ "name": "Specs" }, { "name": "Notes", "category": "documents" }] }"#,
        )
        .unwrap();

        let mut model = TreeModel::new();
        let added = graft_folders(&mut model, read_folder_file(&path).unwrap()).unwrap();
        assert_eq!(added.len(), 1);
        let categories: Vec<_> = model
            .iter_preorder()
            .map(|id| model.get(id).unwrap().category)
            .collect();
        assert_eq!(
            categories,
            [Category::Projects, Category::Projects, Category::Documents]
        );
    }

    #[test]
    fn test_folder_file_rejects_duplicates() {
        let mut model = TreeModel::new();
        let inputs = folder_inputs(serde_json::json!([{ "name": "A" }, { "name": "a" }]));
        assert!(graft_folders(&mut model, inputs).is_err());
    }

    #[tokio::test]
    async fn test_create_rejects_stored_sibling() {
        let backend = stored_backend();
        let err = run_create(
            backend.clone(),
            &ClientConfig::default(),
            folder_inputs(serde_json::json!({ "name": "2024" })),
            Some("p".to_string()),
            false,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("2024"));
        assert_eq!(creates(&backend.calls().await), 0);
        assert_eq!(backend.records().await.len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_stored_top_level_folder() {
        let backend = stored_backend();
        for nested in [false, true] {
            let result = run_create(
                backend.clone(),
                &ClientConfig::default(),
                folder_inputs(serde_json::json!({ "name": "projects" })),
                None,
                nested,
            )
            .await;
            assert!(result.is_err());
        }
        assert_eq!(creates(&backend.calls().await), 0);
    }

    #[tokio::test]
    async fn test_create_under_parent_only_writes_new_folders() {
        let backend = stored_backend();
        let report = run_create(
            backend.clone(),
            &ClientConfig::default(),
            folder_inputs(serde_json::json!({ "name": "2025", "children": [{ "name": "Q1" }] })),
            Some("p".to_string()),
            false,
        )
        .await
        .unwrap();
        assert_eq!((report.created, report.updated), (2, 0));

        let calls = backend.calls().await;
        assert!(!calls.iter().any(|call| matches!(call, BackendCall::Update { .. })));
        let records = backend.records().await;
        let y25 = records.iter().find(|r| r.name == "2025").unwrap();
        assert_eq!(y25.parent_folder, Some(BackendId::from("p")));
        let q1 = records.iter().find(|r| r.name == "Q1").unwrap();
        assert_eq!(q1.parent_folder, Some(y25.id.clone()));
    }

    #[tokio::test]
    async fn test_nested_create_of_new_root() {
        let backend = stored_backend();
        let report = run_create(
            backend.clone(),
            &ClientConfig::default(),
            folder_inputs(serde_json::json!({ "name": "Work", "children": [{ "name": "Specs" }] })),
            None,
            true,
        )
        .await
        .unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(backend.records().await.len(), 4);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer name", 5), "a lo…");
    }
}
