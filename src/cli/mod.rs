//! Command-line interface for h5p-content.
//!
//! Provides commands for importing staged packages and inspecting or
//! removing stored content, backed by the filesystem storage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::{self, ImportSettings, ResolvedConfig};
use crate::domain::{ContentId, User};
use crate::manager::ContentManager;
use crate::storage::FileContentStorage;

/// h5p-content - Store and import H5P content packages
#[derive(Parser, Debug)]
#[command(name = "h5p-content")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// User id the commands act as
    #[arg(short, long, global = true, env = "H5P_CONTENT_USER", default_value = "local")]
    pub user: String,

    /// Storage root (overrides configuration)
    #[arg(short, long, global = true)]
    pub storage: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a staged package directory
    Import {
        /// Package directory (h5p.json + content/)
        package_dir: PathBuf,

        /// Use this content id instead of allocating one
        #[arg(long)]
        content_id: Option<String>,
    },

    /// Show metadata of a content object
    Show {
        /// Content ID
        content_id: String,

        /// Print the full h5p.json and content.json
        #[arg(short, long)]
        full: bool,
    },

    /// List auxiliary files of a content object
    Files {
        /// Content ID
        content_id: String,
    },

    /// Write one content file to stdout
    Cat {
        /// Content ID
        content_id: String,

        /// Path of the file inside the content object
        path: String,
    },

    /// Delete a content object
    Delete {
        /// Content ID
        content_id: String,
    },

    /// List stored content objects
    List,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let user = User::new(self.user.clone(), self.user.clone());

        match self.command {
            Commands::Import {
                package_dir,
                content_id,
            } => {
                let manager = open_manager(self.storage).await?;
                import_package(&manager, &package_dir, content_id, &user).await
            }
            Commands::Show { content_id, full } => {
                let manager = open_manager(self.storage).await?;
                show_content(&manager, &ContentId::new(content_id), full, &user).await
            }
            Commands::Files { content_id } => {
                let manager = open_manager(self.storage).await?;
                list_files(&manager, &ContentId::new(content_id), &user).await
            }
            Commands::Cat { content_id, path } => {
                let manager = open_manager(self.storage).await?;
                cat_file(&manager, &ContentId::new(content_id), &path, &user).await
            }
            Commands::Delete { content_id } => {
                let manager = open_manager(self.storage).await?;
                delete_content(&manager, &ContentId::new(content_id)).await
            }
            Commands::List => {
                let manager = open_manager(self.storage).await?;
                list_content(&manager, &user).await
            }
            Commands::Config => show_config(self.storage),
        }
    }
}

/// Build a manager over the configured (or overridden) storage root
async fn open_manager(storage_override: Option<PathBuf>) -> Result<ContentManager> {
    let (root, settings) = storage_target(storage_override, config::config())?;

    let storage = FileContentStorage::open(&root)
        .await
        .with_context(|| format!("Failed to open storage: {}", root.display()))?;

    Ok(ContentManager::with_settings(Arc::new(storage), settings))
}

/// Storage root and import settings; configuration is only required
/// when no storage override is given
fn storage_target(
    storage_override: Option<PathBuf>,
    cfg: Result<&ResolvedConfig>,
) -> Result<(PathBuf, ImportSettings)> {
    match (storage_override, cfg) {
        (Some(root), Ok(cfg)) => Ok((root, cfg.import.clone())),
        (Some(root), Err(e)) => {
            debug!(error = %e, "Configuration unavailable, using default import settings");
            Ok((root, ImportSettings::default()))
        }
        (None, cfg) => {
            let cfg = cfg?;
            Ok((cfg.storage.clone(), cfg.import.clone()))
        }
    }
}

/// Import a staged package
async fn import_package(
    manager: &ContentManager,
    package_dir: &Path,
    content_id: Option<String>,
    user: &User,
) -> Result<()> {
    let id = manager
        .copy_content_from_directory(package_dir, user, content_id.map(ContentId::new))
        .await
        .with_context(|| format!("Failed to import package: {}", package_dir.display()))?;

    println!("{}", id);
    eprintln!("Imported {} as {}", package_dir.display(), id);
    Ok(())
}

/// Show metadata of a content object
async fn show_content(
    manager: &ContentManager,
    content_id: &ContentId,
    full: bool,
    user: &User,
) -> Result<()> {
    let metadata = manager.load_h5p_json(content_id, user).await?;
    let files = manager.get_content_files(content_id, user).await?;
    let permissions = manager.get_user_permissions(content_id, user).await?;

    println!("Content ID:   {}", content_id);
    println!("Title:        {}", metadata.title().unwrap_or("(untitled)"));
    println!("Main library: {}", metadata.main_library().unwrap_or("-"));
    println!("Language:     {}", metadata.language().unwrap_or("-"));
    println!("License:      {}", metadata.license().unwrap_or("-"));
    if !metadata.embed_types().is_empty() {
        println!("Embed types:  {}", metadata.embed_types().join(", "));
    }
    println!("Files:        {}", files.len());

    let mut permissions: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
    permissions.sort();
    println!("Permissions:  {}", permissions.join(", "));

    if full {
        let parameters = manager.load_content(content_id, user).await?;
        println!("\n--- h5p.json ---");
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        println!("\n--- content.json ---");
        println!("{}", serde_json::to_string_pretty(&parameters)?);
    }

    Ok(())
}

/// List auxiliary files of a content object
async fn list_files(manager: &ContentManager, content_id: &ContentId, user: &User) -> Result<()> {
    let mut files = manager.get_content_files(content_id, user).await?;
    files.sort();

    if files.is_empty() {
        eprintln!("No auxiliary files in {}", content_id);
        return Ok(());
    }

    for file in files {
        println!("{}", file);
    }
    Ok(())
}

/// Copy one content file to stdout
async fn cat_file(
    manager: &ContentManager,
    content_id: &ContentId,
    path: &str,
    user: &User,
) -> Result<()> {
    let mut stream = manager.get_content_file_stream(content_id, path, user).await?;
    let mut stdout = tokio::io::stdout();

    tokio::io::copy(&mut stream, &mut stdout)
        .await
        .with_context(|| format!("Failed to write {} to stdout", path))?;
    stdout.flush().await?;
    Ok(())
}

/// Delete a content object
async fn delete_content(manager: &ContentManager, content_id: &ContentId) -> Result<()> {
    if !manager.content_exists(content_id).await? {
        anyhow::bail!("Content not found: {}", content_id);
    }

    manager.delete_content(content_id).await?;
    eprintln!("Deleted {}", content_id);
    Ok(())
}

/// List stored content objects
async fn list_content(manager: &ContentManager, user: &User) -> Result<()> {
    let ids = manager.list_content().await?;

    if ids.is_empty() {
        eprintln!("No content stored");
        return Ok(());
    }

    for id in ids {
        let title = match manager.load_h5p_json(&id, user).await {
            Ok(metadata) => metadata.title().unwrap_or("(untitled)").to_string(),
            Err(e) => format!("(unreadable: {})", e),
        };
        println!("{}  {}", id, title);
    }
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config(storage_override: Option<PathBuf>) -> Result<()> {
    let cfg = config::reload_config()?;

    let config_file = cfg
        .config_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none - using defaults)".to_string());
    println!("Config file: {}", config_file);
    println!();
    println!("Paths:");
    println!("  Home:    {}", cfg.home.display());
    println!("  Storage: {}", cfg.storage.display());
    if let Some(root) = storage_override {
        println!("  Storage (--storage override): {}", root.display());
    }
    println!();
    println!("Import:");
    match cfg.import.max_concurrent_copies {
        Some(limit) if limit > 0 => println!("  Max concurrent copies: {}", limit),
        _ => println!("  Max concurrent copies: unbounded"),
    }
    if cfg.import.ignore_patterns.is_empty() {
        println!("  Ignore patterns:       (none)");
    } else {
        println!("  Ignore patterns:       {}", cfg.import.ignore_patterns.join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_with_content_id() {
        let cli = Cli::try_parse_from([
            "h5p-content",
            "--user",
            "alice",
            "import",
            "./pkg",
            "--content-id",
            "42",
        ])
        .unwrap();

        assert_eq!(cli.user, "alice");
        match cli.command {
            Commands::Import {
                package_dir,
                content_id,
            } => {
                assert_eq!(package_dir, PathBuf::from("./pkg"));
                assert_eq!(content_id, Some("42".to_string()));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_storage_after_subcommand() {
        let cli = Cli::try_parse_from(["h5p-content", "files", "abc", "--storage", "/tmp/objects"])
            .unwrap();
        assert_eq!(cli.storage, Some(PathBuf::from("/tmp/objects")));
        assert!(matches!(cli.command, Commands::Files { .. }));
    }

    #[test]
    fn test_storage_override_does_not_require_config() {
        let (root, settings) = storage_target(
            Some(PathBuf::from("/tmp/objects")),
            Err(anyhow::anyhow!("Failed to determine home directory")),
        )
        .unwrap();

        assert_eq!(root, PathBuf::from("/tmp/objects"));
        assert_eq!(settings, ImportSettings::default());
    }

    #[test]
    fn test_storage_target_from_config() {
        let cfg = ResolvedConfig {
            home: PathBuf::from("/home/u/.h5p-content"),
            storage: PathBuf::from("/srv/content"),
            config_file: None,
            import: ImportSettings {
                max_concurrent_copies: Some(4),
                ignore_patterns: vec!["*.tmp".to_string()],
            },
        };

        let (root, settings) = storage_target(None, Ok(&cfg)).unwrap();
        assert_eq!(root, PathBuf::from("/srv/content"));
        assert_eq!(settings, cfg.import);

        let (root, settings) = storage_target(Some(PathBuf::from("/tmp/objects")), Ok(&cfg)).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/objects"));
        assert_eq!(settings.max_concurrent_copies, Some(4));

        assert!(storage_target(None, Err(anyhow::anyhow!("no home"))).is_err());
    }
}
