use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Internal directory at the library root, never listed as a collection.
pub const INTERNAL_DIR_NAME: &str = ".folio";
pub const CONFIG_FILENAME: &str = "config.json";

/// Reserved names and conventions of a library.
/// Stored in `.folio/config.json`; every field falls back to its default.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LibraryConfig {
    /// Version of the configuration format.
    pub version: u32,
    /// Document declaring a collection's schema, title, icon and description.
    pub index_file: String,
    /// Excluded from collection membership.
    pub readme_file: String,
    /// Directories whose name starts with this prefix are archives.
    /// Records are archived into a directory named exactly this.
    pub archive_prefix: String,
    /// Extension (without dot) of record files.
    pub extension: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            version: 1,
            index_file: "index.md".to_string(),
            readme_file: "README.md".to_string(),
            archive_prefix: "_".to_string(),
            extension: "md".to_string(),
        }
    }
}

impl LibraryConfig {
    /// Index and readme files are never records.
    pub fn is_reserved_file(&self, name: &str) -> bool {
        name == self.index_file || name.eq_ignore_ascii_case(&self.readme_file)
    }

    pub fn is_archive_dir(&self, name: &str) -> bool {
        name.starts_with(&self.archive_prefix)
    }

    /// Whether a file with this name is a record of its directory.
    pub fn is_record_file(&self, name: &str) -> bool {
        !is_hidden(name)
            && !self.is_reserved_file(name)
            && crate::path::extension(name) == Some(self.extension.as_str())
    }

    /// Whether a directory with this name takes part in listings and tree walks.
    pub fn is_collection_dir(&self, name: &str) -> bool {
        !is_hidden(name) && !self.is_archive_dir(name)
    }

    fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.archive_prefix.is_empty() {
            return Err("archive prefix must not be empty");
        }
        if self.index_file.is_empty() || self.extension.is_empty() {
            return Err("index file and extension must not be empty");
        }
        Ok(())
    }
}

/// Dot-files and dot-directories (including the internal directory).
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Reads the configuration file. A missing file is `Ok(None)`.
pub(crate) async fn read_config(path: &Path) -> Result<Option<LibraryConfig>> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No library config at {}, using defaults", path.display());
            return Ok(None);
        }
        Err(e) => {
            warn!("Failed to read library config file '{}': {}", path.display(), e);
            return Err(Error::InvalidConfig(path.to_path_buf()));
        }
    };

    let config: LibraryConfig = serde_json::from_slice(&content).map_err(|e| {
        warn!("Failed to parse library config file '{}': {}", path.display(), e);
        Error::InvalidConfig(path.to_path_buf())
    })?;
    config.validate().map_err(|reason| {
        warn!("Invalid library config file '{}': {}", path.display(), reason);
        Error::InvalidConfig(path.to_path_buf())
    })?;
    Ok(Some(config))
}

/// Serializes and writes the configuration file.
pub(crate) async fn write_config(path: &Path, config: &LibraryConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).await?;
    debug!("Library config written successfully to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reserved_and_record_names() {
        let config = LibraryConfig::default();
        assert!(config.is_reserved_file("index.md"));
        assert!(config.is_reserved_file("readme.md"));
        assert!(config.is_record_file("note.md"));
        assert!(!config.is_record_file("index.md"));
        assert!(!config.is_record_file(".draft.md"));
        assert!(!config.is_record_file("image.png"));
        assert!(config.is_archive_dir("_"));
        assert!(config.is_archive_dir("_old"));
        assert!(!config.is_collection_dir("_"));
        assert!(!config.is_collection_dir(INTERNAL_DIR_NAME));
        assert!(config.is_collection_dir("features"));
    }

    #[tokio::test]
    async fn missing_config_is_none() {
        let dir = tempdir().unwrap();
        let config = read_config(&dir.path().join(CONFIG_FILENAME)).await.unwrap();
        assert!(config.is_none());
    }

    #[tokio::test]
    async fn partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, r#"{"archivePrefix": "_archive"}"#).await.unwrap();
        let config = read_config(&path).await.unwrap().unwrap();
        assert_eq!(config.archive_prefix, "_archive");
        assert_eq!(config.index_file, "index.md");
    }

    #[tokio::test]
    async fn malformed_config_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "{ not json }").await.unwrap();
        assert!(matches!(read_config(&path).await, Err(Error::InvalidConfig(_))));

        fs::write(&path, r#"{"archivePrefix": ""}"#).await.unwrap();
        assert!(matches!(read_config(&path).await, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let config = LibraryConfig { extension: "markdown".into(), ..Default::default() };
        write_config(&path, &config).await.unwrap();
        assert_eq!(read_config(&path).await.unwrap(), Some(config));
    }
}
