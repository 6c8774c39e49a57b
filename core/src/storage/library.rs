use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::fs;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::markdown::FrontMatter;
use crate::path;
use crate::schema::FieldIssue;
use crate::storage::config::{self, CONFIG_FILENAME, INTERNAL_DIR_NAME, LibraryConfig};
use crate::storage::{FileStore, Record};

/// A directory tree of collections and records.
///
/// This is the entry point of the engine: every operation the surrounding
/// application needs (reading and writing records, collections, archiving,
/// tree indexing) is a method on `Library`. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Library {
    store: FileStore,
    config: Arc<LibraryConfig>,
}

impl Library {
    /// Opens the directory at `path` as a library.
    ///
    /// Reads `.folio/config.json` if present; otherwise the default reserved
    /// names apply.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Library> {
        let store = FileStore::open(path).await?;
        let config_path = store.root().join(INTERNAL_DIR_NAME).join(CONFIG_FILENAME);
        let config = config::read_config(&config_path).await?.unwrap_or_default();
        debug!("Library opened successfully");
        Ok(Library { store, config: Arc::new(config) })
    }

    /// Creates a library at `path` with a fresh configuration file.
    ///
    /// The directory may already exist and hold documents; it must not be a
    /// library already.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn create(path: impl AsRef<Path>) -> Result<Library> {
        let path = path.as_ref();
        match fs::metadata(path).await {
            Ok(meta) if !meta.is_dir() => {
                return Err(Error::NotADirectory(path.display().to_string()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(path).await?;
            }
            Err(e) => return Err(Error::Io(e)),
        }

        let internal_dir = path.join(INTERNAL_DIR_NAME);
        if fs::try_exists(&internal_dir).await? {
            debug!("Library creation failed: internal directory already exists");
            return Err(Error::Conflict(internal_dir.display().to_string()));
        }
        fs::create_dir(&internal_dir).await?;
        config::write_config(&internal_dir.join(CONFIG_FILENAME), &LibraryConfig::default()).await?;

        debug!("Library created successfully");
        Library::open(path).await
    }

    /// Absolute path of the library root.
    pub fn root(&self) -> &Path {
        self.store.root()
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    #[instrument(skip(self))]
    pub async fn read_record(&self, path: &str) -> Result<Record> {
        let path = self.record_path(path)?;
        let text = self.store.read_to_string(&path).await?;
        Ok(Record::from_text(&path, &text))
    }

    /// Writes a record.
    ///
    /// `front_matter` is merged over the stored front matter (if the record
    /// exists), the result is normalized against the collection's schema, and
    /// `body` replaces the stored body. Keys that would not read back
    /// unchanged are rejected before anything is written.
    #[instrument(skip(self, body, front_matter))]
    pub async fn write_record(
        &self,
        path: &str,
        body: &str,
        front_matter: FrontMatter,
    ) -> Result<Record> {
        let path = self.record_path(path)?;
        front_matter.check_keys()?;

        let mut merged = if self.store.exists(&path).await? {
            let existing = self.store.read_to_string(&path).await?;
            Record::from_text(&path, &existing).front_matter().clone()
        } else {
            FrontMatter::new()
        };
        merged.merge(front_matter);

        let schema = self.schema_of(path::dirname(&path)).await?;
        let (normalized, _) = schema.normalize(&merged);

        let record = Record::new(&path, normalized, body);
        self.store.write(&path, &record.render()).await?;
        debug!("Record written");
        Ok(record)
    }

    /// Persists a record value as it is, without merging or normalizing.
    #[instrument(skip(self, record), fields(path = record.path()))]
    pub async fn save_record(&self, record: &Record) -> Result<()> {
        let path = self.record_path(record.path())?;
        self.store.write(&path, &record.render()).await
    }

    #[instrument(skip(self))]
    pub async fn delete_record(&self, path: &str) -> Result<()> {
        let path = self.record_path(path)?;
        self.store.delete(&path).await
    }

    /// Checks a record against its collection's schema, including whether its
    /// relation values point at existing records.
    #[instrument(skip(self))]
    pub async fn validate_record(&self, path: &str) -> Result<Vec<FieldIssue>> {
        let record = self.read_record(path).await?;
        let schema = self.schema_of(record.collection_path()).await?;
        let mut issues = schema.validate(record.front_matter());

        for relation in self.resolve_relations(&schema).await? {
            let ids: Vec<&str> = match record.front_matter().get(&relation.field) {
                Some(Value::String(id)) => vec![id.as_str()],
                Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            for id in ids {
                if !relation.files.iter().any(|option| option.value == id) {
                    issues.push(FieldIssue::DanglingRelation {
                        field: relation.field.clone(),
                        value: id.to_string(),
                        path: relation.path.clone(),
                    });
                }
            }
        }
        Ok(issues)
    }

    /// Normalizes a record path and checks that it names a record file.
    pub(crate) fn record_path(&self, path: &str) -> Result<String> {
        let normalized =
            path::normalize(path).ok_or_else(|| Error::PathViolation(path.to_string()))?;
        let name = path::basename(&normalized);
        if name.is_empty() {
            return Err(Error::InvalidPath(path.to_string()));
        }
        if path::segments(&normalized).any(config::is_hidden)
            || self.config.is_reserved_file(name)
        {
            return Err(Error::ReservedName(path.to_string()));
        }
        if path::extension(name) != Some(self.config.extension.as_str()) {
            return Err(Error::InvalidPath(format!(
                "{path} (records must have the '.{}' extension)",
                self.config.extension
            )));
        }
        Ok(normalized)
    }

    /// Normalizes a collection path.
    pub(crate) fn collection_path(&self, path: &str) -> Result<String> {
        path::normalize(path).ok_or_else(|| Error::PathViolation(path.to_string()))
    }

    /// Display name of a collection: its directory name, or the root's.
    pub(crate) fn dir_name(&self, path: &str) -> String {
        match path::basename(path) {
            "" => self
                .root()
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string(),
            name => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_then_open() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("lib");
        let created = Library::create(&root).await.unwrap();
        assert!(root.join(INTERNAL_DIR_NAME).join(CONFIG_FILENAME).is_file());
        assert_eq!(created.config(), &LibraryConfig::default());

        assert!(matches!(Library::create(&root).await, Err(Error::Conflict(_))));
        let opened = Library::open(&root).await.unwrap();
        assert_eq!(opened.root(), created.root());
    }

    #[tokio::test]
    async fn open_without_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let library = Library::open(dir.path()).await.unwrap();
        assert_eq!(library.config().index_file, "index.md");
    }

    #[tokio::test]
    async fn record_paths_are_checked() {
        let dir = tempdir().unwrap();
        let library = Library::open(dir.path()).await.unwrap();
        assert!(matches!(library.record_path("../x.md"), Err(Error::PathViolation(_))));
        assert!(matches!(library.record_path("a/index.md"), Err(Error::ReservedName(_))));
        assert!(matches!(library.record_path("a/README.md"), Err(Error::ReservedName(_))));
        assert!(matches!(library.record_path(".folio/x.md"), Err(Error::ReservedName(_))));
        assert!(matches!(library.record_path("a/b.txt"), Err(Error::InvalidPath(_))));
        assert_eq!(library.record_path("a/./b.md").unwrap(), "a/b.md");
    }

    #[tokio::test]
    async fn write_merges_and_normalizes() {
        let dir = tempdir().unwrap();
        let library = Library::open(dir.path()).await.unwrap();
        library
            .store()
            .write(
                "tasks/index.md",
                "---\nschema: {\"done\":{\"type\":\"boolean\"}}\n---\n# Tasks\n",
            )
            .await
            .unwrap();

        let mut first = FrontMatter::new();
        first.insert("owner", json!("ann"));
        first.insert("done", json!("1"));
        library.write_record("tasks/t1.md", "# One\n", first).await.unwrap();

        let mut second = FrontMatter::new();
        second.insert("priority", json!(2));
        let record = library.write_record("tasks/t1.md", "# One again\n", second).await.unwrap();

        assert_eq!(record.front_matter().get("owner"), Some(&json!("ann")));
        assert_eq!(record.front_matter().get("done"), Some(&json!(true)));
        assert_eq!(record.front_matter().get("priority"), Some(&json!(2)));
        assert_eq!(record.title(), "One again");
        assert_eq!(library.read_record("tasks/t1.md").await.unwrap(), record);
    }

    #[tokio::test]
    async fn write_rejects_keys_that_do_not_read_back() {
        let dir = tempdir().unwrap();
        let library = Library::open(dir.path()).await.unwrap();

        let mut front_matter = FrontMatter::new();
        front_matter.insert("a:b", json!("x"));
        let result = library.write_record("n.md", "# N\n", front_matter).await;
        assert!(matches!(result, Err(Error::InvalidKey(key)) if key == "a:b"));
        assert!(!library.store().exists("n.md").await.unwrap());

        let mut front_matter = FrontMatter::new();
        front_matter.insert(" padded", json!("x"));
        let result = library.write_record("n.md", "# N\n", front_matter).await;
        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }

    #[tokio::test]
    async fn delete_record_removes_file() {
        let dir = tempdir().unwrap();
        let library = Library::open(dir.path()).await.unwrap();
        library.write_record("n.md", "# N\n", FrontMatter::new()).await.unwrap();
        library.delete_record("n.md").await.unwrap();
        assert!(matches!(library.read_record("n.md").await, Err(Error::FileNotFound(_))));
    }
}
