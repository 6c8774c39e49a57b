use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::markdown::{self, Document, FrontMatter};
use crate::path;
use crate::schema::{SCHEMA_KEY, Schema};
use crate::storage::file::EntryKind;
use crate::storage::{Library, Record, Relation};

/// A directory of records sharing a schema.
///
/// Title, icon, description and schema come from the directory's index
/// document. A directory without an index document is still a collection,
/// with an empty schema and its directory name as title.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub path: String,
    pub title: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub schema: Schema,
    /// Whether the index document exists.
    pub has_index: bool,
}

/// Everything a collection page needs in one read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    pub collection: Collection,
    pub members: Vec<Record>,
    pub relations: Vec<Relation>,
    pub archived_members: Vec<Record>,
}

/// Changes to a collection's index document. `None` leaves a value as is.
#[derive(Debug, Clone, Default)]
pub struct CollectionMetaUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub schema: Option<Schema>,
}

/// Outcome of a normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    /// Index documents generated for directories that had none.
    pub created_indexes: Vec<String>,
    /// Records whose front matter was rewritten.
    pub updated: Vec<String>,
    /// Records that already matched their schema.
    pub unchanged: usize,
    /// Records that could not be read or written, with the error.
    pub failed: Vec<(String, String)>,
}

impl NormalizeReport {
    pub(crate) fn absorb(&mut self, other: NormalizeReport) {
        self.created_indexes.extend(other.created_indexes);
        self.updated.extend(other.updated);
        self.unchanged += other.unchanged;
        self.failed.extend(other.failed);
    }
}

impl Library {
    /// Reads a collection's metadata and schema.
    ///
    /// A missing or unreadable index document is tolerated; the collection then
    /// has an empty schema and falls back to its directory name.
    #[instrument(skip(self))]
    pub async fn collection(&self, path: &str) -> Result<Collection> {
        let path = self.collection_path(path)?;
        if !self.store().is_dir(&path).await? {
            return Err(Error::DirectoryNotFound(path));
        }

        let index = self.read_index(&path).await?;
        let (front_matter, body) = match &index {
            Some(doc) => (doc.front_matter_or_default(), doc.body.as_str()),
            None => (FrontMatter::new(), ""),
        };

        let title = front_matter
            .get_str("title")
            .map(str::to_string)
            .or_else(|| Some(markdown::title(body)).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| self.dir_name(&path));

        Ok(Collection {
            title,
            icon: front_matter.get_str("icon").map(str::to_string),
            description: front_matter
                .get_str("description")
                .map(str::to_string)
                .or_else(|| markdown::description(body)),
            schema: Schema::from_front_matter(&front_matter),
            has_index: index.is_some(),
            path,
        })
    }

    /// Strict form of [`collection`](Self::collection): the index document must
    /// exist, carry front matter, and have a title.
    #[instrument(skip(self))]
    pub async fn read_collection_meta(&self, path: &str) -> Result<Collection> {
        let path = self.collection_path(path)?;
        let index_path = self.index_path(&path);
        let text = self.store().read_to_string(&index_path).await?;
        let doc = Document::parse(&text);
        let front_matter = doc.front_matter_required(&index_path)?;
        if front_matter.get_str("title").is_none() {
            markdown::require_title(&doc.body, &index_path)?;
        }
        self.collection(&path).await
    }

    /// Schema declared by the collection's index document; empty when there
    /// is no index document or no directory.
    pub async fn schema_of(&self, path: &str) -> Result<Schema> {
        let path = self.collection_path(path)?;
        Ok(match self.read_index(&path).await? {
            Some(doc) => Schema::from_front_matter(&doc.front_matter_or_default()),
            None => Schema::new(),
        })
    }

    /// Records directly inside a collection (not recursive), sorted by id.
    ///
    /// Index and readme files, hidden files and files with another extension
    /// are not members. Unreadable files are skipped with a warning. A missing
    /// directory has no members.
    #[instrument(skip(self))]
    pub async fn members_of(&self, path: &str) -> Result<Vec<Record>> {
        let path = self.collection_path(path)?;
        let entries = match self.store().list(&path).await {
            Ok(entries) => entries,
            Err(Error::DirectoryNotFound(_)) => {
                debug!("Directory not found, returning empty member list.");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut records = Vec::new();
        for entry in entries {
            if entry.kind != EntryKind::File || !self.config().is_record_file(&entry.name) {
                continue;
            }
            match self.store().read_to_string(&entry.path).await {
                Ok(text) => records.push(Record::from_text(&entry.path, &text)),
                Err(e) => warn!("Skipping unreadable record '{}': {}", entry.path, e),
            }
        }
        records.sort_by(|a, b| a.id().cmp(b.id()));
        debug!("Found {} records", records.len());
        Ok(records)
    }

    /// Reads a collection with its members, resolved relations and archived
    /// members.
    #[instrument(skip(self))]
    pub async fn read_collection(&self, path: &str) -> Result<CollectionView> {
        let collection = self.collection(path).await?;
        let members = self.members_of(&collection.path).await?;
        let relations = self.resolve_relations(&collection.schema).await?;
        let archived_members = self.list_archived(&collection.path).await?;
        Ok(CollectionView { collection, members, relations, archived_members })
    }

    /// Normalizes every member against the collection's schema and writes back
    /// the records that changed.
    #[instrument(skip(self))]
    pub async fn normalize_collection(&self, path: &str) -> Result<NormalizeReport> {
        let path = self.collection_path(path)?;
        let schema = self.schema_of(&path).await?;
        let mut report = NormalizeReport::default();
        if schema.is_empty() {
            debug!("Collection declares no fields, nothing to normalize");
            report.unchanged = self.members_of(&path).await?.len();
            return Ok(report);
        }

        for record in self.members_of(&path).await? {
            let (front_matter, changed) = schema.normalize(record.front_matter());
            if !changed {
                report.unchanged += 1;
                continue;
            }
            let updated = record.with_front_matter(front_matter);
            match self.store().write(updated.path(), &updated.render()).await {
                Ok(()) => report.updated.push(updated.path().to_string()),
                Err(e) => {
                    warn!("Failed to normalize '{}': {}", updated.path(), e);
                    report.failed.push((updated.path().to_string(), e.to_string()));
                }
            }
        }
        debug!("Normalized {} records", report.updated.len());
        Ok(report)
    }

    /// Updates title, description, icon and schema of a collection, creating
    /// its index document if needed.
    ///
    /// Title and description are written both to the front matter and to the
    /// body (heading and first paragraph).
    #[instrument(skip(self, update))]
    pub async fn update_collection_meta(
        &self,
        path: &str,
        update: CollectionMetaUpdate,
    ) -> Result<Collection> {
        let path = self.collection_path(path)?;
        if !self.store().is_dir(&path).await? {
            return Err(Error::DirectoryNotFound(path));
        }
        let index_path = self.index_path(&path);
        let mut doc = self.read_index(&path).await?.unwrap_or_default();
        let mut front_matter = doc.front_matter_or_default();

        if let Some(icon) = update.icon {
            front_matter.insert("icon", Value::String(icon));
        }
        if let Some(title) = update.title {
            doc.body = markdown::with_title(&doc.body, &title);
            front_matter.insert("title", Value::String(title));
        }
        if let Some(description) = update.description {
            let current_title = front_matter
                .get_str("title")
                .map(str::to_string)
                .unwrap_or_else(|| self.dir_name(&path));
            doc.body = markdown::with_description(&doc.body, &description, &current_title);
            front_matter.insert("description", Value::String(description));
        }
        if let Some(schema) = update.schema {
            // Round-trip through the strict parser so only valid schemas land on disk.
            let json = schema.to_json();
            Schema::from_json(&json)?;
            front_matter.insert(SCHEMA_KEY, Value::String(json));
        }

        doc.front_matter = Some(front_matter);
        self.store().write(&index_path, &doc.render()).await?;
        debug!("Collection metadata updated");
        self.collection(&path).await
    }

    /// Writes a generated index document unless one exists.
    ///
    /// Returns whether a document was created.
    pub(crate) async fn ensure_index(&self, path: &str, title: &str) -> Result<bool> {
        let index_path = self.index_path(path);
        let mut front_matter = FrontMatter::new();
        front_matter.insert("icon", Value::String(String::new()));
        front_matter.insert("title", Value::String(title.to_string()));
        let doc = Document::new(Some(front_matter), format!("# {title}\n"));

        match self.store().create_new(&index_path, &doc.render()).await {
            Ok(()) => {
                debug!("Created index document {}", index_path);
                Ok(true)
            }
            Err(Error::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn index_path(&self, collection: &str) -> String {
        path::join(collection, &self.config().index_file)
    }

    async fn read_index(&self, collection: &str) -> Result<Option<Document>> {
        let index_path = self.index_path(collection);
        match self.store().read_to_string(&index_path).await {
            Ok(text) => Ok(Some(Document::parse(&text))),
            Err(Error::FileNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
