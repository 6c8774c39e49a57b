use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::path;
use crate::storage::{Library, Record};

impl Library {
    /// Moves a record into its collection's archive directory and returns the
    /// new path.
    ///
    /// The archive directory gets a generated index document the first time.
    /// An existing file at the destination is never overwritten.
    #[instrument(skip(self))]
    pub async fn archive_record(&self, path: &str) -> Result<String> {
        let path = self.record_path(path)?;
        let collection = path::dirname(&path);
        if self.is_archive_path(collection) {
            return Err(Error::InvalidPath(format!("{path} is already archived")));
        }
        if !self.store().exists(&path).await? {
            return Err(Error::FileNotFound(path));
        }

        let archive_dir = path::join(collection, &self.config().archive_prefix);
        let target = path::join(&archive_dir, path::basename(&path));
        self.ensure_index(&archive_dir, "Archive").await?;
        self.store().move_file(&path, &target).await?;
        debug!("Archived to {}", target);
        Ok(target)
    }

    /// Moves an archived record back into the collection that owns the archive
    /// and returns the restored path.
    #[instrument(skip(self))]
    pub async fn restore_record(&self, path: &str) -> Result<String> {
        let path = self.record_path(path)?;
        let archive_dir = path::dirname(&path);
        if !self.config().is_archive_dir(path::basename(archive_dir)) {
            return Err(Error::NotArchived(path));
        }

        let target = path::join(path::dirname(archive_dir), path::basename(&path));
        self.store().move_file(&path, &target).await?;
        debug!("Restored to {}", target);
        Ok(target)
    }

    /// Archived records of a collection, given the collection's own path.
    #[instrument(skip(self))]
    pub async fn list_archived(&self, collection: &str) -> Result<Vec<Record>> {
        let collection = self.collection_path(collection)?;
        let archive_dir = path::join(&collection, &self.config().archive_prefix);
        self.members_of(&archive_dir).await
    }

    /// Completes archive and restore moves interrupted by a crash, anywhere
    /// below `path`.
    pub async fn recover_moves(&self, path: &str) -> Result<Vec<String>> {
        let path = self.collection_path(path)?;
        self.store().recover_moves(&path).await
    }

    fn is_archive_path(&self, dir: &str) -> bool {
        path::segments(dir).any(|segment| self.config().is_archive_dir(segment))
    }
}
