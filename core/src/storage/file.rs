use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::path;

/// Suffix of the marker file written next to the destination while a
/// copy-then-delete move is in progress.
pub const MOVE_MARKER_SUFFIX: &str = ".folio-move";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    Directory,
    File,
}

/// A directory entry, addressed by its library-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
}

#[derive(Debug, Serialize, Deserialize)]
struct MoveMarker {
    from: String,
    to: String,
}

/// Filesystem access confined to a root directory.
///
/// Every path is library-relative (`/`-separated). Paths that would leave the
/// root, lexically or through a symlink, are rejected with
/// [`Error::PathViolation`].
#[derive(Debug, Clone)]
pub struct FileStore {
    // Canonical absolute path of the root
    root: PathBuf,
}

impl FileStore {
    /// Opens a store over an existing directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let meta = fs::metadata(root).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::DirectoryNotFound(root.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(root.display().to_string()));
        }
        let root = fs::canonicalize(root).await?;
        debug!("Opened file store at {}", root.display());
        Ok(FileStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a relative path onto the root without touching the filesystem.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let normalized =
            path::normalize(path).ok_or_else(|| Error::PathViolation(path.to_string()))?;
        Ok(self.root.join(path::to_native(&normalized)))
    }

    /// Like [`resolve`](Self::resolve), and additionally checks that the
    /// nearest existing ancestor does not lead outside the root via a symlink.
    async fn checked(&self, path: &str) -> Result<PathBuf> {
        let resolved = self.resolve(path)?;
        let mut ancestor = resolved.as_path();
        loop {
            match fs::canonicalize(ancestor).await {
                Ok(real) => {
                    if real.starts_with(&self.root) {
                        return Ok(resolved);
                    }
                    return Err(Error::PathViolation(path.to_string()));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => match ancestor.parent() {
                    Some(parent) => ancestor = parent,
                    None => return Err(Error::PathViolation(path.to_string())),
                },
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn read_to_string(&self, path: &str) -> Result<String> {
        let full = self.checked(path).await?;
        fs::read_to_string(&full).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::FileNotFound(path.to_string())
            } else {
                Error::Io(e)
            }
        })
    }

    /// Writes a file, creating missing parent directories.
    #[instrument(skip(self, contents))]
    pub async fn write(&self, path: &str, contents: &str) -> Result<()> {
        let full = self.checked(path).await?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, contents).await?;
        debug!("Wrote {} bytes", contents.len());
        Ok(())
    }

    /// Writes a file that must not exist yet.
    #[instrument(skip(self, contents))]
    pub async fn create_new(&self, path: &str, contents: &str) -> Result<()> {
        let full = self.checked(path).await?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    Error::Conflict(path.to_string())
                } else {
                    Error::Io(e)
                }
            })?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> Result<()> {
        let full = self.checked(path).await?;
        fs::remove_file(&full).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::FileNotFound(path.to_string())
            } else {
                Error::Io(e)
            }
        })?;
        debug!("Deleted file");
        Ok(())
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.checked(path).await?;
        Ok(fs::try_exists(&full).await?)
    }

    pub async fn is_dir(&self, path: &str) -> Result<bool> {
        let full = self.checked(path).await?;
        match fs::metadata(&full).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub async fn create_dir_all(&self, path: &str) -> Result<()> {
        let full = self.checked(path).await?;
        fs::create_dir_all(&full).await?;
        Ok(())
    }

    /// Lists the entries directly inside a directory, sorted by name.
    ///
    /// Entries with non UTF-8 names, entries whose type cannot be determined
    /// and symlinks to directories are skipped with a warning. Symlinks to
    /// files are listed as files.
    #[instrument(skip(self))]
    pub async fn list(&self, path: &str) -> Result<Vec<Entry>> {
        let full = self.checked(path).await?;
        let mut read_dir = match fs::read_dir(&full).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::DirectoryNotFound(path.to_string()));
            }
            Err(e) if e.kind() == ErrorKind::NotADirectory => {
                return Err(Error::NotADirectory(path.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!("Skipping entry with non UTF-8 name: {}", entry.path().display());
                continue;
            };
            let kind = match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => EntryKind::Directory,
                Ok(file_type) if file_type.is_symlink() => {
                    // Linked files are listed; linked directories could leave
                    // the root or loop back into it.
                    match fs::metadata(entry.path()).await {
                        Ok(meta) if meta.is_dir() => {
                            warn!("Skipping symlinked directory '{}'", entry.path().display());
                            continue;
                        }
                        Ok(_) => EntryKind::File,
                        Err(e) => {
                            warn!("Skipping broken symlink '{}': {}", entry.path().display(), e);
                            continue;
                        }
                    }
                }
                Ok(_) => EntryKind::File,
                Err(e) => {
                    warn!("Skipping unreadable entry '{}': {}", entry.path().display(), e);
                    continue;
                }
            };
            entries.push(Entry { path: path::join(path, &name), name, kind });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Found {} entries", entries.len());
        Ok(entries)
    }

    /// Moves a file, refusing to overwrite an existing destination.
    ///
    /// The destination is created as a hard link, which fails instead of
    /// replacing an existing file, and the source is then removed. When the
    /// move crosses devices the file is copied into a newly created
    /// destination and the source deleted, with a marker file next to the
    /// destination for the duration (see [`recover_moves`](Self::recover_moves)).
    /// On filesystems without hard links a plain rename is used, which only
    /// checks for an existing destination beforehand.
    #[instrument(skip(self))]
    pub async fn move_file(&self, from: &str, to: &str) -> Result<()> {
        let src = self.checked(from).await?;
        let dst = self.checked(to).await?;

        if !fs::try_exists(&src).await? {
            return Err(Error::FileNotFound(from.to_string()));
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await?;
        }

        match fs::hard_link(&src, &dst).await {
            Ok(()) => {
                fs::remove_file(&src).await?;
                debug!("Moved file through a hard link");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::Conflict(to.to_string())),
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                debug!("Move crosses devices, falling back to copy and delete");
                self.copy_then_delete(from, to).await
            }
            Err(e) => {
                debug!("Hard link failed ({}), falling back to rename", e);
                if fs::try_exists(&dst).await? {
                    return Err(Error::Conflict(to.to_string()));
                }
                fs::rename(&src, &dst).await?;
                Ok(())
            }
        }
    }

    async fn copy_then_delete(&self, from: &str, to: &str) -> Result<()> {
        let marker_path = format!("{to}{MOVE_MARKER_SUFFIX}");
        let marker = MoveMarker { from: from.to_string(), to: to.to_string() };
        self.create_new(&marker_path, &serde_json::to_string(&marker)?).await?;

        let mut source = fs::File::open(self.resolve(from)?).await?;
        let mut target = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.resolve(to)?)
            .await
        {
            Ok(file) => file,
            Err(e) => {
                self.delete(&marker_path).await?;
                if e.kind() == ErrorKind::AlreadyExists {
                    return Err(Error::Conflict(to.to_string()));
                }
                return Err(Error::Io(e));
            }
        };
        tokio::io::copy(&mut source, &mut target).await?;
        target.flush().await?;
        fs::remove_file(self.resolve(from)?).await?;

        self.delete(&marker_path).await?;
        Ok(())
    }

    /// Completes moves that were interrupted between copy and delete.
    ///
    /// Walks `dir` recursively for marker files. When both copies exist and
    /// match, the source is removed; when they differ, the copy is redone.
    /// Returns the destinations of recovered moves.
    #[instrument(skip(self))]
    pub async fn recover_moves(&self, dir: &str) -> Result<Vec<String>> {
        let mut recovered = Vec::new();
        let mut pending = vec![dir.to_string()];

        while let Some(current) = pending.pop() {
            for entry in self.list(&current).await? {
                match entry.kind {
                    EntryKind::Directory => pending.push(entry.path),
                    EntryKind::File if entry.name.ends_with(MOVE_MARKER_SUFFIX) => {
                        let text = self.read_to_string(&entry.path).await?;
                        let marker: MoveMarker = serde_json::from_str(&text)?;
                        self.finish_move(&marker).await?;
                        self.delete(&entry.path).await?;
                        recovered.push(marker.to);
                    }
                    EntryKind::File => {}
                }
            }
        }
        Ok(recovered)
    }

    async fn finish_move(&self, marker: &MoveMarker) -> Result<()> {
        let has_src = self.exists(&marker.from).await?;
        let has_dst = self.exists(&marker.to).await?;
        match (has_src, has_dst) {
            (true, true) => {
                let src = fs::read(self.resolve(&marker.from)?).await?;
                let dst = fs::read(self.resolve(&marker.to)?).await?;
                if src != dst {
                    warn!("Incomplete copy of '{}', copying again", marker.from);
                    fs::write(self.resolve(&marker.to)?, &src).await?;
                }
                self.delete(&marker.from).await
            }
            (true, false) => {
                warn!("Move of '{}' never copied, copying now", marker.from);
                fs::copy(self.resolve(&marker.from)?, self.resolve(&marker.to)?).await?;
                self.delete(&marker.from).await
            }
            (false, true) => Ok(()),
            (false, false) => {
                warn!("Neither '{}' nor '{}' exists", marker.from, marker.to);
                Ok(())
            }
        }
    }
}
