use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::storage::file::{Entry, EntryKind};
use crate::storage::{Library, NormalizeReport, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Collection,
    Record,
}

/// A collection or record in the library tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Depth-first iterator over this node and all its descendants.
    pub fn walk(&self) -> impl Iterator<Item = &TreeNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    fn sort_children(&mut self) {
        self.children.sort_by(|a, b| (a.kind, &a.name).cmp(&(b.kind, &b.name)));
    }
}

/// A directory whose entries are still being visited.
struct Frame {
    node: TreeNode,
    pending: std::vec::IntoIter<Entry>,
}

impl Library {
    /// Builds the tree of collections and records below `root`.
    ///
    /// Read only: directories without an index document fall back to their
    /// name, and records are reported as stored. Archive, hidden and internal
    /// directories and reserved files are left out. A directory's entries are
    /// listed only when the walk reaches it.
    #[instrument(skip(self))]
    pub async fn build_tree(&self, root: &str) -> Result<TreeNode> {
        let root = self.collection_path(root)?;
        let mut stack = vec![self.open_frame(&root).await?];

        loop {
            let Some(frame) = stack.last_mut() else {
                return Err(Error::InvalidPath(root));
            };
            match frame.pending.next() {
                Some(entry) if entry.kind == EntryKind::Directory => {
                    match self.open_frame(&entry.path).await {
                        Ok(child) => stack.push(child),
                        Err(e) => warn!("Skipping unreadable directory '{}': {}", entry.path, e),
                    }
                }
                Some(entry) => {
                    let node = self.record_node(entry).await;
                    frame.node.children.push(node);
                }
                None => {
                    let Some(Frame { mut node, .. }) = stack.pop() else {
                        return Err(Error::InvalidPath(root));
                    };
                    node.sort_children();
                    match stack.last_mut() {
                        Some(parent) => parent.node.children.push(node),
                        None => {
                            debug!("Tree built");
                            return Ok(node);
                        }
                    }
                }
            }
        }
    }

    /// Generates index documents for directories below `root` (and `root`
    /// itself) that have none, then normalizes every record against its
    /// collection's schema.
    #[instrument(skip(self))]
    pub async fn normalize_tree(&self, root: &str) -> Result<NormalizeReport> {
        let root = self.collection_path(root)?;
        let mut report = NormalizeReport::default();
        let mut pending = vec![root];

        while let Some(dir) = pending.pop() {
            match self.normalize_dir(&dir, &mut report).await {
                Ok(children) => pending.extend(children),
                Err(e) => {
                    warn!("Failed to normalize directory '{}': {}", dir, e);
                    report.failed.push((dir, e.to_string()));
                }
            }
        }

        debug!(
            "Created {} index documents, updated {} records",
            report.created_indexes.len(),
            report.updated.len()
        );
        Ok(report)
    }

    /// Normalizes one directory and returns its sub-collections.
    async fn normalize_dir(&self, dir: &str, report: &mut NormalizeReport) -> Result<Vec<String>> {
        if self.ensure_index(dir, &self.dir_name(dir)).await? {
            report.created_indexes.push(self.index_path(dir));
        }
        report.absorb(self.normalize_collection(dir).await?);

        Ok(self
            .store()
            .list(dir)
            .await?
            .into_iter()
            .filter(|entry| {
                entry.kind == EntryKind::Directory && self.config().is_collection_dir(&entry.name)
            })
            .map(|entry| entry.path)
            .collect())
    }

    async fn open_frame(&self, path: &str) -> Result<Frame> {
        let (title, icon) = match self.collection(path).await {
            Ok(collection) => (collection.title, collection.icon),
            Err(e @ (Error::DirectoryNotFound(_) | Error::NotADirectory(_))) => return Err(e),
            Err(e) => {
                warn!("Failed to read collection '{}': {}", path, e);
                (self.dir_name(path), None)
            }
        };

        let entries: Vec<Entry> = self
            .store()
            .list(path)
            .await?
            .into_iter()
            .filter(|entry| match entry.kind {
                EntryKind::Directory => self.config().is_collection_dir(&entry.name),
                EntryKind::File => self.config().is_record_file(&entry.name),
            })
            .collect();

        let node = TreeNode {
            name: self.dir_name(path),
            path: path.to_string(),
            title,
            icon,
            kind: NodeKind::Collection,
            children: Vec::with_capacity(entries.len()),
        };
        Ok(Frame { node, pending: entries.into_iter() })
    }

    async fn record_node(&self, entry: Entry) -> TreeNode {
        let title = match self.store().read_to_string(&entry.path).await {
            Ok(text) => Some(Record::from_text(&entry.path, &text).title().to_string())
                .filter(|title| !title.is_empty()),
            Err(e) => {
                warn!("Failed to read record '{}': {}", entry.path, e);
                None
            }
        };
        TreeNode {
            title: title.unwrap_or_else(|| entry.name.clone()),
            name: entry.name,
            path: entry.path,
            icon: None,
            kind: NodeKind::Record,
            children: Vec::new(),
        }
    }
}
