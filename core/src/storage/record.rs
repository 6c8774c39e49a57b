use serde::Serialize;
use serde_json::Value;

use crate::markdown::{self, Document, FrontMatter};
use crate::path;

/// A document inside a collection.
///
/// Records are immutable values: the `with_*` methods return an updated copy
/// and leave the original untouched. Nothing is written to disk until the copy
/// is handed to [`Library::write_record`](crate::storage::Library::write_record).
///
/// The `id` is the file name without extension. There is no identifier
/// independent of the file name, so renaming a record changes its id and any
/// relation still pointing at the old id dangles.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    id: String,
    path: String,
    collection_path: String,
    title: String,
    description: Option<String>,
    front_matter: FrontMatter,
    body: String,
}

impl Record {
    /// Builds a record from its parts, deriving id, title and description.
    pub fn new(path: &str, front_matter: FrontMatter, body: impl Into<String>) -> Self {
        let body = body.into();
        let title = derive_title(&front_matter, &body);
        let description = derive_description(&front_matter, &body);
        Record {
            id: path::stem(path).to_string(),
            path: path.to_string(),
            collection_path: path::dirname(path).to_string(),
            title,
            description,
            front_matter,
            body,
        }
    }

    /// Parses the full text of a record file.
    pub fn from_text(path: &str, text: &str) -> Self {
        let doc = Document::parse(text);
        Record::new(path, doc.front_matter.unwrap_or_default(), doc.body)
    }

    /// Full file text: front matter block followed by the body.
    pub fn render(&self) -> String {
        Document::new(Some(self.front_matter.clone()), self.body.clone()).render()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Library-relative path of the record file.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn collection_path(&self) -> &str {
        &self.collection_path
    }

    /// First heading of the body, else the stored `title`, else `""`.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Title for display: the title, or the id when there is none.
    pub fn label(&self) -> &str {
        if self.title.is_empty() { &self.id } else { &self.title }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn front_matter(&self) -> &FrontMatter {
        &self.front_matter
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn with_front_matter(&self, front_matter: FrontMatter) -> Self {
        Record::new(&self.path, front_matter, self.body.clone())
    }

    pub fn with_body(&self, body: impl Into<String>) -> Self {
        Record::new(&self.path, self.front_matter.clone(), body)
    }

    /// Rewrites the title heading; a stored `title` key is kept in step.
    pub fn with_title(&self, title: &str) -> Self {
        let mut front_matter = self.front_matter.clone();
        if front_matter.contains_key("title") {
            front_matter.insert("title", Value::String(title.to_string()));
        }
        Record::new(&self.path, front_matter, markdown::with_title(&self.body, title))
    }

    /// Rewrites the description paragraph; a stored `description` key is kept
    /// in step.
    pub fn with_description(&self, description: &str) -> Self {
        let mut front_matter = self.front_matter.clone();
        if front_matter.contains_key("description") {
            front_matter.insert("description", Value::String(description.to_string()));
        }
        let body = markdown::with_description(&self.body, description, self.label());
        Record::new(&self.path, front_matter, body)
    }
}

fn derive_title(front_matter: &FrontMatter, body: &str) -> String {
    let from_body = markdown::title(body);
    if !from_body.is_empty() {
        return from_body;
    }
    front_matter.get_str("title").unwrap_or_default().to_string()
}

fn derive_description(front_matter: &FrontMatter, body: &str) -> Option<String> {
    markdown::description(body).or_else(|| front_matter.get_str("description").map(str::to_string))
}
