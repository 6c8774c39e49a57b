use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::schema::Schema;
use crate::storage::Library;

/// Selectable targets of a relation field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relation {
    /// Name of the relation field in the schema.
    pub field: String,
    /// Library-relative path of the target collection.
    pub path: String,
    pub files: Vec<RelationOption>,
}

/// One record a relation field may point at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationOption {
    /// The id stored in the relation field.
    pub value: String,
    /// Title of the target record, else its id.
    pub label: String,
    pub path: String,
}

impl Library {
    /// Resolves every relation field of a schema, in schema order.
    #[instrument(skip(self, schema))]
    pub async fn resolve_relations(&self, schema: &Schema) -> Result<Vec<Relation>> {
        let lookups = schema.relation_fields().filter_map(|(name, field)| {
            field.relation_path().map(|target| self.resolve_relation(name, target))
        });
        try_join_all(lookups).await
    }

    /// Lists the members of a relation's target collection.
    ///
    /// A target collection that does not exist resolves to no files.
    #[instrument(skip(self))]
    pub async fn resolve_relation(&self, field: &str, target: &str) -> Result<Relation> {
        let path = self.collection_path(target)?;
        let files: Vec<RelationOption> = self
            .members_of(&path)
            .await?
            .into_iter()
            .map(|record| RelationOption {
                value: record.id().to_string(),
                label: record.label().to_string(),
                path: record.path().to_string(),
            })
            .collect();
        debug!("Resolved {} options", files.len());
        Ok(Relation { field: field.to_string(), path, files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, SchemaField};
    use tempfile::tempdir;

    #[tokio::test]
    async fn resolves_titles_and_ids() {
        let dir = tempdir().unwrap();
        let library = Library::open(dir.path()).await.unwrap();
        let store = library.store();
        store.write("people/ann.md", "# Ann Smith\n").await.unwrap();
        store.write("people/bob.md", "no title\n").await.unwrap();
        store.write("people/index.md", "# People\n").await.unwrap();

        let relation = library.resolve_relation("owner", "people").await.unwrap();
        assert_eq!(relation.path, "people");
        assert_eq!(
            relation.files,
            vec![
                RelationOption {
                    value: "ann".into(),
                    label: "Ann Smith".into(),
                    path: "people/ann.md".into()
                },
                RelationOption {
                    value: "bob".into(),
                    label: "bob".into(),
                    path: "people/bob.md".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn missing_target_is_empty() {
        let dir = tempdir().unwrap();
        let library = Library::open(dir.path()).await.unwrap();
        let relation =
            library.resolve_relation("milestone", "products/x/milestones").await.unwrap();
        assert_eq!(relation.path, "products/x/milestones");
        assert!(relation.files.is_empty());
    }

    #[tokio::test]
    async fn only_relation_fields_resolve() {
        let dir = tempdir().unwrap();
        let library = Library::open(dir.path()).await.unwrap();
        library.store().write("tags/rust.md", "# Rust\n").await.unwrap();

        let mut schema = Schema::new();
        schema.insert("name", SchemaField::new(FieldKind::Text { default: None }));
        schema.insert(
            "tags",
            SchemaField::new(FieldKind::MultiRelation { path: "tags".into(), default: None }),
        );
        schema.insert(
            "parent",
            SchemaField::new(FieldKind::Relation { path: "missing".into(), default: None }),
        );

        let relations = library.resolve_relations(&schema).await.unwrap();
        let fields: Vec<&str> = relations.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(fields, ["tags", "parent"]);
        assert_eq!(relations[0].files.len(), 1);
        assert!(relations[1].files.is_empty());
    }
}
