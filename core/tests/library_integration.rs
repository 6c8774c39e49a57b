use serde_json::json;
use tempfile::tempdir;
use tokio::fs;

use folio_core::markdown::{self, FrontMatter};
use folio_core::schema::{FieldIssue, FieldKind, Schema, SchemaField};
use folio_core::storage::{CollectionMetaUpdate, Error, INTERNAL_DIR_NAME, Library, NodeKind};

async fn library_with(files: &[(&str, &str)]) -> (tempfile::TempDir, Library) {
    let dir = tempdir().unwrap();
    for (path, text) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).await.unwrap();
        fs::write(&full, text).await.expect("Test helper: Failed to write file");
    }
    let library = Library::open(dir.path()).await.expect("Failed to open library");
    (dir, library)
}

#[tokio::test]
async fn integration_create_and_open_library() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("my_library");

    // 1. Create library
    let created = Library::create(&root).await.expect("Failed to create library");
    assert!(
        root.join(INTERNAL_DIR_NAME).is_dir(),
        "Internal .folio directory should exist after create"
    );

    // 2. Open it again
    let opened = Library::open(&root).await.expect("Failed to open existing library");
    assert_eq!(opened.root(), created.root());

    // 3. Creating twice is a conflict
    assert!(matches!(Library::create(&root).await, Err(Error::Conflict(_))));

    // 4. Opening a missing directory fails
    let missing = Library::open(dir.path().join("nope")).await;
    assert!(matches!(missing, Err(Error::DirectoryNotFound(_))));
}

#[tokio::test]
async fn front_matter_parses_and_round_trips() {
    let parsed = FrontMatter::parse("title: Hello\ntags:\n- a\n- b");
    assert_eq!(parsed.get("title"), Some(&json!("Hello")));
    assert_eq!(parsed.get("tags"), Some(&json!(["a", "b"])));

    let mut values = FrontMatter::new();
    values.insert("zeta", json!("last"));
    values.insert("count", json!(12));
    values.insert("ratio", json!(0.5));
    values.insert("done", json!(false));
    values.insert("quoted", json!("true"));
    values.insert("number_text", json!("42"));
    values.insert("empty", json!(""));
    values.insert("list", json!(["x", "y z"]));
    values.insert("title", json!("First"));
    assert_eq!(FrontMatter::parse(&values.render()), values);
}

#[tokio::test]
async fn body_title_and_description() {
    let body = "# Title\n\nFirst paragraph.\n\n## Next";
    assert_eq!(markdown::title(body), "Title");
    assert_eq!(markdown::description(body).as_deref(), Some("First paragraph."));
}

#[tokio::test]
async fn normalization_defaults_and_is_idempotent() {
    let (_dir, library) = library_with(&[
        (
            "items/index.md",
            "---\ntitle: Items\nschema: {\"count\":{\"type\":\"number\",\"default\":0},\"tags\":{\"type\":\"multi-text\"},\"state\":{\"type\":\"select-text\",\"options\":[\"open\",\"done\"],\"default\":\"open\"}}\n---\n# Items\n",
        ),
        ("items/one.md", "---\ncount: abc\ntags: a, b\nstate: weird\nnote: keep\n---\n\n# One\n"),
    ])
    .await;

    // 1. First pass rewrites the record
    let report = library.normalize_collection("items").await.unwrap();
    assert_eq!(report.updated, ["items/one.md"]);

    let record = library.read_record("items/one.md").await.unwrap();
    assert_eq!(record.front_matter().get("count"), Some(&json!(0)));
    assert_eq!(record.front_matter().get("tags"), Some(&json!(["a", "b"])));
    assert_eq!(record.front_matter().get("state"), Some(&json!("open")));
    assert_eq!(record.front_matter().get("note"), Some(&json!("keep")));

    // 2. Second pass changes nothing
    let schema = library.schema_of("items").await.unwrap();
    let (again, changed) = schema.normalize(record.front_matter());
    assert!(!changed);
    assert_eq!(&again, record.front_matter());
    let report = library.normalize_collection("items").await.unwrap();
    assert!(report.updated.is_empty());
}

#[tokio::test]
async fn archive_round_trip_keeps_content() {
    let text = "---\nstatus: open\npriority: 2\n---\n\n# F1\n\nThe first feature.\n";
    let (_dir, library) = library_with(&[("products/x/features/f1.md", text)]).await;
    let original = library.read_record("products/x/features/f1.md").await.unwrap();

    let archived = library.archive_record("products/x/features/f1.md").await.unwrap();
    assert_eq!(archived, "products/x/features/_/f1.md");

    let view = library.read_collection("products/x/features").await.unwrap();
    assert!(view.members.is_empty(), "Archived records are not members");
    assert_eq!(view.archived_members.len(), 1);

    let restored = library.restore_record(&archived).await.unwrap();
    assert_eq!(restored, "products/x/features/f1.md");
    let back = library.read_record(&restored).await.unwrap();
    assert_eq!(back.body(), original.body());
    assert_eq!(back.front_matter(), original.front_matter());
    assert_eq!(back.path(), original.path());
}

#[tokio::test]
async fn archive_collision_is_reported() {
    let (_dir, library) = library_with(&[("c/a.md", "live"), ("c/_/a.md", "archived")]).await;
    assert!(matches!(library.archive_record("c/a.md").await, Err(Error::Conflict(_))));
    assert_eq!(library.store().read_to_string("c/a.md").await.unwrap(), "live");
}

#[tokio::test]
async fn normalize_tree_generates_missing_index() {
    let (_dir, library) = library_with(&[("projects/alpha/task.md", "# Task\n")]).await;

    // 1. Building the tree does not write anything
    let tree = library.build_tree("projects").await.unwrap();
    assert_eq!(tree.children[0].title, "alpha");
    assert!(!library.store().exists("projects/alpha/index.md").await.unwrap());

    // 2. The normalize pass creates the index document
    let report = library.normalize_tree("projects").await.unwrap();
    assert!(report.created_indexes.contains(&"projects/alpha/index.md".to_string()));
    let collection = library.read_collection_meta("projects/alpha").await.unwrap();
    assert_eq!(collection.title, "alpha");
    assert_eq!(collection.icon, None);

    let tree = library.build_tree("projects").await.unwrap();
    let alpha = &tree.children[0];
    assert_eq!(alpha.kind, NodeKind::Collection);
    assert_eq!(alpha.children[0].title, "Task");
}

#[tokio::test]
async fn missing_relation_target_resolves_empty() {
    let (_dir, library) = library_with(&[(
        "products/x/features/index.md",
        "---\nschema: {\"milestone\":{\"type\":\"relation\",\"path\":\"products/x/milestones\"}}\n---\n# Features\n",
    )])
    .await;

    let view = library.read_collection("products/x/features").await.unwrap();
    assert_eq!(view.relations.len(), 1);
    assert_eq!(view.relations[0].path, "products/x/milestones");
    assert!(view.relations[0].files.is_empty());
}

#[tokio::test]
async fn dangling_relations_are_reported() {
    let (_dir, library) = library_with(&[
        ("people/ann.md", "# Ann\n"),
        (
            "tasks/index.md",
            "---\nschema: {\"owner\":{\"type\":\"relation\",\"path\":\"people\"},\"reviewers\":{\"type\":\"multi-relation\",\"path\":\"people\"}}\n---\n# Tasks\n",
        ),
        ("tasks/t1.md", "---\nowner: ann\nreviewers:\n- ann\n- bob\n---\n# T1\n"),
    ])
    .await;

    let issues = library.validate_record("tasks/t1.md").await.unwrap();
    assert_eq!(
        issues,
        vec![FieldIssue::DanglingRelation {
            field: "reviewers".into(),
            value: "bob".into(),
            path: "people".into(),
        }]
    );
}

#[tokio::test]
async fn paths_outside_root_are_rejected() {
    let (_dir, library) = library_with(&[]).await;
    assert!(matches!(library.read_record("../secret.md").await, Err(Error::PathViolation(_))));
    assert!(matches!(library.read_collection("/etc").await, Err(Error::PathViolation(_))));
    assert!(matches!(library.build_tree("a/../../b").await, Err(Error::PathViolation(_))));
}

#[tokio::test]
async fn strict_meta_read_requires_title() {
    let (_dir, library) =
        library_with(&[("c/index.md", "---\nicon: 🗂\n---\nNo heading here.\n")]).await;
    assert!(matches!(library.read_collection_meta("c").await, Err(Error::MissingTitle(_))));

    // The lenient read still works
    let collection = library.collection("c").await.unwrap();
    assert_eq!(collection.title, "c");
}

#[tokio::test]
async fn schema_written_through_meta_update_is_read_back() {
    let (_dir, library) = library_with(&[("people/ann.md", "# Ann\n")]).await;

    let mut schema = Schema::new();
    schema.insert("age", SchemaField::new(FieldKind::Number { default: None }));
    schema.insert(
        "team",
        SchemaField::new(FieldKind::SelectText {
            options: vec!["red".into(), "blue".into()],
            default: Some("red".into()),
        }),
    );
    library
        .update_collection_meta(
            "people",
            CollectionMetaUpdate { schema: Some(schema.clone()), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(library.schema_of("people").await.unwrap(), schema);

    let record =
        library.write_record("people/ann.md", "# Ann\n", FrontMatter::new()).await.unwrap();
    assert_eq!(record.front_matter().get("age"), Some(&json!(0)));
    assert_eq!(record.front_matter().get("team"), Some(&json!("red")));
}
