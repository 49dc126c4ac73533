use std::sync::Arc;

use bytes::Bytes;
use folio::application::blog::BlogRepository;
use folio::application::pagination::PageWindow;
use folio::application::repos::PostBackend;
use folio::domain::posts::Post;
use folio::domain::visibility::{FixedClock, Viewer};
use folio::infra::fs::FileBackend;
use folio::infra::uploads::FileStore;
use tempfile::TempDir;
use time::macros::datetime;

fn open(dir: &TempDir) -> Arc<FileBackend> {
    let files = FileStore::new(dir.path().join("files"), "/posts/files").expect("file store");
    Arc::new(FileBackend::open(dir.path(), files).expect("file backend"))
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(datetime!(2024-06-01 12:00 UTC)))
}

#[tokio::test]
async fn saved_posts_survive_a_restart() {
    let dir = TempDir::new().expect("tempdir");

    let repo = BlogRepository::load(open(&dir), clock())
        .await
        .expect("load empty dir");
    let mut draft = Post::new("Flat files", datetime!(2024-05-01 09:30 UTC))
        .published(true)
        .with_categories(["Rust", "Storage"]);
    draft.content = "Body with \"quotes\"\nand lines".into();
    let saved = repo.save(draft).await.expect("save");
    repo.save(
        Post::new("Unpublished", datetime!(2024-05-02 00:00 UTC)).with_categories(["Drafts"]),
    )
    .await
    .expect("save draft");

    let reopened = BlogRepository::load(open(&dir), clock())
        .await
        .expect("reload from disk");
    assert_eq!(reopened.cache().len(), 2);
    assert_eq!(
        reopened.get_by_slug(Viewer::Anonymous, "flat-files"),
        Some(saved)
    );
    assert_eq!(reopened.list_categories(Viewer::Anonymous), vec!["rust", "storage"]);
    assert_eq!(
        reopened
            .list_posts(Viewer::Admin, PageWindow::first(10))
            .first()
            .map(|post| post.title.as_str()),
        Some("Unpublished")
    );
}

#[tokio::test]
async fn delete_removes_the_document() {
    let dir = TempDir::new().expect("tempdir");
    let backend = open(&dir);
    let repo = BlogRepository::load(backend.clone(), clock())
        .await
        .expect("load");

    let saved = repo
        .save(Post::new("Short lived", datetime!(2024-05-01 00:00 UTC)).published(true))
        .await
        .expect("save");
    let document = backend.posts_dir().join(format!("{}.toml", saved.id.to_lowercase()));
    assert!(document.exists());

    repo.delete(&saved).await.expect("delete");
    assert!(!document.exists());
    assert!(backend.load_all().await.expect("load").is_empty());
}

#[tokio::test]
async fn unreadable_documents_are_skipped() {
    let dir = TempDir::new().expect("tempdir");
    let backend = open(&dir);
    std::fs::write(backend.posts_dir().join("broken.toml"), "title = ").expect("write");
    std::fs::write(backend.posts_dir().join("notes.txt"), "ignored").expect("write");

    let repo = BlogRepository::load(backend, clock()).await.expect("load");
    assert!(repo.cache().is_empty());
}

#[tokio::test]
async fn non_utf8_documents_are_skipped() {
    let dir = TempDir::new().expect("tempdir");
    let backend = open(&dir);
    let repo = BlogRepository::load(backend.clone(), clock())
        .await
        .expect("load");
    repo.save(Post::new("Survivor", datetime!(2024-05-01 00:00 UTC)).published(true))
        .await
        .expect("save");
    std::fs::write(backend.posts_dir().join("bad.toml"), b"\xff\xfe\x00").expect("write");

    let reopened = BlogRepository::load(backend, clock())
        .await
        .expect("load skips undecodable documents");
    assert_eq!(reopened.cache().len(), 1);
    assert!(reopened.get_by_slug(Viewer::Anonymous, "survivor").is_some());
}

#[tokio::test]
async fn ids_differing_in_non_ascii_case_share_one_post() {
    let dir = TempDir::new().expect("tempdir");
    let repo = BlogRepository::load(open(&dir), clock())
        .await
        .expect("load");

    repo.save(
        Post::new("First", datetime!(2024-05-01 00:00 UTC))
            .with_id("Ärger")
            .with_slug("aerger")
            .published(true),
    )
    .await
    .expect("save");
    let second = repo
        .save(
            Post::new("Second", datetime!(2024-05-01 00:00 UTC))
                .with_id("ärger")
                .with_slug("aerger")
                .published(true),
        )
        .await
        .expect("save again");
    assert_eq!(second.id, "Ärger");
    assert_eq!(repo.cache().len(), 1);

    let reopened = BlogRepository::load(open(&dir), clock())
        .await
        .expect("reload from disk");
    assert_eq!(reopened.cache().len(), 1);
    let stored = reopened
        .get_by_id(Viewer::Anonymous, "ÄRGER")
        .expect("post survives restart");
    assert_eq!(stored.title, "Second");
}

#[tokio::test]
async fn attachments_never_overwrite_each_other() {
    let dir = TempDir::new().expect("tempdir");
    let repo = BlogRepository::load(open(&dir), clock())
        .await
        .expect("load");

    let first = repo
        .save_file(Bytes::from_static(b"one"), "Diagram.SVG", Some("v1"))
        .await
        .expect("store");
    assert_eq!(first, "/posts/files/diagram_v1.svg");

    let second = repo
        .save_file(Bytes::from_static(b"two"), "Diagram.SVG", Some("v1"))
        .await
        .expect("store");
    assert_ne!(first, second);
    assert!(second.starts_with("/posts/files/diagram_v1-"));

    let stored = std::fs::read(dir.path().join("files").join("diagram_v1.svg")).expect("read");
    assert_eq!(stored, b"one");
}
