//! Volatile backend for tests, demos and previews.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::repos::{PostBackend, RepoError};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::posts::Post;

use super::uploads::{stored_file_name, stored_suffix};

const SOURCE: &str = "infra::memory";

#[derive(Debug, Default)]
pub struct MemoryBackend {
    posts: RwLock<Vec<Post>>,
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(posts: Vec<Post>) -> Self {
        Self {
            posts: RwLock::new(posts),
            files: RwLock::default(),
        }
    }

    /// Posts as stored, in write order.
    pub fn stored_posts(&self) -> Vec<Post> {
        rw_read(&self.posts, SOURCE, "stored_posts").clone()
    }

    pub fn file(&self, reference: &str) -> Option<Bytes> {
        rw_read(&self.files, SOURCE, "file").get(reference).cloned()
    }
}

#[async_trait]
impl PostBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load_all(&self) -> Result<Vec<Post>, RepoError> {
        Ok(self.stored_posts())
    }

    async fn persist(&self, post: &Post) -> Result<(), RepoError> {
        let mut posts = rw_write(&self.posts, SOURCE, "persist");
        match posts.iter_mut().find(|existing| existing.matches_id(&post.id)) {
            Some(existing) => *existing = post.clone(),
            None => posts.push(post.clone()),
        }
        Ok(())
    }

    async fn erase(&self, post: &Post) -> Result<(), RepoError> {
        rw_write(&self.posts, SOURCE, "erase").retain(|existing| !existing.matches_id(&post.id));
        Ok(())
    }

    async fn store_file(
        &self,
        bytes: Bytes,
        file_name: &str,
        suffix: Option<&str>,
    ) -> Result<String, RepoError> {
        if bytes.is_empty() {
            return Err(RepoError::invalid_input("uploaded file is empty"));
        }
        let suffix = stored_suffix(suffix);

        let mut files = rw_write(&self.files, SOURCE, "store_file");
        let mut reference = format!("/files/{}", stored_file_name(file_name, &suffix));
        let mut attempt = 2;
        while files.contains_key(&reference) {
            reference = format!(
                "/files/{}",
                stored_file_name(file_name, &format!("{suffix}-{attempt}"))
            );
            attempt += 1;
        }
        files.insert(reference.clone(), bytes);
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[tokio::test]
    async fn persist_replaces_by_id() {
        let backend = MemoryBackend::new();
        let post = Post::new("One", datetime!(2024-01-01 00:00 UTC)).with_id("a");
        backend.persist(&post).await.expect("persist");

        let mut edited = post.clone().with_id("A");
        edited.title = "Edited".into();
        backend.persist(&edited).await.expect("persist");

        let stored = backend.load_all().await.expect("load");
        assert_eq!(stored, vec![edited.clone()]);

        backend.erase(&edited).await.expect("erase");
        assert!(backend.stored_posts().is_empty());
    }

    #[tokio::test]
    async fn store_file_never_reuses_a_reference() {
        let backend = MemoryBackend::new();
        let first = backend
            .store_file(Bytes::from_static(b"1"), "a.png", Some("x"))
            .await
            .expect("first");
        let second = backend
            .store_file(Bytes::from_static(b"2"), "a.png", Some("x"))
            .await
            .expect("second");
        assert_eq!(first, "/files/a_x.png");
        assert_eq!(second, "/files/a_x-2.png");
        assert_eq!(backend.file(&second), Some(Bytes::from_static(b"2")));
    }

    #[tokio::test]
    async fn store_file_slugifies_the_suffix() {
        let backend = MemoryBackend::new();
        let reference = backend
            .store_file(Bytes::from_static(b"1"), "My Photo.PNG", Some("Draft V2"))
            .await
            .expect("store");
        assert_eq!(reference, "/files/my-photo_draft-v2.png");

        let fallback = backend
            .store_file(Bytes::from_static(b"1"), "a.png", Some("!!!"))
            .await
            .expect("store");
        assert!(fallback.starts_with("/files/a_"));
        assert!(!fallback.contains('!'));
    }
}
