//! Disk storage for post attachments.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use slug::slugify;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::application::repos::RepoError;

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

impl From<UploadStorageError> for RepoError {
    fn from(err: UploadStorageError) -> Self {
        match err {
            UploadStorageError::Io(io) => RepoError::Io(io),
            other => RepoError::invalid_input(other.to_string()),
        }
    }
}

/// Filesystem-backed attachment store shared by the file and SQL backends.
///
/// Files land flat under `root` as `<stem>_<suffix>.<ext>` and are addressed
/// as `<url_prefix>/<name>`. Existing files are never overwritten.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    url_prefix: String,
}

impl FileStore {
    /// Open storage rooted at `root`, creating the directory if necessary.
    pub fn new(root: PathBuf, url_prefix: impl Into<String>) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        let url_prefix = url_prefix.into().trim_end_matches('/').to_string();
        Ok(Self { root, url_prefix })
    }

    /// Write `data` under a name derived from `original_name` and `suffix`.
    ///
    /// Without a suffix the current time in nanoseconds is used. If the name
    /// is already taken a random identifier is appended instead of replacing
    /// the existing file.
    pub async fn store(
        &self,
        original_name: &str,
        suffix: Option<&str>,
        data: Bytes,
    ) -> Result<String, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        fs::create_dir_all(&self.root).await?;

        let suffix = stored_suffix(suffix);

        let mut name = stored_file_name(original_name, &suffix);
        let mut file = match self.create_new(&name).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                name = stored_file_name(original_name, &format!("{suffix}-{}", Uuid::new_v4()));
                self.create_new(&name).await?
            }
            Err(err) => return Err(err.into()),
        };

        if let Err(err) = write_all(&mut file, &data).await {
            drop(file);
            let _ = fs::remove_file(self.root.join(&name)).await;
            return Err(err.into());
        }

        Ok(format!("{}/{}", self.url_prefix, name))
    }

    async fn create_new(&self, name: &str) -> Result<fs::File, std::io::Error> {
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.root.join(name))
            .await
    }
}

#[cfg(test)]
impl FileStore {
    /// Read a stored file back by the reference `store` returned.
    pub async fn read(&self, reference: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(reference)?;
        Ok(Bytes::from(fs::read(absolute).await?))
    }

    /// Remove a stored file. Missing files are treated as success.
    pub async fn delete(&self, reference: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(reference)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, std::io::Error> {
        let name = reference
            .strip_prefix(&self.url_prefix)
            .unwrap_or(reference)
            .trim_start_matches('/');
        let relative = Path::new(name);
        if name.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| !matches!(component, std::path::Component::Normal(_)))
        {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("`{reference}` does not name a stored file"),
            ));
        }

        Ok(self.root.join(relative))
    }
}

async fn write_all(file: &mut fs::File, data: &[u8]) -> Result<(), std::io::Error> {
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await
}

/// Slugified caller suffix, or the current time in nanoseconds when none is usable.
pub fn stored_suffix(suffix: Option<&str>) -> String {
    suffix
        .map(slugify)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| OffsetDateTime::now_utc().unix_timestamp_nanos().to_string())
}

/// `My Photo.JPG` with suffix `42` becomes `my-photo_42.jpg`.
pub fn stored_file_name(original: &str, suffix: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("file");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "file".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}_{suffix}.{ext}"),
        None => format!("{base}_{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_file_name_slugifies_and_lowercases_extension() {
        assert_eq!(stored_file_name("My Photo.JPG", "42"), "my-photo_42.jpg");
        assert_eq!(stored_file_name("../../etc/passwd", "1"), "passwd_1");
        assert_eq!(stored_file_name("???.png", "1"), "file_1.png");
    }

    #[tokio::test]
    async fn store_then_read_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("files"), "/posts/files/").expect("store");

        let reference = store
            .store("diagram.svg", Some("v1"), Bytes::from_static(b"<svg/>"))
            .await
            .expect("stored");
        assert_eq!(reference, "/posts/files/diagram_v1.svg");

        let data = store.read(&reference).await.expect("read back");
        assert_eq!(data, Bytes::from_static(b"<svg/>"));
    }

    #[tokio::test]
    async fn colliding_names_do_not_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf(), "/files").expect("store");

        let first = store
            .store("a.txt", Some("same"), Bytes::from_static(b"one"))
            .await
            .expect("first");
        let second = store
            .store("a.txt", Some("same"), Bytes::from_static(b"two"))
            .await
            .expect("second");

        assert_ne!(first, second);
        assert!(second.starts_with("/files/a_same-"));
        assert_eq!(store.read(&first).await.expect("first"), "one");
        assert_eq!(store.read(&second).await.expect("second"), "two");
    }

    #[tokio::test]
    async fn empty_payloads_and_traversal_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf(), "/files").expect("store");

        assert!(matches!(
            store.store("a.txt", None, Bytes::new()).await,
            Err(UploadStorageError::EmptyPayload)
        ));
        assert!(matches!(
            store.read("/files/../secret").await,
            Err(UploadStorageError::Io(err)) if err.kind() == std::io::ErrorKind::InvalidInput
        ));
        store
            .delete("/files/missing.txt")
            .await
            .expect("missing delete is ok");
    }

    #[test]
    fn suffixes_are_slugified_before_use() {
        assert_eq!(stored_suffix(Some("Draft V2")), "draft-v2");
        assert!(
            stored_suffix(Some("!!!"))
                .chars()
                .all(|ch| ch.is_ascii_digit())
        );
        assert!(!stored_suffix(None).is_empty());
    }

    #[tokio::test]
    async fn default_suffix_is_generated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().to_path_buf(), "/files").expect("store");
        let reference = store
            .store("photo.png", None, Bytes::from_static(b"png"))
            .await
            .expect("stored");
        assert!(reference.starts_with("/files/photo_"));
        assert!(reference.ends_with(".png"));
    }
}
