//! Flat-file backend: one TOML document per post.
//!
//! Layout under the content directory:
//!
//! ```text
//! posts/<id>.toml
//! files/<stem>_<suffix>.<ext>
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::fs;
use tracing::{debug, warn};

use crate::application::repos::{PostBackend, RepoError};
use crate::domain::posts::{Post, fold_case};

use super::uploads::FileStore;

const POSTS_DIR: &str = "posts";
const DOCUMENT_EXTENSION: &str = "toml";

/// On-disk shape of a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PostDocument {
    id: String,
    slug: String,
    title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    last_modified: OffsetDateTime,
    #[serde(default)]
    is_published: bool,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    content: String,
}

impl From<&Post> for PostDocument {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            slug: post.slug.clone(),
            title: post.title.clone(),
            pub_date: post.pub_date,
            last_modified: post.last_modified,
            is_published: post.is_published,
            categories: post.categories.clone(),
            excerpt: post.excerpt.clone(),
            content: post.content.clone(),
        }
    }
}

impl From<PostDocument> for Post {
    fn from(document: PostDocument) -> Self {
        let mut post = Post {
            id: document.id,
            slug: document.slug,
            title: document.title,
            excerpt: document.excerpt,
            content: document.content,
            pub_date: document.pub_date,
            last_modified: document.last_modified,
            is_published: document.is_published,
            categories: Vec::new(),
        };
        post.set_categories(document.categories);
        post
    }
}

#[derive(Debug, Clone)]
pub struct FileBackend {
    posts_dir: PathBuf,
    files: FileStore,
}

impl FileBackend {
    /// Open (and create if needed) the content directory layout.
    pub fn open(content_dir: &Path, files: FileStore) -> Result<Self, std::io::Error> {
        let posts_dir = content_dir.join(POSTS_DIR);
        std::fs::create_dir_all(&posts_dir)?;
        Ok(Self { posts_dir, files })
    }

    pub fn posts_dir(&self) -> &Path {
        &self.posts_dir
    }

    fn document_path(&self, id: &str) -> Result<PathBuf, RepoError> {
        if id.is_empty()
            || id.starts_with('.')
            || id
                .chars()
                .any(|ch| ch == '/' || ch == '\\' || ch.is_control())
        {
            return Err(RepoError::invalid_input(format!(
                "post id `{id}` cannot be used as a file name"
            )));
        }
        Ok(self
            .posts_dir
            .join(format!("{}.{DOCUMENT_EXTENSION}", fold_case(id))))
    }
}

pub(crate) fn parse_document(raw: &str) -> Result<Post, RepoError> {
    toml::from_str::<PostDocument>(raw)
        .map(Post::from)
        .map_err(RepoError::serialization)
}

pub(crate) fn render_document(post: &Post) -> Result<String, RepoError> {
    toml::to_string_pretty(&PostDocument::from(post)).map_err(RepoError::serialization)
}

#[async_trait]
impl PostBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load_all(&self) -> Result<Vec<Post>, RepoError> {
        let mut entries = fs::read_dir(&self.posts_dir).await?;
        let mut posts = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }

            let raw = match fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "skipping post document that could not be read"
                    );
                    continue;
                }
            };
            match parse_document(&raw) {
                Ok(post) => posts.push(post),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable post document");
                }
            }
        }

        debug!(dir = %self.posts_dir.display(), posts = posts.len(), "read post documents");
        Ok(posts)
    }

    async fn persist(&self, post: &Post) -> Result<(), RepoError> {
        let path = self.document_path(&post.id)?;
        let rendered = render_document(post)?;

        let staging = path.with_extension(format!("{DOCUMENT_EXTENSION}.tmp"));
        fs::write(&staging, rendered.as_bytes()).await?;
        if let Err(err) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn erase(&self, post: &Post) -> Result<(), RepoError> {
        let path = self.document_path(&post.id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn store_file(
        &self,
        bytes: Bytes,
        file_name: &str,
        suffix: Option<&str>,
    ) -> Result<String, RepoError> {
        Ok(self.files.store(file_name, suffix, bytes).await?)
    }
}
