//! The blog repository: visibility-checked reads over the post cache and
//! persist-then-mirror writes through a backend.

use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::application::repos::{PostBackend, RepoError};
use crate::cache::PostCache;
use crate::domain::error::DomainError;
use crate::domain::posts::Post;
use crate::domain::slug::{SlugError, generate_unique_slug};
use crate::domain::visibility::{Clock, PostState, Viewer, classify, is_visible};

#[derive(Debug, Error)]
pub enum BlogError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("slug `{slug}` is already used by another post")]
    SlugTaken { slug: String },
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Posts sharing one category, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub label: String,
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PostCounts {
    pub total: usize,
    pub published: usize,
    pub scheduled: usize,
    pub drafts: usize,
    pub categories: usize,
}

/// Single entry point for the presentation layer.
///
/// Reads never fail: absence and invisibility both come back as `None` or an
/// empty list. Writes hold `writes` across the backend call and the cache
/// update so the cache never reflects an uncommitted or reordered write.
pub struct BlogRepository {
    backend: Arc<dyn PostBackend>,
    cache: PostCache,
    clock: Arc<dyn Clock>,
    writes: Mutex<()>,
}

impl BlogRepository {
    /// Populate the cache from `backend` and return a ready repository.
    pub async fn load(
        backend: Arc<dyn PostBackend>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RepoError> {
        let posts = backend.load_all().await?;
        info!(backend = backend.name(), posts = posts.len(), "loaded posts");
        Ok(Self::with_cache(backend, PostCache::from_posts(posts), clock))
    }

    pub fn with_cache(
        backend: Arc<dyn PostBackend>,
        cache: PostCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            cache,
            clock,
            writes: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &PostCache {
        &self.cache
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn list_posts(&self, viewer: Viewer, window: PageWindow) -> Vec<Post> {
        let now = self.clock.now();
        let snapshot = self.cache.snapshot();
        let visible = snapshot
            .posts()
            .iter()
            .filter(|post| is_visible(post, viewer, now));
        window.apply(visible).cloned().collect()
    }

    pub fn visible_count(&self, viewer: Viewer) -> usize {
        let now = self.clock.now();
        self.cache
            .snapshot()
            .posts()
            .iter()
            .filter(|post| is_visible(post, viewer, now))
            .count()
    }

    pub fn list_by_category(&self, viewer: Viewer, category: &str) -> Vec<Post> {
        let now = self.clock.now();
        self.cache
            .snapshot()
            .by_category(category)
            .filter(|post| is_visible(post, viewer, now))
            .cloned()
            .collect()
    }

    /// Group visible posts by category, optionally restricted to one key.
    ///
    /// Groups with no post visible to `viewer` are left out so drafts and
    /// scheduled posts do not leak through their category names.
    pub fn grouped_by_category(
        &self,
        viewer: Viewer,
        category: Option<&str>,
    ) -> Vec<CategoryGroup> {
        let now = self.clock.now();
        let snapshot = self.cache.snapshot();
        let views: Vec<_> = match category {
            Some(category) => snapshot.group(category).into_iter().collect(),
            None => snapshot.groups().collect(),
        };

        views
            .into_iter()
            .filter_map(|view| {
                let posts: Vec<Post> = view
                    .posts()
                    .filter(|post| is_visible(post, viewer, now))
                    .cloned()
                    .collect();
                (!posts.is_empty()).then(|| CategoryGroup {
                    category: view.key.to_string(),
                    label: view.label.to_string(),
                    posts,
                })
            })
            .collect()
    }

    pub fn get_by_slug(&self, viewer: Viewer, slug: &str) -> Option<Post> {
        let now = self.clock.now();
        self.cache
            .snapshot()
            .by_slug(slug)
            .filter(|post| is_visible(post, viewer, now))
            .cloned()
    }

    pub fn get_by_id(&self, viewer: Viewer, id: &str) -> Option<Post> {
        let now = self.clock.now();
        self.cache
            .snapshot()
            .by_id(id)
            .filter(|post| is_visible(post, viewer, now))
            .cloned()
    }

    /// Lower-cased category names of posts visible to `viewer`, sorted.
    pub fn list_categories(&self, viewer: Viewer) -> Vec<String> {
        let now = self.clock.now();
        let snapshot = self.cache.snapshot();
        snapshot
            .posts()
            .iter()
            .filter(|post| is_visible(post, viewer, now))
            .flat_map(Post::category_keys)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Counts by derived state, for dashboards. Not visibility-filtered.
    pub fn counts(&self) -> PostCounts {
        let now = self.clock.now();
        let snapshot = self.cache.snapshot();
        let mut counts = PostCounts {
            total: snapshot.len(),
            categories: snapshot.categories().len(),
            ..PostCounts::default()
        };
        for post in snapshot.posts() {
            match classify(post, now) {
                PostState::Published => counts.published += 1,
                PostState::Scheduled => counts.scheduled += 1,
                PostState::Draft => counts.drafts += 1,
            }
        }
        counts
    }

    /// Persist `post`, then mirror it into the cache.
    ///
    /// Missing ids get a fresh UUID and missing slugs are derived from the
    /// title. The cache is left untouched when the backend fails.
    #[instrument(skip_all, fields(backend = self.backend.name(), id = %post.id))]
    pub async fn save(&self, mut post: Post) -> Result<Post, BlogError> {
        post.normalize();
        post.validate()?;

        let _write = self.writes.lock().await;
        let snapshot = self.cache.snapshot();

        match snapshot.by_id(&post.id) {
            Some(existing) => post.id.clone_from(&existing.id),
            None if post.id.is_empty() => post.id = Uuid::new_v4().to_string(),
            None => {}
        }
        let owner = post.id.clone();
        if post.slug.is_empty() {
            post.slug = generate_unique_slug(&post.title, |candidate| {
                snapshot.slug_available(candidate, &owner)
            })?;
        } else if !snapshot.slug_available(&post.slug, &owner) {
            return Err(BlogError::SlugTaken { slug: post.slug });
        }
        post.last_modified = self.clock.now();

        if let Err(err) = self.backend.persist(&post).await {
            counter!("folio_backend_write_failures_total", "op" => "persist").increment(1);
            warn!(error = %err, "backend rejected post; cache unchanged");
            return Err(err.into());
        }

        self.cache.upsert(post.clone());
        info!(slug = %post.slug, "saved post");
        Ok(post)
    }

    /// Erase `post` through the backend, then drop it from the cache.
    #[instrument(skip_all, fields(backend = self.backend.name(), id = %post.id))]
    pub async fn delete(&self, post: &Post) -> Result<(), BlogError> {
        let _write = self.writes.lock().await;

        if let Err(err) = self.backend.erase(post).await {
            counter!("folio_backend_write_failures_total", "op" => "erase").increment(1);
            warn!(error = %err, "backend failed to erase post; cache unchanged");
            return Err(err.into());
        }

        let removed = self.cache.remove(&post.id);
        info!(removed, "deleted post");
        Ok(())
    }

    pub async fn save_file(
        &self,
        bytes: Bytes,
        file_name: &str,
        suffix: Option<&str>,
    ) -> Result<String, BlogError> {
        let size = bytes.len();
        let reference = self
            .backend
            .store_file(bytes, file_name, suffix)
            .await
            .inspect_err(|err| {
                counter!("folio_backend_write_failures_total", "op" => "store_file").increment(1);
                warn!(file_name, error = %err, "backend failed to store file");
            })?;
        info!(file_name, size, reference = %reference, "stored file");
        Ok(reference)
    }

    /// Re-read every post from the backend and swap the cache wholesale.
    pub async fn reload(&self) -> Result<usize, BlogError> {
        let _write = self.writes.lock().await;
        let posts = self.backend.load_all().await?;
        let count = posts.len();
        self.cache.replace_all(posts);
        info!(backend = self.backend.name(), posts = count, "reloaded posts");
        Ok(count)
    }
}
