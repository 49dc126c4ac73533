//! The shared post cache.
//!
//! Every read works on an immutable [`PostSnapshot`]; writers build a new
//! snapshot off to the side and swap it in, so readers never observe a
//! sequence and a category index that disagree.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use metrics::{counter, gauge};
use tracing::{debug, warn};

use crate::domain::posts::{Post, fold_case};

use super::index::CategoryIndex;
use super::lock::{mutex_lock, rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// A consistent view of the cache: posts sorted by `pub_date` descending plus
/// the category index built from exactly that sequence.
#[derive(Debug, Default)]
pub struct PostSnapshot {
    posts: Vec<Post>,
    index: CategoryIndex,
}

impl PostSnapshot {
    fn build(mut posts: Vec<Post>) -> Self {
        sort_posts(&mut posts);
        let index = CategoryIndex::build(&posts);
        Self { posts, index }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn by_id(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|post| post.matches_id(id))
    }

    pub fn by_slug(&self, slug: &str) -> Option<&Post> {
        self.posts.iter().find(|post| post.matches_slug(slug))
    }

    pub fn by_category<'a>(&'a self, category: &str) -> impl Iterator<Item = &'a Post> + 'a {
        let positions = self.index.positions(category);
        positions.iter().map(move |&position| &self.posts[position])
    }

    /// Distinct lower-cased category names, regardless of visibility.
    pub fn categories(&self) -> BTreeSet<String> {
        self.index.keys().map(str::to_string).collect()
    }

    pub fn groups(&self) -> impl Iterator<Item = CategoryView<'_>> {
        self.index
            .entries()
            .map(|(key, label, positions)| CategoryView {
                key,
                label,
                positions,
                posts: &self.posts,
            })
    }

    pub fn group(&self, category: &str) -> Option<CategoryView<'_>> {
        self.index
            .get(category)
            .map(|(key, label, positions)| CategoryView {
                key,
                label,
                positions,
                posts: &self.posts,
            })
    }

    /// True when no post other than `owner_id` already uses `slug`.
    pub fn slug_available(&self, slug: &str, owner_id: &str) -> bool {
        self.by_slug(slug)
            .is_none_or(|existing| existing.matches_id(owner_id))
    }
}

/// One entry of the precomputed category grouping.
#[derive(Debug, Clone, Copy)]
pub struct CategoryView<'a> {
    pub key: &'a str,
    pub label: &'a str,
    positions: &'a [usize],
    posts: &'a [Post],
}

impl<'a> CategoryView<'a> {
    pub fn posts(&self) -> impl Iterator<Item = &'a Post> + 'a {
        let posts = self.posts;
        self.positions.iter().map(move |&position| &posts[position])
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Process-wide cache of every known post.
///
/// Reads clone the current `Arc<PostSnapshot>` under a short read lock.
/// Mutations are serialized by `writer`, rebuild the snapshot without holding
/// the read/write lock, then publish it with a single pointer swap.
#[derive(Debug, Default)]
pub struct PostCache {
    current: RwLock<Arc<PostSnapshot>>,
    writer: Mutex<()>,
}

impl PostCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_posts(posts: Vec<Post>) -> Self {
        let cache = Self::new();
        cache.replace_all(posts);
        cache
    }

    pub fn snapshot(&self) -> Arc<PostSnapshot> {
        Arc::clone(&rw_read(&self.current, SOURCE, "snapshot"))
    }

    pub fn all(&self) -> Vec<Post> {
        self.snapshot().posts().to_vec()
    }

    pub fn by_slug(&self, slug: &str) -> Option<Post> {
        self.snapshot().by_slug(slug).cloned()
    }

    pub fn by_id(&self, id: &str) -> Option<Post> {
        self.snapshot().by_id(id).cloned()
    }

    pub fn by_category(&self, category: &str) -> Vec<Post> {
        self.snapshot().by_category(category).cloned().collect()
    }

    pub fn categories(&self) -> BTreeSet<String> {
        self.snapshot().categories()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swap in a complete post set, as loaded from a backend.
    ///
    /// Posts whose ids match case-insensitively collapse to the most recently
    /// modified one.
    pub fn replace_all(&self, posts: Vec<Post>) {
        let _writer = mutex_lock(&self.writer, SOURCE, "replace_all");
        let snapshot = PostSnapshot::build(dedupe_by_id(posts));
        self.publish(snapshot);
        counter!("folio_cache_reload_total").increment(1);
    }

    /// Replace the post with the same id, or append a new one.
    pub fn upsert(&self, post: Post) {
        let _writer = mutex_lock(&self.writer, SOURCE, "upsert");
        let mut posts = self.snapshot().posts().to_vec();
        match posts.iter().position(|existing| existing.matches_id(&post.id)) {
            Some(position) => posts[position] = post,
            None => posts.push(post),
        }
        self.publish(PostSnapshot::build(posts));
        counter!("folio_cache_upsert_total").increment(1);
    }

    /// Remove the post with `id`. Returns `false` when nothing matched.
    pub fn remove(&self, id: &str) -> bool {
        let _writer = mutex_lock(&self.writer, SOURCE, "remove");
        let current = self.snapshot();
        if current.by_id(id).is_none() {
            return false;
        }
        let posts = current
            .posts()
            .iter()
            .filter(|post| !post.matches_id(id))
            .cloned()
            .collect();
        self.publish(PostSnapshot::build(posts));
        counter!("folio_cache_remove_total").increment(1);
        true
    }

    fn publish(&self, snapshot: PostSnapshot) {
        let len = snapshot.len();
        let categories = snapshot.index.len();
        *rw_write(&self.current, SOURCE, "publish") = Arc::new(snapshot);
        gauge!("folio_cache_posts").set(len as f64);
        debug!(posts = len, categories, "published post cache snapshot");
    }
}

fn dedupe_by_id(posts: Vec<Post>) -> Vec<Post> {
    let mut kept: Vec<Post> = Vec::with_capacity(posts.len());
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(posts.len());

    for post in posts {
        match slots.entry(fold_case(&post.id)) {
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(post);
            }
            Entry::Occupied(slot) => {
                let existing = &mut kept[*slot.get()];
                let newer = post.last_modified > existing.last_modified;
                let (kept_id, dropped_id) = if newer {
                    (post.id.as_str(), existing.id.as_str())
                } else {
                    (existing.id.as_str(), post.id.as_str())
                };
                warn!(
                    kept = kept_id,
                    dropped = dropped_id,
                    "duplicate post id in loaded set; keeping the most recently modified"
                );
                if newer {
                    *existing = post;
                }
            }
        }
    }

    kept
}

/// Stable sort by `pub_date`, newest first; ties keep their relative order.
pub fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(|left, right| right.pub_date.cmp(&left.pub_date));
}
