//! The post entity and the category normalization rules shared by every backend.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;

/// A single blog entry as held in the post cache.
///
/// `id` and `slug` compare case-insensitively. Categories keep their first
/// display form; lookups and indexing use [`normalize_category`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
    pub is_published: bool,
    pub categories: Vec<String>,
}

impl Post {
    /// Create an unpublished post without identity; `save` assigns id and slug.
    pub fn new(title: impl Into<String>, pub_date: OffsetDateTime) -> Self {
        Self {
            id: String::new(),
            slug: String::new(),
            title: title.into(),
            excerpt: String::new(),
            content: String::new(),
            pub_date,
            last_modified: pub_date,
            is_published: false,
            categories: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_categories(categories);
        self
    }

    /// Replace the category list, dropping blanks and case-insensitive duplicates.
    pub fn set_categories<I, S>(&mut self, categories: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = Vec::new();
        let mut display = Vec::new();
        for raw in categories {
            let label = raw.as_ref().trim();
            if label.is_empty() {
                continue;
            }
            let key = normalize_category(label);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            display.push(label.to_string());
        }
        self.categories = display;
    }

    /// Lower-cased category keys in display order.
    pub fn category_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.categories.iter().map(|label| normalize_category(label))
    }

    pub fn has_category(&self, category: &str) -> bool {
        let wanted = normalize_category(category);
        self.category_keys().any(|key| key == wanted)
    }

    pub fn matches_id(&self, id: &str) -> bool {
        fold_case(&self.id) == fold_case(id)
    }

    pub fn matches_slug(&self, slug: &str) -> bool {
        fold_case(&self.slug) == fold_case(slug)
    }

    /// Trim identity fields and re-apply category deduplication.
    pub fn normalize(&mut self) {
        self.id = self.id.trim().to_string();
        self.slug = self.slug.trim().to_string();
        self.title = self.title.trim().to_string();
        let categories = std::mem::take(&mut self.categories);
        self.set_categories(categories);
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title", "must not be empty"));
        }
        if !self.slug.is_empty() && !super::slug::is_url_safe(&self.slug) {
            return Err(DomainError::validation(
                "slug",
                format!("`{}` contains characters that are not URL-safe", self.slug),
            ));
        }
        if self
            .id
            .chars()
            .any(|ch| ch == '/' || ch == '\\' || ch.is_control())
        {
            return Err(DomainError::validation(
                "id",
                "must not contain path separators or control characters",
            ));
        }
        Ok(())
    }
}

/// Case folding for ids, slugs and categories. Storage keys derived from an id
/// must use the same rule so two ids equal here never share a file or row.
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

pub fn normalize_category(category: &str) -> String {
    fold_case(category.trim())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn sample() -> Post {
        Post::new("Hello", datetime!(2024-03-01 00:00 UTC))
    }

    #[test]
    fn categories_are_deduplicated_case_insensitively() {
        let post = sample().with_categories(["Rust", " rust ", "Go", "", "GO", "Tokio"]);
        assert_eq!(post.categories, vec!["Rust", "Go", "Tokio"]);
        let keys: Vec<String> = post.category_keys().collect();
        assert_eq!(keys, vec!["rust", "go", "tokio"]);
    }

    #[test]
    fn has_category_ignores_case() {
        let post = sample().with_categories(["Go"]);
        assert!(post.has_category("go"));
        assert!(post.has_category("GO"));
        assert!(!post.has_category("rust"));
    }

    #[test]
    fn identity_matching_ignores_case() {
        let post = sample().with_id("AbC-1").with_slug("Hello-World");
        assert!(post.matches_id("abc-1"));
        assert!(post.matches_slug("hello-world"));
        assert!(!post.matches_slug("hello"));
    }

    #[test]
    fn identity_matching_folds_non_ascii_letters() {
        let post = sample().with_id("Ärger").with_slug("Hello");
        assert!(post.matches_id("ärger"));
        assert!(post.matches_id("ÄRGER"));
        assert!(!post.matches_id("arger"));
        assert_eq!(fold_case("Ärger"), fold_case("ärger"));
    }

    #[test]
    fn validate_rejects_blank_title_and_unsafe_slug() {
        let blank = Post::new("   ", datetime!(2024-03-01 00:00 UTC));
        assert!(matches!(
            blank.validate(),
            Err(DomainError::Validation { field: "title", .. })
        ));

        let unsafe_slug = sample().with_slug("hello world");
        assert!(matches!(
            unsafe_slug.validate(),
            Err(DomainError::Validation { field: "slug", .. })
        ));

        let unsafe_id = sample().with_id("../etc");
        assert!(matches!(
            unsafe_id.validate(),
            Err(DomainError::Validation { field: "id", .. })
        ));

        assert!(sample().with_slug("hello-world").validate().is_ok());
    }

    #[test]
    fn normalize_trims_identity() {
        let mut post = sample().with_id("  id-1 ").with_slug(" hello ");
        post.categories = vec!["A".into(), "a".into()];
        post.normalize();
        assert_eq!(post.id, "id-1");
        assert_eq!(post.slug, "hello");
        assert_eq!(post.categories, vec!["A"]);
    }
}
