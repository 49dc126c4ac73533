use std::collections::HashMap;

use time::OffsetDateTime;

use crate::domain::posts::Post;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: String,
    pub(crate) slug: String,
    pub(crate) title: String,
    pub(crate) excerpt: String,
    pub(crate) content: String,
    pub(crate) pub_date: OffsetDateTime,
    pub(crate) last_modified: OffsetDateTime,
    pub(crate) is_published: bool,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CategoryRow {
    pub(crate) post_id: String,
    pub(crate) name: String,
}

/// Join post rows with their category rows. Category rows must arrive in
/// `position` order per post.
pub(crate) fn assemble_posts(rows: Vec<PostRow>, categories: Vec<CategoryRow>) -> Vec<Post> {
    let mut by_post: HashMap<String, Vec<String>> = HashMap::new();
    for row in categories {
        by_post.entry(row.post_id).or_default().push(row.name);
    }

    rows.into_iter()
        .map(|row| {
            let categories = by_post.remove(&row.id).unwrap_or_default();
            let mut post = Post {
                id: row.id,
                slug: row.slug,
                title: row.title,
                excerpt: row.excerpt,
                content: row.content,
                pub_date: row.pub_date,
                last_modified: row.last_modified,
                is_published: row.is_published,
                categories: Vec::new(),
            };
            post.set_categories(categories);
            post
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn row(id: &str) -> PostRow {
        PostRow {
            id: id.to_string(),
            slug: id.to_string(),
            title: id.to_uppercase(),
            excerpt: String::new(),
            content: String::new(),
            pub_date: datetime!(2024-01-01 00:00 UTC),
            last_modified: datetime!(2024-01-02 00:00 UTC),
            is_published: true,
        }
    }

    fn category(post_id: &str, name: &str) -> CategoryRow {
        CategoryRow {
            post_id: post_id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn categories_attach_to_their_posts_in_order() {
        let posts = assemble_posts(
            vec![row("a"), row("b")],
            vec![
                category("a", "Rust"),
                category("b", "Go"),
                category("a", "Async"),
                category("a", "rust"),
            ],
        );

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].categories, vec!["Rust", "Async"]);
        assert_eq!(posts[1].categories, vec!["Go"]);
        assert_eq!(posts[0].title, "A");
    }

    #[test]
    fn orphan_categories_are_ignored() {
        let posts = assemble_posts(vec![row("a")], vec![category("zzz", "Lost")]);
        assert!(posts[0].categories.is_empty());
    }
}
