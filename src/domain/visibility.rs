//! Who may see which post, and when.

use std::sync::RwLock;

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::cache::lock::{rw_read, rw_write};

use super::posts::Post;

const SOURCE: &str = "domain::visibility";

/// Identity of the caller, resolved by the presentation layer per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    Admin,
}

impl Viewer {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin { Viewer::Admin } else { Viewer::Anonymous }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Viewer::Admin)
    }
}

/// Anonymous callers see published posts whose date has passed; admins also
/// see unpublished drafts. Future-dated posts stay hidden from everyone.
pub fn is_visible(post: &Post, viewer: Viewer, now: OffsetDateTime) -> bool {
    post.pub_date <= now && (post.is_published || viewer.is_admin())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostState {
    Published,
    Scheduled,
    Draft,
}

pub fn classify(post: &Post, now: OffsetDateTime) -> PostState {
    if !post.is_published {
        PostState::Draft
    } else if post.pub_date > now {
        PostState::Scheduled
    } else {
        PostState::Published
    }
}

/// Source of the current time for visibility checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually driven clock for tests and previews.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<OffsetDateTime>,
}

impl FixedClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        *rw_write(&self.now, SOURCE, "fixed_clock.set") = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = rw_write(&self.now, SOURCE, "fixed_clock.advance");
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *rw_read(&self.now, SOURCE, "fixed_clock.now")
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

    fn post(pub_date: OffsetDateTime, published: bool) -> Post {
        Post::new("Visibility", pub_date).published(published)
    }

    #[test]
    fn anonymous_requires_past_date_and_published_flag() {
        let past = NOW - Duration::days(1);
        let future = NOW + Duration::days(1);

        assert!(is_visible(&post(past, true), Viewer::Anonymous, NOW));
        assert!(!is_visible(&post(past, false), Viewer::Anonymous, NOW));
        assert!(!is_visible(&post(future, true), Viewer::Anonymous, NOW));
        assert!(!is_visible(&post(future, false), Viewer::Anonymous, NOW));
    }

    #[test]
    fn admin_ignores_published_flag_but_not_date() {
        let past = NOW - Duration::days(1);
        let future = NOW + Duration::days(1);

        assert!(is_visible(&post(past, true), Viewer::Admin, NOW));
        assert!(is_visible(&post(past, false), Viewer::Admin, NOW));
        assert!(!is_visible(&post(future, true), Viewer::Admin, NOW));
        assert!(!is_visible(&post(future, false), Viewer::Admin, NOW));
    }

    #[test]
    fn boundary_is_inclusive() {
        assert!(is_visible(&post(NOW, true), Viewer::Anonymous, NOW));
        assert!(is_visible(&post(NOW, false), Viewer::Admin, NOW));
    }

    #[test]
    fn classify_derives_state() {
        assert_eq!(classify(&post(NOW, true), NOW), PostState::Published);
        assert_eq!(
            classify(&post(NOW + Duration::hours(1), true), NOW),
            PostState::Scheduled
        );
        assert_eq!(classify(&post(NOW, false), NOW), PostState::Draft);
    }

    #[test]
    fn fixed_clock_moves_only_when_told() {
        let clock = FixedClock::new(NOW);
        assert_eq!(clock.now(), NOW);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), NOW + Duration::minutes(5));
        clock.set(NOW);
        assert_eq!(clock.now(), NOW);
    }

    #[test]
    fn viewer_from_flag() {
        assert_eq!(Viewer::from_admin_flag(true), Viewer::Admin);
        assert_eq!(Viewer::from_admin_flag(false), Viewer::Anonymous);
    }
}
