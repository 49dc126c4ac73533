//! Folio post cache.
//!
//! Holds every post a backend loaded, sorted newest first, together with a
//! category index derived from the same sequence:
//!
//! - [`PostCache`]: the shared, mutable cache (`upsert`, `remove`, `replace_all`)
//! - [`PostSnapshot`]: an immutable, internally consistent view used by reads
//!
//! Visibility is not applied here; see `application::blog`.

mod index;
pub(crate) mod lock;
mod store;

pub use store::{CategoryView, PostCache, PostSnapshot, sort_posts};
