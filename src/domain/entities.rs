//! Domain entities mirrored from persistent storage.

use time::OffsetDateTime;

/// A stored content unit, either a chronological post or a standalone page.
///
/// `slug` is the storage key and never changes once assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub author: String,
    pub is_hidden: bool,
    pub is_page: bool,
    pub allow_comments: bool,
    pub publish_date: OffsetDateTime,
    pub title: String,
    pub content: Vec<u8>,
    pub slug: String,
    pub relative_url: String,
}

/// A navigational link, keyed by its target URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub title: String,
    pub url: String,
    pub order: i64,
}
