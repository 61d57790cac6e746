//! Archive pagination.
//!
//! Archives never count the collection. A page asks the repository for one
//! entry more than it displays; the surplus entry only signals that a next
//! page exists and is dropped before rendering.

use std::{fmt, num::NonZeroU32, str::FromStr};

use thiserror::Error;

/// One-based archive page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageNumber(NonZeroU32);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{0}` is not a page number")]
pub struct PageNumberError(pub String);

impl PageNumber {
    pub const FIRST: PageNumber = PageNumber(NonZeroU32::MIN);

    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    pub fn is_first(self) -> bool {
        self == Self::FIRST
    }

    /// Entries to skip before this page starts.
    pub fn offset(self, per_page: usize) -> usize {
        (self.get() as usize - 1).saturating_mul(per_page)
    }

    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    pub fn previous(self) -> Option<Self> {
        Self::new(self.get() - 1)
    }

    /// Site-relative path of this archive page. Page one is the site root.
    pub fn path(self) -> String {
        if self.is_first() {
            "/".to_string()
        } else {
            format!("/{}", self.get())
        }
    }
}

impl Default for PageNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PageNumber {
    type Err = PageNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PageNumberError(s.to_string()));
        }
        s.parse::<u32>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| PageNumberError(s.to_string()))
    }
}

/// Trim a lookahead result set to `display` entries, reporting whether more exist.
pub fn split_lookahead<T>(mut items: Vec<T>, display: usize) -> (Vec<T>, bool) {
    let has_more = items.len() > display;
    items.truncate(display);
    (items, has_more)
}

/// One page of an archive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePage<T> {
    pub items: Vec<T>,
    pub page: PageNumber,
    pub has_more: bool,
}

impl<T> ArchivePage<T> {
    /// Path of the following page, present only when the lookahead saw more entries.
    pub fn next_path(&self) -> Option<String> {
        if self.has_more {
            self.page.next().map(PageNumber::path)
        } else {
            None
        }
    }

    /// Path of the preceding page. Page two links back to the root, never `/1`.
    pub fn previous_path(&self) -> Option<String> {
        self.page.previous().map(PageNumber::path)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ArchivePage<U> {
        ArchivePage {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            has_more: self.has_more,
        }
    }
}
