//! Entry-level rules that do not depend on storage.

use time::OffsetDateTime;

/// Derive the site-relative URL of an entry.
///
/// Pages live at their slug; posts are filed under `{year}/{month:02}/{slug}`.
pub fn relative_url(is_page: bool, publish_date: OffsetDateTime, slug: &str) -> String {
    if is_page {
        slug.to_string()
    } else {
        format!(
            "{}/{:02}/{}",
            publish_date.year(),
            u8::from(publish_date.month()),
            slug
        )
    }
}
