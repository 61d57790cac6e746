use askama::Template;

use crate::{domain::entities::EntryRecord, presentation::views::RenderContext};

/// Values pre-filled into the entry editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditFormView {
    pub is_new: bool,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub is_page: bool,
    pub hidden: bool,
    pub allow_comments: bool,
}

impl EditFormView {
    /// Blank form. New posts allow comments by default, new pages do not.
    pub fn blank(is_page: bool) -> Self {
        Self {
            is_new: true,
            slug: String::new(),
            title: String::new(),
            content: String::new(),
            author: String::new(),
            is_page,
            hidden: false,
            allow_comments: !is_page,
        }
    }

    pub fn from_entry(entry: &EntryRecord) -> Self {
        Self {
            is_new: false,
            slug: entry.slug.clone(),
            title: entry.title.clone(),
            content: String::from_utf8_lossy(&entry.content).into_owned(),
            author: entry.author.clone(),
            is_page: entry.is_page,
            hidden: entry.is_hidden,
            allow_comments: entry.allow_comments,
        }
    }
}

#[derive(Template)]
#[template(path = "admin/entries.html")]
pub struct AdminEntriesTemplate {
    pub view: RenderContext,
    pub is_pages: bool,
    pub added: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/links.html")]
pub struct AdminLinksTemplate {
    pub view: RenderContext,
    pub added: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/edit.html")]
pub struct AdminEditTemplate {
    pub view: RenderContext,
    pub form: EditFormView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_forms_default_comment_policy_by_kind() {
        assert!(EditFormView::blank(false).allow_comments);
        assert!(!EditFormView::blank(true).allow_comments);
        assert!(EditFormView::blank(true).is_new);
    }
}
