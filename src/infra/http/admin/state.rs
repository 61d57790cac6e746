use std::num::NonZeroUsize;

use crate::application::{content::ContentService, site::SiteService};

#[derive(Clone)]
pub struct AdminState {
    pub site: SiteService,
    pub content: ContentService,
    pub entries_per_page: NonZeroUsize,
}

impl AdminState {
    pub fn new(site: SiteService, content: ContentService) -> Self {
        let entries_per_page = site.settings().admin_entries_per_page;
        Self {
            site,
            content,
            entries_per_page,
        }
    }
}
