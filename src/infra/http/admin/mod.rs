mod entries;
mod links;
mod shared;
mod state;

pub use state::AdminState;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::middleware::{log_responses, set_request_context};

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin", get(entries::admin_posts))
        .route("/admin/", get(entries::admin_posts))
        .route("/admin/home", get(entries::admin_posts))
        .route("/admin/pages", get(entries::admin_pages))
        .route("/admin/edit", get(entries::admin_edit))
        .route("/admin/submit_entry", post(entries::admin_submit_entry))
        .route("/admin/links", get(links::admin_links))
        .route("/admin/submit_links", post(links::admin_submit_link))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}
