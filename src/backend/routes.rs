// src/backend/routes.rs
use axum::{
    routing::{get, post},
    Router,
};

use crate::backend::auth;
use crate::backend::handlers::{groups, items, materials, reserves, users, works};
use crate::backend::AppState;

/// Everything mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/users", get(users::list_users))
        .route("/users/me", get(auth::me))
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route("/items", get(items::list_items).post(items::create_item))
        .route(
            "/items/:id",
            get(items::get_item)
                .put(items::update_item)
                .patch(items::patch_item)
                .delete(items::delete_item),
        )
        .route("/items/:id/totals", get(items::item_totals))
        .route("/works", get(works::list_works).post(works::create_work))
        .route(
            "/works/:id",
            get(works::get_work)
                .put(works::update_work)
                .patch(works::patch_work)
                .delete(works::delete_work),
        )
        .route(
            "/works/:id/details/:kind/:month/attachment",
            post(works::upload_detail_attachment),
        )
        .route(
            "/materials",
            get(materials::list_materials).post(materials::upload_material),
        )
        .route(
            "/materials/:id",
            get(materials::get_material).delete(materials::delete_material),
        )
        .route(
            "/reserves",
            get(reserves::list_reserves).post(reserves::create_reserve),
        )
        .route("/reserves/:id", get(reserves::get_reserve))
        .route("/reserves/:id/write_off", post(reserves::write_off))
}
