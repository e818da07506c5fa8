// HTTP handlers for the login, callback and logout routes
pub mod auth;
pub mod callback;


pub use auth::{login, logout, LoginQuery, LogoutQuery};
pub use callback::{callback_form, callback_query};

use actix_web::web;

use crate::settings::Routes;

/// Mount the auth routes at their configured paths.
///
/// Expects a `web::Data<OidcAuth>` in the app data.
pub fn configure(cfg: &mut web::ServiceConfig, routes: &Routes) {
    cfg.route(&routes.login, web::get().to(login))
        .route(&routes.logout, web::get().to(logout))
        .route(&routes.callback, web::get().to(callback_query))
        .route(&routes.callback, web::post().to(callback_form));
}
