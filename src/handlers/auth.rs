// Login and logout handlers
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::authentication::{LoginOptions, LogoutOptions, OidcAuth};
use crate::request::AuthRequest;
use crate::response::ClassicResponse;

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "returnTo")]
    pub return_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutQuery {
    #[serde(rename = "returnTo")]
    pub return_to: Option<String>,
}

/// Start a login and redirect to the identity provider
pub async fn login(
    req: HttpRequest,
    query: web::Query<LoginQuery>,
    auth: web::Data<OidcAuth>,
) -> HttpResponse {
    let request = AuthRequest::from_http(&req);
    let mut res = ClassicResponse::default();
    let options = LoginOptions {
        return_to: query.into_inner().return_to,
        ..LoginOptions::default()
    };

    let result = auth.login(&request, &mut res, options);
    auth.finish(&request, &mut res, result).await;
    res.into_http_response()
}

/// Clear the session and redirect, via the provider when `idp_logout` is set
pub async fn logout(
    req: HttpRequest,
    query: web::Query<LogoutQuery>,
    auth: web::Data<OidcAuth>,
) -> HttpResponse {
    let request = AuthRequest::from_http(&req);
    let mut res = ClassicResponse::default();
    let options = LogoutOptions {
        return_to: query.into_inner().return_to,
    };

    let result = auth.logout(&request, &mut res, options);
    auth.finish(&request, &mut res, result).await;
    res.into_http_response()
}
