// Callback handlers for query and form_post response modes
use actix_web::{web, HttpRequest, HttpResponse};
use log::debug;

use crate::authentication::OidcAuth;
use crate::oauth::CallbackParams;
use crate::request::AuthRequest;
use crate::response::ClassicResponse;

/// Callback delivered as a query string (`response_mode=query`)
pub async fn callback_query(
    req: HttpRequest,
    query: web::Query<CallbackParams>,
    auth: web::Data<OidcAuth>,
) -> HttpResponse {
    debug!("Callback received via query");
    complete(&req, query.into_inner(), &auth).await
}

/// Callback delivered as a form body (`response_mode=form_post`)
pub async fn callback_form(
    req: HttpRequest,
    form: web::Form<CallbackParams>,
    auth: web::Data<OidcAuth>,
) -> HttpResponse {
    debug!("Callback received via form_post");
    complete(&req, form.into_inner(), &auth).await
}

async fn complete(req: &HttpRequest, params: CallbackParams, auth: &OidcAuth) -> HttpResponse {
    let request = AuthRequest::from_http(req);
    let mut res = ClassicResponse::default();

    let result = auth.callback(&request, &mut res, params).await;
    auth.finish(&request, &mut res, result).await;
    res.into_http_response()
}
