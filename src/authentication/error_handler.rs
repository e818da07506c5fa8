use actix_web::http::header::{self, HeaderValue};
use async_trait::async_trait;

use super::errors::AuthError;
use crate::request::AuthRequest;
use crate::response::ResponseWriter;
use crate::utils::responses::{generic_status_body, JSON_CONTENT_TYPE};

/// Whether an error handler considers the response dealt with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Handled,
    Unhandled,
}

/// Replaceable renderer for authentication failures.
///
/// Whatever a handler returns, a response it leaves unfinalized is completed
/// by [`terminate`].
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn handle(
        &self,
        req: &AuthRequest,
        res: &mut dyn ResponseWriter,
        err: &AuthError,
    ) -> Completion;
}

/// Logs the error and leaves rendering to the default terminator
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorHandler;

#[async_trait]
impl ErrorHandler for DefaultErrorHandler {
    async fn handle(
        &self,
        req: &AuthRequest,
        _res: &mut dyn ResponseWriter,
        err: &AuthError,
    ) -> Completion {
        if err.status().is_server_error() {
            log::error!("Authentication failed on {}: {err}", req.path);
        } else {
            log::warn!("Authentication failed on {}: {err}", req.path);
        }
        Completion::Unhandled
    }
}

/// Default terminator: a generic JSON body with the error's status
pub fn terminate(res: &mut dyn ResponseWriter, err: &AuthError) {
    if res.is_finalized() {
        return;
    }
    let status = err.status();
    res.set_status(status);
    res.insert_header(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    res.end(generic_status_body(status));
}
