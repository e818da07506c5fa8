// Tests for the auth-required gate across both transports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header::{self, HeaderValue};
use actix_web::http::{Method, StatusCode};

use oidc_session::authentication::OidcAuth;
use oidc_session::gate::{GateOutcome, NoHandler};
use oidc_session::models::now_epoch;
use oidc_session::request::AuthRequest;
use oidc_session::response::{ClassicResponse, EdgeResponse, ResponseWriter};
use oidc_session::settings::AuthSettings;
use oidc_session::testing::constants::TEST_SUBJECT;
use oidc_session::testing::{MockOidcClient, TestFixtures};

fn auth(settings: AuthSettings) -> OidcAuth {
    TestFixtures::auth(settings, Arc::new(MockOidcClient::new()))
}

/// Session cookies last written `age` seconds ago
fn session_cookies(auth: &OidcAuth, age: i64) -> Vec<Cookie<'static>> {
    let issued_at = now_epoch() - age;
    auth.sessions()
        .codec()
        .encode(
            &TestFixtures::session(issued_at),
            &AuthRequest::new(Method::GET, "/"),
            issued_at,
        )
        .unwrap()
}

fn location<R: ResponseWriter>(res: &R) -> Option<String> {
    res.header(&header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn app_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new("app_pref", "dark");
    cookie.set_same_site(Some(SameSite::Lax));
    cookie
}

#[actix_web::test]
async fn test_api_request_without_session_gets_401() {
    let auth = auth(TestFixtures::settings());
    let called = AtomicBool::new(false);
    let flag = &called;

    let req = AuthRequest::new(Method::GET, "/api/private");
    let res: ClassicResponse = auth
        .gate()
        .handle(
            &req,
            Some(move |_req, _session| async move {
                flag.store(true, Ordering::SeqCst);
                ClassicResponse::default()
            }),
        )
        .await;

    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.header(&header::CONTENT_TYPE),
        Some(&HeaderValue::from_static("application/json"))
    );
    let body: serde_json::Value = serde_json::from_str(res.body().unwrap()).unwrap();
    assert_eq!(body["error"], "not_authenticated");
    assert!(body["description"].is_string());
}

#[actix_web::test]
async fn test_page_request_redirects_to_login() {
    let auth = auth(TestFixtures::settings());

    let req = AuthRequest::new(Method::GET, "/private");
    let res: ClassicResponse = auth
        .gate()
        .handle(&req, None::<NoHandler<ClassicResponse>>)
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res).as_deref(), Some("/login?returnTo=%2Fprivate"));

    let req = AuthRequest::new(Method::GET, "/private/report?year=2024&q=a b");
    let res: EdgeResponse = auth
        .gate()
        .handle(&req, None::<NoHandler<EdgeResponse>>)
        .await;
    assert_eq!(
        location(&res).as_deref(),
        Some("/login?returnTo=%2Fprivate%2Freport%3Fyear%3D2024%26q%3Da%20b")
    );
    assert_eq!(res.body(), None);
}

#[actix_web::test]
async fn test_error_on_required_auth_returns_401_for_pages() {
    let mut raw = TestFixtures::raw_settings();
    raw.error_on_required_auth = Some(true);
    let auth = auth(raw.validate().unwrap());

    match auth
        .gate()
        .evaluate::<ClassicResponse>(&AuthRequest::new(Method::GET, "/private"))
    {
        GateOutcome::Denied(res) => assert_eq!(res.status(), StatusCode::UNAUTHORIZED),
        other => panic!("expected denial, got {other:?}"),
    }
}

#[actix_web::test]
async fn test_authenticated_request_reaches_handler() {
    let auth = auth(TestFixtures::settings());
    let req = TestFixtures::request_with_cookies(Method::GET, "/private", &session_cookies(&auth, 5));

    let res: ClassicResponse = auth
        .gate()
        .handle(&req, Some(|_req: AuthRequest, session: Option<oidc_session::Session>| async move {
            let mut res = ClassicResponse::default();
            let subject = session
                .as_ref()
                .and_then(|s| s.subject())
                .unwrap_or_default()
                .to_string();
            res.end(subject);
            res
        }))
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.body(), Some(TEST_SUBJECT));
    assert!(res.cookies().is_empty(), "fresh session needs no renewal");
}

#[actix_web::test]
async fn test_renewal_cookies_precede_handler_cookies() {
    let auth = auth(TestFixtures::settings());
    let req = TestFixtures::request_with_cookies(
        Method::GET,
        "/private",
        &session_cookies(&auth, 10_000),
    );

    let res: ClassicResponse = auth
        .gate()
        .handle(&req, Some(|_req, _session| async {
            let mut res = ClassicResponse::default();
            res.set_cookie(app_cookie());
            res.end("ok".to_string());
            res
        }))
        .await;

    let names: Vec<&str> = res.cookies().iter().map(Cookie::name).collect();
    assert_eq!(names, vec!["appSession", "app_pref"]);
    assert!(!res.cookies()[0].value().is_empty());
    assert_eq!(res.body(), Some("ok"));
}

#[actix_web::test]
async fn test_edge_handler_redirect_keeps_renewal_cookies() {
    let auth = auth(TestFixtures::settings());
    let req = TestFixtures::request_with_cookies(
        Method::GET,
        "/dashboard",
        &session_cookies(&auth, 10_000),
    );

    let res: EdgeResponse = auth
        .gate()
        .handle(&req, Some(|_req, _session| async {
            let mut res = EdgeResponse::default();
            res.set_cookie(app_cookie());
            res.redirect("/dashboard/home", StatusCode::TEMPORARY_REDIRECT);
            res
        }))
        .await;

    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    let names: Vec<&str> = res.cookies().iter().map(Cookie::name).collect();
    assert_eq!(names, vec!["appSession", "app_pref"]);
}

#[actix_web::test]
async fn test_unusable_cookie_is_cleared_on_denial() {
    let auth = auth(TestFixtures::settings());
    let req = AuthRequest::new(Method::GET, "/private").with_cookie("appSession", "garbage");

    let res: ClassicResponse = auth
        .gate()
        .handle(&req, None::<NoHandler<ClassicResponse>>)
        .await;

    assert_eq!(res.status(), StatusCode::FOUND);
    let cleared = res
        .cookies()
        .iter()
        .find(|c| c.name() == "appSession")
        .unwrap();
    assert!(cleared.value().is_empty());
}

#[actix_web::test]
async fn test_expired_session_is_denied() {
    let auth = auth(TestFixtures::settings());
    let req = TestFixtures::request_with_cookies(
        Method::GET,
        "/api/data",
        &session_cookies(&auth, 90_000),
    );

    let outcome = auth.gate().evaluate::<ClassicResponse>(&req);
    assert!(matches!(outcome, GateOutcome::Denied(ref res) if res.status() == StatusCode::UNAUTHORIZED));
}

#[actix_web::test]
async fn test_exempt_paths_skip_resolution() {
    let mut raw = TestFixtures::raw_settings();
    raw.gate.exempt_prefixes = Some(vec!["/static".to_string()]);
    let auth = auth(raw.validate().unwrap());
    let gate = auth.gate();

    for path in ["/login", "/callback", "/static/app.css"] {
        let req = AuthRequest::new(Method::GET, path).with_cookie("appSession", "garbage");
        let res: ClassicResponse = gate
            .handle(&req, Some(|_req, session: Option<oidc_session::Session>| async move {
                assert!(session.is_none());
                let mut res = ClassicResponse::default();
                res.end("public".to_string());
                res
            }))
            .await;
        assert_eq!(res.body(), Some("public"), "{path}");
        assert!(res.cookies().is_empty(), "{path}");
    }

    assert!(!gate.is_exempt("/logout"));
    assert!(!gate.is_exempt("/statically"));
}
