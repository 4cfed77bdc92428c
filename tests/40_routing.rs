mod common;

use axum::http::{header, Method, StatusCode};
use axum::{Extension, Json};
use common::{elevated_user, user, TestApp, ADMIN, GUILD, MEMBER, SPA_HTML};
use serde_json::{json, Value};
use tickets_http::client::GuildMember;
use tickets_http::registrar::{Access, RouteConfig, RouteFile};

#[tokio::test]
async fn unmatched_path_serves_the_spa() {
    let app = TestApp::new();

    let res = app.get("/dashboard/10/settings", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(res.text(), SPA_HTML);
}

#[tokio::test]
async fn unmatched_api_path_also_falls_back() {
    let app = TestApp::new();

    let res = app.get("/api/does-not-exist", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.text(), SPA_HTML);
}

#[tokio::test]
async fn fallback_receives_the_raw_request() {
    let app = TestApp::new();

    // Not valid JSON; body normalization would reject or rewrite it if it ran
    let res = app
        .send(common::request(Method::POST, "/dashboard", None, Some("{ \"name\": ")))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.text(), SPA_HTML);
}

#[tokio::test]
async fn matched_routes_never_fall_back() {
    let app = TestApp::new();

    let res = app.get(&format!("/api/guilds/{}", GUILD), None).await;

    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(!res.text().contains("tickets dashboard"));
}

fn shadowed_status() -> RouteConfig {
    RouteConfig::new(Access::Public, || async { Json(json!({ "status": "shadowed" })) })
}

fn list_members() -> RouteConfig {
    RouteConfig::new(Access::Member, |Extension(member): Extension<GuildMember>| async move {
        Json(json!({ "listedFor": member.user_id }))
    })
}

fn add_member() -> RouteConfig {
    RouteConfig::new(Access::Admin, |Json(body): Json<Value>| async move {
        Json(json!({ "added": body["userId"] }))
    })
}

const EXTRA_FILES: &[RouteFile] = &[
    RouteFile {
        source: "status.rs",
        methods: &[("get", shadowed_status)],
    },
    RouteFile {
        source: "guilds/[guild]/members/index.rs",
        methods: &[("get", list_members), ("post", add_member)],
    },
];

#[tokio::test]
async fn static_status_wins_over_discovered_file() {
    let app = TestApp::with_files(EXTRA_FILES);

    let res = app.get("/status", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), json!({ "status": "ok" }));
}

#[tokio::test]
async fn index_file_binds_each_exported_method() {
    let app = TestApp::with_files(EXTRA_FILES);
    let uri = format!("/guilds/{}/members", GUILD);

    let member = app.token(&user(MEMBER, &[]));
    let res = app.get(&uri, Some(&member)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["listedFor"], MEMBER);

    let admin = app.token(&elevated_user(ADMIN));
    let res = app.post_json(&uri, Some(&admin), r#"{ "userId": "  42  " }"#).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["added"], "42");

    // Same path, stricter tier for POST
    let res = app.post_json(&uri, Some(&member), r#"{ "userId": "42" }"#).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.json()["elevate"], "admin");
}
