//! Live end-to-end coverage against a running bacheca instance.
//!
//! - Reads the base URL from `BACHECA_LIVE_BASE_URL` (default `http://127.0.0.1:3000`).
//! - Sends real HTTP requests; the server must be running with its database migrated.
//! - Marked `#[ignore]` so it only runs manually.

use std::collections::HashSet;

use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use time::OffsetDateTime;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

#[tokio::test]
#[ignore]
async fn live_api_end_to_end() -> TestResult<()> {
    let base = base_url();
    let client = Client::builder().build()?;

    let suf = current_suffix();
    let login = format!("live-{suf}");
    let password = format!("pw-{suf}");

    // Fresh account; the token comes back immediately.
    let body = request(
        &client,
        &base,
        Method::POST,
        "/user/sign-up",
        None,
        &[StatusCode::OK],
        Some(json!({"login": login, "password": password})),
    )
    .await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("ok"));
    let signup_token = token_from(&body)?;
    assert!(!signup_token.is_empty(), "sign up should return a token");

    // The same login cannot be registered twice.
    request(
        &client,
        &base,
        Method::POST,
        "/user/sign-up",
        None,
        &[StatusCode::CONFLICT],
        Some(json!({"login": login, "password": password})),
    )
    .await?;

    // Bad credentials are rejected, good ones re-issue a token.
    request(
        &client,
        &base,
        Method::POST,
        "/user/login",
        None,
        &[StatusCode::UNAUTHORIZED],
        Some(json!({"login": login, "password": "wrong"})),
    )
    .await?;

    let body = request(
        &client,
        &base,
        Method::POST,
        "/user/login",
        None,
        &[StatusCode::OK],
        Some(json!({"login": login, "password": password})),
    )
    .await?;
    let token = token_from(&body)?;

    // The post surface is closed without a token.
    request(
        &client,
        &base,
        Method::GET,
        "/post/all",
        None,
        &[StatusCode::UNAUTHORIZED],
        None,
    )
    .await?;

    // Create, then read back through the (possibly cached) listing.
    let text = format!("live post {suf}");
    let body = request(
        &client,
        &base,
        Method::POST,
        "/post/add",
        Some(&token),
        &[StatusCode::OK],
        Some(json!({"text": text})),
    )
    .await?;
    let post_id = body["data"]["post_id"]
        .as_i64()
        .ok_or("create should return a post id")?;

    let first = request(
        &client,
        &base,
        Method::GET,
        "/post/all",
        Some(&token),
        &[StatusCode::OK],
        None,
    )
    .await?;
    assert!(
        listing_contains(&first, post_id, &text),
        "listing should contain the new post: {first}"
    );

    // Second read is served from the cache when one is configured; the
    // payload must be indistinguishable either way.
    let second = request(
        &client,
        &base,
        Method::GET,
        "/post/all",
        Some(&token),
        &[StatusCode::OK],
        None,
    )
    .await?;
    assert_eq!(first["data"], second["data"]);

    // Oversized text is refused before it reaches storage.
    let oversized = "x".repeat(1_048_577);
    request(
        &client,
        &base,
        Method::POST,
        "/post/add",
        Some(&token),
        &[StatusCode::PAYLOAD_TOO_LARGE],
        Some(json!({"text": oversized})),
    )
    .await?;

    // Delete observes the listing immediately afterwards.
    let body = request(
        &client,
        &base,
        Method::DELETE,
        "/post",
        Some(&token),
        &[StatusCode::OK],
        Some(json!({"post_id": post_id})),
    )
    .await?;
    assert_eq!(body["data"]["deleted"], json!(true));

    request(
        &client,
        &base,
        Method::DELETE,
        "/post",
        Some(&token),
        &[StatusCode::NOT_FOUND],
        Some(json!({"post_id": post_id})),
    )
    .await?;

    let after = request(
        &client,
        &base,
        Method::GET,
        "/post/all",
        Some(&token),
        &[StatusCode::OK],
        None,
    )
    .await?;
    assert!(
        !listing_contains(&after, post_id, &text),
        "deleted post must not linger in the listing: {after}"
    );

    Ok(())
}

fn base_url() -> String {
    std::env::var("BACHECA_LIVE_BASE_URL")
        .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn current_suffix() -> String {
    format!("{}", OffsetDateTime::now_utc().unix_timestamp())
}

fn token_from(body: &Value) -> TestResult<String> {
    Ok(body["data"]["token"]
        .as_str()
        .ok_or("response should carry a token")?
        .to_string())
}

fn listing_contains(body: &Value, post_id: i64, text: &str) -> bool {
    body["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .any(|item| item["id"] == json!(post_id) && item["text"] == json!(text))
        })
        .unwrap_or(false)
}

async fn request(
    client: &Client,
    base: &str,
    method: Method,
    path: &str,
    token: Option<&str>,
    expected: &[StatusCode],
    payload: Option<Value>,
) -> TestResult<Value> {
    let url = format!("{}{}", base, path);
    let method_str = method.to_string();
    let mut req = client.request(method, &url);
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    if let Some(payload) = payload {
        req = req.json(&payload);
    }

    let resp = req.send().await.map_err(|e| map_net_err(e, &url))?;
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !expected.contains(&status) {
        let exp: HashSet<_> = expected.iter().collect();
        return Err(format!(
            "{} {} expected {:?}, got {} body: {}",
            method_str, url, exp, status, body
        )
        .into());
    }

    Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
}

fn map_net_err(err: reqwest::Error, url: &str) -> Box<dyn std::error::Error> {
    if err.is_connect() {
        format!("Failed to connect to {url}. Start the bacheca server before running this test.")
            .into()
    } else {
        err.into()
    }
}
