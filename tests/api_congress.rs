// tests/api_congress.rs

mod common;

use axum::http::StatusCode;
use common::{app, get, Reply, ScriptedTransport};
use serde_json::json;

#[tokio::test]
async fn bills_are_flattened_and_key_sent_twice() {
    let t = ScriptedTransport::new().on(
        "api.congress.gov/v3/bill",
        Reply::json(
            200,
            json!({
                "bills": [{
                    "congress": 118, "type": "S", "number": "1", "title": "A bill",
                    "originChamber": "Senate",
                    "latestAction": { "actionDate": "2024-02-01", "text": "Read twice." },
                    "updateDate": "2024-02-02", "url": "https://api.congress.gov/v3/bill/118/s/1"
                }],
                "pagination": { "count": 1 }
            }),
        ),
    );
    let resp = get(app(t.clone()), "/api/congress?q=farm%20bill&limit=5").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json(),
        json!({
            "bills": [{
                "congress": "118", "type": "S", "number": "1", "title": "A bill",
                "originChamber": "Senate", "latestAction": "Read twice.",
                "actionDate": "2024-02-01", "updateDate": "2024-02-02",
                "url": "https://api.congress.gov/v3/bill/118/s/1"
            }],
            "next": null
        })
    );

    let q = &t.calls()[0];
    assert!(q.url.contains("query=farm%20bill&limit=5&sort=updateDate+desc"));
    assert!(q.url.ends_with("api_key=congress-key"));
    assert_eq!(q.header("X-Api-Key"), Some("congress-key"));
}

#[tokio::test]
async fn upstream_status_is_mirrored() {
    let t = ScriptedTransport::new().on(
        "api.congress.gov",
        Reply::json(429, json!({ "error": { "code": "OVER_RATE_LIMIT" } })),
    );
    let resp = get(app(t), "/api/congress?q=x").await;
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.json()["upstream"]["error"]["code"], "OVER_RATE_LIMIT");
}

#[tokio::test]
async fn large_error_body_is_cut_to_an_excerpt() {
    let t = ScriptedTransport::new().on(
        "api.congress.gov",
        Reply::json(500, json!({ "detail": "x".repeat(100_000) })),
    );
    let resp = get(app(t), "/api/congress?q=x").await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.text.len() < 2_048, "body is {} bytes", resp.text.len());
    let body = resp.json();
    assert!(body.get("upstream").is_none());
    assert!(body["upstream_text"].as_str().unwrap().ends_with('…'));
}

#[tokio::test]
async fn missing_q_is_400() {
    let t = ScriptedTransport::new();
    let resp = get(app(t.clone()), "/api/congress?limit=3").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["error"], "Missing required parameter: q");
    assert_eq!(t.call_count(), 0);
}
