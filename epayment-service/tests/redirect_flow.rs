mod support;

use axum::http::header::LOCATION;
use serde_json::json;
use support::{body_string, entry, payment_form, plain_form, Harness};
use url::Url;

async fn with_confirmation(confirmation: serde_json::Value) -> Harness {
    let h = Harness::new();
    h.store.insert_form(payment_form(3, confirmation)).await;
    h.store
        .insert_entry(entry(
            14,
            3,
            json!({"payment_request_number": "ubc-3-14", "payment_status": "Paid", "meta": {"upay_tracking_id": "TRK 7"}}),
        ))
        .await;
    h
}

fn location(resp: &axum::response::Response) -> String {
    resp.headers().get(LOCATION).unwrap().to_str().unwrap().to_string()
}

#[tokio::test]
async fn message_confirmation_returns_to_form_page_with_nonce() {
    let h = with_confirmation(json!({"is_default": true, "type": "message", "message": "Thanks {field:Name}"})).await;
    let resp = h.get("/ubc-epayment/success?EXT_TRANS_ID=UBC-3-14&UPAY_SITE_ID=42").await;
    assert_eq!(resp.status(), 302);
    let url = Url::parse(&location(&resp)).unwrap();
    assert_eq!(url.path(), "/register");
    let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs["lang"], "en");
    assert_eq!(pairs["form_id"], "3");
    assert_eq!(pairs["entry_id"], "14");
    assert_eq!(pairs["payment_request_number"], "ubc-3-14");
    assert_eq!(pairs["upay_status"], "success");
    assert!(!pairs["_nonce"].is_empty());

    let render = h.get(&format!("/ubc-epayment/confirmation?{}", url.query().unwrap())).await;
    assert_eq!(render.status(), 200);
    assert_eq!(body_string(render).await, "Thanks Ada Lovelace");
}

#[tokio::test]
async fn tampered_nonce_falls_through() {
    let h = with_confirmation(json!({"is_default": true, "type": "message", "message": "Thanks"})).await;
    let resp = h.get("/ubc-epayment/cancelled?EXT_TRANS_ID=ubc-3-14&UPAY_SITE_ID=42").await;
    let url = Url::parse(&location(&resp)).unwrap();
    let query: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .map(|(k, v)| if k == "_nonce" { (k, format!("{v}x")) } else { (k, v) })
        .collect();
    let tampered = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(query).finish();
    let render = h.get(&format!("/ubc-epayment/confirmation?{tampered}")).await;
    assert_eq!(render.status(), 204);

    let switched = url.query().unwrap().replace("upay_status=cancelled", "upay_status=success");
    let render = h.get(&format!("/ubc-epayment/confirmation?{switched}")).await;
    assert_eq!(render.status(), 204);
}

#[tokio::test]
async fn cancelled_and_error_messages() {
    let h = with_confirmation(json!({"is_default": true, "type": "page", "page_url": "https://ubc.ca/thanks"})).await;
    let resp = h.get("/ubc-epayment/cancelled?EXT_TRANS_ID=ubc-3-14&UPAY_SITE_ID=42").await;
    let url = Url::parse(&location(&resp)).unwrap();
    let render = h.get(&format!("/ubc-epayment/confirmation?{}", url.query().unwrap())).await;
    assert_eq!(body_string(render).await, "Your payment (ubc-3-14) has been cancelled.");

    let resp = h.get("/ubc-epayment/error?EXT_TRANS_ID=ubc-3-14&UPAY_SITE_ID=42").await;
    let url = Url::parse(&location(&resp)).unwrap();
    let render = h.get(&format!("/ubc-epayment/confirmation?{}", url.query().unwrap())).await;
    assert!(body_string(render).await.starts_with("Your payment (ubc-3-14) is not complete due to system outages"));
}

#[tokio::test]
async fn success_with_page_goes_to_page() {
    let h = with_confirmation(json!({"is_default": true, "type": "page", "page_url": "https://ubc.ca/thanks"})).await;
    let resp = h.get("/ubc-epayment/success?EXT_TRANS_ID=ubc-3-14&UPAY_SITE_ID=42").await;
    assert_eq!(resp.status(), 302);
    assert_eq!(location(&resp), "https://ubc.ca/thanks");
}

#[tokio::test]
async fn success_with_redirect_appends_rendered_query() {
    let h = with_confirmation(json!({
        "is_default": true,
        "type": "redirect",
        "url": "https://ubc.ca/receipt",
        "query_string": "ref={meta:upay_tracking_id}&entry={entry_id}"
    }))
    .await;
    let resp = h.get("/ubc-epayment/success?EXT_TRANS_ID=ubc-3-14&UPAY_SITE_ID=42").await;
    assert_eq!(location(&resp), "https://ubc.ca/receipt?ref=TRK%207&entry=14");

    let h = with_confirmation(json!({
        "is_default": true,
        "type": "redirect",
        "url": "https://ubc.ca/receipt?src=upay",
        "query_string": "entry={entry_id}"
    }))
    .await;
    let resp = h.get("/ubc-epayment/success?EXT_TRANS_ID=ubc-3-14&UPAY_SITE_ID=42").await;
    assert_eq!(location(&resp), "https://ubc.ca/receipt?src=upay&entry=14");

    let h = with_confirmation(json!({"is_default": true, "type": "redirect", "url": "https://ubc.ca/receipt"})).await;
    let resp = h.get("/ubc-epayment/success?EXT_TRANS_ID=ubc-3-14&UPAY_SITE_ID=42").await;
    assert_eq!(location(&resp), "https://ubc.ca/receipt");
}

#[tokio::test]
async fn missing_gateway_params_are_forbidden() {
    let h = with_confirmation(json!({"is_default": true, "type": "message", "message": "Thanks"})).await;
    let resp = h.get("/ubc-epayment/success?EXT_TRANS_ID=ubc-3-14").await;
    assert_eq!(resp.status(), 403);
    assert_eq!(
        support::body_json(resp).await["message"],
        "You do not have permission to view this page."
    );
}

#[tokio::test]
async fn unknown_outcome_is_404() {
    let h = Harness::new();
    let resp = h.get("/ubc-epayment/refunded?EXT_TRANS_ID=ubc-3-14&UPAY_SITE_ID=42").await;
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "unknown_redirect");
}

#[tokio::test]
async fn plain_forms_and_missing_confirmations() {
    let h = Harness::new();
    h.store.insert_form(plain_form(8)).await;
    h.store.insert_entry(entry(80, 8, json!({"payment_request_number": "ubc-8-80"}))).await;
    let resp = h.get("/ubc-epayment/success?EXT_TRANS_ID=ubc-8-80&UPAY_SITE_ID=42").await;
    assert_eq!(resp.status(), 404);

    let h = with_confirmation(json!({"is_default": false, "type": "message", "message": "Thanks"})).await;
    let resp = h.get("/ubc-epayment/success?EXT_TRANS_ID=ubc-3-14&UPAY_SITE_ID=42").await;
    assert_eq!(resp.status(), 500);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "confirmation_misconfigured");

    let resp = h.get("/ubc-epayment/success?EXT_TRANS_ID=ubc-9-99&UPAY_SITE_ID=42").await;
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn incomplete_render_params_are_204() {
    let h = with_confirmation(json!({"is_default": true, "type": "message", "message": "Thanks"})).await;
    let resp = h.get("/ubc-epayment/confirmation?form_id=3&entry_id=14").await;
    assert_eq!(resp.status(), 204);
}
