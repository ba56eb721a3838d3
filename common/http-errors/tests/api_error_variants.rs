use common_http_errors::ApiError;
use axum::response::IntoResponse;
use axum::body::to_bytes;
use axum::http::StatusCode;
use uuid::Uuid;

#[test]
fn forbidden_variant() {
    let err = ApiError::Forbidden { trace_id: None, message: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "forbidden");
}

#[test]
fn bad_request_variant() {
    let err = ApiError::BadRequest { code: "missing_parameter", trace_id: None, message: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "missing_parameter");
}

#[test]
fn unauthorized_variant() {
    let err = ApiError::Unauthorized { code: "secret_mismatch", trace_id: None, message: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "secret_mismatch");
}

#[test]
fn not_found_variant() {
    let err = ApiError::NotFound { code: "unknown_redirect", trace_id: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "unknown_redirect");
}

#[test]
fn server_variant_keeps_code() {
    let err = ApiError::Server { code: "entry_not_found", trace_id: None, message: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "entry_not_found");
}

#[test]
fn internal_variant() {
    let trace = Some(Uuid::new_v4());
    let err = ApiError::Internal { trace_id: trace, message: Some("boom".into()) };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "internal_error");
}

#[tokio::test]
async fn body_carries_code_and_message() {
    let err = ApiError::BadRequest { code: "unexpected_status", trace_id: None, message: Some("Unexpected payment status value.".into()) };
    let resp = err.into_response();
    let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("\"code\":\"unexpected_status\""), "unexpected body: {}", body);
    assert!(body.contains("Unexpected payment status value."));
    assert!(!body.contains("trace_id"));
}
