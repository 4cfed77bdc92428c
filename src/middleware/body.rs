use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::header::{CONTENT_LENGTH, CONTENT_TYPE},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

/// Trim every top-level string property of a JSON object in place.
///
/// Nested objects and non-string values are left alone. Returns whether
/// anything changed.
pub fn trim_top_level_strings(body: &mut Value) -> bool {
    let Some(object) = body.as_object_mut() else {
        return false;
    };

    let mut changed = false;
    for value in object.values_mut() {
        if let Value::String(s) = value {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
                changed = true;
            }
        }
    }
    changed
}

/// Same rule as axum's `Json` extractor: `application/json` or any
/// `application/*+json` subtype.
fn is_json(request: &Request) -> bool {
    let Some(mime) = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
    else {
        return false;
    };

    mime.type_() == "application"
        && (mime.subtype() == "json" || mime.suffix().map_or(false, |suffix| suffix == "json"))
}

/// Normalize JSON request bodies before the handler sees them.
///
/// Bodies that are not JSON objects pass through unchanged so the handler's
/// own extractor reports the problem.
pub async fn normalize_body(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_json(&request) {
        return Ok(next.run(request).await);
    }

    let limit = state.config.http.upload_limit_bytes;
    let (mut parts, body) = request.into_parts();
    let bytes = to_bytes(body, limit)
        .await
        .map_err(|_| ApiError::payload_too_large(format!("Request body exceeds {} bytes.", limit)))?;

    let mut parsed = serde_json::from_slice::<Value>(&bytes).ok();
    let changed = parsed.as_mut().map(trim_top_level_strings).unwrap_or(false);

    let bytes = match parsed {
        Some(value) if changed => {
            let rewritten = serde_json::to_vec(&value)
                .map_err(|e| ApiError::internal(format!("failed to re-encode request body: {}", e)))?;
            parts.headers.remove(CONTENT_LENGTH);
            Bytes::from(rewritten)
        }
        _ => bytes,
    };

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trims_top_level_strings_only() {
        let mut body = json!({ "name": "  Alice  ", "age": 30, "meta": { "x": " y " } });
        assert!(trim_top_level_strings(&mut body));
        assert_eq!(body, json!({ "name": "Alice", "age": 30, "meta": { "x": " y " } }));
    }

    #[test]
    fn test_arrays_and_scalars_are_untouched() {
        let mut body = json!({ "tags": [" a ", "b "], "enabled": true, "note": null });
        assert!(!trim_top_level_strings(&mut body));
        assert_eq!(body, json!({ "tags": [" a ", "b "], "enabled": true, "note": null }));

        let mut scalar = json!("  loose  ");
        assert!(!trim_top_level_strings(&mut scalar));
        assert_eq!(scalar, json!("  loose  "));
    }

    #[test]
    fn test_already_trimmed_reports_no_change() {
        let mut body = json!({ "name": "Alice" });
        assert!(!trim_top_level_strings(&mut body));
    }

    fn with_content_type(content_type: &str) -> Request {
        Request::builder()
            .header(CONTENT_TYPE, content_type)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_json_content_types() {
        assert!(is_json(&with_content_type("application/json")));
        assert!(is_json(&with_content_type("application/json; charset=utf-8")));
        assert!(is_json(&with_content_type("application/merge-patch+json")));
        assert!(is_json(&with_content_type("Application/JSON")));
        assert!(!is_json(&with_content_type("text/plain")));
        assert!(!is_json(&with_content_type("application/x-www-form-urlencoded")));
        assert!(!is_json(&with_content_type("text/json")));
        assert!(!is_json(&Request::new(Body::empty())));
    }

    #[test]
    fn test_unicode_whitespace() {
        let mut body = json!({ "topic": "\u{00a0}\tHelp needed\n" });
        assert!(trim_top_level_strings(&mut body));
        assert_eq!(body["topic"], "Help needed");
    }
}
