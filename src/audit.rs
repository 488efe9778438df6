//! Request audit trail.
//!
//! Every API request except `/health` is written to `audit_logs` after the response is
//! produced, including requests refused by the rate limiter or the body size limit. The insert runs on a spawned task behind the database circuit breaker, so a
//! slow or failing audit table never delays or fails the request itself.

use crate::auth::{bearer_token, resolve_token};
use crate::circuit_breaker::run_guarded;
use crate::db_storage;
use crate::handlers::AppState;
use crate::models::{AuditAction, NewAuditLog};
use crate::rate_limit::client_ip;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Keys whose values never reach the audit table in clear.
const SENSITIVE_FIELDS: [&str; 6] = ["password", "ssn", "account_number", "api_key", "secret", "token"];

const VISIBLE_CHARS: usize = 4;
const RAW_BODY_PREVIEW: usize = 500;

/// Masks all but the last four characters; short values are fully masked.
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= VISIBLE_CHARS {
        return "*".repeat(chars.len());
    }
    let hidden = chars.len() - VISIBLE_CHARS;
    let visible: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), visible)
}

/// Recursively masks sensitive keys inside a JSON document.
pub fn mask_sensitive(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, inner)| {
                    let masked = if SENSITIVE_FIELDS.contains(&key.to_lowercase().as_str()) {
                        let text = match inner {
                            Value::String(s) => s,
                            other => other.to_string(),
                        };
                        Value::String(mask_value(&text))
                    } else {
                        mask_sensitive(inner)
                    };
                    (key, masked)
                })
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(mask_sensitive).collect()),
        other => other,
    }
}

/// Masked JSON body, or a masked preview of a non-JSON body.
pub fn audit_body(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => Some(mask_sensitive(value)),
        Err(_) => {
            let text = String::from_utf8_lossy(bytes);
            let preview: String = text.chars().take(RAW_BODY_PREVIEW).collect();
            Some(json!({ "raw": mask_value(&preview) }))
        }
    }
}

/// Resource type and id from a request path: `/api/v1/consumers/{uuid}/freeze` gives
/// (`freeze`, Some(uuid)), `/api/v1/banks` gives (`banks`, None).
pub fn resource_from_path(path: &str) -> (String, Option<Uuid>) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let resource_id = segments
        .iter()
        .rev()
        .find_map(|segment| Uuid::parse_str(segment).ok());
    let resource_type = segments
        .iter()
        .rev()
        .find(|segment| Uuid::parse_str(segment).is_err())
        .map(|segment| segment.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    (resource_type, resource_id)
}

pub fn action_for(method: &Method, status: StatusCode) -> AuditAction {
    if status == StatusCode::FORBIDDEN {
        AuditAction::PermissionDenied
    } else {
        AuditAction::from_method(method.as_str())
    }
}

/// Axum middleware recording one audit row per request.
pub async fn audit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if path == "/health" {
        return next.run(req).await;
    }

    let started = Instant::now();
    let method = req.method().clone();
    let query = req.uri().query().map(String::from);
    let ip_address = client_ip(req.extensions(), req.headers());
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let user_id = match bearer_token(req.headers()) {
        Some(token) => match resolve_token(&state, token).await {
            Ok(user) => user.map(|u| u.id),
            Err(e) => {
                tracing::debug!("Audit could not resolve caller: {}", e);
                None
            }
        },
        None => None,
    };

    let mut request_body = None;
    let response = if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
        let (parts, body) = req.into_parts();
        match to_bytes(body, state.config.max_body_bytes).await {
            Ok(bytes) => {
                request_body = audit_body(&bytes);
                next.run(Request::from_parts(parts, Body::from(bytes))).await
            }
            Err(e) => {
                tracing::warn!("Failed to buffer request body for audit: {}", e);
                (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
            }
        }
    } else {
        next.run(req).await
    };

    let status = response.status();
    let (resource_type, resource_id) = resource_from_path(&path);

    let entry = NewAuditLog {
        user_id,
        action: action_for(&method, status),
        resource_type,
        resource_id,
        ip_address,
        user_agent,
        request_method: Some(method.to_string()),
        request_path: Some(path),
        request_body,
        response_status: Some(i32::from(status.as_u16())),
        metadata: Some(json!({
            "process_time_ms": started.elapsed().as_secs_f64() * 1000.0,
            "query": query,
        })),
    };

    let pool = state.db.clone();
    let breaker = state.db_breaker.clone();
    tokio::spawn(async move {
        run_guarded(
            &breaker,
            "Audit log insert",
            db_storage::insert_audit_log(&pool, &entry),
        )
        .await;
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_value() {
        assert_eq!(mask_value("123456789"), "*****6789");
        assert_eq!(mask_value("1234"), "****");
        assert_eq!(mask_value(""), "");
    }

    #[test]
    fn test_mask_sensitive_is_recursive() {
        let body = json!({
            "first_name": "Lani",
            "ssn": "123-45-6789",
            "nested": {
                "Account_Number": "4111111111111111",
                "items": [{"api_key": "abcdefgh", "note": "keep"}],
            },
            "token": 12345678,
        });

        let masked = mask_sensitive(body);

        assert_eq!(masked["first_name"], "Lani");
        assert_eq!(masked["ssn"], "*******6789");
        assert_eq!(masked["nested"]["Account_Number"], "************1111");
        assert_eq!(masked["nested"]["items"][0]["api_key"], "****efgh");
        assert_eq!(masked["nested"]["items"][0]["note"], "keep");
        assert_eq!(masked["token"], "****5678");
    }

    #[test]
    fn test_audit_body_handles_non_json() {
        assert_eq!(audit_body(b""), None);
        assert_eq!(
            audit_body(b"plain-text-body"),
            Some(json!({"raw": "***********body"}))
        );
    }

    #[test]
    fn test_resource_from_path() {
        let id = Uuid::new_v4();
        assert_eq!(
            resource_from_path(&format!("/api/v1/consumers/{}/freeze", id)),
            ("freeze".to_string(), Some(id))
        );
        assert_eq!(
            resource_from_path(&format!("/api/v1/banks/{}", id)),
            ("banks".to_string(), Some(id))
        );
        assert_eq!(
            resource_from_path("/api/v1/credit-data"),
            ("credit-data".to_string(), None)
        );
        assert_eq!(resource_from_path("/"), ("unknown".to_string(), None));
    }

    #[test]
    fn test_forbidden_is_recorded_as_permission_denied() {
        assert_eq!(
            action_for(&Method::GET, StatusCode::FORBIDDEN),
            AuditAction::PermissionDenied
        );
        assert_eq!(action_for(&Method::POST, StatusCode::CREATED), AuditAction::Create);
        assert_eq!(action_for(&Method::DELETE, StatusCode::OK), AuditAction::Delete);
    }
}
