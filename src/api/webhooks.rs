use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::notifications::{NotifyError, OutgoingEmail, Outcome};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

const EVENT_HEADER: &str = "X-GitHub-Event";
const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Verify GitHub webhook signature (X-Hub-Signature-256 header)
fn verify_github_signature(secret: &str, signature_header: &str, payload: &[u8]) -> bool {
    // Signature format: sha256=<hex>
    let signature = match signature_header.strip_prefix("sha256=") {
        Some(sig) => sig,
        None => return false,
    };

    let expected = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(payload);

    // Use constant-time comparison
    mac.verify_slice(&expected).is_ok()
}

/// Reject the request unless it is signed with the configured secret.
fn check_signature(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), (StatusCode, String)> {
    let Some(secret) = state.config.webhooks.github_secret.as_deref() else {
        return Ok(());
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("GitHub webhook missing X-Hub-Signature-256 header");
            (StatusCode::UNAUTHORIZED, "Missing signature".to_string())
        })?;

    if !verify_github_signature(secret, signature, body) {
        tracing::warn!("GitHub webhook signature verification failed");
        return Err((StatusCode::UNAUTHORIZED, "Invalid signature".to_string()));
    }
    tracing::debug!("GitHub webhook signature verified");
    Ok(())
}

fn event_type(headers: &HeaderMap) -> String {
    headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn error_response(event_type: &str, err: NotifyError) -> (StatusCode, String) {
    let status = match &err {
        NotifyError::Decode(_) => StatusCode::BAD_REQUEST,
        e if e.is_client_error() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(event_type = %event_type, error = %err, "Error handling payload");
    } else {
        tracing::warn!(event_type = %event_type, error = %err, "Rejected payload");
    }
    (status, err.to_string())
}

pub async fn github_hook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, String), (StatusCode, String)> {
    check_signature(&state, &headers, &body)?;
    let event_type = event_type(&headers);

    match state.notifications.handle(&event_type, &body).await {
        Ok(Outcome::Sent { .. }) => Ok((StatusCode::OK, "OK".to_string())),
        Ok(Outcome::Unhandled { event_type }) => Ok((
            StatusCode::OK,
            format!("Unhandled event type: {}", event_type),
        )),
        Ok(Outcome::Ignored { reason }) => Ok((StatusCode::OK, format!("Ignored: {}", reason))),
        Err(e) => Err(error_response(&event_type, e)),
    }
}

/// Compose without delivering, for checking what a payload would produce.
pub async fn preview_hook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Option<OutgoingEmail>>, (StatusCode, String)> {
    check_signature(&state, &headers, &body)?;
    let event_type = event_type(&headers);

    state
        .notifications
        .preview(&event_type, &body)
        .await
        .map(Json)
        .map_err(|e| error_response(&event_type, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_verify_github_signature() {
        let payload = br#"{"zen": "Keep it logically awesome."}"#;
        let signature = sign("s3cret", payload);

        assert!(verify_github_signature("s3cret", &signature, payload));
        assert!(!verify_github_signature("other", &signature, payload));
        assert!(!verify_github_signature("s3cret", &signature, b"tampered"));
        assert!(!verify_github_signature("s3cret", "sha1=abcd", payload));
        assert!(!verify_github_signature("s3cret", "sha256=not-hex", payload));
    }
}
