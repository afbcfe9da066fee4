//! Webhook handler errors and their HTTP mapping.
//!
//! Stripe redelivers any event that gets a non-2xx answer, so the status
//! code decides whether a failure is retried:
//!
//! | Error | Status |
//! |---|---|
//! | missing signing secret | 500 |
//! | bad signature or payload | 400 |
//! | transaction not found, invalid id or rejected write | 400 |
//! | store unavailable or credentials failing | 500 |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::store::StoreError;
use crate::stripe::{EventError, SignatureError};

/// Body sent when no signing secret is configured.
pub const MISSING_SECRET_MESSAGE: &str = "Webhook Secret not configured";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Webhook Secret not configured")]
    MissingSecret,

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Payload(#[from] EventError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSecret => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::Signature(_) | WebhookError::Payload(_) => StatusCode::BAD_REQUEST,
            WebhookError::Store(e) if e.is_transient() => StatusCode::INTERNAL_SERVER_ERROR,
            WebhookError::Store(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            WebhookError::MissingSecret => MISSING_SECRET_MESSAGE.to_string(),
            other => format!("Webhook Error: {}", other),
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            WebhookError::MissingSecret.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WebhookError::from(SignatureError::NoMatch).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::from(StoreError::NotFound("tx_1".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::from(StoreError::Backend {
                status: 500,
                message: "internal".into()
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_permanent_store_rejections_are_not_retried() {
        let rejected = WebhookError::from(StoreError::Rejected {
            status: 400,
            message: "Document name is not valid.".into(),
        });
        assert_eq!(rejected.status_code(), StatusCode::BAD_REQUEST);

        let invalid = WebhookError::from(StoreError::InvalidId("..".into()));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let auth = WebhookError::from(StoreError::Auth("token endpoint timed out".into()));
        assert_eq!(auth.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            WebhookError::MissingSecret.to_string(),
            "Webhook Secret not configured"
        );
        assert_eq!(
            WebhookError::from(StoreError::NotFound("tx_1".into())).to_string(),
            "Transaction tx_1 not found"
        );
    }
}
