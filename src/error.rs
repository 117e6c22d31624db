use crate::domain::payment::{ErrorEnvelope, ErrorPayload};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxypayError {
    #[error("{0} is required")]
    MissingSetting(&'static str),

    #[error("invalid value for {key}: {message}")]
    InvalidSetting { key: &'static str, message: String },

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("error creating reference, at most {max} custom fields are allowed")]
    TooManyCustomFields { max: usize },

    #[error("days must be between 1 and {max}")]
    InvalidLifetime { max: i64 },

    #[error("no unused reference id after {0} attempts")]
    ReferenceIdExhausted(u32),

    #[error("reference not found")]
    ReferenceNotFound,

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("invalid payment payload: {0}")]
    InvalidPayload(String),

    #[error("payment {0} does not match any reference")]
    UnrecognizedPayment(i64),

    #[error("mock payments are only allowed in the sandbox environment")]
    SandboxOnly,

    #[error("proxypay api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("proxypay api request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ProxypayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxypayError::InvalidAmount
            | ProxypayError::TooManyCustomFields { .. }
            | ProxypayError::InvalidLifetime { .. }
            | ProxypayError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ProxypayError::InvalidSignature => StatusCode::FORBIDDEN,
            ProxypayError::ReferenceNotFound | ProxypayError::UnrecognizedPayment(_) => {
                StatusCode::NOT_FOUND
            }
            ProxypayError::SandboxOnly => StatusCode::CONFLICT,
            ProxypayError::ReferenceIdExhausted(_)
            | ProxypayError::Api { .. }
            | ProxypayError::Http(_) => StatusCode::BAD_GATEWAY,
            ProxypayError::MissingSetting(_)
            | ProxypayError::InvalidSetting { .. }
            | ProxypayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ProxypayError::MissingSetting(_) => "MISSING_SETTING",
            ProxypayError::InvalidSetting { .. } => "INVALID_SETTING",
            ProxypayError::InvalidAmount => "INVALID_AMOUNT",
            ProxypayError::TooManyCustomFields { .. } => "TOO_MANY_CUSTOM_FIELDS",
            ProxypayError::InvalidLifetime { .. } => "INVALID_LIFETIME",
            ProxypayError::ReferenceIdExhausted(_) => "REFERENCE_ID_EXHAUSTED",
            ProxypayError::ReferenceNotFound => "REFERENCE_NOT_FOUND",
            ProxypayError::InvalidSignature => "INVALID_SIGNATURE",
            ProxypayError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ProxypayError::UnrecognizedPayment(_) => "UNRECOGNIZED_PAYMENT",
            ProxypayError::SandboxOnly => "SANDBOX_ONLY",
            ProxypayError::Api { .. } => "PROXYPAY_API_ERROR",
            ProxypayError::Http(_) => "PROXYPAY_UNREACHABLE",
            ProxypayError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ProxypayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        let body = ErrorEnvelope {
            error: ErrorPayload {
                code: self.code().to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_http_statuses() {
        assert_eq!(ProxypayError::InvalidSignature.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ProxypayError::UnrecognizedPayment(7).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ProxypayError::TooManyCustomFields { max: 9 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxypayError::Api { status: 500, body: String::new() }.status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn too_many_fields_message() {
        let err = ProxypayError::TooManyCustomFields { max: 9 };
        assert_eq!(err.to_string(), "error creating reference, at most 9 custom fields are allowed");
        assert_eq!(err.code(), "TOO_MANY_CUSTOM_FIELDS");
    }
}
