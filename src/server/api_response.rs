//! JSON envelope shared by every API response.

use super::metrics::record_error;
use crate::music_store::MusicError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

pub fn respond<T: Serialize>(status: StatusCode, data: T) -> Response {
    let body = ApiResponse {
        success: true,
        status: status.as_u16(),
        data: Some(data),
        message: None,
        error_code: None,
    };
    (status, Json(body)).into_response()
}

pub fn ok<T: Serialize>(data: T) -> Response {
    respond(StatusCode::OK, data)
}

pub fn created<T: Serialize>(data: T) -> Response {
    respond(StatusCode::CREATED, data)
}

pub fn ok_message(message: &str) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: true,
        status: StatusCode::OK.as_u16(),
        data: None,
        message: Some(message.to_string()),
        error_code: None,
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub fn failure(status: StatusCode, error_code: &'static str, message: String) -> Response {
    let body: ApiResponse<()> = ApiResponse {
        success: false,
        status: status.as_u16(),
        data: None,
        message: Some(message),
        error_code: Some(error_code),
    };
    (status, Json(body)).into_response()
}

pub fn status_for(err: &MusicError) -> StatusCode {
    match err {
        MusicError::InvalidIdentity(_) => StatusCode::UNAUTHORIZED,
        MusicError::InvalidArtifact(_) => StatusCode::BAD_REQUEST,
        MusicError::EntryNotFound(_)
        | MusicError::AccountNotFound(_)
        | MusicError::OwnershipNotFound { .. } => StatusCode::NOT_FOUND,
        MusicError::DuplicateLike { .. } => StatusCode::CONFLICT,
        MusicError::GenerationFailed(_)
        | MusicError::SynthesisFailed(_)
        | MusicError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
        MusicError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for MusicError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        record_error(self.code());
        failure(status, self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_error_kinds_to_statuses() {
        assert_eq!(
            status_for(&MusicError::DuplicateLike {
                account_id: 1,
                catalog_entry_id: 2
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&MusicError::OwnershipNotFound {
                account_id: 1,
                catalog_entry_id: 2
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&MusicError::GenerationFailed("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&MusicError::StoreUnavailable("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&MusicError::InvalidArtifact("x".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn error_envelope_omits_data() {
        let body: ApiResponse<()> = ApiResponse {
            success: false,
            status: 409,
            data: None,
            message: Some("dup".to_string()),
            error_code: Some("DUPLICATE_LIKE"),
        };

        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["errorCode"], "DUPLICATE_LIKE");
        assert!(json.get("data").is_none());
    }
}
