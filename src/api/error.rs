//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::campaigns::CampaignError;
use crate::core_state::CoreError;
use crate::crud::{CrudError, FormErrors};
use crate::inventory::InventoryError;
use crate::operations::OperationError;
use crate::vaccinations::VaccinationError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Validation failed: {0}")]
    Validation(FormErrors),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", errors.to_string())
            }
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail.clone()),
            ApiError::Cancelled => (
                StatusCode::CONFLICT,
                "CANCELLED",
                "Operation was cancelled or superseded".to_string(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<CrudError> for ApiError {
    fn from(err: CrudError) -> Self {
        match err {
            CrudError::Invalid(errors) => ApiError::Validation(errors),
            CrudError::NotFound(id) => ApiError::NotFound(format!("Record {id} not found")),
            CrudError::Cancelled => ApiError::Cancelled,
            CrudError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NoStock { .. }
            | InventoryError::Insufficient { .. }
            | InventoryError::DuplicateBatch { .. } => ApiError::Conflict(err.to_string()),
            InventoryError::BatchNotFound(_) => ApiError::NotFound(err.to_string()),
            InventoryError::VaccineMismatch(_) => ApiError::BadRequest(err.to_string()),
            InventoryError::Invalid(errors) => ApiError::Validation(errors),
            InventoryError::Crud(e) => e.into(),
            InventoryError::Database(e) => e.into(),
        }
    }
}

impl From<CampaignError> for ApiError {
    fn from(err: CampaignError) -> Self {
        match err {
            CampaignError::NotFound(_) => ApiError::NotFound(err.to_string()),
            CampaignError::NotActive { .. } | CampaignError::Closed { .. } => {
                ApiError::Conflict(err.to_string())
            }
            CampaignError::VaccineMismatch { .. } => ApiError::BadRequest(err.to_string()),
            CampaignError::Invalid(errors) => ApiError::Validation(errors),
            CampaignError::Crud(e) => e.into(),
        }
    }
}

impl From<VaccinationError> for ApiError {
    fn from(err: VaccinationError) -> Self {
        match err {
            VaccinationError::PatientNotFound(_) => ApiError::NotFound(err.to_string()),
            VaccinationError::DuplicateDose { .. } => ApiError::Conflict(err.to_string()),
            VaccinationError::DoseOutOfRange { .. } => ApiError::BadRequest(err.to_string()),
            VaccinationError::Invalid(errors) => ApiError::Validation(errors),
            VaccinationError::Inventory(e) => e.into(),
            VaccinationError::Campaign(e) => e.into(),
            VaccinationError::Crud(e) => e.into(),
            VaccinationError::Database(e) => e.into(),
        }
    }
}

impl From<OperationError> for ApiError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::Cancelled => ApiError::Cancelled,
            OperationError::Join(detail) => ApiError::Internal(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let response = ApiError::NotFound("Batch not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn bad_request_returns_400() {
        let response = ApiError::BadRequest("Unknown export format".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn crud_errors_map_by_kind() {
        let cancelled: ApiError = CrudError::Cancelled.into();
        assert_eq!(cancelled.into_response().status(), StatusCode::CONFLICT);

        let missing: ApiError = CrudError::NotFound("AE-1".into()).into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let invalid: ApiError = CrudError::Invalid(FormErrors::default()).into();
        let response = invalid.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn stock_shortage_is_conflict() {
        let err: ApiError = InventoryError::Insufficient {
            available: 2,
            requested: 5,
            batch: "BN-1".into(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(
            json["error"]["message"],
            "Insufficient stock. Available: 2, requested: 5 for batch BN-1"
        );
    }

    #[tokio::test]
    async fn dose_errors_map_by_kind() {
        let repeated: ApiError = VaccinationError::DuplicateDose {
            vaccine: "OPV".into(),
            dose: 2,
        }
        .into();
        assert_eq!(repeated.into_response().status(), StatusCode::CONFLICT);

        let stranger: ApiError = VaccinationError::PatientNotFound("PAT09999".into()).into();
        assert_eq!(stranger.into_response().status(), StatusCode::NOT_FOUND);

        let no_stock: ApiError = VaccinationError::Inventory(InventoryError::NoStock {
            vaccine: "OPV".into(),
            facility: "FAC001".into(),
        })
        .into();
        assert_eq!(no_stock.into_response().status(), StatusCode::CONFLICT);

        let closed: ApiError = VaccinationError::Campaign(CampaignError::Closed {
            name: "Polio round".into(),
            status: crate::models::CampaignStatus::Completed,
        })
        .into();
        assert_eq!(closed.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn superseded_operation_is_conflict() {
        let err: ApiError = OperationError::Cancelled.into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
