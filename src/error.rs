//! Error kinds of the public surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Reported as `origin` in every error body.
pub const ERROR_ORIGIN: &str = "graasp-plugin-public";

/// PublicError
///
/// Every failure the public surface can produce. Each kind maps to a stable code and an
/// HTTP status (see `code` and `status`).
#[derive(Debug, thiserror::Error)]
pub enum PublicError {
    #[error("Item not found")]
    ItemNotFound(Uuid),

    #[error("Item is not public")]
    ItemNotPublic(Uuid),

    #[error("Cannot edit public item")]
    CannotEditPublicItem(Option<Uuid>),

    #[error("Cannot edit public member")]
    CannotEditPublicMember(Option<Uuid>),

    #[error("Member not found")]
    MemberNotFound(Uuid),

    #[error("Too many targets requested")]
    TooManyTargets(usize),

    #[error("Member cannot write item")]
    MemberCannotWriteItem(Uuid),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl PublicError {
    pub fn code(&self) -> &'static str {
        match self {
            PublicError::ItemNotFound(_) => "GPIERR001",
            PublicError::ItemNotPublic(_) => "GPIERR002",
            PublicError::CannotEditPublicItem(_) => "GERR003",
            PublicError::CannotEditPublicMember(_) => "GERR004",
            PublicError::MemberNotFound(_) => "GPIERR005",
            PublicError::TooManyTargets(_) => "GPIERR006",
            PublicError::MemberCannotWriteItem(_) => "GPIERR007",
            PublicError::Database(_) => "GPIERR999",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PublicError::ItemNotFound(_) | PublicError::MemberNotFound(_) => StatusCode::NOT_FOUND,
            PublicError::ItemNotPublic(_) | PublicError::MemberCannotWriteItem(_) => {
                StatusCode::FORBIDDEN
            }
            PublicError::CannotEditPublicItem(_)
            | PublicError::CannotEditPublicMember(_)
            | PublicError::TooManyTargets(_) => StatusCode::BAD_REQUEST,
            PublicError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Value attached as `data` in the error body, usually the offending id.
    fn data(&self) -> serde_json::Value {
        match self {
            PublicError::ItemNotFound(id)
            | PublicError::ItemNotPublic(id)
            | PublicError::MemberNotFound(id)
            | PublicError::MemberCannotWriteItem(id) => serde_json::json!(id),
            PublicError::CannotEditPublicItem(id) | PublicError::CannotEditPublicMember(id) => {
                serde_json::json!(id)
            }
            PublicError::TooManyTargets(count) => serde_json::json!(count),
            PublicError::Database(_) => serde_json::Value::Null,
        }
    }

    /// Serializable view of the error. Database details never leave the process.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            status_code: self.status().as_u16(),
            message: self.to_string(),
            data: self.data(),
            origin: ERROR_ORIGIN.to_string(),
        }
    }
}

/// ErrorBody
///
/// Wire format of a `PublicError`, used both for whole-request failures and for the
/// failed elements of a batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ErrorBody {
    pub code: String,
    pub status_code: u16,
    pub message: String,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    pub origin: String,
}

impl IntoResponse for PublicError {
    fn into_response(self) -> Response {
        match &self {
            PublicError::Database(e) => tracing::error!(error = %e, "database error"),
            other => tracing::debug!(code = other.code(), "request rejected: {}", other),
        }
        (self.status(), Json(self.body())).into_response()
    }
}

/// Result type alias using PublicError.
pub type PublicResult<T> = Result<T, PublicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_public_is_forbidden_with_stable_code() {
        let id = Uuid::new_v4();
        let body = PublicError::ItemNotPublic(id).body();

        assert_eq!(body.code, "GPIERR002");
        assert_eq!(body.status_code, 403);
        assert_eq!(body.message, "Item is not public");
        assert_eq!(body.data, serde_json::json!(id));
        assert_eq!(body.origin, ERROR_ORIGIN);
    }

    #[test]
    fn edit_gates_are_bad_requests() {
        assert_eq!(
            PublicError::CannotEditPublicItem(None).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PublicError::CannotEditPublicMember(Some(Uuid::nil())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn database_errors_hide_details() {
        let body = PublicError::Database(sqlx::Error::RowNotFound).body();
        assert_eq!(body.status_code, 500);
        assert_eq!(body.message, "database error");
        assert_eq!(body.data, serde_json::Value::Null);
    }

    #[test]
    fn body_serializes_camel_case() {
        let json = serde_json::to_value(PublicError::TooManyTargets(51).body()).unwrap();
        assert_eq!(json["statusCode"], 400);
        assert_eq!(json["data"], 51);
    }
}
