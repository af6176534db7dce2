use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chat_protocol::{error_codes, HttpErrorEnvelope};

/// All failure kinds crossing a component boundary.
///
/// Each kind carries a frozen code; the REST surface maps kinds to HTTP
/// statuses, the WS surface logs the code and drops the frame.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("you don't have permission")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("sender is not a member of this group")]
    NotMember,
    #[error("not a party to this message")]
    AccessDenied,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => error_codes::UNAUTHENTICATED,
            Self::Forbidden => error_codes::FORBIDDEN,
            Self::Validation(_) => error_codes::VALIDATION,
            Self::NotFound(_) => error_codes::NOT_FOUND,
            Self::Conflict(_) => error_codes::CONFLICT,
            Self::NotMember => error_codes::NOT_MEMBER,
            Self::AccessDenied => error_codes::ACCESS_DENIED,
            Self::Database(e) if is_unique_violation(e) => error_codes::CONFLICT,
            Self::Database(_) | Self::Internal(_) => error_codes::INTERNAL,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NotMember | Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(e) if is_unique_violation(e) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Database detail stays in the logs, not on the wire.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
            "an unexpected error occurred".to_owned()
        } else if matches!(self, Self::Database(_)) {
            "resource already exists".to_owned()
        } else {
            self.to_string()
        };
        (
            status,
            Json(HttpErrorEnvelope {
                code: self.code().to_owned(),
                message,
                details: None,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn assert_error_response(
        err: ChatError,
        expected_status: StatusCode,
        expected_code: &str,
    ) {
        let response = err.into_response();
        assert_eq!(response.status(), expected_status);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body should be readable");
        let parsed: HttpErrorEnvelope =
            serde_json::from_slice(&body).expect("body should be a valid error envelope");
        assert_eq!(parsed.code, expected_code);
    }

    #[tokio::test]
    async fn unauthenticated_maps_to_401() {
        assert_error_response(
            ChatError::Unauthenticated,
            StatusCode::UNAUTHORIZED,
            error_codes::UNAUTHENTICATED,
        )
        .await;
    }

    #[tokio::test]
    async fn not_member_maps_to_403_with_its_own_code() {
        assert_error_response(
            ChatError::NotMember,
            StatusCode::FORBIDDEN,
            error_codes::NOT_MEMBER,
        )
        .await;
    }

    #[tokio::test]
    async fn validation_maps_to_400() {
        assert_error_response(
            ChatError::Validation("limit must be positive".to_owned()),
            StatusCode::BAD_REQUEST,
            error_codes::VALIDATION,
        )
        .await;
    }

    #[tokio::test]
    async fn internal_hides_detail_from_the_wire() {
        let response = ChatError::Internal("pool exhausted".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: HttpErrorEnvelope = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.code, error_codes::INTERNAL);
        assert!(!parsed.message.contains("pool"));
    }
}
