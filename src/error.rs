use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// ストア層のエラー
///
/// 一意制約違反はストア実装ごとのエラーコードに依存しないよう `Conflict` に正規化する
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("一意制約違反")]
    Conflict,

    #[error("データベースエラー")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e
            && db_err.is_unique_violation()
        {
            return Self::Conflict;
        }
        Self::Database(e)
    }
}

/// 通知送信エラー
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("通知ゲートウェイとの通信に失敗")]
    Http(#[from] reqwest::Error),

    #[error("通知ゲートウェイが拒否しました（status: {status}）")]
    Rejected { status: u16 },
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} が見つかりません")]
    NotFound(&'static str),

    #[error("ストアエラー")]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Store(StoreError::Conflict) => {
                (StatusCode::CONFLICT, "既に登録されています".to_string())
            }
            Self::Store(e) => {
                tracing::error!(error = ?e, "ストアエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
