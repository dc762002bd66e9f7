use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// ユーザーのタイムゾーンを取得
    ///
    /// # Returns
    /// ユーザー不在、またはタイムゾーン未設定の場合は None
    pub async fn find_timezone(&self, user_id: Uuid) -> Result<Option<String>, sqlx::Error> {
        let timezone: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT timezone
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(timezone.flatten())
    }
}
