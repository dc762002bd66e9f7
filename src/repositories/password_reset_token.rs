use sqlx::PgPool;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct PasswordResetTokenRepository {
    pool: PgPool,
}

impl PasswordResetTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 期限切れ、または使用済みになってから保持期間を過ぎたトークンを削除
    ///
    /// # Arguments
    /// * `now` - 現在時刻
    /// * `used_before` - この時刻より前に使用されたトークンを削除する
    ///
    /// # Returns
    /// 削除された行数
    pub async fn delete_expired_or_used(
        &self,
        now: OffsetDateTime,
        used_before: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM password_reset_tokens
            WHERE expires_at < $1
               OR (used_at IS NOT NULL AND used_at < $2)
            "#,
        )
        .bind(now)
        .bind(used_before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
