use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretBox};
use serde::Serialize;
use uuid::Uuid;

use crate::error::NotificationError;

/// SOS 一括送信の1件分
#[derive(Debug, Clone, Serialize)]
pub struct SosMessage {
    pub user_id: Uuid,
    /// 緊急連絡先の電話番号（E.164）
    pub phone_number: String,
    pub body: String,
}

/// 通知の配送手段（プッシュ / WhatsApp）
///
/// 送信失敗は呼び出し側でログ出力し、致命的エラーとして扱わない
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn send_alarm(&self, user_id: Uuid, intake_event_id: Uuid)
    -> Result<(), NotificationError>;

    async fn send_sos_bulk(&self, messages: &[SosMessage]) -> Result<(), NotificationError>;
}

/// 通知サービス（開発環境: ログ出力のみ）
#[derive(Clone, Default)]
pub struct LogNotificationProvider;

#[async_trait]
impl NotificationProvider for LogNotificationProvider {
    async fn send_alarm(
        &self,
        user_id: Uuid,
        intake_event_id: Uuid,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            user_id = %user_id,
            intake_event_id = %intake_event_id,
            "服薬アラーム送信（開発モード）"
        );
        Ok(())
    }

    async fn send_sos_bulk(&self, messages: &[SosMessage]) -> Result<(), NotificationError> {
        for message in messages {
            tracing::info!(user_id = %message.user_id, "SOS メッセージ送信（開発モード）");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct AlarmPayload {
    user_id: Uuid,
    intake_event_id: Uuid,
}

#[derive(Debug, Serialize)]
struct SosBulkPayload<'a> {
    messages: &'a [SosMessage],
}

/// プッシュ通知ゲートウェイ クライアント
///
/// `POST {base_url}/alarms` と `POST {base_url}/sos` に JSON を送る
pub struct WebhookNotificationProvider {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretBox<String>>,
}

impl WebhookNotificationProvider {
    pub fn new(base_url: String, token: Option<SecretBox<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), NotificationError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response: reqwest::Response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(status = %status, url = %url, "通知ゲートウェイがエラーを返却");
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationProvider for WebhookNotificationProvider {
    async fn send_alarm(
        &self,
        user_id: Uuid,
        intake_event_id: Uuid,
    ) -> Result<(), NotificationError> {
        self.post(
            "/alarms",
            &AlarmPayload {
                user_id,
                intake_event_id,
            },
        )
        .await?;

        tracing::debug!(intake_event_id = %intake_event_id, "服薬アラーム送信成功");
        Ok(())
    }

    async fn send_sos_bulk(&self, messages: &[SosMessage]) -> Result<(), NotificationError> {
        if messages.is_empty() {
            return Ok(());
        }

        self.post("/sos", &SosBulkPayload { messages }).await?;

        tracing::info!(count = messages.len(), "SOS メッセージ送信成功");
        Ok(())
    }
}
