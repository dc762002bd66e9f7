use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretBox};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use medalarm::{
    config::Config,
    handlers,
    repositories::PgStore,
    services::{
        AlarmProcessor, IntakeEventGenerator, LogNotificationProvider, NotificationProvider,
        RetentionCleaner, Scheduler, WebhookNotificationProvider,
    },
    state::AppState,
    store::Store,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ログ初期化（JSON形式、環境変数でレベル制御）
    init_tracing();

    tracing::info!("medalarm 起動中...");

    // 設定読み込み（不正な値はここで起動失敗）
    let mut config = Config::load().map_err(|e| {
        tracing::error!(error = ?e, "設定の読み込みに失敗");
        anyhow::anyhow!("Failed to load config: {}", e)
    })?;
    let default_tz = config.default_tz()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        default_timezone = %default_tz,
        "設定読み込み完了"
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| {
            tracing::error!(error = ?e, "アドレスのパースに失敗");
            anyhow::anyhow!("Failed to parse address: {}", e)
        })?;

    // データベース接続プール作成
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.database_url.expose_secret())
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, "データベース接続に失敗");
            anyhow::anyhow!("Failed to connect to database: {}", e)
        })?;

    tracing::info!("データベース接続完了");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(db_pool));
    let notifier = build_notifier(
        config.push_gateway_url.clone(),
        config.push_gateway_token.take(),
    );

    // 定期ジョブ起動
    let generator = IntakeEventGenerator::new(store.clone(), default_tz);
    let scheduler = Scheduler::new(
        generator.clone(),
        AlarmProcessor::new(store.clone(), notifier, config.alarm_policy()),
        RetentionCleaner::new(store.clone(), config.retention_policy()),
        config.scheduler_intervals(),
    );
    let scheduler_handle = scheduler.start();

    // Router 構築
    let app = create_router(AppState::new(store, generator));

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        tracing::error!(error = ?e, addr = %addr, "ポートのバインドに失敗");
        anyhow::anyhow!("Failed to bind to {}: {}", addr, e)
    })?;

    tracing::info!(addr = %addr, "サーバー起動");

    // Graceful shutdown 対応
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler_handle.shutdown().await;

    served.map_err(|e| {
        tracing::error!(error = ?e, "サーバーエラー");
        anyhow::anyhow!("Server error: {}", e)
    })?;

    tracing::info!("サーバー終了");

    Ok(())
}

/// tracing の初期化（JSON形式）
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,medalarm=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// 通知プロバイダーの選択（ゲートウェイ未設定時はログ出力のみ）
fn build_notifier(
    push_gateway_url: Option<String>,
    push_gateway_token: Option<SecretBox<String>>,
) -> Arc<dyn NotificationProvider> {
    match push_gateway_url {
        Some(url) => {
            tracing::info!(push_gateway_url = %url, "プッシュ通知ゲートウェイを使用");
            Arc::new(WebhookNotificationProvider::new(url, push_gateway_token))
        }
        None => {
            tracing::info!("プッシュ通知ゲートウェイ未設定（ログ出力のみ）");
            Arc::new(LogNotificationProvider)
        }
    }
}

/// Router の構築
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        // CRUD 層からの内部呼び出し
        .route(
            "/internal/reminders/{id}/resync",
            post(handlers::resync_reminder),
        )
        .route(
            "/internal/schedules/{id}/resync",
            post(handlers::resync_schedule),
        )
        .route(
            "/internal/intake-events/{id}/taken",
            post(handlers::mark_taken),
        )
        .with_state(state)
}

/// Graceful shutdown シグナル待機
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?e, "Ctrl+C ハンドラーのインストールに失敗");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "SIGTERM ハンドラーのインストールに失敗");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("SIGTERM received, starting graceful shutdown");
        }
    }
}
