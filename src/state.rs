use std::sync::Arc;

use crate::services::IntakeEventGenerator;
use crate::store::Store;

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// 永続化層
    pub store: Arc<dyn Store>,
    /// 服薬イベント生成サービス（再同期用）
    pub generator: IntakeEventGenerator,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(store: Arc<dyn Store>, generator: IntakeEventGenerator) -> Self {
        Self { store, generator }
    }
}
