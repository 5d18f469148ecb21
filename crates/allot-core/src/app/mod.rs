//! App - アプリケーション層
//!
//! このモジュールは、domain / registry / allocation を ports と組み合わせて
//! engine の操作を実装します。
//!
//! # 主要コンポーネント
//! - **EngineBuilder**: engine の構築とワイヤリング
//! - **Engine**: 登録・照会・割り当て・状態遷移の表面（同期）
//! - **Coordinator**: engine と LedgerClient の橋渡し（async）
//! - **status**: 集計ビュー

pub mod allocate;
pub mod builder;
pub mod coordinator;
pub mod engine;
pub mod lifecycle;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, DEFAULT_MAX_PLAN_ATTEMPTS, EngineBuilder};
pub use self::coordinator::{Confirmed, Coordinator};
pub use self::engine::Engine;
pub use self::status::{TaskStats, TaskStatusCounts, WorkerOverview, WorkerTask};
