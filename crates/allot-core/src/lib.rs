//! allot-core
//!
//! Core building blocks for the task allocation & settlement engine.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, worker, task, allocation, state, errors, events, units）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, EventSink, LedgerClient）
//! - **registry**: Worker / Task の正本とエンティティ単位のロック
//! - **allocation**: eligibility filter, planner, allocation book
//! - **accounting**: 実行コストとタスク統計の集計
//! - **app**: アプリケーションロジック（builder, engine, lifecycle, coordinator）
//! - **impls**: 実装（InMemoryLedger, event sinks）

pub mod accounting;
pub mod allocation;
pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod registry;

mod sync;

pub use app::{Coordinator, Engine, EngineBuilder};
pub use domain::{EngineError, ErrorKind};
