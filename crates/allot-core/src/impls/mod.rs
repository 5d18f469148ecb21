//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryLedger**: LedgerClient の fake（ガス計算と失敗注入つき）
//! - **TracingEventSink** / **MemoryEventSink**: EventSink の実装

pub mod event_sink;
pub mod inmem_ledger;

pub use self::event_sink::{MemoryEventSink, TracingEventSink};
pub use self::inmem_ledger::{GasSchedule, InMemoryLedger, LedgerWrite};
