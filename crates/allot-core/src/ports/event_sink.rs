//! EventSink port - イベント記録の抽象化
//!
//! # 実装
//! - NoopEventSink: 何もしない（デフォルト）
//! - impls::TracingEventSink / impls::MemoryEventSink

use crate::domain::DomainEvent;

/// EventSink はドメインイベントを記録
///
/// engine のロック内から呼ばれることがあるので、ブロックする I/O をしてはいけない。
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DomainEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &DomainEvent) {}
}
