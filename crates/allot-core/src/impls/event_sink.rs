//! EventSink の実装
//!
//! - TracingEventSink: イベントを構造化 JSON として tracing に流す（CLI 用）
//! - MemoryEventSink: イベントを溜めておく（テスト用）

use std::sync::Mutex;

use tracing::{info, warn};

use crate::domain::DomainEvent;
use crate::ports::EventSink;
use crate::sync::lock;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &DomainEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => info!(target: "allot::events", event = event.name(), %payload),
            Err(e) => warn!(target: "allot::events", event = event.name(), error = %e, "event not serializable"),
        }
    }
}

/// 受け取ったイベントを順番どおりに保持
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        lock(&self.events).clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        lock(&self.events).iter().map(DomainEvent::name).collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &DomainEvent) {
        lock(&self.events).push(event.clone());
    }
}
