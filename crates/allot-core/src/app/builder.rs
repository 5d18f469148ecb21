//! EngineBuilder - engine の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - ports は省略するとデフォルト実装（SystemClock, SequentialIdGenerator, NoopEventSink）
//! - build() 時に設定値を検証し、不正なら BuildError を返す

use std::sync::Arc;

use super::engine::Engine;
use crate::allocation::AllocationBook;
use crate::ports::{Clock, EventSink, IdGenerator, NoopEventSink, SequentialIdGenerator, SystemClock};
use crate::registry::Registry;

pub const DEFAULT_MAX_PLAN_ATTEMPTS: u32 = 3;

/// EngineBuilder は Engine を構築
///
/// # 使用例
/// ```ignore
/// let engine = EngineBuilder::new()
///     .clock(Arc::new(FixedClock::new(start)))
///     .event_sink(Arc::new(TracingEventSink))
///     .max_plan_attempts(5)
///     .build()?;
/// ```
pub struct EngineBuilder {
    clock: Option<Arc<dyn Clock>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
    event_sink: Option<Arc<dyn EventSink>>,
    max_plan_attempts: u32,
}

/// BuildError は engine 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("max_plan_attempts must be at least 1, got {0}")]
    InvalidPlanAttempts(u32),
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            clock: None,
            id_generator: None,
            event_sink: None,
            max_plan_attempts: DEFAULT_MAX_PLAN_ATTEMPTS,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(id_generator);
        self
    }

    pub fn event_sink(mut self, event_sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(event_sink);
        self
    }

    /// How many times `allocate` re-plans when worker capacity changes between
    /// planning and commit before giving up with `ConcurrencyConflict`.
    pub fn max_plan_attempts(mut self, attempts: u32) -> Self {
        self.max_plan_attempts = attempts;
        self
    }

    pub fn build(self) -> Result<Engine, BuildError> {
        if self.max_plan_attempts == 0 {
            return Err(BuildError::InvalidPlanAttempts(self.max_plan_attempts));
        }
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .id_generator
            .unwrap_or_else(|| Arc::new(SequentialIdGenerator::new(Arc::clone(&clock))));
        let events = self.event_sink.unwrap_or_else(|| Arc::new(NoopEventSink));

        Ok(Engine {
            registry: Registry::new(),
            book: AllocationBook::new(),
            clock,
            ids,
            events,
            max_plan_attempts: self.max_plan_attempts,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
