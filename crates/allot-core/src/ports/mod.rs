//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! engine は時刻・ID・イベント・ledger をすべて trait 越しに受け取り、
//! テストでは in-memory の実装に差し替えます。

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod ledger;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::id_generator::{IdGenerator, SequentialIdGenerator};
pub use self::ledger::LedgerClient;
