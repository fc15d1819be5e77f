//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。ストア本体（app）は
//! 永続化・時刻・ID 生成をこれらの trait 越しにしか触りません。

pub mod clock;
pub mod id_generator;
pub mod record_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::record_store::RecordStore;
