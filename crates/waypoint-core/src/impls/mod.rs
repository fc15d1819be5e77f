//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **FsRecordStore**: ファイルシステム上の永続ストア
//! - **InMemoryRecordStore**: テスト・埋め込み用

pub mod fs_store;
pub mod inmem_store;

pub use self::fs_store::FsRecordStore;
pub use self::inmem_store::InMemoryRecordStore;
