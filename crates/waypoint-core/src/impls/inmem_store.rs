//! InMemoryRecordStore - テスト・埋め込み用の RecordStore
//!
//! プロセス内の BTreeMap に保持するだけで、永続性はありません。

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::StoreError;
use crate::ports::RecordStore;

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalize(key: &str) -> String {
    key.split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn dir_prefix(dir: &str) -> String {
    let dir = normalize(dir);
    if dir.is_empty() { dir } else { format!("{dir}/") }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records.lock().await.get(&normalize(key)).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .insert(normalize(key), bytes.to_vec());
        Ok(())
    }

    async fn append(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .entry(normalize(key))
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let key = normalize(key);
        let prefix = dir_prefix(&key);
        let records = self.records.lock().await;
        Ok(records.contains_key(&key) || records.keys().any(|k| k.starts_with(&prefix)))
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>, StoreError> {
        let prefix = dir_prefix(dir);
        let records = self.records.lock().await;
        let names: BTreeSet<String> = records
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(str::to_string)
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn remove_all(&self, dir: &str) -> Result<bool, StoreError> {
        let key = normalize(dir);
        let prefix = dir_prefix(&key);
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|k, _| *k != key && !k.starts_with(&prefix));
        Ok(records.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_returns_direct_children_only() {
        let store = InMemoryRecordStore::new();
        store.write("w/a/x.json", b"1").await.unwrap();
        store.write("w/a/y.json", b"1").await.unwrap();
        store.write("w/b/x.json", b"1").await.unwrap();

        assert_eq!(store.list("w").await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.list("w/a").await.unwrap(), vec!["x.json", "y.json"]);
        assert!(store.exists("w/a").await.unwrap());
    }

    #[tokio::test]
    async fn remove_all_drops_subtree() {
        let store = InMemoryRecordStore::new();
        store.write("w/a/x.json", b"1").await.unwrap();
        store.write("w/ab/x.json", b"1").await.unwrap();

        assert!(store.remove_all("w/a").await.unwrap());
        assert!(!store.exists("w/a/x.json").await.unwrap());
        assert!(store.exists("w/ab/x.json").await.unwrap());
        assert!(!store.remove_all("w/a").await.unwrap());
    }

    #[tokio::test]
    async fn append_extends_existing_bytes() {
        let store = InMemoryRecordStore::new();
        store.append("log", b"a\n").await.unwrap();
        store.append("log", b"b\n").await.unwrap();
        assert_eq!(store.read("log").await.unwrap().as_deref(), Some(&b"a\nb\n"[..]));
    }
}
