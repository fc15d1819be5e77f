//! FsRecordStore - ファイルシステム上の RecordStore
//!
//! - write: 同じディレクトリに一時ファイルを書いてから rename（途中状態を読ませない）
//! - append: `O_APPEND` で 1 回の write_all（read-modify-write はしない）

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::domain::StoreError;
use crate::ports::RecordStore;

const TMP_MARKER: &str = ".tmp-";

/// ルートディレクトリ配下に key をパスとして配置する RecordStore
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    root: PathBuf,
}

impl FsRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path(key);
        Self::ensure_parent(&path).await?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(format!("{TMP_MARKER}{:016x}", rand::random::<u64>()));
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn append(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path(key);
        Self::ensure_parent(&path).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(fs::try_exists(self.path(key)).await?)
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(self.path(dir)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.contains(TMP_MARKER) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn remove_all(&self, dir: &str) -> Result<bool, StoreError> {
        match fs::remove_dir_all(self.path(dir)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn read_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());
        assert_eq!(store.read("nope/x.json").await.unwrap(), None);
        assert!(!store.exists("nope/x.json").await.unwrap());
    }

    #[tokio::test]
    async fn write_creates_parents_and_replaces() {
        let dir = tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());

        store.write("a/b/c.json", b"one").await.unwrap();
        store.write("a/b/c.json", b"two").await.unwrap();

        assert_eq!(store.read("a/b/c.json").await.unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(store.list("a/b").await.unwrap(), vec!["c.json"]);
    }

    #[tokio::test]
    async fn append_accumulates_lines() {
        let dir = tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());

        store.append("log.jsonl", b"1\n").await.unwrap();
        store.append("log.jsonl", b"2\n").await.unwrap();

        assert_eq!(store.read("log.jsonl").await.unwrap().as_deref(), Some(&b"1\n2\n"[..]));
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_interleave() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(FsRecordStore::new(dir.path()));

        let mut joins = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            joins.push(tokio::spawn(async move {
                let line = format!("{}\n", i.to_string().repeat(64));
                store.append("log.jsonl", line.as_bytes()).await.unwrap();
            }));
        }
        for j in joins {
            j.await.unwrap();
        }

        let bytes = store.read("log.jsonl").await.unwrap().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 16);
        for line in lines {
            assert!((0..16).any(|i| line == i.to_string().repeat(64)), "torn line: {line}");
        }
    }

    #[tokio::test]
    async fn remove_all_reports_existence() {
        let dir = tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());

        store.write("w/1/x.json", b"{}").await.unwrap();
        assert!(store.remove_all("w/1").await.unwrap());
        assert!(!store.remove_all("w/1").await.unwrap());
        assert!(store.list("w/1").await.unwrap().is_empty());
    }
}
