//! 文件版持久化存储（JsonFileStorage）
//!
//! 每个命名空间对应目录下的一个 JSON 文件。写入先落到临时文件并 `sync_all`，
//! 再 `rename` 覆盖正式文件，单次调用在崩溃时要么是旧内容要么是新内容。
//! 同一进程内的读改写由互斥锁串行化。
//!
//! 文件名由命名空间单射编码而来：ASCII 字母数字、`-`、`.` 原样保留，其余字节（含 `_`）
//! 写成 `_XX`（大写十六进制），不同命名空间不会落到同一文件。

use crate::error::{CoreError, CoreResult as Result};
use crate::persist::{DurableStorage, StoredItem};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct JsonFileStorage {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    /// 使用目录 `dir` 存放命名空间文件，目录不存在时在首次写入时创建
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(namespace)))
    }

    async fn read(&self, namespace: &str) -> Result<Vec<StoredItem>> {
        let path = self.file_for(namespace);
        match fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| CoreError::storage(namespace, format!("corrupt file {}: {e}", path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, namespace: &str, items: &[StoredItem]) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.file_for(namespace);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(items)?;

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn file_stem(namespace: &str) -> String {
    let mut stem = String::with_capacity(namespace.len());
    for byte in namespace.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.') {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{byte:02X}"));
        }
    }
    stem
}

#[async_trait]
impl DurableStorage for JsonFileStorage {
    async fn get(&self, namespace: &str) -> Result<Vec<StoredItem>> {
        self.read(namespace).await
    }

    async fn set(&self, namespace: &str, items: &[StoredItem]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(namespace, items).await
    }

    async fn remove(&self, namespace: &str, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.read(namespace).await?;
        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Ok(());
        }
        self.write(namespace, &items).await
    }
}
