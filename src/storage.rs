//! Storage collaborator seam
//!
//! The core produces bytes; persistence is a collaborator behind the
//! `Storage` trait. A local filesystem implementation ships here; cloud
//! backends are implemented by consuming applications against the same
//! trait. Output is streamed to the sink in bounded chunks rather than
//! handed over as one allocation.

use crate::error::{ConvertError, Result};
use crate::pipeline::ConversionResult;
use async_trait::async_trait;
use bytes::Bytes;
use log::{info, warn};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Where one conversion's output goes.
#[derive(Debug, Clone)]
pub enum Destination {
    /// Local filesystem path
    Local(PathBuf),
    /// Cloud blob target; credentials are opaque to the core
    Cloud {
        account: String,
        container: String,
        blob_name: String,
        auth_token: String,
    },
    /// Persist locally and to the cloud
    Both {
        local_path: PathBuf,
        account: String,
        container: String,
        blob_name: String,
        auth_token: String,
    },
}

/// What the storage collaborator reports back.
#[derive(Debug, Clone, Default)]
pub struct PersistReceipt {
    pub local_path: Option<PathBuf>,
    pub cloud_url: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

/// An open, append-only target for one output.
#[async_trait]
pub trait StorageSink: Send {
    /// Append one chunk of output bytes
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;

    /// Flush and report where the bytes landed
    async fn finish(self: Box<Self>) -> Result<PersistReceipt>;
}

/// Trait for persistence backends.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open a sink for a destination
    async fn open(&self, destination: &Destination) -> Result<Box<dyn StorageSink>>;
}

/// Local filesystem storage
pub struct FileSystemStorage {
    base_path: PathBuf,
}

impl FileSystemStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }
}

struct FileSink {
    file: fs::File,
    path: PathBuf,
}

#[async_trait]
impl StorageSink for FileSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| ConvertError::Storage(e.to_string()))
    }

    async fn finish(self: Box<Self>) -> Result<PersistReceipt> {
        let FileSink { mut file, path } = *self;
        file.flush()
            .await
            .map_err(|e| ConvertError::Storage(e.to_string()))?;
        Ok(PersistReceipt {
            local_path: Some(path),
            cloud_url: None,
            success: true,
            error: None,
        })
    }
}

#[async_trait]
impl Storage for FileSystemStorage {
    async fn open(&self, destination: &Destination) -> Result<Box<dyn StorageSink>> {
        match destination {
            Destination::Local(path) => {
                let full_path = self.base_path.join(path);
                if let Some(parent) = full_path.parent() {
                    fs::create_dir_all(parent).await.map_err(ConvertError::Io)?;
                }
                let file = fs::File::create(&full_path)
                    .await
                    .map_err(ConvertError::Io)?;
                Ok(Box::new(FileSink {
                    file,
                    path: full_path,
                }))
            }
            Destination::Cloud { .. } | Destination::Both { .. } => {
                // Cloud blobs are a collaborator concern; implement the
                // Storage trait with your cloud SDK of choice.
                Err(ConvertError::Configuration(
                    "FileSystemStorage only handles local destinations; \
                     implement the Storage trait for cloud targets"
                        .to_string(),
                ))
            }
        }
    }
}

/// Stream a successful conversion's output to storage in bounded chunks.
///
/// Only called after `ConversionResult.success`; a storage failure is
/// reported in the receipt and never un-succeeds the conversion.
pub async fn persist_output(
    storage: &dyn Storage,
    destination: &Destination,
    result: &ConversionResult,
    chunk_size: usize,
) -> PersistReceipt {
    let Some(output) = result.output.as_ref() else {
        return PersistReceipt {
            error: Some("conversion produced no output to persist".to_string()),
            ..Default::default()
        };
    };

    match write_in_chunks(storage, destination, output, chunk_size).await {
        Ok(receipt) => {
            info!(
                "persisted conversion {} ({} bytes)",
                result.request_id,
                output.len()
            );
            receipt
        }
        Err(err) => {
            warn!("persisting conversion {} failed: {}", result.request_id, err);
            PersistReceipt {
                error: Some(err.to_string()),
                ..Default::default()
            }
        }
    }
}

/// Persist one output through several backends concurrently.
///
/// Each backend gets its own receipt; one backend failing does not stop
/// the others.
pub async fn persist_to_all(
    storages: &[&dyn Storage],
    destination: &Destination,
    result: &ConversionResult,
    chunk_size: usize,
) -> Vec<PersistReceipt> {
    let writes = storages
        .iter()
        .map(|storage| persist_output(*storage, destination, result, chunk_size));
    futures::future::join_all(writes).await
}

async fn write_in_chunks(
    storage: &dyn Storage,
    destination: &Destination,
    output: &Bytes,
    chunk_size: usize,
) -> Result<PersistReceipt> {
    let chunk_size = chunk_size.max(1);
    let mut sink = storage.open(destination).await?;
    for chunk in output.chunks(chunk_size) {
        sink.write_chunk(chunk).await?;
    }
    sink.finish().await
}
