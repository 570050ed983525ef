//! 文件导入目录轮询
//!
//! 每个生效配置一个任务并发执行；同一配置内按文件名顺序逐个处理。
//! 成功的文件移入归档目录（未配置时改名为 `.processed`），失败的移入错误目录（`.failed`）。

use crate::error::IngestError;
use crate::{MessageHandler, Source, now_epoch_ms};
use async_trait::async_trait;
use domain::{InboundMessage, Transport};
use lis_storage::{FileImportConfigRecord, TransportConfigStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// 一轮扫描的统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub processed: usize,
    pub failed: usize,
}

impl ImportSummary {
    fn merge(&mut self, other: ImportSummary) {
        self.processed += other.processed;
        self.failed += other.failed;
    }
}

/// 文件导入采集源。
pub struct FileImportWatcher {
    store: Arc<dyn TransportConfigStore>,
    poll_interval: Duration,
}

impl FileImportWatcher {
    pub fn new(store: Arc<dyn TransportConfigStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }

    /// 扫描一轮所有生效配置。
    pub async fn scan_once(
        &self,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<ImportSummary, IngestError> {
        let configs = self
            .store
            .list_file_import_configs()
            .await
            .map_err(|err| IngestError::Source(err.to_string()))?;

        let mut tasks = JoinSet::new();
        for config in configs.into_iter().filter(|config| config.active) {
            let handler = Arc::clone(&handler);
            tasks.spawn(async move { import_directory(config, handler).await });
        }

        let mut summary = ImportSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(part)) => summary.merge(part),
                Ok(Err(err)) => warn!(target: "lis.file_import", error = %err, "import_failed"),
                Err(err) => warn!(target: "lis.file_import", error = %err, "import_task_failed"),
            }
        }
        Ok(summary)
    }
}

#[async_trait]
impl Source for FileImportWatcher {
    async fn run(&self, handler: Arc<dyn MessageHandler>) -> Result<(), IngestError> {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            match self.scan_once(Arc::clone(&handler)).await {
                Ok(summary) if summary.processed + summary.failed > 0 => {
                    info!(
                        target: "lis.file_import",
                        processed = summary.processed,
                        failed = summary.failed,
                        "import_scan_completed"
                    );
                }
                Ok(_) => {}
                Err(err) => warn!(target: "lis.file_import", error = %err, "import_scan_failed"),
            }
        }
    }
}

/// 按 glob 模式列出待导入文件（排序）。
pub fn pending_files(config: &FileImportConfigRecord) -> Result<Vec<PathBuf>, IngestError> {
    let pattern = Path::new(&config.import_directory).join(&config.file_pattern);
    let pattern = pattern.to_string_lossy();
    let entries =
        glob::glob(&pattern).map_err(|err| IngestError::Source(format!("{pattern}: {err}")))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

async fn import_directory(
    config: FileImportConfigRecord,
    handler: Arc<dyn MessageHandler>,
) -> Result<ImportSummary, IngestError> {
    let mut summary = ImportSummary::default();
    for path in pending_files(&config)? {
        let payload = tokio::fs::read(&path).await?;
        let message = InboundMessage::new(Transport::File, payload, now_epoch_ms())
            .with_analyzer_hint(config.analyzer_id.clone());
        let file = path.display().to_string();
        match handler.handle(message).await {
            Ok(_) => {
                let target = relocate(&path, config.archive_directory.as_deref(), "processed").await?;
                info!(
                    target: "lis.file_import",
                    analyzer_id = %config.analyzer_id,
                    file = %file,
                    moved_to = %target.display(),
                    "file_imported"
                );
                summary.processed += 1;
            }
            Err(err) => {
                let target = relocate(&path, config.error_directory.as_deref(), "failed").await?;
                warn!(
                    target: "lis.file_import",
                    analyzer_id = %config.analyzer_id,
                    file = %file,
                    moved_to = %target.display(),
                    error = %err,
                    "file_import_failed"
                );
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

/// 移入目标目录；未配置目录时追加后缀改名。
async fn relocate(
    path: &Path,
    directory: Option<&str>,
    suffix: &str,
) -> Result<PathBuf, IngestError> {
    let target = match directory.map(str::trim).filter(|dir| !dir.is_empty()) {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            let name = path
                .file_name()
                .ok_or_else(|| IngestError::Source(format!("no file name: {}", path.display())))?;
            Path::new(dir).join(name)
        }
        None => {
            let mut name = path.as_os_str().to_owned();
            name.push(".");
            name.push(suffix);
            PathBuf::from(name)
        }
    };
    tokio::fs::rename(path, &target).await?;
    Ok(target)
}
