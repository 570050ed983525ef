//! 仪器识别（尽力而为，失败视为未知仪器）
//!
//! 顺序：传输层提示（串口/文件配置） → 报文头仪器名 → 来源 IP → 插件类型下唯一的仪器。

use domain::InboundMessage;
use lis_protocol::MessageLayout;
use lis_storage::{AnalyzerRecord, AnalyzerStore, StorageError};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AnalyzerIdentifier {
    analyzers: Arc<dyn AnalyzerStore>,
}

impl AnalyzerIdentifier {
    pub fn new(analyzers: Arc<dyn AnalyzerStore>) -> Self {
        Self { analyzers }
    }

    pub async fn identify(
        &self,
        layout: MessageLayout,
        lines: &[String],
        message: &InboundMessage,
        plugin_type: Option<&str>,
    ) -> Option<AnalyzerRecord> {
        if let Some(hint) = message.analyzer_hint.as_deref() {
            if let Some(found) = self.lookup("hint", self.analyzers.find_analyzer(hint).await) {
                return Some(found);
            }
        }
        if let Some(name) = layout.header_name(lines) {
            let found = self.lookup("header_name", self.analyzers.find_analyzer_by_name(&name).await);
            if found.is_some() {
                return found;
            }
            debug!(target: "lis.pipeline", header_name = %name, "analyzer_name_unknown");
        }
        if let Some(ip) = message.source_ip() {
            if let Some(found) = self.lookup("source_ip", self.analyzers.find_analyzer_by_ip(ip).await) {
                return Some(found);
            }
        }
        let type_id = plugin_type?;
        match self.analyzers.list_analyzers().await {
            Ok(analyzers) => {
                let mut candidates = analyzers
                    .into_iter()
                    .filter(|item| item.analyzer_type_id.as_deref() == Some(type_id));
                match (candidates.next(), candidates.next()) {
                    (Some(only), None) => Some(only),
                    _ => None,
                }
            }
            Err(err) => {
                warn!(target: "lis.pipeline", strategy = "plugin_type", error = %err, "analyzer_lookup_failed");
                None
            }
        }
    }

    fn lookup(
        &self,
        strategy: &'static str,
        result: Result<Option<AnalyzerRecord>, StorageError>,
    ) -> Option<AnalyzerRecord> {
        match result {
            Ok(found) => found,
            Err(err) => {
                warn!(target: "lis.pipeline", strategy, error = %err, "analyzer_lookup_failed");
                None
            }
        }
    }
}
