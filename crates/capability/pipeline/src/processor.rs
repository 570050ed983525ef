//! 报文处理流水线
//!
//! ```text
//! InboundMessage
//!   │ Transport Reader (read_astm / read_serial / read_hl7 / read_delimited)
//!   ▼
//! PluginRegistry::resolve ──NoMatch──► PROTOCOL 错误
//!   │
//!   ▼
//! AnalyzerIdentifier::identify（未知仪器照常处理，只是不做映射）
//!   │
//!   ├── 查询报文 ──► QueryResponder
//!   └── 结果报文 ──► InserterStrategy (Plain | MappingAware) ──► QcProcessor
//! ```
//!
//! 任何失败都会带原始报文生成错误记录，供重处理使用。

use crate::errors::{ErrorService, ErrorServiceError};
use crate::identify::AnalyzerIdentifier;
use crate::lifecycle::AnalyzerLifecycle;
use async_trait::async_trait;
use domain::{AnalyzerStatus, ErrorStatus, ErrorType, InboundMessage, Severity, Transport};
use lis_ingest::{
    DelimitedOptions, IngestError, MessageHandler, ReadError, ReadFailure, now_epoch_ms,
    read_astm, read_delimited, read_hl7, read_serial,
};
use lis_normalize::{
    CoverageReport, ErrorRecorder, InserterStrategy, MappingContext, MappingError, MappingPreview,
    MappingProvider, NewAnalyzerError, QcProcessor, QcReport, StorageMappingProvider, coverage,
    ensure_preview_size, preview,
};
use lis_plugin::{InsertContext, InsertError, PluginRegistry, Resolution, no_match_message};
use lis_protocol::{MessageLayout, decode_bytes};
use lis_storage::{
    AnalyzerErrorStore, AnalyzerRecord, AnalyzerStore, MappingStore, ResultStore, StorageError,
    TransportConfigStore,
};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

/// 流水线写入结果时使用的用户标识。
pub const SYSTEM_USER: &str = "SYSTEM";

/// 映射预览报文默认上限（10 KB）。
pub const DEFAULT_PREVIEW_MAX_BYTES: usize = 10 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("{error}")]
    Read {
        error: ReadError,
        error_id: Option<String>,
    },
    #[error("{message}")]
    NoPluginMatched {
        message: String,
        error_id: Option<String>,
    },
    #[error("analyzer {analyzer_id} is {status}, message not processed")]
    AnalyzerInactive {
        analyzer_id: String,
        status: AnalyzerStatus,
    },
    #[error("{message}")]
    MappingRejected {
        message: String,
        error_id: Option<String>,
    },
    #[error("result insert failed: {message}")]
    Insert {
        message: String,
        error_id: Option<String>,
    },
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("reprocess failed: {0}")]
    Reprocess(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ProcessError {
    /// 失败时生成的错误记录。
    pub fn error_id(&self) -> Option<&str> {
        match self {
            Self::Read { error_id, .. }
            | Self::NoPluginMatched { error_id, .. }
            | Self::MappingRejected { error_id, .. }
            | Self::Insert { error_id, .. } => error_id.as_deref(),
            _ => None,
        }
    }
}

impl From<StorageError> for ProcessError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<ErrorServiceError> for ProcessError {
    fn from(err: ErrorServiceError) -> Self {
        match err {
            ErrorServiceError::NotFound(id) => Self::NotFound(id),
            ErrorServiceError::Invalid(message) => Self::Reprocess(message),
            ErrorServiceError::Storage(message) => Self::Storage(message),
        }
    }
}

/// 报文处理结论。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Inserted,
    Responded,
    /// 非结果报文且插件没有应答器。
    Ignored,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Inserted => "INSERTED",
            ProcessStatus::Responded => "RESPONDED",
            ProcessStatus::Ignored => "IGNORED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub status: ProcessStatus,
    pub layout: MessageLayout,
    pub plugin: String,
    pub analyzer_id: Option<String>,
    pub inserted: usize,
    pub duplicates: usize,
    pub mapping_applied: bool,
    pub unmapped_fields: Vec<String>,
    pub warnings: Vec<String>,
    pub warning_error_id: Option<String>,
    pub qc: QcReport,
    /// 需要回写给仪器的应答行。
    pub response: Option<Vec<String>>,
}

impl ProcessOutcome {
    fn new(status: ProcessStatus, layout: MessageLayout, plugin: &str) -> Self {
        Self {
            status,
            layout,
            plugin: plugin.to_string(),
            analyzer_id: None,
            inserted: 0,
            duplicates: 0,
            mapping_applied: false,
            unmapped_fields: Vec::new(),
            warnings: Vec::new(),
            warning_error_id: None,
            qc: QcReport::default(),
            response: None,
        }
    }
}

/// 流水线依赖的存储集合。
#[derive(Clone)]
pub struct PipelineStores {
    pub analyzers: Arc<dyn AnalyzerStore>,
    pub mappings: Arc<dyn MappingStore>,
    pub errors: Arc<dyn AnalyzerErrorStore>,
    pub results: Arc<dyn ResultStore>,
    pub transport_configs: Arc<dyn TransportConfigStore>,
}

pub struct MessageProcessor {
    registry: Arc<PluginRegistry>,
    stores: PipelineStores,
    identifier: AnalyzerIdentifier,
    provider: Arc<dyn MappingProvider>,
    lifecycle: AnalyzerLifecycle,
    errors: ErrorService,
    recorder: Arc<dyn ErrorRecorder>,
    qc_store: Option<Arc<dyn ResultStore>>,
    preview_max_bytes: usize,
}

impl MessageProcessor {
    pub fn new(registry: Arc<PluginRegistry>, stores: PipelineStores) -> Self {
        let lifecycle = AnalyzerLifecycle::new(
            Arc::clone(&stores.analyzers),
            Arc::clone(&stores.mappings),
            Arc::clone(&stores.errors),
        );
        let errors = ErrorService::new(Arc::clone(&stores.errors)).with_lifecycle(lifecycle.clone());
        Self {
            identifier: AnalyzerIdentifier::new(Arc::clone(&stores.analyzers)),
            provider: Arc::new(StorageMappingProvider::new(Arc::clone(&stores.mappings))),
            recorder: Arc::new(errors.clone()),
            qc_store: Some(Arc::clone(&stores.results)),
            registry,
            stores,
            lifecycle,
            errors,
            preview_max_bytes: DEFAULT_PREVIEW_MAX_BYTES,
        }
    }

    pub fn with_preview_limit(mut self, max_bytes: usize) -> Self {
        self.preview_max_bytes = max_bytes;
        self
    }

    /// 质控服务不可用时 Q 段只记录 QC_SERVICE_UNAVAILABLE。
    pub fn without_qc_service(mut self) -> Self {
        self.qc_store = None;
        self
    }

    pub fn errors(&self) -> &ErrorService {
        &self.errors
    }

    pub fn lifecycle(&self) -> &AnalyzerLifecycle {
        &self.lifecycle
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// 处理一条入站报文。
    pub async fn process(&self, message: InboundMessage) -> Result<ProcessOutcome, ProcessError> {
        let started = Instant::now();
        lis_telemetry::record_message_received();
        info!(
            target: "lis.pipeline",
            transport = message.transport.as_str(),
            source = message.source_address.as_deref().unwrap_or("-"),
            bytes = message.payload.len(),
            "message_received"
        );
        let raw = decode_bytes(&message.payload).text;
        let result = self
            .run(&message, &raw, Arc::clone(&self.recorder), SYSTEM_USER)
            .await;
        lis_telemetry::record_processing_latency_ms(started.elapsed().as_millis() as u64);
        match &result {
            Ok(outcome) => info!(
                target: "lis.pipeline",
                status = outcome.status.as_str(),
                plugin = %outcome.plugin,
                analyzer_id = outcome.analyzer_id.as_deref().unwrap_or("-"),
                inserted = outcome.inserted,
                "message_processed"
            ),
            Err(err) => warn!(
                target: "lis.pipeline",
                transport = message.transport.as_str(),
                error = %err,
                "message_rejected"
            ),
        }
        result
    }

    async fn run(
        &self,
        message: &InboundMessage,
        raw: &str,
        recorder: Arc<dyn ErrorRecorder>,
        user_id: &str,
    ) -> Result<ProcessOutcome, ProcessError> {
        let hint = message.analyzer_hint.as_deref();
        let (layout, lines) = match self.read(message).await {
            Ok(read) => read,
            Err(error) => {
                lis_telemetry::record_read_failure();
                let error_id = record(
                    recorder.as_ref(),
                    NewAnalyzerError::new(hint, error.error_type(), Severity::Error, error.to_string(), raw),
                )
                .await;
                return Err(ProcessError::Read { error, error_id });
            }
        };

        let resolved = match self.resolve(layout, &lines, hint).await {
            Resolution::Matched(resolved) => resolved,
            Resolution::NoMatch => {
                lis_telemetry::record_plugin_unmatched();
                let text = no_match_message(layout);
                warn!(target: "lis.pipeline", layout = layout.as_str(), "plugin_unmatched");
                let error_id = record(
                    recorder.as_ref(),
                    NewAnalyzerError::new(hint, ErrorType::Protocol, Severity::Error, text, raw),
                )
                .await;
                return Err(ProcessError::NoPluginMatched {
                    message: text.to_string(),
                    error_id,
                });
            }
        };
        let plugin_name = resolved.plugin.name().to_string();

        let analyzer = self
            .identifier
            .identify(layout, &lines, message, resolved.plugin.type_id())
            .await;
        if let Some(analyzer) = analyzer.as_ref() {
            if !analyzer.status.accepts_messages() {
                return Err(ProcessError::AnalyzerInactive {
                    analyzer_id: analyzer.analyzer_id.clone(),
                    status: analyzer.status,
                });
            }
        }
        let analyzer_id = analyzer.as_ref().map(|item| item.analyzer_id.clone());

        if !resolved.plugin.is_analyzer_result(&lines) {
            let mut outcome = match resolved.responder.as_ref() {
                Some(responder) => {
                    lis_telemetry::record_query_responded();
                    let mut outcome = ProcessOutcome::new(ProcessStatus::Responded, layout, &plugin_name);
                    outcome.response = Some(responder.respond(&lines));
                    outcome
                }
                None => ProcessOutcome::new(ProcessStatus::Ignored, layout, &plugin_name),
            };
            outcome.analyzer_id = analyzer_id;
            return Ok(outcome);
        }

        let context = match analyzer_id.as_deref() {
            Some(id) => match self.provider.load_context(id).await {
                Ok(context) => Some(Arc::new(context)),
                Err(err) => {
                    record(
                        recorder.as_ref(),
                        NewAnalyzerError::new(
                            Some(id),
                            ErrorType::Mapping,
                            Severity::Critical,
                            format!("Mapping configuration unavailable: {err}"),
                            raw,
                        ),
                    )
                    .await;
                    return Err(ProcessError::Mapping(err));
                }
            },
            None => None,
        };

        let strategy = InserterStrategy::select(
            Arc::clone(&resolved.inserter),
            context.clone(),
            layout,
            Arc::clone(&recorder),
            raw,
        );
        let insert_context = InsertContext {
            analyzer_id: analyzer_id.clone(),
            user_id: user_id.to_string(),
            received_at_ms: message.received_at_ms,
        };
        let inserted = match strategy.insert(&insert_context, &lines).await {
            Ok(inserted) => inserted,
            Err(InsertError::Rejected { message, error_id }) => {
                return Err(ProcessError::MappingRejected { message, error_id });
            }
            Err(err) => {
                let text = err.to_string();
                let error_id = record(
                    recorder.as_ref(),
                    NewAnalyzerError::new(
                        analyzer_id.as_deref(),
                        ErrorType::Connection,
                        Severity::Critical,
                        format!("Result insert failed: {text}"),
                        raw,
                    ),
                )
                .await;
                return Err(ProcessError::Insert {
                    message: text,
                    error_id,
                });
            }
        };

        let mut outcome = ProcessOutcome::new(ProcessStatus::Inserted, layout, &plugin_name);
        outcome.inserted = inserted.insert.inserted;
        outcome.duplicates = inserted.insert.duplicates;
        outcome.warning_error_id = inserted.warning_error_id;
        if let Some(mapping) = inserted.mapping {
            outcome.mapping_applied = true;
            outcome.unmapped_fields = mapping.unmapped_fields;
            outcome.warnings = mapping.warnings;
        }

        if let (Some(id), MessageLayout::Astm) = (analyzer_id.as_deref(), layout) {
            let context = context.unwrap_or_else(|| Arc::new(MappingContext::empty(id)));
            let qc = QcProcessor::new(self.qc_store.clone(), Arc::clone(&recorder));
            outcome.qc = qc
                .process(id, &context, &lines, raw, message.received_at_ms)
                .await;
        }

        // MLLP 发送方对结果报文同样等待 ACK
        if layout == MessageLayout::Hl7 {
            outcome.response = resolved.responder.as_ref().map(|responder| responder.respond(&lines));
        }
        outcome.analyzer_id = analyzer_id;
        Ok(outcome)
    }

    async fn read(&self, message: &InboundMessage) -> Result<(MessageLayout, Vec<String>), ReadError> {
        match message.transport {
            Transport::Astm => Ok((MessageLayout::Astm, read_astm(&message.payload)?)),
            Transport::Serial => Ok((MessageLayout::Astm, read_serial(&message.payload)?)),
            Transport::Hl7 => Ok((MessageLayout::Hl7, read_hl7(&message.payload)?)),
            Transport::File => {
                let options = self.delimited_options(message.analyzer_hint.as_deref()).await;
                Ok((MessageLayout::Delimited, read_delimited(&message.payload, &options)?))
            }
        }
    }

    /// 仪器的文件导入配置；没有配置时按默认 CSV 读取。
    async fn delimited_options(&self, analyzer_id: Option<&str>) -> DelimitedOptions {
        let Some(analyzer_id) = analyzer_id else {
            return DelimitedOptions::default();
        };
        match self.stores.transport_configs.find_file_import_config(analyzer_id).await {
            Ok(Some(config)) => DelimitedOptions::from(&config),
            Ok(None) => DelimitedOptions::default(),
            Err(err) => {
                warn!(target: "lis.pipeline", analyzer_id = %analyzer_id, error = %err, "file_config_lookup_failed");
                DelimitedOptions::default()
            }
        }
    }

    /// 文件导入先取配置仪器类型绑定的插件，再按探测顺序解析。
    async fn resolve(&self, layout: MessageLayout, lines: &[String], hint: Option<&str>) -> Resolution {
        if let (MessageLayout::Delimited, Some(analyzer_id)) = (layout, hint) {
            let type_id = match self.stores.analyzers.find_analyzer(analyzer_id).await {
                Ok(found) => found.and_then(|analyzer| analyzer.analyzer_type_id),
                Err(err) => {
                    warn!(target: "lis.pipeline", analyzer_id = %analyzer_id, error = %err, "analyzer_lookup_failed");
                    None
                }
            };
            if let Some(type_id) = type_id {
                let resolution = self.registry.resolve_for_type(layout, &type_id);
                if matches!(resolution, Resolution::Matched(_)) {
                    return resolution;
                }
            }
        }
        self.registry.resolve(layout, lines)
    }

    /// 用当前映射配置重新处理错误记录中的原始报文。
    ///
    /// 映射仍不完整（未识别仪器、没有生效映射、必填失败、存在未映射字段）时
    /// 先于写入失败。失败时不生成新的错误记录，原记录状态不变；成功后原记录转为 RESOLVED。
    pub async fn reprocess(&self, error_id: &str) -> Result<ReprocessOutcome, ProcessError> {
        let error = self.errors.get(error_id).await?;
        if error.status == ErrorStatus::Resolved {
            return Err(ProcessError::Reprocess(format!(
                "analyzer error {error_id} is already resolved"
            )));
        }
        let layout = MessageLayout::detect(&error.raw_message);
        let transport = match layout {
            MessageLayout::Astm => Transport::Astm,
            MessageLayout::Hl7 => Transport::Hl7,
            MessageLayout::Delimited => Transport::File,
        };
        let mut message = InboundMessage::new(
            transport,
            error.raw_message.clone().into_bytes(),
            now_epoch_ms(),
        );
        message.analyzer_hint = error.analyzer_id.clone();

        if let Err(reason) = self.check_mappings_complete(&message, error.analyzer_id.as_deref()).await {
            return Err(self.reprocess_failed(error_id, reason));
        }

        let pending = Arc::new(PendingRecorder::default());
        let result = self
            .run(&message, &error.raw_message, pending.clone(), SYSTEM_USER)
            .await;
        let outcome = match result {
            Ok(outcome) if outcome.status == ProcessStatus::Inserted => outcome,
            Ok(outcome) => {
                return Err(self.reprocess_failed(
                    error_id,
                    format!("message was {} instead of inserted", outcome.status.as_str().to_lowercase()),
                ));
            }
            Err(err) => return Err(self.reprocess_failed(error_id, err.to_string())),
        };
        if let Some(reason) = incomplete_reason(&outcome, pending.len()) {
            return Err(self.reprocess_failed(error_id, reason));
        }

        let resolved = self.errors.resolve(error_id).await?;
        lis_telemetry::record_reprocess_success();
        info!(
            target: "lis.pipeline",
            error_id = %error_id,
            inserted = outcome.inserted,
            "reprocess_succeeded"
        );
        Ok(ReprocessOutcome {
            error_id: resolved.error_id,
            status: resolved.status,
            outcome,
        })
    }

    /// 写入前的映射演练：不落库、不记录错误。
    async fn check_mappings_complete(
        &self,
        message: &InboundMessage,
        analyzer_id: Option<&str>,
    ) -> Result<(), String> {
        let analyzer_id = analyzer_id.ok_or_else(|| NO_ANALYZER.to_string())?;
        let context = self
            .provider
            .load_context(analyzer_id)
            .await
            .map_err(|err| err.to_string())?;
        if !context.has_active_mappings() {
            return Err(format!("analyzer {analyzer_id} has no active mappings"));
        }
        let (layout, lines) = self.read(message).await.map_err(|err| err.to_string())?;
        let check = context.apply(layout, &lines);
        if !check.success {
            return Err(format!("mappings still incomplete: {}", check.errors.join("; ")));
        }
        if !check.unmapped_fields.is_empty() {
            return Err(format!(
                "fields still unmapped: {}",
                check.unmapped_fields.join(", ")
            ));
        }
        Ok(())
    }

    fn reprocess_failed(&self, error_id: &str, reason: String) -> ProcessError {
        lis_telemetry::record_reprocess_failure();
        warn!(target: "lis.pipeline", error_id = %error_id, reason = %reason, "reprocess_failed");
        ProcessError::Reprocess(reason)
    }

    async fn analyzer(&self, analyzer_id: &str) -> Result<AnalyzerRecord, ProcessError> {
        self.stores
            .analyzers
            .find_analyzer(analyzer_id)
            .await?
            .ok_or_else(|| ProcessError::NotFound(format!("analyzer {analyzer_id}")))
    }

    /// 映射预览：只读演练，不写入结果也不生成错误记录。
    pub async fn preview(
        &self,
        analyzer_id: &str,
        message: &str,
    ) -> Result<MappingPreview, ProcessError> {
        ensure_preview_size(message, self.preview_max_bytes)?;
        self.analyzer(analyzer_id).await?;
        let layout = MessageLayout::detect(message);
        let payload = message.as_bytes();
        let lines = match layout {
            MessageLayout::Astm => read_astm(payload),
            MessageLayout::Hl7 => read_hl7(payload),
            MessageLayout::Delimited => {
                let options = self.delimited_options(Some(analyzer_id)).await;
                read_delimited(payload, &options)
            }
        }
        .map_err(|error| ProcessError::Read {
            error,
            error_id: None,
        })?;
        let context = self.provider.load_context(analyzer_id).await?;
        Ok(preview(&context, layout, &lines))
    }

    pub async fn coverage(&self, analyzer_id: &str) -> Result<CoverageReport, ProcessError> {
        self.analyzer(analyzer_id).await?;
        let fields = self.stores.mappings.list_fields(analyzer_id).await?;
        let mappings = self.stores.mappings.list_mappings(analyzer_id).await?;
        Ok(coverage(&fields, &mappings))
    }
}

/// 重处理结果。
#[derive(Debug, Clone)]
pub struct ReprocessOutcome {
    pub error_id: String,
    pub status: ErrorStatus,
    pub outcome: ProcessOutcome,
}

const NO_ANALYZER: &str = "no analyzer identified for this message";

/// 重处理写入后的复核；任何暂存错误都视为失败。
fn incomplete_reason(outcome: &ProcessOutcome, pending_errors: usize) -> Option<String> {
    if outcome.analyzer_id.is_none() {
        return Some(NO_ANALYZER.to_string());
    }
    if !outcome.mapping_applied {
        return Some("no active mappings were applied".to_string());
    }
    if !outcome.unmapped_fields.is_empty() {
        return Some(format!(
            "fields still unmapped: {}",
            outcome.unmapped_fields.join(", ")
        ));
    }
    if pending_errors > 0 {
        return Some(format!("{pending_errors} analyzer errors raised while reprocessing"));
    }
    None
}

/// 记录错误；记录本身失败只写日志。
async fn record(recorder: &dyn ErrorRecorder, error: NewAnalyzerError) -> Option<String> {
    let error_type = error.error_type;
    match recorder.record(error).await {
        Ok(error_id) => Some(error_id),
        Err(err) => {
            warn!(target: "lis.pipeline", error_type = %error_type, error = %err, "error_record_failed");
            None
        }
    }
}

/// 重处理期间暂存的错误，不落库。
#[derive(Default)]
struct PendingRecorder {
    errors: Mutex<Vec<NewAnalyzerError>>,
}

impl PendingRecorder {
    fn len(&self) -> usize {
        self.errors.lock().map(|errors| errors.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ErrorRecorder for PendingRecorder {
    async fn record(&self, error: NewAnalyzerError) -> Result<String, MappingError> {
        let mut errors = self
            .errors
            .lock()
            .map_err(|_| MappingError::Recorder("lock failed".to_string()))?;
        errors.push(error);
        Ok(format!("pending-{}", errors.len()))
    }
}

#[async_trait]
impl MessageHandler for MessageProcessor {
    async fn handle(&self, message: InboundMessage) -> Result<Option<Vec<String>>, IngestError> {
        self.process(message)
            .await
            .map(|outcome| outcome.response)
            .map_err(|err| IngestError::Handler(err.to_string()))
    }

    async fn read_failed(&self, failure: ReadFailure) {
        lis_telemetry::record_read_failure();
        let raw = decode_bytes(&failure.partial).text;
        warn!(
            target: "lis.pipeline",
            transport = failure.transport.as_str(),
            source = failure.source_address.as_deref().unwrap_or("-"),
            error = %failure.error,
            "transport_read_failed"
        );
        record(
            self.recorder.as_ref(),
            NewAnalyzerError::new(
                failure.analyzer_hint.as_deref(),
                failure.error.error_type(),
                Severity::Error,
                failure.error.to_string(),
                raw,
            ),
        )
        .await;
    }
}
