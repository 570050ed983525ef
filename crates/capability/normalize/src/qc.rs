//! 质控结果处理
//!
//! Q 段的检测代码走 TEST 映射、质控批号走 QC 映射，数值必须可解析并应用单位映射。
//! 失败只记录 QC_MAPPING_INCOMPLETE / QC_SERVICE_UNAVAILABLE 错误，不影响患者结果写入。

use crate::context::MappingContext;
use crate::engine::{UnitResolution, resolve_unit};
use crate::recorder::{ErrorRecorder, NewAnalyzerError};
use domain::{ErrorType, Severity, TargetKind};
use lis_protocol::{astm, parse_qc_segment, qc::qc_lines};
use lis_storage::{QcResultRecord, ResultStore};
use std::sync::Arc;
use tracing::{info, warn};

/// 质控处理计数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QcReport {
    pub processed: usize,
    pub failures: usize,
}

pub struct QcProcessor {
    store: Option<Arc<dyn ResultStore>>,
    recorder: Arc<dyn ErrorRecorder>,
}

impl QcProcessor {
    /// `store` 为空表示质控服务不可用。
    pub fn new(store: Option<Arc<dyn ResultStore>>, recorder: Arc<dyn ErrorRecorder>) -> Self {
        Self { store, recorder }
    }

    pub async fn process(
        &self,
        analyzer_id: &str,
        context: &MappingContext,
        lines: &[String],
        raw_message: &str,
        received_at_ms: i64,
    ) -> QcReport {
        let segments = qc_lines(lines);
        let mut report = QcReport::default();
        if segments.is_empty() {
            return report;
        }

        let Some(store) = self.store.as_ref() else {
            report.failures = segments.len();
            self.fail(
                analyzer_id,
                ErrorType::QcServiceUnavailable,
                format!("QC service unavailable, {} segment(s) not processed", segments.len()),
                raw_message,
            )
            .await;
            return report;
        };

        let instrument_id = astm::instrument_id(lines);
        for line in segments {
            let record = match build_record(
                analyzer_id,
                context,
                line,
                instrument_id.as_deref(),
                received_at_ms,
            ) {
                Ok(record) => record,
                Err(reason) => {
                    report.failures += 1;
                    self.fail(analyzer_id, ErrorType::QcMappingIncomplete, reason, raw_message)
                        .await;
                    continue;
                }
            };
            match store.insert_qc_result(record).await {
                Ok(saved) => {
                    report.processed += 1;
                    lis_telemetry::record_qc_result_processed();
                    info!(
                        target: "lis.mapping",
                        analyzer_id = %analyzer_id,
                        test_id = %saved.test_id,
                        control_lot_id = %saved.control_lot_id,
                        level = %saved.control_level,
                        "qc_result_processed"
                    );
                }
                Err(err) => {
                    report.failures += 1;
                    self.fail(
                        analyzer_id,
                        ErrorType::QcServiceUnavailable,
                        format!("QC result insert failed: {err}"),
                        raw_message,
                    )
                    .await;
                }
            }
        }
        report
    }

    async fn fail(&self, analyzer_id: &str, error_type: ErrorType, message: String, raw: &str) {
        lis_telemetry::record_qc_failure();
        warn!(
            target: "lis.mapping",
            analyzer_id = %analyzer_id,
            error_type = %error_type,
            message = %message,
            "qc_segment_failed"
        );
        let error = NewAnalyzerError::new(Some(analyzer_id), error_type, Severity::Error, message, raw);
        if let Err(err) = self.recorder.record(error).await {
            warn!(target: "lis.mapping", analyzer_id = %analyzer_id, error = %err, "qc_error_record_failed");
        }
    }
}

fn build_record(
    analyzer_id: &str,
    context: &MappingContext,
    line: &str,
    instrument_id: Option<&str>,
    received_at_ms: i64,
) -> Result<QcResultRecord, String> {
    let segment = parse_qc_segment(line, instrument_id).map_err(|err| err.to_string())?;
    let code = segment.test_code.as_str();
    let test = context
        .find_target(code, TargetKind::Test)
        .ok_or_else(|| format!("no active TEST mapping for QC test {code}"))?;
    let lot = context
        .find_target(&segment.control_lot, TargetKind::Qc)
        .ok_or_else(|| format!("no active QC mapping for control lot {}", segment.control_lot))?;

    let (value, unit) = if segment.unit.is_empty() {
        (segment.value.clone(), segment.unit.clone())
    } else {
        match resolve_unit(&test.units, &segment.unit, &segment.value) {
            UnitResolution::Unchanged | UnitResolution::Unmapped(_) => {
                (segment.value.clone(), segment.unit.clone())
            }
            UnitResolution::Converted { value, unit } => {
                (value.unwrap_or_else(|| segment.value.clone()), unit)
            }
            UnitResolution::Rejected(reason) | UnitResolution::NotConvertible(reason) => {
                return Err(format!("QC {code}: {reason}"));
            }
        }
    };
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("QC value '{value}' for {code} is not numeric"))?;

    Ok(QcResultRecord {
        qc_result_id: uuid::Uuid::new_v4().to_string(),
        analyzer_id: analyzer_id.to_string(),
        instrument_id: segment.instrument_id,
        test_id: test.mapping.target.id().to_string(),
        control_lot_id: lot.mapping.target.id().to_string(),
        control_level: segment.level,
        value,
        unit,
        measured_at_ms: segment.measured_at_ms,
        created_at_ms: received_at_ms,
    })
}
