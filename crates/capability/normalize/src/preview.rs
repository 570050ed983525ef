//! 映射预览：对粘贴的报文做一次不落库的映射演练

use crate::context::MappingContext;
use crate::engine::MappingOutcome;
use crate::error::MappingError;
use lis_protocol::{MessageLayout, ResultField};

/// 预览结果。
#[derive(Debug, Clone)]
pub struct MappingPreview {
    pub layout: MessageLayout,
    /// 映射前解析出的结果字段。
    pub parsed_fields: Vec<ResultField>,
    pub outcome: MappingOutcome,
    /// 映射后将要写入的结果。
    pub entities: Vec<ResultField>,
}

/// 预览报文大小上限。
pub fn ensure_preview_size(message: &str, max_bytes: usize) -> Result<(), MappingError> {
    if message.len() > max_bytes {
        return Err(MappingError::PreviewTooLarge {
            size: message.len(),
            max: max_bytes,
        });
    }
    Ok(())
}

pub fn preview(context: &MappingContext, layout: MessageLayout, lines: &[String]) -> MappingPreview {
    let parsed_fields = layout.result_fields(lines);
    let outcome = context.apply(layout, lines);
    let entities = if outcome.success {
        layout.result_fields(&outcome.transformed_lines)
    } else {
        Vec::new()
    };
    MappingPreview {
        layout,
        parsed_fields,
        outcome,
        entities,
    }
}
