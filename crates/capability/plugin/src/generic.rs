//! 通用插件：由仪器类型的识别正则驱动（GenericASTM / GenericHL7），或按类型绑定（GenericFile）

use crate::error::PluginError;
use crate::inserter::ResultStoreInserter;
use crate::responder::{AstmQueryResponder, Hl7AckResponder};
use crate::traits::{AnalyzerPlugin, LineInserter, QueryResponder};
use lis_protocol::{MessageLayout, astm, hl7};
use lis_storage::ResultStore;
use regex::Regex;
use std::sync::Arc;

pub const GENERIC_ASTM: &str = "GenericASTM";
pub const GENERIC_HL7: &str = "GenericHL7";
pub const GENERIC_FILE: &str = "GenericFile";

/// 通用插件。
pub struct GenericPlugin {
    name: String,
    type_id: Option<String>,
    layout: MessageLayout,
    /// None 表示不参与报文探测。
    pattern: Option<Regex>,
    inserter: Arc<dyn LineInserter>,
    responder: Option<Arc<dyn QueryResponder>>,
}

fn compile(pattern: Option<&str>) -> Result<Option<Regex>, PluginError> {
    pattern
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(|pattern| {
            Regex::new(pattern).map_err(|err| PluginError::InvalidPattern(err.to_string()))
        })
        .transpose()
}

impl GenericPlugin {
    pub fn astm(
        type_id: Option<String>,
        pattern: Option<&str>,
        results: Arc<dyn ResultStore>,
    ) -> Result<Self, PluginError> {
        Ok(Self {
            name: GENERIC_ASTM.to_string(),
            type_id,
            layout: MessageLayout::Astm,
            pattern: compile(pattern)?,
            inserter: Arc::new(ResultStoreInserter::new(results, MessageLayout::Astm)),
            responder: Some(Arc::new(AstmQueryResponder)),
        })
    }

    pub fn hl7(
        type_id: Option<String>,
        pattern: Option<&str>,
        results: Arc<dyn ResultStore>,
    ) -> Result<Self, PluginError> {
        Ok(Self {
            name: GENERIC_HL7.to_string(),
            type_id,
            layout: MessageLayout::Hl7,
            pattern: compile(pattern)?,
            inserter: Arc::new(ResultStoreInserter::new(results, MessageLayout::Hl7)),
            responder: Some(Arc::new(Hl7AckResponder)),
        })
    }

    pub fn file(type_id: Option<String>, results: Arc<dyn ResultStore>) -> Self {
        Self {
            name: GENERIC_FILE.to_string(),
            type_id,
            layout: MessageLayout::Delimited,
            pattern: None,
            inserter: Arc::new(ResultStoreInserter::new(results, MessageLayout::Delimited)),
            responder: None,
        }
    }

    /// 替换写入器（测试或自定义存储）。
    pub fn with_inserter(mut self, inserter: Arc<dyn LineInserter>) -> Self {
        self.inserter = inserter;
        self
    }

    /// 报文中用于匹配识别正则的候选值。
    fn identifiers(&self, lines: &[String]) -> Vec<String> {
        match self.layout {
            MessageLayout::Astm => [astm::header_sender(lines), astm::header_display_name(lines)]
                .into_iter()
                .flatten()
                .collect(),
            MessageLayout::Hl7 => [hl7::sending_application(lines), hl7::sending_facility(lines)]
                .into_iter()
                .flatten()
                .collect(),
            MessageLayout::Delimited => Vec::new(),
        }
    }
}

impl AnalyzerPlugin for GenericPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn layout(&self) -> MessageLayout {
        self.layout
    }

    fn is_target_analyzer(&self, lines: &[String]) -> Result<bool, PluginError> {
        let Some(pattern) = self.pattern.as_ref() else {
            return Ok(false);
        };
        Ok(self
            .identifiers(lines)
            .iter()
            .any(|identifier| pattern.is_match(identifier)))
    }

    fn line_inserter(&self) -> Arc<dyn LineInserter> {
        Arc::clone(&self.inserter)
    }

    fn responder(&self) -> Option<Arc<dyn QueryResponder>> {
        self.responder.clone()
    }

    fn type_id(&self) -> Option<&str> {
        self.type_id.as_deref()
    }
}
