//! 插件注册表
//!
//! 按注册顺序探测，第一个匹配者胜出；探测出错或 panic 视为不匹配并继续。

use crate::generic::{GENERIC_ASTM, GENERIC_FILE, GENERIC_HL7, GenericPlugin};
use crate::traits::{AnalyzerPlugin, LineInserter, QueryResponder};
use lis_protocol::MessageLayout;
use lis_storage::{AnalyzerTypeRecord, ResultStore};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 匹配到的插件及其写入器、应答器（同一次解析内不再重复探测）。
#[derive(Clone)]
pub struct ResolvedPlugin {
    pub plugin: Arc<dyn AnalyzerPlugin>,
    pub inserter: Arc<dyn LineInserter>,
    pub responder: Option<Arc<dyn QueryResponder>>,
}

impl ResolvedPlugin {
    fn from_plugin(plugin: Arc<dyn AnalyzerPlugin>) -> Self {
        let inserter = plugin.line_inserter();
        let responder = plugin.responder();
        Self {
            plugin,
            inserter,
            responder,
        }
    }
}

/// 插件解析结果。
#[derive(Clone)]
pub enum Resolution {
    Matched(ResolvedPlugin),
    NoMatch,
}

impl Resolution {
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            Resolution::Matched(resolved) => Some(resolved.plugin.name()),
            Resolution::NoMatch => None,
        }
    }
}

/// 未匹配时返回给调用方的说明。
pub fn no_match_message(layout: MessageLayout) -> &'static str {
    match layout {
        MessageLayout::Astm => {
            "No ASTM plugin matched this message (e.g. configure GenericASTM with matching identifier pattern)"
        }
        MessageLayout::Hl7 => {
            "No HL7 plugin matched this message (e.g. configure GenericHL7 with matching identifier pattern)"
        }
        MessageLayout::Delimited => "No matching analyzer plugin found for file format",
    }
}

/// 有序插件注册表。
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn AnalyzerPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按仪器类型配置顺序构建通用插件。
    ///
    /// 非通用插件名只记录日志并跳过；识别正则非法时该类型不参与探测。
    pub fn from_analyzer_types(
        types: &[AnalyzerTypeRecord],
        results: Arc<dyn ResultStore>,
    ) -> Self {
        let mut ordered: Vec<&AnalyzerTypeRecord> = types.iter().filter(|t| t.active).collect();
        ordered.sort_by_key(|t| t.sort_order);

        let mut registry = Self::new();
        for analyzer_type in ordered {
            let type_id = Some(analyzer_type.type_id.clone());
            let pattern = analyzer_type.identifier_pattern.as_deref();
            let plugin = match analyzer_type.plugin_name.trim() {
                name if name.eq_ignore_ascii_case(GENERIC_ASTM) => {
                    GenericPlugin::astm(type_id, pattern, Arc::clone(&results))
                }
                name if name.eq_ignore_ascii_case(GENERIC_HL7) => {
                    GenericPlugin::hl7(type_id, pattern, Arc::clone(&results))
                }
                name if name.eq_ignore_ascii_case(GENERIC_FILE) => {
                    Ok(GenericPlugin::file(type_id, Arc::clone(&results)))
                }
                other => {
                    warn!(
                        target: "lis.plugin",
                        type_id = %analyzer_type.type_id,
                        plugin = %other,
                        "plugin_not_available"
                    );
                    continue;
                }
            };
            match plugin {
                Ok(plugin) => registry.register(Arc::new(plugin)),
                Err(err) => warn!(
                    target: "lis.plugin",
                    type_id = %analyzer_type.type_id,
                    error = %err,
                    "plugin_skipped"
                ),
            }
        }
        info!(target: "lis.plugin", count = registry.len(), "plugin_registry_built");
        registry
    }

    pub fn register(&mut self, plugin: Arc<dyn AnalyzerPlugin>) {
        self.plugins.push(plugin);
    }

    pub fn plugins(&self) -> &[Arc<dyn AnalyzerPlugin>] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// 在同一布局的插件中按注册顺序探测。
    pub fn resolve(&self, layout: MessageLayout, lines: &[String]) -> Resolution {
        for plugin in self.plugins.iter().filter(|plugin| plugin.layout() == layout) {
            let probe = catch_unwind(AssertUnwindSafe(|| plugin.is_target_analyzer(lines)));
            match probe {
                Ok(Ok(true)) => {
                    debug!(target: "lis.plugin", plugin = %plugin.name(), "plugin_matched");
                    return Resolution::Matched(ResolvedPlugin::from_plugin(Arc::clone(plugin)));
                }
                Ok(Ok(false)) => {}
                Ok(Err(err)) => {
                    warn!(target: "lis.plugin", plugin = %plugin.name(), error = %err, "plugin_probe_failed");
                }
                Err(_) => {
                    warn!(target: "lis.plugin", plugin = %plugin.name(), "plugin_probe_panicked");
                }
            }
        }
        Resolution::NoMatch
    }

    /// 按仪器类型直接取插件（文件导入）。
    pub fn resolve_for_type(&self, layout: MessageLayout, type_id: &str) -> Resolution {
        self.plugins
            .iter()
            .find(|plugin| plugin.layout() == layout && plugin.type_id() == Some(type_id))
            .map(|plugin| Resolution::Matched(ResolvedPlugin::from_plugin(Arc::clone(plugin))))
            .unwrap_or(Resolution::NoMatch)
    }
}
