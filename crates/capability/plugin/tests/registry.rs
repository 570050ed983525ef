use async_trait::async_trait;
use lis_plugin::{
    AnalyzerPlugin, InsertContext, InsertError, InsertOutcome, LineInserter, PluginError,
    PluginRegistry, Resolution, no_match_message,
};
use lis_protocol::MessageLayout;
use lis_storage::{AnalyzerTypeRecord, InMemoryResultStore};
use std::sync::Arc;

struct NullInserter;

#[async_trait]
impl LineInserter for NullInserter {
    async fn insert(
        &self,
        _context: &InsertContext,
        _lines: &[String],
    ) -> Result<InsertOutcome, InsertError> {
        Ok(InsertOutcome::default())
    }
}

enum Probe {
    Match,
    Miss,
    Fail,
    Panic,
}

struct FakePlugin {
    name: &'static str,
    probe: Probe,
}

impl AnalyzerPlugin for FakePlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn layout(&self) -> MessageLayout {
        MessageLayout::Astm
    }

    fn is_target_analyzer(&self, _lines: &[String]) -> Result<bool, PluginError> {
        match self.probe {
            Probe::Match => Ok(true),
            Probe::Miss => Ok(false),
            Probe::Fail => Err(PluginError::Probe("broken header".to_string())),
            Probe::Panic => panic!("plugin bug"),
        }
    }

    fn line_inserter(&self) -> Arc<dyn LineInserter> {
        Arc::new(NullInserter)
    }
}

fn plugin(name: &'static str, probe: Probe) -> Arc<dyn AnalyzerPlugin> {
    Arc::new(FakePlugin { name, probe })
}

fn message() -> Vec<String> {
    vec!["H|\\^&|||ACME^X100^1.0".to_string(), "L|1|N".to_string()]
}

#[test]
fn first_match_wins_and_is_stable() {
    let mut registry = PluginRegistry::new();
    registry.register(plugin("miss", Probe::Miss));
    registry.register(plugin("first", Probe::Match));
    registry.register(plugin("second", Probe::Match));

    for _ in 0..5 {
        let resolution = registry.resolve(MessageLayout::Astm, &message());
        assert_eq!(resolution.plugin_name(), Some("first"));
    }
}

#[test]
fn failing_and_panicking_probes_do_not_block_resolution() {
    let mut registry = PluginRegistry::new();
    registry.register(plugin("fails", Probe::Fail));
    registry.register(plugin("panics", Probe::Panic));
    registry.register(plugin("healthy", Probe::Match));

    let resolution = registry.resolve(MessageLayout::Astm, &message());
    assert_eq!(resolution.plugin_name(), Some("healthy"));
}

#[test]
fn other_layouts_are_not_probed() {
    let mut registry = PluginRegistry::new();
    registry.register(plugin("astm", Probe::Match));
    assert!(matches!(
        registry.resolve(MessageLayout::Hl7, &message()),
        Resolution::NoMatch
    ));
}

fn analyzer_type(type_id: &str, plugin_name: &str, pattern: Option<&str>, sort_order: i32) -> AnalyzerTypeRecord {
    AnalyzerTypeRecord {
        type_id: type_id.to_string(),
        name: type_id.to_string(),
        protocol: "ASTM".to_string(),
        plugin_name: plugin_name.to_string(),
        identifier_pattern: pattern.map(str::to_string),
        generic_plugin: true,
        active: true,
        sort_order,
    }
}

#[test]
fn registry_follows_configured_order() {
    let types = vec![
        analyzer_type("type-late", "GenericASTM", Some("ACME"), 20),
        analyzer_type("type-vendor", "MindrayBs200Plugin", None, 5),
        analyzer_type("type-early", "GenericASTM", Some("X100"), 10),
        analyzer_type("type-file", "GenericFile", None, 30),
        analyzer_type("type-broken", "GenericASTM", Some("(oops"), 1),
    ];
    let registry = PluginRegistry::from_analyzer_types(&types, Arc::new(InMemoryResultStore::new()));
    assert_eq!(registry.len(), 3);

    let Resolution::Matched(resolved) = registry.resolve(MessageLayout::Astm, &message()) else {
        panic!("expected a match");
    };
    assert_eq!(resolved.plugin.type_id(), Some("type-early"));
    assert!(resolved.responder.is_some());

    let Resolution::Matched(file) = registry.resolve_for_type(MessageLayout::Delimited, "type-file") else {
        panic!("expected file plugin");
    };
    assert_eq!(file.plugin.name(), "GenericFile");
    assert!(file.responder.is_none());
}

#[test]
fn no_match_messages_name_the_protocol() {
    assert!(no_match_message(MessageLayout::Astm).starts_with("No ASTM plugin matched"));
    assert!(no_match_message(MessageLayout::Hl7).starts_with("No HL7 plugin matched"));
    assert_eq!(
        no_match_message(MessageLayout::Delimited),
        "No matching analyzer plugin found for file format"
    );
}
