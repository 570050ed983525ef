use domain::{
    AnalyzerStatus, ErrorType, InboundMessage, LifecycleEvent, MappingTarget, TargetKind,
    Transport,
};

#[test]
fn mapping_target_roundtrips_kind() {
    let target = MappingTarget::new(TargetKind::Test, "TEST-001");
    assert_eq!(target, MappingTarget::Test("TEST-001".to_string()));
    assert_eq!(target.kind(), TargetKind::Test);
    assert_eq!(target.id(), "TEST-001");
    assert_eq!(target.result_code(), Some("TEST-001"));
    assert_eq!(MappingTarget::Sample("S".to_string()).result_code(), None);
}

#[test]
fn status_strings_parse() {
    assert_eq!(
        "error_pending".parse::<AnalyzerStatus>().expect("status"),
        AnalyzerStatus::ErrorPending
    );
    assert_eq!(AnalyzerStatus::default(), AnalyzerStatus::Setup);
    assert!(!AnalyzerStatus::Deleted.accepts_messages());
    assert!(AnalyzerStatus::Offline.accepts_messages());
    assert_eq!(ErrorType::QcMappingIncomplete.as_str(), "QC_MAPPING_INCOMPLETE");
    assert!("BOGUS".parse::<ErrorType>().is_err());
}

#[test]
fn inbound_message_source_ip_strips_port() {
    let message = InboundMessage::new(Transport::Astm, Vec::new(), 1).with_source_address("10.0.0.5:4100");
    assert_eq!(message.source_ip(), Some("10.0.0.5"));
    let message = InboundMessage::new(Transport::Astm, Vec::new(), 1).with_source_address("10.0.0.6");
    assert_eq!(message.source_ip(), Some("10.0.0.6"));
    let message = InboundMessage::new(Transport::Astm, Vec::new(), 1).with_source_address("[::1]:9000");
    assert_eq!(message.source_ip(), Some("::1"));
}

#[test]
fn lifecycle_transition_table() {
    use AnalyzerStatus::*;
    assert!(Setup.can_transition_to(Validation));
    assert!(Validation.can_transition_to(Active));
    assert!(ErrorPending.can_transition_to(Offline));
    assert!(Offline.can_transition_to(Active));
    assert!(!Setup.can_transition_to(Active));
    assert!(!Active.can_transition_to(Deleted));
    assert_eq!(
        "connection_test_failed".parse::<LifecycleEvent>().expect("event"),
        LifecycleEvent::ConnectionTestFailed
    );
    assert_eq!(LifecycleEvent::ErrorCreated.transition().1, ErrorPending);
}
