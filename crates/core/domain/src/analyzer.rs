//! 仪器生命周期状态与协议版本。

string_enum! {
    /// 仪器统一生命周期状态。
    pub enum AnalyzerStatus {
        Inactive => "INACTIVE",
        Setup => "SETUP",
        Validation => "VALIDATION",
        Active => "ACTIVE",
        ErrorPending => "ERROR_PENDING",
        Offline => "OFFLINE",
        Deleted => "DELETED",
    }
}

impl AnalyzerStatus {
    /// 该状态下是否继续处理来自此仪器的报文。
    pub fn accepts_messages(&self) -> bool {
        !matches!(self, AnalyzerStatus::Inactive | AnalyzerStatus::Deleted)
    }
}

string_enum! {
    /// 驱动状态迁移的业务事件。
    pub enum LifecycleEvent {
        MappingCreated => "MAPPING_CREATED",
        MappingsActivated => "MAPPINGS_ACTIVATED",
        ErrorCreated => "ERROR_CREATED",
        ErrorsAcknowledged => "ERRORS_ACKNOWLEDGED",
        ConnectionTestFailed => "CONNECTION_TEST_FAILED",
        ConnectionTestSucceeded => "CONNECTION_TEST_SUCCEEDED",
    }
}

impl LifecycleEvent {
    /// 事件生效的源状态与目标状态。
    pub fn transition(&self) -> (&'static [AnalyzerStatus], AnalyzerStatus) {
        use AnalyzerStatus::*;
        match self {
            LifecycleEvent::MappingCreated => (&[Setup], Validation),
            LifecycleEvent::MappingsActivated => (&[Validation], Active),
            LifecycleEvent::ErrorCreated => (&[Active], ErrorPending),
            LifecycleEvent::ErrorsAcknowledged => (&[ErrorPending], Active),
            LifecycleEvent::ConnectionTestFailed => (&[Active, ErrorPending], Offline),
            LifecycleEvent::ConnectionTestSucceeded => (&[Offline], Active),
        }
    }
}

impl AnalyzerStatus {
    /// 显式迁移是否合法。
    pub fn can_transition_to(&self, target: AnalyzerStatus) -> bool {
        LifecycleEvent::ALL.iter().any(|event| {
            let (sources, to) = event.transition();
            to == target && sources.contains(self)
        })
    }
}

impl Default for AnalyzerStatus {
    fn default() -> Self {
        Self::Setup
    }
}

string_enum! {
    /// 仪器协议族。
    pub enum ProtocolVersion {
        AstmLis2A2 => "ASTM_LIS2_A2",
        Hl7V251 => "HL7_V2_5_1",
        Hl7V231 => "HL7_V2_3_1",
        File => "FILE",
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::AstmLis2A2
    }
}

string_enum! {
    /// 质控水平（Q 段第三分量）。
    pub enum ControlLevel {
        Low => "L",
        Normal => "N",
        High => "H",
    }
}
