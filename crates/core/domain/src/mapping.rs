//! 字段映射相关的领域类型。

string_enum! {
    /// 仪器字段类型。
    pub enum FieldType {
        Numeric => "NUMERIC",
        Qualitative => "QUALITATIVE",
        ControlTest => "CONTROL_TEST",
        MeltingPoint => "MELTING_POINT",
        DateTime => "DATE_TIME",
        Text => "TEXT",
        Custom => "CUSTOM",
    }
}

string_enum! {
    /// 映射粒度。
    pub enum MappingType {
        TestLevel => "TEST_LEVEL",
        ResultLevel => "RESULT_LEVEL",
        Metadata => "METADATA",
    }
}

string_enum! {
    /// 校验规则类型。
    pub enum RuleType {
        Regex => "REGEX",
        Range => "RANGE",
        Enum => "ENUM",
        Length => "LENGTH",
    }
}

string_enum! {
    /// 映射目标实体类型（存储列 openelis_field_type）。
    pub enum TargetKind {
        Test => "TEST",
        Panel => "PANEL",
        Result => "RESULT",
        Order => "ORDER",
        Sample => "SAMPLE",
        Qc => "QC",
        Metadata => "METADATA",
        Unit => "UNIT",
    }
}

/// 映射目标：目标实体类型与其 ID 一体化。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MappingTarget {
    Test(String),
    Panel(String),
    Result(String),
    Order(String),
    Sample(String),
    Qc(String),
    Metadata(String),
    Unit(String),
}

impl MappingTarget {
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Self {
        let id = id.into();
        match kind {
            TargetKind::Test => Self::Test(id),
            TargetKind::Panel => Self::Panel(id),
            TargetKind::Result => Self::Result(id),
            TargetKind::Order => Self::Order(id),
            TargetKind::Sample => Self::Sample(id),
            TargetKind::Qc => Self::Qc(id),
            TargetKind::Metadata => Self::Metadata(id),
            TargetKind::Unit => Self::Unit(id),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Test(_) => TargetKind::Test,
            Self::Panel(_) => TargetKind::Panel,
            Self::Result(_) => TargetKind::Result,
            Self::Order(_) => TargetKind::Order,
            Self::Sample(_) => TargetKind::Sample,
            Self::Qc(_) => TargetKind::Qc,
            Self::Metadata(_) => TargetKind::Metadata,
            Self::Unit(_) => TargetKind::Unit,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Test(id)
            | Self::Panel(id)
            | Self::Result(id)
            | Self::Order(id)
            | Self::Sample(id)
            | Self::Qc(id)
            | Self::Metadata(id)
            | Self::Unit(id) => id,
        }
    }

    /// 结果记录中的检测代码是否改写为目标 ID。
    ///
    /// 订单、样本、元数据与单位目标只做标注，不改写结果代码。
    pub fn result_code(&self) -> Option<&str> {
        match self {
            Self::Test(id) | Self::Panel(id) | Self::Result(id) | Self::Qc(id) => Some(id),
            Self::Order(_) | Self::Sample(_) | Self::Metadata(_) | Self::Unit(_) => None,
        }
    }
}
