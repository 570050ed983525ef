//! 仪器错误记录的分类、严重级别与处理状态。

string_enum! {
    /// 错误类型。
    pub enum ErrorType {
        Mapping => "MAPPING",
        Validation => "VALIDATION",
        Timeout => "TIMEOUT",
        Protocol => "PROTOCOL",
        Connection => "CONNECTION",
        QcMappingIncomplete => "QC_MAPPING_INCOMPLETE",
        QcServiceUnavailable => "QC_SERVICE_UNAVAILABLE",
    }
}

string_enum! {
    /// 严重级别：CRITICAL 阻断整条报文，ERROR 阻断字段/记录，WARNING 仅提示。
    pub enum Severity {
        Critical => "CRITICAL",
        Error => "ERROR",
        Warning => "WARNING",
    }
}

string_enum! {
    /// 错误处理状态：UNACKNOWLEDGED -> ACKNOWLEDGED -> RESOLVED。
    pub enum ErrorStatus {
        Unacknowledged => "UNACKNOWLEDGED",
        Acknowledged => "ACKNOWLEDGED",
        Resolved => "RESOLVED",
    }
}
