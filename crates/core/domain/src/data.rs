/// 报文来源传输方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// ASTM over TCP 或 HTTP 推送。
    Astm,
    /// HL7 v2.x（MLLP 或 HTTP）。
    Hl7,
    /// RS232 串口（ASTM 帧）。
    Serial,
    /// CSV/文件导入。
    File,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Astm => "astm",
            Transport::Hl7 => "hl7",
            Transport::Serial => "serial",
            Transport::File => "file",
        }
    }
}

/// 入站原始报文。
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub transport: Transport,
    /// 直连推送时的对端地址（IP 或 IP:port）。
    pub source_address: Option<String>,
    /// 已知来源仪器（串口、文件导入由配置确定）。
    pub analyzer_hint: Option<String>,
    pub payload: Vec<u8>,
    pub received_at_ms: i64,
}

impl InboundMessage {
    pub fn new(transport: Transport, payload: Vec<u8>, received_at_ms: i64) -> Self {
        Self {
            transport,
            source_address: None,
            analyzer_hint: None,
            payload,
            received_at_ms,
        }
    }

    pub fn with_source_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }

    pub fn with_analyzer_hint(mut self, analyzer_id: impl Into<String>) -> Self {
        self.analyzer_hint = Some(analyzer_id.into());
        self
    }

    /// 去掉端口后的来源 IP。
    pub fn source_ip(&self) -> Option<&str> {
        let address = self.source_address.as_deref()?.trim();
        if address.is_empty() {
            return None;
        }
        if let Some(rest) = address.strip_prefix('[') {
            return rest.split(']').next();
        }
        match address.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => Some(host),
            _ => Some(address),
        }
    }
}
