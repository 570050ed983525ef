//! # 数据接入能力模块
//!
//! 负责从仪器取得原始报文并交给处理器：
//! - **Transport Reader**（`reader`）：字节 → 报文行，字符集识别、CSV 重排
//! - **帧读取**（`frame`）：ASTM 终止记录/ETX/EOT、MLLP `VT..FS CR`、读超时
//! - **TCP 监听**（`listener`）：ASTM TCP 与 HL7 MLLP，每连接一个任务
//! - **串口**（`serial`）：按仪器单飞打开、关闭、状态查询
//! - **文件导入**（`file_watcher`）：目录轮询、归档/错误目录
//!
//! 长驻采集源实现 `Source`，报文交给 `MessageHandler`（由 lis-pipeline 实现）。

use async_trait::async_trait;
use domain::{InboundMessage, Transport};
use std::sync::Arc;

pub mod error;
pub mod file_watcher;
pub mod frame;
pub mod listener;
pub mod reader;
pub mod serial;

pub use error::{IngestError, ReadError};
pub use file_watcher::{FileImportWatcher, ImportSummary};
pub use frame::{FrameError, FrameOptions};
pub use listener::{ListenerConfig, StreamListener, StreamProtocol};
pub use reader::{DelimitedOptions, read_astm, read_delimited, read_hl7, read_serial};
pub use serial::{
    SerialConnection, SerialIo, SerialListener, SerialPortManager, SerialPortOpener,
    SerialPortStatus, TokioSerialOpener, serial_settings,
};

/// 传输层读取失败（超时、连接中断），保留已收到的字节。
#[derive(Debug, Clone)]
pub struct ReadFailure {
    pub transport: Transport,
    pub source_address: Option<String>,
    pub analyzer_hint: Option<String>,
    pub error: ReadError,
    pub partial: Vec<u8>,
}

/// 入站报文处理器。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// 处理一条报文；`Some` 为需要回写给仪器的应答行。
    async fn handle(&self, message: InboundMessage) -> Result<Option<Vec<String>>, IngestError>;

    /// 记录传输层读取失败。
    async fn read_failed(&self, failure: ReadFailure);
}

/// 采集源抽象。
#[async_trait]
pub trait Source: Send + Sync {
    async fn run(&self, handler: Arc<dyn MessageHandler>) -> Result<(), IngestError>;
}

pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
