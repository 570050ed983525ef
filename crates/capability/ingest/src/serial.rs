//! RS232 串口接入
//!
//! 每台仪器至多一个打开的串口连接；并发打开同一仪器只会真正打开一次。

use crate::error::IngestError;
use crate::frame::{FrameError, FrameOptions, read_astm_frame, write_astm_lines};
use crate::{MessageHandler, ReadFailure, Source, now_epoch_ms};
use async_trait::async_trait;
use domain::{FlowControl, InboundMessage, Parity, StopBits, Transport};
use lis_protocol::SerialSettings;
use lis_storage::SerialPortConfigRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{OnceCell, watch};
use tokio_serial::SerialPortBuilderExt;
use tracing::{info, warn};

/// 串口读写流。
pub trait SerialIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> SerialIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// 串口打开器。
#[async_trait]
pub trait SerialPortOpener: Send + Sync {
    async fn open(&self, settings: &SerialSettings) -> Result<Box<dyn SerialIo>, IngestError>;
}

/// 基于 tokio-serial 的打开器。
#[derive(Debug, Default)]
pub struct TokioSerialOpener;

#[async_trait]
impl SerialPortOpener for TokioSerialOpener {
    async fn open(&self, settings: &SerialSettings) -> Result<Box<dyn SerialIo>, IngestError> {
        let data_bits = match settings.data_bits {
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };
        let stop_bits = match settings.stop_bits {
            StopBits::Two => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };
        let parity = match settings.parity {
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
            _ => tokio_serial::Parity::None,
        };
        let flow_control = match settings.flow_control {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::RtsCts => tokio_serial::FlowControl::Hardware,
            FlowControl::XonXoff => tokio_serial::FlowControl::Software,
        };
        let stream = tokio_serial::new(settings.port_name.clone(), settings.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
            .open_native_async()
            .map_err(|err| IngestError::Serial(err.to_string()))?;
        Ok(Box::new(stream))
    }
}

/// 已打开的串口连接。
pub struct SerialConnection {
    analyzer_id: String,
    settings: SerialSettings,
    opened_at_ms: i64,
    io: tokio::sync::Mutex<BufReader<Box<dyn SerialIo>>>,
    closed: watch::Sender<bool>,
}

impl SerialConnection {
    pub fn analyzer_id(&self) -> &str {
        &self.analyzer_id
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn opened_at_ms(&self) -> i64 {
        self.opened_at_ms
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// 串口状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortStatus {
    pub analyzer_id: String,
    pub open: bool,
    pub port_name: Option<String>,
    pub opened_at_ms: Option<i64>,
}

#[derive(Default)]
struct PortSlot {
    connection: OnceCell<Arc<SerialConnection>>,
}

/// 串口连接管理（按仪器单飞）。
pub struct SerialPortManager {
    opener: Arc<dyn SerialPortOpener>,
    ports: Mutex<HashMap<String, Arc<PortSlot>>>,
}

impl SerialPortManager {
    pub fn new(opener: Arc<dyn SerialPortOpener>) -> Self {
        Self {
            opener,
            ports: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, analyzer_id: &str) -> Result<Arc<PortSlot>, IngestError> {
        let mut ports = self
            .ports
            .lock()
            .map_err(|_| IngestError::Serial("lock failed".to_string()))?;
        Ok(Arc::clone(
            ports
                .entry(analyzer_id.to_string())
                .or_insert_with(|| Arc::new(PortSlot::default())),
        ))
    }

    /// 打开串口；已打开时直接返回现有连接。
    pub async fn open(
        &self,
        analyzer_id: &str,
        settings: SerialSettings,
    ) -> Result<Arc<SerialConnection>, IngestError> {
        let slot = self.slot(analyzer_id)?;
        let connection = slot
            .connection
            .get_or_try_init(|| async {
                settings
                    .validate()
                    .map_err(|err| IngestError::Serial(err.to_string()))?;
                let io = self.opener.open(&settings).await?;
                let (closed, _) = watch::channel(false);
                info!(
                    target: "lis.serial",
                    analyzer_id = %analyzer_id,
                    port = %settings.port_name,
                    baud = settings.baud_rate,
                    "serial_port_opened"
                );
                Ok::<_, IngestError>(Arc::new(SerialConnection {
                    analyzer_id: analyzer_id.to_string(),
                    settings: settings.clone(),
                    opened_at_ms: now_epoch_ms(),
                    io: tokio::sync::Mutex::new(BufReader::new(io)),
                    closed,
                }))
            })
            .await?;
        Ok(Arc::clone(connection))
    }

    /// 关闭串口；未打开时返回 false。
    pub fn close(&self, analyzer_id: &str) -> Result<bool, IngestError> {
        let slot = {
            let mut ports = self
                .ports
                .lock()
                .map_err(|_| IngestError::Serial("lock failed".to_string()))?;
            ports.remove(analyzer_id)
        };
        let Some(connection) = slot.as_ref().and_then(|slot| slot.connection.get()) else {
            return Ok(false);
        };
        connection.closed.send_replace(true);
        info!(target: "lis.serial", analyzer_id = %analyzer_id, "serial_port_closed");
        Ok(true)
    }

    pub fn status(&self, analyzer_id: &str) -> Result<SerialPortStatus, IngestError> {
        let ports = self
            .ports
            .lock()
            .map_err(|_| IngestError::Serial("lock failed".to_string()))?;
        let connection = ports
            .get(analyzer_id)
            .and_then(|slot| slot.connection.get())
            .filter(|connection| !connection.is_closed());
        Ok(SerialPortStatus {
            analyzer_id: analyzer_id.to_string(),
            open: connection.is_some(),
            port_name: connection.map(|connection| connection.settings.port_name.clone()),
            opened_at_ms: connection.map(|connection| connection.opened_at_ms),
        })
    }
}

/// 串口配置记录 → 打开参数。
pub fn serial_settings(config: &SerialPortConfigRecord) -> SerialSettings {
    SerialSettings {
        port_name: config.port_name.clone(),
        baud_rate: config.baud_rate,
        data_bits: config.data_bits,
        stop_bits: config.stop_bits,
        parity: config.parity,
        flow_control: config.flow_control,
    }
}

/// 单台仪器的串口采集源。
pub struct SerialListener {
    manager: Arc<SerialPortManager>,
    config: SerialPortConfigRecord,
    read_timeout: Duration,
}

impl SerialListener {
    pub fn new(
        manager: Arc<SerialPortManager>,
        config: SerialPortConfigRecord,
        read_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            config,
            read_timeout,
        }
    }
}

#[async_trait]
impl Source for SerialListener {
    async fn run(&self, handler: Arc<dyn MessageHandler>) -> Result<(), IngestError> {
        let analyzer_id = self.config.analyzer_id.clone();
        let connection = self
            .manager
            .open(&analyzer_id, serial_settings(&self.config))
            .await?;
        let mut closed = connection.closed.subscribe();
        let options = FrameOptions::new(self.read_timeout).waiting_for_first_byte();

        while !*closed.borrow() {
            let mut io = connection.io.lock().await;
            let read = tokio::select! {
                _ = closed.changed() => break,
                read = read_astm_frame(&mut *io, &options) => read,
            };
            let payload = match read {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    warn!(target: "lis.serial", analyzer_id = %analyzer_id, "serial_stream_ended");
                    break;
                }
                Err(FrameError { error, partial }) => {
                    warn!(target: "lis.serial", analyzer_id = %analyzer_id, error = %error, "serial_read_failed");
                    handler
                        .read_failed(ReadFailure {
                            transport: Transport::Serial,
                            source_address: None,
                            analyzer_hint: Some(analyzer_id.clone()),
                            error,
                            partial,
                        })
                        .await;
                    continue;
                }
            };

            let message = InboundMessage::new(Transport::Serial, payload, now_epoch_ms())
                .with_analyzer_hint(analyzer_id.clone());
            match handler.handle(message).await {
                Ok(Some(lines)) => write_astm_lines(&mut *io, &lines).await?,
                Ok(None) => {}
                Err(err) => {
                    warn!(target: "lis.serial", analyzer_id = %analyzer_id, error = %err, "message_rejected");
                }
            }
        }
        self.manager.close(&analyzer_id)?;
        Ok(())
    }
}
