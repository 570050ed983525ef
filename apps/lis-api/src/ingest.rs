//! 采集链路装配
//!
//! 按配置启动长驻采集源，全部把报文交给同一个 `MessageProcessor`：
//! - ASTM TCP 监听（`LIS_ASTM_LISTEN_ADDR`）
//! - HL7 MLLP 监听（`LIS_HL7_LISTEN_ADDR`）
//! - 串口：每个启用的串口配置一个任务，共享 `SerialPortManager`
//! - 文件导入目录轮询
//!
//! 另有一个后台任务按周期把长期无消息的 ACTIVE 仪器标记为 OFFLINE。

use lis_config::AppConfig;
use lis_ingest::{
    FileImportWatcher, IngestError, ListenerConfig, MessageHandler, SerialListener,
    SerialPortManager, Source, StreamListener, TokioSerialOpener, now_epoch_ms,
};
use lis_pipeline::{AnalyzerLifecycle, DAY_MS, MessageProcessor};
use lis_storage::TransportConfigStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 启动已配置的采集源
pub async fn spawn_sources(
    config: &AppConfig,
    processor: Arc<MessageProcessor>,
    transport_configs: Arc<dyn TransportConfigStore>,
) -> Result<(), IngestError> {
    let handler: Arc<dyn MessageHandler> = processor;
    let read_timeout = Duration::from_millis(config.read_timeout_ms);
    let mut sources: Vec<(&'static str, Arc<dyn Source>)> = Vec::new();

    if let Some(addr) = config.astm_listen_addr.as_ref() {
        info!(target: "lis.api", addr = %addr, "astm_listener_enabled");
        sources.push((
            "astm",
            Arc::new(StreamListener::astm(ListenerConfig {
                listen_addr: addr.clone(),
                max_connections: config.max_connections,
                read_timeout,
            })),
        ));
    }
    if let Some(addr) = config.hl7_listen_addr.as_ref() {
        info!(target: "lis.api", addr = %addr, "mllp_listener_enabled");
        sources.push((
            "mllp",
            Arc::new(StreamListener::mllp(ListenerConfig {
                listen_addr: addr.clone(),
                max_connections: config.max_connections,
                read_timeout,
            })),
        ));
    }
    if config.serial_enabled {
        let manager = Arc::new(SerialPortManager::new(Arc::new(TokioSerialOpener)));
        let serial_configs = transport_configs
            .list_serial_configs()
            .await
            .map_err(|err| IngestError::Source(err.to_string()))?;
        for serial in serial_configs.into_iter().filter(|item| item.active) {
            info!(
                target: "lis.api",
                analyzer_id = %serial.analyzer_id,
                port = %serial.port_name,
                "serial_source_enabled"
            );
            sources.push((
                "serial",
                Arc::new(SerialListener::new(manager.clone(), serial, read_timeout)),
            ));
        }
    }
    if config.file_import_enabled {
        info!(
            target: "lis.api",
            poll_interval_secs = config.file_poll_interval_secs,
            "file_import_enabled"
        );
        sources.push((
            "file",
            Arc::new(FileImportWatcher::new(
                transport_configs,
                Duration::from_secs(config.file_poll_interval_secs.max(1)),
            )),
        ));
    }

    if sources.is_empty() {
        info!(target: "lis.api", "no ingest sources configured, http only");
    }
    for (kind, source) in sources {
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(err) = source.run(handler).await {
                warn!(target: "lis.api", source = kind, error = %err, "ingest_source_stopped");
            }
        });
    }
    Ok(())
}

/// 周期性离线巡检
pub fn spawn_lifecycle_sweep(
    config: &AppConfig,
    lifecycle: AnalyzerLifecycle,
) -> tokio::task::JoinHandle<()> {
    let period = Duration::from_secs(config.lifecycle_sweep_secs.max(60));
    let offline_after_ms = (config.offline_after_days as i64).saturating_mul(DAY_MS);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // 第一次 tick 立即返回，跳过
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = lifecycle.sweep(now_epoch_ms(), offline_after_ms).await {
                warn!(target: "lis.api", error = %err, "lifecycle_sweep_failed");
            }
        }
    })
}
