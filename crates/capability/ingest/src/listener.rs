//! ASTM TCP / HL7 MLLP 监听
//!
//! 每个连接一个任务，连接数受信号量限制；应答写回同一连接。

use crate::error::IngestError;
use crate::frame::{
    FrameError, FrameOptions, read_astm_frame, read_mllp_frame, write_astm_lines,
    write_mllp_lines,
};
use crate::{MessageHandler, ReadFailure, Source, now_epoch_ms};
use async_trait::async_trait;
use domain::{InboundMessage, Transport};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// 流协议。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProtocol {
    Astm,
    Mllp,
}

impl StreamProtocol {
    fn transport(&self) -> Transport {
        match self {
            StreamProtocol::Astm => Transport::Astm,
            StreamProtocol::Mllp => Transport::Hl7,
        }
    }

    async fn read_frame<R>(
        &self,
        reader: &mut R,
        options: &FrameOptions,
    ) -> Result<Option<Vec<u8>>, FrameError>
    where
        R: AsyncBufRead + Unpin,
    {
        match self {
            StreamProtocol::Astm => read_astm_frame(reader, options).await,
            StreamProtocol::Mllp => read_mllp_frame(reader, options).await,
        }
    }

    async fn write_lines<W>(&self, writer: &mut W, lines: &[String]) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match self {
            StreamProtocol::Astm => write_astm_lines(writer, lines).await,
            StreamProtocol::Mllp => write_mllp_lines(writer, lines).await,
        }
    }
}

/// 监听配置。
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub listen_addr: String,
    pub max_connections: usize,
    pub read_timeout: Duration,
}

/// TCP 监听采集源。
pub struct StreamListener {
    config: ListenerConfig,
    protocol: StreamProtocol,
}

impl StreamListener {
    pub fn astm(config: ListenerConfig) -> Self {
        Self {
            config,
            protocol: StreamProtocol::Astm,
        }
    }

    pub fn mllp(config: ListenerConfig) -> Self {
        Self {
            config,
            protocol: StreamProtocol::Mllp,
        }
    }

    pub fn protocol(&self) -> StreamProtocol {
        self.protocol
    }

    pub async fn bind(&self) -> Result<TcpListener, IngestError> {
        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        Ok(listener)
    }

    /// 在已绑定的监听上接受连接。
    pub async fn serve(
        &self,
        listener: TcpListener,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), IngestError> {
        let local_addr = listener.local_addr()?;
        info!(
            target: "lis.ingest",
            protocol = ?self.protocol,
            addr = %local_addr,
            "listener_started"
        );
        let permits = Arc::new(Semaphore::new(self.config.max_connections.max(1)));
        let options = FrameOptions::new(self.config.read_timeout);

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    error!(target: "lis.ingest", error = %err, "accept_failed");
                    continue;
                }
            };
            let Ok(permit) = Arc::clone(&permits).try_acquire_owned() else {
                warn!(
                    target: "lis.ingest",
                    peer = %peer_addr,
                    max = self.config.max_connections,
                    "connection_rejected"
                );
                continue;
            };
            debug!(target: "lis.ingest", peer = %peer_addr, "connection_accepted");

            let handler = Arc::clone(&handler);
            let protocol = self.protocol;
            tokio::spawn(async move {
                if let Err(err) =
                    handle_connection(stream, peer_addr, protocol, handler, options).await
                {
                    warn!(target: "lis.ingest", peer = %peer_addr, error = %err, "connection_error");
                }
                drop(permit);
            });
        }
    }
}

#[async_trait]
impl Source for StreamListener {
    async fn run(&self, handler: Arc<dyn MessageHandler>) -> Result<(), IngestError> {
        let listener = self.bind().await?;
        self.serve(listener, handler).await
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    protocol: StreamProtocol,
    handler: Arc<dyn MessageHandler>,
    options: FrameOptions,
) -> Result<(), IngestError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut served = 0u64;

    loop {
        // 首条报文从连接建立起计时，之后的空闲等待不计时
        let frame_options = if served == 0 {
            options
        } else {
            options.waiting_for_first_byte()
        };
        let payload = match protocol.read_frame(&mut reader, &frame_options).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(target: "lis.ingest", peer = %peer_addr, served, "connection_closed");
                break;
            }
            Err(FrameError { error, partial }) => {
                warn!(target: "lis.ingest", peer = %peer_addr, error = %error, "frame_read_failed");
                handler
                    .read_failed(ReadFailure {
                        transport: protocol.transport(),
                        source_address: Some(peer_addr.to_string()),
                        analyzer_hint: None,
                        error,
                        partial,
                    })
                    .await;
                break;
            }
        };
        served += 1;

        let message = InboundMessage::new(protocol.transport(), payload, now_epoch_ms())
            .with_source_address(peer_addr.to_string());
        match handler.handle(message).await {
            Ok(Some(lines)) => protocol.write_lines(&mut write_half, &lines).await?,
            Ok(None) => {}
            Err(err) => {
                warn!(target: "lis.ingest", peer = %peer_addr, error = %err, "message_rejected");
            }
        }
    }
    Ok(())
}
