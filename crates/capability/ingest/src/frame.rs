//! 流式帧读取（TCP、串口、MLLP）

use crate::error::ReadError;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

const STX: u8 = 0x02;
const ETX: u8 = 0x03;
const EOT: u8 = 0x04;
const VT: u8 = 0x0b;
const FS: u8 = 0x1c;
const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// 帧读取参数。
#[derive(Debug, Clone, Copy)]
pub struct FrameOptions {
    pub read_timeout: Duration,
    /// 首字节到达前不计超时（串口、长连接空闲期）。
    pub wait_for_first_byte: bool,
}

impl FrameOptions {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            read_timeout,
            wait_for_first_byte: false,
        }
    }

    pub fn waiting_for_first_byte(mut self) -> Self {
        self.wait_for_first_byte = true;
        self
    }
}

/// 帧读取失败，保留已收到的部分字节。
#[derive(Debug)]
pub struct FrameError {
    pub error: ReadError,
    pub partial: Vec<u8>,
}

async fn fill<R>(
    reader: &mut R,
    options: &FrameOptions,
    frame: &[u8],
) -> Result<usize, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let result = if frame.is_empty() && options.wait_for_first_byte {
        reader.fill_buf().await.map(|buf| buf.len())
    } else {
        match timeout(options.read_timeout, reader.fill_buf()).await {
            Ok(result) => result.map(|buf| buf.len()),
            Err(_) => {
                return Err(FrameError {
                    error: ReadError::Timeout(options.read_timeout.as_millis() as u64),
                    partial: frame.to_vec(),
                });
            }
        }
    };
    result.map_err(|err| FrameError {
        error: ReadError::from(err),
        partial: frame.to_vec(),
    })
}

/// 当前行是否为 ASTM 终止记录 `L|`（允许 STX 与帧序号前缀）。
fn is_terminator_line(line: &[u8]) -> bool {
    let mut line = line;
    if line.first() == Some(&STX) {
        line = &line[1..];
    }
    if line.first().is_some_and(u8::is_ascii_digit) {
        line = &line[1..];
    }
    line.len() >= 2 && line[0].eq_ignore_ascii_case(&b'L') && line[1] == b'|'
}

/// 读取一条 ASTM 报文。
///
/// 结束条件：EOF、ETX/EOT、或以 CR 结束的 `L|` 终止记录。
/// 连接在首字节前关闭时返回 `Ok(None)`。
pub async fn read_astm_frame<R>(
    reader: &mut R,
    options: &FrameOptions,
) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    let mut line_start = 0;
    loop {
        let available = fill(reader, options, &frame).await?;
        if available == 0 {
            break;
        }
        let buf = reader.fill_buf().await.map_err(|err| FrameError {
            error: ReadError::from(err),
            partial: frame.clone(),
        })?;
        let mut consumed = 0;
        let mut done = false;
        for &byte in buf.iter() {
            consumed += 1;
            frame.push(byte);
            match byte {
                ETX | EOT => {
                    done = true;
                    break;
                }
                CR | LF => {
                    let line = &frame[line_start..frame.len() - 1];
                    if byte == CR && is_terminator_line(line) {
                        done = true;
                        break;
                    }
                    line_start = frame.len();
                }
                _ => {}
            }
        }
        reader.consume(consumed);
        if done {
            break;
        }
    }
    if frame.is_empty() {
        return Ok(None);
    }
    Ok(Some(frame))
}

/// 读取一条 MLLP 帧（`VT ... FS CR`），返回帧内字节。
pub async fn read_mllp_frame<R>(
    reader: &mut R,
    options: &FrameOptions,
) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    let mut started = false;
    loop {
        let available = fill(reader, options, &frame).await?;
        if available == 0 {
            break;
        }
        let buf = reader.fill_buf().await.map_err(|err| FrameError {
            error: ReadError::from(err),
            partial: frame.clone(),
        })?;
        let mut consumed = 0;
        let mut done = false;
        for &byte in buf.iter() {
            consumed += 1;
            if !started {
                started = byte == VT;
                continue;
            }
            if byte == FS {
                done = true;
                break;
            }
            frame.push(byte);
        }
        reader.consume(consumed);
        if done {
            // 帧尾 CR 可选
            let trailing_cr = matches!(
                timeout(Duration::from_millis(50), reader.fill_buf()).await,
                Ok(Ok(buf)) if buf.first() == Some(&CR)
            );
            if trailing_cr {
                reader.consume(1);
            }
            return Ok(Some(frame));
        }
    }
    if frame.is_empty() {
        return Ok(None);
    }
    Ok(Some(frame))
}

/// 以 CR 结束每行写出 ASTM 应答。
pub async fn write_astm_lines<W>(writer: &mut W, lines: &[String]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = Vec::new();
    for line in lines {
        payload.extend_from_slice(line.as_bytes());
        payload.push(CR);
    }
    writer.write_all(&payload).await?;
    writer.flush().await
}

/// 以 MLLP 帧写出 HL7 应答。
pub async fn write_mllp_lines<W>(writer: &mut W, lines: &[String]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = vec![VT];
    for line in lines {
        payload.extend_from_slice(line.as_bytes());
        payload.push(CR);
    }
    payload.extend_from_slice(&[FS, CR]);
    writer.write_all(&payload).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    fn options() -> FrameOptions {
        FrameOptions::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn astm_frame_ends_at_terminator_record() {
        let input: &[u8] = b"H|\\^&|||ACME\rR|1|^^^GLU|5\rL|1|N\rH|\\^&|||NEXT\rL|1|N\r";
        let mut reader = BufReader::new(input);
        let first = read_astm_frame(&mut reader, &options())
            .await
            .expect("read")
            .expect("frame");
        assert_eq!(first, b"H|\\^&|||ACME\rR|1|^^^GLU|5\rL|1|N\r".to_vec());
        let second = read_astm_frame(&mut reader, &options())
            .await
            .expect("read")
            .expect("frame");
        assert!(second.starts_with(b"H|\\^&|||NEXT"));
        assert!(read_astm_frame(&mut reader, &options())
            .await
            .expect("read")
            .is_none());
    }

    #[tokio::test]
    async fn astm_frame_ends_at_etx() {
        let input: &[u8] = b"\x021H|\\^&\rR|1|^^^GLU|5\x03";
        let mut reader = BufReader::new(input);
        let frame = read_astm_frame(&mut reader, &options())
            .await
            .expect("read")
            .expect("frame");
        assert_eq!(frame.last(), Some(&ETX));
    }

    #[tokio::test]
    async fn stalled_stream_times_out_with_partial_bytes() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"H|\\^&|||ACME\r").await.expect("write");
        let mut reader = BufReader::new(server);
        let err = read_astm_frame(&mut reader, &options())
            .await
            .expect_err("timeout");
        assert_eq!(err.error, ReadError::Timeout(200));
        assert_eq!(err.partial, b"H|\\^&|||ACME\r".to_vec());
        drop(client);
    }

    #[tokio::test]
    async fn mllp_frame_round_trip() {
        let (mut client, server) = tokio::io::duplex(256);
        write_mllp_lines(&mut client, &["MSH|^~\\&|APP".to_string(), "MSA|AA|1".to_string()])
            .await
            .expect("write");
        drop(client);
        let mut reader = BufReader::new(server);
        let frame = read_mllp_frame(&mut reader, &options())
            .await
            .expect("read")
            .expect("frame");
        assert_eq!(frame, b"MSH|^~\\&|APP\rMSA|AA|1\r".to_vec());
    }
}
