//! 字符集识别与解码
//!
//! 顺序：BOM 嗅探 → 合法 UTF-8 → windows-1252 回退。

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

/// 解码结果
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static Encoding,
}

/// 识别字符集并解码（BOM 会被去除）
pub fn decode_bytes(bytes: &[u8]) -> DecodedText {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return DecodedText {
            text: text.into_owned(),
            encoding,
        };
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => DecodedText {
            text: text.to_string(),
            encoding: UTF_8,
        },
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            DecodedText {
                text: text.into_owned(),
                encoding: WINDOWS_1252,
            }
        }
    }
}
