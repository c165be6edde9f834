// ==========================================
// 生产实绩分析系统 - 流式转码读取器
// ==========================================
// 职责: 将 Shift_JIS / UTF-16 等源编码按块转为 UTF-8 字节流
// 说明: 非法字节替换为 U+FFFD,不中断读取; BOM 优先于声明编码
// ==========================================

use encoding_rs::{CoderResult, Decoder, Encoding};
use std::io::{self, Read};

const CHUNK_SIZE: usize = 8 * 1024;

/// 按标签解析编码（WHATWG 标签,大小写不敏感）
pub fn resolve_encoding(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

// ==========================================
// DecodingReader - 转码 Read 适配器
// ==========================================
pub struct DecodingReader<R: Read> {
    inner: R,
    decoder: Decoder,
    out_buf: String,
    out_pos: usize,
    finished: bool,
    had_replacements: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder(),
            out_buf: String::new(),
            out_pos: 0,
            finished: false,
            had_replacements: false,
        }
    }

    /// 是否出现过非法字节替换
    pub fn had_replacements(&self) -> bool {
        self.had_replacements
    }

    /// 读取下一块源字节并解码到 out_buf
    fn fill(&mut self) -> io::Result<()> {
        let mut raw = [0u8; CHUNK_SIZE];
        let n = loop {
            match self.inner.read(&mut raw) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        let last = n == 0;

        self.out_buf.clear();
        self.out_pos = 0;

        let mut consumed = 0;
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(n - consumed)
                .unwrap_or(CHUNK_SIZE * 3);
            self.out_buf.reserve(needed);

            let (result, read, had_errors) =
                self.decoder
                    .decode_to_string(&raw[consumed..n], &mut self.out_buf, last);
            consumed += read;
            self.had_replacements |= had_errors;

            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }

        if last {
            self.finished = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let pending = &self.out_buf.as_bytes()[self.out_pos..];
            if !pending.is_empty() {
                let n = pending.len().min(buf.len());
                buf[..n].copy_from_slice(&pending[..n]);
                self.out_pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            self.fill()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8], label: &str) -> String {
        let encoding = resolve_encoding(label).unwrap();
        let mut reader = DecodingReader::new(bytes, encoding);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_shift_jis_to_utf8() {
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode("品目コード\t指図番号\n");
        assert_eq!(decode_all(&encoded, "shift_jis"), "品目コード\t指図番号\n");
    }

    #[test]
    fn test_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "品目\t標準原価\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_all(&bytes, "utf-16"), "品目\t標準原価\n");
    }

    #[test]
    fn test_utf8_bom_removed() {
        let bytes = b"\xEF\xBB\xBFabc";
        assert_eq!(decode_all(bytes, "utf-8"), "abc");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let encoding = resolve_encoding("utf-8").unwrap();
        let bytes: &[u8] = b"ab\xFFcd";
        let mut reader = DecodingReader::new(bytes, encoding);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "ab\u{FFFD}cd");
        assert!(reader.had_replacements());
    }

    #[test]
    fn test_large_input_spanning_chunks() {
        let text = "指図番号\n".repeat(5_000);
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(&text);
        assert_eq!(decode_all(&encoded, "shift_jis"), text);
    }

    #[test]
    fn test_unknown_label() {
        assert!(resolve_encoding("no-such-encoding").is_none());
        assert!(resolve_encoding(" Shift_JIS ").is_some());
    }
}
