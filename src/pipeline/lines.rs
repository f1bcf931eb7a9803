//! Incremental `data:` line splitting for the upstream byte stream.
//!
//! The upstream speaks a minimal SSE dialect: one JSON payload per
//! `data: {...}` line. Bytes arrive at arbitrary boundaries, so partial
//! lines are buffered until the terminating newline shows up. Blank lines
//! and lines with any other prefix are ignored.

use bytes::BytesMut;
use memchr::memchr;

pub struct DataLineSplitter {
    buffer: BytesMut,
}

impl DataLineSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Feed a raw chunk and append every completed `data:` payload to `out`.
    ///
    /// Payloads are decoded lossily; the downstream JSON decoder rejects
    /// anything that was actually mangled.
    pub fn feed_into(&mut self, chunk: &[u8], out: &mut Vec<String>) {
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = memchr(b'\n', &self.buffer) {
            let line = self.buffer.split_to(pos + 1);
            let mut line = &line[..line.len() - 1];
            if let [rest @ .., b'\r'] = line {
                line = rest;
            }
            let Some(payload) = line.strip_prefix(b"data:") else {
                continue;
            };
            let payload = payload.strip_prefix(b" ").unwrap_or(payload);
            if !payload.is_empty() {
                out.push(String::from_utf8_lossy(payload).into_owned());
            }
        }
    }

    #[cfg(test)]
    fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }
}

impl Default for DataLineSplitter {
    fn default() -> Self {
        Self::new()
    }
}
